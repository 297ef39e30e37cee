//! Validation error collection
//!
//! [`Errors`] maps an external field key to the messages recorded against
//! it. Keys are the flat keys callers wrote with, so a form can put each
//! message next to the input that produced it.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Key used for errors not attributable to a single field
pub const BASE_KEY: &str = "base";

/// Field key to messages
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Errors {
    entries: BTreeMap<String, Vec<String>>,
}

impl Errors {
    /// Empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a message against `key`
    pub fn add(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.entries.entry(key.into()).or_default().push(message.into());
    }

    /// Messages for `key`
    pub fn get(&self, key: &str) -> Option<&[String]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    /// Whether any message was recorded against `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// No errors at all
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of keys with errors
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Keys with errors, in order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Iterate `(key, messages)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Append every message of `other`
    pub fn merge(&mut self, other: &Errors) {
        for (key, messages) in &other.entries {
            self.entries
                .entry(key.clone())
                .or_default()
                .extend(messages.iter().cloned());
        }
    }

    /// Flatten into `"key message"` lines
    pub fn full_messages(&self) -> Vec<String> {
        self.entries
            .iter()
            .flat_map(|(k, msgs)| msgs.iter().map(move |m| format!("{} {}", k, m)))
            .collect()
    }
}
