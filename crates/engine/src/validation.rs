//! Validation rules attached to mapper definitions and traits
//!
//! Rules inspect the target after `write` and report one message each.
//! They are deliberately small; anything richer belongs in a `custom` rule.

use formtree_core::{Target, Value};
use std::fmt;
use std::sync::Arc;

/// Custom rule body: `Some(message)` on failure
pub type CustomRule = Arc<dyn Fn(&Target) -> Option<String> + Send + Sync>;

/// What a validation checks
#[derive(Clone)]
pub enum Rule {
    /// Attribute must not be blank
    Presence,
    /// String length bounds, in characters; blank values are left to `Presence`
    Length {
        /// Minimum length
        min: Option<usize>,
        /// Maximum length
        max: Option<usize>,
    },
    /// Value must be one of the listed values
    Inclusion(Vec<Value>),
    /// Arbitrary check over the whole target
    Custom(CustomRule),
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Rule::Presence => write!(f, "Presence"),
            Rule::Length { min, max } => f
                .debug_struct("Length")
                .field("min", min)
                .field("max", max)
                .finish(),
            Rule::Inclusion(values) => f.debug_tuple("Inclusion").field(values).finish(),
            Rule::Custom(_) => write!(f, "Custom(..)"),
        }
    }
}

/// A rule bound to an attribute
#[derive(Debug, Clone)]
pub struct Validation {
    attribute: String,
    rule: Rule,
    message: Option<String>,
}

impl Validation {
    /// `attribute` must not be blank
    pub fn presence(attribute: impl Into<String>) -> Self {
        Self::new(attribute, Rule::Presence)
    }

    /// `attribute` length must lie within `min..=max`
    pub fn length(attribute: impl Into<String>, min: Option<usize>, max: Option<usize>) -> Self {
        Self::new(attribute, Rule::Length { min, max })
    }

    /// `attribute` must equal one of `values`
    pub fn inclusion(attribute: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(attribute, Rule::Inclusion(values))
    }

    /// Custom check; failures are reported against `attribute`
    pub fn custom<F>(attribute: impl Into<String>, check: F) -> Self
    where
        F: Fn(&Target) -> Option<String> + Send + Sync + 'static,
    {
        Self::new(attribute, Rule::Custom(Arc::new(check)))
    }

    fn new(attribute: impl Into<String>, rule: Rule) -> Self {
        Self {
            attribute: attribute.into(),
            rule,
            message: None,
        }
    }

    /// Replace the default failure message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Attribute the rule reports against
    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    /// The rule
    pub fn rule(&self) -> &Rule {
        &self.rule
    }

    /// Run the rule, returning the failure message
    pub fn check(&self, target: &Target) -> Option<String> {
        let value = target.get(&self.attribute);
        let failure = match &self.rule {
            Rule::Presence => value.is_blank().then(|| "can't be blank".to_string()),
            Rule::Length { min, max } => match value.as_str() {
                Some(s) if !value.is_blank() => {
                    let len = s.chars().count();
                    match (min, max) {
                        (Some(min), _) if len < *min => Some(format!(
                            "is too short (minimum is {} characters)",
                            min
                        )),
                        (_, Some(max)) if len > *max => Some(format!(
                            "is too long (maximum is {} characters)",
                            max
                        )),
                        _ => None,
                    }
                }
                _ => None,
            },
            Rule::Inclusion(values) => {
                (!values.contains(&value)).then(|| "is not included in the list".to_string())
            }
            Rule::Custom(check) => check(target),
        };
        failure.map(|default| self.message.clone().unwrap_or(default))
    }
}
