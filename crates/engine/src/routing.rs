//! Static key routing
//!
//! Every mapper builds its routing table once, at construction: each
//! external key it accepts maps to the attribute mappings and mountings
//! that consume it. `write` is then a table lookup per key; keys with no
//! entry are ignored.
//!
//! Keys of a single mounting are the child's own keys (already carrying
//! the child's prefix). A collection mounting is addressed by one key, its
//! `key` option or its name, prefixed like the mapper's own attributes.

use std::collections::BTreeMap;

/// Apply a mount prefix: `prefix_key`
pub(crate) fn prefixed(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{}_{}", p, key),
        _ => key.to_string(),
    }
}

/// Consumer of a routed key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Route {
    /// Position in the mapper's attribute mappings
    Attribute(usize),
    /// Position in the mapper's mountings
    Mounting(usize),
}

#[derive(Debug, Clone, Default)]
pub(crate) struct RoutingTable {
    routes: BTreeMap<String, Vec<Route>>,
}

impl RoutingTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn add(&mut self, key: String, route: Route) {
        let routes = self.routes.entry(key).or_default();
        if !routes.contains(&route) {
            routes.push(route);
        }
    }

    pub(crate) fn lookup(&self, key: &str) -> &[Route] {
        self.routes.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &str> {
        self.routes.keys().map(String::as_str)
    }
}
