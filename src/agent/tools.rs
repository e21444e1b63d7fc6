//! Tool filtering for the MCP toolset
//!
//! The bridge exposes every tool it implements; a filter narrows that down
//! to the ones the agent is allowed to call.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Allow-list of bridge tool names
///
/// An unset filter allows every tool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ToolFilter {
    allowed: Option<BTreeSet<String>>,
}

impl ToolFilter {
    /// A filter that allows everything
    pub fn all() -> Self {
        Self { allowed: None }
    }

    /// A filter restricted to the given names
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            allowed: Some(names.into_iter().map(Into::into).collect()),
        }
    }

    /// Check if a tool may be used
    pub fn allows(&self, name: &str) -> bool {
        match &self.allowed {
            None => true,
            Some(set) => set.contains(name),
        }
    }

    /// Whether this filter restricts anything
    pub fn is_restricted(&self) -> bool {
        self.allowed.is_some()
    }

    /// Keep only allowed items, using `name` to get each item's tool name
    pub fn apply<T, F>(&self, items: Vec<T>, name: F) -> Vec<T>
    where
        F: Fn(&T) -> &str,
    {
        items.into_iter().filter(|t| self.allows(name(t))).collect()
    }
}

impl From<Option<Vec<String>>> for ToolFilter {
    fn from(names: Option<Vec<String>>) -> Self {
        match names {
            Some(names) => Self::only(names),
            None => Self::all(),
        }
    }
}
