//! Routing diagnostics
//!
//! Engines expose their state to reporting tooling as a small tree of text
//! nodes. Rendering it never changes algorithm state.

use std::fmt::Display;

use serde::Serialize;

/// A node in a routing-state report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoutingInfo {
    /// Line of text for this node
    pub text: String,
    /// Nested details
    pub children: Vec<RoutingInfo>,
}

impl RoutingInfo {
    /// Create a leaf node
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            children: Vec::new(),
        }
    }

    /// Append a nested node
    pub fn add_child(&mut self, child: RoutingInfo) {
        self.children.push(child);
    }

    /// Builder-style variant of [`RoutingInfo::add_child`]
    pub fn with_child(mut self, child: RoutingInfo) -> Self {
        self.children.push(child);
        self
    }

    fn render(&self, f: &mut std::fmt::Formatter<'_>, depth: usize) -> std::fmt::Result {
        writeln!(f, "{:indent$}{}", "", self.text, indent = depth * 2)?;
        for child in &self.children {
            child.render(f, depth + 1)?;
        }
        Ok(())
    }
}

impl Display for RoutingInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.render(f, 0)
    }
}
