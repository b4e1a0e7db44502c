//! Custom tracing layers for oppnet
//!
//! Attaches the active node context to spans so formatters and downstream
//! layers can attribute events to the node that emitted them.

use tracing::{Subscriber, span};
use tracing_subscriber::{
    layer::{Context, Layer},
    registry::LookupSpan,
};

use crate::context::{NodeContextData, NodeContextGuard};

/// Layer that injects node context into spans
///
/// Every span opened while a [`NodeContextGuard`] is active gets a
/// [`NodeContextExtension`].
#[derive(Debug, Default)]
pub struct NodeContextLayer;

impl NodeContextLayer {
    /// Create a new node context layer
    pub fn new() -> Self {
        Self
    }
}

/// Extension data stored on spans
#[derive(Debug, Clone)]
pub struct NodeContextExtension {
    pub data: NodeContextData,
}

impl<S> Layer<S> for NodeContextLayer
where
    S: Subscriber + for<'lookup> LookupSpan<'lookup>,
{
    fn on_new_span(&self, _attrs: &span::Attributes<'_>, id: &span::Id, ctx: Context<'_, S>) {
        if let Some(span) = ctx.span(id)
            && let Some(node_ctx) = NodeContextGuard::current()
        {
            span.extensions_mut()
                .insert(NodeContextExtension { data: node_ctx });
        }
    }
}
