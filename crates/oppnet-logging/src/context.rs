//! Node context injection for per-node logging
//!
//! Thread-local storage for the identity of the node whose engine is
//! currently running, so that every log entry emitted inside the scope can be
//! attributed to it.

use std::cell::RefCell;

use oppnet_core::PeerIdentity;
use uuid::Uuid;

/// Node context data stored in thread-local storage
#[derive(Debug, Clone)]
pub struct NodeContextData {
    /// The node's identity as a string
    pub node_id: String,
    /// Identifier of the simulation run
    pub run_id: Uuid,
}

thread_local! {
    static NODE_CONTEXT: RefCell<Option<NodeContextData>> = const { RefCell::new(None) };
}

/// RAII guard for node context
///
/// Creating the guard sets the node context for the current thread. Dropping
/// it restores the previous context (if any).
///
/// # Example
///
/// ```ignore
/// use oppnet_logging::context::NodeContextGuard;
/// use oppnet_core::SimulationIdentity;
///
/// let node = SimulationIdentity::new('A').unwrap();
/// let _guard = NodeContextGuard::new(&node, run_id);
///
/// // Spans opened in this scope carry node_id = "A"
/// tracing::info!("Contact up");
/// ```
pub struct NodeContextGuard {
    previous: Option<NodeContextData>,
}

impl NodeContextGuard {
    /// Enter the context of `identity` within run `run_id`
    pub fn new<I: PeerIdentity>(identity: &I, run_id: Uuid) -> Self {
        let previous = NODE_CONTEXT.with(|ctx| ctx.borrow().clone());

        let new_ctx = NodeContextData {
            node_id: identity.short_id(),
            run_id,
        };
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = Some(new_ctx));

        Self { previous }
    }

    /// Get the current node context (if any)
    pub fn current() -> Option<NodeContextData> {
        NODE_CONTEXT.with(|ctx| ctx.borrow().clone())
    }

    /// Get the current node ID (if set)
    pub fn current_node_id() -> Option<String> {
        Self::current().map(|ctx| ctx.node_id)
    }
}

impl Drop for NodeContextGuard {
    fn drop(&mut self) {
        NODE_CONTEXT.with(|ctx| *ctx.borrow_mut() = self.previous.take());
    }
}

/// Convenience macro to run a block in a node's context
///
/// # Example
///
/// ```ignore
/// with_node_context!(&node, run_id, {
///     tracing::info!("Update tick");
/// });
/// ```
#[macro_export]
macro_rules! with_node_context {
    ($identity:expr, $run_id:expr, $body:block) => {{
        let _guard = $crate::context::NodeContextGuard::new($identity, $run_id);
        $body
    }};
}
