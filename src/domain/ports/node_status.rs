//! Node enablement port.

/// Whether this node should currently take on work.
pub trait NodeStatusProvider: Send + Sync {
    /// False while the node should hold off acquiring agents.
    fn is_node_enabled(&self) -> bool;
}
