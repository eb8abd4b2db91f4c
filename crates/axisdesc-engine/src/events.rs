use crate::module::AxisModule;
use crate::tree::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisEventKind {
    ModuleEngaged,
    ModuleDisengaged,
}

/// Change notification raised by the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AxisEvent {
    pub kind: AxisEventKind,
    pub node: NodeId,
}

impl AxisEvent {
    pub fn new(kind: AxisEventKind, node: NodeId) -> Self {
        Self { kind, node }
    }
}

/// Receives module engagement changes, synchronously and in registration
/// order.
pub trait AxisObserver: Send + Sync {
    fn module_update(&self, event: &AxisEvent, module: &AxisModule);
}
