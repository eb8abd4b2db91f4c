//! Phase order and per-message handler flows.

use std::sync::PoisonError;

use axisdesc_core::error::{AxisError, MessageKey, Result};
use axisdesc_core::wsdl::Direction;

use crate::module::AxisModule;
use crate::tree::{DescriptionTree, NodeId, NodeKind};

/// One named phase and the module handlers spliced into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Phase {
    pub name: String,
    pub handlers: Vec<String>,
}

impl Phase {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handlers: Vec::new(),
        }
    }
}

/// Global phase order of a configuration, one list per flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseOrder {
    pub in_phases: Vec<String>,
    pub out_phases: Vec<String>,
}

impl Default for PhaseOrder {
    fn default() -> Self {
        let names = |v: &[&str]| -> Vec<String> { v.iter().map(|s| s.to_string()).collect() };
        Self {
            in_phases: names(&[
                "Transport",
                "Addressing",
                "Security",
                "PreDispatch",
                "Dispatch",
                "OperationInPhase",
            ]),
            out_phases: names(&["OperationOutPhase", "Addressing", "Security", "MessageOut"]),
        }
    }
}

impl PhaseOrder {
    pub fn phases(&self, direction: Direction) -> &[String] {
        match direction {
            Direction::In => &self.in_phases,
            Direction::Out => &self.out_phases,
        }
    }
}

impl DescriptionTree {
    /// Phases of a message's flow with the handlers spliced so far. Empty
    /// until a module touches the message.
    pub fn message_flow(&self, message: NodeId) -> Vec<Phase> {
        match self.node(message) {
            Ok(node) => match node.kind() {
                NodeKind::Message(d) => d
                    .flow
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .clone(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        }
    }

    /// Add the module's handlers for the message's direction to their
    /// declared phases. Nothing changes if any phase is unknown.
    pub(crate) fn splice_handlers(&self, message: NodeId, module: &AxisModule) -> Result<()> {
        let node = self.node(message)?;
        let NodeKind::Message(data) = node.kind() else {
            return Ok(());
        };
        let mut flow = data.flow.lock().unwrap_or_else(PoisonError::into_inner);
        let mut next: Vec<Phase> = if flow.is_empty() {
            self.phase_order()
                .phases(data.direction)
                .iter()
                .map(Phase::new)
                .collect()
        } else {
            flow.clone()
        };

        for handler in module.handlers().iter().filter(|h| h.flow == data.direction) {
            let phase = next
                .iter_mut()
                .find(|p| p.name == handler.phase)
                .ok_or_else(|| {
                    AxisError::fault(
                        MessageKey::InvalidPhase,
                        [module.archive_name(), handler.name.as_str(), handler.phase.as_str()],
                    )
                })?;
            if !phase.handlers.contains(&handler.name) {
                phase.handlers.push(handler.name.clone());
            }
        }
        *flow = next;
        tracing::debug!(node = %message, module = %module.archive_name(), "handlers spliced");
        Ok(())
    }

    pub(crate) fn unsplice_handlers(&self, message: NodeId, module: &AxisModule) -> Result<()> {
        let node = self.node(message)?;
        let NodeKind::Message(data) = node.kind() else {
            return Ok(());
        };
        let mut flow = data.flow.lock().unwrap_or_else(PoisonError::into_inner);
        for handler in module.handlers().iter().filter(|h| h.flow == data.direction) {
            if let Some(phase) = flow.iter_mut().find(|p| p.name == handler.phase) {
                phase.handlers.retain(|h| h != &handler.name);
            }
        }
        Ok(())
    }
}
