//! Parameter inheritance over the ancestor chain.
//!
//! Each node keeps its own [`ParameterStore`](axisdesc_core::parameter::ParameterStore);
//! fallback to parents and lock inheritance are resolved here because only
//! the tree knows the chain.

use std::sync::Arc;

use axisdesc_core::error::{AxisError, MessageKey, Result};
use axisdesc_core::parameter::{Parameter, ParameterObserver, ParameterValue};

use super::{DescriptionTree, NodeId};

impl DescriptionTree {
    /// Add or replace a parameter on `id`. Fails when the name is locked on
    /// this node or any ancestor.
    pub fn add_parameter(&self, id: NodeId, param: Parameter) -> Result<()> {
        let node = self.node(id)?;
        if self.is_parameter_locked(id, param.name()) {
            return Err(AxisError::fault(
                MessageKey::ParameterLockedByParent,
                [param.name()],
            ));
        }
        tracing::trace!(node = %id, name = param.name(), "parameter added");
        node.parameters.add(param);
        Ok(())
    }

    pub fn remove_parameter(&self, id: NodeId, name: &str) -> Result<Option<Parameter>> {
        Ok(self.node(id)?.parameters.remove(name))
    }

    /// Local store first, then ancestors. A parameter found only on an
    /// ancestor comes back non-editable.
    pub fn parameter(&self, id: NodeId, name: &str) -> Option<Parameter> {
        let node = self.node(id).ok()?;
        if let Some(p) = node.parameters.get(name) {
            return Some(p.with_editable(true));
        }
        self.ancestors(id).into_iter().find_map(|a| {
            self.node(a)
                .ok()
                .and_then(|n| n.parameters.get(name))
                .map(|p| p.with_editable(false))
        })
    }

    pub fn parameter_value(&self, id: NodeId, name: &str) -> Option<ParameterValue> {
        self.parameter(id, name).map(|p| p.value().clone())
    }

    /// `true`, `yes` or `1` (case-insensitive) anywhere up the chain.
    pub fn is_parameter_true(&self, id: NodeId, name: &str) -> bool {
        self.parameter(id, name)
            .is_some_and(|p| p.value().is_true())
    }

    /// Locked at any ancestor, or locally. Ancestors are checked first.
    pub fn is_parameter_locked(&self, id: NodeId, name: &str) -> bool {
        if let Some(parent) = self.parent(id) {
            if self.is_parameter_locked(parent, name) {
                return true;
            }
        }
        self.node(id)
            .ok()
            .and_then(|n| n.parameters.get(name))
            .is_some_and(|p| p.is_locked())
    }

    /// Parameters stored on this node only.
    pub fn parameters(&self, id: NodeId) -> Vec<Parameter> {
        self.node(id)
            .map(|n| n.parameters.parameters())
            .unwrap_or_default()
    }

    pub fn add_parameter_observer(
        &self,
        id: NodeId,
        observer: Arc<dyn ParameterObserver>,
    ) -> Result<()> {
        self.node(id)?.parameters.add_observer(observer);
        Ok(())
    }

    pub fn remove_parameter_observer(
        &self,
        id: NodeId,
        observer: &Arc<dyn ParameterObserver>,
    ) -> Result<()> {
        self.node(id)?.parameters.remove_observer(observer);
        Ok(())
    }
}
