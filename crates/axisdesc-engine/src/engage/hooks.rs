//! Per-kind engagement hooks.
//!
//! Every node kind has its own hook type. Container kinds fan engagement out
//! to their children; operations and messages splice handlers into message
//! flows; binding-side kinds refuse engagement altogether.

use std::sync::Arc;

use axisdesc_core::error::Result;

use crate::module::AxisModule;
use crate::tree::{DescriptionTree, NodeId, NodeKind};

pub(crate) trait EngagementHooks: Sync {
    fn supports_engagement(&self) -> bool {
        true
    }

    /// Runs after the version check, the module's own notification and the
    /// teardown of a replaced version; the module is recorded on `node`
    /// only once this returns.
    fn on_engage(
        &self,
        _tree: &DescriptionTree,
        _node: NodeId,
        _module: &Arc<AxisModule>,
        _engager: NodeId,
    ) -> Result<()> {
        Ok(())
    }

    fn on_disengage(
        &self,
        _tree: &DescriptionTree,
        _node: NodeId,
        _module: &Arc<AxisModule>,
    ) -> Result<()> {
        Ok(())
    }
}

struct ConfigurationHooks;
struct ServiceGroupHooks;
struct ServiceHooks;
struct OperationHooks;
struct MessageHooks;
struct EndpointHooks;
struct BindingHooks;
struct BindingOperationHooks;
struct BindingMessageHooks;

fn engage_children(
    tree: &DescriptionTree,
    node: NodeId,
    module: &Arc<AxisModule>,
    engager: NodeId,
) -> Result<()> {
    for child in tree.children(node) {
        tree.engage_module_from(child, module, engager)?;
    }
    Ok(())
}

fn disengage_children(
    tree: &DescriptionTree,
    node: NodeId,
    module: &Arc<AxisModule>,
) -> Result<()> {
    for child in tree.children(node) {
        tree.disengage_module_quiet(child, module)?;
    }
    Ok(())
}

impl EngagementHooks for ConfigurationHooks {
    fn on_engage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
        engager: NodeId,
    ) -> Result<()> {
        engage_children(tree, node, module, engager)
    }

    fn on_disengage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
    ) -> Result<()> {
        disengage_children(tree, node, module)
    }
}

impl EngagementHooks for ServiceGroupHooks {
    fn on_engage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
        engager: NodeId,
    ) -> Result<()> {
        engage_children(tree, node, module, engager)
    }

    fn on_disengage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
    ) -> Result<()> {
        disengage_children(tree, node, module)
    }
}

impl EngagementHooks for ServiceHooks {
    fn on_engage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
        engager: NodeId,
    ) -> Result<()> {
        engage_children(tree, node, module, engager)
    }

    fn on_disengage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
    ) -> Result<()> {
        disengage_children(tree, node, module)
    }
}

impl EngagementHooks for OperationHooks {
    fn on_engage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
        _engager: NodeId,
    ) -> Result<()> {
        for message in tree.children(node) {
            tree.splice_handlers(message, module)?;
        }
        Ok(())
    }

    fn on_disengage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
    ) -> Result<()> {
        for message in tree.children(node) {
            tree.unsplice_handlers(message, module)?;
        }
        Ok(())
    }
}

impl EngagementHooks for MessageHooks {
    fn on_engage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
        _engager: NodeId,
    ) -> Result<()> {
        tree.splice_handlers(node, module)
    }

    fn on_disengage(
        &self,
        tree: &DescriptionTree,
        node: NodeId,
        module: &Arc<AxisModule>,
    ) -> Result<()> {
        tree.unsplice_handlers(node, module)
    }
}

impl EngagementHooks for EndpointHooks {
    fn supports_engagement(&self) -> bool {
        false
    }
}

impl EngagementHooks for BindingHooks {
    fn supports_engagement(&self) -> bool {
        false
    }
}

impl EngagementHooks for BindingOperationHooks {
    fn supports_engagement(&self) -> bool {
        false
    }
}

impl EngagementHooks for BindingMessageHooks {
    fn supports_engagement(&self) -> bool {
        false
    }
}

impl NodeKind {
    pub(crate) fn hooks(&self) -> &'static dyn EngagementHooks {
        match self {
            NodeKind::Configuration(_) => &ConfigurationHooks,
            NodeKind::ServiceGroup(_) => &ServiceGroupHooks,
            NodeKind::Service(_) => &ServiceHooks,
            NodeKind::Operation(_) => &OperationHooks,
            NodeKind::Message(_) => &MessageHooks,
            NodeKind::Endpoint(_) => &EndpointHooks,
            NodeKind::Binding(_) => &BindingHooks,
            NodeKind::BindingOperation(_) => &BindingOperationHooks,
            NodeKind::BindingMessage(_) => &BindingMessageHooks,
        }
    }

    /// Whether modules can be engaged on this kind.
    pub fn supports_engagement(&self) -> bool {
        self.hooks().supports_engagement()
    }
}
