//! Applying policy to a subtree: find each node's applicable policy and
//! engage the modules it calls for.

use std::sync::Arc;

use axisdesc_core::error::Result;
use axisdesc_core::policy::Policy;
use axisdesc_core::wsdl::Direction;

use crate::tree::{ChildKey, DescriptionTree, NodeId, NodeKind};

impl DescriptionTree {
    /// Policy that drives module engagement for `id`.
    ///
    /// Messages resolve through the service's current endpoint when its
    /// binding describes the same operation and direction; otherwise their
    /// own effective policy applies. Other kinds have none.
    pub fn applicable_policy(&self, id: NodeId) -> Result<Option<Arc<Policy>>> {
        let node = self.node(id)?;
        let NodeKind::Message(message) = node.kind() else {
            return Ok(None);
        };
        match self.binding_message_for(id, message.direction) {
            Some(binding_message) => self.effective_policy(binding_message),
            None => self.effective_policy(id),
        }
    }

    fn binding_message_for(&self, message: NodeId, direction: Direction) -> Option<NodeId> {
        let operation = self.parent(message)?;
        let op_node = self.node(operation).ok()?;
        let NodeKind::Operation(op) = op_node.kind() else {
            return None;
        };
        if !op.mep.has_direction(direction) {
            return None;
        }
        let service = self.parent(operation)?;
        let endpoint = self.endpoint(service, &self.endpoint_name(service)?)?;
        let binding = self.binding_of(endpoint)?;
        let binding_operation = self.child(binding, &ChildKey::QName(op.name.clone()))?;
        self.child(binding_operation, &ChildKey::from(direction.label()))
    }

    /// Replace the node's own policy with `policy`, then apply.
    pub fn apply_policy_with(&self, id: NodeId, policy: Policy) -> Result<()> {
        let node = self.node(id)?;
        node.policy.clear();
        node.policy.attach_policy(policy);
        self.apply_policy(id)
    }

    /// Walk the subtree pre-order, engaging modules for every applicable
    /// policy. The first failure aborts the walk; modules engaged before it
    /// stay engaged.
    pub fn apply_policy(&self, id: NodeId) -> Result<()> {
        if self.configuration_of(id).is_none() {
            tracing::debug!(node = %id, "not attached to a configuration; policy not applied");
            return Ok(());
        }
        self.apply_policy_at(id)
    }

    fn apply_policy_at(&self, id: NodeId) -> Result<()> {
        if let Some(policy) = self.applicable_policy(id)? {
            let registry = Arc::clone(self.module_registry());
            self.engage_modules_for_policy(id, &policy, &registry)?;
        }
        for child in self.children(id) {
            self.apply_policy_at(child)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use axisdesc_core::policy::{Assertion, QName};
    use axisdesc_core::wsdl::Mep;

    fn policy(local: &str) -> Policy {
        Policy::with_assertions([Assertion::new(QName::new("urn:t", local))])
    }

    #[test]
    fn message_prefers_matching_binding_message() {
        let tree = DescriptionTree::new();
        let group = tree.add_service_group("g").unwrap();
        let svc = tree.add_service(group, "Echo").unwrap();
        let name = QName::local("echo");
        let op = tree.add_operation(svc, name.clone(), Mep::InOut).unwrap();
        let msg = tree.add_message(op, Direction::In).unwrap();
        tree.node(msg).unwrap().policy_subject().attach_policy(policy("Own"));

        let own = tree.applicable_policy(msg).unwrap().unwrap();
        assert!(!own.contains_assertion(&QName::new("urn:t", "Bound")));

        let ep = tree.add_endpoint(svc, "EchoSoap", None).unwrap();
        let binding = tree.set_binding(ep, QName::local("EchoBinding"), "soap11").unwrap();
        let bop = tree.add_binding_operation(binding, name).unwrap();
        let bmsg = tree.add_binding_message(bop, Direction::In).unwrap();
        tree.node(bmsg).unwrap().policy_subject().attach_policy(policy("Bound"));

        let bound = tree.applicable_policy(msg).unwrap().unwrap();
        assert!(bound.contains_assertion(&QName::new("urn:t", "Bound")));
        assert!(bound.contains_assertion(&QName::new("urn:t", "Own")));
    }

    #[test]
    fn only_messages_have_applicable_policy() {
        let tree = DescriptionTree::new();
        tree.node(tree.root()).unwrap().policy_subject().attach_policy(policy("A"));
        assert!(tree.applicable_policy(tree.root()).unwrap().is_none());
    }

    #[test]
    fn detached_subtree_is_ignored() {
        let tree = DescriptionTree::new();
        let svc = tree.create(NodeKind::service("Loose"));
        tree.apply_policy_with(svc, policy("A")).unwrap();
        let subject = tree.node(svc).unwrap();
        assert_eq!(subject.policy_subject().attached_policy_components().len(), 1);
    }
}
