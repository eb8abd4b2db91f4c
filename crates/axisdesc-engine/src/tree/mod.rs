//! Description tree: an arena of nodes linked by handles.
//!
//! Every node is owned by the tree. A node's parent is a set-once handle and
//! its children live in a concurrent map keyed by [`ChildKey`], so readers
//! can walk the tree while configuration is still being loaded or policies
//! are being applied.

mod node;
mod params;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use dashmap::DashMap;

use axisdesc_core::error::{AxisError, MessageKey, Result};
use axisdesc_core::policy::{AlternativeMerger, Policy, PolicyMerger, QName};
use axisdesc_core::wsdl::{Direction, Mep};

pub use node::{
    BindingData, BindingMessageData, BindingOperationData, ChildKey, ConfigurationData,
    DescriptionNode, EndpointData, MessageData, NodeId, NodeKind, OperationData, ServiceData,
    ServiceGroupData,
};

use crate::engage::PhaseOrder;
use crate::events::{AxisEvent, AxisObserver};
use crate::module::AxisModule;
use crate::policy::{PolicyLocator, RegistryLocator};
use crate::registry::ModuleRegistry;

/// The configuration tree of one deployment. The root is always the
/// configuration node.
pub struct DescriptionTree {
    nodes: DashMap<NodeId, Arc<DescriptionNode>>,
    seq: AtomicU64,
    root: NodeId,
    registry: Arc<ModuleRegistry>,
    phases: Arc<RwLock<PhaseOrder>>,
    pub(crate) merger: Arc<dyn PolicyMerger>,
    pub(crate) locator: Arc<dyn PolicyLocator>,
    observers: RwLock<Vec<Arc<dyn AxisObserver>>>,
}

impl Default for DescriptionTree {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptionTree {
    pub fn new() -> Self {
        Self::with_policy_services(Arc::new(AlternativeMerger), Arc::new(RegistryLocator))
    }

    /// Tree using the given merge utility and reference locator.
    pub fn with_policy_services(
        merger: Arc<dyn PolicyMerger>,
        locator: Arc<dyn PolicyLocator>,
    ) -> Self {
        let registry = Arc::new(ModuleRegistry::new());
        let phases = Arc::new(RwLock::new(PhaseOrder::default()));
        let root = NodeId(1);
        let nodes = DashMap::new();
        nodes.insert(
            root,
            Arc::new(DescriptionNode::new(
                root,
                NodeKind::Configuration(ConfigurationData {
                    registry: Arc::clone(&registry),
                    phases: Arc::clone(&phases),
                }),
            )),
        );
        Self {
            nodes,
            seq: AtomicU64::new(2),
            root,
            registry,
            phases,
            merger,
            locator,
            observers: RwLock::new(Vec::new()),
        }
    }

    /// The configuration node.
    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn module_registry(&self) -> &Arc<ModuleRegistry> {
        &self.registry
    }

    pub fn phase_order(&self) -> PhaseOrder {
        self.phases
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Replaces the global phase order; flows seeded earlier keep theirs.
    pub fn set_phase_order(&self, order: PhaseOrder) {
        *self.phases.write().unwrap_or_else(PoisonError::into_inner) = order;
    }

    pub fn node(&self, id: NodeId) -> Result<Arc<DescriptionNode>> {
        self.nodes
            .get(&id)
            .map(|r| Arc::clone(r.value()))
            .ok_or_else(|| AxisError::Internal(format!("unknown node {id}")))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Create a detached node.
    pub fn create(&self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.seq.fetch_add(1, Ordering::Relaxed));
        self.nodes.insert(id, Arc::new(DescriptionNode::new(id, kind)));
        id
    }

    pub fn describe(&self, id: NodeId) -> String {
        self.node(id)
            .map(|n| n.describe())
            .unwrap_or_else(|_| format!("<unknown {id}>"))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.parent())
    }

    /// Ancestors from the parent upwards.
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut cur = self.parent(id);
        while let Some(p) = cur {
            if out.contains(&p) {
                break;
            }
            out.push(p);
            cur = self.parent(p);
        }
        out
    }

    /// The configuration this node is attached to, if any.
    pub fn configuration_of(&self, id: NodeId) -> Option<NodeId> {
        if id == self.root {
            return Some(id);
        }
        self.ancestors(id).into_iter().find(|&a| a == self.root)
    }

    /// Insert under the child's own key. Kinds without a key (a message
    /// without label) are rejected rather than silently dropped.
    pub fn add_child(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let child_node = self.node(child)?;
        let key = child_node.key().ok_or_else(|| {
            AxisError::fault(
                MessageKey::UnkeyedChild,
                [child_node.describe(), self.describe(parent)],
            )
        })?;
        self.add_child_with_key(parent, key, child)
    }

    /// Insert under an explicit key, replacing any child with the same key.
    pub fn add_child_with_key(&self, parent: NodeId, key: ChildKey, child: NodeId) -> Result<()> {
        let parent_node = self.node(parent)?;
        self.link_parent(parent, child)?;
        parent_node.children.insert(key, child);
        tracing::trace!(%parent, %child, "child linked");
        Ok(())
    }

    /// Set the child's parent handle, refusing cycles and re-parenting.
    fn link_parent(&self, parent: NodeId, child: NodeId) -> Result<()> {
        let child_node = self.node(child)?;
        if parent == child || self.ancestors(parent).contains(&child) {
            return Err(AxisError::fault(
                MessageKey::CyclicChild,
                [child_node.describe(), self.describe(parent)],
            ));
        }
        child_node.set_parent(parent)
    }

    /// Detach the child stored under `key` from the lookup map. The child's
    /// parent handle is kept.
    pub fn remove_child(&self, parent: NodeId, key: &ChildKey) -> Option<NodeId> {
        self.node(parent)
            .ok()
            .and_then(|p| p.children.remove(key).map(|(_, id)| id))
    }

    pub fn child(&self, parent: NodeId, key: &ChildKey) -> Option<NodeId> {
        self.node(parent)
            .ok()
            .and_then(|p| p.children.get(key).map(|r| *r.value()))
    }

    /// Snapshot of the children (order unspecified). Taken eagerly so
    /// callers may mutate the tree while iterating.
    pub fn children(&self, parent: NodeId) -> Vec<NodeId> {
        self.node(parent)
            .map(|p| p.children.iter().map(|r| *r.value()).collect())
            .unwrap_or_default()
    }

    pub fn set_documentation(&self, id: NodeId, text: impl Into<String>) -> Result<()> {
        self.node(id)?.set_documentation(text);
        Ok(())
    }

    pub fn documentation(&self, id: NodeId) -> Option<String> {
        self.node(id).ok().and_then(|n| n.documentation())
    }

    // ----- typed construction -----

    pub fn add_service_group(&self, name: &str) -> Result<NodeId> {
        let id = self.create(NodeKind::service_group(name));
        self.add_child(self.root, id)?;
        Ok(id)
    }

    pub fn add_service(&self, group: NodeId, name: &str) -> Result<NodeId> {
        let id = self.create(NodeKind::service(name));
        self.add_child(group, id)?;
        Ok(id)
    }

    pub fn add_operation(&self, service: NodeId, name: QName, mep: Mep) -> Result<NodeId> {
        let id = self.create(NodeKind::operation(name, mep));
        self.add_child(service, id)?;
        Ok(id)
    }

    /// Add a message under the conventional label of its direction.
    pub fn add_message(&self, operation: NodeId, direction: Direction) -> Result<NodeId> {
        let id = self.create(NodeKind::message(Some(direction.label().to_string()), direction));
        self.add_child(operation, id)?;
        Ok(id)
    }

    /// Endpoints are kept in the service's endpoint map, not among its
    /// children. The first endpoint becomes the service's current one.
    pub fn add_endpoint(
        &self,
        service: NodeId,
        name: &str,
        address: Option<String>,
    ) -> Result<NodeId> {
        let service_node = self.node(service)?;
        let NodeKind::Service(data) = &service_node.kind else {
            return Err(AxisError::Unsupported {
                kind: service_node.kind.name(),
                operation: "add_endpoint",
            });
        };
        let id = self.create(NodeKind::endpoint(name, address));
        self.link_parent(service, id)?;
        data.endpoints.insert(name.to_string(), id);
        let mut current = data
            .endpoint_name
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        if current.is_none() {
            *current = Some(name.to_string());
        }
        Ok(id)
    }

    pub fn set_endpoint_name(&self, service: NodeId, name: &str) -> Result<()> {
        let service_node = self.node(service)?;
        let NodeKind::Service(data) = &service_node.kind else {
            return Err(AxisError::Unsupported {
                kind: service_node.kind.name(),
                operation: "set_endpoint_name",
            });
        };
        *data
            .endpoint_name
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(name.to_string());
        Ok(())
    }

    pub fn endpoint_name(&self, service: NodeId) -> Option<String> {
        let node = self.node(service).ok()?;
        match &node.kind {
            NodeKind::Service(d) => d
                .endpoint_name
                .read()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
            _ => None,
        }
    }

    pub fn endpoint(&self, service: NodeId, name: &str) -> Option<NodeId> {
        let node = self.node(service).ok()?;
        match &node.kind {
            NodeKind::Service(d) => d.endpoints.get(name).map(|r| *r.value()),
            _ => None,
        }
    }

    pub fn endpoints(&self, service: NodeId) -> Vec<NodeId> {
        match self.node(service) {
            Ok(node) => match &node.kind {
                NodeKind::Service(d) => d.endpoints.iter().map(|r| *r.value()).collect(),
                _ => Vec::new(),
            },
            Err(_) => Vec::new(),
        }
    }

    /// Attach the endpoint's binding; an endpoint has exactly one.
    pub fn set_binding(&self, endpoint: NodeId, name: QName, binding_type: &str) -> Result<NodeId> {
        let endpoint_node = self.node(endpoint)?;
        let NodeKind::Endpoint(data) = &endpoint_node.kind else {
            return Err(AxisError::Unsupported {
                kind: endpoint_node.kind.name(),
                operation: "set_binding",
            });
        };
        let mut created = None;
        let id = *data.binding.get_or_init(|| {
            let id = self.create(NodeKind::binding(name, binding_type));
            created = Some(id);
            id
        });
        if created.is_none() {
            return Err(AxisError::fault(
                MessageKey::AlreadyLinked,
                [endpoint_node.describe(), self.describe(id)],
            ));
        }
        self.link_parent(endpoint, id)?;
        Ok(id)
    }

    pub fn binding_of(&self, endpoint: NodeId) -> Option<NodeId> {
        let node = self.node(endpoint).ok()?;
        match &node.kind {
            NodeKind::Endpoint(d) => d.binding.get().copied(),
            _ => None,
        }
    }

    /// Add a binding operation, linking it to the service operation of the
    /// same name when one exists.
    pub fn add_binding_operation(&self, binding: NodeId, name: QName) -> Result<NodeId> {
        let id = self.create(NodeKind::binding_operation(name.clone()));
        self.add_child(binding, id)?;

        let service = self
            .parent(binding)
            .and_then(|endpoint| self.parent(endpoint));
        if let Some(op) = service.and_then(|s| self.child(s, &ChildKey::QName(name))) {
            self.link_operation(id, op)?;
        }
        Ok(id)
    }

    pub fn link_operation(&self, binding_operation: NodeId, operation: NodeId) -> Result<()> {
        let node = self.node(binding_operation)?;
        match &node.kind {
            NodeKind::BindingOperation(d) => self.link_once(&node, &d.operation, operation),
            other => Err(AxisError::Unsupported {
                kind: other.name(),
                operation: "link_operation",
            }),
        }
    }

    /// Set a lateral link once; linking to the same node again is a no-op.
    fn link_once(
        &self,
        node: &DescriptionNode,
        link: &OnceLock<NodeId>,
        target: NodeId,
    ) -> Result<()> {
        let current = *link.get_or_init(|| target);
        if current == target {
            Ok(())
        } else {
            Err(AxisError::fault(
                MessageKey::AlreadyLinked,
                [node.describe(), self.describe(current)],
            ))
        }
    }

    pub fn operation_of(&self, binding_operation: NodeId) -> Option<NodeId> {
        let node = self.node(binding_operation).ok()?;
        match &node.kind {
            NodeKind::BindingOperation(d) => d.operation.get().copied(),
            _ => None,
        }
    }

    /// Add a binding message under its direction label, linking it to the
    /// matching operation message when one exists.
    pub fn add_binding_message(
        &self,
        binding_operation: NodeId,
        direction: Direction,
    ) -> Result<NodeId> {
        let label = direction.label();
        let id = self.create(NodeKind::binding_message(
            Some(label.to_string()),
            direction,
            false,
        ));
        self.add_child(binding_operation, id)?;

        if let Some(msg) = self
            .operation_of(binding_operation)
            .and_then(|op| self.child(op, &ChildKey::from(label)))
        {
            self.link_message(id, msg)?;
        }
        Ok(id)
    }

    pub fn link_message(&self, binding_message: NodeId, message: NodeId) -> Result<()> {
        let node = self.node(binding_message)?;
        match &node.kind {
            NodeKind::BindingMessage(d) => self.link_once(&node, &d.message, message),
            other => Err(AxisError::Unsupported {
                kind: other.name(),
                operation: "link_message",
            }),
        }
    }

    /// The operation message a binding message stands for: the explicit
    /// link, else the operation's child under the same label.
    pub fn message_of(&self, binding_message: NodeId) -> Option<NodeId> {
        let node = self.node(binding_message).ok()?;
        let NodeKind::BindingMessage(d) = &node.kind else {
            return None;
        };
        if let Some(&m) = d.message.get() {
            return Some(m);
        }
        let label = d.label.clone()?;
        let op = self.operation_of(node.parent()?)?;
        self.child(op, &ChildKey::Name(label))
    }

    // ----- policy registry & observers -----

    /// Register a named policy on a node so references can find it.
    pub fn register_policy(&self, id: NodeId, policy: Policy) -> Result<String> {
        let node = self.node(id)?;
        let mut policy = policy;
        let key = match policy.key() {
            Some(k) => k.to_string(),
            None => {
                let generated = format!("policy-{}", node.policy_registry.len() + 1);
                policy.set_id(generated.clone());
                generated
            }
        };
        node.policy_registry.insert(key.clone(), Arc::new(policy));
        Ok(key)
    }

    pub fn registered_policy(&self, id: NodeId, key: &str) -> Option<Arc<Policy>> {
        self.node(id)
            .ok()
            .and_then(|n| n.policy_registry.get(key).map(|r| Arc::clone(r.value())))
    }

    pub fn add_observer(&self, observer: Arc<dyn AxisObserver>) {
        self.observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    pub(crate) fn notify_observers(&self, event: AxisEvent, module: &AxisModule) {
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for o in observers {
            o.module_update(&event, module);
        }
    }
}
