//! Description nodes and their per-kind data.

use std::fmt;
use std::sync::{Arc, Mutex, OnceLock, PoisonError, RwLock};

use dashmap::DashMap;

use axisdesc_core::error::{AxisError, MessageKey, Result};
use axisdesc_core::parameter::ParameterStore;
use axisdesc_core::policy::{Policy, PolicySubject, QName};
use axisdesc_core::wsdl::{Direction, Mep};

use crate::engage::{InFlight, Phase, PhaseOrder};
use crate::module::AxisModule;
use crate::policy::EffectivePolicyCache;
use crate::registry::ModuleRegistry;

/// Handle of a node inside a [`DescriptionTree`](super::DescriptionTree).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lookup key of a child inside its parent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChildKey {
    Name(String),
    QName(QName),
}

impl From<&str> for ChildKey {
    fn from(s: &str) -> Self {
        ChildKey::Name(s.to_string())
    }
}

impl From<String> for ChildKey {
    fn from(s: String) -> Self {
        ChildKey::Name(s)
    }
}

impl From<QName> for ChildKey {
    fn from(q: QName) -> Self {
        ChildKey::QName(q)
    }
}

impl fmt::Display for ChildKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChildKey::Name(n) => f.write_str(n),
            ChildKey::QName(q) => write!(f, "{q}"),
        }
    }
}

pub struct ConfigurationData {
    pub(crate) registry: Arc<ModuleRegistry>,
    pub(crate) phases: Arc<RwLock<PhaseOrder>>,
}

pub struct ServiceGroupData {
    pub name: String,
}

pub struct ServiceData {
    pub name: String,
    pub(crate) endpoint_name: RwLock<Option<String>>,
    pub(crate) endpoints: DashMap<String, NodeId>,
}

pub struct OperationData {
    pub name: QName,
    pub mep: Mep,
}

pub struct MessageData {
    pub label: Option<String>,
    pub direction: Direction,
    pub element: Option<QName>,
    pub(crate) flow: Mutex<Vec<Phase>>,
}

pub struct EndpointData {
    pub name: String,
    pub address: Option<String>,
    pub(crate) binding: OnceLock<NodeId>,
}

pub struct BindingData {
    pub name: QName,
    pub binding_type: String,
}

pub struct BindingOperationData {
    pub name: QName,
    pub(crate) operation: OnceLock<NodeId>,
}

pub struct BindingMessageData {
    pub label: Option<String>,
    pub direction: Direction,
    pub fault: bool,
    pub(crate) message: OnceLock<NodeId>,
}

/// Closed set of node kinds.
pub enum NodeKind {
    Configuration(ConfigurationData),
    ServiceGroup(ServiceGroupData),
    Service(ServiceData),
    Operation(OperationData),
    Message(MessageData),
    Endpoint(EndpointData),
    Binding(BindingData),
    BindingOperation(BindingOperationData),
    BindingMessage(BindingMessageData),
}

impl NodeKind {
    pub fn service_group(name: impl Into<String>) -> Self {
        NodeKind::ServiceGroup(ServiceGroupData { name: name.into() })
    }

    pub fn service(name: impl Into<String>) -> Self {
        NodeKind::Service(ServiceData {
            name: name.into(),
            endpoint_name: RwLock::new(None),
            endpoints: DashMap::new(),
        })
    }

    pub fn operation(name: QName, mep: Mep) -> Self {
        NodeKind::Operation(OperationData { name, mep })
    }

    pub fn message(label: Option<String>, direction: Direction) -> Self {
        NodeKind::Message(MessageData {
            label,
            direction,
            element: None,
            flow: Mutex::new(Vec::new()),
        })
    }

    /// Schema element carried by a message; other kinds are returned unchanged.
    pub fn with_element(mut self, element: QName) -> Self {
        if let NodeKind::Message(d) = &mut self {
            d.element = Some(element);
        }
        self
    }

    pub fn endpoint(name: impl Into<String>, address: Option<String>) -> Self {
        NodeKind::Endpoint(EndpointData {
            name: name.into(),
            address,
            binding: OnceLock::new(),
        })
    }

    pub fn binding(name: QName, binding_type: impl Into<String>) -> Self {
        NodeKind::Binding(BindingData {
            name,
            binding_type: binding_type.into(),
        })
    }

    pub fn binding_operation(name: QName) -> Self {
        NodeKind::BindingOperation(BindingOperationData {
            name,
            operation: OnceLock::new(),
        })
    }

    pub fn binding_message(label: Option<String>, direction: Direction, fault: bool) -> Self {
        NodeKind::BindingMessage(BindingMessageData {
            label,
            direction,
            fault,
            message: OnceLock::new(),
        })
    }

    /// Kind name, used in faults the way a class name would be.
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Configuration(_) => "Configuration",
            NodeKind::ServiceGroup(_) => "ServiceGroup",
            NodeKind::Service(_) => "Service",
            NodeKind::Operation(_) => "Operation",
            NodeKind::Message(_) => "Message",
            NodeKind::Endpoint(_) => "Endpoint",
            NodeKind::Binding(_) => "Binding",
            NodeKind::BindingOperation(_) => "BindingOperation",
            NodeKind::BindingMessage(_) => "BindingMessage",
        }
    }

    /// Natural child key of this kind, if it has one.
    pub fn key(&self) -> Option<ChildKey> {
        match self {
            NodeKind::Configuration(_) => None,
            NodeKind::ServiceGroup(d) => Some(ChildKey::Name(d.name.clone())),
            NodeKind::Service(d) => Some(ChildKey::Name(d.name.clone())),
            NodeKind::Operation(d) => Some(ChildKey::QName(d.name.clone())),
            NodeKind::Message(d) => d.label.clone().map(ChildKey::Name),
            NodeKind::Endpoint(d) => Some(ChildKey::Name(d.name.clone())),
            NodeKind::Binding(d) => Some(ChildKey::QName(d.name.clone())),
            NodeKind::BindingOperation(d) => Some(ChildKey::QName(d.name.clone())),
            NodeKind::BindingMessage(d) => d.label.clone().map(ChildKey::Name),
        }
    }
}

/// One node of the description tree. Owned by the tree's arena; relations
/// to other nodes are handles, never owning pointers.
pub struct DescriptionNode {
    pub(crate) id: NodeId,
    pub(crate) kind: NodeKind,
    parent: OnceLock<NodeId>,
    pub(crate) children: DashMap<ChildKey, NodeId>,
    pub(crate) parameters: ParameterStore,
    pub(crate) policy: PolicySubject,
    pub(crate) policy_registry: DashMap<String, Arc<Policy>>,
    pub(crate) engaged: DashMap<String, Arc<AxisModule>>,
    pub(crate) in_flight: InFlight,
    pub(crate) effective: EffectivePolicyCache,
    documentation: RwLock<Option<String>>,
}

impl DescriptionNode {
    pub(crate) fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            parent: OnceLock::new(),
            children: DashMap::new(),
            parameters: ParameterStore::new(),
            policy: PolicySubject::new(),
            policy_registry: DashMap::new(),
            engaged: DashMap::new(),
            in_flight: InFlight::default(),
            effective: EffectivePolicyCache::default(),
            documentation: RwLock::new(None),
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn key(&self) -> Option<ChildKey> {
        self.kind.key()
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent.get().copied()
    }

    /// Set once; re-setting the same parent is a no-op.
    pub(crate) fn set_parent(&self, parent: NodeId) -> Result<()> {
        match self.parent.get() {
            Some(&p) if p == parent => Ok(()),
            Some(&p) => Err(AxisError::fault(
                MessageKey::ParentAlreadySet,
                [self.describe(), p.to_string()],
            )),
            None => {
                // A concurrent setter may have won between get and set.
                match self.parent.set(parent) {
                    Ok(()) => Ok(()),
                    Err(_) => match self.parent.get() {
                        Some(&p) if p == parent => Ok(()),
                        _ => Err(AxisError::fault(
                            MessageKey::ParentAlreadySet,
                            [self.describe(), parent.to_string()],
                        )),
                    },
                }
            }
        }
    }

    pub fn policy_subject(&self) -> &PolicySubject {
        &self.policy
    }

    pub fn parameter_store(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn documentation(&self) -> Option<String> {
        self.documentation
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Empty text is ignored.
    pub fn set_documentation(&self, text: impl Into<String>) {
        let text = text.into();
        if text.is_empty() {
            return;
        }
        *self
            .documentation
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(text);
    }

    /// `Kind(key)` label for logs and faults.
    pub fn describe(&self) -> String {
        match self.key() {
            Some(k) => format!("{}({})", self.kind.name(), k),
            None => format!("{}{}", self.kind.name(), self.id),
        }
    }
}
