//! Read-only snapshot of a tree's engagement state, serializable as JSON.

use serde::Serialize;

use axisdesc_core::error::{AxisError, Result};

use crate::engage::Phase;
use crate::tree::{DescriptionTree, NodeId, NodeKind};

#[derive(Debug, Serialize)]
pub struct TreeReport {
    pub engaged: Vec<String>,
    pub service_groups: Vec<GroupReport>,
}

#[derive(Debug, Serialize)]
pub struct GroupReport {
    pub name: String,
    pub engaged: Vec<String>,
    pub services: Vec<ServiceReport>,
}

#[derive(Debug, Serialize)]
pub struct ServiceReport {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    pub engaged: Vec<String>,
    pub operations: Vec<OperationReport>,
}

#[derive(Debug, Serialize)]
pub struct OperationReport {
    pub name: String,
    pub mep: &'static str,
    pub engaged: Vec<String>,
    pub messages: Vec<MessageReport>,
}

#[derive(Debug, Serialize)]
pub struct MessageReport {
    pub label: String,
    pub engaged: Vec<String>,
    /// Assertions of the first alternative of the applicable policy.
    pub policy: Vec<String>,
    pub flow: Vec<PhaseReport>,
}

#[derive(Debug, Serialize)]
pub struct PhaseReport {
    pub phase: String,
    pub handlers: Vec<String>,
}

impl From<Phase> for PhaseReport {
    fn from(p: Phase) -> Self {
        Self {
            phase: p.name,
            handlers: p.handlers,
        }
    }
}

fn engaged(tree: &DescriptionTree, id: NodeId) -> Result<Vec<String>> {
    Ok(tree
        .engaged_modules(id)?
        .iter()
        .map(|m| m.archive_name().to_string())
        .collect())
}

/// Children sorted by key so reports are stable.
fn sorted_children(tree: &DescriptionTree, id: NodeId) -> Vec<NodeId> {
    let mut children = tree.children(id);
    children.sort_by_key(|c| tree.describe(*c));
    children
}

impl TreeReport {
    pub fn collect(tree: &DescriptionTree) -> Result<Self> {
        let root = tree.root();
        let mut service_groups = Vec::new();
        for group in sorted_children(tree, root) {
            service_groups.push(group_report(tree, group)?);
        }
        Ok(Self {
            engaged: engaged(tree, root)?,
            service_groups,
        })
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AxisError::Internal(format!("report serialization: {e}")))
    }
}

fn group_report(tree: &DescriptionTree, id: NodeId) -> Result<GroupReport> {
    let node = tree.node(id)?;
    let name = match node.kind() {
        NodeKind::ServiceGroup(d) => d.name.clone(),
        _ => node.describe(),
    };
    let mut services = Vec::new();
    for service in sorted_children(tree, id) {
        services.push(service_report(tree, service)?);
    }
    Ok(GroupReport {
        name,
        engaged: engaged(tree, id)?,
        services,
    })
}

fn service_report(tree: &DescriptionTree, id: NodeId) -> Result<ServiceReport> {
    let node = tree.node(id)?;
    let name = match node.kind() {
        NodeKind::Service(d) => d.name.clone(),
        _ => node.describe(),
    };
    let mut operations = Vec::new();
    for op in sorted_children(tree, id) {
        operations.push(operation_report(tree, op)?);
    }
    Ok(ServiceReport {
        name,
        endpoint: tree.endpoint_name(id),
        engaged: engaged(tree, id)?,
        operations,
    })
}

fn operation_report(tree: &DescriptionTree, id: NodeId) -> Result<OperationReport> {
    let node = tree.node(id)?;
    let (name, mep) = match node.kind() {
        NodeKind::Operation(d) => (d.name.to_string(), d.mep.uri()),
        _ => (node.describe(), ""),
    };
    let mut messages = Vec::new();
    for msg in sorted_children(tree, id) {
        messages.push(message_report(tree, msg)?);
    }
    Ok(OperationReport {
        name,
        mep,
        engaged: engaged(tree, id)?,
        messages,
    })
}

fn message_report(tree: &DescriptionTree, id: NodeId) -> Result<MessageReport> {
    let node = tree.node(id)?;
    let label = match node.kind() {
        NodeKind::Message(d) => d.label.clone().unwrap_or_default(),
        _ => node.describe(),
    };
    let policy: Vec<String> = tree
        .applicable_policy(id)?
        .and_then(|p| {
            p.first_alternative()
                .map(|alt| alt.assertions().iter().map(|a| a.name.to_string()).collect())
        })
        .unwrap_or_default();
    Ok(MessageReport {
        label,
        engaged: engaged(tree, id)?,
        policy,
        flow: tree.message_flow(id).into_iter().map(PhaseReport::from).collect(),
    })
}
