//! Populates a [`DescriptionTree`] from a validated descriptor.

use std::sync::Arc;

use axisdesc_core::error::{AxisError, Result};
use axisdesc_core::module::HandlerDescription;
use axisdesc_core::parameter::{Parameter, ParameterValue};
use axisdesc_core::policy::{Alternative, Assertion, Policy, PolicyReference, QName};
use axisdesc_core::wsdl::Direction;

use super::schema::{
    DeploymentConfig, EndpointConfig, ModuleConfig, OperationConfig, ParameterConfig,
    ParameterKind, PolicyConfig, ServiceConfig, ServiceGroupConfig,
};
use crate::engage::PhaseOrder;
use crate::module::{AxisModule, Module};
use crate::tree::{DescriptionTree, NodeId, NodeKind};

/// Module declared in a descriptor: no code, but it may refuse assertions.
struct DeclaredModule {
    refuses: Vec<QName>,
}

impl Module for DeclaredModule {
    fn can_support_assertion(&self, assertion: &Assertion) -> bool {
        !self.refuses.contains(&assertion.name)
    }
}

/// Build the tree. Modules listed under `engage` are engaged bottom-up once
/// the subtree below each level exists, so fan-out reaches every child.
/// Policy application is left to the caller.
pub fn build_tree(cfg: &DeploymentConfig) -> Result<DescriptionTree> {
    let tree = DescriptionTree::new();
    let root = tree.root();

    if let Some(phases) = &cfg.phases {
        tree.set_phase_order(PhaseOrder {
            in_phases: phases.in_phases.clone(),
            out_phases: phases.out_phases.clone(),
        });
    }
    add_parameters(&tree, root, &cfg.parameters)?;
    for p in &cfg.policies {
        tree.register_policy(root, policy_from(p))?;
    }
    for m in &cfg.modules {
        tree.module_registry().add_module(module_from(m)?);
    }
    attach_policies(&tree, root, &cfg.attach)?;

    for g in &cfg.service_groups {
        build_group(&tree, g)?;
    }
    engage(&tree, root, &cfg.engage)?;

    tracing::info!(
        nodes = tree.len(),
        modules = tree.module_registry().modules().len(),
        "description tree built"
    );
    Ok(tree)
}

fn build_group(tree: &DescriptionTree, g: &ServiceGroupConfig) -> Result<()> {
    let group = tree.add_service_group(&g.name)?;
    if let Some(doc) = &g.documentation {
        tree.set_documentation(group, doc.clone())?;
    }
    add_parameters(tree, group, &g.parameters)?;
    attach_policies(tree, group, &g.policies)?;
    for s in &g.services {
        build_service(tree, group, s)?;
    }
    engage(tree, group, &g.engage)
}

fn build_service(tree: &DescriptionTree, group: NodeId, s: &ServiceConfig) -> Result<()> {
    let service = tree.add_service(group, &s.name)?;
    if let Some(doc) = &s.documentation {
        tree.set_documentation(service, doc.clone())?;
    }
    add_parameters(tree, service, &s.parameters)?;
    attach_policies(tree, service, &s.policies)?;

    for o in &s.operations {
        build_operation(tree, service, o)?;
    }
    for e in &s.endpoints {
        build_endpoint(tree, service, e)?;
    }
    if let Some(current) = &s.endpoint {
        tree.set_endpoint_name(service, current)?;
    }
    engage(tree, service, &s.engage)
}

fn build_operation(tree: &DescriptionTree, service: NodeId, o: &OperationConfig) -> Result<()> {
    let operation = tree.add_operation(service, QName::parse(&o.name), o.mep()?)?;
    add_parameters(tree, operation, &o.parameters)?;
    attach_policies(tree, operation, &o.policies)?;

    for m in &o.messages {
        let direction = m.direction()?;
        let mut kind = NodeKind::message(Some(direction.label().to_string()), direction);
        if let Some(element) = &m.element {
            kind = kind.with_element(QName::parse(element));
        }
        let message = tree.create(kind);
        tree.add_child(operation, message)?;
        add_parameters(tree, message, &m.parameters)?;
        attach_policies(tree, message, &m.policies)?;
        engage(tree, message, &m.engage)?;
    }
    engage(tree, operation, &o.engage)
}

fn build_endpoint(tree: &DescriptionTree, service: NodeId, e: &EndpointConfig) -> Result<()> {
    let endpoint = tree.add_endpoint(service, &e.name, e.address.clone())?;
    attach_policies(tree, endpoint, &e.policies)?;

    let Some(b) = &e.binding else {
        return Ok(());
    };
    let binding = tree.set_binding(endpoint, QName::parse(&b.name), &b.binding_type)?;
    attach_policies(tree, binding, &b.policies)?;
    for bo in &b.operations {
        let binding_operation = tree.add_binding_operation(binding, QName::parse(&bo.name))?;
        attach_policies(tree, binding_operation, &bo.policies)?;
        for bm in &bo.messages {
            let direction: Direction = bm.direction.parse()?;
            let binding_message = tree.add_binding_message(binding_operation, direction)?;
            attach_policies(tree, binding_message, &bm.policies)?;
        }
    }
    Ok(())
}

fn parameter_from(p: &ParameterConfig) -> Parameter {
    let value = match p.kind {
        ParameterKind::Text => ParameterValue::Text(p.value.clone()),
        ParameterKind::Xml => ParameterValue::Xml(p.value.clone()),
    };
    Parameter::new(p.name.clone(), value).locked(p.locked)
}

fn add_parameters(tree: &DescriptionTree, id: NodeId, params: &[ParameterConfig]) -> Result<()> {
    for p in params {
        tree.add_parameter(id, parameter_from(p))?;
    }
    Ok(())
}

fn policy_from(p: &PolicyConfig) -> Policy {
    let alternatives = p.alternatives.iter().map(|alt| {
        Alternative::new(alt.iter().map(|a| Assertion {
            name: QName::new(a.namespace.clone(), a.local.clone()),
            optional: a.optional,
        }))
    });
    let policy = Policy::from_alternatives(alternatives).named(p.name.clone());
    match &p.id {
        Some(id) => policy.with_id(id.clone()),
        None => policy,
    }
}

/// `#name` attaches a reference resolved at merge time; a plain name
/// attaches a copy of the registered policy.
fn attach_policies(tree: &DescriptionTree, id: NodeId, names: &[String]) -> Result<()> {
    let node = tree.node(id)?;
    for name in names {
        if name.starts_with('#') {
            node.policy_subject().attach_policy_reference(PolicyReference::new(name.clone()));
            continue;
        }
        let policy = tree
            .registered_policy(tree.root(), name)
            .ok_or_else(|| AxisError::BadDescriptor(format!("unknown policy {name}")))?;
        node.policy_subject().attach_policy(Policy::clone(&policy));
    }
    Ok(())
}

fn module_from(m: &ModuleConfig) -> Result<AxisModule> {
    let mut module = AxisModule::new(m.name.clone());
    if let Some(v) = &m.version {
        module = module.with_version(v.parse()?);
    }
    for ns in &m.namespaces {
        module = module.supporting(ns.clone());
    }
    for h in &m.handlers {
        module = module.with_handler(HandlerDescription::new(
            h.name.clone(),
            h.phase.clone(),
            h.flow.parse()?,
        ));
    }
    if !m.refuses.is_empty() {
        let refuses = m.refuses.iter().map(|r| QName::parse(r)).collect();
        module = module.with_implementation(Arc::new(DeclaredModule { refuses }));
    }
    for p in &m.parameters {
        module.parameters().add(parameter_from(p));
    }
    Ok(module)
}

fn engage(tree: &DescriptionTree, id: NodeId, names: &[String]) -> Result<()> {
    for name in names {
        let module = tree.module_registry().require(name)?;
        tree.engage_module(id, &module)?;
    }
    Ok(())
}
