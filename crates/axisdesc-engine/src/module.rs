//! Deployable modules: descriptor plus optional implementation hooks.

use std::fmt;
use std::sync::Arc;

use axisdesc_core::error::Result;
use axisdesc_core::module::{archive_name, HandlerDescription, Version};
use axisdesc_core::parameter::ParameterStore;
use axisdesc_core::policy::Assertion;

use crate::tree::{DescriptionTree, NodeId};

/// Implementation side of a module. Every hook has a no-op default.
pub trait Module: Send + Sync {
    /// Called before the module is recorded as engaged on `node`. An error
    /// aborts the engagement.
    fn engage_notify(&self, _tree: &DescriptionTree, _node: NodeId) -> Result<()> {
        Ok(())
    }

    fn disengage_notify(&self, _tree: &DescriptionTree, _node: NodeId) {}

    /// Whether this module can enforce `assertion`.
    fn can_support_assertion(&self, _assertion: &Assertion) -> bool {
        true
    }
}

/// A module as known to the configuration.
pub struct AxisModule {
    name: String,
    version: Option<Version>,
    archive_name: String,
    policy_namespaces: Vec<String>,
    handlers: Vec<HandlerDescription>,
    parameters: ParameterStore,
    implementation: Option<Arc<dyn Module>>,
}

impl fmt::Debug for AxisModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AxisModule")
            .field("archive_name", &self.archive_name)
            .field("policy_namespaces", &self.policy_namespaces)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

impl AxisModule {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            archive_name: name.clone(),
            name,
            version: None,
            policy_namespaces: Vec::new(),
            handlers: Vec::new(),
            parameters: ParameterStore::new(),
            implementation: None,
        }
    }

    pub fn with_version(mut self, version: Version) -> Self {
        self.archive_name = archive_name(&self.name, Some(&version));
        self.version = Some(version);
        self
    }

    /// Declare a policy namespace this module governs.
    pub fn supporting(mut self, namespace: impl Into<String>) -> Self {
        self.policy_namespaces.push(namespace.into());
        self
    }

    pub fn with_handler(mut self, handler: HandlerDescription) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn with_implementation(mut self, implementation: Arc<dyn Module>) -> Self {
        self.implementation = Some(implementation);
        self
    }

    /// Logical name, without version.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> Option<&Version> {
        self.version.as_ref()
    }

    pub fn archive_name(&self) -> &str {
        &self.archive_name
    }

    pub fn policy_namespaces(&self) -> &[String] {
        &self.policy_namespaces
    }

    pub fn handlers(&self) -> &[HandlerDescription] {
        &self.handlers
    }

    pub fn parameters(&self) -> &ParameterStore {
        &self.parameters
    }

    pub fn implementation(&self) -> Option<&Arc<dyn Module>> {
        self.implementation.as_ref()
    }

    /// Modules without an implementation accept every assertion.
    pub fn can_support_assertion(&self, assertion: &Assertion) -> bool {
        self.implementation
            .as_ref()
            .map_or(true, |m| m.can_support_assertion(assertion))
    }
}
