use std::sync::Arc;

use dashmap::DashMap;

use axisdesc_core::error::{AxisError, MessageKey, Result};

use crate::module::AxisModule;

/// Modules available to a configuration, indexed by archive name and by the
/// policy namespaces they govern.
#[derive(Default)]
pub struct ModuleRegistry {
    modules: DashMap<String, Arc<AxisModule>>,
    by_namespace: DashMap<String, Vec<Arc<AxisModule>>>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self {
            modules: DashMap::new(),
            by_namespace: DashMap::new(),
        }
    }

    /// Register a module, replacing one with the same archive name.
    pub fn add_module(&self, module: AxisModule) -> Arc<AxisModule> {
        let module = Arc::new(module);
        if let Some(old) = self
            .modules
            .insert(module.archive_name().to_string(), Arc::clone(&module))
        {
            tracing::warn!(module = %old.archive_name(), "module re-registered, entry replaced");
            self.unindex(&old);
        }
        tracing::info!(
            module = %module.archive_name(),
            namespaces = module.policy_namespaces().len(),
            "module registered"
        );
        for ns in module.policy_namespaces() {
            self.by_namespace
                .entry(ns.clone())
                .or_default()
                .push(Arc::clone(&module));
        }
        module
    }

    pub fn remove_module(&self, archive_name: &str) -> Option<Arc<AxisModule>> {
        let (_, module) = self.modules.remove(archive_name)?;
        self.unindex(&module);
        Some(module)
    }

    fn unindex(&self, module: &Arc<AxisModule>) {
        for ns in module.policy_namespaces() {
            if let Some(mut list) = self.by_namespace.get_mut(ns) {
                list.retain(|m| !Arc::ptr_eq(m, module));
            }
            self.by_namespace.remove_if(ns, |_, list| list.is_empty());
        }
    }

    /// Exact archive name, else the highest version registered under that
    /// logical name.
    pub fn module(&self, name: &str) -> Option<Arc<AxisModule>> {
        if let Some(m) = self.modules.get(name) {
            return Some(Arc::clone(m.value()));
        }
        self.modules
            .iter()
            .filter(|e| e.value().name() == name)
            .map(|e| Arc::clone(e.value()))
            .max_by(|a, b| a.version().cmp(&b.version()))
    }

    /// Like [`module`](Self::module) but a missing module is a fault.
    pub fn require(&self, name: &str) -> Result<Arc<AxisModule>> {
        self.module(name)
            .ok_or_else(|| AxisError::fault(MessageKey::ModuleNotFound, [name]))
    }

    /// Candidates for a policy namespace; `None` when no module governs it.
    pub fn modules_for_namespace(&self, namespace: &str) -> Option<Vec<Arc<AxisModule>>> {
        self.by_namespace
            .get(namespace)
            .map(|list| list.value().clone())
            .filter(|list| !list.is_empty())
    }

    pub fn modules(&self) -> Vec<Arc<AxisModule>> {
        self.modules.iter().map(|e| Arc::clone(e.value())).collect()
    }
}
