//! Module engagement: policy driven selection, version checks, idempotent
//! recording.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use axisdesc_core::error::{AxisError, MessageKey, Result};
use axisdesc_core::module::is_compatible;
use axisdesc_core::policy::Policy;

use crate::events::{AxisEvent, AxisEventKind};
use crate::module::AxisModule;
use crate::registry::ModuleRegistry;
use crate::tree::{DescriptionNode, DescriptionTree, NodeId};

/// Logical module names with an engagement or disengagement running on one
/// node, and the thread running it. Other threads wait for the claim to
/// settle; the owning thread asking again is a fault.
#[derive(Default)]
pub(crate) struct InFlight {
    names: Mutex<HashMap<String, ThreadId>>,
    settled: Condvar,
}

impl InFlight {
    /// Wait until no other thread holds `module`'s name. The returned guard
    /// keeps the check and the following claim atomic.
    fn settle(
        &self,
        node: &DescriptionNode,
        module: &AxisModule,
    ) -> Result<MutexGuard<'_, HashMap<String, ThreadId>>> {
        let me = thread::current().id();
        let mut names = self.names.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            match names.get(module.name()) {
                None => return Ok(names),
                Some(&owner) if owner == me => {
                    return Err(AxisError::fault(
                        MessageKey::EngagementInProgress,
                        [module.archive_name().to_string(), node.describe()],
                    ));
                }
                Some(_) => {
                    names = self
                        .settled
                        .wait(names)
                        .unwrap_or_else(PoisonError::into_inner);
                }
            }
        }
    }

    fn claim<'a>(
        &'a self,
        mut names: MutexGuard<'a, HashMap<String, ThreadId>>,
        name: &str,
    ) -> Claim<'a> {
        names.insert(name.to_string(), thread::current().id());
        Claim {
            in_flight: self,
            name: name.to_string(),
        }
    }
}

/// Releases a name claimed on [`InFlight`] and wakes the waiters.
struct Claim<'a> {
    in_flight: &'a InFlight,
    name: String,
}

impl Drop for Claim<'_> {
    fn drop(&mut self) {
        self.in_flight
            .names
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
        self.in_flight.settled.notify_all();
    }
}

fn require_engagement(node: &DescriptionNode, operation: &'static str) -> Result<()> {
    if node.kind().supports_engagement() {
        Ok(())
    } else {
        Err(AxisError::Unsupported {
            kind: node.kind().name(),
            operation,
        })
    }
}

impl DescriptionTree {
    /// Engage the modules called for by the first alternative of `policy`.
    ///
    /// Assertions whose namespace no module governs are skipped. For the
    /// others every candidate module must support the assertion, or the
    /// whole call fails before anything is engaged.
    pub fn engage_modules_for_policy(
        &self,
        id: NodeId,
        policy: &Policy,
        registry: &ModuleRegistry,
    ) -> Result<()> {
        let alternative = policy.first_alternative().ok_or_else(|| {
            AxisError::fault(MessageKey::NoPolicyAlternatives, [policy.display_key()])
        })?;

        let mut seen: HashSet<&str> = HashSet::new();
        let mut to_engage: Vec<Arc<AxisModule>> = Vec::new();
        for assertion in alternative.assertions() {
            let namespace = assertion.namespace();
            let Some(candidates) = registry.modules_for_namespace(namespace) else {
                tracing::debug!(
                    node = %id,
                    assertion = %assertion.name,
                    "no module governs assertion namespace; skipped"
                );
                continue;
            };
            let refusing = candidates.iter().find(|m| !m.can_support_assertion(assertion));
            if let Some(refusing) = refusing {
                return Err(AxisError::fault(
                    MessageKey::AssertionNotSupported,
                    [refusing.archive_name().to_string(), assertion.name.to_string()],
                ));
            }
            if seen.insert(namespace) {
                to_engage.extend(candidates);
            }
        }

        for module in &to_engage {
            if !self.is_module_engaged(id, module)? {
                self.engage_module(id, module)?;
            }
        }
        Ok(())
    }

    /// Engage `module` on `id` and notify observers.
    pub fn engage_module(&self, id: NodeId, module: &Arc<AxisModule>) -> Result<()> {
        if self.engage_module_from(id, module, id)? {
            self.notify_observers(AxisEvent::new(AxisEventKind::ModuleEngaged, id), module);
        }
        Ok(())
    }

    /// Engage on behalf of `engager` (an ancestor fanning out, or `id`
    /// itself). Returns `false` when the archive was already engaged.
    ///
    /// A module with the same logical name but another archive is torn down
    /// and replaced when the new version is compatible, and refused
    /// otherwise. Hooks run without the node lock held, so a module may
    /// engage its dependencies on the same node from `engage_notify`.
    pub fn engage_module_from(
        &self,
        id: NodeId,
        module: &Arc<AxisModule>,
        engager: NodeId,
    ) -> Result<bool> {
        let node = self.node(id)?;
        require_engagement(&node, "engage_module")?;

        let pending = node.in_flight.settle(&node, module)?;
        if node.engaged.contains_key(module.archive_name()) {
            tracing::debug!(node = %id, module = %module.archive_name(), "already engaged");
            return Ok(false);
        }

        let existing = node
            .engaged
            .iter()
            .find(|e| e.value().name() == module.name())
            .map(|e| Arc::clone(e.value()));
        if let Some(existing) = &existing {
            if !is_compatible(module.version(), existing.version()) {
                let version = existing
                    .version()
                    .map_or_else(String::new, |v| v.to_string());
                return Err(AxisError::fault(
                    MessageKey::MismatchedModuleVersions,
                    [node.kind().name().to_string(), module.name().to_string(), version],
                ));
            }
        }
        let _claim = node.in_flight.claim(pending, module.name());

        if let Some(implementation) = module.implementation() {
            implementation.engage_notify(self, id)?;
        }
        if let Some(existing) = &existing {
            self.tear_down(&node, existing)?;
            tracing::warn!(
                node = %id,
                replaced = %existing.archive_name(),
                module = %module.archive_name(),
                "module version replaced"
            );
        }
        node.kind().hooks().on_engage(self, id, module, engager)?;

        node.engaged.insert(module.archive_name().to_string(), Arc::clone(module));
        tracing::info!(
            node = %id,
            kind = node.kind().name(),
            module = %module.archive_name(),
            engager = %engager,
            "module engaged"
        );
        Ok(true)
    }

    /// Undo an engagement: per-kind hook, then the record, then the module's
    /// own notification.
    fn tear_down(&self, node: &DescriptionNode, module: &Arc<AxisModule>) -> Result<()> {
        node.kind().hooks().on_disengage(self, node.id(), module)?;
        node.engaged.remove(module.archive_name());
        if let Some(implementation) = module.implementation() {
            implementation.disengage_notify(self, node.id());
        }
        Ok(())
    }

    /// Engaged under this archive name, or any archive of this logical name.
    pub fn is_engaged(&self, id: NodeId, name: &str) -> Result<bool> {
        let node = self.node(id)?;
        require_engagement(&node, "is_engaged")?;
        Ok(node.engaged.contains_key(name)
            || node.engaged.iter().any(|e| e.value().name() == name))
    }

    /// Exact archive match.
    pub fn is_module_engaged(&self, id: NodeId, module: &AxisModule) -> Result<bool> {
        let node = self.node(id)?;
        require_engagement(&node, "is_engaged")?;
        Ok(node.engaged.contains_key(module.archive_name()))
    }

    pub fn engaged_modules(&self, id: NodeId) -> Result<Vec<Arc<AxisModule>>> {
        let node = self.node(id)?;
        require_engagement(&node, "engaged_modules")?;
        let mut modules: Vec<_> = node.engaged.iter().map(|e| Arc::clone(e.value())).collect();
        modules.sort_by(|a, b| a.archive_name().cmp(b.archive_name()));
        Ok(modules)
    }

    /// Disengage `module` if it is engaged on `id`, then notify observers.
    pub fn disengage_module(&self, id: NodeId, module: &Arc<AxisModule>) -> Result<()> {
        if self.disengage_module_quiet(id, module)? {
            self.notify_observers(AxisEvent::new(AxisEventKind::ModuleDisengaged, id), module);
        }
        Ok(())
    }

    pub(crate) fn disengage_module_quiet(
        &self,
        id: NodeId,
        module: &Arc<AxisModule>,
    ) -> Result<bool> {
        let node = self.node(id)?;
        require_engagement(&node, "disengage_module")?;

        let pending = node.in_flight.settle(&node, module)?;
        if !node.engaged.contains_key(module.archive_name()) {
            return Ok(false);
        }
        let _claim = node.in_flight.claim(pending, module.name());

        self.tear_down(&node, module)?;
        tracing::info!(node = %id, module = %module.archive_name(), "module disengaged");
        Ok(true)
    }
}
