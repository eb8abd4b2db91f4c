//! Cached effective policy per node.

use std::sync::{Arc, Mutex, PoisonError, RwLock};

use axisdesc_core::clock::Timestamp;
use axisdesc_core::error::Result;
use axisdesc_core::policy::{Policy, PolicyComponent};

use super::ContextResolver;
use crate::tree::{DescriptionTree, NodeId, NodeKind};

#[derive(Default)]
struct CacheState {
    value: Option<Arc<Policy>>,
    computed_at: Option<Timestamp>,
    axis: Vec<NodeId>,
}

/// `{value, computed_at}` plus the axis it was computed over. Readers take
/// the read lock only; recomputation is serialized by `recompute`.
#[derive(Default)]
pub(crate) struct EffectivePolicyCache {
    state: RwLock<CacheState>,
    recompute: Mutex<()>,
}

impl DescriptionTree {
    /// Nodes whose attached policies make up `id`'s effective policy, in
    /// merge order. Levels that are not attached yet are skipped.
    pub fn policy_axis(&self, id: NodeId) -> Vec<NodeId> {
        let Ok(node) = self.node(id) else {
            return Vec::new();
        };
        let config = |n: Option<NodeId>| n.and_then(|n| self.configuration_of(n));
        let levels: Vec<Option<NodeId>> = match node.kind() {
            NodeKind::Configuration(_) => vec![Some(id)],
            NodeKind::ServiceGroup(_) | NodeKind::Service(_) => {
                vec![Some(id), config(Some(id))]
            }
            NodeKind::Operation(_) => {
                let service = self.parent(id);
                vec![Some(id), service, config(service)]
            }
            NodeKind::Message(_) => {
                let operation = self.parent(id);
                let service = operation.and_then(|o| self.parent(o));
                vec![Some(id), operation, service, config(service)]
            }
            NodeKind::Endpoint(_) => {
                let service = self.parent(id);
                vec![Some(id), service, config(service)]
            }
            NodeKind::Binding(_) => {
                let endpoint = self.parent(id);
                let service = endpoint.and_then(|e| self.parent(e));
                vec![Some(id), endpoint, service, config(service)]
            }
            NodeKind::BindingOperation(_) => {
                let binding = self.parent(id);
                let endpoint = binding.and_then(|b| self.parent(b));
                let operation = self.operation_of(id);
                let service = operation
                    .and_then(|o| self.parent(o))
                    .or_else(|| endpoint.and_then(|e| self.parent(e)));
                vec![
                    Some(id),
                    binding,
                    endpoint,
                    operation,
                    service,
                    config(service),
                ]
            }
            NodeKind::BindingMessage(_) => {
                let binding_operation = self.parent(id);
                let binding = binding_operation.and_then(|b| self.parent(b));
                let endpoint = binding.and_then(|b| self.parent(b));
                let message = self.message_of(id);
                let operation = message
                    .and_then(|m| self.parent(m))
                    .or_else(|| binding_operation.and_then(|b| self.operation_of(b)));
                let service = operation
                    .and_then(|o| self.parent(o))
                    .or_else(|| endpoint.and_then(|e| self.parent(e)));
                vec![
                    Some(id),
                    binding_operation,
                    binding,
                    endpoint,
                    message,
                    operation,
                    service,
                    config(service),
                ]
            }
        };
        let mut axis: Vec<NodeId> = Vec::with_capacity(levels.len());
        for level in levels.into_iter().flatten() {
            if !axis.contains(&level) {
                axis.push(level);
            }
        }
        axis
    }

    /// Merged policy of every subject on the node's axis, recomputed only
    /// when one of them changed since the last computation.
    pub fn effective_policy(&self, id: NodeId) -> Result<Option<Arc<Policy>>> {
        let node = self.node(id)?;
        let cache = &node.effective;

        let axis = self.policy_axis(id);
        if let Some(value) = self.fresh_value(cache, &axis) {
            tracing::trace!(node = %id, "effective policy cache hit");
            return Ok(value);
        }

        let _guard = cache
            .recompute
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have finished while we waited.
        let axis = self.policy_axis(id);
        if let Some(value) = self.fresh_value(cache, &axis) {
            return Ok(value);
        }

        let started = Timestamp::now();
        let mut components: Vec<PolicyComponent> = Vec::new();
        for level in &axis {
            components.extend(self.node(*level)?.policy.attached_policy_components());
        }
        let merged = self
            .merger
            .merge(&components, &ContextResolver::new(self, id))?
            .map(Arc::new);
        let finished = Timestamp::now();

        // An attach that raced with the merge keeps the cache stale.
        let raced = axis.iter().any(|level| {
            self.node(*level)
                .map(|n| n.policy.last_updated().is_after(started))
                .unwrap_or(false)
        });
        let computed_at = if raced { started } else { finished };

        tracing::debug!(
            node = %id,
            levels = axis.len(),
            components = components.len(),
            "effective policy recomputed"
        );

        let mut state = cache.state.write().unwrap_or_else(PoisonError::into_inner);
        state.value = merged.clone();
        state.computed_at = Some(computed_at);
        state.axis = axis;
        Ok(merged)
    }

    /// True when the cache is empty, the axis changed shape, or any subject
    /// on the axis was modified after the cached computation.
    pub fn is_policy_updated(&self, id: NodeId) -> bool {
        let Ok(node) = self.node(id) else {
            return false;
        };
        let axis = self.policy_axis(id);
        self.fresh_value(&node.effective, &axis).is_none()
    }

    fn fresh_value(
        &self,
        cache: &EffectivePolicyCache,
        axis: &[NodeId],
    ) -> Option<Option<Arc<Policy>>> {
        let state = cache.state.read().unwrap_or_else(PoisonError::into_inner);
        let computed_at = state.computed_at?;
        if state.axis != axis {
            return None;
        }
        let stale = axis.iter().any(|level| {
            self.node(*level)
                .map(|n| n.policy.last_updated().is_after(computed_at))
                .unwrap_or(false)
        });
        if stale {
            None
        } else {
            Some(state.value.clone())
        }
    }
}
