//! Policy merge utility.
//!
//! The engine treats merging as a black box behind [`PolicyMerger`] so tests
//! and embedders can substitute their own algebra.

use std::sync::Arc;

use crate::error::{AxisError, MessageKey, Result};
use crate::policy::model::{Policy, PolicyComponent, PolicyReference};

/// Resolves policy references on behalf of a context node.
pub trait ReferenceResolver {
    fn resolve(&self, reference: &PolicyReference) -> Option<Arc<Policy>>;

    /// Human readable context, used in faults.
    fn context(&self) -> String;
}

/// Merges attached components into one policy.
pub trait PolicyMerger: Send + Sync {
    /// `Ok(None)` when there is nothing to merge.
    fn merge(
        &self,
        components: &[PolicyComponent],
        resolver: &dyn ReferenceResolver,
    ) -> Result<Option<Policy>>;
}

/// Default merger: resolves references, then folds with [`Policy::merge`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AlternativeMerger;

impl PolicyMerger for AlternativeMerger {
    fn merge(
        &self,
        components: &[PolicyComponent],
        resolver: &dyn ReferenceResolver,
    ) -> Result<Option<Policy>> {
        let mut acc: Option<Policy> = None;
        for component in components {
            let policy = match component {
                PolicyComponent::Policy(p) => Arc::clone(p),
                PolicyComponent::Reference(r) => resolver.resolve(r).ok_or_else(|| {
                    AxisError::fault(
                        MessageKey::UnresolvedPolicyReference,
                        [r.uri().to_string(), resolver.context()],
                    )
                })?,
            };
            acc = Some(match acc {
                None => Policy::clone(&policy),
                Some(prev) => prev.merge(&policy),
            });
        }
        tracing::trace!(components = components.len(), "merged policy components");
        Ok(acc)
    }
}
