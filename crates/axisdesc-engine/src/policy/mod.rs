//! Effective policy resolution and policy application over the tree.

mod apply;
mod cache;

use std::sync::Arc;

use axisdesc_core::policy::{Policy, PolicyReference, ReferenceResolver};

use crate::tree::{DescriptionTree, NodeId};

pub(crate) use cache::EffectivePolicyCache;

/// Resolves policy references for a context node.
pub trait PolicyLocator: Send + Sync {
    fn locate(
        &self,
        tree: &DescriptionTree,
        context: NodeId,
        reference: &PolicyReference,
    ) -> Option<Arc<Policy>>;
}

/// Looks the reference up in the policy registries of the context node and
/// then of each ancestor. `#name` and `name` address the same entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistryLocator;

impl PolicyLocator for RegistryLocator {
    fn locate(
        &self,
        tree: &DescriptionTree,
        context: NodeId,
        reference: &PolicyReference,
    ) -> Option<Arc<Policy>> {
        let key = reference.local_key();
        std::iter::once(context)
            .chain(tree.ancestors(context))
            .find_map(|id| tree.registered_policy(id, key))
    }
}

/// Binds the tree's locator to one context node for the merge utility.
pub(crate) struct ContextResolver<'a> {
    tree: &'a DescriptionTree,
    context: NodeId,
}

impl<'a> ContextResolver<'a> {
    pub(crate) fn new(tree: &'a DescriptionTree, context: NodeId) -> Self {
        Self { tree, context }
    }
}

impl ReferenceResolver for ContextResolver<'_> {
    fn resolve(&self, reference: &PolicyReference) -> Option<Arc<Policy>> {
        self.tree.locator.locate(self.tree, self.context, reference)
    }

    fn context(&self) -> String {
        self.tree.describe(self.context)
    }
}
