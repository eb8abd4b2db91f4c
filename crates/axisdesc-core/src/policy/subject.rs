//! Per-node set of attached policy components.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use uuid::Uuid;

use crate::clock::Timestamp;
use crate::policy::model::{Policy, PolicyComponent, PolicyReference};

struct SubjectState {
    components: HashMap<String, PolicyComponent>,
    last_updated: Timestamp,
    updated: bool,
}

/// Attached policies and references of one node. Every mutation refreshes
/// `last_updated` and sets the `updated` flag, which is never cleared here.
pub struct PolicySubject {
    state: RwLock<SubjectState>,
}

impl Default for PolicySubject {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicySubject {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SubjectState {
                components: HashMap::new(),
                last_updated: Timestamp::now(),
                updated: false,
            }),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, SubjectState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, SubjectState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn touch(state: &mut SubjectState) {
        state.last_updated = Timestamp::now();
        state.updated = true;
    }

    /// Attach keyed by name, else id, else a generated id written back onto
    /// the policy. Returns the key used.
    pub fn attach_policy(&self, mut policy: Policy) -> String {
        let key = match policy.key() {
            Some(k) => k.to_string(),
            None => {
                let id = format!("urn:uuid:{}", Uuid::new_v4());
                policy.set_id(id.clone());
                id
            }
        };
        self.insert(key.clone(), PolicyComponent::Policy(Arc::new(policy)));
        key
    }

    /// Attach keyed by URI; the reference is resolved only when merged.
    pub fn attach_policy_reference(&self, reference: PolicyReference) -> String {
        let key = reference.uri().to_string();
        self.insert(key.clone(), PolicyComponent::Reference(reference));
        key
    }

    pub fn attach_policy_component(&self, component: PolicyComponent) -> String {
        match component {
            PolicyComponent::Policy(p) => self.attach_policy(Policy::clone(&p)),
            PolicyComponent::Reference(r) => self.attach_policy_reference(r),
        }
    }

    pub fn attach_policy_components(&self, components: impl IntoIterator<Item = PolicyComponent>) {
        for c in components {
            self.attach_policy_component(c);
        }
    }

    /// Replace the component stored under the policy's key.
    pub fn update_policy(&self, policy: Policy) -> String {
        self.attach_policy(policy)
    }

    fn insert(&self, key: String, component: PolicyComponent) {
        let mut st = self.write();
        st.components.insert(key, component);
        Self::touch(&mut st);
    }

    pub fn attached_policy_component(&self, key: &str) -> Option<PolicyComponent> {
        self.read().components.get(key).cloned()
    }

    /// Snapshot of the current components (order not significant).
    pub fn attached_policy_components(&self) -> Vec<PolicyComponent> {
        self.read().components.values().cloned().collect()
    }

    pub fn detach_policy_component(&self, key: &str) -> Option<PolicyComponent> {
        let mut st = self.write();
        let removed = st.components.remove(key);
        Self::touch(&mut st);
        removed
    }

    pub fn clear(&self) {
        let mut st = self.write();
        st.components.clear();
        Self::touch(&mut st);
    }

    pub fn is_empty(&self) -> bool {
        self.read().components.is_empty()
    }

    pub fn last_updated(&self) -> Timestamp {
        self.read().last_updated
    }

    pub fn is_updated(&self) -> bool {
        self.read().updated
    }
}
