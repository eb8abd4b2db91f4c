#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::thread;

use axisdesc_core::parameter::{Parameter, ParameterStore};
use axisdesc_core::policy::{
    AlternativeMerger, Assertion, Policy, PolicyComponent, PolicyMerger, PolicyReference,
    PolicySubject, QName, ReferenceResolver,
};

struct NoReferences;

impl ReferenceResolver for NoReferences {
    fn resolve(&self, _reference: &PolicyReference) -> Option<Arc<Policy>> {
        None
    }
    fn context(&self) -> String {
        "test".into()
    }
}

#[test]
fn generated_ids_are_unique_and_written_back() {
    let subject = PolicySubject::new();
    let a = subject.attach_policy(Policy::new());
    let b = subject.attach_policy(Policy::new());
    assert_ne!(a, b);
    assert!(a.starts_with("urn:uuid:"));

    match subject.attached_policy_component(&a) {
        Some(PolicyComponent::Policy(p)) => assert_eq!(p.id(), Some(a.as_str())),
        other => panic!("unexpected component: {other:?}"),
    }
}

#[test]
fn same_key_overwrites_and_every_mutation_advances_time() {
    let subject = PolicySubject::new();
    assert!(!subject.is_updated());

    let t0 = subject.last_updated();
    subject.attach_policy(Policy::new().with_id("p1"));
    let t1 = subject.last_updated();
    subject.attach_policy(Policy::new().with_id("p1"));
    let t2 = subject.last_updated();
    subject.attach_policy_reference(PolicyReference::new("#p2"));
    let t3 = subject.last_updated();

    assert!(t1.is_after(t0) && t2.is_after(t1) && t3.is_after(t2));
    assert_eq!(subject.attached_policy_components().len(), 2);
    assert!(subject.is_updated());

    subject.clear();
    assert!(subject.is_empty());
    assert!(subject.last_updated().is_after(t3));
    assert!(subject.is_updated());
}

#[test]
fn merging_attached_components() {
    let subject = PolicySubject::new();
    let q = |l: &str| QName::new("urn:t", l);
    subject.attach_policy(Policy::with_assertions([Assertion::new(q("A"))]).with_id("a"));
    subject.attach_policy(Policy::with_assertions([Assertion::new(q("B"))]).with_id("b"));

    let merged = AlternativeMerger
        .merge(&subject.attached_policy_components(), &NoReferences)
        .unwrap()
        .unwrap();
    assert_eq!(merged.alternatives().len(), 1);
    assert!(merged.contains_assertion(&q("A")));
    assert!(merged.contains_assertion(&q("B")));
}

#[test]
fn readers_never_see_partial_parameter_writes() {
    let store = Arc::new(ParameterStore::new());
    thread::scope(|s| {
        for t in 0..4 {
            let store = Arc::clone(&store);
            s.spawn(move || {
                for i in 0..100 {
                    store.add(Parameter::new(format!("p{t}-{i}"), format!("{i}")));
                }
            });
        }
        for _ in 0..4 {
            let store = Arc::clone(&store);
            s.spawn(move || {
                for _ in 0..100 {
                    for p in store.parameters() {
                        let (_, i) = p.name().split_once('-').unwrap();
                        assert_eq!(p.value().as_text(), Some(i));
                    }
                }
            });
        }
    });
    assert_eq!(store.parameters().len(), 400);
}
