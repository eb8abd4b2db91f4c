#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use axisdesc_core::error::{AxisError, ErrorCode, MessageKey, Result};
use axisdesc_core::module::HandlerDescription;
use axisdesc_core::policy::{Alternative, Assertion, Policy, QName};
use axisdesc_core::wsdl::{Direction, Mep};
use axisdesc_engine::{
    AxisEvent, AxisEventKind, AxisModule, AxisObserver, DescriptionTree, Module, NodeId,
};

const WSA: &str = "http://www.w3.org/2006/05/addressing/wsdl";
const SP: &str = "http://schemas.xmlsoap.org/ws/2005/07/securitypolicy";

#[derive(Default)]
struct Counting {
    engaged: AtomicUsize,
    disengaged: AtomicUsize,
    refuse: Option<&'static str>,
}

impl Module for Counting {
    fn engage_notify(&self, _tree: &DescriptionTree, _node: NodeId) -> Result<()> {
        self.engaged.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn disengage_notify(&self, _tree: &DescriptionTree, _node: NodeId) {
        self.disengaged.fetch_add(1, Ordering::SeqCst);
    }

    fn can_support_assertion(&self, assertion: &Assertion) -> bool {
        self.refuse != Some(assertion.name.local.as_str())
    }
}

struct Refusing;

impl Module for Refusing {
    fn engage_notify(&self, tree: &DescriptionTree, node: NodeId) -> Result<()> {
        Err(AxisError::fault(
            MessageKey::EngagementRefused,
            ["refusing".to_string(), tree.describe(node), "no licence".to_string()],
        ))
    }
}

/// Engages another module on the same node before accepting its own.
struct Depends(Arc<AxisModule>);

impl Module for Depends {
    fn engage_notify(&self, tree: &DescriptionTree, node: NodeId) -> Result<()> {
        tree.engage_module(node, &self.0)
    }
}

#[derive(Default)]
struct Events(Mutex<Vec<(AxisEventKind, NodeId, String)>>);

impl AxisObserver for Events {
    fn module_update(&self, event: &AxisEvent, module: &AxisModule) {
        self.0
            .lock()
            .unwrap()
            .push((event.kind, event.node, module.archive_name().to_string()));
    }
}

struct Fixture {
    tree: DescriptionTree,
    service: NodeId,
    operation: NodeId,
    msg_in: NodeId,
    msg_out: NodeId,
}

fn fixture() -> Fixture {
    let tree = DescriptionTree::new();
    let group = tree.add_service_group("g").unwrap();
    let service = tree.add_service(group, "Echo").unwrap();
    let operation = tree
        .add_operation(service, QName::new("urn:echo", "echo"), Mep::InOut)
        .unwrap();
    let msg_in = tree.add_message(operation, Direction::In).unwrap();
    let msg_out = tree.add_message(operation, Direction::Out).unwrap();
    Fixture {
        tree,
        service,
        operation,
        msg_in,
        msg_out,
    }
}

fn addressing(version: &str) -> AxisModule {
    AxisModule::new("addressing")
        .with_version(version.parse().unwrap())
        .supporting(WSA)
        .with_handler(HandlerDescription::new("AddressingIn", "Addressing", Direction::In))
        .with_handler(HandlerDescription::new("AddressingOut", "Addressing", Direction::Out))
}

fn addressing_in(version: &str, handler: &str) -> AxisModule {
    AxisModule::new("addressing")
        .with_version(version.parse().unwrap())
        .supporting(WSA)
        .with_handler(HandlerDescription::new(handler, "Addressing", Direction::In))
}

fn addressing_phase(tree: &DescriptionTree, msg: NodeId) -> Vec<String> {
    tree.message_flow(msg)
        .into_iter()
        .find(|p| p.name == "Addressing")
        .map(|p| p.handlers)
        .unwrap_or_default()
}

fn assertion(ns: &str, local: &str) -> Assertion {
    Assertion::new(QName::new(ns, local))
}

#[test]
fn engaging_twice_is_a_no_op() {
    let f = fixture();
    let counter = Arc::new(Counting::default());
    let module = Arc::new(addressing("1.0").with_implementation(counter.clone()));
    let events = Arc::new(Events::default());
    f.tree.add_observer(events.clone());

    f.tree.engage_module(f.msg_in, &module).unwrap();
    f.tree.engage_module(f.msg_in, &module).unwrap();

    assert_eq!(counter.engaged.load(Ordering::SeqCst), 1);
    assert_eq!(events.0.lock().unwrap().len(), 1);
    assert_eq!(f.tree.engaged_modules(f.msg_in).unwrap().len(), 1);
    let flow = f.tree.message_flow(f.msg_in);
    let phase = flow.iter().find(|p| p.name == "Addressing").unwrap();
    assert_eq!(phase.handlers, vec!["AddressingIn".to_string()]);
}

#[test]
fn compatible_upgrade_replaces_the_engaged_version() {
    let f = fixture();
    let v10 = Arc::new(addressing("1.0"));
    let v11 = Arc::new(addressing("1.1"));

    f.tree.engage_module(f.service, &v10).unwrap();
    f.tree.engage_module(f.service, &v11).unwrap();

    let engaged = f.tree.engaged_modules(f.service).unwrap();
    assert_eq!(engaged.len(), 1);
    assert_eq!(engaged[0].archive_name(), "addressing-1.1");
    assert!(f.tree.is_engaged(f.service, "addressing").unwrap());
    assert!(f.tree.is_engaged(f.service, "addressing-1.1").unwrap());
    assert!(!f.tree.is_engaged(f.service, "addressing-1.0").unwrap());

    // Fan-out reached the operation, which was upgraded the same way.
    let on_op = f.tree.engaged_modules(f.operation).unwrap();
    assert_eq!(on_op.len(), 1);
    assert_eq!(on_op[0].archive_name(), "addressing-1.1");
}

#[test]
fn upgrade_tears_down_the_replaced_version() {
    let f = fixture();
    let old = Arc::new(Counting::default());
    let v10 = Arc::new(addressing_in("1.0", "AddrIn10").with_implementation(old.clone()));
    let v11 = Arc::new(addressing_in("1.1", "AddrIn11"));

    f.tree.engage_module(f.service, &v10).unwrap();
    assert_eq!(addressing_phase(&f.tree, f.msg_in), vec!["AddrIn10".to_string()]);

    f.tree.engage_module(f.service, &v11).unwrap();
    assert_eq!(addressing_phase(&f.tree, f.msg_in), vec!["AddrIn11".to_string()]);
    // Service and operation both let go of 1.0.
    assert_eq!(old.disengaged.load(Ordering::SeqCst), 2);

    f.tree.disengage_module(f.service, &v11).unwrap();
    assert!(addressing_phase(&f.tree, f.msg_in).is_empty());
    assert!(!f.tree.is_engaged(f.service, "addressing").unwrap());
    assert!(!f.tree.is_engaged(f.operation, "addressing").unwrap());
}

#[test]
fn module_may_engage_a_dependency_on_the_same_node() {
    let f = fixture();
    let rampart = Arc::new(
        AxisModule::new("rampart")
            .supporting(SP)
            .with_implementation(Arc::new(Depends(Arc::new(addressing("1.0"))))),
    );

    f.tree.engage_module(f.service, &rampart).unwrap();

    assert!(f.tree.is_engaged(f.service, "rampart").unwrap());
    assert!(f.tree.is_engaged(f.service, "addressing-1.0").unwrap());
    assert!(f.tree.is_engaged(f.operation, "rampart").unwrap());
}

#[test]
fn re_entering_the_same_module_name_is_a_fault() {
    let f = fixture();
    let outer = Arc::new(
        addressing("1.1").with_implementation(Arc::new(Depends(Arc::new(addressing("1.0"))))),
    );

    let err = f.tree.engage_module(f.msg_in, &outer).unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::EngagementInProgress));
    assert!(!f.tree.is_engaged(f.msg_in, "addressing").unwrap());

    // The claim was released: a plain engagement goes through afterwards.
    f.tree
        .engage_module(f.msg_in, &Arc::new(addressing("1.0")))
        .unwrap();
    assert!(f.tree.is_engaged(f.msg_in, "addressing-1.0").unwrap());
}

#[test]
fn concurrent_engagements_run_the_hooks_once() {
    let f = fixture();
    let counter = Arc::new(Counting::default());
    let module = Arc::new(addressing("1.0").with_implementation(counter.clone()));

    let threads = 8;
    let barrier = Barrier::new(threads);
    thread::scope(|s| {
        for _ in 0..threads {
            s.spawn(|| {
                barrier.wait();
                f.tree.engage_module(f.service, &module).unwrap();
            });
        }
    });

    // Once on the service, once through fan-out on the operation.
    assert_eq!(counter.engaged.load(Ordering::SeqCst), 2);
    assert_eq!(addressing_phase(&f.tree, f.msg_in), vec!["AddressingIn".to_string()]);
}

#[test]
fn downgrade_is_a_version_mismatch() {
    let f = fixture();
    f.tree
        .engage_module(f.service, &Arc::new(addressing("1.1")))
        .unwrap();

    let err = f
        .tree
        .engage_module(f.service, &Arc::new(addressing("1.0")))
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::MismatchedModuleVersions));
    match &err {
        AxisError::Fault(fault) => {
            assert_eq!(fault.args, vec!["Service", "addressing", "1.1"]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(f.tree.is_engaged(f.service, "addressing-1.1").unwrap());
}

#[test]
fn unversioned_request_conflicts_with_versioned_engagement() {
    let f = fixture();
    f.tree
        .engage_module(f.msg_in, &Arc::new(addressing("1.0")))
        .unwrap();
    let unversioned = Arc::new(AxisModule::new("addressing").supporting(WSA));
    let err = f.tree.engage_module(f.msg_in, &unversioned).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Configuration);

    // The other way round is accepted.
    f.tree.engage_module(f.msg_out, &unversioned).unwrap();
    f.tree
        .engage_module(f.msg_out, &Arc::new(addressing("1.0")))
        .unwrap();
    assert!(f.tree.is_engaged(f.msg_out, "addressing-1.0").unwrap());
}

#[test]
fn refused_engagement_leaves_nothing_behind() {
    let f = fixture();
    let module = Arc::new(AxisModule::new("refusing").with_implementation(Arc::new(Refusing)));
    let err = f.tree.engage_module(f.operation, &module).unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::EngagementRefused));
    assert!(!f.tree.is_engaged(f.operation, "refusing").unwrap());
}

#[test]
fn policy_engages_modules_per_namespace_once() {
    let f = fixture();
    let registry = f.tree.module_registry();
    let counter = Arc::new(Counting::default());
    registry.add_module(addressing("1.0").with_implementation(counter.clone()));

    let policy = Policy::with_assertions([
        assertion(WSA, "UsingAddressing"),
        assertion(WSA, "Anonymous"),
        assertion("urn:nobody", "Ignored"),
    ]);
    f.tree
        .engage_modules_for_policy(f.msg_in, &policy, registry)
        .unwrap();

    assert!(f.tree.is_engaged(f.msg_in, "addressing").unwrap());
    assert_eq!(counter.engaged.load(Ordering::SeqCst), 1);
}

#[test]
fn first_alternative_wins() {
    let f = fixture();
    let registry = f.tree.module_registry();
    registry.add_module(addressing("1.0"));
    registry.add_module(AxisModule::new("rampart").supporting(SP));

    let policy = Policy::from_alternatives([
        Alternative::new([assertion(SP, "SignedParts")]),
        Alternative::new([assertion(WSA, "UsingAddressing")]),
    ]);
    f.tree
        .engage_modules_for_policy(f.msg_in, &policy, registry)
        .unwrap();

    assert!(f.tree.is_engaged(f.msg_in, "rampart").unwrap());
    assert!(!f.tree.is_engaged(f.msg_in, "addressing").unwrap());
}

#[test]
fn policy_without_alternatives_is_fatal() {
    let f = fixture();
    let err = f
        .tree
        .engage_modules_for_policy(f.msg_in, &Policy::unsatisfiable(), f.tree.module_registry())
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::NoPolicyAlternatives));
}

#[test]
fn one_unsupported_assertion_blocks_the_whole_candidate_set() {
    let f = fixture();
    let registry = f.tree.module_registry();
    registry.add_module(AxisModule::new("rampart").supporting(SP));
    registry.add_module(
        AxisModule::new("sandesha")
            .supporting(SP)
            .with_implementation(Arc::new(Counting {
                refuse: Some("EncryptedParts"),
                ..Counting::default()
            })),
    );

    let policy = Policy::with_assertions([
        assertion(SP, "SignedParts"),
        assertion(SP, "EncryptedParts"),
    ]);
    let err = f
        .tree
        .engage_modules_for_policy(f.msg_in, &policy, registry)
        .unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::AssertionNotSupported));
    assert!(f.tree.engaged_modules(f.msg_in).unwrap().is_empty());
}

#[test]
fn binding_side_nodes_reject_engagement() {
    let f = fixture();
    let endpoint = f.tree.add_endpoint(f.service, "EchoSoap12", None).unwrap();
    let binding = f
        .tree
        .set_binding(endpoint, QName::local("EchoBinding"), "soap12")
        .unwrap();
    let binding_op = f
        .tree
        .add_binding_operation(binding, QName::new("urn:echo", "echo"))
        .unwrap();
    let binding_msg = f.tree.add_binding_message(binding_op, Direction::In).unwrap();
    let module = Arc::new(addressing("1.0"));

    for id in [endpoint, binding, binding_op, binding_msg] {
        let err = f.tree.engage_module(id, &module).unwrap_err();
        assert_eq!(err.code(), ErrorCode::UnsupportedOperation);
        assert_eq!(
            f.tree.is_engaged(id, "addressing").unwrap_err().code(),
            ErrorCode::UnsupportedOperation
        );
        assert!(f.tree.disengage_module(id, &module).is_err());
    }
}

#[test]
fn operation_engagement_splices_both_messages() {
    let f = fixture();
    let module = Arc::new(addressing("1.0"));
    f.tree.engage_module(f.operation, &module).unwrap();

    for (msg, handler) in [(f.msg_in, "AddressingIn"), (f.msg_out, "AddressingOut")] {
        let flow = f.tree.message_flow(msg);
        let phase = flow.iter().find(|p| p.name == "Addressing").unwrap();
        assert_eq!(phase.handlers, vec![handler.to_string()]);
    }
}

#[test]
fn unknown_phase_aborts_engagement() {
    let f = fixture();
    let module = Arc::new(
        AxisModule::new("odd")
            .with_handler(HandlerDescription::new("OddIn", "Nowhere", Direction::In)),
    );
    let err = f.tree.engage_module(f.msg_in, &module).unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::InvalidPhase));
    assert!(!f.tree.is_engaged(f.msg_in, "odd").unwrap());
}

#[test]
fn disengage_is_symmetric() {
    let f = fixture();
    let counter = Arc::new(Counting::default());
    let module = Arc::new(addressing("1.0").with_implementation(counter.clone()));
    let events = Arc::new(Events::default());
    f.tree.add_observer(events.clone());

    f.tree.engage_module(f.service, &module).unwrap();
    f.tree.disengage_module(f.service, &module).unwrap();
    f.tree.disengage_module(f.service, &module).unwrap();

    assert!(!f.tree.is_engaged(f.service, "addressing").unwrap());
    assert!(!f.tree.is_engaged(f.operation, "addressing").unwrap());
    assert!(f
        .tree
        .message_flow(f.msg_in)
        .iter()
        .all(|p| p.handlers.is_empty()));

    let events = events.0.lock().unwrap();
    let kinds: Vec<_> = events.iter().map(|(k, n, _)| (*k, *n)).collect();
    assert_eq!(
        kinds,
        vec![
            (AxisEventKind::ModuleEngaged, f.service),
            (AxisEventKind::ModuleDisengaged, f.service),
        ]
    );
    // Service and operation each saw the module come and go.
    assert_eq!(counter.engaged.load(Ordering::SeqCst), 2);
    assert_eq!(counter.disengaged.load(Ordering::SeqCst), 2);
}

#[test]
fn apply_policy_engages_per_message_and_stops_on_failure() {
    let f = fixture();
    let registry = f.tree.module_registry();
    registry.add_module(addressing("1.0"));
    registry.add_module(
        AxisModule::new("rampart")
            .supporting(SP)
            .with_implementation(Arc::new(Counting {
                refuse: Some("Kerberos"),
                ..Counting::default()
            })),
    );

    f.tree
        .apply_policy_with(
            f.operation,
            Policy::with_assertions([assertion(WSA, "UsingAddressing")]),
        )
        .unwrap();
    assert!(f.tree.is_engaged(f.msg_in, "addressing").unwrap());
    assert!(f.tree.is_engaged(f.msg_out, "addressing").unwrap());
    // Only messages carry an applicable policy.
    assert!(!f.tree.is_engaged(f.operation, "addressing").unwrap());

    f.tree
        .node(f.msg_out)
        .unwrap()
        .policy_subject()
        .attach_policy(Policy::with_assertions([assertion(SP, "Kerberos")]));
    let err = f.tree.apply_policy(f.tree.root()).unwrap_err();
    assert_eq!(err.message_key(), Some(MessageKey::AssertionNotSupported));
    // Earlier engagements are kept.
    assert!(f.tree.is_engaged(f.msg_in, "addressing").unwrap());
}
