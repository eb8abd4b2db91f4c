#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use axisdesc_core::error::{ErrorCode, MessageKey};
use axisdesc_core::policy::QName;
use axisdesc_engine::config;
use axisdesc_engine::report::TreeReport;
use axisdesc_engine::{ChildKey, DescriptionTree, NodeId};

const SAMPLE: &str = include_str!("../../../axisdesc.yaml");

fn service(tree: &DescriptionTree) -> NodeId {
    let group = tree.child(tree.root(), &"echo-group".into()).expect("group");
    tree.child(group, &"Echo".into()).expect("service")
}

fn echo_message(tree: &DescriptionTree, label: &str) -> NodeId {
    let op = tree
        .child(
            service(tree),
            &ChildKey::QName(QName::new("http://sample.echo", "echo")),
        )
        .expect("operation");
    tree.child(op, &label.into()).expect("message")
}

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
service_groups:
  - name: g
    services:
      - name: Echo
        operashuns: []
"#;
    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_DESCRIPTOR");
}

#[test]
fn sample_descriptor_builds() {
    let cfg = config::load_from_str(SAMPLE).expect("sample must parse");
    let tree = config::build_tree(&cfg).expect("sample must build");

    let svc = service(&tree);
    assert_eq!(tree.endpoint_name(svc).as_deref(), Some("EchoHttpsSoap12Endpoint"));
    assert_eq!(
        tree.documentation(svc).as_deref(),
        Some("Echoes the request payload.")
    );
    let class = tree.parameter(svc, "ServiceClass").unwrap();
    assert!(class.is_editable());
    let inherited = tree.parameter(svc, "hotdeployment").unwrap();
    assert!(!inherited.is_editable());
    assert!(tree.is_parameter_locked(svc, "hotdeployment"));
}

#[test]
fn applying_policy_engages_through_the_binding() {
    let cfg = config::load_from_str(SAMPLE).unwrap();
    let tree = config::build_tree(&cfg).unwrap();
    tree.apply_policy(tree.root()).unwrap();

    // The In message resolves through its binding message, which adds the
    // signing policy by reference.
    let msg_in = echo_message(&tree, "In");
    assert!(tree.is_engaged(msg_in, "addressing").unwrap());
    assert!(tree.is_engaged(msg_in, "rampart-1.6.1").unwrap());

    let msg_out = echo_message(&tree, "Out");
    assert!(tree.is_engaged(msg_out, "addressing").unwrap());
    assert!(!tree.is_engaged(msg_out, "rampart").unwrap());

    let security = tree
        .message_flow(msg_in)
        .into_iter()
        .find(|p| p.name == "Security")
        .unwrap();
    assert_eq!(security.handlers, vec!["RampartReceiver".to_string()]);

    let json = TreeReport::collect(&tree).unwrap().to_json().unwrap();
    assert!(json.contains("rampart-1.6.1"));
    assert!(json.contains("AddressingInHandler"));
}

#[test]
fn locked_parameter_cannot_be_overridden_in_a_descriptor() {
    let yaml = r#"
version: 1
parameters:
  - { name: hotdeployment, value: "false", locked: true }
service_groups:
  - name: g
    parameters:
      - { name: hotdeployment, value: "true" }
"#;
    let cfg = config::load_from_str(yaml).unwrap();
    let err = config::build_tree(&cfg).err().expect("must fail");
    assert_eq!(err.message_key(), Some(MessageKey::ParameterLockedByParent));
}

#[test]
fn refused_assertion_fails_deployment() {
    let yaml = r#"
version: 1
policies:
  - name: kerberos
    alternatives:
      - - { namespace: "urn:sp", local: KerberosToken }
modules:
  - name: rampart
    namespaces: ["urn:sp"]
    refuses: ["{urn:sp}KerberosToken"]
service_groups:
  - name: g
    services:
      - name: Secure
        policies: [kerberos]
        operations:
          - name: op
            messages:
              - { direction: in }
"#;
    let cfg = config::load_from_str(yaml).unwrap();
    let tree = config::build_tree(&cfg).unwrap();
    let err = tree.apply_policy(tree.root()).unwrap_err();
    assert_eq!(err.code(), ErrorCode::Configuration);
    assert_eq!(err.message_key(), Some(MessageKey::AssertionNotSupported));
}

#[test]
fn engage_lists_fan_out() {
    let yaml = r#"
version: 1
modules:
  - name: logging
    version: "2.0"
    handlers:
      - { name: LogIn, phase: Transport, flow: in }
engage: [logging]
service_groups:
  - name: g
    services:
      - name: Echo
        operations:
          - name: echo
            messages:
              - { direction: in }
"#;
    let cfg = config::load_from_str(yaml).unwrap();
    let tree = config::build_tree(&cfg).unwrap();

    let group = tree.child(tree.root(), &"g".into()).unwrap();
    let svc = tree.child(group, &"Echo".into()).unwrap();
    let op = tree.child(svc, &ChildKey::QName(QName::local("echo"))).unwrap();
    for id in [tree.root(), group, svc, op] {
        assert!(tree.is_engaged(id, "logging").unwrap(), "{}", tree.describe(id));
    }
    let msg = tree.child(op, &"In".into()).unwrap();
    let transport = tree
        .message_flow(msg)
        .into_iter()
        .find(|p| p.name == "Transport")
        .unwrap();
    assert_eq!(transport.handlers, vec!["LogIn".to_string()]);
}

#[test]
fn module_versions_deploy_side_by_side() {
    let yaml = r#"
version: 1
modules:
  - name: addressing
    version: "1.0"
    handlers:
      - { name: AddrIn10, phase: Addressing, flow: in }
  - name: addressing
    version: "1.1"
    handlers:
      - { name: AddrIn11, phase: Addressing, flow: in }
service_groups:
  - name: latest
    engage: [addressing]
  - name: pinned
    engage: [addressing-1.0]
"#;
    let cfg = config::load_from_str(yaml).unwrap();
    let tree = config::build_tree(&cfg).unwrap();

    let latest = tree.child(tree.root(), &"latest".into()).unwrap();
    let pinned = tree.child(tree.root(), &"pinned".into()).unwrap();
    assert!(tree.is_engaged(latest, "addressing-1.1").unwrap());
    assert!(!tree.is_engaged(latest, "addressing-1.0").unwrap());
    assert!(tree.is_engaged(pinned, "addressing-1.0").unwrap());
    assert!(!tree.is_engaged(pinned, "addressing-1.1").unwrap());
}

#[test]
fn same_module_version_twice_is_rejected() {
    let yaml = r#"
version: 1
modules:
  - { name: addressing, version: "1.0" }
  - { name: addressing, version: "1.0" }
"#;
    let err = config::load_from_str(yaml).expect_err("must fail");
    assert_eq!(err.code(), ErrorCode::BadDescriptor);
}
