//! `when` re-evaluation after edits, default materialization and
//! with-defaults read-back

mod helpers;

use helpers::{edit, q, read_validation, service, service_with, validation};
use pretty_assertions::assert_eq;
use serde_json::json;
use yang_core::edit::{EditChangeNode, EditOperation, TestOption};
use yang_core::rpc_error::{ErrorTag, app_tags};
use yang_service::edit::WithDefaults;

#[test]
fn clearing_a_prerequisite_removes_dependent_data() {
    let service = service_with(&json!({"validation:validation": {"enabled": true, "dependent": "x"}}));
    let before = read_validation(&service, WithDefaults::ReportAll);
    assert_eq!(before["dependent"], json!("x"));
    assert_eq!(before["dependent-default"], json!("on"));

    service
        .edit_config(&edit(validation().with_leaf(q("enabled"), "false")))
        .unwrap();
    let after = read_validation(&service, WithDefaults::ReportAll);
    assert_eq!(after["enabled"], json!(false));
    assert!(after.get("dependent").is_none());
    assert!(after.get("dependent-default").is_none());
    service.validate_datastore().unwrap();
}

#[test]
fn deleting_a_prerequisite_removes_dependent_data() {
    let service = service_with(&json!({"validation:validation": {"enabled": true, "dependent": "x"}}));
    service
        .edit_config(&edit(validation().with_change(
            EditChangeNode::empty(q("enabled")).with_operation(EditOperation::Delete),
        )))
        .unwrap();
    assert!(read_validation(&service, WithDefaults::ReportAll).get("dependent").is_none());
}

#[test]
fn writing_data_whose_when_is_false_is_rejected() {
    let service = service();
    let err = service
        .edit_config(&edit(validation().with_leaf(q("dependent"), "x")))
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::UnknownElement);
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::WHEN_VIOLATION));
    assert_eq!(error.message, "Violate when constraints: ../enabled = 'true'");
    assert_eq!(error.path.as_deref(), Some("/validation:validation/validation:dependent"));

    service
        .edit_config(&edit(validation().with_leaf(q("enabled"), "true").with_leaf(q("dependent"), "x")))
        .unwrap();
}

#[test]
fn defaults_are_materialized_and_reported_by_mode() {
    let service = service_with(&json!({"validation:validation": {"leaf1": "x"}}));

    let all = read_validation(&service, WithDefaults::ReportAll);
    assert_eq!(all["mtu"], json!(1500));
    assert_eq!(all["tcp-port"], json!(830));
    assert!(all.get("dependent-default").is_none(), "when is false without enabled");

    assert_eq!(read_validation(&service, WithDefaults::Trim), json!({"leaf1": "x"}));
    assert_eq!(read_validation(&service, WithDefaults::Explicit), json!({"leaf1": "x"}));

    service
        .edit_config(&edit(validation().with_leaf(q("enabled"), "true")))
        .unwrap();
    assert_eq!(
        read_validation(&service, WithDefaults::ReportAll)["dependent-default"],
        json!("on")
    );
}

#[test]
fn explicit_default_value_is_kept_by_explicit_mode() {
    let service = service();
    service
        .edit_config(&edit(validation().with_leaf(q("mtu"), "1500")))
        .unwrap();
    assert_eq!(read_validation(&service, WithDefaults::Explicit), json!({"mtu": 1500}));
    assert_eq!(service.get_config(WithDefaults::Trim).unwrap(), json!({}));
}

#[test]
fn writing_another_case_replaces_the_default_case() {
    let service = service_with(&json!({"validation:validation": {"leaf1": "x"}}));
    service
        .edit_config(&edit(validation().with_leaf(q("udp-port"), "161")))
        .unwrap();
    let after = read_validation(&service, WithDefaults::ReportAll);
    assert_eq!(after["udp-port"], json!(161));
    assert!(after.get("tcp-port").is_none());

    service
        .edit_config(&edit(validation().with_change(
            EditChangeNode::empty(q("udp-port")).with_operation(EditOperation::Delete),
        )))
        .unwrap();
    assert_eq!(read_validation(&service, WithDefaults::ReportAll)["tcp-port"], json!(830));
}

#[test]
fn written_tree_reads_back_identically() {
    let document = json!({
        "validation:validation": {
            "leaf1": "leaf1",
            "leaf2": 7,
            "mybits": "firstBit thirdBit",
            "list1": [{"id": "a", "name": "first"}, {"id": "b"}],
            "list1-ref": "b",
            "sorted": [-4, 2, 30],
            "ordered": ["z", "a", "m"],
            "server": [{"name": "s2", "ip": "10.0.0.2", "port": 22}, {"name": "s1", "ip": "10.0.0.1", "port": 22}]
        }
    });
    let service = service_with(&document);
    assert_eq!(service.get_config(WithDefaults::Explicit).unwrap(), document);
    service.validate_datastore().unwrap();
}

#[test]
fn test_only_does_not_commit() {
    let service = service();
    service
        .edit_config(&edit(validation().with_leaf(q("leaf1"), "leaf1")).with_test_option(TestOption::TestOnly))
        .unwrap();
    assert_eq!(service.get_config(WithDefaults::ReportAll).unwrap(), json!({}));
}
