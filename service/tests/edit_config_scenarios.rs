//! edit-config requests against the `validation` module, checked through
//! the rpc-errors a client would receive

mod helpers;

use helpers::{edit, q, read_validation, service, service_with, validation};
use pretty_assertions::assert_eq;
use serde_json::json;
use yang_core::edit::{EditChangeNode, EditConfigRequest, EditContainmentNode, EditOperation};
use yang_core::rpc_error::{ErrorSeverity, ErrorTag, ErrorType, app_tags};
use yang_service::edit::WithDefaults;
use yang_service::json::json_to_edit;
use yang_service::rpc::TargetStep;

#[test]
fn deleting_below_min_elements_is_rejected() {
    let service = service_with(&json!({
        "validation:validation": {"leaflist-range": {"leaflist-type": ["a", "b"]}}
    }));
    let request = edit(
        validation().with_child(
            EditContainmentNode::new(q("leaflist-range"))
                .with_change(EditChangeNode::new(q("leaflist-type"), "b").with_operation(EditOperation::Delete)),
        ),
    );

    let err = service.edit_config(&request).unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.error_type, ErrorType::Application);
    assert_eq!(error.tag, ErrorTag::OperationFailed);
    assert_eq!(error.severity, ErrorSeverity::Error);
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::TOO_FEW_ELEMENTS));
    assert_eq!(error.message, "Minimum elements required for leaflist-type is 2.");
    assert_eq!(
        error.path.as_deref(),
        Some("/validation:validation/validation:leaflist-range/validation:leaflist-type")
    );
    assert_eq!(
        read_validation(&service, WithDefaults::ReportAll)["leaflist-range"],
        json!({"leaflist-type": ["a", "b"]})
    );
}

#[test]
fn exceeding_max_elements_is_rejected() {
    let service = service();
    let mut range = EditContainmentNode::new(q("leaflist-range"));
    for value in ["a", "b", "c", "d", "e"] {
        range = range.with_change(EditChangeNode::new(q("leaflist-type"), value));
    }
    let err = service.edit_config(&edit(validation().with_child(range))).unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::TOO_MANY_ELEMENTS));
    assert_eq!(error.message, "Maximum elements allowed for leaflist-type is 4.");
}

#[test]
fn bits_read_back_in_declaration_order() {
    let service = service();
    service
        .edit_config(&edit(validation().with_leaf(q("mybits"), "secondBit thirdBit firstBit")))
        .unwrap();
    assert_eq!(
        read_validation(&service, WithDefaults::ReportAll)["mybits"],
        json!("firstBit secondBit thirdBit")
    );
}

#[test]
fn duplicate_list_keys_in_one_payload() {
    let service = service();
    let payload = json_to_edit(
        service.validator().schema(),
        &json!({"validation:validation": {"list1": [{"id": "1"}, {"id": "1", "name": "again"}]}}),
    )
    .unwrap();

    let err = service.edit_config(&EditConfigRequest::new(payload)).unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::OperationFailed);
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::DATA_NOT_UNIQUE));
    assert_eq!(error.message, "Duplicate elements in node list1");
    assert_eq!(
        error.path.as_deref(),
        Some("/validation:validation/validation:list1[validation:id='1']")
    );
}

#[test]
fn duplicate_leaf_list_values_compare_in_canonical_form() {
    let service = service();
    let request = edit(
        validation()
            .with_change(EditChangeNode::new(q("sorted"), "5"))
            .with_change(EditChangeNode::new(q("sorted"), "05")),
    );

    let err = service.edit_config(&request).unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::DATA_NOT_UNIQUE));
    assert_eq!(error.message, "Duplicate elements in node sorted");
    assert_eq!(
        error.path.as_deref(),
        Some("/validation:validation/validation:sorted[.='5']")
    );
    assert!(read_validation(&service, WithDefaults::ReportAll).get("sorted").is_none());

    service
        .edit_config(&edit(
            validation()
                .with_change(EditChangeNode::new(q("sorted"), "5"))
                .with_change(EditChangeNode::new(q("sorted"), "50")),
        ))
        .unwrap();
    assert_eq!(read_validation(&service, WithDefaults::ReportAll)["sorted"], json!([5, 50]));
}

#[test]
fn boolean_spelling_is_case_sensitive() {
    let service = service();
    let err = service
        .edit_config(&edit(validation().with_leaf(q("enabled"), "TRUE")))
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::InvalidValue);
    assert_eq!(error.message, "Value \"TRUE\" is not a valid boolean");

    service
        .edit_config(&edit(validation().with_leaf(q("enabled"), "true")))
        .unwrap();
}

#[test]
fn action_on_missing_node_is_a_protocol_error() {
    let service = service_with(&json!({"validation:validation": {"device": [{"name": "edge"}]}}));
    let datastore = service.get_tree().unwrap();
    let target = [
        TargetStep::container(q("validation")),
        TargetStep::entry(q("device"), vec![(q("name"), "ghost".to_string())]),
    ];

    let err = service
        .rpc_validator()
        .validate_action(&datastore, &target, &q("reboot"), &EditContainmentNode::root())
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.error_type, ErrorType::Protocol);
    assert_eq!(error.tag, ErrorTag::BadElement);
    assert_eq!(error.message, "No matched action found on the models");
    assert_eq!(error.path, None);

    let existing = [
        TargetStep::container(q("validation")),
        TargetStep::entry(q("device"), vec![(q("name"), "edge".to_string())]),
    ];
    service
        .rpc_validator()
        .validate_action(
            &datastore,
            &existing,
            &q("reboot"),
            &EditContainmentNode::root().with_leaf(q("delay"), "5"),
        )
        .unwrap();
}

#[test]
fn must_violation_rejects_the_whole_edit() {
    let service = service_with(&json!({"validation:validation": {"leaf1": "other"}}));
    let before = service.get_config(WithDefaults::ReportAll).unwrap();

    let request = edit(validation().with_leaf(q("leaf2"), "7").with_leaf(q("mybits"), "firstBit"));
    let err = service.edit_config(&request).unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::OperationFailed);
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::MUST_VIOLATION));
    assert_eq!(error.message, "Violate must constraints: ../leaf1 = 'leaf1'");
    assert_eq!(error.path.as_deref(), Some("/validation:validation/validation:leaf2"));
    assert_eq!(service.get_config(WithDefaults::ReportAll).unwrap(), before);

    service
        .edit_config(&edit(validation().with_leaf(q("leaf1"), "leaf1").with_leaf(q("leaf2"), "7")))
        .unwrap();
    service.validate_datastore().unwrap();
}

#[test]
fn deleting_a_leafref_target_is_rejected() {
    let service = service_with(&json!({
        "validation:validation": {"list1": [{"id": "a"}, {"id": "b"}], "list1-ref": "a"}
    }));
    let delete = |id: &str| {
        edit(validation().with_child(
            EditContainmentNode::new(q("list1"))
                .with_key(q("id"), id)
                .with_operation(EditOperation::Delete),
        ))
    };

    let err = service.edit_config(&delete("a")).unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::DataMissing);
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::INSTANCE_REQUIRED));
    assert_eq!(error.message, "Dependency violated, 'a' must exist");
    assert_eq!(error.path.as_deref(), Some("/validation:validation/validation:list1-ref"));

    service.edit_config(&delete("b")).unwrap();
    assert_eq!(
        read_validation(&service, WithDefaults::ReportAll)["list1"],
        json!([{"id": "a"}])
    );
}

#[test]
fn union_failure_joins_member_messages() {
    let service = service();
    let err = service
        .edit_config(&edit(validation().with_leaf(q("union-leaf"), "9")))
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::InvalidValue);
    assert_eq!(
        error.message,
        "Value \"9\" does not meet the range constraints. Expected range of value: 1..5 or \
         Value \"9\" is an invalid value. Expected values: [auto, none]"
    );

    service
        .edit_config(&edit(validation().with_leaf(q("union-leaf"), "auto")))
        .unwrap();
}

#[test]
fn mandatory_leaf_and_choice() {
    let service = service();
    let checks = || EditContainmentNode::new(q("mandatory-checks"));

    let err = service
        .edit_config(&edit(validation().with_child(checks().with_leaf(q("left-value"), "x"))))
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::DataMissing);
    assert_eq!(error.message, "Missing mandatory node - required");
    assert_eq!(
        error.path.as_deref(),
        Some("/validation:validation/validation:mandatory-checks/validation:required")
    );

    let err = service
        .edit_config(&edit(validation().with_child(checks().with_leaf(q("required"), "yes"))))
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::MISSING_CHOICE));
    assert_eq!(
        error.path.as_deref(),
        Some("/validation:validation/validation:mandatory-checks")
    );

    service
        .edit_config(&edit(validation().with_child(
            checks().with_leaf(q("required"), "yes").with_leaf(q("right-value"), "y"),
        )))
        .unwrap();
}

#[test]
fn unique_group_violation() {
    let service = service();
    let server = |name: &str, port: &str| {
        EditContainmentNode::new(q("server"))
            .with_key(q("name"), name)
            .with_leaf(q("ip"), "10.0.0.1")
            .with_leaf(q("port"), port)
    };
    service
        .edit_config(&edit(validation().with_child(server("a", "80")).with_child(server("b", "443"))))
        .unwrap();

    let err = service
        .edit_config(&edit(validation().with_child(server("c", "80"))))
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.app_tag.as_deref(), Some(app_tags::DATA_NOT_UNIQUE));
    assert_eq!(error.message, "Violate unique constraints of server: {ip=10.0.0.1, port=80}");
    assert_eq!(error.path.as_deref(), Some("/validation:validation/validation:server"));
}

#[test]
fn create_and_delete_conflicts() {
    let service = service_with(&json!({"validation:validation": {"leaf1": "x"}}));

    let err = service
        .edit_config(&edit(validation().with_change(
            EditChangeNode::new(q("leaf1"), "y").with_operation(EditOperation::Create),
        )))
        .unwrap_err();
    assert_eq!(err.first_rpc_error().unwrap().tag, ErrorTag::DataExists);

    let err = service
        .edit_config(&edit(validation().with_change(
            EditChangeNode::empty(q("leaf2")).with_operation(EditOperation::Delete),
        )))
        .unwrap_err();
    assert_eq!(err.first_rpc_error().unwrap().tag, ErrorTag::DataMissing);

    service
        .edit_config(&edit(validation().with_change(
            EditChangeNode::empty(q("leaf2")).with_operation(EditOperation::Remove),
        )))
        .unwrap();
}

#[test]
fn unknown_element_is_rejected() {
    let service = service();
    let err = service
        .edit_config(&edit(validation().with_leaf(q("no-such-leaf"), "x")))
        .unwrap_err();
    let error = err.first_rpc_error().unwrap();
    assert_eq!(error.tag, ErrorTag::UnknownElement);
    assert_eq!(error.message, "An unexpected element 'no-such-leaf' is present");
}
