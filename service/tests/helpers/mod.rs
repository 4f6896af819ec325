//! Shared fixtures: the `validation` test module and a service over it

#![allow(dead_code)]

use serde_json::Value;
use std::sync::Arc;
use yang_core::config::ValidatorConfig;
use yang_core::definition::{ModuleDefinition, NodeDefinition};
use yang_core::edit::{EditConfigRequest, EditContainmentNode};
use yang_core::registry::SchemaRegistry;
use yang_core::schema::{IntegerKind, LeafType};
use yang_core::types::QName;
use yang_service::datastore::DatastoreService;
use yang_service::edit::WithDefaults;
use yang_service::validator::ConstraintValidator;

pub const NS: &str = "urn:org:bbf:pma:validation";
pub const INNER_NS: &str = "urn:org:bbf:pma:inner";

pub fn q(name: &str) -> QName {
    QName::new(NS, name)
}

pub fn inner(name: &str) -> QName {
    QName::new(INNER_NS, name)
}

/// The `validation` module used across the integration tests
pub fn validation_module() -> ModuleDefinition {
    ModuleDefinition::new("validation", NS, "validation")
        .with_revision("2015-12-14")
        .with_node(
            NodeDefinition::container("validation").with_children([
                NodeDefinition::leaf("leaf1", LeafType::string()),
                NodeDefinition::leaf("leaf2", LeafType::integer(IntegerKind::Uint8)).with_must("../leaf1 = 'leaf1'"),
                NodeDefinition::leaf("mybits", LeafType::bits(&["firstBit", "secondBit", "thirdBit"])),
                NodeDefinition::leaf(
                    "union-leaf",
                    LeafType::Union {
                        members: vec![
                            LeafType::ranged(IntegerKind::Uint8, "1..5"),
                            LeafType::enumeration(&["auto", "none"]),
                        ],
                    },
                ),
                NodeDefinition::container("leaflist-range").presence().with_child(
                    NodeDefinition::leaf_list("leaflist-type", LeafType::string())
                        .min_elements(2)
                        .max_elements(4),
                ),
                NodeDefinition::list("list1", &["id"]).with_children([
                    NodeDefinition::leaf("id", LeafType::string()),
                    NodeDefinition::leaf("name", LeafType::string()),
                ]),
                NodeDefinition::leaf("list1-ref", LeafType::leafref("/validation:validation/validation:list1/validation:id")),
                NodeDefinition::leaf_list("sorted", LeafType::integer(IntegerKind::Int32)),
                NodeDefinition::leaf_list("ordered", LeafType::string()).ordered_by_user(),
                NodeDefinition::list("server", &["name"])
                    .ordered_by_user()
                    .unique(&["ip", "port"])
                    .with_children([
                        NodeDefinition::leaf("name", LeafType::string()),
                        NodeDefinition::leaf("ip", LeafType::string()),
                        NodeDefinition::leaf("port", LeafType::integer(IntegerKind::Uint16)),
                    ]),
                NodeDefinition::leaf("enabled", LeafType::Boolean),
                NodeDefinition::leaf("dependent", LeafType::string()).with_when("../enabled = 'true'"),
                NodeDefinition::leaf("dependent-default", LeafType::string())
                    .default_value("on")
                    .with_when("../enabled = 'true'"),
                NodeDefinition::leaf("mtu", LeafType::integer(IntegerKind::Uint16)).default_value("1500"),
                NodeDefinition::choice("transport").default_case("tcp").with_children([
                    NodeDefinition::case("tcp").with_child(
                        NodeDefinition::leaf("tcp-port", LeafType::integer(IntegerKind::Uint16)).default_value("830"),
                    ),
                    NodeDefinition::case("udp")
                        .with_child(NodeDefinition::leaf("udp-port", LeafType::integer(IntegerKind::Uint16))),
                ]),
                NodeDefinition::container("mandatory-checks").presence().with_children([
                    NodeDefinition::leaf("required", LeafType::string()).mandatory(),
                    NodeDefinition::choice("pick").mandatory().with_children([
                        NodeDefinition::case("left").with_child(NodeDefinition::leaf("left-value", LeafType::string())),
                        NodeDefinition::case("right")
                            .with_child(NodeDefinition::leaf("right-value", LeafType::string())),
                    ]),
                ]),
                NodeDefinition::list("device", &["name"]).with_children([
                    NodeDefinition::leaf("name", LeafType::string()),
                    NodeDefinition::action("reboot").with_child(
                        NodeDefinition::input()
                            .with_child(NodeDefinition::leaf("delay", LeafType::integer(IntegerKind::Uint8))),
                    ),
                ]),
                NodeDefinition::container("xml-subtree").mount_point("plug"),
            ]),
        )
}

/// Module mounted below `xml-subtree`
pub fn inner_module() -> ModuleDefinition {
    ModuleDefinition::new("inner", INNER_NS, "in").with_node(
        NodeDefinition::container("inner-root").with_children([
            NodeDefinition::leaf("limit", LeafType::integer(IntegerKind::Uint8)),
            NodeDefinition::leaf("value", LeafType::integer(IntegerKind::Uint8))
                .with_must("current() <= /in:inner-root/in:limit"),
            NodeDefinition::leaf("target", LeafType::leafref("../limit")),
        ]),
    )
}

pub fn registry() -> SchemaRegistry {
    let mounted = SchemaRegistry::builder().module(inner_module()).build().unwrap();
    SchemaRegistry::builder()
        .module(validation_module())
        .mount("plug", mounted)
        .build()
        .unwrap()
}

pub fn validator_with(config: ValidatorConfig) -> Arc<ConstraintValidator> {
    Arc::new(ConstraintValidator::new(Arc::new(registry()), config).unwrap())
}

pub fn service() -> DatastoreService {
    DatastoreService::in_memory(validator_with(ValidatorConfig::default()))
}

/// Service whose datastore holds `document`
pub fn service_with(document: &Value) -> DatastoreService {
    let service = service();
    service.load_json(document).unwrap();
    service
}

/// Edit of the `validation` container
pub fn validation() -> EditContainmentNode {
    EditContainmentNode::new(q("validation"))
}

pub fn edit(node: EditContainmentNode) -> EditConfigRequest {
    EditConfigRequest::single(node)
}

/// Content of the `validation` container in the committed datastore
pub fn read_validation(service: &DatastoreService, mode: WithDefaults) -> Value {
    service.get_config(mode).unwrap()["validation:validation"].clone()
}
