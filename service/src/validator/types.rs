//! Leaf value checking and canonicalization
//!
//! Values are stored in canonical form: integers without sign or leading
//! zeros, decimal64 with trimmed fraction digits, booleans in lower case and
//! bits in position order. Reading back a value therefore never depends on
//! how the client spelled it.

use crate::expression::ExpressionEngine;
use crate::expression::ast::Expr;
use crate::expression::dependencies::leafref_target;
use crate::patterns::compile_xsd;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use std::cmp::Ordering;
use yang_core::registry::SchemaRegistry;
use yang_core::rpc_error::app_tags;
use yang_core::schema::{
    BitMember, EnumMember, IntegerKind, LeafType, PatternRestriction, RangeRestriction, SchemaNode,
};
use yang_core::types::SchemaPath;

const MAX_LEAFREF_CHAIN: usize = 16;

/// A value that does not match its type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeViolation {
    /// Human readable message
    pub message: String,
    /// Restriction specific or custom app-tag
    pub app_tag: Option<String>,
}

impl TypeViolation {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            app_tag: None,
        }
    }

    fn restricted(message: String, app_tag: Option<String>) -> Self {
        Self { message, app_tag }
    }
}

type Checked = Result<String, TypeViolation>;

/// Checks values against leaf types of one registry
#[derive(Debug, Clone, Copy)]
pub struct TypeValidator<'a> {
    registry: &'a SchemaRegistry,
    expressions: &'a ExpressionEngine,
}

impl<'a> TypeValidator<'a> {
    /// Validator resolving identities and leafref targets in `registry`
    #[must_use]
    pub fn new(registry: &'a SchemaRegistry, expressions: &'a ExpressionEngine) -> Self {
        Self { registry, expressions }
    }

    /// Canonical form of `value` for the leaf or leaf-list `node`
    ///
    /// Nodes without a type (anydata) accept any value unchanged.
    ///
    /// # Errors
    ///
    /// Returns the violation message of the type, or for a union the
    /// messages of every member joined with `" or "`.
    pub fn canonicalize(&self, node: &SchemaNode, value: &str) -> Checked {
        match node.leaf_type() {
            Some(leaf_type) => self.check(&node.path, &node.qname.namespace, leaf_type, value, 0),
            None => Ok(value.to_string()),
        }
    }

    /// Whether `value` is acceptable for `leaf_type` as declared on `owner`
    #[must_use]
    pub fn accepts(&self, owner: &SchemaNode, leaf_type: &LeafType, value: &str) -> bool {
        self.check(&owner.path, &owner.qname.namespace, leaf_type, value, 0).is_ok()
    }

    fn check(&self, owner: &SchemaPath, namespace: &str, leaf_type: &LeafType, value: &str, depth: usize) -> Checked {
        match leaf_type {
            LeafType::Integer { kind, range } => check_integer(*kind, range.as_ref(), value),
            LeafType::Decimal64 {
                fraction_digits,
                range,
            } => check_decimal(*fraction_digits, range.as_ref(), value),
            LeafType::String { length, patterns } => check_string(length.as_ref(), patterns, value),
            LeafType::Boolean => match value {
                "true" | "false" => Ok(value.to_string()),
                _ => Err(TypeViolation::new(format!("Value \"{value}\" is not a valid boolean"))),
            },
            LeafType::Empty => {
                if value.is_empty() {
                    Ok(String::new())
                } else {
                    Err(TypeViolation::new(format!("Value \"{value}\" is not valid for type empty")))
                }
            }
            LeafType::Enumeration { members } => check_enumeration(members, value),
            LeafType::Bits { members } => check_bits(members, value),
            LeafType::Binary { length } => check_binary(length.as_ref(), value),
            LeafType::IdentityRef { bases } => self.check_identity(namespace, bases, value),
            LeafType::InstanceIdentifier { .. } => match self.expressions.compile(value).as_deref() {
                Ok(Expr::Path(path)) if path.absolute => Ok(value.to_string()),
                _ => Err(TypeViolation::new(format!(
                    "Value \"{value}\" is not a valid instance-identifier"
                ))),
            },
            LeafType::LeafRef { path, .. } => {
                if depth >= MAX_LEAFREF_CHAIN {
                    return Ok(value.to_string());
                }
                let Ok(expr) = self.expressions.compile(path) else {
                    return Ok(value.to_string());
                };
                match leafref_target(self.registry, owner, &expr) {
                    Some(target) => match target.leaf_type() {
                        Some(target_type) => {
                            self.check(&target.path, &target.qname.namespace, target_type, value, depth + 1)
                        }
                        None => Ok(value.to_string()),
                    },
                    None => Ok(value.to_string()),
                }
            }
            LeafType::Union { members } => {
                let mut messages = Vec::with_capacity(members.len());
                for member in members {
                    match self.check(owner, namespace, member, value, depth) {
                        Ok(canonical) => return Ok(canonical),
                        Err(violation) => messages.push(violation.message),
                    }
                }
                Err(TypeViolation::new(messages.join(" or ")))
            }
        }
    }

    fn check_identity(&self, namespace: &str, bases: &[String], value: &str) -> Checked {
        let invalid = || {
            TypeViolation::new(format!(
                "Value \"{value}\" is an invalid identityref. Expected an identity derived from [{}]",
                bases.join(", ")
            ))
        };
        let identity = self.registry.resolve_identity(value, namespace).ok_or_else(invalid)?;
        let derived = bases.iter().all(|base| {
            self.registry
                .resolve_identity(base, namespace)
                .is_some_and(|base| self.registry.identity_derived_from(&identity, &base, false))
        });
        if derived { Ok(value.to_string()) } else { Err(invalid()) }
    }
}

/// Order two canonical values of `leaf_type` for system ordered instances
#[must_use]
pub fn compare_values(leaf_type: Option<&LeafType>, left: &str, right: &str) -> Ordering {
    match leaf_type {
        Some(LeafType::Integer { .. }) => match (parse_integer(left), parse_integer(right)) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => left.cmp(right),
        },
        Some(LeafType::Decimal64 { fraction_digits, .. }) => {
            match (parse_decimal(left, *fraction_digits), parse_decimal(right, *fraction_digits)) {
                (Some(l), Some(r)) => l.cmp(&r),
                _ => left.cmp(right),
            }
        }
        _ => left.cmp(right),
    }
}

fn parse_integer(value: &str) -> Option<i128> {
    let digits = match value.strip_prefix('+') {
        Some(rest) if rest.starts_with(|c: char| c.is_ascii_digit()) => rest,
        Some(_) => return None,
        None => value,
    };
    let unsigned = digits.strip_prefix('-').unwrap_or(digits);
    if unsigned.is_empty() || !unsigned.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

fn pow10(exponent: u8) -> i128 {
    10_i128.pow(u32::from(exponent))
}

/// Scaled integer of a decimal64 literal with at most `fraction_digits` digits
fn parse_decimal(value: &str, fraction_digits: u8) -> Option<i128> {
    let fraction_digits = fraction_digits.max(1);
    let (negative, body) = match value.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, value.strip_prefix('+').unwrap_or(value)),
    };
    let (integer, fraction) = body.split_once('.').unwrap_or((body, ""));
    let digits = |text: &str| text.bytes().all(|b| b.is_ascii_digit());
    if integer.is_empty() || !digits(integer) || !digits(fraction) || fraction.len() > usize::from(fraction_digits) {
        return None;
    }
    let integer: i128 = integer.parse().ok()?;
    let mut fraction_value: i128 = if fraction.is_empty() { 0 } else { fraction.parse().ok()? };
    // fraction.len() <= fraction_digits was checked above
    #[allow(clippy::cast_possible_truncation)]
    let missing = fraction_digits - fraction.len() as u8;
    fraction_value *= pow10(missing);
    let scaled = integer.checked_mul(pow10(fraction_digits))?.checked_add(fraction_value)?;
    Some(if negative { -scaled } else { scaled })
}

fn format_decimal(scaled: i128, fraction_digits: u8) -> String {
    let fraction_digits = fraction_digits.max(1);
    let scale = pow10(fraction_digits);
    let magnitude = scaled.unsigned_abs();
    #[allow(clippy::cast_sign_loss)]
    let scale = scale as u128;
    let integer = magnitude / scale;
    let fraction = format!("{:0width$}", magnitude % scale, width = usize::from(fraction_digits));
    let trimmed = fraction.trim_end_matches('0');
    let fraction = if trimmed.is_empty() { "0" } else { trimmed };
    let sign = if scaled < 0 { "-" } else { "" };
    format!("{sign}{integer}.{fraction}")
}

fn in_range(range: &RangeRestriction, value: i128, bounds: (i128, i128), parse: impl Fn(&str) -> Option<i128>) -> bool {
    let bound = |literal: &str| match literal {
        "min" => Some(bounds.0),
        "max" => Some(bounds.1),
        other => parse(other),
    };
    range.intervals().iter().any(|(lower, upper)| {
        matches!((bound(lower), bound(upper)), (Some(lower), Some(upper)) if lower <= value && value <= upper)
    })
}

fn range_violation(value: &str, range: &RangeRestriction) -> TypeViolation {
    TypeViolation::restricted(
        range.error_message.clone().unwrap_or_else(|| {
            format!(
                "Value \"{value}\" does not meet the range constraints. Expected range of value: {}",
                range.expression
            )
        }),
        Some(
            range
                .error_app_tag
                .clone()
                .unwrap_or_else(|| app_tags::RANGE_OUT_OF_BOUNDS.to_string()),
        ),
    )
}

fn check_integer(kind: IntegerKind, range: Option<&RangeRestriction>, value: &str) -> Checked {
    let parsed = parse_integer(value)
        .ok_or_else(|| TypeViolation::new(format!("Value \"{value}\" is not a valid {}", kind.name())))?;
    let bounds = kind.bounds();
    if parsed < bounds.0 || parsed > bounds.1 {
        return Err(TypeViolation::restricted(
            format!(
                "Value \"{value}\" does not meet the range constraints. Expected range of value: {}..{}",
                bounds.0, bounds.1
            ),
            Some(app_tags::RANGE_OUT_OF_BOUNDS.to_string()),
        ));
    }
    if let Some(range) = range
        && !in_range(range, parsed, bounds, parse_integer)
    {
        return Err(range_violation(value, range));
    }
    Ok(parsed.to_string())
}

fn check_decimal(fraction_digits: u8, range: Option<&RangeRestriction>, value: &str) -> Checked {
    let parsed = parse_decimal(value, fraction_digits)
        .ok_or_else(|| TypeViolation::new(format!("Value \"{value}\" is not a valid decimal64")))?;
    let bounds = (i128::from(i64::MIN), i128::from(i64::MAX));
    if parsed < bounds.0 || parsed > bounds.1 {
        return Err(TypeViolation::restricted(
            format!(
                "Value \"{value}\" does not meet the range constraints. Expected range of value: {}..{}",
                format_decimal(bounds.0, fraction_digits),
                format_decimal(bounds.1, fraction_digits)
            ),
            Some(app_tags::RANGE_OUT_OF_BOUNDS.to_string()),
        ));
    }
    if let Some(range) = range
        && !in_range(range, parsed, bounds, |literal| parse_decimal(literal, fraction_digits))
    {
        return Err(range_violation(value, range));
    }
    Ok(format_decimal(parsed, fraction_digits))
}

fn check_length(length: &RangeRestriction, value: &str, actual: usize) -> Result<(), TypeViolation> {
    let actual = i128::try_from(actual).unwrap_or(i128::MAX);
    if in_range(length, actual, (0, i128::from(u64::MAX)), parse_integer) {
        return Ok(());
    }
    Err(TypeViolation::restricted(
        length.error_message.clone().unwrap_or_else(|| {
            format!(
                "Value \"{value}\" does not meet the length constraints. Expected length of value: {}",
                length.expression
            )
        }),
        Some(
            length
                .error_app_tag
                .clone()
                .unwrap_or_else(|| app_tags::LENGTH_OUT_OF_BOUNDS.to_string()),
        ),
    ))
}

fn check_string(length: Option<&RangeRestriction>, patterns: &[PatternRestriction], value: &str) -> Checked {
    if let Some(length) = length {
        check_length(length, value, value.chars().count())?;
    }
    for pattern in patterns {
        let matched = compile_xsd(&pattern.pattern).is_ok_and(|regex| regex.is_match(value));
        if matched == pattern.invert_match {
            return Err(TypeViolation::restricted(
                pattern.error_message.clone().unwrap_or_else(|| {
                    format!(
                        "Value \"{value}\" does not meet the pattern constraints. Expected pattern: {}",
                        pattern.pattern
                    )
                }),
                pattern.error_app_tag.clone(),
            ));
        }
    }
    Ok(value.to_string())
}

fn check_enumeration(members: &[EnumMember], value: &str) -> Checked {
    if members.iter().any(|member| member.name == value) {
        return Ok(value.to_string());
    }
    let names: Vec<&str> = members.iter().map(|member| member.name.as_str()).collect();
    Err(TypeViolation::new(format!(
        "Value \"{value}\" is an invalid value. Expected values: [{}]",
        names.join(", ")
    )))
}

fn check_bits(members: &[BitMember], value: &str) -> Checked {
    let mut set: Vec<&BitMember> = Vec::new();
    for name in value.split_whitespace() {
        let Some(member) = members.iter().find(|member| member.name == name) else {
            let names: Vec<&str> = members.iter().map(|member| member.name.as_str()).collect();
            return Err(TypeViolation::new(format!(
                "Value \"{value}\" is an invalid value. Expected values: [{}]",
                names.join(", ")
            )));
        };
        if !set.iter().any(|seen| seen.name == member.name) {
            set.push(member);
        }
    }
    set.sort_by_key(|member| member.position);
    Ok(set
        .iter()
        .map(|member| member.name.as_str())
        .collect::<Vec<_>>()
        .join(" "))
}

fn check_binary(length: Option<&RangeRestriction>, value: &str) -> Checked {
    let compact: String = value.split_whitespace().collect();
    let decoded = STANDARD
        .decode(compact.as_bytes())
        .map_err(|_| TypeViolation::new(format!("Value \"{value}\" is not a valid binary value")))?;
    if let Some(length) = length {
        check_length(length, value, decoded.len())?;
    }
    Ok(STANDARD.encode(decoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use yang_core::definition::{ModuleDefinition, NodeDefinition};
    use yang_core::types::QName;

    const NS: &str = "urn:org:bbf:pma:validation";

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .module(
                ModuleDefinition::new("validation", NS, "validation")
                    .with_identity("base-id", &[])
                    .with_identity("derived-id", &["base-id"])
                    .with_node(
                        NodeDefinition::container("validation").with_children([
                            NodeDefinition::leaf("int8", LeafType::ranged(IntegerKind::Int8, "1..10 | 20")),
                            NodeDefinition::leaf(
                                "dec",
                                LeafType::Decimal64 {
                                    fraction_digits: 3,
                                    range: Some(RangeRestriction::new("min..100")),
                                },
                            ),
                            NodeDefinition::leaf(
                                "mybits",
                                LeafType::bits(&["firstBit", "secondBit", "thirdBit"]),
                            ),
                            NodeDefinition::leaf(
                                "name",
                                LeafType::String {
                                    length: Some(RangeRestriction::new("2..4")),
                                    patterns: vec![PatternRestriction::new("[a-z]+")],
                                },
                            ),
                            NodeDefinition::leaf(
                                "id",
                                LeafType::IdentityRef {
                                    bases: vec!["base-id".to_string()],
                                },
                            ),
                            NodeDefinition::leaf(
                                "choice-value",
                                LeafType::Union {
                                    members: vec![
                                        LeafType::ranged(IntegerKind::Uint8, "1..5"),
                                        LeafType::enumeration(&["auto", "none"]),
                                    ],
                                },
                            ),
                            NodeDefinition::leaf("target", LeafType::ranged(IntegerKind::Int32, "0..99")),
                            NodeDefinition::leaf("pointer", LeafType::leafref("../target")),
                            NodeDefinition::leaf("flag", LeafType::Boolean),
                            NodeDefinition::leaf("blob", LeafType::Binary { length: None }),
                        ]),
                    ),
            )
            .build()
            .unwrap()
    }

    fn check(registry: &SchemaRegistry, leaf: &str, value: &str) -> Checked {
        let engine = ExpressionEngine::new();
        let path = SchemaPath::from_segments(vec![QName::new(NS, "validation"), QName::new(NS, leaf)]);
        let node = registry.get_data_schema_node(&path).unwrap();
        TypeValidator::new(registry, &engine).canonicalize(node, value)
    }

    #[test]
    fn test_integer_canonical_form_and_range() {
        let registry = registry();
        assert_eq!(check(&registry, "int8", "+007"), Ok("7".to_string()));
        assert_eq!(check(&registry, "int8", "20"), Ok("20".to_string()));
        let violation = check(&registry, "int8", "15").unwrap_err();
        assert_eq!(
            violation.message,
            "Value \"15\" does not meet the range constraints. Expected range of value: 1..10 | 20"
        );
        assert_eq!(violation.app_tag.as_deref(), Some(app_tags::RANGE_OUT_OF_BOUNDS));
        assert!(check(&registry, "int8", "200").is_err());
        assert!(check(&registry, "int8", "+-1").is_err());
        assert!(check(&registry, "int8", "x").is_err());
    }

    #[test]
    fn test_decimal64_is_normalized() {
        let registry = registry();
        assert_eq!(check(&registry, "dec", "01.500"), Ok("1.5".to_string()));
        assert_eq!(check(&registry, "dec", "3"), Ok("3.0".to_string()));
        assert_eq!(check(&registry, "dec", "-0.25"), Ok("-0.25".to_string()));
        assert!(check(&registry, "dec", "1.2345").is_err());
        assert!(check(&registry, "dec", "100.001").is_err());
    }

    #[test]
    fn test_bits_are_sorted_by_position() {
        let registry = registry();
        assert_eq!(
            check(&registry, "mybits", "secondBit thirdBit firstBit"),
            Ok("firstBit secondBit thirdBit".to_string())
        );
        assert!(check(&registry, "mybits", "fourthBit").is_err());
    }

    #[test]
    fn test_string_length_and_pattern() {
        let registry = registry();
        assert!(check(&registry, "name", "abc").is_ok());
        let too_long = check(&registry, "name", "abcde").unwrap_err();
        assert_eq!(too_long.app_tag.as_deref(), Some(app_tags::LENGTH_OUT_OF_BOUNDS));
        assert_eq!(
            too_long.message,
            "Value \"abcde\" does not meet the length constraints. Expected length of value: 2..4"
        );
        assert!(check(&registry, "name", "AB").is_err());
    }

    #[test]
    fn test_union_joins_member_messages() {
        let registry = registry();
        assert_eq!(check(&registry, "choice-value", "auto"), Ok("auto".to_string()));
        assert_eq!(check(&registry, "choice-value", "03"), Ok("3".to_string()));
        let violation = check(&registry, "choice-value", "9").unwrap_err();
        assert_eq!(
            violation.message,
            "Value \"9\" does not meet the range constraints. Expected range of value: 1..5 or \
             Value \"9\" is an invalid value. Expected values: [auto, none]"
        );
        assert_eq!(violation.app_tag, None);
    }

    #[test]
    fn test_leafref_uses_target_type() {
        let registry = registry();
        assert_eq!(check(&registry, "pointer", "042"), Ok("42".to_string()));
        assert!(check(&registry, "pointer", "100").is_err());
    }

    #[test]
    fn test_identity_boolean_and_binary() {
        let registry = registry();
        assert!(check(&registry, "id", "validation:derived-id").is_ok());
        assert!(check(&registry, "id", "base-id").is_err());
        assert_eq!(check(&registry, "flag", "true"), Ok("true".to_string()));
        assert_eq!(
            check(&registry, "flag", "TRUE").unwrap_err().message,
            "Value \"TRUE\" is not a valid boolean"
        );
        assert!(check(&registry, "flag", "1").is_err());
        assert_eq!(check(&registry, "blob", "aGVs bG8="), Ok("aGVsbG8=".to_string()));
        assert!(check(&registry, "blob", "***").is_err());
    }

    #[test]
    fn test_system_order_is_numeric_for_numbers() {
        let int = LeafType::integer(IntegerKind::Int32);
        assert_eq!(compare_values(Some(&int), "9", "10"), Ordering::Less);
        assert_eq!(compare_values(Some(&LeafType::string()), "9", "10"), Ordering::Greater);
    }
}
