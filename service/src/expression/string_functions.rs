//! String functions of the XPath 1.0 core library

use super::error::EvaluationError;
use super::functions::{BuiltinFunction, FunctionContext, FunctionRegistry};
use super::value::XPathValue;

pub(super) fn register(registry: &mut FunctionRegistry) {
    let functions = [
        BuiltinFunction::new("string", 0, Some(1), string),
        BuiltinFunction::new("concat", 2, None, concat),
        BuiltinFunction::new("starts-with", 2, Some(2), starts_with),
        BuiltinFunction::new("contains", 2, Some(2), contains),
        BuiltinFunction::new("substring-before", 2, Some(2), substring_before),
        BuiltinFunction::new("substring-after", 2, Some(2), substring_after),
        BuiltinFunction::new("substring", 2, Some(3), substring),
        BuiltinFunction::new("string-length", 0, Some(1), string_length),
        BuiltinFunction::new("normalize-space", 0, Some(1), normalize_space),
        BuiltinFunction::new("translate", 3, Some(3), translate),
    ];
    for function in functions {
        registry.register(Box::new(function));
    }
}

fn string(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::String(context.string_or_context(&args, 0)))
}

fn concat(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    Ok(XPathValue::String(
        args.iter().map(|arg| context.string(arg)).collect(),
    ))
}

fn two_strings(context: &FunctionContext<'_>, args: &[XPathValue]) -> (String, String) {
    (context.string(&args[0]), context.string(&args[1]))
}

fn starts_with(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let (text, prefix) = two_strings(context, &args);
    Ok(XPathValue::Boolean(text.starts_with(&prefix)))
}

fn contains(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let (text, needle) = two_strings(context, &args);
    Ok(XPathValue::Boolean(text.contains(&needle)))
}

fn substring_before(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let (text, needle) = two_strings(context, &args);
    let before = text
        .find(&needle)
        .map(|index| text[..index].to_string())
        .unwrap_or_default();
    Ok(XPathValue::String(before))
}

fn substring_after(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let (text, needle) = two_strings(context, &args);
    let after = text
        .find(&needle)
        .map(|index| text[index + needle.len()..].to_string())
        .unwrap_or_default();
    Ok(XPathValue::String(after))
}

fn xpath_round(value: f64) -> f64 {
    if value.is_nan() || value.is_infinite() {
        value
    } else {
        (value + 0.5).floor()
    }
}

/// `substring()` with XPath rounding: characters at 1-based positions `p`
/// with `round(start) <= p < round(start) + round(length)`
fn substring(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let text = context.string(&args[0]);
    let start = xpath_round(context.number(&args[1]));
    let end = match args.get(2) {
        Some(length) => start + xpath_round(context.number(length)),
        None => f64::INFINITY,
    };
    let result = text
        .chars()
        .zip(1u32..)
        .filter(|(_, position)| {
            let position = f64::from(*position);
            position >= start && position < end
        })
        .map(|(ch, _)| ch)
        .collect();
    Ok(XPathValue::String(result))
}

#[allow(clippy::cast_precision_loss)]
fn string_length(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let text = context.string_or_context(&args, 0);
    Ok(XPathValue::Number(text.chars().count() as f64))
}

fn normalize_space(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let text = context.string_or_context(&args, 0);
    Ok(XPathValue::String(
        text.split_whitespace().collect::<Vec<_>>().join(" "),
    ))
}

fn translate(context: &FunctionContext<'_>, args: Vec<XPathValue>) -> Result<XPathValue, EvaluationError> {
    let text = context.string(&args[0]);
    let from: Vec<char> = context.string(&args[1]).chars().collect();
    let to: Vec<char> = context.string(&args[2]).chars().collect();
    let result = text
        .chars()
        .filter_map(|ch| match from.iter().position(|c| *c == ch) {
            Some(index) => to.get(index).copied(),
            None => Some(ch),
        })
        .collect();
    Ok(XPathValue::String(result))
}
