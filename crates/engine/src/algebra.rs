//! Value algebra behind Assign, Concat, and Deduct.
//!
//! Right-hand operands are folded left to right into a single value; Concat and
//! Deduct then combine that value with whatever the destination already holds.

use tracing::warn;
use ttml_types::{Primitive, Value};

use crate::error::ExecError;

/// Fold resolved operands into one value.
///
/// A Primitive marker sets the operator applied to following numeric operands
/// and stays in effect until another marker replaces it; a leading operator
/// applies to an implicit `0`. Text joins onto a non-empty accumulator with a
/// single space. Any other operand replaces the accumulator. Returns `None` for
/// an empty operand list.
pub fn fold(operands: &[Value]) -> Result<Option<Value>, ExecError> {
    let mut accumulator: Option<Value> = None;
    let mut pending: Option<Primitive> = None;

    for operand in operands {
        accumulator = match operand {
            Value::Primitive(primitive) => {
                pending = Some(*primitive);
                continue;
            }
            Value::Text(text) => match accumulator {
                Some(previous) if !previous.display().is_empty() => Some(Value::Text(format!("{} {text}", previous.display()))),
                _ => Some(Value::Text(text.clone())),
            },
            Value::Number(_) | Value::Float(_) => match (accumulator, pending) {
                (Some(previous), Some(operator)) if previous.is_numeric() => Some(arithmetic(&previous, operator, operand)?),
                (None, Some(operator)) => Some(arithmetic(&Value::Number(0), operator, operand)?),
                _ => Some(operand.clone()),
            },
            other => Some(other.clone()),
        };
    }
    Ok(accumulator)
}

/// Apply an arithmetic operator. Integer math stays integral unless a division
/// leaves a remainder; any Float operand produces a Float.
pub fn arithmetic(left: &Value, operator: Primitive, right: &Value) -> Result<Value, ExecError> {
    if let (Value::Number(a), Value::Number(b)) = (left, right) {
        let integral = match operator {
            Primitive::Add => a.checked_add(*b),
            Primitive::Subtract => a.checked_sub(*b),
            Primitive::Multiply => a.checked_mul(*b),
            Primitive::Divide if *b == 0 => return Err(ExecError::DivisionByZero),
            Primitive::Divide if a.checked_rem(*b) == Some(0) => a.checked_div(*b),
            Primitive::Divide => None,
        };
        if let Some(result) = integral {
            return Ok(Value::Number(result));
        }
    }

    let (Some(a), Some(b)) = (left.as_f64(), right.as_f64()) else {
        return Err(ExecError::IncompatibleOperands {
            operation: "apply arithmetic to",
            existing: left.kind(),
            operand: right.kind(),
        });
    };
    let result = match operator {
        Primitive::Add => a + b,
        Primitive::Subtract => a - b,
        Primitive::Multiply => a * b,
        Primitive::Divide if b == 0.0 => return Err(ExecError::DivisionByZero),
        Primitive::Divide => a / b,
    };
    Ok(Value::Float(result))
}

/// Add `operand` onto an existing value.
///
/// Arrays gain one element, Objects gain an entry under the next free numeric key,
/// numbers add, and Text appends the operand's display form. A missing destination
/// simply takes the operand.
pub fn concat(existing: Option<Value>, operand: Value) -> Result<Value, ExecError> {
    let Some(existing) = existing else {
        return Ok(operand);
    };
    match existing {
        Value::Array(mut items) => {
            items.push(operand);
            Ok(Value::Array(items))
        }
        Value::Object(mut map) => {
            let mut index = map.len();
            while map.contains_key(&index.to_string()) {
                index += 1;
            }
            map.insert(index.to_string(), operand);
            Ok(Value::Object(map))
        }
        Value::Number(_) | Value::Float(_) if operand.is_numeric() => arithmetic(&existing, Primitive::Add, &operand),
        Value::Text(mut text) if !matches!(operand, Value::Array(_) | Value::Object(_)) => {
            text.push_str(&operand.display());
            Ok(Value::Text(text))
        }
        other => Err(ExecError::IncompatibleOperands {
            operation: "concat",
            existing: other.kind(),
            operand: operand.kind(),
        }),
    }
}

/// Take `operand` away from an existing value.
///
/// Numbers subtract and Text loses a matching suffix. Arrays and Objects append
/// the operand exactly like [`concat`].
pub fn deduct(existing: Value, operand: Value) -> Result<Value, ExecError> {
    match existing {
        Value::Number(_) | Value::Float(_) if operand.is_numeric() => arithmetic(&existing, Primitive::Subtract, &operand),
        Value::Text(text) => {
            let suffix = operand.display();
            if suffix.is_empty() || !text.ends_with(suffix.as_str()) {
                return Ok(Value::Text(text));
            }
            Ok(Value::Text(text[..text.len() - suffix.len()].to_string()))
        }
        Value::Array(_) | Value::Object(_) => {
            warn!(
                existing = existing.kind(),
                operand = operand.kind(),
                "deduct on a collection appends the operand"
            );
            concat(Some(existing), operand)
        }
        other => Err(ExecError::IncompatibleOperands {
            operation: "deduct",
            existing: other.kind(),
            operand: operand.kind(),
        }),
    }
}
