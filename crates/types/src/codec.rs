//! Conversion between host-native JSON values and tagged [`Value`]s.
//!
//! Hosts hand tokens over as plain JSON (`{"hp": 42, "attacks": [...]}`); the
//! interpreter stores them tagged. `decode(encode(x)) == x` holds for every JSON
//! value except `null` and integers outside the `i64` range.

use serde_json::{Map, Number, Value as Json};

use crate::value::{Value, ValueMap};

/// Tag a native JSON value, recursing into arrays and objects.
///
/// Values with no tagged counterpart (`null`, integers beyond `i64`) degrade to `Text`.
pub fn encode(native: &Json) -> Value {
    match native {
        Json::Array(items) => Value::Array(items.iter().map(encode).collect()),
        Json::Object(map) => Value::Object(encode_map(map)),
        Json::Number(number) => encode_number(number),
        Json::Bool(flag) => Value::Boolean(*flag),
        Json::String(text) => Value::Text(text.clone()),
        Json::Null => Value::Text(String::new()),
    }
}

/// Tag every entry of a native JSON object.
pub fn encode_map(map: &Map<String, Json>) -> ValueMap {
    map.iter().map(|(key, value)| (key.clone(), encode(value))).collect()
}

fn encode_number(number: &Number) -> Value {
    if let Some(integer) = number.as_i64() {
        return Value::Number(integer);
    }
    if number.is_u64() {
        return Value::Text(number.to_string());
    }
    match number.as_f64() {
        Some(float) => Value::Float(float),
        None => Value::Text(number.to_string()),
    }
}

/// Unwrap a tagged value back to native JSON.
///
/// Reference and marker variants have no native form and decode to `None`;
/// such entries are skipped inside arrays and objects.
pub fn decode(value: &Value) -> Option<Json> {
    match value {
        Value::Number(number) => Some(Json::from(*number)),
        Value::Float(float) => Number::from_f64(*float).map(Json::Number),
        Value::Text(text) => Some(Json::String(text.clone())),
        Value::Boolean(flag) => Some(Json::Bool(*flag)),
        Value::Array(items) => Some(Json::Array(items.iter().filter_map(decode).collect())),
        Value::Object(map) => Some(Json::Object(decode_map(map))),
        _ => None,
    }
}

/// Decode every representable entry of a tagged map.
pub fn decode_map(map: &ValueMap) -> Map<String, Json> {
    map.iter()
        .filter_map(|(key, value)| decode(value).map(|native| (key.clone(), native)))
        .collect()
}
