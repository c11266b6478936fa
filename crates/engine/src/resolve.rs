//! # Value Resolution
//!
//! Turns a tagged [`Value`] into a concrete one by dereferencing token attributes,
//! named results, and positional variables against the [`ExecutionState`].
//!
//! ## Key Features
//!
//! - **Literals**: Number, Float, Text, and Boolean resolve to themselves
//! - **Containers**: Arrays and Objects resolve element by element
//! - **Interpolation**: text parts resolve and join into a single Text
//! - **Token paths**: `@me.attacks.0.name` walks Objects by key and Arrays by index;
//!   `@target` follows the selected target; groups take a leading member index
//! - **Variables**: `$name` reads named results, `$0` the most recent positional
//!
//! Primitive markers and embedded steps are returned unchanged; their meaning
//! depends on the handler that sees them.
//!
//! ## Usage
//!
//! ```rust
//! use ttml_engine::{ExecutionState, resolve::resolve};
//! use ttml_types::{TokenRef, Value};
//!
//! let mut state = ExecutionState::new();
//! let attributes = serde_json::json!({"hp": 42});
//! state.set_token("me", attributes.as_object().unwrap(), &serde_json::Map::new());
//!
//! let hp = resolve(&Value::Token(TokenRef::attribute("me", "hp")), &state)?;
//! assert_eq!(hp, Value::Number(42));
//! # Ok::<(), ttml_engine::ExecError>(())
//! ```

use ttml_types::{TokenRef, Value};

use crate::error::ExecError;
use crate::state::ExecutionState;

/// Nesting bound that stops attribute reference cycles.
pub const MAX_RESOLUTION_DEPTH: usize = 32;

/// Resolve a value against the current state.
pub fn resolve(value: &Value, state: &ExecutionState) -> Result<Value, ExecError> {
    resolve_at(value, state, 0)
}

/// Resolve a value and render it as text.
pub fn resolve_text(value: &Value, state: &ExecutionState) -> Result<String, ExecError> {
    resolve(value, state).map(|resolved| resolved.display())
}

/// Name of the token a reference points at, with `target` mapped to the selection.
pub fn token_name<'a>(token: &'a TokenRef, state: &'a ExecutionState) -> Result<&'a str, ExecError> {
    if token.name == "target" {
        state.target().ok_or(ExecError::NoTargetSelected)
    } else {
        Ok(token.name.as_str())
    }
}

fn resolve_at(value: &Value, state: &ExecutionState, depth: usize) -> Result<Value, ExecError> {
    if depth > MAX_RESOLUTION_DEPTH {
        return Err(ExecError::ResolutionDepthExceeded {
            depth: MAX_RESOLUTION_DEPTH,
        });
    }
    let next = depth + 1;
    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| resolve_at(item, state, next))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => map
            .iter()
            .map(|(key, item)| resolve_at(item, state, next).map(|resolved| (key.clone(), resolved)))
            .collect::<Result<_, _>>()
            .map(Value::Object),
        Value::TextInterpolated(text) => {
            let mut joined = String::new();
            for part in &text.parts {
                joined.push_str(&resolve_at(part, state, next)?.display());
            }
            Ok(Value::Text(joined))
        }
        Value::Token(token) => {
            let name = token_name(token, state)?;
            let found = state.lookup_attribute(name, token.attribute.as_deref())?;
            resolve_at(&found, state, next)
        }
        Value::Variable(name) => lookup_variable(name, state).cloned(),
        Value::VariableReserved(ordinal) => state
            .variable(*ordinal)
            .cloned()
            .ok_or_else(|| ExecError::VariableNotSet {
                name: ordinal.to_string(),
            }),
        other => Ok(other.clone()),
    }
}

/// `$0` is the most recent positional variable; other names check named results
/// before falling back to positional ordinals.
fn lookup_variable<'a>(name: &str, state: &'a ExecutionState) -> Result<&'a Value, ExecError> {
    let found = if name == "0" {
        state.last_variable()
    } else {
        state
            .result(name)
            .or_else(|| name.parse::<u32>().ok().filter(|ordinal| *ordinal > 0).and_then(|ordinal| state.variable(ordinal)))
    };
    found.ok_or_else(|| ExecError::VariableNotSet { name: name.to_string() })
}
