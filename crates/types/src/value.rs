//! The tagged value model shared by programs, tokens, and the interpreter.
//!
//! Every value carried by a program is exactly one [`Value`] variant. On the wire
//! a value is an externally tagged object with a single key, for example
//! `{"Number": 42}` or `{"Token": {"name": "me", "attribute": "hp"}}`.

use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::step::Step;

/// Ordered map used for Object values and token attribute tables.
pub type ValueMap = IndexMap<String, Value>;

/// A single value of the macro language.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    Number(i64),
    Float(f64),
    Text(String),
    Boolean(bool),
    Array(Vec<Value>),
    Object(ValueMap),
    /// Reference to a token, one of its attributes, or one of its macros.
    Token(TokenRef),
    /// Reference to a named result of the current run.
    Variable(String),
    /// Reference to a positional variable; `0` is the most recent one.
    VariableReserved(u32),
    /// Parts concatenated as text once resolved.
    TextInterpolated(InterpolatedText),
    /// Pending arithmetic operator inside an assignment right-hand side.
    Primitive(Primitive),
    /// Embedded step whose execution yields a value.
    Step(Box<Step>),
}

/// Reference to a token, written `@name.attribute` or `@name->macro` in macro source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRef {
    pub name: String,
    /// Dotted attribute path such as `attacks.0.name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub macro_name: Option<String>,
}

impl TokenRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute: None,
            macro_name: None,
        }
    }

    pub fn attribute(name: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute: Some(attribute.into()),
            macro_name: None,
        }
    }

    pub fn macro_call(name: impl Into<String>, macro_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attribute: None,
            macro_name: Some(macro_name.into()),
        }
    }
}

impl fmt::Display for TokenRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}", self.name)?;
        if let Some(attribute) = &self.attribute {
            write!(f, ".{attribute}")?;
        }
        if let Some(macro_name) = &self.macro_name {
            write!(f, "->{macro_name}")?;
        }
        Ok(())
    }
}

/// Ordered text parts; non-text parts are coerced to their display form.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct InterpolatedText {
    pub parts: Vec<Value>,
}

impl InterpolatedText {
    pub fn new(parts: Vec<Value>) -> Self {
        Self { parts }
    }
}

/// Arithmetic operator markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Primitive {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Value {
    pub fn text(value: impl Into<String>) -> Self {
        Value::Text(value.into())
    }

    /// Build a numeric value, keeping integral results as `Number`.
    pub fn from_f64(value: f64) -> Self {
        if value.fract() == 0.0 && value.is_finite() && value.abs() < i64::MAX as f64 {
            Value::Number(value as i64)
        } else {
            Value::Float(value)
        }
    }

    /// Numeric view of the value, if it has one.
    ///
    /// Text that parses as a number and booleans (as `1`/`0`) are coerced.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(number) => Some(*number as f64),
            Value::Float(float) => Some(*float),
            Value::Boolean(flag) => Some(if *flag { 1.0 } else { 0.0 }),
            Value::Text(text) => text.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Value::Number(_) | Value::Float(_))
    }

    /// Short variant name used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Number(_) => "Number",
            Value::Float(_) => "Float",
            Value::Text(_) => "Text",
            Value::Boolean(_) => "Boolean",
            Value::Array(_) => "Array",
            Value::Object(_) => "Object",
            Value::Token(_) => "Token",
            Value::Variable(_) => "Variable",
            Value::VariableReserved(_) => "VariableReserved",
            Value::TextInterpolated(_) => "TextInterpolated",
            Value::Primitive(_) => "Primitive",
            Value::Step(_) => "Step",
        }
    }

    /// Text form used when a value is spliced into messages or roll commands.
    ///
    /// Reference variants render their source form; callers resolve first.
    pub fn display(&self) -> String {
        match self {
            Value::Number(number) => number.to_string(),
            Value::Float(float) => float.to_string(),
            Value::Text(text) => text.clone(),
            Value::Boolean(flag) => flag.to_string(),
            Value::Array(items) => items.iter().map(Value::display).collect::<Vec<_>>().join(","),
            Value::Object(_) => crate::codec::decode(self)
                .map(|native| native.to_string())
                .unwrap_or_default(),
            Value::Token(token) => token.to_string(),
            Value::Variable(name) => format!("${name}"),
            Value::VariableReserved(ordinal) => format!("${ordinal}"),
            Value::TextInterpolated(text) => text.parts.iter().map(Value::display).collect(),
            Value::Primitive(primitive) => match primitive {
                Primitive::Add => "+".into(),
                Primitive::Subtract => "-".into(),
                Primitive::Multiply => "*".into(),
                Primitive::Divide => "/".into(),
            },
            Value::Step(_) => String::new(),
        }
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Number(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<TokenRef> for Value {
    fn from(value: TokenRef) -> Self {
        Value::Token(value)
    }
}
