//! Parsed program structure: programs, steps, and their typed arguments.
//!
//! These types mirror the parser's output. A step is `{ "op", "args", "result" }`
//! where `op` selects the handler and every argument is a single-key tagged object.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::value::{InterpolatedText, Primitive, TokenRef, Value};

/// A parsed macro: a name plus its ordered steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Program {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// One executable step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub op: Op,
    #[serde(default)]
    pub args: Vec<Arg>,
    #[serde(default)]
    pub result: StepResult,
}

impl Step {
    pub fn new(op: Op, args: Vec<Arg>) -> Self {
        Self {
            op,
            args,
            result: StepResult::Ignore,
        }
    }

    /// Mark the step so its produced value is pushed as a positional variable.
    pub fn saved(mut self) -> Self {
        self.result = StepResult::Save;
        self
    }

    pub fn exit() -> Self {
        Self::new(Op::Exit, Vec::new())
    }
}

/// Operation kinds understood by the executor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Op {
    Exit,
    Lambda,
    Prompt,
    Case,
    Roll,
    RollHidden,
    RollWhisper,
    Say,
    Whisper,
    Input,
    Target,
    Template,
    TestMode,
    /// Host-provided custom function, by name.
    Function(String),
    /// Parser bookkeeping: the macro's declared name.
    Name(String),
    /// Parser bookkeeping: a stray operator.
    Primitive,
}

impl fmt::Display for Op {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Op::Function(name) => write!(f, "Function({name})"),
            Op::Name(name) => write!(f, "Name({name})"),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Whether a step's produced value is kept as the next positional variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StepResult {
    #[default]
    Ignore,
    Save,
}

/// A step argument. Which variants are meaningful depends on the step's op.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Arg {
    Roll(RollArg),
    /// Bare token reference: `as`/`to` for rolls, inline macro call for Lambda.
    Token(TokenRef),
    Say(SayArg),
    Prompt(ChoiceArg),
    Case(ChoiceArg),
    Target(TargetArg),
    Input(InterpolatedText),
    Template(TemplateArg),
    /// `Some(flag)` sets test mode, `None` toggles it.
    TestMode(Option<bool>),
    Assign(Assignment),
    Concat(Assignment),
    Deduct(Assignment),
    Conditional(Conditional),
    /// One argument passed to a host function.
    Function(Value),
}

/// Roll modifiers, compiled into a dice expression in argument order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RollArg {
    Advantage,
    Disadvantage,
    N(Value),
    D(Value),
    Sides(Vec<Value>),
    E(Value),
    H(Value),
    L(Value),
    GT(Value),
    GTE(Value),
    LT(Value),
    LTE(Value),
    Max(Value),
    Min(Value),
    RO(Reroll),
    RR(Reroll),
    ModifierPos(Value),
    ModifierNeg(Value),
    Comment(Value),
    Primitive(Primitive),
}

/// Reroll condition; a missing comparator means "less than".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reroll {
    #[serde(default)]
    pub op: Option<Comparison>,
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Comparison {
    EqualTo,
    GreaterThanOrEqual,
    LessThanOrEqual,
    GreaterThan,
    LessThan,
}

impl Comparison {
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::EqualTo => "==",
            Comparison::GreaterThanOrEqual => ">=",
            Comparison::LessThanOrEqual => "<=",
            Comparison::GreaterThan => ">",
            Comparison::LessThan => "<",
        }
    }
}

/// Message text as emitted by the parser: either a literal or interpolated parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageText {
    Plain(String),
    Interpolated(InterpolatedText),
}

impl MessageText {
    pub fn to_value(&self) -> Value {
        match self {
            MessageText::Plain(text) => Value::Text(text.clone()),
            MessageText::Interpolated(text) => Value::TextInterpolated(text.clone()),
        }
    }
}

impl From<&str> for MessageText {
    fn from(value: &str) -> Self {
        MessageText::Plain(value.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SayArg {
    Message(MessageText),
    From(TokenRef),
    To(TokenRef),
}

/// Options and selector shared by Prompt and Case steps.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChoiceArg {
    #[serde(default)]
    pub message: Option<MessageText>,
    #[serde(default)]
    pub options: Vec<ChoiceOption>,
    /// Selector whose resolved value may match an option key directly.
    #[serde(default)]
    pub input: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChoiceOption {
    pub key: OptionKey,
    pub value: Value,
}

/// Option keys arrive as either numbers or strings; they compare by text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionKey {
    Number(i64),
    Text(String),
}

impl OptionKey {
    pub fn is_empty(&self) -> bool {
        matches!(self, OptionKey::Text(text) if text.is_empty())
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OptionKey::Number(number) => write!(f, "{number}"),
            OptionKey::Text(text) => f.write_str(text),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TargetArg {
    Message(MessageText),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TemplateArg {
    Name(MessageText),
    Attributes(Value),
}

/// Assignment-family arguments: destination plus right-hand operand list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub left: Value,
    #[serde(default)]
    pub right: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conditional {
    pub comparison: Comparison,
    pub left: Value,
    pub right: Value,
    #[serde(default)]
    pub success: Option<Box<Step>>,
    #[serde(default)]
    pub failure: Option<Box<Step>>,
}
