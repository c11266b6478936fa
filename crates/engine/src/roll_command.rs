//! Compiles Roll step arguments into the textual dice expression sent to the
//! roll service, e.g. `[N 1, D 8, GT 6]` becomes `1d8gt6`.

use tracing::debug;
use ttml_types::{Arg, Comparison, Op, Primitive, Reroll, RollArg, TokenRef, Value};

use crate::error::ExecError;
use crate::resolve::{resolve, resolve_text, token_name};
use crate::state::ExecutionState;

/// A synthesized dice expression and its attribution.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RollCommand {
    pub command: String,
    /// Token the roll is made on behalf of (`Roll` op).
    pub as_token: Option<String>,
    /// Token the roll is whispered to (hidden and whisper ops).
    pub to_token: Option<String>,
}

/// Build the dice expression for a roll step.
///
/// A bare token reference names the `as` token under `Roll` and the `to` token
/// otherwise. A token reference with an attribute is a stored formula and becomes
/// the whole command when no other argument emitted anything.
pub fn synthesize(op: &Op, args: &[Arg], state: &ExecutionState) -> Result<RollCommand, ExecError> {
    let mut rolled = RollCommand::default();
    let mut formula: Option<&TokenRef> = None;

    for arg in args {
        match arg {
            Arg::Roll(roll_arg) => append_roll_arg(&mut rolled.command, roll_arg, state)?,
            Arg::Token(token) if token.attribute.is_some() => formula = Some(token),
            Arg::Token(token) => {
                let name = token_name(token, state)?.to_string();
                if *op == Op::Roll {
                    rolled.as_token = Some(name);
                } else {
                    rolled.to_token = Some(name);
                }
            }
            _ => {}
        }
    }

    if rolled.command.is_empty()
        && let Some(token) = formula
    {
        rolled.command = resolve_text(&Value::Token(token.clone()), state)?;
    }

    debug!(command = %rolled.command, as_token = ?rolled.as_token, to_token = ?rolled.to_token, "synthesized roll command");
    Ok(rolled)
}

fn append_roll_arg(command: &mut String, arg: &RollArg, state: &ExecutionState) -> Result<(), ExecError> {
    let text = |value: &Value| resolve_text(value, state);
    match arg {
        RollArg::Advantage => command.push_str("adv"),
        RollArg::Disadvantage => command.push_str("dis"),
        RollArg::N(value) => command.push_str(&text(value)?),
        RollArg::D(value) => push_prefixed(command, "d", &text(value)?),
        RollArg::Sides(sides) => {
            let sides = sides.iter().map(text).collect::<Result<Vec<_>, _>>()?;
            command.push_str(&format!("d[{}]", sides.join(",")));
        }
        RollArg::E(value) => push_prefixed(command, "e", &text(value)?),
        RollArg::H(value) => push_prefixed(command, "kh", &text(value)?),
        RollArg::L(value) => push_prefixed(command, "kl", &text(value)?),
        RollArg::GT(value) => push_prefixed(command, "gt", &text(value)?),
        RollArg::GTE(value) => push_prefixed(command, "gte", &text(value)?),
        RollArg::LT(value) => push_prefixed(command, "lt", &text(value)?),
        RollArg::LTE(value) => push_prefixed(command, "lte", &text(value)?),
        RollArg::Max(value) => push_prefixed(command, "max", &text(value)?),
        RollArg::Min(value) => push_prefixed(command, "min", &text(value)?),
        RollArg::RO(reroll) => push_reroll(command, "ro", reroll, state)?,
        RollArg::RR(reroll) => push_reroll(command, "rr", reroll, state)?,
        RollArg::ModifierPos(value) => {
            let resolved = resolve(value, state)?;
            let rendered = resolved.display();
            match resolved.as_f64() {
                Some(number) if number < 0.0 => command.push_str(&rendered),
                _ => push_prefixed(command, "+", &rendered),
            }
        }
        RollArg::ModifierNeg(value) => push_prefixed(command, "-", &text(value)?),
        RollArg::Comment(value) => command.push_str(&format!("['{}']", text(value)?)),
        RollArg::Primitive(primitive) => command.push_str(match primitive {
            Primitive::Add => " + ",
            Primitive::Subtract => " - ",
            Primitive::Multiply => " * ",
            Primitive::Divide => " / ",
        }),
    }
    Ok(())
}

fn push_prefixed(command: &mut String, prefix: &str, value: &str) {
    command.push_str(prefix);
    command.push_str(value);
}

fn push_reroll(command: &mut String, prefix: &str, reroll: &Reroll, state: &ExecutionState) -> Result<(), ExecError> {
    let comparator = reroll.op.unwrap_or(Comparison::LessThan).symbol();
    command.push_str(prefix);
    command.push_str(comparator);
    command.push_str(&resolve_text(&reroll.value, state)?);
    Ok(())
}
