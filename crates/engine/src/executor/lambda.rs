use std::cmp::Ordering;

use tracing::debug;
use ttml_types::{Arg, Assignment, Comparison, Conditional, Op, Output, Step, TokenRef, Value};

use super::Executor;
use crate::algebra::{concat, deduct, fold};
use crate::error::{Callback, ExecError};
use crate::host::Host;
use crate::resolve::{resolve, resolve_text, token_name};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Update {
    Assign,
    Concat,
    Deduct,
}

/// Where an assignment writes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Destination {
    Result(String),
    Attribute { token: String, path: String },
}

impl<H: Host> Executor<H> {
    pub(super) async fn run_lambda(&mut self, step: &Step, output: &mut Output) -> Result<(), ExecError> {
        for arg in &step.args {
            match arg {
                Arg::Conditional(conditional) => self.run_conditional(conditional, output).await?,
                Arg::Assign(assignment) => self.run_update(Update::Assign, assignment, output).await?,
                Arg::Concat(assignment) => self.run_update(Update::Concat, assignment, output).await?,
                Arg::Deduct(assignment) => self.run_update(Update::Deduct, assignment, output).await?,
                Arg::Token(token) if token.macro_name.is_some() => self.run_inline_macro(token, output).await?,
                other => debug!(arg = ?other, "ignoring lambda argument"),
            }
        }
        Ok(())
    }

    async fn run_conditional(&mut self, conditional: &Conditional, output: &mut Output) -> Result<(), ExecError> {
        let left = resolve(&conditional.left, &self.state)?;
        let right = resolve(&conditional.right, &self.state)?;
        let passed = compare(conditional.comparison, &left, &right);
        debug!(comparison = ?conditional.comparison, left = %left.display(), right = %right.display(), passed, "conditional evaluated");

        let branch = if passed {
            conditional.success.as_deref()
        } else {
            conditional.failure.as_deref()
        };
        match branch {
            Some(step) => self.execute_step(step, output).await,
            None => Ok(()),
        }
    }

    async fn run_update(&mut self, update: Update, assignment: &Assignment, output: &mut Output) -> Result<(), ExecError> {
        let destination = self.destination(&assignment.left)?;

        let mut operands = Vec::with_capacity(assignment.right.len());
        for operand in &assignment.right {
            let value = match operand {
                Value::Step(step) => self.evaluate_embedded(step, output).await?,
                other => resolve(other, &self.state)?,
            };
            operands.push(value);
        }
        let Some(value) = fold(&operands)? else {
            debug!(destination = ?destination, "assignment has no operands");
            return Ok(());
        };

        let updated = match update {
            Update::Assign => value,
            Update::Concat => concat(self.read_destination(&destination)?, value)?,
            Update::Deduct => {
                let existing = self
                    .read_destination(&destination)?
                    .ok_or_else(|| missing_destination(&destination))?;
                deduct(existing, value)?
            }
        };
        debug!(update = ?update, destination = ?destination, value = %updated.display(), "assignment applied");
        self.write_destination(destination, updated)
    }

    /// Run an embedded step used as an assignment operand and return its value.
    async fn evaluate_embedded(&mut self, step: &Step, output: &mut Output) -> Result<Value, ExecError> {
        match &step.op {
            Op::Roll | Op::RollHidden | Op::RollWhisper => {
                let record = self.perform_roll(&step.op, &step.args).await?;
                let value = record.value.clone();
                output.push_roll(record);
                Ok(value)
            }
            Op::Function(name) => self.call_function(name, &step.args).await,
            other => Err(ExecError::UnsupportedEmbeddedStep { op: other.to_string() }),
        }
    }

    async fn run_inline_macro(&mut self, token: &TokenRef, output: &mut Output) -> Result<(), ExecError> {
        let macro_name = token.macro_name.as_deref().unwrap_or_default();
        let owner = token_name(token, &self.state)?.to_string();
        let source = self
            .state
            .token(&owner)
            .and_then(|stored| stored.macros.get(macro_name))
            .cloned()
            .ok_or_else(|| ExecError::MacroNotFound {
                token: owner.clone(),
                macro_name: macro_name.to_string(),
            })?;
        let source = resolve_text(&source, &self.state)?;
        let program = self
            .host
            .parse(&format!("#{macro_name} {source}"))
            .map_err(|error| error.into_exec(Callback::Parser, ExecError::NoParser))?;

        debug!(token = %owner, macro_name, steps = program.steps.len(), "running inline macro");
        self.state.set_run_as(Some(owner));
        self.run_steps(&program.steps, output).await
    }

    fn destination(&self, left: &Value) -> Result<Destination, ExecError> {
        match left {
            Value::Variable(name) => Ok(Destination::Result(name.clone())),
            Value::Token(token) => {
                let Some(path) = &token.attribute else {
                    return Err(ExecError::InvalidDestination {
                        kind: "Token reference without an attribute",
                    });
                };
                Ok(Destination::Attribute {
                    token: token_name(token, &self.state)?.to_string(),
                    path: path.clone(),
                })
            }
            other => Err(ExecError::InvalidDestination { kind: other.kind() }),
        }
    }

    /// Current value at the destination. Collections are returned as stored so
    /// references inside them survive the write-back.
    fn read_destination(&self, destination: &Destination) -> Result<Option<Value>, ExecError> {
        match destination {
            Destination::Result(name) => Ok(self.state.result(name).cloned()),
            Destination::Attribute { token, path } => match self.state.lookup_attribute(token, Some(path)) {
                Ok(raw @ (Value::Array(_) | Value::Object(_))) => Ok(Some(raw)),
                Ok(raw) => resolve(&raw, &self.state).map(Some),
                Err(ExecError::AttributeNotFound { .. } | ExecError::TokenNotFound { .. }) => Ok(None),
                Err(error) => Err(error),
            },
        }
    }

    fn write_destination(&mut self, destination: Destination, value: Value) -> Result<(), ExecError> {
        match destination {
            Destination::Result(name) => {
                self.state.set_result(name, value);
                Ok(())
            }
            Destination::Attribute { token, path } => self.state.write_attribute(&token, &path, value),
        }
    }
}

fn missing_destination(destination: &Destination) -> ExecError {
    match destination {
        Destination::Result(name) => ExecError::VariableNotSet { name: name.clone() },
        Destination::Attribute { token, path } => ExecError::AttributeNotFound {
            token: token.clone(),
            attribute: path.clone(),
        },
    }
}

/// Compare numerically when both sides coerce to numbers, otherwise by text.
fn compare(comparison: Comparison, left: &Value, right: &Value) -> bool {
    let ordering = match (left.as_f64(), right.as_f64()) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(left.display().cmp(&right.display())),
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match comparison {
        Comparison::EqualTo => ordering == Ordering::Equal,
        Comparison::GreaterThanOrEqual => ordering != Ordering::Less,
        Comparison::LessThanOrEqual => ordering != Ordering::Greater,
        Comparison::GreaterThan => ordering == Ordering::Greater,
        Comparison::LessThan => ordering == Ordering::Less,
    }
}
