use serde_json::Value as Json;
use tracing::debug;
use ttml_types::codec::{decode, encode};
use ttml_types::{Arg, Step, StepResult, TargetArg, Value};

use super::{DEFAULT_TARGET_MESSAGE, Executor};
use crate::error::{Callback, ExecError};
use crate::host::Host;
use crate::resolve::{resolve, resolve_text};

impl<H: Host> Executor<H> {
    /// Ask for free text and keep the answer as the next positional variable.
    pub(super) async fn run_input(&mut self, step: &Step) -> Result<(), ExecError> {
        let message = match step.args.iter().find_map(|arg| match arg {
            Arg::Input(text) => Some(text),
            _ => None,
        }) {
            Some(text) => resolve_text(&Value::TextInterpolated(text.clone()), &self.state)?,
            None => String::new(),
        };

        let answer = self
            .bounded(Callback::Input, self.host.input(&message))
            .await?
            .map_err(|error| error.into_exec(Callback::Input, ExecError::NoInputHandler))?;
        let ordinal = self.state.push_variable(Value::Text(answer));
        debug!(ordinal, "stored input answer");
        Ok(())
    }

    pub(super) async fn run_target(&mut self, step: &Step) -> Result<(), ExecError> {
        let message = match step.args.iter().find_map(|arg| match arg {
            Arg::Target(TargetArg::Message(text)) => Some(text),
            _ => None,
        }) {
            Some(text) => resolve_text(&text.to_value(), &self.state)?,
            None => DEFAULT_TARGET_MESSAGE.to_string(),
        };

        let target = self
            .bounded(Callback::Target, self.host.target(&message))
            .await?
            .map_err(|error| error.into_exec(Callback::Target, ExecError::NoTargetHandler))?;
        debug!(target = %target, "target selected");
        self.state.set_target(Some(target));
        Ok(())
    }

    pub(super) async fn run_function(&mut self, name: &str, step: &Step) -> Result<(), ExecError> {
        let value = self.call_function(name, &step.args).await?;
        if step.result == StepResult::Save {
            self.state.push_variable(value);
        }
        Ok(())
    }

    /// Call a host function with resolved arguments; the returned JSON is tagged.
    pub(super) async fn call_function(&mut self, name: &str, args: &[Arg]) -> Result<Value, ExecError> {
        let mut native = Vec::new();
        for arg in args {
            if let Arg::Function(value) = arg {
                let resolved = resolve(value, &self.state)?;
                native.push(decode(&resolved).unwrap_or(Json::Null));
            }
        }

        debug!(function = %name, args = native.len(), "calling host function");
        let returned = self
            .bounded(Callback::Function, self.host.function(name, native))
            .await?
            .map_err(|error| {
                error.into_exec(
                    Callback::Function,
                    ExecError::NoFunctionHandler { name: name.to_string() },
                )
            })?;
        Ok(encode(&returned))
    }
}
