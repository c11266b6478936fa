use tracing::debug;
use ttml_types::{Arg, ChoiceArg, ChoiceOption, Op, OptionKey, Step, Value};

use super::Executor;
use crate::error::{Callback, ExecError};
use crate::host::{Host, PromptOption};
use crate::resolve::{resolve, resolve_text};
use crate::state::ExecutionState;

impl<H: Host> Executor<H> {
    /// Prompt and Case. A selector that matches an option key picks that option
    /// without asking the host; otherwise the host prompt chooses one.
    pub(super) async fn run_choice(&mut self, step: &Step) -> Result<(), ExecError> {
        let Some(choice) = step.args.iter().find_map(|arg| match arg {
            Arg::Prompt(choice) | Arg::Case(choice) => Some(choice),
            _ => None,
        }) else {
            debug!(op = %step.op, "choice step has no options");
            return Ok(());
        };
        let stores_value = step.op == Op::Case;

        if let Some(option) = self.preselected(choice)? {
            debug!(key = %option.key, "selector matched an option; prompt skipped");
            let value = chosen_value(option, stores_value, &self.state)?;
            self.state.push_variable(value);
            return Ok(());
        }
        if choice.options.is_empty() {
            debug!(op = %step.op, "no options to choose from; prompt skipped");
            return Ok(());
        }

        let message = match &choice.message {
            Some(text) => resolve_text(&text.to_value(), &self.state)?,
            None => String::new(),
        };
        let displayed = choice
            .options
            .iter()
            .map(|option| {
                Ok(PromptOption {
                    key: option.key.to_string(),
                    value: display_option(&option.value, &self.state)?,
                })
            })
            .collect::<Result<Vec<_>, ExecError>>()?;

        let selection = self
            .bounded(Callback::Prompt, self.host.prompt(&message, &displayed))
            .await?
            .map_err(|error| error.into_exec(Callback::Prompt, ExecError::NoPromptHandler))?;
        let option = select(&choice.options, &selection)?;
        debug!(selection = %selection, key = %option.key, "prompt answered");

        let value = chosen_value(option, stores_value, &self.state)?;
        self.state.push_variable(value);
        Ok(())
    }

    fn preselected<'a>(&self, choice: &'a ChoiceArg) -> Result<Option<&'a ChoiceOption>, ExecError> {
        let Some(selector) = &choice.input else {
            return Ok(None);
        };
        let wanted = resolve_text(selector, &self.state)?;
        Ok(choice.options.iter().find(|option| option.key.to_string() == wanted))
    }
}

/// Token options are shown in source form, everything else resolved.
fn display_option(value: &Value, state: &ExecutionState) -> Result<String, ExecError> {
    match value {
        Value::Token(token) => Ok(token.to_string()),
        other => resolve_text(other, state),
    }
}

/// Interpret the host's answer as an option index, then as a key.
fn select<'a>(options: &'a [ChoiceOption], selection: &str) -> Result<&'a ChoiceOption, ExecError> {
    let selection = selection.trim();
    selection
        .parse::<usize>()
        .ok()
        .and_then(|index| options.get(index))
        .or_else(|| options.iter().find(|option| option.key.to_string() == selection))
        .ok_or_else(|| ExecError::InvalidPromptSelection {
            selection: selection.to_string(),
        })
}

/// Case stores the option's resolved value; Prompt stores its key unless the key is empty.
fn chosen_value(option: &ChoiceOption, stores_value: bool, state: &ExecutionState) -> Result<Value, ExecError> {
    if stores_value || option.key.is_empty() {
        return resolve(&option.value, state);
    }
    Ok(match &option.key {
        OptionKey::Number(number) => Value::Number(*number),
        OptionKey::Text(text) => Value::Text(text.clone()),
    })
}
