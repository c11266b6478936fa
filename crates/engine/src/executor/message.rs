use chrono::Utc;
use tracing::debug;
use ttml_types::{Arg, Message, Op, Output, SayArg, Step};

use super::Executor;
use crate::error::ExecError;
use crate::host::Host;
use crate::resolve::{resolve_text, token_name};

impl<H: Host> Executor<H> {
    /// Say and Whisper. The sender defaults to the run-as token; only Whisper
    /// addresses a recipient.
    pub(super) fn run_message(&mut self, step: &Step, output: &mut Output) -> Result<(), ExecError> {
        let mut message = String::new();
        let mut from = None;
        let mut to = None;

        for arg in &step.args {
            let Arg::Say(part) = arg else {
                continue;
            };
            match part {
                SayArg::Message(text) => message.push_str(&resolve_text(&text.to_value(), &self.state)?),
                SayArg::From(token) => from = Some(token_name(token, &self.state)?.to_string()),
                SayArg::To(token) if step.op == Op::Whisper => to = Some(token_name(token, &self.state)?.to_string()),
                SayArg::To(token) => debug!(token = %token, "ignoring recipient on a public message"),
            }
        }

        let from = from.or_else(|| self.state.run_as().map(str::to_string));
        output.push_message(Message {
            from,
            to,
            message,
            is_test: self.state.test_mode(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}
