use tracing::debug;
use ttml_types::{Arg, Op, Output, RollRecord, Step, StepResult};

use super::Executor;
use crate::error::{Callback, ExecError};
use crate::host::Host;
use crate::roll_command::synthesize;

impl<H: Host> Executor<H> {
    pub(super) async fn run_roll(&mut self, step: &Step, output: &mut Output) -> Result<(), ExecError> {
        let record = self.perform_roll(&step.op, &step.args).await?;
        if step.result == StepResult::Save {
            let ordinal = self.state.push_variable(record.value.clone());
            debug!(ordinal, value = %record.value.display(), "saved roll result");
        }
        output.push_roll(record);
        Ok(())
    }

    /// Synthesize the command, submit it, and attribute the result.
    pub(super) async fn perform_roll(&mut self, op: &Op, args: &[Arg]) -> Result<RollRecord, ExecError> {
        let rolled = synthesize(op, args, &self.state)?;
        let result = self
            .bounded(Callback::Roll, self.host.roll(&rolled.command))
            .await?
            .map_err(ExecError::RollService)?;
        debug!(command = %rolled.command, value = %result.value.display(), "roll resolved");

        Ok(RollRecord {
            command: rolled.command,
            value: result.value,
            roll: result.roll,
            as_token: rolled.as_token,
            to: rolled.to_token,
            token: self.state.run_as().map(str::to_string),
            is_test: self.state.test_mode(),
            is_hidden: *op == Op::RollHidden,
        })
    }
}
