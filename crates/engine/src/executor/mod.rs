//! Program execution: walks a step list in order, dispatches each step to its
//! handler, and accumulates the run [`Output`].
//!
//! - `Exit` ends the list it appears in; inline macro bodies and conditional
//!   branches have their own scope
//! - Host callbacks (roll service, prompt, input, target, functions) are the only
//!   suspension points and can be bounded with [`ExecutorOptions::callback_timeout`]
//! - Any error aborts the run; state changes made by completed steps remain

use std::future::Future;
use std::time::{Duration, Instant};

use chrono::Utc;
use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, info};
use ttml_types::{Op, Output, Step};

use crate::error::{Callback, ExecError};
use crate::host::Host;
use crate::state::ExecutionState;

mod choice;
mod interaction;
mod lambda;
mod message;
mod roll;
mod template;

/// Message shown by a Target step without a custom prompt.
pub const DEFAULT_TARGET_MESSAGE: &str = "Choose a target";

/// Tunables for an [`Executor`].
#[derive(Debug, Clone, Default)]
pub struct ExecutorOptions {
    /// Upper bound for each host callback. `None` waits indefinitely.
    pub callback_timeout: Option<Duration>,
}

/// Runs programs against an [`ExecutionState`] using an injected [`Host`].
pub struct Executor<H> {
    host: H,
    state: ExecutionState,
    options: ExecutorOptions,
}

impl<H: Host> Executor<H> {
    pub fn new(host: H) -> Self {
        Self::with_state(host, ExecutionState::new())
    }

    /// Start from an existing state, for example one with tokens already loaded.
    pub fn with_state(host: H, state: ExecutionState) -> Self {
        Self {
            host,
            state,
            options: ExecutorOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ExecutorOptions) -> Self {
        self.options = options;
        self
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn state(&self) -> &ExecutionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ExecutionState {
        &mut self.state
    }

    pub fn into_state(self) -> ExecutionState {
        self.state
    }

    /// Execute `steps` in order and return what they produced.
    ///
    /// With `cleanup`, results, positional variables, target, and run-as are cleared
    /// after a successful run. On failure the output is discarded and the state is
    /// left as the failing step found it.
    pub async fn execute(&mut self, steps: &[Step], cleanup: bool) -> Result<Output, ExecError> {
        let started = Instant::now();
        let mut output = Output::new(Utc::now());
        debug!(steps = steps.len(), cleanup, "executing program");

        self.run_steps(steps, &mut output).await?;

        output.execution_time = started.elapsed().as_millis() as u64;
        info!(
            messages = output.messages.len(),
            rolls = output.rolls.len(),
            templates = output.templates.len(),
            elapsed_ms = output.execution_time,
            "program finished"
        );
        if cleanup {
            self.state.reset_session();
        }
        Ok(output)
    }

    /// Walk one step list. An `Exit` step ends this list only.
    pub(crate) fn run_steps<'a>(&'a mut self, steps: &'a [Step], output: &'a mut Output) -> BoxFuture<'a, Result<(), ExecError>> {
        async move {
            for (index, step) in steps.iter().enumerate() {
                if step.op == Op::Exit {
                    debug!(index, remaining = steps.len() - index - 1, "exit reached");
                    break;
                }
                self.execute_step(step, output).await?;
            }
            Ok(())
        }
        .boxed()
    }

    /// Run a single step. A lone `Exit` (as a conditional branch) does nothing.
    pub(crate) fn execute_step<'a>(&'a mut self, step: &'a Step, output: &'a mut Output) -> BoxFuture<'a, Result<(), ExecError>> {
        async move {
            debug!(op = %step.op, args = step.args.len(), result = ?step.result, "executing step");
            match &step.op {
                Op::Roll | Op::RollHidden | Op::RollWhisper => self.run_roll(step, output).await,
                Op::Lambda => self.run_lambda(step, output).await,
                Op::Say | Op::Whisper => self.run_message(step, output),
                Op::Prompt | Op::Case => self.run_choice(step).await,
                Op::Input => self.run_input(step).await,
                Op::Target => self.run_target(step).await,
                Op::Template => self.run_template(step, output),
                Op::TestMode => {
                    self.run_test_mode(step);
                    Ok(())
                }
                Op::Function(name) => self.run_function(name, step).await,
                Op::Exit | Op::Name(_) | Op::Primitive => Ok(()),
            }
        }
        .boxed()
    }

    /// Await a host callback, honoring the configured timeout.
    pub(crate) async fn bounded<F: Future>(&self, callback: Callback, future: F) -> Result<F::Output, ExecError> {
        match self.options.callback_timeout {
            Some(limit) => tokio::time::timeout(limit, future)
                .await
                .map_err(|_| ExecError::CallbackTimedOut {
                    callback,
                    timeout: limit,
                }),
            None => Ok(future.await),
        }
    }
}
