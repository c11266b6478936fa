//! # TTML Engine
//!
//! The TTML engine executes parsed macro programs: dice rolls, chat messages,
//! prompts, and state changes for tabletop-game sessions. Parsing, dice
//! resolution, and user interaction are delegated to a [`Host`].
//!
//! ## Key Features
//!
//! - **Sequential Execution**: steps run strictly in order; `Exit` ends the current list
//! - **Roll Synthesis**: structured roll arguments compile to dice expressions such as `1d8rr<6`
//! - **Value Algebra**: Assign, Concat, and Deduct over numbers, text, and nested structures
//! - **Token Paths**: `@me.attacks.0.name`, `@target.hp`, and indexed groups like `@selected.1.name`
//! - **Inline Macros**: `@me->attack` re-parses a token macro and runs it as that token
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ttml_engine::{Executor, Host};
//! use ttml_types::{Op, RollArg, Step, Arg, Value, RollResult};
//!
//! struct FixedRoller;
//!
//! #[async_trait::async_trait]
//! impl Host for FixedRoller {
//!     async fn roll(&self, _command: &str) -> anyhow::Result<RollResult> {
//!         Ok(RollResult::new(Value::Number(12), serde_json::json!({"value": 12})))
//!     }
//! }
//!
//! # async fn run() -> Result<(), ttml_engine::ExecError> {
//! let mut executor = Executor::new(FixedRoller);
//! let step = Step::new(
//!     Op::Roll,
//!     vec![Arg::Roll(RollArg::N(Value::Number(1))), Arg::Roll(RollArg::D(Value::Number(20)))],
//! );
//! let output = executor.execute(&[step], true).await?;
//! assert_eq!(output.rolls[0].command, "1d20");
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - **`state`**: tokens, results, positional variables, target, run-as, test mode
//! - **`resolve`**: dereferences tagged values against the state
//! - **`roll_command`**: compiles roll arguments into a dice expression
//! - **`algebra`**: assignment folding and Concat/Deduct combination rules
//! - **`executor`**: the step walker and per-operation handlers
//! - **`host`**: the capability trait implemented by embedding applications

pub mod algebra;
pub mod error;
pub mod executor;
pub mod host;
pub mod resolve;
pub mod roll_command;
pub mod state;

pub use error::{Callback, CallbackError, ExecError};
pub use executor::{DEFAULT_TARGET_MESSAGE, Executor, ExecutorOptions};
pub use host::{Host, PromptOption};
pub use roll_command::{RollCommand, synthesize};
pub use state::ExecutionState;
