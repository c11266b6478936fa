//! Terminal implementation of the engine's host capabilities.
//!
//! Rolls go to the roll service; prompts, input, and target selection are
//! asked on stderr and answered on stdin, leaving stdout for the run output.

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tokio::sync::Mutex;
use tracing::debug;
use ttml_api::RollApiClient;
use ttml_engine::{CallbackError, Host, PromptOption};
use ttml_types::{Program, RollResult};

use crate::loader::Library;

pub struct TerminalHost {
    client: RollApiClient,
    library: Option<Library>,
    stdin: Mutex<Lines<BufReader<Stdin>>>,
}

impl TerminalHost {
    pub fn new(client: RollApiClient, library: Option<Library>) -> Self {
        Self {
            client,
            library,
            stdin: Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
        }
    }

    /// Print `question` and wait for one line; end of input cancels.
    async fn ask(&self, question: &str) -> Result<String, CallbackError> {
        eprint!("{question} ");
        let mut lines = self.stdin.lock().await;
        match lines.next_line().await {
            Ok(Some(line)) => Ok(line.trim().to_string()),
            Ok(None) => Err(CallbackError::Cancelled),
            Err(error) => Err(CallbackError::Failed(error.into())),
        }
    }
}

/// `#attack rest of source` -> `attack`.
fn macro_name(source: &str) -> Option<&str> {
    source.strip_prefix('#')?.split_whitespace().next()
}

#[async_trait]
impl Host for TerminalHost {
    async fn roll(&self, command: &str) -> Result<RollResult> {
        self.client.roll(command).await
    }

    fn parse(&self, source: &str) -> Result<Program, CallbackError> {
        let Some(library) = &self.library else {
            return Err(CallbackError::NotProvided);
        };
        let name = macro_name(source).unwrap_or_default();
        debug!(macro_name = name, "looking up inline macro");
        library
            .get(name)
            .cloned()
            .ok_or_else(|| CallbackError::Failed(anyhow::anyhow!("macro #{name} is not in the library")))
    }

    async fn prompt(&self, message: &str, options: &[PromptOption]) -> Result<String, CallbackError> {
        if !message.is_empty() {
            eprintln!("{message}");
        }
        for (index, option) in options.iter().enumerate() {
            eprintln!("  [{index}] {}: {}", option.key, option.value);
        }
        self.ask("Select an option:").await
    }

    async fn input(&self, message: &str) -> Result<String, CallbackError> {
        self.ask(message).await
    }

    async fn target(&self, message: &str) -> Result<String, CallbackError> {
        let answer = self.ask(message).await?;
        if answer.is_empty() {
            return Err(CallbackError::Cancelled);
        }
        Ok(answer)
    }
}
