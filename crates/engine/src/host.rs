use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use ttml_types::{Program, RollResult};

use crate::error::CallbackError;

/// Option as shown to the user by a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptOption {
    pub key: String,
    pub value: String,
}

/// Capabilities the embedding application provides to the executor.
///
/// Only `roll` is mandatory. The remaining capabilities default to
/// [`CallbackError::NotProvided`], which the executor reports as the matching
/// `No*Handler` error when a program actually needs them.
#[async_trait]
pub trait Host: Send + Sync {
    /// Resolve a dice expression such as `1d20+5`.
    async fn roll(&self, command: &str) -> Result<RollResult>;

    /// Parse macro source of the form `#<macro> <source>` for inline macro calls.
    fn parse(&self, _source: &str) -> Result<Program, CallbackError> {
        Err(CallbackError::NotProvided)
    }

    /// Ask the user to pick one option; returns the selected index.
    async fn prompt(&self, _message: &str, _options: &[PromptOption]) -> Result<String, CallbackError> {
        Err(CallbackError::NotProvided)
    }

    /// Ask the user for free-form text.
    async fn input(&self, _message: &str) -> Result<String, CallbackError> {
        Err(CallbackError::NotProvided)
    }

    /// Ask the user to select a token; returns its name.
    async fn target(&self, _message: &str) -> Result<String, CallbackError> {
        Err(CallbackError::NotProvided)
    }

    /// Call a named host function with native JSON arguments.
    async fn function(&self, _name: &str, _args: Vec<serde_json::Value>) -> Result<serde_json::Value, CallbackError> {
        Err(CallbackError::NotProvided)
    }
}

#[async_trait]
impl<T: Host + ?Sized> Host for std::sync::Arc<T> {
    async fn roll(&self, command: &str) -> Result<RollResult> {
        (**self).roll(command).await
    }

    fn parse(&self, source: &str) -> Result<Program, CallbackError> {
        (**self).parse(source)
    }

    async fn prompt(&self, message: &str, options: &[PromptOption]) -> Result<String, CallbackError> {
        (**self).prompt(message, options).await
    }

    async fn input(&self, message: &str) -> Result<String, CallbackError> {
        (**self).input(message).await
    }

    async fn target(&self, message: &str) -> Result<String, CallbackError> {
        (**self).target(message).await
    }

    async fn function(&self, name: &str, args: Vec<serde_json::Value>) -> Result<serde_json::Value, CallbackError> {
        (**self).function(name, args).await
    }
}
