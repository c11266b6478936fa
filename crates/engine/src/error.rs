use std::time::Duration;

use thiserror::Error;

/// Failure of a single `execute` call. Every variant aborts the whole run.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Cannot find token {name}")]
    TokenNotFound { name: String },

    #[error("Cannot find token attribute @{token}.{attribute}")]
    AttributeNotFound { token: String, attribute: String },

    #[error("No target selected")]
    NoTargetSelected,

    #[error("Variable ${name} is not set and can not be used")]
    VariableNotSet { name: String },

    #[error("Token macro @{token}->{macro_name} not found")]
    MacroNotFound { token: String, macro_name: String },

    #[error("No prompt callback provided")]
    NoPromptHandler,

    #[error("No input callback provided")]
    NoInputHandler,

    #[error("No target callback provided")]
    NoTargetHandler,

    #[error("No function callback provided for {name}")]
    NoFunctionHandler { name: String },

    #[error("No parser provided for inline macros")]
    NoParser,

    #[error("{callback} encountered an error or was cancelled: {reason}")]
    HostCallbackCancelled { callback: Callback, reason: String },

    #[error("{callback} did not respond within {timeout:?}")]
    CallbackTimedOut { callback: Callback, timeout: Duration },

    #[error("Prompt selection '{selection}' does not match any option")]
    InvalidPromptSelection { selection: String },

    #[error("Invalid attribute path @{token}.{path}: {reason}")]
    InvalidAttributePath { token: String, path: String, reason: String },

    #[error("Cannot {operation} {operand} onto {existing}")]
    IncompatibleOperands {
        operation: &'static str,
        existing: &'static str,
        operand: &'static str,
    },

    #[error("Division by zero")]
    DivisionByZero,

    #[error("{kind} cannot be used as an assignment destination")]
    InvalidDestination { kind: &'static str },

    #[error("Resolution exceeded {depth} nested references")]
    ResolutionDepthExceeded { depth: usize },

    #[error("Embedded {op} steps do not produce a value")]
    UnsupportedEmbeddedStep { op: String },

    #[error("Roll service error: {0}")]
    RollService(#[source] anyhow::Error),

    #[error("Parser error: {0}")]
    Parser(#[source] anyhow::Error),
}

/// Host capability named in callback errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Callback {
    Roll,
    Prompt,
    Input,
    Target,
    Function,
    Parser,
}

impl std::fmt::Display for Callback {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Callback::Roll => "Roll",
            Callback::Prompt => "Prompt",
            Callback::Input => "Input",
            Callback::Target => "Target",
            Callback::Function => "Function",
            Callback::Parser => "Parser",
        };
        f.write_str(label)
    }
}

/// Error returned by optional host capabilities.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// The host does not implement this capability.
    #[error("callback not provided")]
    NotProvided,
    /// The user dismissed the request.
    #[error("cancelled")]
    Cancelled,
    #[error(transparent)]
    Failed(#[from] anyhow::Error),
}

impl CallbackError {
    /// Map a host failure onto the run error for `callback`, using `missing` when
    /// the capability is absent.
    pub(crate) fn into_exec(self, callback: Callback, missing: ExecError) -> ExecError {
        match self {
            CallbackError::NotProvided => missing,
            CallbackError::Cancelled => ExecError::HostCallbackCancelled {
                callback,
                reason: "cancelled".into(),
            },
            CallbackError::Failed(error) => match callback {
                Callback::Parser => ExecError::Parser(error),
                _ => ExecError::HostCallbackCancelled {
                    callback,
                    reason: format!("{error:#}"),
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_match_user_facing_wording() {
        let missing_variable = ExecError::VariableNotSet {
            name: "schmeckles".into(),
        };
        assert_eq!(missing_variable.to_string(), "Variable $schmeckles is not set and can not be used");

        let missing_attribute = ExecError::AttributeNotFound {
            token: "me".into(),
            attribute: "grapples".into(),
        };
        assert_eq!(missing_attribute.to_string(), "Cannot find token attribute @me.grapples");

        let missing_macro = ExecError::MacroNotFound {
            token: "me".into(),
            macro_name: "attack".into(),
        };
        assert_eq!(missing_macro.to_string(), "Token macro @me->attack not found");
    }

    #[test]
    fn unsupported_callbacks_map_to_their_missing_handler_error() {
        let error = CallbackError::NotProvided.into_exec(Callback::Prompt, ExecError::NoPromptHandler);
        assert!(matches!(error, ExecError::NoPromptHandler));

        let cancelled = CallbackError::Cancelled.into_exec(Callback::Target, ExecError::NoTargetHandler);
        assert_eq!(cancelled.to_string(), "Target encountered an error or was cancelled: cancelled");
    }

    #[test]
    fn parser_failures_pass_through() {
        let error = CallbackError::Failed(anyhow::anyhow!("unexpected token")).into_exec(Callback::Parser, ExecError::NoParser);
        assert!(matches!(error, ExecError::Parser(_)));
    }
}
