use std::{io, path::PathBuf};

use thiserror::Error;

/// Raised when a dynamic value's representation hook fails.
///
/// Never escapes the crate: the safe renderer swaps it for a placeholder.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct ReprError(pub String);

/// The execution engine broke the event contract.
///
/// These are never learner mistakes, so they are reported as internal errors
/// rather than shown in the output stream.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouterError {
    #[error("output part is missing its type")]
    MissingPartType,
    #[error("unknown output part type `{0}`")]
    UnknownPartType(String),
    #[error("traceback part carries no exception")]
    MissingException,
}

/// Failure reported by an [`ExecutionEngine`](crate::ExecutionEngine) run.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("event routing failed: {0}")]
    Router(#[from] RouterError),
    #[error("engine failure: {0}")]
    Internal(String),
}

/// Failure raised by lesson step code.
#[derive(Debug, Clone, Error)]
pub enum StepError {
    /// The step could not parse the learner's code. Counts as "not passed".
    #[error("syntax error: {0}")]
    Syntax(String),
    #[error("step failed: {0}")]
    Failed(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("config parse error: {0}")]
    Parse(#[from] toml_edit::de::Error),
    #[error("config validation error: {0}")]
    Validation(String),
    #[error("unknown highlighting theme `{0}`")]
    UnknownTheme(String),
}

/// Everything the check entry point reports as an internal error.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Engine(EngineError),
    #[error(transparent)]
    Router(#[from] RouterError),
    #[error("unknown step `{step}` on page `{page}`")]
    UnknownStep { page: String, step: String },
    #[error(transparent)]
    Step(StepError),
    #[error("panic during check: {0}")]
    Panic(String),
}

impl From<EngineError> for CheckError {
    /// Contract breaches detected while routing keep their own kind even when
    /// the engine is what propagated them.
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Router(err) => Self::Router(err),
            err @ EngineError::Internal(_) => Self::Engine(err),
        }
    }
}

impl CheckError {
    /// Short machine-readable name for the error family.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Engine(_) => "engine",
            Self::Router(_) => "router",
            Self::UnknownStep { .. } => "unknown_step",
            Self::Step(_) => "step",
            Self::Panic(_) => "panic",
        }
    }
}
