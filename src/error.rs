//! Error types for the ZenDSL engine.
//!
//! Parse-time and run-time failures are separate enums; `EngineError` is
//! the top-level type returned by the engine facade. Every kind is fatal
//! to the current script — there is no in-script recovery.

use thiserror::Error;

use crate::phase::{Phase, Prefix};

/// Failures raised while turning source text into a bound script.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Invalid transition from {from} to {want}")]
    InvalidTransition { from: Phase, want: Prefix },

    #[error("Invalid statement: {0}")]
    InvalidStatement(String),

    #[error("Unknown step: {0}")]
    UnknownStep(String),

    #[error("Could not load scenario '{0}'")]
    ScenarioLoadFailure(String),

    #[error("Script too short to parse ({0} bytes)")]
    TooShort(usize),
}

/// Failures raised while executing a bound script.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("No schema registered under '{0}'")]
    SchemaNotFound(String),

    #[error("Schema '{name}' rejected the value: {reason}")]
    SchemaFailed { name: String, reason: String },

    #[error("Identity error: {0}")]
    Identity(String),

    #[error("Type error: {0}")]
    Type(String),

    #[error("Codec error: {0}")]
    Codec(String),

    #[error("Crypto error: {0}")]
    Crypto(String),
}

impl From<serde_json::Error> for ExecError {
    fn from(err: serde_json::Error) -> Self {
        ExecError::Codec(err.to_string())
    }
}

/// Top-level engine error. The parse and run variants carry the
/// rendered failure report (traceback plus compartment dumps) destined
/// for stderr, and the same state as a JSON document for machine
/// consumers.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("{error}")]
    Parse {
        error: ParseError,
        report: String,
        dump: serde_json::Value,
    },

    #[error("{error}")]
    Run {
        error: ExecError,
        report: String,
        dump: serde_json::Value,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// The failure report for stderr, if one was produced.
    pub fn report(&self) -> Option<&str> {
        match self {
            EngineError::Parse { report, .. } | EngineError::Run { report, .. } => Some(report),
            EngineError::Io(_) => None,
        }
    }

    /// The JSON debug dump of the failure state, if one was produced.
    pub fn debug_dump(&self) -> Option<&serde_json::Value> {
        match self {
            EngineError::Parse { dump, .. } | EngineError::Run { dump, .. } => Some(dump),
            EngineError::Io(_) => None,
        }
    }
}
