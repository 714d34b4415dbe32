use thiserror::Error;

use crate::pipeline::Stage;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Database error: {message}")]
    Database { message: String },

    #[error("Transient failure: {message}")]
    Transient { message: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Environment variable error: {0}")]
    Env(#[from] std::env::VarError),

    #[error("Blocking task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    #[error("Stage '{stage}' failed after {attempts} attempt(s): {source}")]
    StageFailed {
        stage: Stage,
        attempts: u32,
        #[source]
        source: Box<EtlError>,
    },
}

impl EtlError {
    /// Store and I/O failures are worth another attempt; configuration
    /// problems and already-exhausted stages are not.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EtlError::Database { .. } | EtlError::Transient { .. } | EtlError::Io(_)
        )
    }

    /// The stage that exhausted its retry budget, if this is a stage failure.
    pub fn failed_stage(&self) -> Option<Stage> {
        match self {
            EtlError::StageFailed { stage, .. } => Some(*stage),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for EtlError {
    fn from(err: rusqlite::Error) -> Self {
        EtlError::Database {
            message: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EtlError>;
