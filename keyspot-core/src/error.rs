use thiserror::Error;

/// All errors produced by keyspot-core.
#[derive(Debug, Error)]
pub enum KeyspotError {
    #[error("ring buffer is full")]
    BufferFull,

    #[error("ring buffer is empty")]
    BufferEmpty,

    #[error("{stage} model invocation failed: {message}")]
    ModelInvocation { stage: &'static str, message: String },

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("engine is already running")]
    AlreadyRunning,

    #[error("engine is not running")]
    NotRunning,

    #[error("ONNX session error: {0}")]
    OnnxSession(String),

    #[error("model file not found: {path}")]
    ModelNotFound { path: std::path::PathBuf },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KeyspotError {
    /// Stable lowercase tag used in `SpotterEvent::Error`.
    pub fn kind(&self) -> &'static str {
        match self {
            KeyspotError::BufferFull => "buffer_full",
            KeyspotError::BufferEmpty => "buffer_empty",
            KeyspotError::ModelInvocation { .. } => "model_invocation",
            KeyspotError::InvalidConfiguration(_) => "invalid_configuration",
            KeyspotError::AlreadyRunning => "already_running",
            KeyspotError::NotRunning => "not_running",
            KeyspotError::OnnxSession(_) => "onnx_session",
            KeyspotError::ModelNotFound { .. } => "model_not_found",
            KeyspotError::Io(_) => "io",
            KeyspotError::Other(_) => "other",
        }
    }

    pub(crate) fn invocation(stage: &'static str, message: impl Into<String>) -> Self {
        KeyspotError::ModelInvocation {
            stage,
            message: message.into(),
        }
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        KeyspotError::InvalidConfiguration(message.into())
    }
}

pub type Result<T> = std::result::Result<T, KeyspotError>;
