/// Result alias used across the crate.
pub type ParamcadResult<T> = Result<T, ParamcadError>;

/// Hard errors. Annotation problems never surface here; they become diagnostics.
#[derive(thiserror::Error, Debug)]
pub enum ParamcadError {
    /// Parser input was not valid text.
    #[error("encoding error: {0}")]
    Encoding(String),

    /// Invalid orchestrator or tier configuration.
    #[error("config error: {0}")]
    Config(String),

    /// The geometry engine boundary could not be reached or driven.
    #[error("engine error: {0}")]
    Engine(String),

    /// JSON (de)serialization failure.
    #[error("serialization error: {0}")]
    Serde(String),

    /// Filesystem failure.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Anything else.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ParamcadError {
    /// Build an [`ParamcadError::Encoding`].
    pub fn encoding(msg: impl Into<String>) -> Self {
        Self::Encoding(msg.into())
    }

    /// Build a [`ParamcadError::Config`].
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Build a [`ParamcadError::Engine`].
    pub fn engine(msg: impl Into<String>) -> Self {
        Self::Engine(msg.into())
    }

    /// Build a [`ParamcadError::Serde`].
    pub fn serde(msg: impl Into<String>) -> Self {
        Self::Serde(msg.into())
    }
}

impl From<serde_json::Error> for ParamcadError {
    fn from(e: serde_json::Error) -> Self {
        Self::serde(e.to_string())
    }
}
