use thiserror::Error;

/// Generation stage that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    HeaderSelection,
    Research,
    Writing,
}

impl Stage {
    /// Stable name used in logs and cache keys.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeaderSelection => "headers",
            Self::Research => "research",
            Self::Writing => "writing",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for Quill.
#[derive(Debug, Error)]
pub enum QuillError {
    /// Missing credentials or identifiers. Aborts the whole run.
    #[error("config error: {0}")]
    Config(String),

    /// Template file missing or malformed.
    #[error("template error: {0}")]
    TemplateLoad(String),

    /// A per-subject data source could not be loaded.
    #[error("data load error: {0}")]
    DataLoad(String),

    /// A generation stage failed (API failure, rate limit, malformed output).
    #[error("{stage} stage failed: {message}")]
    Generation { stage: Stage, message: String },

    /// Provider transport error, before a stage is attributed.
    #[error("provider error: {0}")]
    Provider(String),

    /// Queue / history / file persistence error.
    #[error("store error: {0}")]
    Store(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl QuillError {
    /// Attach a stage to a provider error.
    pub fn in_stage(self, stage: Stage) -> Self {
        match self {
            Self::Provider(message) => Self::Generation { stage, message },
            Self::Generation { message, .. } => Self::Generation { stage, message },
            other => Self::Generation {
                stage,
                message: other.to_string(),
            },
        }
    }

    /// Whether this error must abort the whole batch.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
