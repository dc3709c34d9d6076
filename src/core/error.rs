use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Upstream returned {code}: {message}")]
    UpstreamStatus { code: String, message: String },

    #[error("Mapping error: field '{field}' has non-numeric value {value}")]
    Mapping { field: &'static str, value: String },

    #[error("Write error: {0}")]
    Write(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl PipelineError {
    /// Short label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Http(_) | PipelineError::Transport(_) => "transport",
            PipelineError::Parse(_) => "parse",
            PipelineError::UpstreamStatus { .. } => "upstream_status",
            PipelineError::Mapping { .. } => "mapping",
            PipelineError::Write(_) => "write",
            PipelineError::Config(_) => "config",
        }
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
