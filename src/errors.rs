use thiserror::Error;

#[derive(Debug, Error)]
pub enum DroidClawError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Oracle communication error: {0}")]
    Oracle(String),

    #[error("Malformed oracle reply: {0}")]
    OracleResponseFormat(String),

    #[error("SSE parsing error: {0}")]
    SseParsing(String),

    #[error("Capture error: {0}")]
    Capture(String),

    #[error("Device error: {0}")]
    Device(String),

    #[error("{0}")]
    Executor(String),

    #[error("Element with id {0} not found on the current screen")]
    ElementNotFound(u32),

    #[error("Invalid scroll direction: {0}")]
    InvalidDirection(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type DroidClawResult<T> = Result<T, DroidClawError>;
