use thiserror::Error;

#[derive(Error, Debug)]
pub enum BulkFieldsError {
    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Permalink conflict: {0}")]
    PermalinkConflict(String),

    #[error("Malformed import document: {0}")]
    MalformedImport(String),

    #[error("Unauthorized request: {0}")]
    Unauthorized(String),

    #[error("Invalid anti-forgery token for '{action}'")]
    InvalidToken { action: String },

    #[error("Invalid match strategy: {0}")]
    InvalidStrategy(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, BulkFieldsError>;
