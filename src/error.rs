use thiserror::Error;

#[derive(Error, Debug)]
pub enum QueryCraftError {
    #[error("Schema unavailable: {0}")]
    SchemaUnavailable(String),

    #[error("Schema has no tables to query")]
    EmptySchema,

    #[error("Execution error: {0}")]
    Execution(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl QueryCraftError {
    /// Whether the error invalidates every operation that needs the schema model.
    pub fn is_schema_failure(&self) -> bool {
        matches!(self, QueryCraftError::SchemaUnavailable(_) | QueryCraftError::EmptySchema)
    }
}

pub type Result<T> = std::result::Result<T, QueryCraftError>;
