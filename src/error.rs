use thiserror::Error;

#[derive(Error, Debug)]
pub enum FinError {
    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("No bank format for {bank} {kind} ({file_format})")]
    UnknownFormat {
        bank: String,
        kind: String,
        file_format: String,
    },

    #[error("Bank format {0} is marked unsupported")]
    UnsupportedFormat(String),

    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),

    #[error("Invalid {field}: {value}")]
    Invalid { field: &'static str, value: String },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("{0}")]
    Other(String),
}

impl FinError {
    pub fn invalid(field: &'static str, value: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            value: value.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FinError>;
