use thiserror::Error;

#[derive(Error, Debug)]
pub enum HierarchyError {
    #[error("Unsupported workbook format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid configuration for '{field}': {details}")]
    InvalidConfig { field: String, details: String },

    #[error("Workbook error: {0}")]
    WorkbookError(#[from] calamine::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Report output is not valid UTF-8: {0}")]
    Utf8Error(#[from] std::string::FromUtf8Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HierarchyError>;
