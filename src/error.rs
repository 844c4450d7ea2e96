#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Invalid timestamp '{value}' on line {line}: {source}")]
    TimestampError {
        line: usize,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Output error: {0}")]
    OutputError(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileNotFound {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file: {0}")]
    InvalidFile(#[from] serde_yaml::Error),

    #[error("Unknown column '{0}'. Available columns: ip, timestamp, method, url, status, size, query_parameters")]
    UnknownColumn(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<serde_json::Error> for ProcessingError {
    fn from(err: serde_json::Error) -> Self {
        ProcessingError::OutputError(format!("JSON encoding error: {}", err))
    }
}
