use thiserror::Error;

#[derive(Error, Debug)]
pub enum FishboneError {
    #[error("Unknown domain: {0}")]
    UnknownDomain(String),

    #[error("Category '{category}' is not part of the {domain} template")]
    UnknownCategory { domain: String, category: String },

    #[error("Invalid rating {0}: factors must be between 1 and 10")]
    InvalidRating(i64),

    #[error("Invalid template: {0}")]
    InvalidTemplate(String),

    #[error("Suggestion error: {0}")]
    Suggestion(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Render error: {0}")]
    Render(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, FishboneError>;
