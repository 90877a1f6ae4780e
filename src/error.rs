use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScoreError {
    #[error("Bad input format: {0}")]
    MalformedInput(String),

    #[error("Bad score format: {0}")]
    InvalidScore(String),

    #[error("Names must be unequal: \"{0}\"")]
    DuplicateParticipant(String),

    #[error("Error: {what} longer than {limit}.")]
    InputTooLong { what: &'static str, limit: usize },

    #[error("No data stored.")]
    NoData,

    #[error("Invalid command: \"{0}\"")]
    InvalidQuery(String),

    #[error("Store unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Corrupt row {row}: {reason}")]
    CorruptRow { row: usize, reason: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Authorization error: {0}")]
    Auth(String),

    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ScoreError {
    /// Errors caused by what the user typed. These are replied verbatim;
    /// everything else is logged and answered with a generic message.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            ScoreError::MalformedInput(_)
                | ScoreError::InvalidScore(_)
                | ScoreError::DuplicateParticipant(_)
                | ScoreError::InputTooLong { .. }
                | ScoreError::NoData
                | ScoreError::InvalidQuery(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ScoreError>;
