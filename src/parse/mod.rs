//! Free-text match input: normalization, length guards and score parsing

pub mod normalize;
pub mod score;

pub use normalize::normalize;
pub use score::{parse_line, parse_tokens, split_score};

use crate::error::{Result, ScoreError};

/// Upper bound for a whole message (1000 lines of 25 chars)
pub const MESSAGE_MAX_LEN: usize = 25000;

/// Upper bound for one line (two names of up to 20 chars plus a result)
pub const LINE_MAX_LEN: usize = 30;

/// Reject messages that are too long to be processed at all
pub fn check_message_len(text: &str) -> Result<()> {
    if text.chars().count() > MESSAGE_MAX_LEN {
        return Err(ScoreError::InputTooLong {
            what: "Message",
            limit: MESSAGE_MAX_LEN,
        });
    }
    Ok(())
}

/// Reject a single overlong line
pub fn check_line_len(line: &str) -> Result<()> {
    if line.chars().count() > LINE_MAX_LEN {
        return Err(ScoreError::InputTooLong {
            what: "Line",
            limit: LINE_MAX_LEN,
        });
    }
    Ok(())
}
