use thiserror::Error;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("not found")]
    NotFound,

    #[error("access denied")]
    AccessDenied,

    #[error("invalid participant count: expected {expected}, got {actual}")]
    InvalidParticipantCount {
        expected: &'static str,
        actual: usize,
    },

    #[error("duplicate participant")]
    DuplicateParticipant,

    #[error("unsupported operation: {0}")]
    UnsupportedOperation(&'static str),

    #[error("invalid content: {0}")]
    InvalidContent(String),

    #[error("invalid state transition: {0}")]
    InvalidStateTransition(&'static str),

    #[error("edit window expired (max_edit_hours: {max_edit_hours})")]
    EditWindowExpired { max_edit_hours: i64 },

    #[error("event bus error: {0}")]
    Bus(String),
}
