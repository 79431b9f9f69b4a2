use thiserror::Error;

pub type CoreResult<T> = Result<T, CoreError>;

pub const USER_NOT_FOUND: &str = "User not found";
pub const POST_NOT_FOUND: &str = "Post not found";
pub const CONVERSATION_NOT_FOUND: &str = "Conversation not found";
pub const REPORT_NOT_FOUND: &str = "Report not found";
pub const MUTUAL_FOLLOW_REQUIRED: &str = "Mutual follow required";
pub const ADMIN_REQUIRED: &str = "Admin access required";

/// Failure kinds surfaced by every engine operation.
///
/// `Validation`, `NotFound` and `Forbidden` carry user-facing messages.
/// `Internal` wraps store failures and must never be shown verbatim.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(&'static str),

    #[error("{0}")]
    Forbidden(&'static str),

    #[error("{0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl CoreError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}
