use thiserror::Error;

#[derive(Debug, Error)]
pub enum AttrError {
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("validation error: {message}")]
    Validation { message: String },
    #[error("decode error: {message}")]
    Decode { message: String },
    #[error("transaction error: {message}")]
    Transaction { message: String },
    #[error("constraint violation: {message}")]
    Constraint { message: String },
    #[error("storage error: {message}")]
    Storage { message: String },
}

impl AttrError {
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
        }
    }

    pub fn transaction(message: impl Into<String>) -> Self {
        Self::Transaction {
            message: message.into(),
        }
    }

    pub fn constraint(message: impl Into<String>) -> Self {
        Self::Constraint {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Only begin/commit failures may succeed on a second attempt. A corrupted
    /// value or a duplicated row stays broken no matter how often it is read.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transaction { .. })
    }
}

pub type AttrResult<T> = Result<T, AttrError>;

impl From<sea_orm::DbErr> for AttrError {
    fn from(value: sea_orm::DbErr) -> Self {
        AttrError::storage(value.to_string())
    }
}
