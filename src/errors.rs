use thiserror::Error;

use crate::decimal::Money;
use crate::types::FarmerId;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CreditError {
    #[error("validation failed: {message}")]
    Validation {
        message: String,
    },

    #[error("{entity} not found: {id}")]
    NotFound {
        entity: &'static str,
        id: String,
    },

    #[error("insufficient credit: available {available}, requested {requested}")]
    InsufficientCredit {
        available: Money,
        requested: Money,
    },

    #[error("not eligible for credit: {message}")]
    NotEligible {
        message: String,
    },

    #[error("credit suspended for farmer {farmer_id}")]
    CreditSuspended {
        farmer_id: FarmerId,
    },

    #[error("invalid {entity} transition: {from} -> {to}")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        to: String,
    },

    #[error("persistence failure: {message}")]
    Persistence {
        message: String,
    },
}

/// coarse error classification for callers mapping to transport codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    InsufficientCredit,
    NotEligible,
    Conflict,
    Persistence,
}

impl CreditError {
    pub fn validation(message: impl Into<String>) -> Self {
        CreditError::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        CreditError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn persistence(message: impl Into<String>) -> Self {
        CreditError::Persistence {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            CreditError::Validation { .. } => ErrorKind::Validation,
            CreditError::NotFound { .. } => ErrorKind::NotFound,
            CreditError::InsufficientCredit { .. } => ErrorKind::InsufficientCredit,
            CreditError::NotEligible { .. } | CreditError::CreditSuspended { .. } => {
                ErrorKind::NotEligible
            }
            CreditError::InvalidTransition { .. } => ErrorKind::Conflict,
            CreditError::Persistence { .. } => ErrorKind::Persistence,
        }
    }
}

pub type Result<T> = std::result::Result<T, CreditError>;
