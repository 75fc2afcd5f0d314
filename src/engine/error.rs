use crate::model::Id;

use super::validation::FieldErrors;

/// What kind of record an id failed to resolve to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Lounge,
    Table,
    Booking,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKind::Lounge => f.write_str("lounge"),
            RecordKind::Table => f.write_str("table"),
            RecordKind::Booking => f.write_str("booking"),
        }
    }
}

#[derive(Debug)]
pub enum EngineError {
    NotFound { kind: RecordKind, id: Id },
    ValidationFailed(FieldErrors),
    Unauthenticated,
    Forbidden(Id),
    InvalidInput(&'static str),
    LimitExceeded(&'static str),
    WalError(String),
}

impl EngineError {
    pub fn lounge_not_found(id: Id) -> Self {
        EngineError::NotFound { kind: RecordKind::Lounge, id }
    }

    pub fn booking_not_found(id: Id) -> Self {
        EngineError::NotFound { kind: RecordKind::Booking, id }
    }

    /// Expected outcomes a caller shows to the user. Everything else is an
    /// infrastructure failure.
    pub fn is_user_facing(&self) -> bool {
        !matches!(self, EngineError::WalError(_))
    }

    pub fn field_errors(&self) -> Option<&FieldErrors> {
        match self {
            EngineError::ValidationFailed(errors) => Some(errors),
            _ => None,
        }
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::NotFound { kind, id } => write!(f, "{kind} not found: {id}"),
            EngineError::ValidationFailed(errors) => write!(f, "validation failed: {errors}"),
            EngineError::Unauthenticated => write!(f, "authentication required"),
            EngineError::Forbidden(id) => write!(f, "not allowed to change booking {id}"),
            EngineError::InvalidInput(msg) => write!(f, "invalid input: {msg}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
