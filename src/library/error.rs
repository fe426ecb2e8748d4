use rusqlite::ErrorCode;
use serde_json::json;
use thiserror::Error;

use super::model::RequestStatus;

/// Failures of catalog and lending operations.
///
/// Every variant aborts the operation that raised it; writes made inside the
/// surrounding transaction are rolled back.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("no copies of \"{title}\" are available")]
    OutOfStock { book_id: String, title: String },

    #[error("an active borrow request already exists for this book")]
    DuplicateRequest { request_id: String },

    #[error("cannot {action} a request that is {from}")]
    InvalidTransition {
        request_id: String,
        from: RequestStatus,
        action: &'static str,
    },

    #[error("copy accounting invariant violated: {0}")]
    InvariantViolation(String),

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("student account is inactive")]
    StudentInactive { student_id: String },

    #[error("book is referenced by {count} borrow request(s)")]
    BookInUse { book_id: String, count: i64 },

    #[error("{0}")]
    Invalid(String),

    #[error("library storage unavailable: {0}")]
    BackendUnavailable(String),
}

impl LibraryError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::OutOfStock { .. } => "out_of_stock",
            Self::DuplicateRequest { .. } => "duplicate_request",
            Self::InvalidTransition { .. } => "invalid_transition",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::NotFound { .. } => "not_found",
            Self::StudentInactive { .. } => "student_inactive",
            Self::BookInUse { .. } => "book_in_use",
            Self::Invalid(_) => "bad_params",
            Self::BackendUnavailable(_) => "backend_unavailable",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::OutOfStock { book_id, .. } => Some(json!({ "bookId": book_id })),
            Self::DuplicateRequest { request_id } => Some(json!({ "requestId": request_id })),
            Self::InvalidTransition {
                request_id, from, ..
            } => Some(json!({ "requestId": request_id, "status": from.as_str() })),
            Self::NotFound { entity, id } => Some(json!({ "entity": entity, "id": id })),
            Self::StudentInactive { student_id } => Some(json!({ "studentId": student_id })),
            Self::BookInUse { book_id, count } => {
                Some(json!({ "bookId": book_id, "requestCount": count }))
            }
            Self::InvariantViolation(_) | Self::Invalid(_) | Self::BackendUnavailable(_) => None,
        }
    }

    pub(crate) fn not_found(entity: &'static str, id: &str) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }
}

impl From<rusqlite::Error> for LibraryError {
    fn from(e: rusqlite::Error) -> Self {
        match &e {
            // CHECK constraints on books back up the in-code accounting checks.
            rusqlite::Error::SqliteFailure(f, _)
                if f.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_CHECK =>
            {
                Self::InvariantViolation(e.to_string())
            }
            // UNIQUE and foreign key failures are bad input, not drift.
            _ if e.sqlite_error_code() == Some(ErrorCode::ConstraintViolation) => {
                Self::Invalid(e.to_string())
            }
            _ => Self::BackendUnavailable(e.to_string()),
        }
    }
}
