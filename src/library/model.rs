use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Approved,
    Rejected,
    Completed,
}

/// Admin-driven moves out of a non-terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Approve,
    Reject,
    Complete,
}

impl RequestStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }

    /// Pending and approved requests each hold one copy of their book.
    pub const fn holds_copy(&self) -> bool {
        matches!(self, Self::Pending | Self::Approved)
    }

    /// Change to the book's available copies when a request moves from
    /// `self` to `next`.
    pub const fn availability_delta(self, next: Self) -> i64 {
        self.holds_copy() as i64 - next.holds_copy() as i64
    }

    /// The transition table. `None` means the move is not allowed.
    pub const fn apply(self, transition: Transition) -> Option<Self> {
        match (self, transition) {
            (Self::Pending, Transition::Approve) => Some(Self::Approved),
            (Self::Pending, Transition::Reject) => Some(Self::Rejected),
            (Self::Approved, Transition::Complete) => Some(Self::Completed),
            _ => None,
        }
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Transition {
    pub const fn verb(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub subject: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub pdf_url: Option<String>,
    pub cover_image: Option<String>,
    pub total_copies: i64,
    pub available_copies: i64,
    pub created_at: String,
}

impl Book {
    pub(crate) const COLUMNS: &'static str =
        "id, title, author, subject, isbn, description, pdf_url, cover_image,
         total_copies, available_copies, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            title: r.get(1)?,
            author: r.get(2)?,
            subject: r.get(3)?,
            isbn: r.get(4)?,
            description: r.get(5)?,
            pdf_url: r.get(6)?,
            cover_image: r.get(7)?,
            total_copies: r.get(8)?,
            available_copies: r.get(9)?,
            created_at: r.get(10)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequest {
    pub id: String,
    pub book_id: String,
    pub student_id: String,
    pub status: RequestStatus,
    pub request_date: String,
    pub issue_date: Option<String>,
    /// Due date, set on approval.
    pub return_date: Option<String>,
    pub actual_return_date: Option<String>,
    pub notes: String,
}

impl BorrowRequest {
    pub(crate) const COLUMNS: &'static str =
        "id, book_id, student_id, status, request_date, issue_date, return_date, actual_return_date, notes";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        let raw_status: String = r.get(3)?;
        let status = RequestStatus::parse(&raw_status).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                3,
                rusqlite::types::Type::Text,
                format!("unknown borrow request status: {}", raw_status).into(),
            )
        })?;
        Ok(Self {
            id: r.get(0)?,
            book_id: r.get(1)?,
            student_id: r.get(2)?,
            status,
            request_date: r.get(4)?,
            issue_date: r.get(5)?,
            return_date: r.get(6)?,
            actual_return_date: r.get(7)?,
            notes: r.get(8)?,
        })
    }
}

/// A request joined with the titles and names the lending screens show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowRequestView {
    #[serde(flatten)]
    pub request: BorrowRequest,
    pub book_title: String,
    pub book_author: String,
    pub student_no: String,
    pub student_name: String,
    /// Reading link, shown only while the loan is approved.
    pub pdf_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: String,
    pub student_no: String,
    pub first_name: String,
    pub last_name: String,
    pub class_name: Option<String>,
    pub is_active: bool,
    pub created_at: String,
}

impl Student {
    pub(crate) const COLUMNS: &'static str =
        "id, student_no, first_name, last_name, class_name, is_active, created_at";

    pub(crate) fn from_row(r: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: r.get(0)?,
            student_no: r.get(1)?,
            first_name: r.get(2)?,
            last_name: r.get(3)?,
            class_name: r.get(4)?,
            is_active: r.get::<_, i64>(5)? != 0,
            created_at: r.get(6)?,
        })
    }
}

pub fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
