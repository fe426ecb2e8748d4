//! Borrow-request lifecycle.
//!
//! ```text
//! pending --approve--> approved --complete--> completed
//!    \
//!     --reject--> rejected
//! ```
//!
//! A request holds one copy of its book from creation until it is rejected
//! or completed. Creation takes the copy; rejection and completion give it
//! back; approval leaves the counter alone.

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::{info, warn};
use uuid::Uuid;

use super::catalog;
use super::model::{timestamp, BorrowRequest, BorrowRequestView, RequestStatus, Transition};
use super::roster;
use super::{immediate, LibraryError, Result};

pub const DEFAULT_LOAN_PERIOD_DAYS: i64 = 14;

pub fn create_request(
    conn: &Connection,
    book_id: &str,
    student_id: &str,
    notes: &str,
    now: DateTime<Utc>,
) -> Result<BorrowRequest> {
    let tx = immediate(conn)?;

    let student = roster::get_student(&tx, student_id)?;
    if !student.is_active {
        return Err(LibraryError::StudentInactive {
            student_id: student.id,
        });
    }
    let book = catalog::get_book(&tx, book_id)?;

    let existing: Option<String> = tx
        .query_row(
            "SELECT id FROM borrow_requests
             WHERE book_id = ? AND student_id = ? AND status IN ('pending', 'approved')
             LIMIT 1",
            [book_id, student_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(request_id) = existing {
        warn!(book_id, student_id, %request_id, "duplicate borrow request refused");
        return Err(LibraryError::DuplicateRequest { request_id });
    }

    if book.available_copies <= 0 {
        warn!(book_id, student_id, "borrow request refused, no copies left");
        return Err(LibraryError::OutOfStock {
            book_id: book.id,
            title: book.title,
        });
    }

    let request = BorrowRequest {
        id: Uuid::new_v4().to_string(),
        book_id: book.id,
        student_id: student.id,
        status: RequestStatus::Pending,
        request_date: timestamp(now),
        issue_date: None,
        return_date: None,
        actual_return_date: None,
        notes: notes.trim().to_string(),
    };
    tx.execute(
        "INSERT INTO borrow_requests(id, book_id, student_id, status, request_date, notes)
         VALUES(?, ?, ?, ?, ?, ?)",
        params![
            request.id,
            request.book_id,
            request.student_id,
            request.status.as_str(),
            request.request_date,
            request.notes
        ],
    )?;
    let available = catalog::adjust_availability(&tx, &request.book_id, -1)?;
    tx.commit()?;

    info!(
        request_id = %request.id,
        book_id = %request.book_id,
        student_id = %request.student_id,
        available,
        "borrow request created"
    );
    Ok(request)
}

pub fn approve_request(
    conn: &Connection,
    request_id: &str,
    now: DateTime<Utc>,
    loan_period: Duration,
) -> Result<BorrowRequest> {
    if loan_period <= Duration::zero() {
        return Err(LibraryError::Invalid(
            "loan period must be positive".to_string(),
        ));
    }
    let due = now + loan_period;
    apply(conn, request_id, Transition::Approve, |tx, req| {
        tx.execute(
            "UPDATE borrow_requests SET status = ?, issue_date = ?, return_date = ?
             WHERE id = ? AND status = ?",
            params![
                RequestStatus::Approved.as_str(),
                timestamp(now),
                timestamp(due),
                req.id,
                req.status.as_str()
            ],
        )
    })
}

pub fn reject_request(
    conn: &Connection,
    request_id: &str,
    notes: Option<&str>,
) -> Result<BorrowRequest> {
    let notes = notes.map(str::trim).filter(|s| !s.is_empty());
    apply(conn, request_id, Transition::Reject, |tx, req| {
        tx.execute(
            "UPDATE borrow_requests SET status = ?, notes = COALESCE(?, notes)
             WHERE id = ? AND status = ?",
            params![
                RequestStatus::Rejected.as_str(),
                notes,
                req.id,
                req.status.as_str()
            ],
        )
    })
}

pub fn complete_return(
    conn: &Connection,
    request_id: &str,
    now: DateTime<Utc>,
) -> Result<BorrowRequest> {
    apply(conn, request_id, Transition::Complete, |tx, req| {
        tx.execute(
            "UPDATE borrow_requests SET status = ?, actual_return_date = ?
             WHERE id = ? AND status = ?",
            params![
                RequestStatus::Completed.as_str(),
                timestamp(now),
                req.id,
                req.status.as_str()
            ],
        )
    })
}

/// Runs one transition: status check, row update, copy adjustment, all in a
/// single immediate transaction.
fn apply<F>(
    conn: &Connection,
    request_id: &str,
    transition: Transition,
    write: F,
) -> Result<BorrowRequest>
where
    F: FnOnce(&Connection, &BorrowRequest) -> rusqlite::Result<usize>,
{
    let tx = immediate(conn)?;
    let current = get_request(&tx, request_id)?;
    let Some(next) = current.status.apply(transition) else {
        warn!(
            request_id,
            status = %current.status,
            action = transition.verb(),
            "transition refused"
        );
        return Err(LibraryError::InvalidTransition {
            request_id: current.id,
            from: current.status,
            action: transition.verb(),
        });
    };

    if write(&tx, &current)? != 1 {
        return Err(LibraryError::InvariantViolation(format!(
            "request {} changed while being updated",
            request_id
        )));
    }
    let delta = current.status.availability_delta(next);
    let available = if delta != 0 {
        Some(catalog::adjust_availability(&tx, &current.book_id, delta)?)
    } else {
        None
    };
    tx.commit()?;

    info!(
        request_id,
        book_id = %current.book_id,
        from = %current.status,
        to = %next,
        available,
        "borrow request {}",
        next
    );
    get_request(conn, request_id)
}

pub fn get_request(conn: &Connection, request_id: &str) -> Result<BorrowRequest> {
    let sql = format!(
        "SELECT {} FROM borrow_requests WHERE id = ?",
        BorrowRequest::COLUMNS
    );
    conn.query_row(&sql, [request_id], BorrowRequest::from_row)
        .optional()?
        .ok_or_else(|| LibraryError::not_found("borrow request", request_id))
}

const VIEW_SELECT: &str = "SELECT r.id, r.book_id, r.student_id, r.status, r.request_date,
        r.issue_date, r.return_date, r.actual_return_date, r.notes,
        b.title, b.author, s.student_no, s.last_name || ', ' || s.first_name, b.pdf_url
     FROM borrow_requests r
     JOIN books b ON b.id = r.book_id
     JOIN students s ON s.id = r.student_id";

fn view_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<BorrowRequestView> {
    let request = BorrowRequest::from_row(r)?;
    let pdf_url = match request.status {
        RequestStatus::Approved => r.get(13)?,
        _ => None,
    };
    Ok(BorrowRequestView {
        request,
        book_title: r.get(9)?,
        book_author: r.get(10)?,
        student_no: r.get(11)?,
        student_name: r.get(12)?,
        pdf_url,
    })
}

/// All requests, newest first, optionally restricted to one status.
pub fn list_requests(
    conn: &Connection,
    status: Option<RequestStatus>,
) -> Result<Vec<BorrowRequestView>> {
    let sql = format!(
        "{} WHERE (?1 IS NULL OR r.status = ?1)
         ORDER BY r.request_date DESC, r.rowid DESC",
        VIEW_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([status.map(|s| s.as_str())], view_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

/// A student's requests, newest first. Closed requests (rejected or
/// completed) are left out unless `include_closed` is set.
pub fn list_student_requests(
    conn: &Connection,
    student_id: &str,
    include_closed: bool,
) -> Result<Vec<BorrowRequestView>> {
    let _ = roster::get_student(conn, student_id)?;
    let sql = format!(
        "{} WHERE r.student_id = ?1
           AND (?2 OR r.status IN ('pending', 'approved'))
         ORDER BY r.request_date DESC, r.rowid DESC",
        VIEW_SELECT
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![student_id, include_closed], view_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}
