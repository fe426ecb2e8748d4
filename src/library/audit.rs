use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use super::Result;

/// A book whose counter disagrees with its open requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Discrepancy {
    pub book_id: String,
    pub title: String,
    pub total_copies: i64,
    pub available_copies: i64,
    pub outstanding_requests: i64,
    pub expected_available: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub books_checked: usize,
    pub discrepancies: Vec<Discrepancy>,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.discrepancies.is_empty()
    }
}

/// Recomputes `total - outstanding` for every book and compares it with
/// the stored availability. Read-only.
pub fn audit_library(conn: &Connection) -> Result<AuditReport> {
    let mut stmt = conn.prepare(
        "SELECT b.id, b.title, b.total_copies, b.available_copies,
                (SELECT COUNT(*) FROM borrow_requests r
                 WHERE r.book_id = b.id AND r.status IN ('pending', 'approved'))
         FROM books b
         ORDER BY b.title COLLATE NOCASE, b.id",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok((
                r.get::<_, String>(0)?,
                r.get::<_, String>(1)?,
                r.get::<_, i64>(2)?,
                r.get::<_, i64>(3)?,
                r.get::<_, i64>(4)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let books_checked = rows.len();
    let discrepancies: Vec<Discrepancy> = rows
        .into_iter()
        .filter_map(|(book_id, title, total, available, outstanding)| {
            let expected = total - outstanding;
            let consistent = expected >= 0 && available == expected;
            (!consistent).then(|| Discrepancy {
                book_id,
                title,
                total_copies: total,
                available_copies: available,
                outstanding_requests: outstanding,
                expected_available: expected,
            })
        })
        .collect();

    if discrepancies.is_empty() {
        info!(books_checked, "library audit clean");
    } else {
        for d in &discrepancies {
            warn!(
                book_id = %d.book_id,
                available = d.available_copies,
                expected = d.expected_available,
                "copy accounting discrepancy"
            );
        }
    }
    Ok(AuditReport {
        books_checked,
        discrepancies,
    })
}
