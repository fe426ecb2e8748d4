use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::model::{timestamp, Book};
use super::{immediate, LibraryError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewBook {
    pub title: String,
    pub author: String,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub pdf_url: Option<String>,
    #[serde(default)]
    pub cover_image: Option<String>,
    pub total_copies: i64,
}

/// Fields left as `None` keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookPatch {
    pub title: Option<String>,
    pub author: Option<String>,
    pub subject: Option<String>,
    pub isbn: Option<String>,
    pub description: Option<String>,
    pub pdf_url: Option<String>,
    pub cover_image: Option<String>,
    pub total_copies: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookFilter {
    /// Case-insensitive match on title or author.
    pub search: Option<String>,
    pub subject: Option<String>,
}

fn required_text(field: &str, value: &str) -> Result<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(LibraryError::Invalid(format!("{} must not be empty", field)));
    }
    Ok(v.to_string())
}

fn optional_text(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

pub fn create_book(conn: &Connection, new: NewBook, now: DateTime<Utc>) -> Result<Book> {
    let title = required_text("title", &new.title)?;
    let author = required_text("author", &new.author)?;
    if new.total_copies < 0 {
        return Err(LibraryError::Invalid(
            "totalCopies must be zero or more".to_string(),
        ));
    }

    let book = Book {
        id: Uuid::new_v4().to_string(),
        title,
        author,
        subject: optional_text(new.subject.as_deref()),
        isbn: optional_text(new.isbn.as_deref()),
        description: optional_text(new.description.as_deref()),
        pdf_url: optional_text(new.pdf_url.as_deref()),
        cover_image: optional_text(new.cover_image.as_deref()),
        total_copies: new.total_copies,
        available_copies: new.total_copies,
        created_at: timestamp(now),
    };
    conn.execute(
        "INSERT INTO books(id, title, author, subject, isbn, description, pdf_url, cover_image,
                           total_copies, available_copies, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            book.id,
            book.title,
            book.author,
            book.subject,
            book.isbn,
            book.description,
            book.pdf_url,
            book.cover_image,
            book.total_copies,
            book.available_copies,
            book.created_at
        ],
    )?;
    info!(book_id = %book.id, copies = book.total_copies, "book added");
    Ok(book)
}

pub fn find_book(conn: &Connection, book_id: &str) -> Result<Option<Book>> {
    let sql = format!("SELECT {} FROM books WHERE id = ?", Book::COLUMNS);
    Ok(conn.query_row(&sql, [book_id], Book::from_row).optional()?)
}

pub fn get_book(conn: &Connection, book_id: &str) -> Result<Book> {
    find_book(conn, book_id)?.ok_or_else(|| LibraryError::not_found("book", book_id))
}

pub fn list_books(conn: &Connection, filter: &BookFilter) -> Result<Vec<Book>> {
    let subject = optional_text(filter.subject.as_deref());
    let sql = format!(
        "SELECT {} FROM books
         WHERE (?1 IS NULL OR subject = ?1)
         ORDER BY title COLLATE NOCASE, id",
        Book::COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut books = stmt
        .query_map([subject], Book::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    // Plain substring match. SQLite's LIKE treats % and _ as wildcards and
    // only folds ASCII case.
    if let Some(needle) = optional_text(filter.search.as_deref()).map(|s| s.to_lowercase()) {
        books.retain(|b| {
            b.title.to_lowercase().contains(&needle) || b.author.to_lowercase().contains(&needle)
        });
    }
    debug!(count = books.len(), "books listed");
    Ok(books)
}

pub fn list_subjects(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT DISTINCT subject FROM books
         WHERE subject IS NOT NULL AND subject <> ''
         ORDER BY subject COLLATE NOCASE",
    )?;
    let subjects = stmt
        .query_map([], |r| r.get::<_, String>(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(subjects)
}

/// Number of pending or approved requests holding a copy of the book.
pub fn outstanding_count(conn: &Connection, book_id: &str) -> Result<i64> {
    Ok(conn.query_row(
        "SELECT COUNT(*) FROM borrow_requests
         WHERE book_id = ? AND status IN ('pending', 'approved')",
        [book_id],
        |r| r.get(0),
    )?)
}

/// Moves `available_copies` by `delta` and returns the new count.
///
/// A result outside `[0, total_copies]` is refused rather than clamped; the
/// guarded update leaves the row untouched in that case.
pub fn adjust_availability(conn: &Connection, book_id: &str, delta: i64) -> Result<i64> {
    let updated: Option<i64> = conn
        .query_row(
            "UPDATE books
             SET available_copies = available_copies + ?1
             WHERE id = ?2
               AND available_copies + ?1 >= 0
               AND available_copies + ?1 <= total_copies
             RETURNING available_copies",
            params![delta, book_id],
            |r| r.get(0),
        )
        .optional()?;
    if let Some(count) = updated {
        debug!(book_id, delta, available = count, "availability adjusted");
        return Ok(count);
    }

    let book = get_book(conn, book_id)?;
    warn!(
        book_id,
        delta,
        available = book.available_copies,
        total = book.total_copies,
        "availability adjustment refused"
    );
    Err(LibraryError::InvariantViolation(format!(
        "adjusting available copies of {} by {} would leave {} of {}",
        book_id,
        delta,
        book.available_copies + delta,
        book.total_copies
    )))
}

/// Changes a book's total and shifts its availability by the same delta,
/// floored at zero.
pub fn update_total_copies(conn: &Connection, book_id: &str, new_total: i64) -> Result<Book> {
    let tx = immediate(conn)?;
    apply_total_copies(&tx, book_id, new_total)?;
    tx.commit()?;
    get_book(conn, book_id)
}

fn apply_total_copies(conn: &Connection, book_id: &str, new_total: i64) -> Result<()> {
    let book = get_book(conn, book_id)?;
    if new_total < 0 {
        return Err(LibraryError::Invalid(
            "totalCopies must be zero or more".to_string(),
        ));
    }
    let outstanding = outstanding_count(conn, book_id)?;
    if new_total < outstanding {
        return Err(LibraryError::InvariantViolation(format!(
            "cannot reduce total copies to {} while {} are reserved or on loan",
            new_total, outstanding
        )));
    }

    let delta = new_total - book.total_copies;
    let available = (book.available_copies + delta).max(0);
    conn.execute(
        "UPDATE books SET total_copies = ?, available_copies = ? WHERE id = ?",
        params![new_total, available, book_id],
    )?;
    info!(
        book_id,
        old_total = book.total_copies,
        new_total,
        available,
        "total copies changed"
    );
    Ok(())
}

pub fn update_book(conn: &Connection, book_id: &str, patch: BookPatch) -> Result<Book> {
    let tx = immediate(conn)?;
    let current = get_book(&tx, book_id)?;

    let title = match patch.title.as_deref() {
        Some(v) => required_text("title", v)?,
        None => current.title,
    };
    let author = match patch.author.as_deref() {
        Some(v) => required_text("author", v)?,
        None => current.author,
    };
    let subject = match patch.subject.as_deref() {
        Some(v) => optional_text(Some(v)),
        None => current.subject,
    };
    let isbn = match patch.isbn.as_deref() {
        Some(v) => optional_text(Some(v)),
        None => current.isbn,
    };
    let description = match patch.description.as_deref() {
        Some(v) => optional_text(Some(v)),
        None => current.description,
    };
    let pdf_url = match patch.pdf_url.as_deref() {
        Some(v) => optional_text(Some(v)),
        None => current.pdf_url,
    };
    let cover_image = match patch.cover_image.as_deref() {
        Some(v) => optional_text(Some(v)),
        None => current.cover_image,
    };
    tx.execute(
        "UPDATE books
         SET title = ?, author = ?, subject = ?, isbn = ?, description = ?, pdf_url = ?, cover_image = ?
         WHERE id = ?",
        params![title, author, subject, isbn, description, pdf_url, cover_image, book_id],
    )?;

    if let Some(total) = patch.total_copies {
        if total != current.total_copies {
            apply_total_copies(&tx, book_id, total)?;
        }
    }
    tx.commit()?;
    get_book(conn, book_id)
}

/// Deletes a book that no borrow request references.
pub fn delete_book(conn: &Connection, book_id: &str) -> Result<()> {
    let tx = immediate(conn)?;
    let _ = get_book(&tx, book_id)?;
    let count: i64 = tx.query_row(
        "SELECT COUNT(*) FROM borrow_requests WHERE book_id = ?",
        [book_id],
        |r| r.get(0),
    )?;
    if count > 0 {
        return Err(LibraryError::BookInUse {
            book_id: book_id.to_string(),
            count,
        });
    }
    tx.execute("DELETE FROM books WHERE id = ?", [book_id])?;
    tx.commit()?;
    info!(book_id, "book deleted");
    Ok(())
}
