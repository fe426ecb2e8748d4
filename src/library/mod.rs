//! Library lending: the book catalog, the borrow-request ledger and the
//! lifecycle that keeps `available_copies` consistent with open requests.
//!
//! Every mutation runs inside a `BEGIN IMMEDIATE` transaction, so the
//! check-then-write on a book's copy counter is serialized by SQLite's
//! write lock across connections and processes.

pub mod audit;
pub mod catalog;
mod error;
pub mod lifecycle;
pub mod model;
pub mod roster;

pub use error::LibraryError;

use rusqlite::{Connection, Transaction, TransactionBehavior};

pub type Result<T> = std::result::Result<T, LibraryError>;

pub(crate) fn immediate(conn: &Connection) -> Result<Transaction<'_>> {
    Ok(Transaction::new_unchecked(conn, TransactionBehavior::Immediate)?)
}
