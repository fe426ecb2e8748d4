use crate::ipc::access;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_required_str, parse_params};
use crate::ipc::types::{AppState, Request};
use crate::library::catalog::{self, BookFilter, BookPatch, NewBook};
use chrono::Utc;
use serde_json::json;
use tracing::info;

type HandlerResult = Result<serde_json::Value, HandlerErr>;

fn handle_books_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let _ = access::actor(&req.params)?;
    let conn = state.conn()?;
    let filter: BookFilter = parse_params(&req.params, "")?;
    let books = catalog::list_books(conn, &filter)?;
    Ok(json!({ "books": books }))
}

fn handle_books_get(state: &mut AppState, req: &Request) -> HandlerResult {
    let _ = access::actor(&req.params)?;
    let conn = state.conn()?;
    let book_id = get_required_str(&req.params, "bookId")?;
    let book = catalog::get_book(conn, &book_id)?;
    let outstanding = catalog::outstanding_count(conn, &book_id)?;
    Ok(json!({ "book": book, "outstandingRequests": outstanding }))
}

fn handle_books_subjects(state: &mut AppState, req: &Request) -> HandlerResult {
    let _ = access::actor(&req.params)?;
    let conn = state.conn()?;
    Ok(json!({ "subjects": catalog::list_subjects(conn)? }))
}

fn handle_books_create(state: &mut AppState, req: &Request) -> HandlerResult {
    let admin_id = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let new: NewBook = parse_params(&req.params, "book")?;
    let book = catalog::create_book(conn, new, Utc::now())?;
    info!(%admin_id, book_id = %book.id, "book created via ipc");
    Ok(json!({ "book": book }))
}

fn handle_books_update(state: &mut AppState, req: &Request) -> HandlerResult {
    let admin_id = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let book_id = get_required_str(&req.params, "bookId")?;
    let patch: BookPatch = parse_params(&req.params, "patch")?;
    let book = catalog::update_book(conn, &book_id, patch)?;
    info!(%admin_id, %book_id, "book updated via ipc");
    Ok(json!({ "book": book }))
}

fn handle_books_delete(state: &mut AppState, req: &Request) -> HandlerResult {
    let admin_id = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let book_id = get_required_str(&req.params, "bookId")?;
    catalog::delete_book(conn, &book_id)?;
    info!(%admin_id, %book_id, "book deleted via ipc");
    Ok(json!({ "deleted": true, "bookId": book_id }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "books.list" => handle_books_list(state, req),
        "books.get" => handle_books_get(state, req),
        "books.subjects" => handle_books_subjects(state, req),
        "books.create" => handle_books_create(state, req),
        "books.update" => handle_books_update(state, req),
        "books.delete" => handle_books_delete(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
