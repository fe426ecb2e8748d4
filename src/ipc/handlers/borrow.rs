use crate::config::LibrarySettings;
use crate::ipc::access;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_bool, get_optional_str, get_required_str};
use crate::ipc::types::{AppState, Request};
use crate::library::audit;
use crate::library::lifecycle;
use crate::library::model::RequestStatus;
use chrono::Utc;
use serde_json::json;
use tracing::info;

type HandlerResult = Result<serde_json::Value, HandlerErr>;

fn handle_borrow_request(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = access::require_student(&req.params)?;
    let conn = state.conn()?;
    let book_id = get_required_str(&req.params, "bookId")?;
    let notes = get_optional_str(&req.params, "notes").unwrap_or_default();
    let request = lifecycle::create_request(conn, &book_id, &student_id, &notes, Utc::now())?;
    Ok(json!({ "request": request }))
}

fn handle_borrow_mine(state: &mut AppState, req: &Request) -> HandlerResult {
    let student_id = access::require_student(&req.params)?;
    let conn = state.conn()?;
    let include_closed = get_bool(&req.params, "includeClosed", false)?;
    let requests = lifecycle::list_student_requests(conn, &student_id, include_closed)?;
    Ok(json!({ "requests": requests }))
}

fn handle_borrow_list(state: &mut AppState, req: &Request) -> HandlerResult {
    let _ = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let status = match get_optional_str(&req.params, "status") {
        Some(raw) => Some(RequestStatus::parse(&raw).ok_or_else(|| {
            HandlerErr::new("bad_params", format!("unknown status: {}", raw))
        })?),
        None => None,
    };
    let requests = lifecycle::list_requests(conn, status)?;
    Ok(json!({ "requests": requests }))
}

fn handle_borrow_approve(state: &mut AppState, req: &Request) -> HandlerResult {
    let admin_id = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let request_id = get_required_str(&req.params, "requestId")?;
    let settings = LibrarySettings::load(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", format!("{e:#}")))?;
    let request =
        lifecycle::approve_request(conn, &request_id, Utc::now(), settings.loan_period())?;
    info!(%admin_id, %request_id, "borrow request approved via ipc");
    Ok(json!({ "request": request }))
}

fn handle_borrow_reject(state: &mut AppState, req: &Request) -> HandlerResult {
    let admin_id = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let request_id = get_required_str(&req.params, "requestId")?;
    let notes = get_optional_str(&req.params, "notes");
    let request = lifecycle::reject_request(conn, &request_id, notes.as_deref())?;
    info!(%admin_id, %request_id, "borrow request rejected via ipc");
    Ok(json!({ "request": request }))
}

fn handle_borrow_complete(state: &mut AppState, req: &Request) -> HandlerResult {
    let admin_id = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let request_id = get_required_str(&req.params, "requestId")?;
    let request = lifecycle::complete_return(conn, &request_id, Utc::now())?;
    info!(%admin_id, %request_id, "book returned via ipc");
    Ok(json!({ "request": request }))
}

fn handle_library_audit(state: &mut AppState, req: &Request) -> HandlerResult {
    let _ = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let report = audit::audit_library(conn)?;
    Ok(json!({ "clean": report.is_clean(), "report": report }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "borrow.request" => handle_borrow_request(state, req),
        "borrow.mine" => handle_borrow_mine(state, req),
        "borrow.list" => handle_borrow_list(state, req),
        "borrow.approve" => handle_borrow_approve(state, req),
        "borrow.reject" => handle_borrow_reject(state, req),
        "borrow.complete" => handle_borrow_complete(state, req),
        "library.audit" => handle_library_audit(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
