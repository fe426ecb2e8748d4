use crate::ipc::access;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::helpers::{get_bool, get_required_str, parse_params};
use crate::ipc::types::{AppState, Request};
use crate::library::roster::{self, NewStudent};
use chrono::Utc;
use serde_json::json;

fn handle_students_create(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let _ = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let new: NewStudent = parse_params(&req.params, "student")?;
    let student = roster::create_student(conn, new, Utc::now())?;
    Ok(json!({ "student": student }))
}

fn handle_students_list(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let _ = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let include_inactive = get_bool(&req.params, "includeInactive", false)?;
    let students = roster::list_students(conn, include_inactive)?;
    Ok(json!({ "students": students }))
}

fn handle_students_set_active(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let _ = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let student_id = get_required_str(&req.params, "studentId")?;
    let active = req
        .params
        .get("active")
        .and_then(|v| v.as_bool())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing active"))?;
    let student = roster::set_active(conn, &student_id, active)?;
    Ok(json!({ "student": student }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.create" => handle_students_create(state, req),
        "students.list" => handle_students_list(state, req),
        "students.setActive" => handle_students_set_active(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
