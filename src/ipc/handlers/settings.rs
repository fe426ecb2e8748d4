use crate::config::{validate_loan_period, LibrarySettings};
use crate::ipc::access;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use tracing::info;

fn settings_json(s: &LibrarySettings) -> serde_json::Value {
    json!({ "loanPeriodDays": s.loan_period_days })
}

fn handle_settings_get(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let _ = access::actor(&req.params)?;
    let conn = state.conn()?;
    let settings = LibrarySettings::load(conn)
        .map_err(|e| HandlerErr::new("db_query_failed", format!("{e:#}")))?;
    Ok(settings_json(&settings))
}

fn handle_settings_update(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let admin_id = access::require_admin(&req.params)?;
    let conn = state.conn()?;
    let days = req
        .params
        .get("loanPeriodDays")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing loanPeriodDays"))?;
    validate_loan_period(days).map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;

    let settings = LibrarySettings {
        loan_period_days: days,
    };
    settings
        .save(conn)
        .map_err(|e| HandlerErr::new("db_update_failed", format!("{e:#}")))?;
    info!(%admin_id, loan_period_days = days, "library settings updated");
    Ok(settings_json(&settings))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "settings.get" => handle_settings_get(state, req),
        "settings.update" => handle_settings_update(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
