use crate::backup;
use crate::ipc::access;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::handlers::core::select_workspace;
use crate::ipc::helpers::get_required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn handle_backup_export_workspace_bundle(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let _ = access::require_admin(&req.params)?;
    let out_path = get_required_str(&req.params, "outPath")?;
    let Some(workspace_path) = state.workspace.clone() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };

    let out = PathBuf::from(&out_path);
    let export = backup::export_workspace_bundle(&workspace_path, &out).map_err(|e| {
        HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": out_path }))
    })?;
    info!(path = %out_path, "workspace bundle exported");

    Ok(json!({
        "path": out_path,
        "bundleFormat": export.bundle_format,
        "entryCount": export.entry_count,
        "dbSha256": export.db_sha256
    }))
}

fn handle_backup_import_workspace_bundle(
    state: &mut AppState,
    req: &Request,
) -> Result<serde_json::Value, HandlerErr> {
    let _ = access::require_admin(&req.params)?;
    let in_path = get_required_str(&req.params, "inPath")?;
    let Some(workspace_path) = state.workspace.clone() else {
        return Err(HandlerErr::new("no_workspace", "select a workspace first"));
    };

    let src = PathBuf::from(&in_path);
    if !src.is_file() {
        return Err(HandlerErr::new("not_found", "bundle file not found")
            .with_details(json!({ "path": in_path })));
    }

    // Drop open handle before replacing file.
    state.db = None;
    let import = backup::import_workspace_bundle(&src, &workspace_path);
    // Reopen either way so a failed import leaves the old workspace usable.
    select_workspace(state, &workspace_path)
        .map_err(|e| HandlerErr::new("db_open_failed", format!("{e:#}")))?;
    let import = import.map_err(|e| {
        HandlerErr::new("io_failed", format!("{e:#}")).with_details(json!({ "path": in_path }))
    })?;
    info!(path = %in_path, "workspace bundle imported");

    Ok(json!({
        "workspacePath": workspace_path.to_string_lossy(),
        "bundleFormat": import.bundle_format,
        "dbSha256": import.db_sha256
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "backup.exportWorkspaceBundle" => handle_backup_export_workspace_bundle(state, req),
        "backup.importWorkspaceBundle" => handle_backup_import_workspace_bundle(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
