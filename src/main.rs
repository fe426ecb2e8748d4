mod backup;
mod config;
mod db;
mod ipc;
mod library;

use std::io::{self, BufRead, Write};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging() {
    // stdout carries the protocol; logs go to stderr.
    let filter = EnvFilter::try_from_env(config::ENV_LOG).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(false)
        .init();
}

fn main() {
    init_logging();

    let cfg = match config::Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            error!("invalid configuration: {:#}", e);
            std::process::exit(2);
        }
    };
    let preselected = cfg.workspace.clone();
    let mut state = ipc::AppState::new(cfg);
    if let Some(path) = preselected {
        if let Err(e) = ipc::select_workspace(&mut state, &path) {
            warn!(workspace = %path.to_string_lossy(), "could not open workspace: {:#}", e);
        }
    }
    info!(version = env!("CARGO_PKG_VERSION"), "libraryd ready");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(e) => {
                error!("stdin read failed: {}", e);
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let resp = match serde_json::from_str::<ipc::Request>(&line) {
            Ok(req) => ipc::handle_request(&mut state, req),
            Err(e) => {
                // No id to echo back.
                warn!("unparseable request: {}", e);
                let mut resp = ipc::err("", "bad_json", e.to_string(), None);
                resp["id"] = serde_json::Value::Null;
                resp
            }
        };
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }
    info!("stdin closed, shutting down");
}
