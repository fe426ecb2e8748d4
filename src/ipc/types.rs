use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Config;
use crate::ipc::error::HandlerErr;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Sidecar state owned by the main loop and lent to each handler.
pub struct AppState {
    pub config: Config,
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
}

impl AppState {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            workspace: None,
            db: None,
        }
    }

    pub fn conn(&self) -> Result<&Connection, HandlerErr> {
        self.db
            .as_ref()
            .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))
    }
}
