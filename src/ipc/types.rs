use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::config::Clock;
use crate::manager::PlacementManager;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Everything one sidecar process knows about its single user session.
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub clock: Clock,
    pub session: PlacementManager,
}
