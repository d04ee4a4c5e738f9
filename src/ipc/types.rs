use std::path::PathBuf;

use rusqlite::Connection;
use serde::Deserialize;

use crate::cohort::CohortTable;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    /// Builtin cohorts plus the workspace's saved subject overrides.
    pub cohorts: CohortTable,
}
