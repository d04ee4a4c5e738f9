use rusqlite::Connection;
use serde_json::json;

use crate::ipc::error::{calc_err, err};
use crate::ipc::types::{AppState, Request};
use crate::store::ExamInstance;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// Missing, null and blank strings all read as `None`.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_str() {
            Some(s) if s.trim().is_empty() => Ok(None),
            Some(s) => Ok(Some(s.trim().to_string())),
            None => Err(err(
                &req.id,
                "bad_params",
                format!("{} must be a string", key),
                Some(json!({ key: v })),
            )),
        },
    }
}

pub fn optional_usize(
    req: &Request,
    key: &str,
    default: usize,
) -> Result<usize, serde_json::Value> {
    match req.params.get(key) {
        None => Ok(default),
        Some(v) if v.is_null() => Ok(default),
        Some(v) => v
            .as_u64()
            .map(|n| n as usize)
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("{} must be a non-negative integer", key),
                    Some(json!({ key: v })),
                )
            }),
    }
}

pub fn db_conn<'a>(
    state: &'a AppState,
    req: &Request,
) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Reads `grade`, `term`, `year`, `examType`.
pub fn parse_exam(req: &Request) -> Result<ExamInstance, serde_json::Value> {
    let grade = required_str(req, "grade")?;
    let term = required_str(req, "term")?;
    let exam_type = required_str(req, "examType")?;
    let Some(year) = req.params.get("year").and_then(|v| v.as_i64()) else {
        return Err(err(&req.id, "bad_params", "missing year", None));
    };
    ExamInstance::new(&grade, &term, year, &exam_type).map_err(|e| calc_err(&req.id, e))
}
