use rusqlite::Connection;
use serde_json::json;
use std::collections::BTreeMap;

use crate::cohort::{canonical_grade, CohortTable};
use crate::db;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, required_str};
use crate::ipc::types::{AppState, Request};

const OVERRIDES_KEY: &str = "cohorts.overrides";

fn load_overrides(conn: &Connection) -> anyhow::Result<BTreeMap<String, Vec<String>>> {
    match db::settings_get_json(conn, OVERRIDES_KEY)? {
        Some(v) => Ok(serde_json::from_value(v)?),
        None => Ok(BTreeMap::new()),
    }
}

/// Overrides to edit. An unreadable setting is replaced by an empty map, with
/// a warning, so the next save rewrites it in a readable form.
fn overrides_for_update(conn: &Connection) -> BTreeMap<String, Vec<String>> {
    match load_overrides(conn) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %e, "replacing unreadable cohort overrides");
            BTreeMap::new()
        }
    }
}

fn save_overrides(
    conn: &Connection,
    overrides: &BTreeMap<String, Vec<String>>,
) -> anyhow::Result<()> {
    db::settings_set_json(conn, OVERRIDES_KEY, &json!(overrides))
}

/// Builtin cohorts with the workspace's saved overrides applied.
pub fn load_cohort_table(conn: &Connection) -> anyhow::Result<CohortTable> {
    let overrides = load_overrides(conn)?;
    Ok(CohortTable::with_overrides(&overrides)?)
}

fn handle_cohorts_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "cohorts": state.cohorts.list() }))
}

fn handle_cohorts_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let grade = match required_str(req, "grade") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.cohorts.get(&grade) {
        Ok(c) => ok(&req.id, json!({ "cohort": c })),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_cohorts_set_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match required_str(req, "grade").map(|g| canonical_grade(&g)) {
        Ok(Ok(g)) => g,
        Ok(Err(e)) => return calc_err(&req.id, e),
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("subjects").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "missing subjects", None);
    };
    let mut subjects: Vec<String> = Vec::with_capacity(raw.len());
    for v in raw {
        let Some(s) = v.as_str() else {
            return err(
                &req.id,
                "bad_params",
                "subjects must be strings",
                Some(json!({ "subject": v })),
            );
        };
        subjects.push(s.trim().to_string());
    }

    let mut table = state.cohorts.clone();
    if let Err(e) = table.set_subjects(&grade, subjects.clone()) {
        return calc_err(&req.id, e);
    }
    let mut overrides = overrides_for_update(conn);
    overrides.insert(grade.clone(), subjects);
    if let Err(e) = save_overrides(conn, &overrides) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }

    let cohort = match table.get(&grade) {
        Ok(c) => json!(c),
        Err(e) => return calc_err(&req.id, e),
    };
    state.cohorts = table;
    ok(&req.id, json!({ "cohort": cohort }))
}

fn handle_cohorts_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match required_str(req, "grade").map(|g| canonical_grade(&g)) {
        Ok(Ok(g)) => g,
        Ok(Err(e)) => return calc_err(&req.id, e),
        Err(e) => return e,
    };
    let mut overrides = overrides_for_update(conn);
    let removed = overrides.remove(&grade).is_some();
    if let Err(e) = save_overrides(conn, &overrides) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    let table = match CohortTable::with_overrides(&overrides) {
        Ok(t) => t,
        Err(e) => return calc_err(&req.id, e),
    };
    let cohort = match table.get(&grade) {
        Ok(c) => json!(c),
        Err(e) => return calc_err(&req.id, e),
    };
    state.cohorts = table;
    ok(&req.id, json!({ "removed": removed, "cohort": cohort }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cohorts.list" => Some(handle_cohorts_list(state, req)),
        "cohorts.get" => Some(handle_cohorts_get(state, req)),
        "cohorts.setSubjects" => Some(handle_cohorts_set_subjects(state, req)),
        "cohorts.reset" => Some(handle_cohorts_reset(state, req)),
        _ => None,
    }
}
