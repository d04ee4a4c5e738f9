use serde_json::json;
use std::collections::HashSet;

use crate::analytics;
use crate::bands;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_str, parse_exam};
use crate::ipc::types::{AppState, Request};
use crate::store::{MarkEntry, ScoreRepository, SqliteScoreRepository};
use crate::students;

const DEFAULT_ENTERED_BY: &str = "teacher";

fn handle_marks_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam = match parse_exam(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let repo = SqliteScoreRepository::new(conn);
    let sheet = match repo.exam_scores(&exam) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let marks: Vec<serde_json::Value> = sheet
        .entries()
        .into_iter()
        .map(|(adm_no, subject, score)| {
            json!({ "admNo": adm_no, "subject": subject, "score": score })
        })
        .collect();
    ok(
        &req.id,
        json!({ "exam": exam, "marks": marks, "malformed": sheet.malformed }),
    )
}

// Entries arrive loosely typed from the entry grid: scores may be numbers,
// numeric strings, blank or null.
fn parse_entries(req: &Request) -> Result<Vec<MarkEntry>, serde_json::Value> {
    let Some(raw) = req.params.get("entries").and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", "missing entries", None));
    };
    let mut out = Vec::with_capacity(raw.len());
    for (idx, item) in raw.iter().enumerate() {
        let adm_no = item.get("admNo").and_then(|v| v.as_str()).map(str::trim);
        let subject = item.get("subject").and_then(|v| v.as_str()).map(str::trim);
        let (Some(adm_no), Some(subject)) = (adm_no, subject) else {
            return Err(err(
                &req.id,
                "bad_params",
                "each entry needs admNo and subject",
                Some(json!({ "index": idx })),
            ));
        };
        let raw_score = item.get("score").unwrap_or(&serde_json::Value::Null);
        let Some(score) = bands::parse_score_value(raw_score) else {
            return Err(err(
                &req.id,
                "bad_params",
                "score is not a number",
                Some(json!({ "index": idx, "value": raw_score })),
            ));
        };
        out.push(MarkEntry {
            adm_no: adm_no.to_string(),
            subject: subject.to_string(),
            score,
        });
    }
    Ok(out)
}

fn handle_marks_upsert_bulk(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam = match parse_exam(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let entered_by = match optional_str(req, "enteredBy") {
        Ok(v) => v.unwrap_or_else(|| DEFAULT_ENTERED_BY.to_string()),
        Err(e) => return e,
    };
    let cohort = match state.cohorts.get(&exam.grade) {
        Ok(c) => c,
        Err(e) => return calc_err(&req.id, e),
    };
    let entries = match parse_entries(req) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let roster = match students::load_roster(conn, &exam.grade) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let enrolled: HashSet<&str> = roster.iter().map(|s| s.adm_no.as_str()).collect();
    for e in &entries {
        if !enrolled.contains(e.adm_no.as_str()) {
            return err(
                &req.id,
                "not_found",
                format!("{} is not enrolled in {}", e.adm_no, exam.grade),
                Some(json!({ "admNo": e.adm_no })),
            );
        }
        if !cohort.subjects.iter().any(|s| s == &e.subject) {
            return err(
                &req.id,
                "bad_params",
                format!("{} is not a {} subject", e.subject, exam.grade),
                Some(json!({ "subject": e.subject })),
            );
        }
    }

    let mut repo = SqliteScoreRepository::new(conn);
    match repo.upsert_bulk(&exam, &entries, &entered_by) {
        Ok(outcome) => {
            tracing::info!(
                grade = exam.grade.as_str(),
                inserted = outcome.inserted,
                updated = outcome.updated,
                skipped = outcome.skipped,
                "marks saved"
            );
            ok(&req.id, json!(outcome))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_marks_progress(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let exam = match parse_exam(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let cohort = match state.cohorts.get(&exam.grade) {
        Ok(c) => c,
        Err(e) => return calc_err(&req.id, e),
    };
    let roster = match students::load_roster(conn, &exam.grade) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let sheet = match SqliteScoreRepository::new(conn).exam_scores(&exam) {
        Ok(v) => v,
        Err(e) => return calc_err(&req.id, e),
    };
    let report = analytics::entry_progress(&roster, &sheet, cohort);
    ok(&req.id, json!(report))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "marks.get" => Some(handle_marks_get(state, req)),
        "marks.upsertBulk" => Some(handle_marks_upsert_bulk(state, req)),
        "marks.progress" => Some(handle_marks_progress(state, req)),
        _ => None,
    }
}
