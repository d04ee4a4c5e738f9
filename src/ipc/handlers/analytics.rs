use serde_json::json;

use crate::analytics;
use crate::ipc::error::ok;
use crate::ipc::handlers::roster::load_roster_rows;
use crate::ipc::helpers::optional_usize;
use crate::ipc::types::{AppState, Request};

fn handle_analytics_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let top_n = match optional_usize(req, "topN", analytics::DEFAULT_TOP_N) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let loaded = match load_roster_rows(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let summary = analytics::class_summary(&loaded.rows, top_n);
    ok(
        &req.id,
        json!({ "exam": loaded.exam, "stream": loaded.stream, "summary": summary }),
    )
}

fn handle_analytics_subjects(state: &mut AppState, req: &Request) -> serde_json::Value {
    let top_n = match optional_usize(req, "topN", analytics::DEFAULT_TOP_N) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let loaded = match load_roster_rows(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let analysis = analytics::subject_analysis(&loaded.rows, &loaded.cohort, top_n);
    ok(&req.id, json!({ "exam": loaded.exam, "analysis": analysis }))
}

fn handle_analytics_streams(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = match load_roster_rows(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let comparison = analytics::stream_comparison(&loaded.rows, &loaded.cohort);
    ok(&req.id, json!({ "exam": loaded.exam, "comparison": comparison }))
}

fn handle_analytics_gender(state: &mut AppState, req: &Request) -> serde_json::Value {
    let loaded = match load_roster_rows(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let analysis = analytics::gender_analysis(&loaded.rows, &loaded.cohort);
    ok(&req.id, json!({ "exam": loaded.exam, "analysis": analysis }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "analytics.class" => Some(handle_analytics_class(state, req)),
        "analytics.subjects" => Some(handle_analytics_subjects(state, req)),
        "analytics.streams" => Some(handle_analytics_streams(state, req)),
        "analytics.gender" => Some(handle_analytics_gender(state, req)),
        _ => None,
    }
}
