use serde_json::json;

use crate::analytics;
use crate::bands::SUBJECT_BREAKPOINTS;
use crate::calc;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::bands::legend_rows;
use crate::ipc::handlers::roster::load_roster_rows;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};

fn handle_reports_report_card_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let adm_no = match required_str(req, "admNo") {
        Ok(v) => v,
        Err(e) => return e,
    };
    // With a stream filter the position is within that stream.
    let loaded = match load_roster_rows(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(card) = analytics::report_card(&loaded.rows, adm_no.trim()) else {
        return err(
            &req.id,
            "not_found",
            "student is not on this roster",
            Some(json!({ "admNo": adm_no })),
        );
    };
    ok(
        &req.id,
        json!({
            "exam": loaded.exam,
            "subjects": loaded.cohort.subjects,
            "maxTotal": loaded.cohort.max_total,
            "card": card,
            "subjectLegend": legend_rows(&SUBJECT_BREAKPOINTS),
        }),
    )
}

fn handle_reports_class_list_model(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut loaded = match load_roster_rows(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    calc::sort_by_rank(&mut loaded.rows);
    let summary = analytics::class_summary(&loaded.rows, 0);
    ok(
        &req.id,
        json!({
            "exam": loaded.exam,
            "stream": loaded.stream,
            "family": loaded.cohort.family,
            "subjects": loaded.cohort.subjects,
            "maxTotal": loaded.cohort.max_total,
            "rows": loaded.rows,
            "classAverage": summary.class_average,
            "bandDistribution": summary.band_distribution,
            "totalLegend": legend_rows(loaded.cohort.family.breakpoints()),
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.reportCardModel" => Some(handle_reports_report_card_model(state, req)),
        "reports.classListModel" => Some(handle_reports_class_list_model(state, req)),
        _ => None,
    }
}
