use serde_json::json;

use crate::bands::{self, Band, SUBJECT_BREAKPOINTS};
use crate::cohort::CohortFamily;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::optional_str;
use crate::ipc::types::{AppState, Request};

pub(super) fn legend_rows(breakpoints: &bands::Breakpoints) -> Vec<serde_json::Value> {
    Band::ALL
        .iter()
        .enumerate()
        .map(|(i, band)| {
            let min = breakpoints.get(i).copied().unwrap_or(0.0);
            json!({
                "band": band,
                "label": band.label(),
                "points": band.points(),
                "min": min,
            })
        })
        .collect()
}

/// Grade wins over an explicit family when both are given.
fn resolve_family(
    state: &AppState,
    req: &Request,
) -> Result<Option<CohortFamily>, serde_json::Value> {
    if let Some(grade) = optional_str(req, "grade")? {
        return state
            .cohorts
            .get(&grade)
            .map(|c| Some(c.family))
            .map_err(|e| calc_err(&req.id, e));
    }
    match optional_str(req, "family")? {
        Some(f) => CohortFamily::parse(&f)
            .map(Some)
            .map_err(|e| calc_err(&req.id, e)),
        None => Ok(None),
    }
}

fn handle_bands_legend(state: &mut AppState, req: &Request) -> serde_json::Value {
    let family = match resolve_family(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut result = json!({ "subject": legend_rows(&SUBJECT_BREAKPOINTS) });
    if let Some(family) = family {
        result["family"] = json!(family);
        result["maxTotal"] = json!(family.max_total());
        result["total"] = json!(legend_rows(family.breakpoints()));
    }
    ok(&req.id, result)
}

fn handle_bands_classify_subject(_state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(raw) = req.params.get("score") else {
        return err(&req.id, "bad_params", "missing score", None);
    };
    let (band, points) = bands::classify_subject_raw(raw);
    ok(
        &req.id,
        json!({ "band": band, "label": band.label(), "points": points }),
    )
}

fn handle_bands_classify_total(state: &mut AppState, req: &Request) -> serde_json::Value {
    let family = match resolve_family(state, req) {
        Ok(Some(v)) => v,
        Ok(None) => return err(&req.id, "bad_params", "missing grade or family", None),
        Err(e) => return e,
    };
    let Some(raw) = req.params.get("total") else {
        return err(&req.id, "bad_params", "missing total", None);
    };
    let (band, points) = bands::classify_total_raw(raw, family);
    ok(
        &req.id,
        json!({
            "family": family,
            "band": band,
            "label": band.label(),
            "points": points,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "bands.legend" => Some(handle_bands_legend(state, req)),
        "bands.classifySubject" => Some(handle_bands_classify_subject(state, req)),
        "bands.classifyTotal" => Some(handle_bands_classify_total(state, req)),
        _ => None,
    }
}
