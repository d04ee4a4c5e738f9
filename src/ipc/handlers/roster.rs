use serde_json::json;

use crate::calc::{self, ExamContext, RosterRow};
use crate::cohort::Cohort;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_str, parse_exam};
use crate::ipc::types::{AppState, Request};
use crate::store::{ExamInstance, SqliteScoreRepository};
use crate::students;

/// Everything a roster-derived method needs: the exam key, the cohort it was
/// computed against and the enriched rows (roster order unless sorted).
pub(super) struct LoadedRoster {
    pub exam: ExamInstance,
    pub cohort: Cohort,
    pub stream: Option<String>,
    pub rows: Vec<RosterRow>,
}

pub(super) fn load_roster_rows(
    state: &AppState,
    req: &Request,
) -> Result<LoadedRoster, serde_json::Value> {
    let conn = db_conn(state, req)?;
    let exam = parse_exam(req)?;
    let stream = optional_str(req, "stream")?;
    let cohort = state
        .cohorts
        .get(&exam.grade)
        .map_err(|e| calc_err(&req.id, e))?
        .clone();
    let roster = students::load_roster(conn, &exam.grade).map_err(|e| calc_err(&req.id, e))?;
    let repo = SqliteScoreRepository::new(conn);
    let ctx = ExamContext {
        exam: &exam,
        cohort: &cohort,
        stream: stream.as_deref(),
    };
    let rows = calc::compute_roster(&repo, &ctx, &roster).map_err(|e| calc_err(&req.id, e))?;
    Ok(LoadedRoster {
        exam,
        cohort,
        stream,
        rows,
    })
}

fn handle_roster_compute(state: &mut AppState, req: &Request) -> serde_json::Value {
    let sort = match optional_str(req, "sort") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let by_rank = match sort.as_deref() {
        None | Some("roster") => false,
        Some("rank") => true,
        Some(other) => {
            return err(
                &req.id,
                "bad_params",
                "sort must be \"rank\" or \"roster\"",
                Some(json!({ "sort": other })),
            )
        }
    };
    let mut loaded = match load_roster_rows(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    if by_rank {
        calc::sort_by_rank(&mut loaded.rows);
    }
    ok(
        &req.id,
        json!({
            "exam": loaded.exam,
            "stream": loaded.stream,
            "subjects": loaded.cohort.subjects,
            "family": loaded.cohort.family,
            "maxTotal": loaded.cohort.max_total,
            "rows": loaded.rows,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roster.compute" => Some(handle_roster_compute(state, req)),
        _ => None,
    }
}
