use serde_json::json;

use crate::cohort::canonical_grade;
use crate::ipc::error::{calc_err, err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::students::{self, NewStudent};

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let input: NewStudent = match serde_json::from_value(req.params.clone()) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", e.to_string(), None),
    };
    match students::create_student(conn, &state.cohorts, input) {
        Ok(student) => ok(&req.id, json!({ "student": student })),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match optional_str(req, "grade") {
        Ok(Some(g)) => match canonical_grade(&g) {
            Ok(g) => Some(g),
            Err(e) => return calc_err(&req.id, e),
        },
        Ok(None) => None,
        Err(e) => return e,
    };
    let stream = match optional_str(req, "stream") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match students::list_students(conn, grade.as_deref(), stream.as_deref()) {
        Ok(rows) => ok(&req.id, json!({ "students": rows })),
        Err(e) => calc_err(&req.id, e),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let adm_no = match required_str(req, "admNo") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match students::delete_student(conn, adm_no.trim()) {
        Ok(student) => {
            tracing::info!(adm_no = student.adm_no.as_str(), "student deleted");
            ok(&req.id, json!({ "deleted": student }))
        }
        Err(e) => calc_err(&req.id, e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
