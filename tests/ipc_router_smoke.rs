mod test_support;

use serde_json::json;
use test_support::{exam_params, spawn_sidecar, spawn_with_workspace};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let (mut sc, _ws) = spawn_with_workspace();
    let adm = sc.create_student("s1", "Smoke Student", "F", "Grade 5", Some("H"));

    let methods: Vec<(&str, serde_json::Value)> = vec![
        ("health", json!({})),
        ("cohorts.list", json!({})),
        ("cohorts.get", json!({ "grade": "Grade 5" })),
        ("bands.legend", json!({ "grade": "Grade 5" })),
        ("bands.classifySubject", json!({ "score": 70 })),
        ("bands.classifyTotal", json!({ "family": "primary", "total": 300 })),
        ("students.list", json!({ "grade": "Grade 5" })),
        ("marks.get", exam_params("Grade 5", json!({}))),
        (
            "marks.upsertBulk",
            exam_params(
                "Grade 5",
                json!({ "entries": [{ "admNo": adm, "subject": "MAT", "score": 55 }] }),
            ),
        ),
        ("marks.progress", exam_params("Grade 5", json!({}))),
        ("roster.compute", exam_params("Grade 5", json!({ "sort": "rank" }))),
        ("analytics.class", exam_params("Grade 5", json!({ "topN": 3 }))),
        ("analytics.subjects", exam_params("Grade 5", json!({}))),
        ("analytics.streams", exam_params("Grade 5", json!({}))),
        ("analytics.gender", exam_params("Grade 5", json!({}))),
        (
            "reports.reportCardModel",
            exam_params("Grade 5", json!({ "admNo": adm })),
        ),
        ("reports.classListModel", exam_params("Grade 5", json!({}))),
        ("students.delete", json!({ "admNo": adm })),
    ];
    for (i, (method, params)) in methods.into_iter().enumerate() {
        let _ = sc.request_ok(&format!("m{}", i), method, params);
    }

    assert_eq!(
        sc.request_err("x", "nope.method", json!({})),
        "not_implemented"
    );
}

#[test]
fn bad_lines_and_missing_workspace_are_reported_not_fatal() {
    let mut sc = spawn_sidecar();

    let bad = sc.write_line("{not json");
    assert_eq!(bad["ok"], json!(false));
    assert_eq!(bad["error"]["code"], json!("bad_json"));

    let health = sc.request_ok("1", "health", json!({}));
    assert!(health["version"].is_string());
    assert!(health["workspacePath"].is_null());

    assert_eq!(
        sc.request_err("2", "students.list", json!({})),
        "no_workspace"
    );
    assert_eq!(
        sc.request_err("3", "roster.compute", exam_params("Grade 4", json!({}))),
        "no_workspace"
    );
    assert_eq!(
        sc.request_err("4", "workspace.select", json!({})),
        "bad_params"
    );

    // Classification needs no workspace.
    let c = sc.request_ok("5", "bands.classifySubject", json!({ "score": "abc" }));
    assert_eq!(c["band"], json!("BE2"));
    assert_eq!(c["points"], json!(1));
}
