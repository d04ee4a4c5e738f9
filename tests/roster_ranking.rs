mod test_support;

use serde_json::json;
use test_support::{exam_params, spawn_with_workspace, uniform_entries, PRIMARY_SUBJECTS};

fn row_for<'a>(rows: &'a serde_json::Value, adm: &str) -> &'a serde_json::Value {
    rows.as_array()
        .expect("rows")
        .iter()
        .find(|r| r["admNo"] == json!(adm))
        .expect("row for student")
}

#[test]
fn primary_roster_totals_bands_and_ranks() {
    let (mut sc, _ws) = spawn_with_workspace();
    let a = sc.create_student("1", "Alice Wanjiru", "F", "Grade 4", Some("H"));
    let b = sc.create_student("2", "Brian Otieno", "M", "Grade 4", Some("H"));

    let scores = [90.0, 85.0, 80.0, 75.0, 70.0, 65.0];
    let entries: Vec<serde_json::Value> = PRIMARY_SUBJECTS
        .iter()
        .zip(scores.iter())
        .map(|(s, v)| json!({ "admNo": a, "subject": s, "score": v }))
        .collect();
    let saved = sc.request_ok(
        "3",
        "marks.upsertBulk",
        exam_params("Grade 4", json!({ "entries": entries })),
    );
    assert_eq!(saved["inserted"], json!(6));

    let res = sc.request_ok("4", "roster.compute", exam_params("Grade 4", json!({})));
    assert_eq!(res["subjects"].as_array().map(|v| v.len()), Some(6));
    let rows = &res["rows"];
    assert_eq!(rows.as_array().map(|v| v.len()), Some(2));

    let ra = row_for(rows, &a);
    assert_eq!(ra["total"], json!(465.0));
    assert_eq!(ra["average"], json!(77.5));
    assert_eq!(ra["band"], json!("EE2"));
    assert_eq!(ra["points"], json!(7));
    assert_eq!(ra["rank"], json!(1));
    assert_eq!(ra["scores"][0]["band"], json!("EE1"));

    // No marks at all: still a full row.
    let rb = row_for(rows, &b);
    assert_eq!(rb["total"], json!(0.0));
    assert_eq!(rb["average"], json!(0.0));
    assert_eq!(rb["band"], json!("BE2"));
    assert_eq!(rb["points"], json!(1));
    assert_eq!(rb["rank"], json!(2));
    assert_eq!(rb["scores"].as_array().map(|v| v.len()), Some(6));
    assert_eq!(rb["scores"][0]["entered"], json!(false));
}

#[test]
fn ties_share_a_dense_rank() {
    let (mut sc, _ws) = spawn_with_workspace();
    let plan = [
        ("Amina Said", 75.0),
        ("Brenda Kip", 75.0),
        ("Cyrus Mwangi", 70.0),
        ("Dan Ouma", 60.0),
    ];
    let mut entries = Vec::new();
    let mut adms = Vec::new();
    for (i, (name, score)) in plan.iter().enumerate() {
        let adm = sc.create_student(&format!("c{}", i), name, "M", "Grade 6", Some("C"));
        entries.extend(uniform_entries(&adm, &PRIMARY_SUBJECTS, *score));
        adms.push(adm);
    }
    let _ = sc.request_ok(
        "save",
        "marks.upsertBulk",
        exam_params("Grade 6", json!({ "entries": entries })),
    );

    let res = sc.request_ok(
        "r",
        "roster.compute",
        exam_params("Grade 6", json!({ "sort": "rank" })),
    );
    let ranks: Vec<u64> = res["rows"]
        .as_array()
        .expect("rows")
        .iter()
        .map(|r| r["rank"].as_u64().expect("rank"))
        .collect();
    assert_eq!(ranks, vec![1, 1, 2, 3]);
    // 6 x 75 = 450 for both leaders.
    assert_eq!(row_for(&res["rows"], &adms[0])["total"], json!(450.0));
    assert_eq!(row_for(&res["rows"], &adms[1])["rank"], json!(1));
    assert_eq!(row_for(&res["rows"], &adms[3])["rank"], json!(3));
}

#[test]
fn zero_write_never_overwrites_and_bad_scores_write_nothing() {
    let (mut sc, _ws) = spawn_with_workspace();
    let a = sc.create_student("1", "Grace Njeri", "F", "Grade 5", Some("H"));

    let _ = sc.request_ok(
        "2",
        "marks.upsertBulk",
        exam_params(
            "Grade 5",
            json!({ "entries": [{ "admNo": a, "subject": "MAT", "score": 72.5 }] }),
        ),
    );
    let res = sc.request_ok(
        "3",
        "marks.upsertBulk",
        exam_params(
            "Grade 5",
            json!({ "entries": [
                { "admNo": a, "subject": "MAT", "score": 0 },
                { "admNo": a, "subject": "ENG", "score": "" },
                { "admNo": a, "subject": "KIS", "score": "64" }
            ] }),
        ),
    );
    assert_eq!(res["skipped"], json!(2));
    assert_eq!(res["inserted"], json!(1));

    // Too small to survive rounding: treated like a blank, MAT keeps 72.5.
    let tiny = sc.request_ok(
        "3b",
        "marks.upsertBulk",
        exam_params(
            "Grade 5",
            json!({ "entries": [{ "admNo": a, "subject": "MAT", "score": 0.004 }] }),
        ),
    );
    assert_eq!(tiny["skipped"], json!(1));
    assert_eq!(tiny["updated"], json!(0));

    let code = sc.request_err(
        "4",
        "marks.upsertBulk",
        exam_params(
            "Grade 5",
            json!({ "entries": [
                { "admNo": a, "subject": "SCI", "score": 50 },
                { "admNo": a, "subject": "SST", "score": 101 }
            ] }),
        ),
    );
    assert_eq!(code, "bad_params");
    assert_eq!(
        sc.request_err(
            "5",
            "marks.upsertBulk",
            exam_params(
                "Grade 5",
                json!({ "entries": [{ "admNo": a, "subject": "SCI", "score": "abc" }] }),
            ),
        ),
        "bad_params"
    );
    assert_eq!(
        sc.request_err(
            "6",
            "marks.upsertBulk",
            exam_params(
                "Grade 5",
                json!({ "entries": [{ "admNo": "NOPE", "subject": "SCI", "score": 40 }] }),
            ),
        ),
        "not_found"
    );

    let marks = sc.request_ok("7", "marks.get", exam_params("Grade 5", json!({})));
    let stored: Vec<(String, f64)> = marks["marks"]
        .as_array()
        .expect("marks")
        .iter()
        .map(|m| {
            (
                m["subject"].as_str().expect("subject").to_string(),
                m["score"].as_f64().expect("score"),
            )
        })
        .collect();
    assert_eq!(
        stored,
        vec![("KIS".to_string(), 64.0), ("MAT".to_string(), 72.5)]
    );
    assert_eq!(marks["malformed"], json!(0));
}

#[test]
fn stream_filter_ranks_within_the_stream() {
    let (mut sc, _ws) = spawn_with_workspace();
    let h_top = sc.create_student("1", "Hassan Ali", "M", "Grade 5", Some("H"));
    let h_low = sc.create_student("2", "Halima Noor", "F", "Grade 5", Some("H"));
    let c_only = sc.create_student("3", "Carol Chebet", "F", "Grade 5", Some("C"));

    let mut entries = uniform_entries(&h_top, &PRIMARY_SUBJECTS, 60.0);
    entries.extend(uniform_entries(&h_low, &PRIMARY_SUBJECTS, 50.0));
    entries.extend(uniform_entries(&c_only, &PRIMARY_SUBJECTS, 95.0));
    let _ = sc.request_ok(
        "4",
        "marks.upsertBulk",
        exam_params("Grade 5", json!({ "entries": entries })),
    );

    let whole = sc.request_ok("5", "roster.compute", exam_params("Grade 5", json!({})));
    assert_eq!(row_for(&whole["rows"], &h_top)["rank"], json!(2));

    let h = sc.request_ok(
        "6",
        "roster.compute",
        exam_params("Grade 5", json!({ "stream": "h" })),
    );
    let rows = h["rows"].as_array().expect("rows");
    assert_eq!(rows.len(), 2);
    assert_eq!(row_for(&h["rows"], &h_top)["rank"], json!(1));
    assert_eq!(row_for(&h["rows"], &h_low)["rank"], json!(2));

    assert_eq!(
        sc.request_err(
            "7",
            "roster.compute",
            exam_params("Grade 5", json!({ "sort": "sideways" })),
        ),
        "bad_params"
    );
}
