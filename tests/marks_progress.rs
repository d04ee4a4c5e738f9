mod test_support;

use serde_json::json;
use test_support::{exam_params, spawn_with_workspace};

#[test]
fn progress_lists_incomplete_subject_streams_first() {
    let (mut sc, _ws) = spawn_with_workspace();
    let h1 = sc.create_student("1", "Ann Moraa", "F", "Grade 5", Some("H"));
    let h2 = sc.create_student("2", "Ben Kirui", "M", "Grade 5", Some("H"));
    let c1 = sc.create_student("3", "Cate Auma", "F", "Grade 5", Some("C"));

    let _ = sc.request_ok(
        "4",
        "marks.upsertBulk",
        exam_params(
            "Grade 5",
            json!({ "entries": [
                { "admNo": h1, "subject": "MAT", "score": 55 },
                { "admNo": h2, "subject": "MAT", "score": 61 },
                { "admNo": c1, "subject": "MAT", "score": 47 },
                { "admNo": h1, "subject": "ENG", "score": 70 }
            ] }),
        ),
    );

    let p = sc.request_ok("5", "marks.progress", exam_params("Grade 5", json!({})));
    let entries = p["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 12);

    assert_eq!(entries[0]["subject"], json!("ENG"));
    assert_eq!(entries[0]["stream"], json!("C"));
    assert_eq!(entries[1]["subject"], json!("ENG"));
    assert_eq!(entries[1]["stream"], json!("H"));
    assert_eq!(entries[1]["entered"], json!(1));
    assert_eq!(entries[1]["missing"], json!(1));
    assert_eq!(entries[1]["percent"], json!(50.0));
    assert_eq!(entries[1]["missingStudents"][0]["admNo"], json!(h2));

    let tail: Vec<(&str, &str)> = entries[10..]
        .iter()
        .map(|e| {
            (
                e["subject"].as_str().expect("subject"),
                e["stream"].as_str().expect("stream"),
            )
        })
        .collect();
    assert_eq!(tail, vec![("MAT", "C"), ("MAT", "H")]);

    assert_eq!(p["overallTotal"], json!(18));
    assert_eq!(p["overallEntered"], json!(4));
    assert_eq!(p["overallMissing"], json!(14));
    assert_eq!(p["overallPercent"], json!(22.22));
}

#[test]
fn lower_primary_progress_is_one_group_per_subject() {
    let (mut sc, _ws) = spawn_with_workspace();
    let a = sc.create_student("1", "Joy Achieng", "F", "Grade 1", Some("H"));
    let _ = sc.create_student("2", "Sam Kibet", "M", "Grade 1", None);
    let _ = sc.request_ok(
        "3",
        "marks.upsertBulk",
        exam_params(
            "Grade 1",
            json!({ "entries": [{ "admNo": a, "subject": "Maths", "score": 88 }] }),
        ),
    );

    let p = sc.request_ok("4", "marks.progress", exam_params("Grade 1", json!({})));
    let entries = p["entries"].as_array().expect("entries");
    assert_eq!(entries.len(), 5);
    assert!(entries.iter().all(|e| e["stream"].is_null()));
    let maths = entries
        .iter()
        .find(|e| e["subject"] == json!("Maths"))
        .expect("maths entry");
    assert_eq!(maths["entered"], json!(1));
    assert_eq!(maths["totalStudents"], json!(2));
}

#[test]
fn students_are_listed_by_name_and_deleted_with_their_marks() {
    let (mut sc, _ws) = spawn_with_workspace();
    let z = sc.create_student("1", "Zawadi Otieno", "F", "Grade 6", Some("H"));
    let _ = sc.create_student("2", "Abel Njoroge", "M", "Grade 6", Some("H"));
    assert_eq!(z, "ZO-H");

    let list = sc.request_ok("3", "students.list", json!({ "grade": "6" }));
    let names: Vec<&str> = list["students"]
        .as_array()
        .expect("students")
        .iter()
        .map(|s| s["name"].as_str().expect("name"))
        .collect();
    assert_eq!(names, vec!["Abel Njoroge", "Zawadi Otieno"]);

    assert_eq!(
        sc.request_err(
            "4",
            "students.create",
            json!({ "name": "zawadi otieno", "gender": "F", "grade": "Grade 6", "stream": "h" }),
        ),
        "conflict"
    );
    assert_eq!(
        sc.request_err(
            "5",
            "students.create",
            json!({ "name": "No Adm", "gender": "M", "grade": "Grade 9", "stream": "H" }),
        ),
        "bad_params"
    );
    let jss = sc.request_ok(
        "6",
        "students.create",
        json!({
            "admNo": "2201",
            "name": "Jss Pupil",
            "gender": "m",
            "grade": "Grade 9",
            "stream": "H"
        }),
    );
    assert_eq!(jss["student"]["admNo"], json!("2201"));
    assert_eq!(jss["student"]["gender"], json!("M"));

    let _ = sc.request_ok(
        "7",
        "marks.upsertBulk",
        exam_params(
            "Grade 6",
            json!({ "entries": [{ "admNo": z, "subject": "SCI", "score": 66 }] }),
        ),
    );
    let _ = sc.request_ok("8", "students.delete", json!({ "admNo": z }));
    let marks = sc.request_ok("9", "marks.get", exam_params("Grade 6", json!({})));
    assert_eq!(marks["marks"], json!([]));
    assert_eq!(
        sc.request_err("10", "students.delete", json!({ "admNo": z })),
        "not_found"
    );
}
