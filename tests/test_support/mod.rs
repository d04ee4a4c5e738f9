#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};

pub struct Sidecar {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn temp_workspace() -> tempfile::TempDir {
    tempfile::Builder::new()
        .prefix("scholard-test-")
        .tempdir()
        .expect("create temp dir")
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_scholard");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn scholard");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
    }
}

/// Spawns the sidecar and points it at a fresh workspace.
pub fn spawn_with_workspace() -> (Sidecar, tempfile::TempDir) {
    let workspace = temp_workspace();
    let mut sidecar = spawn_sidecar();
    let _ = sidecar.request_ok(
        "ws",
        "workspace.select",
        json!({ "path": workspace.path().to_string_lossy() }),
    );
    (sidecar, workspace)
}

impl Sidecar {
    pub fn write_line(&mut self, line: &str) -> serde_json::Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(
        &mut self,
        id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let payload = json!({ "id": id, "method": method, "params": params });
        let value = self.write_line(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
        value
    }

    pub fn request_ok(
        &mut self,
        id: &str,
        method: &str,
        params: serde_json::Value,
    ) -> serde_json::Value {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(serde_json::Value::Null)
    }

    /// Sends a request expected to fail; returns the error code.
    pub fn request_err(&mut self, id: &str, method: &str, params: serde_json::Value) -> String {
        let value = self.request(id, method, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    }

    pub fn create_student(
        &mut self,
        id: &str,
        name: &str,
        gender: &str,
        grade: &str,
        stream: Option<&str>,
    ) -> String {
        let res = self.request_ok(
            id,
            "students.create",
            json!({ "name": name, "gender": gender, "grade": grade, "stream": stream }),
        );
        res.get("student")
            .and_then(|s| s.get("admNo"))
            .and_then(|v| v.as_str())
            .expect("admNo")
            .to_string()
    }
}

/// Exam key params with extra fields merged in.
pub fn exam_params(grade: &str, extra: serde_json::Value) -> serde_json::Value {
    let mut params = json!({
        "grade": grade,
        "term": "Term 1",
        "year": 2024,
        "examType": "End Term",
    });
    if let (Some(obj), Some(extra)) = (params.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    params
}

/// Every subject of the entry gets the same score.
pub fn uniform_entries(adm_no: &str, subjects: &[&str], score: f64) -> Vec<serde_json::Value> {
    subjects
        .iter()
        .map(|s| json!({ "admNo": adm_no, "subject": s, "score": score }))
        .collect()
}

pub const PRIMARY_SUBJECTS: [&str; 6] = ["MAT", "ENG", "KIS", "SCI", "SST", "C/ARTS"];
