use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::BTreeSet;
use thiserror::Error;

use crate::bands::{self, Band};
use crate::cohort::{Cohort, CohortFamily};
use crate::store::{ExamInstance, ScoreRepository};

#[derive(Debug, Error)]
pub enum CalcError {
    #[error("invalid cohort config: {0}")]
    InvalidCohortConfig(String),

    #[error("unparsable score: {0}")]
    UnparsableScore(String),

    #[error("score {value} is outside 0..=100")]
    BadScore { value: f64 },

    #[error("{0}")]
    BadParams(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
}

impl CalcError {
    pub fn code(&self) -> &'static str {
        match self {
            CalcError::InvalidCohortConfig(_) => "invalid_cohort_config",
            CalcError::UnparsableScore(_) => "unparsable_score",
            CalcError::BadScore { .. } | CalcError::BadParams(_) => "bad_params",
            CalcError::NotFound(_) => "not_found",
            CalcError::Conflict(_) => "conflict",
            CalcError::Db(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            CalcError::BadScore { value } => Some(json!({ "value": value })),
            _ => None,
        }
    }
}

/// Round to 2 decimals, the precision marks are stored at.
pub fn round_2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub adm_no: String,
    pub name: String,
    pub gender: String,
    pub stream: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectScore {
    pub subject: String,
    pub score: f64,
    pub entered: bool,
    pub band: Band,
    pub points: u8,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterRow {
    #[serde(flatten)]
    pub student: RosterStudent,
    pub scores: Vec<SubjectScore>,
    pub total: f64,
    pub average: f64,
    pub band: Band,
    pub band_label: &'static str,
    pub points: u8,
    pub rank: u32,
}

impl RosterRow {
    pub fn score_for(&self, subject: &str) -> f64 {
        self.scores
            .iter()
            .find(|s| s.subject == subject)
            .map(|s| s.score)
            .unwrap_or(0.0)
    }
}

/// Request-scoped inputs for one roster computation.
#[derive(Debug, Clone)]
pub struct ExamContext<'a> {
    pub exam: &'a ExamInstance,
    pub cohort: &'a Cohort,
    pub stream: Option<&'a str>,
}

// Values a lookup hands back that cannot be a mark count as "not entered".
fn sanitize_score(student: &str, subject: &str, raw: Option<f64>) -> Option<f64> {
    let v = raw?;
    if v.is_finite() && (0.0..=100.0).contains(&v) {
        return Some(v);
    }
    let e = CalcError::UnparsableScore(format!("{}/{}: {}", student, subject, v));
    tracing::warn!(error = %e, "ignoring out-of-range score");
    None
}

fn rank_key(total: f64) -> i64 {
    (total * 100.0).round() as i64
}

/// Dense ranks for `totals`, highest first: ties share a rank and the next
/// distinct value is exactly one rank lower.
pub fn dense_ranks(totals: &[f64]) -> Vec<u32> {
    let distinct: BTreeSet<i64> = totals.iter().map(|t| rank_key(*t)).collect();
    let descending: Vec<i64> = distinct.into_iter().rev().collect();
    totals
        .iter()
        .map(|t| {
            let key = rank_key(*t);
            let pos = descending.partition_point(|k| *k > key);
            (pos + 1) as u32
        })
        .collect()
}

/// Builds enriched roster rows. Rows come back in roster order.
pub fn aggregate<F>(
    roster: &[RosterStudent],
    scores: F,
    subjects: &[String],
    family: CohortFamily,
) -> Result<Vec<RosterRow>, CalcError>
where
    F: Fn(&str, &str) -> Option<f64>,
{
    if subjects.is_empty() {
        return Err(CalcError::InvalidCohortConfig(
            "cohort has no subjects".to_string(),
        ));
    }

    let mut rows: Vec<RosterRow> = Vec::with_capacity(roster.len());
    for student in roster {
        let mut total = 0.0_f64;
        let mut per_subject: Vec<SubjectScore> = Vec::with_capacity(subjects.len());
        for subject in subjects {
            let stored = sanitize_score(&student.adm_no, subject, scores(&student.adm_no, subject));
            let score = stored.unwrap_or(0.0);
            let (band, points) = bands::classify_subject(score);
            total += score;
            per_subject.push(SubjectScore {
                subject: subject.clone(),
                score,
                entered: stored.map(|v| v > 0.0).unwrap_or(false),
                band,
                points,
            });
        }
        let total = round_2(total);
        let average = total / subjects.len() as f64;
        let (band, points) = bands::classify_total(total, family);
        rows.push(RosterRow {
            student: student.clone(),
            scores: per_subject,
            total,
            average,
            band,
            band_label: band.label(),
            points,
            rank: 0,
        });
    }

    let totals: Vec<f64> = rows.iter().map(|r| r.total).collect();
    for (row, rank) in rows.iter_mut().zip(dense_ranks(&totals)) {
        row.rank = rank;
    }
    Ok(rows)
}

/// Orders rows by rank; equal ranks keep their incoming order.
pub fn sort_by_rank(rows: &mut [RosterRow]) {
    rows.sort_by_key(|r| r.rank);
}

fn stream_matches(filter: Option<&str>, stream: Option<&str>) -> bool {
    match filter {
        None => true,
        Some(f) => stream
            .map(|s| s.trim().eq_ignore_ascii_case(f.trim()))
            .unwrap_or(false),
    }
}

/// Loads the exam's sheet from `repo` and aggregates the (optionally
/// stream-filtered) roster. Ranks are computed within the filtered roster.
pub fn compute_roster<R>(
    repo: &R,
    ctx: &ExamContext<'_>,
    roster: &[RosterStudent],
) -> Result<Vec<RosterRow>, CalcError>
where
    R: ScoreRepository + ?Sized,
{
    ctx.cohort.validate()?;
    let sheet = repo.exam_scores(ctx.exam)?;
    let members: Vec<RosterStudent> = roster
        .iter()
        .filter(|s| stream_matches(ctx.stream, s.stream.as_deref()))
        .cloned()
        .collect();
    aggregate(
        &members,
        |student, subject| sheet.get(student, subject),
        &ctx.cohort.subjects,
        ctx.cohort.family,
    )
}
