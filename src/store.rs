use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::calc::{round_2, CalcError};
use crate::cohort::canonical_grade;

/// The (grade, term, year, exam type) key that partitions marks.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamInstance {
    pub grade: String,
    pub term: String,
    pub year: i64,
    pub exam_type: String,
}

impl ExamInstance {
    pub fn new(grade: &str, term: &str, year: i64, exam_type: &str) -> Result<Self, CalcError> {
        let term = term.trim();
        let exam_type = exam_type.trim();
        if term.is_empty() {
            return Err(CalcError::BadParams("term must not be empty".to_string()));
        }
        if exam_type.is_empty() {
            return Err(CalcError::BadParams("examType must not be empty".to_string()));
        }
        Ok(Self {
            grade: canonical_grade(grade)?,
            term: term.to_string(),
            year,
            exam_type: exam_type.to_string(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// Score was 0 ("not entered"); nothing written.
    Skipped,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkEntry {
    pub adm_no: String,
    pub subject: String,
    pub score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub inserted: usize,
    pub updated: usize,
    pub skipped: usize,
}

impl BulkOutcome {
    fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Skipped => self.skipped += 1,
        }
    }
}

/// Entered scores of one exam instance.
#[derive(Debug, Clone, Default)]
pub struct ScoreSheet {
    scores: HashMap<(String, String), f64>,
    pub malformed: usize,
}

impl ScoreSheet {
    pub fn get(&self, adm_no: &str, subject: &str) -> Option<f64> {
        self.scores
            .get(&(adm_no.to_string(), subject.to_string()))
            .copied()
    }

    pub fn is_entered(&self, adm_no: &str, subject: &str) -> bool {
        self.get(adm_no, subject).map(|v| v > 0.0).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    /// (adm_no, subject, score) sorted by student then subject.
    pub fn entries(&self) -> Vec<(&str, &str, f64)> {
        let mut out: Vec<(&str, &str, f64)> = self
            .scores
            .iter()
            .map(|((a, s), v)| (a.as_str(), s.as_str(), *v))
            .collect();
        out.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
        out
    }

    fn insert(&mut self, adm_no: String, subject: String, score: f64) {
        self.scores.insert((adm_no, subject), score);
    }
}

/// Rejects anything that cannot be stored as a mark. `Ok(None)` means the
/// write must be skipped because 0 is "not entered".
pub fn validate_write(score: f64) -> Result<Option<f64>, CalcError> {
    if !score.is_finite() || !(0.0..=100.0).contains(&score) {
        return Err(CalcError::BadScore { value: score });
    }
    // Compare after rounding: anything that would be stored as 0 is a blank.
    let rounded = round_2(score);
    if rounded == 0.0 {
        return Ok(None);
    }
    Ok(Some(rounded))
}

/// Storage contract the calculations read marks through.
pub trait ScoreRepository {
    fn get(&self, exam: &ExamInstance, adm_no: &str, subject: &str)
        -> Result<Option<f64>, CalcError>;

    fn exam_scores(&self, exam: &ExamInstance) -> Result<ScoreSheet, CalcError>;

    /// Insert-or-update; a 0 score never overwrites anything.
    fn upsert(
        &mut self,
        exam: &ExamInstance,
        adm_no: &str,
        subject: &str,
        score: f64,
        entered_by: &str,
    ) -> Result<UpsertOutcome, CalcError>;

    fn upsert_bulk(
        &mut self,
        exam: &ExamInstance,
        entries: &[MarkEntry],
        entered_by: &str,
    ) -> Result<BulkOutcome, CalcError> {
        for e in entries {
            validate_write(e.score)?;
        }
        let mut outcome = BulkOutcome::default();
        for e in entries {
            outcome.record(self.upsert(exam, &e.adm_no, &e.subject, e.score, entered_by)?);
        }
        Ok(outcome)
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryScoreRepository {
    marks: HashMap<(ExamInstance, String, String), f64>,
}

impl ScoreRepository for MemoryScoreRepository {
    fn get(
        &self,
        exam: &ExamInstance,
        adm_no: &str,
        subject: &str,
    ) -> Result<Option<f64>, CalcError> {
        Ok(self
            .marks
            .get(&(exam.clone(), adm_no.to_string(), subject.to_string()))
            .copied())
    }

    fn exam_scores(&self, exam: &ExamInstance) -> Result<ScoreSheet, CalcError> {
        let mut sheet = ScoreSheet::default();
        for ((e, adm_no, subject), score) in &self.marks {
            if e == exam {
                sheet.insert(adm_no.clone(), subject.clone(), *score);
            }
        }
        Ok(sheet)
    }

    fn upsert(
        &mut self,
        exam: &ExamInstance,
        adm_no: &str,
        subject: &str,
        score: f64,
        _entered_by: &str,
    ) -> Result<UpsertOutcome, CalcError> {
        let Some(score) = validate_write(score)? else {
            return Ok(UpsertOutcome::Skipped);
        };
        let key = (exam.clone(), adm_no.to_string(), subject.to_string());
        match self.marks.insert(key, score) {
            Some(_) => Ok(UpsertOutcome::Updated),
            None => Ok(UpsertOutcome::Inserted),
        }
    }
}

/// Marks stored in the workspace database.
pub struct SqliteScoreRepository<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteScoreRepository<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    fn existing_id(
        &self,
        exam: &ExamInstance,
        adm_no: &str,
        subject: &str,
    ) -> Result<Option<String>, CalcError> {
        Ok(self
            .conn
            .query_row(
                "SELECT id FROM marks
                 WHERE adm_no = ? AND grade = ? AND term = ? AND year = ?
                   AND exam_type = ? AND subject = ?",
                (
                    adm_no,
                    &exam.grade,
                    &exam.term,
                    exam.year,
                    &exam.exam_type,
                    subject,
                ),
                |r| r.get(0),
            )
            .optional()?)
    }
}

/// Reads a stored score cell. NULL and 0 are "not entered"; anything that is
/// not a finite mark in 0..=100 is an error the caller recovers from.
fn decode_stored_score(raw: Value) -> Result<Option<f64>, CalcError> {
    let v = match raw {
        Value::Null => return Ok(None),
        Value::Integer(i) => i as f64,
        Value::Real(f) => f,
        Value::Text(t) => t
            .trim()
            .parse::<f64>()
            .map_err(|_| CalcError::UnparsableScore(format!("{:?}", t)))?,
        Value::Blob(_) => return Err(CalcError::UnparsableScore("blob".to_string())),
    };
    if !v.is_finite() || !(0.0..=100.0).contains(&v) {
        return Err(CalcError::UnparsableScore(v.to_string()));
    }
    if v == 0.0 {
        return Ok(None);
    }
    Ok(Some(v))
}

impl ScoreRepository for SqliteScoreRepository<'_> {
    fn get(
        &self,
        exam: &ExamInstance,
        adm_no: &str,
        subject: &str,
    ) -> Result<Option<f64>, CalcError> {
        let raw: Option<Value> = self
            .conn
            .query_row(
                "SELECT score FROM marks
                 WHERE adm_no = ? AND grade = ? AND term = ? AND year = ?
                   AND exam_type = ? AND subject = ?",
                (
                    adm_no,
                    &exam.grade,
                    &exam.term,
                    exam.year,
                    &exam.exam_type,
                    subject,
                ),
                |r| r.get(0),
            )
            .optional()?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        match decode_stored_score(raw) {
            Ok(v) => Ok(v),
            Err(e) => {
                tracing::warn!(
                    adm_no,
                    subject,
                    error = %e,
                    "malformed mark treated as not entered"
                );
                Ok(None)
            }
        }
    }

    fn exam_scores(&self, exam: &ExamInstance) -> Result<ScoreSheet, CalcError> {
        let mut stmt = self.conn.prepare(
            "SELECT adm_no, subject, score FROM marks
             WHERE grade = ? AND term = ? AND year = ? AND exam_type = ?",
        )?;
        let rows = stmt
            .query_map(
                (&exam.grade, &exam.term, exam.year, &exam.exam_type),
                |r| {
                    let adm_no: String = r.get(0)?;
                    let subject: String = r.get(1)?;
                    let score: Value = r.get(2)?;
                    Ok((adm_no, subject, score))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let mut sheet = ScoreSheet::default();
        for (adm_no, subject, raw) in rows {
            match decode_stored_score(raw) {
                Ok(Some(v)) => sheet.insert(adm_no, subject, v),
                Ok(None) => {}
                Err(e) => {
                    sheet.malformed += 1;
                    tracing::warn!(
                        adm_no = adm_no.as_str(),
                        subject = subject.as_str(),
                        error = %e,
                        "malformed mark treated as not entered"
                    );
                }
            }
        }
        Ok(sheet)
    }

    fn upsert(
        &mut self,
        exam: &ExamInstance,
        adm_no: &str,
        subject: &str,
        score: f64,
        entered_by: &str,
    ) -> Result<UpsertOutcome, CalcError> {
        let Some(score) = validate_write(score)? else {
            return Ok(UpsertOutcome::Skipped);
        };
        let existed = self.existing_id(exam, adm_no, subject)?.is_some();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO marks(id, adm_no, grade, term, year, exam_type, subject, score,
                               entered_by, entered_at)
             VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(adm_no, grade, term, year, exam_type, subject) DO UPDATE SET
               score = excluded.score,
               entered_by = excluded.entered_by,
               entered_at = excluded.entered_at",
            (
                Uuid::new_v4().to_string(),
                adm_no,
                &exam.grade,
                &exam.term,
                exam.year,
                &exam.exam_type,
                subject,
                score,
                entered_by,
                now,
            ),
        )?;
        Ok(if existed {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Inserted
        })
    }

    fn upsert_bulk(
        &mut self,
        exam: &ExamInstance,
        entries: &[MarkEntry],
        entered_by: &str,
    ) -> Result<BulkOutcome, CalcError> {
        for e in entries {
            validate_write(e.score)?;
        }
        let tx = self.conn.unchecked_transaction()?;
        let mut outcome = BulkOutcome::default();
        {
            let mut inner = SqliteScoreRepository::new(&tx);
            for e in entries {
                outcome.record(inner.upsert(exam, &e.adm_no, &e.subject, e.score, entered_by)?);
            }
        }
        tx.commit()?;
        Ok(outcome)
    }
}
