use rusqlite::{Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::calc::{CalcError, RosterStudent};
use crate::cohort::{CohortFamily, CohortTable};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRecord {
    pub adm_no: String,
    pub name: String,
    pub gender: String,
    pub grade: String,
    pub stream: Option<String>,
}

impl StudentRecord {
    pub fn to_roster(&self) -> RosterStudent {
        RosterStudent {
            adm_no: self.adm_no.clone(),
            name: self.name.clone(),
            gender: self.gender.clone(),
            stream: self.stream.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    #[serde(default)]
    pub adm_no: Option<String>,
    pub name: String,
    pub gender: String,
    pub grade: String,
    #[serde(default)]
    pub stream: Option<String>,
}

fn normalize_gender(raw: &str) -> Result<String, CalcError> {
    match raw.trim().to_ascii_uppercase().as_str() {
        "M" | "MALE" => Ok("M".to_string()),
        "F" | "FEMALE" => Ok("F".to_string()),
        _ => Err(CalcError::BadParams("gender must be M or F".to_string())),
    }
}

fn initials(name: &str) -> String {
    name.split_whitespace()
        .filter_map(|w| w.chars().next())
        .flat_map(|c| c.to_uppercase())
        .collect()
}

fn adm_exists(conn: &Connection, adm_no: &str) -> Result<bool, CalcError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT adm_no FROM students WHERE adm_no = ?",
            [adm_no],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

// base, base1, base2, ... until unused.
fn next_free_adm(conn: &Connection, base: &str) -> Result<String, CalcError> {
    let mut candidate = base.to_string();
    let mut counter = 1;
    while adm_exists(conn, &candidate)? {
        candidate = format!("{}{}", base, counter);
        counter += 1;
    }
    Ok(candidate)
}

fn name_taken(
    conn: &Connection,
    name: &str,
    grade: &str,
    stream: Option<&str>,
) -> Result<bool, CalcError> {
    let found: Option<String> = match stream {
        Some(stream) => conn
            .query_row(
                "SELECT adm_no FROM students WHERE LOWER(name) = ? AND grade = ? AND stream = ?",
                (name.to_lowercase(), grade, stream),
                |r| r.get(0),
            )
            .optional()?,
        None => conn
            .query_row(
                "SELECT adm_no FROM students WHERE LOWER(name) = ? AND grade = ?",
                (name.to_lowercase(), grade),
                |r| r.get(0),
            )
            .optional()?,
    };
    Ok(found.is_some())
}

/// Adds a student. Lower-primary pupils carry no stream and get an
/// initials-based admission number when none is given; primary pupils get
/// `INITIALS-STREAM`; junior-secondary admission numbers are mandatory.
pub fn create_student(
    conn: &Connection,
    cohorts: &CohortTable,
    input: NewStudent,
) -> Result<StudentRecord, CalcError> {
    let name = input.name.trim().to_string();
    if name.is_empty() {
        return Err(CalcError::BadParams("name must not be empty".to_string()));
    }
    let gender = normalize_gender(&input.gender)?;
    let cohort = cohorts.get(&input.grade)?;
    let grade = cohort.grade.clone();

    let stream = if cohort.has_streams {
        let s = input
            .stream
            .as_deref()
            .map(|s| s.trim().to_ascii_uppercase())
            .filter(|s| !s.is_empty());
        match s {
            Some(s) => Some(s),
            None => {
                return Err(CalcError::BadParams(format!(
                    "stream is required for {}",
                    grade
                )))
            }
        }
    } else {
        None
    };

    let explicit_adm = input
        .adm_no
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string);
    if let Some(adm) = &explicit_adm {
        if adm_exists(conn, adm)? {
            return Err(CalcError::Conflict("Admission number already exists".to_string()));
        }
    }

    let adm_no = match cohort.family {
        CohortFamily::LowerPrimary | CohortFamily::Primary => {
            if name_taken(conn, &name, &grade, stream.as_deref())? {
                let scope = if stream.is_some() {
                    "this grade and stream"
                } else {
                    "this grade"
                };
                return Err(CalcError::Conflict(format!(
                    "A student with this name already exists in {}",
                    scope
                )));
            }
            match explicit_adm {
                Some(adm) => adm,
                None => {
                    let base = match &stream {
                        Some(s) => format!("{}-{}", initials(&name), s),
                        None => initials(&name),
                    };
                    next_free_adm(conn, &base)?
                }
            }
        }
        CohortFamily::JuniorSecondary => explicit_adm.ok_or_else(|| {
            CalcError::BadParams(format!("Admission number is required for {}", grade))
        })?,
    };

    conn.execute(
        "INSERT INTO students(adm_no, name, gender, grade, stream, created_at)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &adm_no,
            &name,
            &gender,
            &grade,
            stream.as_deref(),
            chrono::Utc::now().to_rfc3339(),
        ),
    )?;
    tracing::info!(adm_no = adm_no.as_str(), grade = grade.as_str(), "student created");

    Ok(StudentRecord {
        adm_no,
        name,
        gender,
        grade,
        stream,
    })
}

/// Students ordered by name, optionally narrowed to a grade and stream.
pub fn list_students(
    conn: &Connection,
    grade: Option<&str>,
    stream: Option<&str>,
) -> Result<Vec<StudentRecord>, CalcError> {
    let mut stmt = conn.prepare(
        "SELECT adm_no, name, gender, grade, stream
         FROM students
         WHERE (?1 IS NULL OR grade = ?1)
           AND (?2 IS NULL OR UPPER(stream) = UPPER(?2))
         ORDER BY name, adm_no",
    )?;
    let rows = stmt
        .query_map((grade, stream), |r| {
            Ok(StudentRecord {
                adm_no: r.get(0)?,
                name: r.get(1)?,
                gender: r.get(2)?,
                grade: r.get(3)?,
                stream: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn load_roster(conn: &Connection, grade: &str) -> Result<Vec<RosterStudent>, CalcError> {
    Ok(list_students(conn, Some(grade), None)?
        .iter()
        .map(StudentRecord::to_roster)
        .collect())
}

/// Removes a student; their marks go with them.
pub fn delete_student(conn: &Connection, adm_no: &str) -> Result<StudentRecord, CalcError> {
    let existing: Option<StudentRecord> = conn
        .query_row(
            "SELECT adm_no, name, gender, grade, stream FROM students WHERE adm_no = ?",
            [adm_no],
            |r| {
                Ok(StudentRecord {
                    adm_no: r.get(0)?,
                    name: r.get(1)?,
                    gender: r.get(2)?,
                    grade: r.get(3)?,
                    stream: r.get(4)?,
                })
            },
        )
        .optional()?;
    let Some(existing) = existing else {
        return Err(CalcError::NotFound("Student not found".to_string()));
    };
    conn.execute("DELETE FROM students WHERE adm_no = ?", [adm_no])?;
    Ok(existing)
}
