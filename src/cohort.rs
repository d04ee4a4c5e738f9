use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::bands::Breakpoints;
use crate::calc::CalcError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CohortFamily {
    LowerPrimary,
    Primary,
    JuniorSecondary,
}

// Literal breakpoints per family. These are not a single percentage applied to
// each maximum; boundary rounding differs slightly between families.
const LOWER_PRIMARY_BREAKPOINTS: Breakpoints = [443.0, 380.0, 317.0, 254.0, 190.0, 127.0, 64.0];
const PRIMARY_BREAKPOINTS: Breakpoints = [532.0, 456.0, 380.0, 304.0, 228.0, 152.0, 76.0];
const JUNIOR_SECONDARY_BREAKPOINTS: Breakpoints =
    [798.0, 684.0, 570.0, 456.0, 342.0, 228.0, 114.0];

impl CohortFamily {
    pub const ALL: [CohortFamily; 3] = [
        CohortFamily::LowerPrimary,
        CohortFamily::Primary,
        CohortFamily::JuniorSecondary,
    ];

    pub fn parse(raw: &str) -> Result<CohortFamily, CalcError> {
        let key: String = raw
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match key.as_str() {
            "lowerprimary" => Ok(CohortFamily::LowerPrimary),
            "primary" | "upperprimary" => Ok(CohortFamily::Primary),
            "juniorsecondary" | "junior" | "jss" => Ok(CohortFamily::JuniorSecondary),
            _ => Err(CalcError::InvalidCohortConfig(format!(
                "unrecognized cohort family: {}",
                raw
            ))),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CohortFamily::LowerPrimary => "lowerPrimary",
            CohortFamily::Primary => "primary",
            CohortFamily::JuniorSecondary => "juniorSecondary",
        }
    }

    /// Number of subjects the family's breakpoint table was drawn for.
    pub fn subject_count(self) -> usize {
        match self {
            CohortFamily::LowerPrimary => 5,
            CohortFamily::Primary => 6,
            CohortFamily::JuniorSecondary => 9,
        }
    }

    pub fn max_total(self) -> f64 {
        100.0 * self.subject_count() as f64
    }

    pub fn breakpoints(self) -> &'static Breakpoints {
        match self {
            CohortFamily::LowerPrimary => &LOWER_PRIMARY_BREAKPOINTS,
            CohortFamily::Primary => &PRIMARY_BREAKPOINTS,
            CohortFamily::JuniorSecondary => &JUNIOR_SECONDARY_BREAKPOINTS,
        }
    }

    /// Lower-primary classes are not split into streams.
    pub fn has_streams(self) -> bool {
        self != CohortFamily::LowerPrimary
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Cohort {
    pub grade: String,
    pub family: CohortFamily,
    pub subjects: Vec<String>,
    pub has_streams: bool,
    pub max_total: f64,
    pub overridden: bool,
}

impl Cohort {
    pub fn new(grade: &str, family: CohortFamily, subjects: Vec<String>) -> Self {
        let max_total = 100.0 * subjects.len() as f64;
        Self {
            grade: grade.to_string(),
            family,
            subjects,
            has_streams: family.has_streams(),
            max_total,
            overridden: false,
        }
    }

    /// Subject list must be non-empty, sized for the family's breakpoint
    /// table, with unique non-blank codes.
    pub fn validate(&self) -> Result<(), CalcError> {
        if self.subjects.is_empty() {
            return Err(CalcError::InvalidCohortConfig(format!(
                "{} has no subjects configured",
                self.grade
            )));
        }
        if self.subjects.len() != self.family.subject_count() {
            return Err(CalcError::InvalidCohortConfig(format!(
                "{} needs {} subjects, got {}",
                self.grade,
                self.family.subject_count(),
                self.subjects.len()
            )));
        }
        let mut seen = std::collections::HashSet::new();
        for s in &self.subjects {
            if s.trim().is_empty() {
                return Err(CalcError::InvalidCohortConfig(format!(
                    "{} has a blank subject code",
                    self.grade
                )));
            }
            if !seen.insert(s.to_ascii_lowercase()) {
                return Err(CalcError::InvalidCohortConfig(format!(
                    "{} lists subject {} twice",
                    self.grade, s
                )));
            }
        }
        Ok(())
    }
}

const LOWER_PRIMARY_SUBJECTS: [&str; 5] = [
    "Maths",
    "English",
    "Kiswahili",
    "Environmental",
    "Creative Activities/CRE",
];
const PRIMARY_SUBJECTS: [&str; 6] = ["MAT", "ENG", "KIS", "SCI", "SST", "C/ARTS"];
const JUNIOR_SECONDARY_SUBJECTS: [&str; 9] = [
    "MAT", "ENG", "KIS", "PRET", "SST", "AGR/N", "C/ARTS", "CRE", "INT/SCI",
];

/// Grade -> cohort lookup, the one place subject lists and families live.
#[derive(Debug, Clone)]
pub struct CohortTable {
    cohorts: BTreeMap<u8, Cohort>,
}

impl CohortTable {
    pub fn builtin() -> Self {
        let mut cohorts = BTreeMap::new();
        for n in 1..=9u8 {
            let (family, subjects): (CohortFamily, &[&str]) = match n {
                1..=3 => (CohortFamily::LowerPrimary, &LOWER_PRIMARY_SUBJECTS),
                4..=6 => (CohortFamily::Primary, &PRIMARY_SUBJECTS),
                _ => (CohortFamily::JuniorSecondary, &JUNIOR_SECONDARY_SUBJECTS),
            };
            let grade = format!("Grade {}", n);
            let subjects = subjects.iter().map(|s| s.to_string()).collect();
            cohorts.insert(n, Cohort::new(&grade, family, subjects));
        }
        Self { cohorts }
    }

    /// Builtin table with per-grade subject overrides applied.
    pub fn with_overrides(overrides: &BTreeMap<String, Vec<String>>) -> Result<Self, CalcError> {
        let mut table = Self::builtin();
        for (grade, subjects) in overrides {
            table.set_subjects(grade, subjects.clone())?;
        }
        Ok(table)
    }

    pub fn list(&self) -> Vec<&Cohort> {
        self.cohorts.values().collect()
    }

    pub fn get(&self, grade: &str) -> Result<&Cohort, CalcError> {
        let n = grade_number(grade)?;
        self.cohorts.get(&n).ok_or_else(|| {
            CalcError::InvalidCohortConfig(format!("unknown grade: {}", grade))
        })
    }

    pub fn set_subjects(&mut self, grade: &str, subjects: Vec<String>) -> Result<(), CalcError> {
        let n = grade_number(grade)?;
        let Some(existing) = self.cohorts.get(&n) else {
            return Err(CalcError::InvalidCohortConfig(format!(
                "unknown grade: {}",
                grade
            )));
        };
        let subjects: Vec<String> = subjects.into_iter().map(|s| s.trim().to_string()).collect();
        let mut cohort = Cohort::new(&existing.grade, existing.family, subjects);
        cohort.overridden = true;
        cohort.validate()?;
        self.cohorts.insert(n, cohort);
        Ok(())
    }
}

impl Default for CohortTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Accepts "Grade 4", "grade4", "G4" or "4".
pub fn grade_number(grade: &str) -> Result<u8, CalcError> {
    let digits: String = grade.chars().filter(|c| c.is_ascii_digit()).collect();
    let prefix_ok = grade
        .trim()
        .trim_end_matches(|c: char| c.is_ascii_digit())
        .trim()
        .to_ascii_lowercase();
    let prefix_ok = matches!(prefix_ok.as_str(), "" | "grade" | "g");
    match digits.parse::<u8>() {
        Ok(n) if prefix_ok && (1..=9).contains(&n) => Ok(n),
        _ => Err(CalcError::InvalidCohortConfig(format!(
            "unknown grade: {}",
            grade
        ))),
    }
}

/// Canonical "Grade N" spelling used for storage keys.
pub fn canonical_grade(grade: &str) -> Result<String, CalcError> {
    Ok(format!("Grade {}", grade_number(grade)?))
}
