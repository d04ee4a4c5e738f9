use serde::{Serialize, Serializer};

use crate::cohort::CohortFamily;

/// CBC performance level. Declared lowest to highest so `Ord` follows
/// achievement (BE2 < ... < EE1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Band {
    BE2,
    BE1,
    AE2,
    AE1,
    ME2,
    ME1,
    EE2,
    EE1,
}

impl Band {
    /// Display order used by legends and distributions (EE1 first).
    pub const ALL: [Band; 8] = [
        Band::EE1,
        Band::EE2,
        Band::ME1,
        Band::ME2,
        Band::AE1,
        Band::AE2,
        Band::BE1,
        Band::BE2,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Band::EE1 => "EE1",
            Band::EE2 => "EE2",
            Band::ME1 => "ME1",
            Band::ME2 => "ME2",
            Band::AE1 => "AE1",
            Band::AE2 => "AE2",
            Band::BE1 => "BE1",
            Band::BE2 => "BE2",
        }
    }

    pub fn points(self) -> u8 {
        match self {
            Band::EE1 => 8,
            Band::EE2 => 7,
            Band::ME1 => 6,
            Band::ME2 => 5,
            Band::AE1 => 4,
            Band::AE2 => 3,
            Band::BE1 => 2,
            Band::BE2 => 1,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Band::EE1 => "Exceeding Expectation 1",
            Band::EE2 => "Exceeding Expectation 2",
            Band::ME1 => "Meeting Expectation 1",
            Band::ME2 => "Meeting Expectation 2",
            Band::AE1 => "Approaching Expectation 1",
            Band::AE2 => "Approaching Expectation 2",
            Band::BE1 => "Below Expectation 1",
            Band::BE2 => "Below Expectation 2",
        }
    }
}

impl Serialize for Band {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.code())
    }
}

/// Lower bounds for EE1..BE1; anything below the last one is BE2.
pub type Breakpoints = [f64; 7];

pub const SUBJECT_BREAKPOINTS: Breakpoints = [90.0, 78.0, 65.0, 52.0, 39.0, 26.0, 13.0];

fn classify_with(value: f64, breakpoints: &Breakpoints) -> Band {
    // NaN fails every comparison and falls through to BE2.
    for (band, min) in Band::ALL.iter().zip(breakpoints.iter()) {
        if value >= *min {
            return *band;
        }
    }
    Band::BE2
}

/// Classifies a single subject score on the fixed 0-100 table.
pub fn classify_subject(score: f64) -> (Band, u8) {
    let band = classify_with(score, &SUBJECT_BREAKPOINTS);
    (band, band.points())
}

/// Classifies a cohort total on the family's own breakpoint table.
pub fn classify_total(total: f64, family: CohortFamily) -> (Band, u8) {
    let band = classify_with(total, family.breakpoints());
    (band, band.points())
}

/// Reads a loosely typed score: JSON numbers, numeric strings, null/blank as 0.
/// Returns `None` when the value cannot be read as a finite number.
pub fn parse_score_value(raw: &serde_json::Value) -> Option<f64> {
    match raw {
        serde_json::Value::Null => Some(0.0),
        serde_json::Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        serde_json::Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Some(0.0);
            }
            t.parse::<f64>().ok().filter(|v| v.is_finite())
        }
        _ => None,
    }
}

/// Fail-soft subject classification over raw input; unreadable values are BE2.
pub fn classify_subject_raw(raw: &serde_json::Value) -> (Band, u8) {
    match parse_score_value(raw) {
        Some(v) => classify_subject(v),
        None => (Band::BE2, Band::BE2.points()),
    }
}

/// Fail-soft total classification over raw input; unreadable values are BE2.
pub fn classify_total_raw(raw: &serde_json::Value, family: CohortFamily) -> (Band, u8) {
    match parse_score_value(raw) {
        Some(v) => classify_total(v, family),
        None => (Band::BE2, Band::BE2.points()),
    }
}

/// Report-card comment tier keyed by overall points.
pub fn teacher_comment(points: u8) -> &'static str {
    if points >= 7 {
        "Excellent performance! The learner demonstrates outstanding mastery of learning outcomes. Keep up the exceptional work."
    } else if points >= 5 {
        "Good performance. The learner shows satisfactory understanding of key concepts. Continue working hard to excel further."
    } else if points >= 3 {
        "Fair performance. The learner is making progress but needs more effort to fully grasp learning outcomes. Additional support recommended."
    } else {
        "The learner requires significant support to meet expected learning outcomes. Remedial assistance and closer monitoring advised."
    }
}
