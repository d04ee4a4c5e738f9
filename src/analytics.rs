//! Class-level summaries over enriched roster rows: band distribution,
//! subject/stream/gender comparisons, entry progress and report-card models.

use serde::Serialize;
use std::cmp::Ordering;

use crate::bands::{self, Band};
use crate::calc::{round_2, RosterRow, RosterStudent};
use crate::cohort::Cohort;
use crate::store::ScoreSheet;

pub const DEFAULT_TOP_N: usize = 10;
pub const PASS_MARK: f64 = 50.0;

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[(n / 2) - 1] + sorted[n / 2]) / 2.0
    }
}

/// Sample standard deviation; undefined below two values.
fn std_dev(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let m = mean(values);
    let var = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    Some(var.sqrt())
}

fn max_of(values: &[f64]) -> f64 {
    values.iter().copied().fold(0.0, f64::max)
}

fn min_of(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().copied().fold(f64::INFINITY, f64::min)
}

fn is_gender(row: &RosterRow, g: &str) -> bool {
    row.student.gender.trim().eq_ignore_ascii_case(g)
}

fn by_rank(rows: &[RosterRow]) -> Vec<&RosterRow> {
    let mut out: Vec<&RosterRow> = rows.iter().collect();
    out.sort_by_key(|r| r.rank);
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandCount {
    pub band: Band,
    pub label: &'static str,
    pub points: u8,
    pub count: usize,
    pub percentage: f64,
}

/// Counts per band over all eight bands, EE1 first.
pub fn band_distribution(rows: &[RosterRow]) -> Vec<BandCount> {
    Band::ALL
        .iter()
        .map(|band| {
            let count = rows.iter().filter(|r| r.band == *band).count();
            let percentage = if rows.is_empty() {
                0.0
            } else {
                round_2(100.0 * count as f64 / rows.len() as f64)
            };
            BandCount {
                band: *band,
                label: band.label(),
                points: band.points(),
                count,
                percentage,
            }
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    pub student_count: usize,
    pub mean_total: f64,
    pub median_total: f64,
    pub std_dev_total: Option<f64>,
    pub highest_total: f64,
    pub class_average: f64,
    pub male_count: usize,
    pub female_count: usize,
    pub gender_gap: Option<f64>,
    pub band_distribution: Vec<BandCount>,
    pub top: Vec<RosterRow>,
    pub bottom: Vec<RosterRow>,
}

pub fn class_summary(rows: &[RosterRow], top_n: usize) -> ClassSummary {
    let totals: Vec<f64> = rows.iter().map(|r| r.total).collect();
    let averages: Vec<f64> = rows.iter().map(|r| r.average).collect();
    let male: Vec<f64> = rows.iter().filter(|r| is_gender(r, "M")).map(|r| r.total).collect();
    let female: Vec<f64> = rows.iter().filter(|r| is_gender(r, "F")).map(|r| r.total).collect();
    let gender_gap = if !male.is_empty() && !female.is_empty() {
        Some(round_2((mean(&male) - mean(&female)).abs()))
    } else {
        None
    };

    let ranked = by_rank(rows);
    let top: Vec<RosterRow> = ranked.iter().take(top_n).map(|r| (*r).clone()).collect();
    let bottom: Vec<RosterRow> = ranked
        .iter()
        .rev()
        .take(top_n)
        .map(|r| (*r).clone())
        .collect();

    ClassSummary {
        student_count: rows.len(),
        mean_total: round_2(mean(&totals)),
        median_total: round_2(median(&totals)),
        std_dev_total: std_dev(&totals).map(round_2),
        highest_total: max_of(&totals),
        class_average: round_2(mean(&averages)),
        male_count: male.len(),
        female_count: female.len(),
        gender_gap,
        band_distribution: band_distribution(rows),
        top,
        bottom,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectStats {
    pub subject: String,
    pub average: f64,
    pub median: f64,
    pub max: f64,
    pub min: f64,
    pub std_dev: Option<f64>,
    pub pass_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopPerformer {
    pub rank: u32,
    pub adm_no: String,
    pub name: String,
    pub gender: String,
    pub stream: Option<String>,
    pub score: f64,
    pub total: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectTop {
    pub subject: String,
    pub students: Vec<TopPerformer>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAnalysis {
    pub subjects: Vec<SubjectStats>,
    pub strongest: Option<String>,
    pub weakest: Option<String>,
    pub top_performers: Vec<SubjectTop>,
}

pub fn subject_analysis(rows: &[RosterRow], cohort: &Cohort, top_n: usize) -> SubjectAnalysis {
    let mut stats: Vec<SubjectStats> = Vec::with_capacity(cohort.subjects.len());
    let mut top_performers: Vec<SubjectTop> = Vec::with_capacity(cohort.subjects.len());

    for subject in &cohort.subjects {
        let scores: Vec<f64> = rows.iter().map(|r| r.score_for(subject)).collect();
        let passed = scores.iter().filter(|s| **s >= PASS_MARK).count();
        stats.push(SubjectStats {
            subject: subject.clone(),
            average: round_2(mean(&scores)),
            median: round_2(median(&scores)),
            max: max_of(&scores),
            min: min_of(&scores),
            std_dev: std_dev(&scores).map(round_2),
            pass_rate: if rows.is_empty() {
                0.0
            } else {
                round_2(100.0 * passed as f64 / rows.len() as f64)
            },
        });

        let mut ordered: Vec<&RosterRow> = rows.iter().collect();
        ordered.sort_by(|a, b| {
            b.score_for(subject)
                .partial_cmp(&a.score_for(subject))
                .unwrap_or(Ordering::Equal)
        });
        top_performers.push(SubjectTop {
            subject: subject.clone(),
            students: ordered
                .into_iter()
                .take(top_n)
                .map(|r| TopPerformer {
                    rank: r.rank,
                    adm_no: r.student.adm_no.clone(),
                    name: r.student.name.clone(),
                    gender: r.student.gender.clone(),
                    stream: r.student.stream.clone(),
                    score: r.score_for(subject),
                    total: r.total,
                })
                .collect(),
        });
    }

    // Ties keep subject order: first listed wins strongest, last listed weakest.
    let mut by_avg: Vec<&SubjectStats> = stats.iter().collect();
    by_avg.sort_by(|a, b| b.average.partial_cmp(&a.average).unwrap_or(Ordering::Equal));
    let (strongest, weakest) = if rows.is_empty() {
        (None, None)
    } else {
        (
            by_avg.first().map(|s| s.subject.clone()),
            by_avg.last().map(|s| s.subject.clone()),
        )
    };

    SubjectAnalysis {
        subjects: stats,
        strongest,
        weakest,
        top_performers,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectAverage {
    pub subject: String,
    pub average: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamStat {
    pub stream: String,
    pub average_total: f64,
    pub students: usize,
    pub male_count: usize,
    pub female_count: usize,
    pub subject_averages: Vec<SubjectAverage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamComparison {
    pub applicable: bool,
    pub streams: Vec<StreamStat>,
}

pub fn stream_comparison(rows: &[RosterRow], cohort: &Cohort) -> StreamComparison {
    if !cohort.has_streams {
        return StreamComparison {
            applicable: false,
            streams: Vec::new(),
        };
    }

    let mut names: Vec<String> = rows
        .iter()
        .map(|r| r.student.stream.clone().unwrap_or_else(|| "N/A".to_string()))
        .collect();
    names.sort();
    names.dedup();

    let mut streams: Vec<StreamStat> = names
        .into_iter()
        .map(|name| {
            let members: Vec<&RosterRow> = rows
                .iter()
                .filter(|r| r.student.stream.as_deref().unwrap_or("N/A") == name)
                .collect();
            let totals: Vec<f64> = members.iter().map(|r| r.total).collect();
            let subject_averages = cohort
                .subjects
                .iter()
                .map(|s| {
                    let scores: Vec<f64> = members.iter().map(|r| r.score_for(s)).collect();
                    SubjectAverage {
                        subject: s.clone(),
                        average: round_2(mean(&scores)),
                    }
                })
                .collect();
            StreamStat {
                stream: name,
                average_total: round_2(mean(&totals)),
                students: members.len(),
                male_count: members.iter().filter(|r| is_gender(r, "M")).count(),
                female_count: members.iter().filter(|r| is_gender(r, "F")).count(),
                subject_averages,
            }
        })
        .collect();
    streams.sort_by(|a, b| {
        b.average_total
            .partial_cmp(&a.average_total)
            .unwrap_or(Ordering::Equal)
    });

    StreamComparison {
        applicable: true,
        streams,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderSubject {
    pub subject: String,
    pub male: f64,
    pub female: f64,
    pub gap: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenderAnalysis {
    pub male_count: usize,
    pub female_count: usize,
    pub male_average: f64,
    pub female_average: f64,
    /// Male minus female mean total; 0 unless both groups are present.
    pub gap: f64,
    pub top_ten_male: usize,
    pub top_ten_female: usize,
    pub subjects: Vec<GenderSubject>,
}

pub fn gender_analysis(rows: &[RosterRow], cohort: &Cohort) -> GenderAnalysis {
    let male: Vec<&RosterRow> = rows.iter().filter(|r| is_gender(r, "M")).collect();
    let female: Vec<&RosterRow> = rows.iter().filter(|r| is_gender(r, "F")).collect();
    let male_average = mean(&male.iter().map(|r| r.total).collect::<Vec<_>>());
    let female_average = mean(&female.iter().map(|r| r.total).collect::<Vec<_>>());
    let both = !male.is_empty() && !female.is_empty();

    let subjects = cohort
        .subjects
        .iter()
        .map(|s| {
            let m = mean(&male.iter().map(|r| r.score_for(s)).collect::<Vec<_>>());
            let f = mean(&female.iter().map(|r| r.score_for(s)).collect::<Vec<_>>());
            GenderSubject {
                subject: s.clone(),
                male: round_2(m),
                female: round_2(f),
                gap: round_2(m - f),
            }
        })
        .collect();

    GenderAnalysis {
        male_count: male.len(),
        female_count: female.len(),
        male_average: round_2(male_average),
        female_average: round_2(female_average),
        gap: if both {
            round_2(male_average - female_average)
        } else {
            0.0
        },
        top_ten_male: male.iter().filter(|r| r.rank <= 10).count(),
        top_ten_female: female.iter().filter(|r| r.rank <= 10).count(),
        subjects,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingStudent {
    pub adm_no: String,
    pub name: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryProgress {
    pub subject: String,
    pub stream: Option<String>,
    pub total_students: usize,
    pub entered: usize,
    pub missing: usize,
    pub percent: f64,
    pub missing_students: Vec<MissingStudent>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressReport {
    pub entries: Vec<EntryProgress>,
    pub overall_total: usize,
    pub overall_entered: usize,
    pub overall_missing: usize,
    pub overall_percent: f64,
}

fn percent(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        round_2(100.0 * part as f64 / whole as f64)
    }
}

/// Entered vs missing marks per (subject, stream). Only scores above 0 count
/// as entered. Incomplete groups sort first.
pub fn entry_progress(
    roster: &[RosterStudent],
    sheet: &ScoreSheet,
    cohort: &Cohort,
) -> ProgressReport {
    let groups: Vec<Option<String>> = if cohort.has_streams {
        let mut streams: Vec<Option<String>> = roster.iter().map(|s| s.stream.clone()).collect();
        streams.sort();
        streams.dedup();
        streams
    } else {
        vec![None]
    };

    let mut entries: Vec<(usize, EntryProgress)> = Vec::new();
    for (subject_idx, subject) in cohort.subjects.iter().enumerate() {
        for group in &groups {
            let members: Vec<&RosterStudent> = roster
                .iter()
                .filter(|s| !cohort.has_streams || s.stream == *group)
                .collect();
            let missing_students: Vec<MissingStudent> = members
                .iter()
                .filter(|s| !sheet.is_entered(&s.adm_no, subject))
                .map(|s| MissingStudent {
                    adm_no: s.adm_no.clone(),
                    name: s.name.clone(),
                })
                .collect();
            let total = members.len();
            let missing = missing_students.len();
            entries.push((
                subject_idx,
                EntryProgress {
                    subject: subject.clone(),
                    stream: group.clone(),
                    total_students: total,
                    entered: total - missing,
                    missing,
                    percent: percent(total - missing, total),
                    missing_students,
                },
            ));
        }
    }
    entries.sort_by_key(|(idx, e)| (e.missing == 0, *idx));

    let overall_total: usize = entries.iter().map(|(_, e)| e.total_students).sum();
    let overall_entered: usize = entries.iter().map(|(_, e)| e.entered).sum();
    ProgressReport {
        entries: entries.into_iter().map(|(_, e)| e).collect(),
        overall_total,
        overall_entered,
        overall_missing: overall_total - overall_entered,
        overall_percent: percent(overall_entered, overall_total),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCard {
    pub student: RosterRow,
    pub position: String,
    pub class_size: usize,
    pub class_average: f64,
    pub comment: &'static str,
}

/// Report-card data for one student; `None` when they are not on the roster.
pub fn report_card(rows: &[RosterRow], adm_no: &str) -> Option<ReportCard> {
    let student = rows.iter().find(|r| r.student.adm_no == adm_no)?.clone();
    let averages: Vec<f64> = rows.iter().map(|r| r.average).collect();
    Some(ReportCard {
        position: format!("{}/{}", student.rank, rows.len()),
        class_size: rows.len(),
        class_average: round_2(mean(&averages)),
        comment: bands::teacher_comment(student.points),
        student,
    })
}
