use proptest::prelude::*;
use scholard::bands::{classify_subject, classify_total};
use scholard::calc::{aggregate, dense_ranks, RosterStudent};
use scholard::cohort::CohortFamily;

fn family() -> impl Strategy<Value = CohortFamily> {
    prop_oneof![
        Just(CohortFamily::LowerPrimary),
        Just(CohortFamily::Primary),
        Just(CohortFamily::JuniorSecondary),
    ]
}

fn students(n: usize) -> Vec<RosterStudent> {
    (0..n)
        .map(|i| RosterStudent {
            adm_no: format!("A{}", i),
            name: format!("Student {}", i),
            gender: if i % 2 == 0 { "M" } else { "F" }.to_string(),
            stream: None,
        })
        .collect()
}

proptest! {
    #[test]
    fn subject_bands_never_drop_as_score_rises(a in 0.0f64..=100.0, b in 0.0f64..=100.0) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let (band_lo, pts_lo) = classify_subject(lo);
        let (band_hi, pts_hi) = classify_subject(hi);
        prop_assert!(band_lo <= band_hi);
        prop_assert!(pts_lo <= pts_hi);
        prop_assert!((1..=8).contains(&pts_hi));
    }

    #[test]
    fn total_bands_never_drop_as_total_rises(
        f in family(),
        a in 0.0f64..=900.0,
        b in 0.0f64..=900.0
    ) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(classify_total(lo, f).1 <= classify_total(hi, f).1);
        prop_assert_eq!(classify_total(0.0, f).1, 1);
        prop_assert_eq!(classify_total(f.max_total(), f).1, 8);
    }

    #[test]
    fn dense_ranks_match_distinct_totals(raw in prop::collection::vec(0u32..=60_000, 0..40)) {
        let totals: Vec<f64> = raw.iter().map(|v| *v as f64 / 100.0).collect();
        let ranks = dense_ranks(&totals);
        prop_assert_eq!(ranks.len(), totals.len());

        let mut distinct: Vec<u32> = raw.clone();
        distinct.sort_unstable_by(|a, b| b.cmp(a));
        distinct.dedup();
        for (v, rank) in raw.iter().zip(ranks.iter()) {
            let expected = distinct.iter().position(|d| d == v).map(|p| p as u32 + 1);
            prop_assert_eq!(Some(*rank), expected);
        }
        if !ranks.is_empty() {
            prop_assert_eq!(ranks.iter().copied().min(), Some(1));
            prop_assert_eq!(ranks.iter().copied().max(), Some(distinct.len() as u32));
        }
    }

    #[test]
    fn aggregate_is_idempotent_and_totals_bounded(
        scores in prop::collection::vec(prop::collection::vec(0u32..=100, 6), 1..12)
    ) {
        let roster = students(scores.len());
        let subjects: Vec<String> = ["MAT", "ENG", "KIS", "SCI", "SST", "C/ARTS"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let lookup = |adm: &str, subject: &str| {
            let i: usize = adm[1..].parse().ok()?;
            let j = subjects.iter().position(|s| s == subject)?;
            Some(scores[i][j] as f64)
        };
        let first = aggregate(&roster, lookup, &subjects, CohortFamily::Primary)
            .expect("aggregate");
        let second = aggregate(&roster, lookup, &subjects, CohortFamily::Primary)
            .expect("aggregate");
        prop_assert_eq!(&first, &second);
        for (row, raw) in first.iter().zip(scores.iter()) {
            let expected: u32 = raw.iter().sum();
            prop_assert_eq!(row.total, expected as f64);
            prop_assert!(row.total <= 600.0);
            prop_assert_eq!(row.scores.len(), 6);
        }
    }
}
