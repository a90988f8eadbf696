use std::fs;
use std::io::Cursor;

use super::run::{compare_files, compare_sinks};
use super::stats::{ComparisonStats, Verdict, set_difference};
use crate::error::{AlignmentError, InputError};

fn source(name: &str, contents: &str) -> (String, Cursor<Vec<u8>>) {
    (name.to_string(), Cursor::new(contents.as_bytes().to_vec()))
}

fn ids(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}

#[test]
fn identical_sinks_have_no_differences() {
    let lines = "1|bm=1|10,20,30\n2|bm=0|7,8\n3|bm=1|\n";
    let report = compare_sinks(vec![source("a", lines), source("b", lines)], false)
        .expect("comparison succeeds");

    let pair = &report.comparisons[0];
    assert_eq!(report.lines_compared, 3);
    assert_eq!(pair.overall.total, 3);
    assert_eq!(pair.overall.identical, 3);
    assert_eq!(pair.overall.different, 0);
    assert_eq!(pair.best_match.total, 2);
    assert_eq!(pair.sort_by_date.total, 1);
}

#[test]
fn reordered_ids_are_not_identical() {
    let report = compare_sinks(
        vec![
            source("main.txt", "1|bm=1|10,20,30\n"),
            source("variant.txt", "1|bm=1|10,30,20\n"),
        ],
        false,
    )
    .expect("comparison succeeds");

    let stats = &report.comparisons[0].best_match;
    assert_eq!(stats.identical, 0);
    assert_eq!(stats.different, 1);
    // Same membership: the symmetric difference is empty, so no ratio is recorded.
    assert_eq!(stats.diff_ratio_count, 0);
    assert_eq!(stats.average_divergence_percent, 0.0);
}

#[test]
fn even_split_contributes_to_divergence_ratio() {
    let report = compare_sinks(
        vec![
            source("main", "1|bm=1|10,20,30\n2|bm=1|1,2,3,4\n"),
            source("other", "1|bm=1|10,20,99\n2|bm=1|1,2,5,6\n"),
        ],
        false,
    )
    .expect("comparison succeeds");

    let stats = &report.comparisons[0].best_match;
    assert_eq!(stats.different, 2);
    assert_eq!(stats.diff_ratio_count, 2);
    let expected = (1.0 / 3.0 + 2.0 / 4.0) / 2.0 * 100.0;
    assert!((stats.average_divergence_percent - expected).abs() < 1e-9);
    assert!((stats.different_percent - 100.0).abs() < 1e-9);
}

#[test]
fn size_mismatch_is_counted_but_not_averaged() {
    let report = compare_sinks(
        vec![
            source("main", "1|bm=0|1,2,3\n"),
            source("other", "1|bm=0|1,2\n"),
        ],
        false,
    )
    .expect("comparison succeeds");

    let stats = &report.comparisons[0].sort_by_date;
    assert_eq!(stats.different, 1);
    assert_eq!(stats.diff_ratio_count, 0);
}

#[test]
fn ordinal_mismatch_is_an_alignment_error() {
    let err = compare_sinks(
        vec![
            source("a", "1|bm=1|1\n2|bm=1|2\n3|bm=1|3\n"),
            source("b", "1|bm=1|1\n2|bm=1|2\n4|bm=1|3\n"),
        ],
        false,
    )
    .expect_err("misaligned inputs are fatal");

    match err.downcast_ref::<AlignmentError>() {
        Some(AlignmentError::OrdinalMismatch {
            line,
            main_ordinal,
            other_ordinal,
            ..
        }) => {
            assert_eq!(*line, 3);
            assert_eq!(*main_ordinal, 3);
            assert_eq!(*other_ordinal, 4);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn best_match_flag_mismatch_is_an_alignment_error() {
    let err = compare_sinks(
        vec![source("a", "1|bm=1|1\n"), source("b", "1|bm=0|1\n")],
        false,
    )
    .expect_err("flag mismatch is fatal");

    assert!(matches!(
        err.downcast_ref::<AlignmentError>(),
        Some(AlignmentError::BestMatchMismatch { .. })
    ));
}

#[test]
fn comparison_stops_at_shortest_sink_or_blank_line() {
    let report = compare_sinks(
        vec![
            source("long", "1|bm=1|1\n2|bm=1|2\n3|bm=1|3\n"),
            source("short", "1|bm=1|1\n2|bm=1|2\n"),
            source("blank", "1|bm=1|1\n2|bm=1|9\n\n4|bm=1|4\n"),
        ],
        false,
    )
    .expect("comparison succeeds");

    assert_eq!(report.lines_compared, 2);
    assert_eq!(report.comparisons.len(), 2);
    assert_eq!(report.comparisons[0].file, "short");
    assert_eq!(report.comparisons[0].overall.identical, 2);
    assert_eq!(report.comparisons[1].file, "blank");
    assert_eq!(report.comparisons[1].overall.different, 1);
}

#[test]
fn malformed_line_names_file_and_line() {
    let err = compare_sinks(
        vec![source("a", "1|bm=1|1\n"), source("b", "garbage\n")],
        false,
    )
    .expect_err("malformed line is fatal");

    match err.downcast_ref::<InputError>() {
        Some(InputError::MalformedResultLine { file, line, .. }) => {
            assert_eq!(file, "b");
            assert_eq!(*line, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn compare_requires_two_sinks() {
    assert!(compare_sinks(vec![source("only", "1|bm=1|1\n")], false).is_err());
}

#[test]
fn compare_files_reads_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    let a = dir.path().join("run-a.txt");
    let b = dir.path().join("run-b.txt");
    fs::write(&a, "1|bm=1|10,20\n2|bm=0|5\n").expect("write a");
    fs::write(&b, "1|bm=1|10,20\n2|bm=0|6\n").expect("write b");

    let report = compare_files(&[a, b], true).expect("comparison succeeds");
    assert_eq!(report.main_file, "run-a.txt");
    assert_eq!(report.comparisons[0].file, "run-b.txt");
    assert_eq!(report.comparisons[0].overall.identical, 1);
    assert_eq!(report.comparisons[0].overall.different, 1);
    assert_eq!(report.comparisons[0].sort_by_date.diff_ratio_count, 1);
}

#[test]
fn set_difference_ignores_order_and_duplicates() {
    let (only_main, only_other) = set_difference(&ids(&["3", "1", "2", "2"]), &ids(&["2", "4"]));
    assert_eq!(only_main, ids(&["1", "3"]));
    assert_eq!(only_other, ids(&["4"]));
}

#[test]
fn stats_record_reports_verdicts() {
    let mut stats = ComparisonStats::default();
    assert_eq!(stats.record(&ids(&["a"]), &ids(&["a"])), Verdict::Identical);
    assert_eq!(
        stats.record(&ids(&["a", "b"]), &ids(&["a", "c"])),
        Verdict::Different {
            only_in_main: ids(&["b"]),
            only_in_other: ids(&["c"]),
        }
    );
    assert_eq!(stats.total, 2);
    assert!((stats.average_divergence_percent - 50.0).abs() < 1e-9);
}
