use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use serde::Serialize;
use tracing::info;

use super::reader::AlignedLines;
use super::stats::{ComparisonStats, Verdict};
use crate::cli::CompareArgs;
use crate::error::{AlignmentError, InputError};
use crate::snapshot::ResultSnapshot;
use crate::util::{now_utc_string, write_json_pretty};

#[derive(Debug, Clone, Default, Serialize)]
pub struct PairComparison {
    pub file: String,
    pub best_match: ComparisonStats,
    pub sort_by_date: ComparisonStats,
    pub overall: ComparisonStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComparisonReport {
    pub generated_at: String,
    pub main_file: String,
    pub lines_compared: usize,
    pub comparisons: Vec<PairComparison>,
}

pub fn run(args: CompareArgs) -> Result<()> {
    let report = compare_files(&args.files, args.debug)?;

    for pair in &report.comparisons {
        for (bucket, stats) in [
            ("best_match", &pair.best_match),
            ("sort_by_date", &pair.sort_by_date),
            ("overall", &pair.overall),
        ] {
            info!(
                main = %report.main_file,
                other = %pair.file,
                bucket,
                total = stats.total,
                identical = stats.identical,
                different = stats.different,
                different_pct = %format!("{:.2}", stats.different_percent),
                avg_divergence_pct = %format!("{:.2}", stats.average_divergence_percent),
                "comparison"
            );
        }
    }

    if let Some(report_path) = &args.report_path {
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote comparison report");
    }

    Ok(())
}

pub fn compare_files(paths: &[PathBuf], debug: bool) -> Result<ComparisonReport> {
    let mut sources = Vec::with_capacity(paths.len());
    for path in paths {
        let file = File::open(path).map_err(|source| InputError::Unreadable {
            path: path.clone(),
            source,
        })?;
        sources.push((display_name(path), BufReader::new(file)));
    }

    compare_sinks(sources, debug)
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| path.display().to_string())
}

pub fn compare_sinks<R: BufRead>(
    sources: Vec<(String, R)>,
    debug: bool,
) -> Result<ComparisonReport> {
    if sources.len() < 2 {
        bail!(
            "expected at least 2 result files to compare, got {}",
            sources.len()
        );
    }

    let mut lines = AlignedLines::new(sources);
    let names: Vec<String> = lines.names().into_iter().map(ToOwned::to_owned).collect();
    let mut pairs: Vec<PairComparison> = names[1..]
        .iter()
        .map(|name| PairComparison {
            file: name.clone(),
            ..PairComparison::default()
        })
        .collect();

    while let Some(group) = lines.next_group()? {
        let line = lines.line_number();
        let snapshots = group
            .iter()
            .zip(&names)
            .map(|(text, name)| {
                ResultSnapshot::parse(text).ok_or_else(|| InputError::MalformedResultLine {
                    file: name.clone(),
                    line,
                    text: text.clone(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let main = &snapshots[0];
        let secondaries = snapshots[1..].iter().zip(&names[1..]);
        for ((other, other_name), pair) in secondaries.zip(&mut pairs) {
            check_alignment(line, &names[0], main, other_name, other)?;

            let bucket = if main.best_match {
                &mut pair.best_match
            } else {
                &mut pair.sort_by_date
            };
            let verdict = bucket.record(&main.ids, &other.ids);

            if debug {
                if let Verdict::Different {
                    only_in_main,
                    only_in_other,
                } = &verdict
                {
                    info!(
                        query = main.ordinal,
                        main = %names[0],
                        other = %other_name,
                        only_in_main = only_in_main.len(),
                        only_in_other = only_in_other.len(),
                        "result lists differ"
                    );
                }
            }
        }
    }

    for pair in &mut pairs {
        pair.overall = pair.best_match.merge(&pair.sort_by_date);
    }

    Ok(ComparisonReport {
        generated_at: now_utc_string(),
        main_file: names[0].clone(),
        lines_compared: lines.line_number(),
        comparisons: pairs,
    })
}

fn check_alignment(
    line: usize,
    main_name: &str,
    main: &ResultSnapshot,
    other_name: &str,
    other: &ResultSnapshot,
) -> Result<(), AlignmentError> {
    if main.ordinal != other.ordinal {
        return Err(AlignmentError::OrdinalMismatch {
            line,
            main_file: main_name.to_string(),
            main_ordinal: main.ordinal,
            other_file: other_name.to_string(),
            other_ordinal: other.ordinal,
        });
    }
    if main.best_match != other.best_match {
        return Err(AlignmentError::BestMatchMismatch {
            line,
            ordinal: main.ordinal,
            main_file: main_name.to_string(),
            main_flag: main.best_match_flag(),
            other_file: other_name.to_string(),
            other_flag: other.best_match_flag(),
        });
    }
    Ok(())
}
