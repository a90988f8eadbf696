use std::fs::File;
use std::io::{BufWriter, Write};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tracing::info;

use super::executor::{ExecutorOptions, PaginatedExecutor};
use crate::backend::{DEFAULT_INDEX, ElasticClient, IndexStats, SearchBackend};
use crate::cli::BenchArgs;
use crate::commands::query::{CompiledQuery, StructuredQuery, compile_query, load_queries};
use crate::model::BenchRunReport;
use crate::snapshot::ResultSink;
use crate::tokenizer::build_tokenizer;
use crate::util::{ensure_parent_directory, now_utc_string, sha256_file, write_json_pretty};

const PROGRESS_EVERY: u64 = 100;

#[derive(Debug, Clone, Default)]
pub struct BenchSummary {
    pub run_durations: Vec<Duration>,
    pub first_run_hits_fetched: u64,
    pub snapshot_lines: usize,
}

impl BenchSummary {
    pub fn average_duration(&self) -> Duration {
        match u32::try_from(self.run_durations.len()) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(runs) => self.run_durations.iter().sum::<Duration>() / runs,
        }
    }
}

pub fn run(args: BenchArgs) -> Result<()> {
    let tokenizer = build_tokenizer(args.tokenizer.segmenter_url.as_deref());
    let queries: Vec<StructuredQuery> = load_queries(&args.queries_file, tokenizer.as_ref())?;
    let compiled: Vec<CompiledQuery> = queries.iter().map(compile_query).collect();
    let filtered = queries.iter().filter(|query| query.has_filters()).count();

    let client = ElasticClient::new(&args.backend.es_host, args.backend.index_or(DEFAULT_INDEX));
    let runs = args.runs.max(1);
    info!(
        queries = compiled.len(),
        filtered,
        runs,
        index = %client.index(),
        "running benchmark"
    );

    let stats_before = client
        .index_stats()
        .context("failed to read index stats before benchmark")?;
    log_index_stats("before", &stats_before);

    let sink = match &args.results_file {
        Some(path) => {
            ensure_parent_directory(path)?;
            let file = File::create(path)
                .with_context(|| format!("failed to create results file {}", path.display()))?;
            info!(path = %path.display(), "writing first-run results");
            Some(ResultSink::new(BufWriter::new(file)))
        }
        None => None,
    };

    let options = ExecutorOptions {
        page_size: args.page_size,
        fetch_cap: args.fetch_cap,
        fetch_source: args.fetch_source,
    };
    let summary = run_benchmark(&client, &compiled, options, runs, sink)?;

    info!(
        queries = compiled.len(),
        runs,
        average_ms = summary.average_duration().as_millis(),
        "benchmark finished"
    );

    let stats_after = client
        .index_stats()
        .context("failed to read index stats after benchmark")?;
    log_index_stats("after", &stats_after);

    if let Some(report_path) = &args.report_path {
        let report = BenchRunReport {
            report_version: 1,
            generated_at: now_utc_string(),
            index: client.index().to_string(),
            queries_file: args.queries_file.display().to_string(),
            queries_sha256: sha256_file(&args.queries_file)?,
            query_count: compiled.len(),
            runs,
            page_size: options.page_size,
            fetch_cap: options.fetch_cap,
            fetch_source: options.fetch_source,
            results_file: args
                .results_file
                .as_ref()
                .map(|path| path.display().to_string()),
            first_run_hits_fetched: summary.first_run_hits_fetched,
            run_durations_ms: summary
                .run_durations
                .iter()
                .map(Duration::as_millis)
                .collect(),
            average_duration_ms: summary.average_duration().as_millis(),
            index_stats_before: stats_before,
            index_stats_after: stats_after,
        };
        write_json_pretty(report_path, &report)?;
        info!(path = %report_path.display(), "wrote benchmark report");
    }

    Ok(())
}

// Snapshot lines are only written during the first run.
pub fn run_benchmark<B, W>(
    backend: &B,
    queries: &[CompiledQuery],
    options: ExecutorOptions,
    runs: usize,
    mut sink: Option<ResultSink<W>>,
) -> Result<BenchSummary>
where
    B: SearchBackend + ?Sized,
    W: Write,
{
    let executor = PaginatedExecutor::new(backend, options);
    let mut summary = BenchSummary::default();

    for run in 0..runs {
        let started = Instant::now();
        let mut hits_fetched = 0_u64;

        for (index, query) in queries.iter().enumerate() {
            let ordinal = index as u64 + 1;
            let outcome = executor.execute(ordinal, query, sink.as_mut())?;
            hits_fetched += outcome.fetched;

            if ordinal % PROGRESS_EVERY == 0 {
                info!(
                    run = run + 1,
                    executed = outcome.ordinal,
                    fetched = outcome.fetched,
                    total = outcome.total,
                    relation = outcome.relation.as_str(),
                    "progress"
                );
            }
        }

        let elapsed = started.elapsed();
        info!(
            run = run + 1,
            queries = queries.len(),
            hits_fetched,
            elapsed_ms = elapsed.as_millis(),
            "run completed"
        );
        summary.run_durations.push(elapsed);

        if run == 0 {
            summary.first_run_hits_fetched = hits_fetched;
            if let Some(first_run_sink) = sink.take() {
                summary.snapshot_lines = first_run_sink.lines_written();
                first_run_sink
                    .finish()
                    .context("failed to flush results file")?;
            }
        }
    }

    Ok(summary)
}

fn log_index_stats(phase: &str, stats: &IndexStats) {
    let primaries = &stats.all.primaries;
    info!(
        phase,
        docs = primaries.docs.count,
        store_bytes = primaries.store.size_in_bytes,
        query_cache_hits = primaries.query_cache.hit_count,
        query_cache_misses = primaries.query_cache.miss_count,
        request_cache_hits = primaries.request_cache.hit_count,
        request_cache_misses = primaries.request_cache.miss_count,
        "index stats"
    );
}
