use std::io::Write;

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::backend::{SearchBackend, SearchPage, TotalRelation};
use crate::commands::query::CompiledQuery;
use crate::snapshot::{ResultSink, ResultSnapshot};

pub const DEFAULT_PAGE_SIZE: u64 = 120;
pub const DEFAULT_FETCH_CAP: u64 = 240;
const PREVIEW_HITS: usize = 10;

#[derive(Debug, Clone, Copy)]
pub struct ExecutorOptions {
    pub page_size: u64,
    pub fetch_cap: u64,
    pub fetch_source: bool,
}

impl Default for ExecutorOptions {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            fetch_cap: DEFAULT_FETCH_CAP,
            fetch_source: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub ordinal: u64,
    pub pages: u32,
    pub fetched: u64,
    pub total: u64,
    pub relation: TotalRelation,
}

pub struct PaginatedExecutor<'a, B: SearchBackend + ?Sized> {
    backend: &'a B,
    options: ExecutorOptions,
}

impl<'a, B: SearchBackend + ?Sized> PaginatedExecutor<'a, B> {
    pub fn new(backend: &'a B, options: ExecutorOptions) -> Self {
        let options = ExecutorOptions {
            page_size: options.page_size.max(1),
            ..options
        };
        Self { backend, options }
    }

    pub fn execute<W: Write>(
        &self,
        ordinal: u64,
        query: &CompiledQuery,
        mut sink: Option<&mut ResultSink<W>>,
    ) -> Result<QueryOutcome> {
        let ExecutorOptions {
            page_size,
            fetch_cap,
            fetch_source,
        } = self.options;

        let mut from = 0_u64;
        let mut fetched = 0_u64;
        let mut pages = 0_u32;

        loop {
            let body = query.request_body(from, page_size, fetch_source);
            let page = self.backend.search(&body).with_context(|| {
                format!(
                    "query #{ordinal} failed at offset {from}, query dump:\n{}",
                    serde_json::to_string_pretty(&body).unwrap_or_default()
                )
            })?;

            pages += 1;
            let returned = page.hits.len() as u64;
            fetched += returned;

            debug!(
                ordinal,
                from,
                returned,
                fetched,
                total = page.total,
                relation = page.relation.as_str(),
                "fetched page"
            );

            if fetch_source {
                log_preview(ordinal, &page);
            } else if from == 0 {
                if let Some(sink) = sink.as_deref_mut() {
                    sink.append(&first_page_snapshot(ordinal, &page))
                        .with_context(|| format!("failed to write results of query #{ordinal}"))?;
                }
            }

            let has_next_page = page.total > page_size && returned == page_size;
            if !has_next_page || fetched >= fetch_cap {
                return Ok(QueryOutcome {
                    ordinal,
                    pages,
                    fetched,
                    total: page.total,
                    relation: page.relation,
                });
            }

            from += returned;
        }
    }
}

fn first_page_snapshot(ordinal: u64, page: &SearchPage) -> ResultSnapshot {
    ResultSnapshot {
        ordinal,
        best_match: page.hits.first().is_some_and(|hit| hit.score > 0.0),
        ids: page.hits.iter().map(|hit| hit.id.clone()).collect(),
    }
}

fn log_preview(ordinal: u64, page: &SearchPage) {
    for (rank, hit) in page.hits.iter().take(PREVIEW_HITS).enumerate() {
        match &hit.source {
            Some(item) => info!(
                ordinal,
                rank = rank + 1,
                id = %item.id,
                name = %item.name,
                status = item.status.code(),
                category = item.category_id,
                "hit"
            ),
            None => info!(ordinal, rank = rank + 1, id = %hit.id, "hit without source"),
        }
    }
}
