use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::backend::{DEFAULT_INDEX, ElasticClient};
use crate::cli::StatusArgs;
use crate::error::BackendError;

pub fn run(args: StatusArgs) -> Result<()> {
    let client = ElasticClient::new(&args.backend.es_host, args.backend.index_or(DEFAULT_INDEX));
    info!(host = %args.backend.es_host, index = %client.index(), "status requested");

    if args.sanity {
        client
            .sanity_check()
            .context("backend sanity check failed")?;
    }

    let stats = match client.index_stats() {
        Ok(stats) => stats,
        Err(BackendError::Status { status: 404, .. }) => {
            warn!(index = %client.index(), "index missing, run `index` first");
            return Ok(());
        }
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read stats for index {}", client.index()));
        }
    };

    let primaries = &stats.all.primaries;
    info!(
        docs = primaries.docs.count,
        deleted_docs = primaries.docs.deleted,
        store_bytes = primaries.store.size_in_bytes,
        query_cache_hits = primaries.query_cache.hit_count,
        query_cache_misses = primaries.query_cache.miss_count,
        query_cache_evictions = primaries.query_cache.evictions,
        request_cache_hits = primaries.request_cache.hit_count,
        request_cache_misses = primaries.request_cache.miss_count,
        "index stats"
    );

    if stats.doc_count() == 0 {
        warn!(index = %client.index(), "index is empty");
    }

    Ok(())
}
