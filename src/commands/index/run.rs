use std::ops::ControlFlow;
use std::time::Instant;

use anyhow::{Context, Result};
use serde_json::Value;
use tracing::info;

use super::import::{BatchSink, ImportOptions, ItemRecord, import_items};
use crate::backend::{
    BulkBackend, DEFAULT_INDEX, ElasticClient, IndexDocument, NO_DESC_INDEX,
    items_index_definition, items_no_desc_index_definition,
};
use crate::cli::IndexArgs;
use crate::model::{Item, ItemNoDesc};
use crate::tokenizer::{Tokenizer, build_tokenizer};

pub fn run(args: IndexArgs) -> Result<()> {
    if args.no_desc {
        index_records::<ItemNoDesc>(
            &args,
            args.backend.index_or(NO_DESC_INDEX),
            &items_no_desc_index_definition(),
        )
    } else {
        index_records::<Item>(
            &args,
            args.backend.index_or(DEFAULT_INDEX),
            &items_index_definition(),
        )
    }
}

fn index_records<D>(args: &IndexArgs, index: &str, definition: &Value) -> Result<()>
where
    D: ItemRecord + IndexDocument + SegmentText,
{
    let started = Instant::now();
    let tokenizer = build_tokenizer(args.tokenizer.segmenter_url.as_deref());
    let client = ElasticClient::new(&args.backend.es_host, index);

    client
        .recreate_index(definition)
        .with_context(|| format!("failed to recreate index {}", client.index()))?;

    let mut indexer = Indexer::new(&client, tokenizer.as_ref());
    let options = ImportOptions {
        data_dir: &args.data_dir,
        filename_filter: &args.filename_filter,
        batch_size: args.batch_size,
        max: args.max,
    };
    let summary = import_items::<D>(&options, &mut indexer)?;

    client
        .refresh()
        .with_context(|| format!("failed to refresh index {}", client.index()))?;
    let stats = client
        .index_stats()
        .context("failed to read index stats after indexing")?;

    info!(
        index = %client.index(),
        no_desc = args.no_desc,
        files = summary.files,
        items = summary.items,
        indexed = indexer.indexed(),
        docs = stats.doc_count(),
        store_bytes = stats.all.primaries.store.size_in_bytes,
        elapsed_ms = started.elapsed().as_millis(),
        "indexing finished"
    );
    Ok(())
}

// Free-text fields are stored pre-segmented, tokens joined by single spaces.
pub trait SegmentText {
    fn segment_text(&mut self, tokenizer: &dyn Tokenizer) -> Result<()>;
}

impl SegmentText for Item {
    fn segment_text(&mut self, tokenizer: &dyn Tokenizer) -> Result<()> {
        self.name = tokenizer
            .segment_joined(&self.name)
            .with_context(|| format!("failed to segment name of item {}", self.id))?;
        self.desc = tokenizer
            .segment_joined(&self.desc)
            .with_context(|| format!("failed to segment description of item {}", self.id))?;
        Ok(())
    }
}

impl SegmentText for ItemNoDesc {
    fn segment_text(&mut self, tokenizer: &dyn Tokenizer) -> Result<()> {
        self.name = tokenizer
            .segment_joined(&self.name)
            .with_context(|| format!("failed to segment name of item {}", self.id))?;
        Ok(())
    }
}

pub struct Indexer<'a, B: BulkBackend> {
    backend: &'a B,
    tokenizer: &'a dyn Tokenizer,
    batches: usize,
    indexed: usize,
}

impl<'a, B: BulkBackend> Indexer<'a, B> {
    pub fn new(backend: &'a B, tokenizer: &'a dyn Tokenizer) -> Self {
        Self {
            backend,
            tokenizer,
            batches: 0,
            indexed: 0,
        }
    }

    pub fn indexed(&self) -> usize {
        self.indexed
    }
}

impl<B, D> BatchSink<D> for Indexer<'_, B>
where
    B: BulkBackend,
    D: IndexDocument + SegmentText,
{
    fn accept(&mut self, mut batch: Vec<D>) -> Result<ControlFlow<()>> {
        for document in &mut batch {
            document.segment_text(self.tokenizer)?;
        }

        self.batches += 1;
        self.backend
            .bulk_index(&batch)
            .with_context(|| format!("bulk request #{} failed", self.batches))?;
        self.indexed += batch.len();

        info!(batch = self.batches, indexed = self.indexed, "batch indexed");
        Ok(ControlFlow::Continue(()))
    }

    fn flush(&mut self) -> Result<()> {
        info!(batches = self.batches, indexed = self.indexed, "indexer flushed");
        Ok(())
    }
}
