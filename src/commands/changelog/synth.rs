use std::ops::ControlFlow;

use anyhow::Result;
use rand::Rng;
use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::commands::index::BatchSink;
use crate::model::{ChangeKind, ChangeLogEntry, Item, ItemUpdate, Status};
use crate::util::ONE_DAY_MS;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeLogSummary {
    pub items_seen: usize,
    pub updates: usize,
    pub idle_updates: usize,
    pub inserts: usize,
    pub skipped_updates: usize,
    pub max_updates: usize,
    pub max_inserts: usize,
}

pub struct ChangeLogSynthesizer<R: Rng> {
    rng: R,
    start_from: usize,
    entries: Vec<ChangeLogEntry>,
    summary: ChangeLogSummary,
}

impl<R: Rng> ChangeLogSynthesizer<R> {
    pub fn new(rng: R, start_from: usize, max_items: usize) -> Self {
        let max_updates = max_items / 3;
        let max_inserts = (max_items / 3) * 2;
        info!(max_updates, max_inserts, start_from, "creating change log");

        Self {
            rng,
            start_from,
            entries: Vec::new(),
            summary: ChangeLogSummary {
                max_updates,
                max_inserts,
                ..ChangeLogSummary::default()
            },
        }
    }

    pub fn finish(mut self) -> (Vec<ChangeLogEntry>, ChangeLogSummary) {
        self.entries.shuffle(&mut self.rng);
        (self.entries, self.summary)
    }

    fn mutate(&mut self, item: &Item) -> ItemUpdate {
        let mut update = ItemUpdate::default();
        match self.rng.random_range(0..10) {
            0..3 => update.created = Some(item.created + ONE_DAY_MS),
            _ => {
                if matches!(item.status, Status::OnSale | Status::Trading) {
                    update.status = Some(Status::SoldOut);
                }
            }
        }
        update
    }

    fn push_update(&mut self, item: &Item) {
        if self.summary.updates >= self.summary.max_updates {
            self.summary.skipped_updates += 1;
            return;
        }

        let update = self.mutate(item);
        if update.is_empty() {
            self.summary.idle_updates += 1;
        }
        self.entries.push(ChangeLogEntry {
            item_id: item.id.clone(),
            change: ChangeKind::Update(update),
        });
        self.summary.updates += 1;
    }
}

impl<R: Rng> BatchSink for ChangeLogSynthesizer<R> {
    fn accept(&mut self, batch: Vec<Item>) -> Result<ControlFlow<()>> {
        for item in batch {
            self.summary.items_seen += 1;
            if self.summary.items_seen <= self.start_from {
                self.push_update(&item);
                continue;
            }

            if self.summary.inserts >= self.summary.max_inserts {
                info!(
                    updates = self.summary.updates,
                    inserts = self.summary.inserts,
                    "insert quota reached, change log complete"
                );
                return Ok(ControlFlow::Break(()));
            }
            self.entries.push(ChangeLogEntry {
                item_id: item.id.clone(),
                change: ChangeKind::Insert(item),
            });
            self.summary.inserts += 1;
        }

        debug!(
            items_seen = self.summary.items_seen,
            entries = self.entries.len(),
            "change log batch processed"
        );
        Ok(ControlFlow::Continue(()))
    }
}
