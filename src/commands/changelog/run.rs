use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;

use super::synth::ChangeLogSynthesizer;
use crate::cli::ChangeLogArgs;
use crate::commands::index::{ImportOptions, import_items};
use crate::model::{ChangeLogEntry, Item};
use crate::util::ensure_parent_directory;

pub fn run(args: ChangeLogArgs) -> Result<()> {
    let rng = match args.seed {
        Some(seed) => {
            info!(seed, "using seeded generator");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_os_rng(),
    };

    let mut synthesizer = ChangeLogSynthesizer::new(rng, args.start_from, args.max_items);
    let options = ImportOptions {
        data_dir: &args.data_dir,
        filename_filter: &args.filename_filter,
        batch_size: args.batch_size,
        max: args.start_from + args.max_items,
    };
    import_items::<Item>(&options, &mut synthesizer)?;

    let (entries, summary) = synthesizer.finish();
    let bytes = write_change_log(&args.output, &entries)?;

    info!(
        path = %args.output.display(),
        updates = summary.updates,
        idle_updates = summary.idle_updates,
        skipped_updates = summary.skipped_updates,
        inserts = summary.inserts,
        bytes,
        "wrote change log"
    );
    Ok(())
}

pub fn write_change_log(path: &Path, entries: &[ChangeLogEntry]) -> Result<usize> {
    ensure_parent_directory(path)?;
    let data = serde_json::to_vec_pretty(entries).context("failed to serialize change log")?;
    fs::write(path, &data)
        .with_context(|| format!("failed to write change log {}", path.display()))?;
    Ok(data.len())
}
