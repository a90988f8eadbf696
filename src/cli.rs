use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::backend::DEFAULT_HOST;
use crate::commands::bench::{DEFAULT_FETCH_CAP, DEFAULT_PAGE_SIZE};

#[derive(Parser, Debug)]
#[command(
    name = "search-bench",
    version,
    about = "Index, benchmark and compare search backend relevance"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Index(IndexArgs),
    Bench(BenchArgs),
    Compare(CompareArgs),
    ChangeLog(ChangeLogArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct BackendArgs {
    #[arg(long, default_value = DEFAULT_HOST)]
    pub es_host: String,

    #[arg(long)]
    pub index: Option<String>,
}

impl BackendArgs {
    pub fn index_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.index.as_deref().unwrap_or(fallback)
    }
}

#[derive(Args, Debug, Clone)]
pub struct TokenizerArgs {
    #[arg(long)]
    pub segmenter_url: Option<String>,
}

#[derive(Args, Debug, Clone)]
pub struct IndexArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub tokenizer: TokenizerArgs,

    #[arg(long)]
    pub data_dir: PathBuf,

    #[arg(long, default_value = ".csv.gz")]
    pub filename_filter: String,

    #[arg(long, default_value_t = 5000)]
    pub batch_size: usize,

    #[arg(long, default_value_t = 0)]
    pub max: usize,

    #[arg(long, default_value_t = false)]
    pub no_desc: bool,
}

#[derive(Args, Debug, Clone)]
pub struct BenchArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[command(flatten)]
    pub tokenizer: TokenizerArgs,

    #[arg(long)]
    pub queries_file: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub runs: usize,

    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    pub page_size: u64,

    #[arg(long, default_value_t = DEFAULT_FETCH_CAP)]
    pub fetch_cap: u64,

    #[arg(long, default_value_t = false)]
    pub fetch_source: bool,

    #[arg(long)]
    pub results_file: Option<PathBuf>,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct CompareArgs {
    #[arg(required = true, num_args = 2..)]
    pub files: Vec<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub debug: bool,

    #[arg(long)]
    pub report_path: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ChangeLogArgs {
    #[arg(long)]
    pub data_dir: PathBuf,

    #[arg(long, default_value = ".csv.gz")]
    pub filename_filter: String,

    #[arg(long, default_value_t = 5000)]
    pub batch_size: usize,

    #[arg(long)]
    pub start_from: usize,

    #[arg(long)]
    pub max_items: usize,

    #[arg(long, default_value = "change_log.json")]
    pub output: PathBuf,

    #[arg(long)]
    pub seed: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[command(flatten)]
    pub backend: BackendArgs,

    #[arg(long, default_value_t = false)]
    pub sanity: bool,
}
