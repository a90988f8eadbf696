mod import;
mod run;
#[cfg(test)]
mod tests;

pub use import::{BatchSink, ImportOptions, import_items};
pub use run::run;
