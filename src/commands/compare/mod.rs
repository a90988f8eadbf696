mod reader;
mod run;
mod stats;
#[cfg(test)]
mod tests;

pub use run::run;
