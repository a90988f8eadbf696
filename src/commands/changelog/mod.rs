mod run;
mod synth;

pub use run::run;
