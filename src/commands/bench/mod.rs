mod executor;
mod run;

pub use executor::{DEFAULT_FETCH_CAP, DEFAULT_PAGE_SIZE};
pub use run::run;
