mod compile;
mod decode;

pub use compile::{CompiledQuery, compile_query};
pub use decode::{StructuredQuery, load_queries};
