pub mod bench;
pub mod changelog;
pub mod compare;
pub mod index;
pub mod query;
pub mod status;
