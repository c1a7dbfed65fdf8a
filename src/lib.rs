pub mod config;
pub mod core;
pub mod ingest;
pub mod models;
pub mod report;
pub mod storage;
#[cfg(test)]
pub mod test_helpers;
