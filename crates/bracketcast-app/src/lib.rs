// Application layer: configuration, SQLite persistence, CSV export, and the
// end-to-end pipeline driver used by the CLI and integration tests.

pub mod config;
pub mod db;
pub mod export;
pub mod pipeline;
