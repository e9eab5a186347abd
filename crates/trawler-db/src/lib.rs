//! PostgreSQL persistence for trawler jobs and records.

pub mod config;
pub mod database;
pub mod job_store;
pub mod record_store;

pub use config::DatabaseConfig;
pub use database::Database;
pub use job_store::PgJobStore;
pub use record_store::PgDataStore;
