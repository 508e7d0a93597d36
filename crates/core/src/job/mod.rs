//! Transformation jobs: records, status machine, and persistence.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{JobFilter, JobStore, JobStoreError};
pub use types::*;
