//! SQLite-backed storage for metrics and their observations.
//!
//! Exposes:
//! - schema creation for the `metric`, `observation` and `dimension` tables
//! - metric creation, lookup and listing
//! - single observation inserts and aggregation into a metric
//!   ([`StoredMetric`] is an [`ObservationSink`](metrics_aggregate::ObservationSink))
//! - dimension-filtered observation queries
//! - JSON import/export of whole metric documents

mod config;
mod query;
mod schema;
pub mod storage;

pub use config::StoreConfig;
pub use query::{DimensionPredicate, ObservationQuery};
pub use storage::{Store, StoreError, StoredMetric};
