//! Aggregation of raw survey-style rows into counted observations.
//!
//! Given a batch of [`Row`]s and an [`AggregationSpec`], the engine:
//! 1. builds one candidate per distinct answer value, then extends the
//!    candidates with every value of each extra dimension field (see
//!    [`Expansion`] for how passes feed into each other);
//! 2. counts, for every candidate, the rows whose answer and recorded
//!    dimension fields match it;
//! 3. emits one [`Observation`](metrics_model::Observation) per candidate, in
//!    generation order, with ids `000000001`, `000000002`, ... and the count
//!    as the measure.
//!
//! Emission goes through the [`ObservationSink`] trait; the engine is
//! indifferent to how observations are stored.

mod engine;
mod row;
mod sink;
mod spec;

pub use crate::engine::{add_aggregate_observations, aggregate};
pub use crate::row::{FieldId, Row};
pub use crate::sink::ObservationSink;
pub use crate::spec::{AggregationSpec, DimensionField, DimensionSpec, Expansion};
