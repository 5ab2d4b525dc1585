//! Plain data types shared by the metrics crates.
//!
//! A [`Metric`] is a named quantity; each of its [`Observation`]s is one data
//! point, optionally sliced by dimension key/value pairs and carrying either a
//! measure or a monetary value, plus an optional unit descriptor.
//!
//! The serde representation of these types is the JSON document format used
//! for importing and exporting metrics.

mod metric;
mod observation;

pub use metric::{Metric, MetricMeta};
pub use observation::{observation_id, Dimensions, Observation, ObservationValue, Unit};
