use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Dimension key/value pairs attached to an observation.
pub type Dimensions = BTreeMap<String, String>;

/// Format a 1-based sequence number as an observation id (`000000001`).
pub fn observation_id(sequence: u64) -> String {
    format!("{sequence:09}")
}

fn is_blank(field: &Option<String>) -> bool {
    field.as_deref().map_or(true, str::is_empty)
}

/// A monetary value: an amount plus the currency it is expressed in.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationValue {
    #[serde(default)]
    pub amount: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

impl ObservationValue {
    pub fn new(amount: impl Into<String>, currency: impl Into<String>) -> Self {
        Self {
            amount: Some(amount.into()),
            currency: Some(currency.into()),
        }
    }

    /// True when neither the amount nor the currency carries any text.
    pub fn is_empty(&self) -> bool {
        is_blank(&self.amount) && is_blank(&self.currency)
    }
}

/// Unit descriptor, e.g. a scheme-qualified code with a human readable name.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Unit {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub scheme: Option<String>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub uri: Option<String>,
}

impl Unit {
    pub fn is_empty(&self) -> bool {
        is_blank(&self.name) && is_blank(&self.scheme) && is_blank(&self.id) && is_blank(&self.uri)
    }
}

/// One data point of a metric.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub id: String,
    #[serde(default)]
    pub dimensions: Dimensions,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<ObservationValue>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measure: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<Unit>,
}

impl Observation {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }

    pub fn with_measure(id: impl Into<String>, measure: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            measure: Some(measure.into()),
            ..Self::default()
        }
    }

    pub fn dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.dimensions.insert(key.into(), value.into());
        self
    }

    pub fn has_value(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !v.is_empty())
    }

    pub fn has_unit(&self) -> bool {
        self.unit.as_ref().is_some_and(|u| !u.is_empty())
    }

    pub fn has_measure(&self) -> bool {
        !is_blank(&self.measure)
    }

    pub fn dimension_value(&self, key: &str) -> Option<&str> {
        self.dimensions.get(key).map(String::as_str)
    }
}
