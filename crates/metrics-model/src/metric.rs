use serde::{Deserialize, Serialize};

use crate::Observation;

/// Identity and description of a metric, without its observations.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricMeta {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// A metric document: metadata plus every observation recorded for it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metric {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub observations: Vec<Observation>,
}

impl Metric {
    pub fn new(meta: MetricMeta) -> Self {
        Self {
            id: meta.id,
            title: meta.title,
            description: meta.description,
            observations: Vec::new(),
        }
    }

    pub fn meta(&self) -> MetricMeta {
        MetricMeta {
            id: self.id.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
        }
    }

    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}
