use crate::storage::{observation_from_row, Result, StoredMetric, OBSERVATION_COLUMNS};
use log::trace;
use metrics_model::Observation;
use rusqlite::{params, params_from_iter};
use std::collections::BTreeMap;

/// A condition on one dimension key of an observation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DimensionPredicate {
    /// The key is set and its value equals `value` exactly.
    Equals { key: String, value: String },
    /// No dimension row with this key exists for the observation.
    Absent { key: String },
}

/// Filtered query over the observations of one metric.
///
/// All predicates must hold. With no predicates every observation matches.
/// Results are ordered by ascending observation id.
#[derive(Debug, Clone)]
pub struct ObservationQuery<'m> {
    metric: &'m StoredMetric,
    predicates: Vec<DimensionPredicate>,
}

struct SqlQuery {
    sql: String,
    params: Vec<String>,
}

impl<'m> ObservationQuery<'m> {
    pub(crate) fn new(metric: &'m StoredMetric) -> Self {
        Self {
            metric,
            predicates: Vec::new(),
        }
    }

    /// Require `key` to equal `value`. Filtering the same key again replaces
    /// the previous value.
    pub fn filter_by_dimension(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        let key = key.into();
        let value = value.into();
        let existing = self.predicates.iter_mut().find_map(|p| match p {
            DimensionPredicate::Equals { key: k, value: v } if *k == key => Some(v),
            _ => None,
        });
        match existing {
            Some(v) => *v = value,
            None => self.predicates.push(DimensionPredicate::Equals { key, value }),
        }
        self
    }

    /// Require `key` to not be set at all.
    pub fn filter_by_dimension_not_set(mut self, key: impl Into<String>) -> Self {
        let predicate = DimensionPredicate::Absent { key: key.into() };
        if !self.predicates.contains(&predicate) {
            self.predicates.push(predicate);
        }
        self
    }

    pub fn predicates(&self) -> &[DimensionPredicate] {
        &self.predicates
    }

    fn to_sql(&self) -> SqlQuery {
        let mut sql = format!("SELECT {OBSERVATION_COLUMNS} FROM observation AS o WHERE o.metric_id = ?1");
        let mut params = vec![self.metric.id().to_string()];

        for predicate in &self.predicates {
            match predicate {
                DimensionPredicate::Equals { key, value } => {
                    params.push(key.clone());
                    params.push(value.clone());
                    sql.push_str(&format!(
                        " AND EXISTS (SELECT 1 FROM dimension AS d \
                         WHERE d.metric_id = o.metric_id AND d.observation_id = o.id \
                         AND d.key = ?{} AND d.value = ?{})",
                        params.len() - 1,
                        params.len()
                    ));
                }
                DimensionPredicate::Absent { key } => {
                    params.push(key.clone());
                    sql.push_str(&format!(
                        " AND NOT EXISTS (SELECT 1 FROM dimension AS d \
                         WHERE d.metric_id = o.metric_id AND d.observation_id = o.id \
                         AND d.key = ?{})",
                        params.len()
                    ));
                }
            }
        }

        sql.push_str(" ORDER BY o.id ASC");
        SqlQuery { sql, params }
    }

    /// Every matching observation, with its dimensions, by ascending id.
    pub fn fetch(&self) -> Result<Vec<Observation>> {
        let query = self.to_sql();
        trace!("observation query: {} {:?}", query.sql, query.params);

        let conn = self.metric.store().lock();
        let mut stmt = conn.prepare(&query.sql)?;
        let rows = stmt.query_map(params_from_iter(query.params.iter()), observation_from_row)?;

        let mut observations = Vec::new();
        for row in rows {
            observations.push(row?);
        }

        let mut dims = conn.prepare_cached(
            "SELECT key, value FROM dimension WHERE metric_id = ?1 AND observation_id = ?2",
        )?;
        for observation in &mut observations {
            let pairs = dims.query_map(params![self.metric.id(), &observation.id], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, Option<String>>(1)?))
            })?;
            for pair in pairs {
                let (key, value) = pair?;
                observation.dimensions.insert(key, value.unwrap_or_default());
            }
        }

        Ok(observations)
    }

    /// Matching observations grouped by their value for `key`. Observations
    /// without a non-empty value for `key` are left out.
    pub fn fetch_by_dimension(&self, key: &str) -> Result<BTreeMap<String, Vec<Observation>>> {
        let mut groups: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
        for observation in self.fetch()? {
            let Some(value) = observation.dimension_value(key).filter(|v| !v.is_empty()) else {
                continue;
            };
            groups.entry(value.to_string()).or_default().push(observation);
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Store;
    use pretty_assertions::assert_eq;

    #[test]
    fn repeated_filters_are_merged() {
        let store = Store::open_in_memory().unwrap();
        let metric = store.add_metric("HATS", "Hats", "How many hats?").unwrap();

        let query = metric
            .observations()
            .filter_by_dimension("answer", "Like")
            .filter_by_dimension("answer", "Hate")
            .filter_by_dimension_not_set("height")
            .filter_by_dimension_not_set("height");

        assert_eq!(
            query.predicates(),
            &[
                DimensionPredicate::Equals {
                    key: "answer".to_string(),
                    value: "Hate".to_string(),
                },
                DimensionPredicate::Absent {
                    key: "height".to_string(),
                },
            ]
        );
    }

    #[test]
    fn predicate_values_are_bound_not_inlined() {
        let store = Store::open_in_memory().unwrap();
        let metric = store.add_metric("HATS", "Hats", "How many hats?").unwrap();

        let query = metric
            .observations()
            .filter_by_dimension("answer", "it's")
            .filter_by_dimension_not_set("height")
            .to_sql();

        assert!(!query.sql.contains("it's"));
        assert!(query.sql.contains("d.key = ?2 AND d.value = ?3"));
        assert!(query.sql.contains("NOT EXISTS"));
        assert!(query.sql.contains("d.key = ?4"));
        assert_eq!(query.params, vec!["HATS", "answer", "it's", "height"]);
        assert!(query.sql.ends_with("ORDER BY o.id ASC"));
    }
}
