use log::debug;
use metrics_model::{observation_id, Dimensions, Observation};
use std::collections::BTreeSet;

use crate::spec::{AggregationSpec, DimensionField, Expansion};
use crate::{FieldId, ObservationSink, Row};

/// An in-progress count for one combination of answer and dimension values.
#[derive(Clone, Debug, PartialEq, Eq)]
struct Candidate {
    answer: String,
    count: u64,
    /// Dimension name -> value, in the order the dimensions were added.
    dimensions: Vec<(String, String)>,
    /// Row field -> dimension name for every extra dimension this candidate
    /// constrains.
    constraints: Vec<(FieldId, String)>,
}

impl Candidate {
    fn base(answer_dimension: &str, answer: &str) -> Self {
        Self {
            answer: answer.to_string(),
            count: 0,
            dimensions: vec![(answer_dimension.to_string(), answer.to_string())],
            constraints: Vec::new(),
        }
    }

    /// A new candidate that additionally pins `dimension` to `value`.
    fn extended(&self, dimension: &DimensionField, value: &str) -> Self {
        let mut dimensions = self.dimensions.clone();
        upsert(&mut dimensions, dimension.dimension_name.clone(), value.to_string());

        let mut constraints = self.constraints.clone();
        upsert(&mut constraints, dimension.field.clone(), dimension.dimension_name.clone());

        Self {
            answer: self.answer.clone(),
            count: 0,
            dimensions,
            constraints,
        }
    }

    fn dimension(&self, name: &str) -> Option<&str> {
        self.dimensions
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn matches(&self, answer: &str, row: &Row) -> bool {
        self.answer == answer
            && self
                .constraints
                .iter()
                .all(|(field, name)| row.get(field) == self.dimension(name))
    }

    fn into_observation(self, sequence: u64) -> Observation {
        Observation {
            id: observation_id(sequence),
            measure: Some(self.count.to_string()),
            dimensions: self.dimensions.into_iter().collect::<Dimensions>(),
            value: None,
            unit: None,
        }
    }
}

fn upsert<K: PartialEq, V>(entries: &mut Vec<(K, V)>, key: K, value: V) {
    match entries.iter_mut().find(|(k, _)| *k == key) {
        Some(entry) => entry.1 = value,
        None => entries.push((key, value)),
    }
}

/// Distinct non-empty values of `field` across all rows, ascending.
fn value_domain<'r>(rows: &'r [Row], field: &FieldId) -> Vec<&'r str> {
    rows.iter()
        .filter_map(|row| row.get(field))
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn cross<'c>(
    source: impl IntoIterator<Item = &'c Candidate>,
    dimension: &DimensionField,
    domain: &[&str],
) -> Vec<Candidate> {
    source
        .into_iter()
        .flat_map(|candidate| domain.iter().map(move |value| candidate.extended(dimension, value)))
        .collect()
}

fn build_candidates(rows: &[Row], spec: &AggregationSpec) -> Vec<Candidate> {
    let base: Vec<Candidate> = value_domain(rows, &spec.field)
        .into_iter()
        .map(|answer| Candidate::base(&spec.answer_dimension, answer))
        .collect();

    let base_len = base.len();
    let mut candidates = base;

    for dimension in spec.dimensions.iter() {
        let domain = value_domain(rows, &dimension.field);
        debug!(
            "dimension {} ({}) has {} distinct values",
            dimension.dimension_name,
            dimension.field,
            domain.len()
        );

        let level = match spec.expansion {
            Expansion::Accumulated => cross(candidates.iter(), dimension, &domain),
            Expansion::PerDimension => cross(candidates[..base_len].iter(), dimension, &domain),
        };
        candidates.extend(level);
    }

    candidates
}

fn count_rows(rows: &[Row], field: &FieldId, candidates: &mut [Candidate]) {
    for row in rows {
        let Some(answer) = row.get(field) else {
            continue;
        };
        for candidate in candidates.iter_mut() {
            if candidate.matches(answer, row) {
                candidate.count += 1;
            }
        }
    }
}

fn counted_candidates(rows: &[Row], spec: &AggregationSpec) -> Vec<Candidate> {
    let mut candidates = build_candidates(rows, spec);
    debug!(
        "aggregating {} rows on {} into {} candidates",
        rows.len(),
        spec.field,
        candidates.len()
    );
    count_rows(rows, &spec.field, &mut candidates);
    candidates
}

/// Compute the derived observations for `rows` without storing them.
pub fn aggregate(rows: &[Row], spec: &AggregationSpec) -> Vec<Observation> {
    (1..)
        .zip(counted_candidates(rows, spec))
        .map(|(sequence, candidate)| candidate.into_observation(sequence))
        .collect()
}

/// Aggregate `rows` and store every derived observation in `sink`, in order.
///
/// Returns the number of observations stored. The first sink error aborts
/// emission; observations stored before it are not withdrawn.
pub fn add_aggregate_observations<S>(
    sink: &mut S,
    rows: &[Row],
    spec: &AggregationSpec,
) -> Result<usize, S::Error>
where
    S: ObservationSink + ?Sized,
{
    let mut emitted = 0;
    for (sequence, candidate) in (1..).zip(counted_candidates(rows, spec)) {
        sink.store_observation(candidate.into_observation(sequence))?;
        emitted += 1;
    }
    debug!("emitted {emitted} observations");
    Ok(emitted)
}
