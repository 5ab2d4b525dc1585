use serde::{Deserialize, Serialize};

use crate::FieldId;

/// How dimension passes feed into each other when building candidates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expansion {
    /// Each pass crosses every candidate accumulated so far, base candidates
    /// and earlier passes' output alike, so every subset of the extra
    /// dimensions is represented. A dimension without values adds nothing and
    /// leaves the pool unchanged. `"exponential"` is accepted as an alias.
    #[default]
    #[serde(alias = "exponential")]
    Accumulated,
    /// Each pass crosses only the answer-only candidates: one count per answer
    /// and single dimension value, never combining two extra dimensions.
    PerDimension,
}

/// A row field that becomes an extra dimension of the output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionField {
    pub field: FieldId,
    pub dimension_name: String,
}

/// Extra dimensions, in the order they were declared.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<DimensionField>", into = "Vec<DimensionField>")]
pub struct DimensionSpec {
    fields: Vec<DimensionField>,
}

impl DimensionSpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `field` as dimension `dimension_name`. Declaring a field again
    /// renames its dimension but keeps its original position.
    pub fn insert(&mut self, field: impl Into<FieldId>, dimension_name: impl Into<String>) {
        let field = field.into();
        let dimension_name = dimension_name.into();
        match self.fields.iter_mut().find(|d| d.field == field) {
            Some(existing) => existing.dimension_name = dimension_name,
            None => self.fields.push(DimensionField {
                field,
                dimension_name,
            }),
        }
    }

    pub fn with(mut self, field: impl Into<FieldId>, dimension_name: impl Into<String>) -> Self {
        self.insert(field, dimension_name);
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = &DimensionField> {
        self.fields.iter()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<Vec<DimensionField>> for DimensionSpec {
    fn from(fields: Vec<DimensionField>) -> Self {
        let mut spec = DimensionSpec::new();
        for DimensionField {
            field,
            dimension_name,
        } in fields
        {
            spec.insert(field, dimension_name);
        }
        spec
    }
}

impl From<DimensionSpec> for Vec<DimensionField> {
    fn from(spec: DimensionSpec) -> Self {
        spec.fields
    }
}

/// Fully determines the shape of an aggregation's output.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregationSpec {
    /// Field whose values are counted.
    pub field: FieldId,
    /// Dimension name the counted value is recorded under.
    pub answer_dimension: String,
    #[serde(default)]
    pub dimensions: DimensionSpec,
    #[serde(default)]
    pub expansion: Expansion,
}

impl AggregationSpec {
    pub fn new(field: impl Into<FieldId>, answer_dimension: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            answer_dimension: answer_dimension.into(),
            dimensions: DimensionSpec::new(),
            expansion: Expansion::default(),
        }
    }

    pub fn dimension(mut self, field: impl Into<FieldId>, dimension_name: impl Into<String>) -> Self {
        self.dimensions.insert(field, dimension_name);
        self
    }

    pub fn expansion(mut self, expansion: Expansion) -> Self {
        self.expansion = expansion;
        self
    }
}
