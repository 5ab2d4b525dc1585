use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identifies a field of a [`Row`]: a column name or a positional index.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldId {
    Index(usize),
    Name(String),
}

impl fmt::Display for FieldId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldId::Index(idx) => write!(f, "{idx}"),
            FieldId::Name(name) => f.write_str(name),
        }
    }
}

impl From<&str> for FieldId {
    fn from(name: &str) -> Self {
        FieldId::Name(name.to_string())
    }
}

impl From<String> for FieldId {
    fn from(name: String) -> Self {
        FieldId::Name(name)
    }
}

impl From<usize> for FieldId {
    fn from(idx: usize) -> Self {
        FieldId::Index(idx)
    }
}

/// One unit of raw input data, e.g. a single survey response.
///
/// A missing field and a field holding an empty string are treated the same:
/// [`Row::get`] reports both as absent.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Row {
    values: BTreeMap<FieldId, Option<String>>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a row from positional values; the n-th value is stored under
    /// `FieldId::Index(n)`.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = Option<String>>,
    {
        Self {
            values: values
                .into_iter()
                .enumerate()
                .map(|(idx, value)| (FieldId::Index(idx), value))
                .collect(),
        }
    }

    pub fn set(&mut self, field: impl Into<FieldId>, value: Option<String>) {
        self.values.insert(field.into(), value);
    }

    pub fn with(mut self, field: impl Into<FieldId>, value: impl Into<String>) -> Self {
        self.set(field, Some(value.into()));
        self
    }

    /// The non-empty value stored for `field`, if any.
    pub fn get(&self, field: &FieldId) -> Option<&str> {
        self.values
            .get(field)
            .and_then(|value| value.as_deref())
            .filter(|value| !value.is_empty())
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for Row
where
    K: Into<FieldId>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter
                .into_iter()
                .map(|(field, value)| (field.into(), Some(value.into())))
                .collect(),
        }
    }
}
