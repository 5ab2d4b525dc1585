use crate::query::ObservationQuery;
use crate::{schema, StoreConfig};
use log::debug;
use metrics_aggregate::{AggregationSpec, ObservationSink, Row as DataRow};
use metrics_model::{Metric, MetricMeta, Observation, ObservationValue, Unit};
use rusqlite::{params, Connection, OptionalExtension, Transaction};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("metric not found: {0}")]
    MetricNotFound(String),
    #[error("metric already exists: {0}")]
    DuplicateMetric(String),
    #[error("observation {observation_id} already exists for metric {metric_id}")]
    DuplicateObservation {
        metric_id: String,
        observation_id: String,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Handle to a metrics database. Cloning shares the underlying connection.
#[derive(Debug, Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    pub fn open_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, &StoreConfig::default())
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?, &StoreConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: &StoreConfig) -> Result<Self> {
        Self::from_connection(Connection::open(path)?, config)
    }

    fn from_connection(conn: Connection, config: &StoreConfig) -> Result<Self> {
        conn.busy_timeout(config.busy_timeout)?;
        schema::init(&conn, config)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("store mutex poisoned")
    }

    pub fn add_metric(&self, id: &str, title: &str, description: &str) -> Result<StoredMetric> {
        let meta = MetricMeta {
            id: id.to_string(),
            title: Some(title.to_string()),
            description: Some(description.to_string()),
        };

        let conn = self.lock();
        insert_metric(&conn, &meta)?;

        Ok(StoredMetric {
            store: self.clone(),
            meta,
        })
    }

    /// Insert a metric document and every observation it contains. Either the
    /// whole document is stored or none of it is.
    pub fn add_metric_json(&self, metric: &Metric) -> Result<StoredMetric> {
        let meta = metric.meta();

        let mut conn = self.lock();
        let tx = conn.transaction()?;
        insert_metric(&tx, &meta)?;
        for observation in &metric.observations {
            insert_observation(&tx, &meta.id, observation)?;
        }
        tx.commit()?;

        debug!(
            "imported metric {} with {} observations",
            meta.id,
            metric.observations.len()
        );

        Ok(StoredMetric {
            store: self.clone(),
            meta,
        })
    }

    pub fn import_json_str(&self, json: &str) -> Result<StoredMetric> {
        let metric = Metric::from_json_str(json)?;
        self.add_metric_json(&metric)
    }

    pub fn get_metric(&self, id: &str) -> Result<StoredMetric> {
        let conn = self.lock();
        let meta = conn
            .query_row(
                "SELECT id, title, description FROM metric WHERE id = ?1",
                params![id],
                |r| {
                    Ok(MetricMeta {
                        id: r.get(0)?,
                        title: r.get(1)?,
                        description: r.get(2)?,
                    })
                },
            )
            .optional()?;

        let meta = meta.ok_or_else(|| StoreError::MetricNotFound(id.to_string()))?;
        Ok(StoredMetric {
            store: self.clone(),
            meta,
        })
    }

    /// Every metric in the store, ordered by id.
    pub fn get_metrics(&self) -> Result<Vec<StoredMetric>> {
        let conn = self.lock();
        let mut stmt = conn.prepare("SELECT id, title, description FROM metric ORDER BY id ASC")?;
        let rows = stmt.query_map([], |r| {
            Ok(MetricMeta {
                id: r.get(0)?,
                title: r.get(1)?,
                description: r.get(2)?,
            })
        })?;

        let mut metrics = Vec::new();
        for meta in rows {
            metrics.push(StoredMetric {
                store: self.clone(),
                meta: meta?,
            });
        }
        Ok(metrics)
    }

    /// JSON documents for every metric, ordered by id.
    pub fn export_json(&self) -> Result<Vec<Metric>> {
        self.get_metrics()?.iter().map(StoredMetric::to_json).collect()
    }
}

/// One metric of a [`Store`].
#[derive(Debug, Clone)]
pub struct StoredMetric {
    store: Store,
    meta: MetricMeta,
}

impl StoredMetric {
    pub fn id(&self) -> &str {
        &self.meta.id
    }

    pub fn title(&self) -> Option<&str> {
        self.meta.title.as_deref()
    }

    pub fn description(&self) -> Option<&str> {
        self.meta.description.as_deref()
    }

    pub fn meta(&self) -> &MetricMeta {
        &self.meta
    }

    pub(crate) fn store(&self) -> &Store {
        &self.store
    }

    /// Store one observation and its dimensions.
    pub fn add_observation(&self, observation: &Observation) -> Result<()> {
        let mut conn = self.store.lock();
        let tx = conn.transaction()?;
        insert_observation(&tx, &self.meta.id, observation)?;
        tx.commit()?;
        Ok(())
    }

    /// Count `rows` per `spec` and store the derived observations under this
    /// metric. Returns how many observations were stored.
    pub fn add_aggregate_observations(&mut self, rows: &[DataRow], spec: &AggregationSpec) -> Result<usize> {
        metrics_aggregate::add_aggregate_observations(self, rows, spec)
    }

    /// Start a filtered query over this metric's observations.
    pub fn observations(&self) -> ObservationQuery<'_> {
        ObservationQuery::new(self)
    }

    /// Distinct dimension keys used by any observation of this metric, ascending.
    pub fn dimension_keys(&self) -> Result<Vec<String>> {
        let conn = self.store.lock();
        let mut stmt = conn.prepare(
            "SELECT key FROM dimension WHERE metric_id = ?1 GROUP BY key ORDER BY key ASC",
        )?;
        let rows = stmt.query_map(params![self.meta.id], |r| r.get(0))?;

        let mut keys = Vec::new();
        for key in rows {
            keys.push(key?);
        }
        Ok(keys)
    }

    /// The metric as a JSON document, including all of its observations.
    pub fn to_json(&self) -> Result<Metric> {
        let mut metric = Metric::new(self.meta.clone());
        metric.observations = self.observations().fetch()?;
        Ok(metric)
    }
}

impl ObservationSink for StoredMetric {
    type Error = StoreError;

    fn store_observation(&mut self, observation: Observation) -> Result<()> {
        self.add_observation(&observation)
    }
}

fn is_primary_key_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn insert_metric(conn: &Connection, meta: &MetricMeta) -> Result<()> {
    conn.execute(
        "INSERT INTO metric (id, title, description) VALUES (?1, ?2, ?3)",
        params![&meta.id, meta.title.as_deref(), meta.description.as_deref()],
    )
    .map_err(|err| {
        if is_primary_key_violation(&err) {
            StoreError::DuplicateMetric(meta.id.clone())
        } else {
            err.into()
        }
    })?;
    Ok(())
}

fn insert_observation(tx: &Transaction<'_>, metric_id: &str, observation: &Observation) -> Result<()> {
    let value = observation.value.clone().unwrap_or_default();
    let unit = observation.unit.clone().unwrap_or_default();

    tx.execute(
        r#"
        INSERT INTO observation (
          metric_id, id, value_amount, value_currency, measure,
          unit_name, unit_scheme, unit_id, unit_uri
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            metric_id,
            &observation.id,
            value.amount,
            value.currency,
            observation.measure.as_deref(),
            unit.name,
            unit.scheme,
            unit.id,
            unit.uri
        ],
    )
    .map_err(|err| {
        if is_primary_key_violation(&err) {
            StoreError::DuplicateObservation {
                metric_id: metric_id.to_string(),
                observation_id: observation.id.clone(),
            }
        } else {
            err.into()
        }
    })?;

    let mut stmt = tx.prepare_cached(
        "INSERT INTO dimension (metric_id, observation_id, key, value) VALUES (?1, ?2, ?3, ?4)",
    )?;
    for (key, value) in &observation.dimensions {
        stmt.execute(params![metric_id, &observation.id, key, value])?;
    }

    Ok(())
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

pub(crate) const OBSERVATION_COLUMNS: &str = "o.id, o.value_amount, o.value_currency, o.measure, \
     o.unit_name, o.unit_scheme, o.unit_id, o.unit_uri";

/// Build an [`Observation`] (without dimensions) from a row selected with
/// [`OBSERVATION_COLUMNS`]. Blank value/unit/measure columns read as absent.
pub(crate) fn observation_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<Observation> {
    let value = ObservationValue {
        amount: r.get(1)?,
        currency: r.get(2)?,
    };
    let unit = Unit {
        name: r.get(4)?,
        scheme: r.get(5)?,
        id: r.get(6)?,
        uri: r.get(7)?,
    };

    Ok(Observation {
        id: r.get(0)?,
        dimensions: Default::default(),
        value: (!value.is_empty()).then_some(value),
        measure: non_empty(r.get(3)?),
        unit: (!unit.is_empty()).then_some(unit),
    })
}
