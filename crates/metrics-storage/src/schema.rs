use rusqlite::Connection;

use crate::StoreConfig;

pub(crate) fn init(conn: &Connection, config: &StoreConfig) -> rusqlite::Result<()> {
    // Foreign keys are disabled by default in SQLite.
    conn.pragma_update(None, "foreign_keys", if config.foreign_keys { "ON" } else { "OFF" })?;

    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS metric (
          id TEXT PRIMARY KEY,
          title TEXT,
          description TEXT
        );

        CREATE TABLE IF NOT EXISTS observation (
          metric_id TEXT NOT NULL REFERENCES metric(id),
          id TEXT NOT NULL,
          value_amount TEXT,
          value_currency TEXT,
          measure TEXT,
          unit_name TEXT,
          unit_scheme TEXT,
          unit_id TEXT,
          unit_uri TEXT,
          PRIMARY KEY (metric_id, id)
        );

        -- One row per dimension key set on an observation. A key that is not
        -- set has no row at all.
        CREATE TABLE IF NOT EXISTS dimension (
          metric_id TEXT NOT NULL,
          observation_id TEXT NOT NULL,
          key TEXT NOT NULL,
          value TEXT,
          PRIMARY KEY (metric_id, observation_id, key),
          FOREIGN KEY (metric_id, observation_id) REFERENCES observation(metric_id, id)
        );

        CREATE INDEX IF NOT EXISTS idx_dimension_key_value ON dimension(metric_id, key, value);
        "#,
    )?;

    Ok(())
}
