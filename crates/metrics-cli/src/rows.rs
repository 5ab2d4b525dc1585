use std::io::Read;

use anyhow::{Context, Result};
use csv::StringRecord;
use log::{debug, warn};
use metrics_aggregate::{FieldId, Row};

/// Read survey rows from CSV.
///
/// With `has_header`, cells are keyed by their column name; cells past the
/// end of the header fall back to their zero-based column index. Without a
/// header every cell is keyed by index. Empty cells are left unset.
pub fn read_rows<R: Read>(reader: R, has_header: bool) -> Result<Vec<Row>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        // Header handling is manual so empty files and positional mode share one path.
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let headers = if has_header {
        match records.next() {
            Some(record) => Some(record.context("read csv header")?),
            None => return Ok(Vec::new()),
        }
    } else {
        None
    };

    let mut rows = Vec::new();
    for (index, record) in records.enumerate() {
        match record {
            Ok(record) => rows.push(to_row(&record, headers.as_ref())),
            Err(err) => warn!("skipping csv record {}: {err}", index + 1),
        }
    }

    debug!("read {} csv rows", rows.len());
    Ok(rows)
}

fn to_row(record: &StringRecord, headers: Option<&StringRecord>) -> Row {
    let mut row = Row::new();
    for (index, cell) in record.iter().enumerate() {
        if cell.is_empty() {
            continue;
        }
        let field = match headers.and_then(|h| h.get(index)) {
            Some(name) => FieldId::from(name),
            None => FieldId::Index(index),
        };
        row.set(field, Some(cell.to_string()));
    }
    row
}

/// Interpret a field given on the command line: a column name when the input
/// has a header, otherwise a zero-based column index.
pub fn parse_field(raw: &str, has_header: bool) -> Result<FieldId> {
    if has_header {
        return Ok(FieldId::from(raw));
    }
    let index = raw
        .parse::<usize>()
        .with_context(|| format!("field `{raw}` must be a column index when --no-header is set"))?;
    Ok(FieldId::Index(index))
}
