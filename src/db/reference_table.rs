// The reference table drives which datasets get refreshed and how often.

use std::{error::Error, fs, io::Cursor, path::Path, str::FromStr};

use duckdb::{params, Connection};
use jiff::{civil::DateTime, tz::TimeZone, SignedDuration, Timestamp};
use log::{info, warn};
use quick_xml::{events::Event, Reader, Writer};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const REFERENCE_TABLE: &str = "geodata_reference";

#[derive(Error, Debug, PartialEq)]
#[error("unknown data format {0}, expecting .shp or .gdb")]
pub struct DataFormatError(pub String);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataFormat {
    Shapefile,
    Geodatabase,
}

impl FromStr for DataFormat {
    type Err = DataFormatError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            ".shp" => Ok(DataFormat::Shapefile),
            ".gdb" => Ok(DataFormat::Geodatabase),
            _ => Err(DataFormatError(s.to_string())),
        }
    }
}

impl std::fmt::Display for DataFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            DataFormat::Shapefile => write!(f, ".shp"),
            DataFormat::Geodatabase => write!(f, ".gdb"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    pub id: i32,
    pub active: bool,
    /// Landing page of the dataset on the portal
    pub source_url: String,
    /// Matches the download link and the file or layer name
    pub external_name_prefix: String,
    /// Name of the table the data gets loaded into
    pub internal_name: String,
    pub data_format: DataFormat,
    /// Refresh interval, in days
    pub update_frequency: i32,
    pub update_date: Option<DateTime>,
    pub meta: Option<String>,
}

impl MetadataRecord {
    /// Is it time to refresh this dataset?
    pub fn is_due(&self, now: DateTime) -> bool {
        match self.update_date {
            None => true,
            Some(last) => {
                let frequency = SignedDuration::from_hours(24 * i64::from(self.update_frequency));
                last.duration_until(now) >= frequency
            }
        }
    }

    /// Should the job refresh this record now?  It has to be active, match
    /// `dataset` when one is given, and be due unless `force` is set.
    pub fn is_eligible(&self, now: DateTime, force: bool, dataset: Option<&str>) -> bool {
        if dataset.is_some_and(|name| name != self.internal_name) {
            return false;
        }
        if !self.active {
            return false;
        }
        if !force && !self.is_due(now) {
            info!(
                "{} was updated on {:?}, skipping",
                self.internal_name, self.update_date
            );
            return false;
        }
        true
    }
}

pub fn create_table(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch(&format!(
        r"
CREATE SEQUENCE IF NOT EXISTS {0}_id_seq;
CREATE TABLE IF NOT EXISTS {0} (
    id INTEGER PRIMARY KEY DEFAULT nextval('{0}_id_seq'),
    active BOOLEAN NOT NULL DEFAULT TRUE,
    source_url VARCHAR NOT NULL,
    external_name_prefix VARCHAR NOT NULL,
    internal_name VARCHAR NOT NULL,
    data_format VARCHAR NOT NULL,
    update_frequency INTEGER NOT NULL,
    update_date TIMESTAMP,
    meta VARCHAR,
);",
        REFERENCE_TABLE
    ))
}

/// Register a new dataset.  Return the id of the new record.
pub fn add_record(
    conn: &Connection,
    source_url: &str,
    external_name_prefix: &str,
    internal_name: &str,
    data_format: DataFormat,
    update_frequency: i32,
) -> Result<i32, duckdb::Error> {
    conn.query_row(
        &format!(
            r"
INSERT INTO {} (source_url, external_name_prefix, internal_name, data_format, update_frequency)
VALUES (?, ?, ?, ?, ?)
RETURNING id;",
            REFERENCE_TABLE
        ),
        params![
            source_url,
            external_name_prefix,
            internal_name,
            data_format.to_string(),
            update_frequency
        ],
        |row| row.get(0),
    )
}

pub fn set_active(conn: &Connection, id: i32, active: bool) -> Result<usize, duckdb::Error> {
    conn.execute(
        &format!("UPDATE {} SET active = ? WHERE id = ?;", REFERENCE_TABLE),
        params![active, id],
    )
}

/// Get all the records of the reference table, ordered by id.
pub fn get_records(conn: &Connection) -> Result<Vec<MetadataRecord>, Box<dyn Error>> {
    let query = format!(
        r#"
SELECT
    id,
    active,
    source_url,
    external_name_prefix,
    internal_name,
    data_format,
    update_frequency,
    epoch_us(update_date),
    meta
FROM {}
ORDER BY id;"#,
        REFERENCE_TABLE
    );
    let mut stmt = conn.prepare(&query)?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<usize, i32>(0)?,
            row.get::<usize, bool>(1)?,
            row.get::<usize, String>(2)?,
            row.get::<usize, String>(3)?,
            row.get::<usize, String>(4)?,
            row.get::<usize, String>(5)?,
            row.get::<usize, i32>(6)?,
            row.get::<usize, Option<i64>>(7)?,
            row.get::<usize, Option<String>>(8)?,
        ))
    })?;

    let mut records: Vec<MetadataRecord> = Vec::new();
    for row in rows {
        let (id, active, source_url, prefix, internal_name, format, frequency, micros, meta) =
            row?;
        let update_date = match micros {
            Some(micros) => Some(
                Timestamp::from_microsecond(micros)?
                    .to_zoned(TimeZone::UTC)
                    .datetime(),
            ),
            None => None,
        };
        records.push(MetadataRecord {
            id,
            active,
            source_url,
            external_name_prefix: prefix,
            internal_name,
            data_format: DataFormat::from_str(&format)?,
            update_frequency: frequency,
            update_date,
            meta,
        });
    }
    Ok(records)
}

/// Set the update date of a record, after its table was loaded.
pub fn mark_updated(
    conn: &Connection,
    id: i32,
    update_date: DateTime,
) -> Result<usize, duckdb::Error> {
    conn.execute(
        &format!(
            "UPDATE {} SET update_date = CAST(? AS TIMESTAMP) WHERE id = ?;",
            REFERENCE_TABLE
        ),
        params![update_date.to_string(), id],
    )
}

pub fn set_meta(conn: &Connection, id: i32, meta: &str) -> Result<usize, duckdb::Error> {
    conn.execute(
        &format!("UPDATE {} SET meta = ? WHERE id = ?;", REFERENCE_TABLE),
        params![meta, id],
    )
}

/// Read the xml metadata file that comes with a shapefile and return it
/// without the whitespace between elements.  Return `None` if there is no
/// such file.
pub fn read_metadata_xml(path: &Path) -> Result<Option<String>, Box<dyn Error>> {
    if !path.is_file() {
        warn!("no metadata file {:?}", path);
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    Ok(Some(normalize_xml(&content)?))
}

fn normalize_xml(content: &str) -> Result<String, Box<dyn Error>> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);
    let mut writer = Writer::new(Cursor::new(Vec::new()));
    loop {
        match reader.read_event()? {
            Event::Eof => break,
            event => writer.write_event(event)?,
        }
    }
    Ok(String::from_utf8(writer.into_inner().into_inner())?)
}
