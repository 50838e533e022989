use duckdb::{AccessMode, Config, Connection};
use log::info;

/// Open the DuckDB database that holds the reference table and the geodata
/// tables, with the spatial extension loaded.
pub fn open_geodata_db(duckdb_path: &str) -> Result<Connection, duckdb::Error> {
    let config = Config::default().access_mode(AccessMode::ReadWrite)?;
    let conn = Connection::open_with_flags(duckdb_path, config)?;
    load_spatial(&conn)?;
    info!("connected to {}", duckdb_path);
    Ok(conn)
}

/// The spatial extension reads shapefiles and file geodatabases through
/// `ST_Read` and provides the GEOMETRY type.  Needs network access the first
/// time it gets installed.
pub fn load_spatial(conn: &Connection) -> Result<(), duckdb::Error> {
    conn.execute_batch("INSTALL spatial; LOAD spatial;")
}

/// Quote a table or column name, e.g. `my "table"` becomes `"my ""table"""`.
pub fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a string value, e.g. `O'Brien` becomes `'O''Brien'`.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
