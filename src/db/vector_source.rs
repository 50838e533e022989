use std::{
    error::Error,
    path::{Path, PathBuf},
};

use duckdb::{types::Value, Connection};
use itertools::Itertools;
use log::info;
use thiserror::Error;
use walkdir::WalkDir;

use crate::{
    db::field_type::FieldType,
    utils::lib_duckdb::{quote_identifier, quote_literal},
};

/// Name of the geometry column in the output of `ST_Read`.
pub const GEOMETRY_COLUMN: &str = "geom";

#[derive(Error, Debug, PartialEq)]
pub enum LocateError {
    #[error("no shapefile matching {name} in {dir:?}")]
    NoShapefile { dir: PathBuf, name: String },
    #[error("no file geodatabase in {0:?}")]
    NoGeodatabase(PathBuf),
    #[error("no layer matching {name} in {gdb:?}")]
    NoLayer { gdb: PathBuf, name: String },
}

#[derive(Error, Debug, PartialEq)]
#[error("unsupported value {0} in column {1}")]
pub struct UnsupportedValue(pub String, pub String);

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub field_type: FieldType,
}

/// A value read from the source, before it gets formatted into an INSERT.
#[derive(Clone, Debug, PartialEq)]
pub enum SourceValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Text(String),
}

impl SourceValue {
    fn from_duckdb(value: Value, column: &str) -> Result<SourceValue, UnsupportedValue> {
        match value {
            Value::Null => Ok(SourceValue::Null),
            Value::Boolean(v) => Ok(SourceValue::Boolean(v)),
            Value::TinyInt(v) => Ok(SourceValue::Integer(v.into())),
            Value::SmallInt(v) => Ok(SourceValue::Integer(v.into())),
            Value::Int(v) => Ok(SourceValue::Integer(v.into())),
            Value::BigInt(v) => Ok(SourceValue::Integer(v)),
            Value::UTinyInt(v) => Ok(SourceValue::Integer(v.into())),
            Value::USmallInt(v) => Ok(SourceValue::Integer(v.into())),
            Value::UInt(v) => Ok(SourceValue::Integer(v.into())),
            Value::Float(v) => Ok(SourceValue::Real(v.into())),
            Value::Double(v) => Ok(SourceValue::Real(v)),
            Value::Text(v) => Ok(SourceValue::Text(v)),
            other => Err(UnsupportedValue(format!("{:?}", other), column.to_string())),
        }
    }
}

/// A layer of a shapefile or of a file geodatabase.
#[derive(Clone, Debug, PartialEq)]
pub struct VectorSource {
    pub path: PathBuf,
    /// Feature class name, only for geodatabases.
    pub layer: Option<String>,
}

impl VectorSource {
    pub fn shapefile(path: PathBuf) -> VectorSource {
        VectorSource { path, layer: None }
    }

    /// The metadata xml file that comes with a shapefile, e.g. `nybb.shp.xml`.
    pub fn metadata_xml_path(&self) -> Option<PathBuf> {
        match self.layer {
            Some(_) => None,
            None => {
                let mut name = self.path.clone().into_os_string();
                name.push(".xml");
                Some(PathBuf::from(name))
            }
        }
    }

    /// The `ST_Read(...)` table function call for this source.
    pub fn st_read(&self) -> String {
        let path = quote_literal(&self.path.to_string_lossy());
        match &self.layer {
            Some(layer) => format!("ST_Read({}, layer = {})", path, quote_literal(layer)),
            None => format!("ST_Read({})", path),
        }
    }

    fn layer_filter(&self) -> String {
        match &self.layer {
            Some(layer) => format!("WHERE layer.name = {}", quote_literal(layer)),
            None => String::new(),
        }
    }

    /// Get the attribute fields of the layer, in file order, after the object
    /// id.  A `geom` field is added at the end if the layer has a geometry.
    pub fn read_fields(&self, conn: &Connection) -> Result<Vec<Field>, Box<dyn Error>> {
        let path = quote_literal(&self.path.to_string_lossy());
        let query = format!(
            r#"
SELECT
    field.name,
    field.type,
    field.subtype
FROM (
    SELECT unnest(layer.fields) AS field
    FROM (SELECT unnest(layers) AS layer FROM ST_Read_Meta({}))
    {}
);"#,
            path,
            self.layer_filter()
        );
        let mut stmt = conn.prepare(&query)?;
        let rows = stmt.query_map([], |row| {
            let name: String = row.get::<usize, String>(0)?;
            let field_type: String = row.get::<usize, String>(1)?;
            let subtype: Option<String> = row.get::<usize, Option<String>>(2)?;
            Ok((name, field_type, subtype))
        })?;
        let mut fields: Vec<Field> = Vec::new();
        for row in rows {
            let (name, field_type, subtype) = row?;
            fields.push(Field {
                name,
                field_type: FieldType::from_ogr(&field_type, subtype.as_deref())?,
            });
        }

        let query = format!(
            r#"
SELECT len(layer.geometry_fields)
FROM (SELECT unnest(layers) AS layer FROM ST_Read_Meta({}))
{}
LIMIT 1;"#,
            path,
            self.layer_filter()
        );
        let geometry_count: i64 = conn.query_row(&query, [], |row| row.get(0))?;
        if geometry_count > 0 {
            fields.push(Field {
                name: GEOMETRY_COLUMN.to_string(),
                field_type: FieldType::Geometry,
            });
        }
        Ok(self.with_object_id(fields))
    }

    /// Name of the object id column: `FID` for a shapefile, `OBJECTID` for a
    /// feature class.
    pub fn object_id_name(&self) -> &'static str {
        match self.layer {
            Some(_) => "OBJECTID",
            None => "FID",
        }
    }

    /// GDAL keeps the object id out of the attribute fields.  Put it back in
    /// front as the `Oid` primary key, unless an attribute already has that
    /// name.
    pub fn with_object_id(&self, fields: Vec<Field>) -> Vec<Field> {
        let name = self.object_id_name();
        if fields.iter().any(|f| f.name.eq_ignore_ascii_case(name)) {
            return fields;
        }
        let mut out = Vec::with_capacity(fields.len() + 1);
        out.push(Field {
            name: name.to_string(),
            field_type: FieldType::Oid,
        });
        out.extend(fields);
        out
    }

    /// How to select a field from `ST_Read` so the value can be written back
    /// as a SQL literal.  The object id is the row number, starting at 0 for
    /// shapefiles and at 1 for feature classes.
    pub fn select_expression(&self, field: &Field) -> String {
        let column = quote_identifier(&field.name);
        match field.field_type {
            FieldType::Oid => {
                let offset = match self.layer {
                    Some(_) => "",
                    None => " - 1",
                };
                format!("CAST(row_number() OVER (){} AS INTEGER) AS {}", offset, column)
            }
            FieldType::Geometry => format!("ST_AsText({})", column),
            FieldType::Blob => format!("hex({})", column),
            FieldType::GlobalId
            | FieldType::Guid
            | FieldType::Date
            | FieldType::DateTime
            | FieldType::Time => format!("CAST({} AS VARCHAR)", column),
            _ => column,
        }
    }

    /// Read all the rows of the layer.  Geometries come back as WKT, dates
    /// and guids as text.
    pub fn read_rows(
        &self,
        conn: &Connection,
        fields: &[Field],
    ) -> Result<Vec<Vec<SourceValue>>, Box<dyn Error>> {
        let columns = fields
            .iter()
            .map(|f| self.select_expression(f))
            .join(",\n    ");
        let query = format!("SELECT\n    {}\nFROM {};", columns, self.st_read());
        let mut stmt = conn.prepare(&query)?;
        let mut rows = stmt.query([])?;
        let mut out: Vec<Vec<SourceValue>> = Vec::new();
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(fields.len());
            for (i, field) in fields.iter().enumerate() {
                let value = row.get::<usize, Value>(i)?;
                values.push(SourceValue::from_duckdb(value, &field.name)?);
            }
            out.push(values);
        }
        info!("read {} rows from {}", out.len(), self.st_read());
        Ok(out)
    }
}

/// Find the shapefile in `dir` (or any subfolder) whose path contains `name`.
/// If several files match, the last one in path order wins.
pub fn locate_shapefile(dir: &Path, name: &str) -> Result<PathBuf, LocateError> {
    let shp_file = WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
        .map(|e| e.into_path())
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "shp") && p.to_string_lossy().contains(name)
        })
        .last()
        .ok_or_else(|| LocateError::NoShapefile {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        })?;
    info!("shapefile used is {:?}", shp_file);
    Ok(shp_file)
}

/// All the file geodatabases (folders ending in `.gdb`) under `dir`.
pub fn locate_geodatabases(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .map(|e| e.into_path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "gdb"))
        .collect()
}

/// Names of the layers (feature classes) in a vector file or geodatabase.
pub fn list_layers(conn: &Connection, path: &Path) -> Result<Vec<String>, Box<dyn Error>> {
    let query = format!(
        "SELECT layer.name FROM (SELECT unnest(layers) AS layer FROM ST_Read_Meta({}));",
        quote_literal(&path.to_string_lossy())
    );
    let mut stmt = conn.prepare(&query)?;
    let names = stmt
        .query_map([], |row| row.get::<usize, String>(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Pick the layer whose name contains `name`, last match wins.
pub fn match_layer(layers: &[String], name: &str) -> Option<String> {
    layers.iter().rfind(|l| l.contains(name)).cloned()
}

/// Use the first geodatabase in `dir`, and the feature class matching `name`.
pub fn locate_feature_class(
    conn: &Connection,
    dir: &Path,
    name: &str,
) -> Result<VectorSource, Box<dyn Error>> {
    let gdb = locate_geodatabases(dir)
        .into_iter()
        .next()
        .ok_or_else(|| LocateError::NoGeodatabase(dir.to_path_buf()))?;
    let layers = list_layers(conn, &gdb)?;
    let layer = match_layer(&layers, name).ok_or_else(|| LocateError::NoLayer {
        gdb: gdb.clone(),
        name: name.to_string(),
    })?;
    info!("feature class used is {} in {:?}", layer, gdb);
    Ok(VectorSource {
        path: gdb,
        layer: Some(layer),
    })
}
