use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq)]
pub enum FieldTypeError {
    #[error("unknown field type {0}")]
    Unknown(String),
}

/// Type of an attribute field in a vector file.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Oid,
    GlobalId,
    Guid,
    SmallInteger,
    Integer,
    BigInteger,
    Single,
    Double,
    Boolean,
    String,
    Date,
    DateTime,
    Time,
    Geometry,
    Blob,
}

impl FieldType {
    pub const ALL: [FieldType; 15] = [
        FieldType::Oid,
        FieldType::GlobalId,
        FieldType::Guid,
        FieldType::SmallInteger,
        FieldType::Integer,
        FieldType::BigInteger,
        FieldType::Single,
        FieldType::Double,
        FieldType::Boolean,
        FieldType::String,
        FieldType::Date,
        FieldType::DateTime,
        FieldType::Time,
        FieldType::Geometry,
        FieldType::Blob,
    ];

    /// Column type to use in the `CREATE TABLE` statement.
    pub fn sql_type(&self) -> &'static str {
        match self {
            FieldType::Oid => "INTEGER",
            FieldType::GlobalId => "VARCHAR(38)",
            FieldType::Guid => "VARCHAR(38)",
            FieldType::SmallInteger => "SMALLINT",
            FieldType::Integer => "INTEGER",
            FieldType::BigInteger => "BIGINT",
            FieldType::Single => "FLOAT",
            FieldType::Double => "DOUBLE",
            FieldType::Boolean => "BOOLEAN",
            FieldType::String => "VARCHAR",
            FieldType::Date => "DATE",
            FieldType::DateTime => "TIMESTAMP",
            FieldType::Time => "TIME",
            FieldType::Geometry => "GEOMETRY",
            FieldType::Blob => "BLOB",
        }
    }

    /// Column definition, e.g. `"BoroCode" SMALLINT`.  The object id becomes
    /// the primary key.
    pub fn column_definition(&self, quoted_name: &str) -> String {
        match self {
            FieldType::Oid => format!("{} INTEGER NOT NULL PRIMARY KEY", quoted_name),
            _ => format!("{} {}", quoted_name, self.sql_type()),
        }
    }

    /// Map an OGR field type and subtype, as reported by `ST_Read_Meta`.
    pub fn from_ogr(field_type: &str, subtype: Option<&str>) -> Result<FieldType, FieldTypeError> {
        let subtype = subtype.unwrap_or("None");
        match (field_type, subtype) {
            ("Integer", "Boolean") => Ok(FieldType::Boolean),
            ("Integer", "Int16") => Ok(FieldType::SmallInteger),
            ("Integer", _) => Ok(FieldType::Integer),
            ("Integer64", _) => Ok(FieldType::BigInteger),
            ("Real", "Float32") => Ok(FieldType::Single),
            ("Real", _) => Ok(FieldType::Double),
            ("String", "UUID") => Ok(FieldType::Guid),
            ("String", _) => Ok(FieldType::String),
            ("Date", _) => Ok(FieldType::Date),
            ("DateTime", _) => Ok(FieldType::DateTime),
            ("Time", _) => Ok(FieldType::Time),
            ("Binary", _) => Ok(FieldType::Blob),
            _ => Err(FieldTypeError::Unknown(format!("{}/{}", field_type, subtype))),
        }
    }
}

/// Parse the Esri field type names, e.g. `SmallInteger`, `OID`.
impl std::str::FromStr for FieldType {
    type Err = FieldTypeError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "OID" => Ok(FieldType::Oid),
            "GlobalID" => Ok(FieldType::GlobalId),
            "Guid" => Ok(FieldType::Guid),
            "SmallInteger" => Ok(FieldType::SmallInteger),
            "Integer" => Ok(FieldType::Integer),
            "BigInteger" => Ok(FieldType::BigInteger),
            "Single" => Ok(FieldType::Single),
            "Double" => Ok(FieldType::Double),
            "String" => Ok(FieldType::String),
            "Date" | "DateOnly" => Ok(FieldType::Date),
            "TimestampOffset" => Ok(FieldType::DateTime),
            "TimeOnly" => Ok(FieldType::Time),
            "Geometry" => Ok(FieldType::Geometry),
            "Blob" => Ok(FieldType::Blob),
            _ => Err(FieldTypeError::Unknown(s.to_string())),
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            FieldType::Oid => write!(f, "OID"),
            FieldType::GlobalId => write!(f, "GlobalID"),
            FieldType::Guid => write!(f, "Guid"),
            FieldType::SmallInteger => write!(f, "SmallInteger"),
            FieldType::Integer => write!(f, "Integer"),
            FieldType::BigInteger => write!(f, "BigInteger"),
            FieldType::Single => write!(f, "Single"),
            FieldType::Double => write!(f, "Double"),
            FieldType::Boolean => write!(f, "Boolean"),
            FieldType::String => write!(f, "String"),
            FieldType::Date => write!(f, "Date"),
            FieldType::DateTime => write!(f, "TimestampOffset"),
            FieldType::Time => write!(f, "TimeOnly"),
            FieldType::Geometry => write!(f, "Geometry"),
            FieldType::Blob => write!(f, "Blob"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn esri_types() {
        let expected = [
            ("OID", "INTEGER"),
            ("GlobalID", "VARCHAR(38)"),
            ("Guid", "VARCHAR(38)"),
            ("Integer", "INTEGER"),
            ("SmallInteger", "SMALLINT"),
            ("Single", "FLOAT"),
            ("Double", "DOUBLE"),
            ("Geometry", "GEOMETRY"),
            ("String", "VARCHAR"),
            ("Date", "DATE"),
            ("DateOnly", "DATE"),
            ("TimeOnly", "TIME"),
            ("TimestampOffset", "TIMESTAMP"),
        ];
        for (tag, sql) in expected {
            assert_eq!(FieldType::from_str(tag).unwrap().sql_type(), sql, "{}", tag);
        }
        assert_eq!(
            FieldType::from_str("Raster"),
            Err(FieldTypeError::Unknown("Raster".to_string()))
        );
    }

    #[test]
    fn every_type_has_one_name() {
        // Display and FromStr agree, except for Boolean which has no Esri tag
        for field_type in FieldType::ALL {
            if field_type == FieldType::Boolean {
                continue;
            }
            let tag = field_type.to_string();
            assert_eq!(FieldType::from_str(&tag).unwrap(), field_type);
        }
    }

    #[test]
    fn ogr_types() {
        assert_eq!(FieldType::from_ogr("Integer", None), Ok(FieldType::Integer));
        assert_eq!(
            FieldType::from_ogr("Integer", Some("Int16")),
            Ok(FieldType::SmallInteger)
        );
        assert_eq!(
            FieldType::from_ogr("Integer", Some("Boolean")),
            Ok(FieldType::Boolean)
        );
        assert_eq!(FieldType::from_ogr("Integer64", None), Ok(FieldType::BigInteger));
        assert_eq!(FieldType::from_ogr("Real", Some("None")), Ok(FieldType::Double));
        assert_eq!(FieldType::from_ogr("Real", Some("Float32")), Ok(FieldType::Single));
        assert_eq!(FieldType::from_ogr("String", Some("UUID")), Ok(FieldType::Guid));
        assert_eq!(FieldType::from_ogr("DateTime", None), Ok(FieldType::DateTime));
        assert!(FieldType::from_ogr("StringList", None).is_err());
    }

    #[test]
    fn column_definitions() {
        assert_eq!(
            FieldType::Oid.column_definition("\"OBJECTID\""),
            "\"OBJECTID\" INTEGER NOT NULL PRIMARY KEY"
        );
        assert_eq!(
            FieldType::Double.column_definition("\"Shape_Area\""),
            "\"Shape_Area\" DOUBLE"
        );
    }
}
