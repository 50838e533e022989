use std::error::Error;

use duckdb::{params, Connection};
use itertools::Itertools;
use log::info;

use crate::{
    db::{
        field_type::FieldType,
        vector_source::{Field, SourceValue},
    },
    utils::lib_duckdb::{quote_identifier, quote_literal},
};

pub fn drop_table_sql(table: &str) -> String {
    format!("DROP TABLE IF EXISTS {};", quote_identifier(table))
}

pub fn create_table_sql(table: &str, fields: &[Field]) -> String {
    let columns = fields
        .iter()
        .map(|f| f.field_type.column_definition(&quote_identifier(&f.name)))
        .join(", ");
    format!("CREATE TABLE {} ({});", quote_identifier(table), columns)
}

/// Format one value as a SQL literal for a column of the given type.
pub fn sql_literal(field_type: FieldType, value: &SourceValue) -> String {
    match value {
        SourceValue::Null => "NULL".to_string(),
        SourceValue::Boolean(true) => "TRUE".to_string(),
        SourceValue::Boolean(false) => "FALSE".to_string(),
        SourceValue::Integer(v) => v.to_string(),
        SourceValue::Real(v) if v.is_finite() => v.to_string(),
        SourceValue::Real(_) => "NULL".to_string(),
        SourceValue::Text(v) => match field_type {
            FieldType::Geometry => format!("ST_GeomFromText({})", quote_literal(v)),
            FieldType::Blob => format!("unhex({})", quote_literal(v)),
            _ => quote_literal(v),
        },
    }
}

pub fn insert_row_sql(table: &str, fields: &[Field], values: &[SourceValue]) -> String {
    let columns = fields.iter().map(|f| quote_identifier(&f.name)).join(", ");
    let values = fields
        .iter()
        .zip(values)
        .map(|(f, v)| sql_literal(f.field_type, v))
        .join(", ");
    format!(
        "INSERT INTO {} ({}) VALUES ({});",
        quote_identifier(table),
        columns,
        values
    )
}

/// Drop the table if it exists and create it again with one column for each
/// field.  Whatever was in the table is gone.
pub fn recreate_table(
    conn: &Connection,
    table: &str,
    fields: &[Field],
) -> Result<(), Box<dyn Error>> {
    conn.execute_batch(&drop_table_sql(table))?;
    let sql = create_table_sql(table, fields);
    info!("{}", sql);
    conn.execute_batch(&sql)?;
    Ok(())
}

/// Insert the rows one statement at a time.  Nothing is committed until all
/// rows went in.
pub fn insert_rows(
    conn: &Connection,
    table: &str,
    fields: &[Field],
    rows: &[Vec<SourceValue>],
) -> Result<usize, Box<dyn Error>> {
    conn.execute_batch("BEGIN TRANSACTION;")?;
    let mut n = 0;
    for row in rows {
        match conn.execute(&insert_row_sql(table, fields, row), params![]) {
            Ok(k) => n += k,
            Err(e) => {
                conn.execute_batch("ROLLBACK;")?;
                return Err(Box::new(e));
            }
        }
    }
    conn.execute_batch("COMMIT;")?;
    info!("inserted {} rows into {}", n, table);
    Ok(n)
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    fn fields() -> Vec<Field> {
        vec![
            Field {
                name: "OBJECTID".to_string(),
                field_type: FieldType::Oid,
            },
            Field {
                name: "BoroCode".to_string(),
                field_type: FieldType::SmallInteger,
            },
            Field {
                name: "BoroName".to_string(),
                field_type: FieldType::String,
            },
            Field {
                name: "Shape_Area".to_string(),
                field_type: FieldType::Double,
            },
            Field {
                name: "Updated".to_string(),
                field_type: FieldType::Date,
            },
        ]
    }

    #[test]
    fn create_statement() {
        assert_eq!(drop_table_sql("boroughs"), "DROP TABLE IF EXISTS \"boroughs\";");
        assert_eq!(
            create_table_sql("boroughs", &fields()),
            "CREATE TABLE \"boroughs\" (\"OBJECTID\" INTEGER NOT NULL PRIMARY KEY, \"BoroCode\" SMALLINT, \"BoroName\" VARCHAR, \"Shape_Area\" DOUBLE, \"Updated\" DATE);"
        );
    }

    #[test]
    fn literals() {
        assert_eq!(sql_literal(FieldType::Integer, &SourceValue::Null), "NULL");
        assert_eq!(sql_literal(FieldType::Integer, &SourceValue::Integer(-3)), "-3");
        assert_eq!(sql_literal(FieldType::Double, &SourceValue::Real(1.5)), "1.5");
        assert_eq!(sql_literal(FieldType::Double, &SourceValue::Real(f64::NAN)), "NULL");
        assert_eq!(sql_literal(FieldType::Boolean, &SourceValue::Boolean(true)), "TRUE");
        assert_eq!(
            sql_literal(FieldType::String, &SourceValue::Text("Queen's".to_string())),
            "'Queen''s'"
        );
        assert_eq!(
            sql_literal(FieldType::Geometry, &SourceValue::Text("POINT (1 2)".to_string())),
            "ST_GeomFromText('POINT (1 2)')"
        );
        assert_eq!(
            sql_literal(FieldType::Blob, &SourceValue::Text("CAFE".to_string())),
            "unhex('CAFE')"
        );
    }

    #[test]
    fn insert_statement() {
        let fields = &fields()[0..3];
        let sql = insert_row_sql(
            "boroughs",
            fields,
            &[
                SourceValue::Integer(1),
                SourceValue::Integer(5),
                SourceValue::Text("Staten Island".to_string()),
            ],
        );
        assert_eq!(
            sql,
            "INSERT INTO \"boroughs\" (\"OBJECTID\", \"BoroCode\", \"BoroName\") VALUES (1, 5, 'Staten Island');"
        );
    }

    #[test]
    fn recreate_and_load() -> Result<(), Box<dyn Error>> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("CREATE TABLE boroughs (stale VARCHAR); INSERT INTO boroughs VALUES ('x');")?;

        let fields = fields();
        recreate_table(&conn, "boroughs", &fields)?;
        let rows = vec![
            vec![
                SourceValue::Integer(1),
                SourceValue::Integer(1),
                SourceValue::Text("Manhattan".to_string()),
                SourceValue::Real(636520502.0),
                SourceValue::Text("2025-03-01".to_string()),
            ],
            vec![
                SourceValue::Integer(2),
                SourceValue::Integer(4),
                SourceValue::Text("Queen's".to_string()),
                SourceValue::Null,
                SourceValue::Null,
            ],
        ];
        let n = insert_rows(&conn, "boroughs", &fields, &rows)?;
        assert_eq!(n, 2);

        let names: Vec<String> = conn
            .prepare("SELECT BoroName FROM boroughs ORDER BY OBJECTID")?
            .query_map([], |row| row.get::<usize, String>(0))?
            .collect::<Result<_, _>>()?;
        assert_eq!(names, vec!["Manhattan".to_string(), "Queen's".to_string()]);

        let column_count: i64 = conn.query_row(
            "SELECT count(*) FROM information_schema.columns WHERE table_name = 'boroughs'",
            [],
            |row| row.get(0),
        )?;
        assert_eq!(column_count, 5);
        Ok(())
    }

    #[test]
    fn failed_insert_leaves_table_empty() -> Result<(), Box<dyn Error>> {
        let conn = Connection::open_in_memory()?;
        let fields = &fields()[0..2];
        recreate_table(&conn, "boroughs", fields)?;
        let rows = vec![
            vec![SourceValue::Integer(1), SourceValue::Integer(1)],
            // duplicate primary key
            vec![SourceValue::Integer(1), SourceValue::Integer(2)],
        ];
        assert!(insert_rows(&conn, "boroughs", fields, &rows).is_err());
        let count: i64 = conn.query_row("SELECT count(*) FROM boroughs", [], |row| row.get(0))?;
        assert_eq!(count, 0);
        Ok(())
    }
}
