use async_trait::async_trait;
use mysql_async::consts::ColumnType;
use mysql_async::prelude::Queryable;
use mysql_async::{Column, Conn, Opts, OptsBuilder, Row, Value};

use crate::config::DatabaseSettings;
use crate::error::{LabError, Result};
use crate::registry::Engine;
use crate::traits::{Connection, Cursor, DatabaseDriver};
use crate::types::{RawQueryResult, SqlValue};

/// MySQL driver implementation using mysql_async.
///
/// Queries use the text protocol, the same path an interactive client takes.
pub struct MySqlDriver {
    opts: Opts,
}

impl MySqlDriver {
    pub fn new(settings: &DatabaseSettings) -> Self {
        let builder = OptsBuilder::default()
            .ip_or_hostname(settings.host.clone())
            .tcp_port(settings.port)
            .user(Some(settings.user.clone()))
            .pass(Some(settings.password.clone()))
            .db_name(Some(settings.database.clone()));
        Self {
            opts: Opts::from(builder),
        }
    }
}

#[async_trait]
impl DatabaseDriver for MySqlDriver {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let conn = Conn::new(self.opts.clone())
            .await
            .map_err(|e| LabError::ConnectionFailed {
                engine: Engine::MySql,
                reason: e.to_string(),
            })?;
        Ok(Box::new(MySqlConnection { conn }))
    }
}

struct MySqlConnection {
    conn: Conn,
}

#[async_trait]
impl Connection for MySqlConnection {
    fn engine(&self) -> Engine {
        Engine::MySql
    }

    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>> {
        Ok(Box::new(MySqlCursor {
            conn: &mut self.conn,
            pending: None,
        }))
    }

    async fn commit(&mut self) -> Result<()> {
        self.conn.query_drop("COMMIT").await.map_err(query_error)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn.disconnect().await.map_err(query_error)
    }
}

struct MySqlCursor<'a> {
    conn: &'a mut Conn,
    pending: Option<RawQueryResult>,
}

#[async_trait]
impl<'a> Cursor for MySqlCursor<'a> {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        let mut result = self.conn.query_iter(sql).await.map_err(query_error)?;
        let columns: Vec<Column> = result.columns_ref().to_vec();
        let rows: Vec<Row> = result.collect().await.map_err(query_error)?;
        // Drain any further result sets from stacked statements.
        result.drop_result().await.map_err(query_error)?;

        let values = rows
            .iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(i, col)| match row.as_ref(i) {
                        Some(value) => convert_value(value, col),
                        None => SqlValue::Null,
                    })
                    .collect()
            })
            .collect();
        let names = columns
            .iter()
            .map(|c| c.name_str().into_owned())
            .collect();

        self.pending = Some(RawQueryResult::new(names, values));
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<RawQueryResult> {
        Ok(self.pending.take().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// Convert a text-protocol value using the column type to restore numbers.
fn convert_value(value: &Value, column: &Column) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Bytes(bytes) => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            match column.column_type() {
                ColumnType::MYSQL_TYPE_TINY
                | ColumnType::MYSQL_TYPE_SHORT
                | ColumnType::MYSQL_TYPE_INT24
                | ColumnType::MYSQL_TYPE_LONG
                | ColumnType::MYSQL_TYPE_LONGLONG
                | ColumnType::MYSQL_TYPE_YEAR => {
                    if let Ok(i) = text.parse::<i64>() {
                        SqlValue::Int64(i)
                    } else if let Ok(u) = text.parse::<u64>() {
                        SqlValue::UInt64(u)
                    } else {
                        SqlValue::Text(text)
                    }
                }
                ColumnType::MYSQL_TYPE_FLOAT
                | ColumnType::MYSQL_TYPE_DOUBLE
                | ColumnType::MYSQL_TYPE_DECIMAL
                | ColumnType::MYSQL_TYPE_NEWDECIMAL => match text.parse::<f64>() {
                    Ok(f) => SqlValue::Float64(f),
                    Err(_) => SqlValue::Text(text),
                },
                _ => SqlValue::Text(text),
            }
        }
        Value::Int(i) => SqlValue::Int64(*i),
        Value::UInt(u) => SqlValue::UInt64(*u),
        Value::Float(f) => SqlValue::Float64(f64::from(*f)),
        Value::Double(d) => SqlValue::Float64(*d),
        other => SqlValue::Text(other.as_sql(true).trim_matches('\'').to_string()),
    }
}

/// Render server errors the way the MySQL command-line client does.
fn query_error(e: mysql_async::Error) -> LabError {
    match e {
        mysql_async::Error::Server(server) => LabError::QueryFailed(format!(
            "{} ({}): {}",
            server.code, server.state, server.message
        )),
        other => LabError::QueryFailed(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(bytes: &str) -> Value {
        Value::Bytes(bytes.as_bytes().to_vec())
    }

    #[test]
    fn test_integer_columns_become_numbers() {
        let long = Column::new(ColumnType::MYSQL_TYPE_LONG);
        assert_eq!(convert_value(&text("42"), &long), SqlValue::Int64(42));
        assert_eq!(convert_value(&text("-7"), &long), SqlValue::Int64(-7));

        let longlong = Column::new(ColumnType::MYSQL_TYPE_LONGLONG);
        assert_eq!(
            convert_value(&text("18446744073709551615"), &longlong),
            SqlValue::UInt64(u64::MAX)
        );
    }

    #[test]
    fn test_float_and_decimal_columns_become_floats() {
        let double = Column::new(ColumnType::MYSQL_TYPE_DOUBLE);
        assert_eq!(convert_value(&text("2.5"), &double), SqlValue::Float64(2.5));

        let decimal = Column::new(ColumnType::MYSQL_TYPE_NEWDECIMAL);
        assert_eq!(convert_value(&text("1.50"), &decimal), SqlValue::Float64(1.5));
    }

    #[test]
    fn test_strings_and_nulls() {
        let varchar = Column::new(ColumnType::MYSQL_TYPE_VAR_STRING);
        assert_eq!(convert_value(&text("admin"), &varchar), SqlValue::from("admin"));
        // Digits in a string column stay text.
        assert_eq!(convert_value(&text("1"), &varchar), SqlValue::from("1"));
        assert_eq!(convert_value(&Value::NULL, &varchar), SqlValue::Null);

        // A non-numeric value injected into an integer column is kept as text.
        let long = Column::new(ColumnType::MYSQL_TYPE_LONG);
        assert_eq!(convert_value(&text("abc"), &long), SqlValue::from("abc"));
    }

    #[test]
    fn test_binary_protocol_values() {
        let any = Column::new(ColumnType::MYSQL_TYPE_LONGLONG);
        assert_eq!(convert_value(&Value::Int(-3), &any), SqlValue::Int64(-3));
        assert_eq!(convert_value(&Value::UInt(3), &any), SqlValue::UInt64(3));
        assert_eq!(convert_value(&Value::Double(0.25), &any), SqlValue::Float64(0.25));
    }

    #[test]
    fn test_server_error_text() {
        let err = query_error(mysql_async::Error::Server(mysql_async::ServerError {
            code: 1054,
            message: "Unknown column 'nope' in 'order clause'".to_string(),
            state: "42S22".to_string(),
        }));
        assert_eq!(
            err.to_string(),
            "1054 (42S22): Unknown column 'nope' in 'order clause'"
        );
    }
}
