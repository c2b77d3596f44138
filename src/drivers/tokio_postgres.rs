use async_trait::async_trait;
use tokio::task::JoinHandle;
use tokio_postgres::{Client, NoTls, SimpleQueryMessage};

use crate::config::DatabaseSettings;
use crate::error::{LabError, Result};
use crate::registry::Engine;
use crate::traits::{Connection, Cursor, DatabaseDriver};
use crate::types::{RawQueryResult, SqlValue};

/// PostgreSQL driver implementation using tokio-postgres.
///
/// Queries go over the simple-query protocol so stacked statements reach the
/// server exactly as rendered. Values come back as text.
pub struct TokioPostgresDriver {
    config: tokio_postgres::Config,
}

impl TokioPostgresDriver {
    pub fn new(settings: &DatabaseSettings) -> Self {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&settings.host)
            .port(settings.port)
            .user(&settings.user)
            .password(&settings.password)
            .dbname(&settings.database);
        Self { config }
    }
}

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let (client, connection) =
            self.config
                .connect(NoTls)
                .await
                .map_err(|e| LabError::ConnectionFailed {
                    engine: Engine::Postgres,
                    reason: e.to_string(),
                })?;

        // Spawn the connection handler; it finishes once the client is dropped.
        let handle = tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "PostgreSQL connection error");
            }
        });

        Ok(Box::new(PostgresConnection { client, handle }))
    }
}

struct PostgresConnection {
    client: Client,
    handle: JoinHandle<()>,
}

#[async_trait]
impl Connection for PostgresConnection {
    fn engine(&self) -> Engine {
        Engine::Postgres
    }

    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>> {
        Ok(Box::new(PostgresCursor {
            client: &self.client,
            pending: None,
        }))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        let PostgresConnection { client, handle } = *self;
        drop(client);
        handle
            .await
            .map_err(|e| LabError::QueryFailed(format!("connection task failed: {e}")))
    }
}

struct PostgresCursor<'a> {
    client: &'a Client,
    pending: Option<RawQueryResult>,
}

#[async_trait]
impl<'a> Cursor for PostgresCursor<'a> {
    async fn execute(&mut self, sql: &str) -> Result<()> {
        let messages = self
            .client
            .simple_query(sql)
            .await
            .map_err(query_error)?;
        self.pending = Some(last_result_set(steps(messages)));
        Ok(())
    }

    async fn fetch_all(&mut self) -> Result<RawQueryResult> {
        Ok(self.pending.take().unwrap_or_default())
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

/// One step of a simple-query response, reduced to what the result needs.
#[derive(Debug)]
enum Step {
    /// A statement that returns rows starts; carries its column names.
    Describe(Vec<String>),
    Row(Vec<Option<String>>),
    Complete,
}

fn steps(messages: Vec<SimpleQueryMessage>) -> impl Iterator<Item = Step> {
    messages.into_iter().filter_map(|message| match message {
        SimpleQueryMessage::RowDescription(columns) => Some(Step::Describe(
            columns.iter().map(|c| c.name().to_string()).collect(),
        )),
        SimpleQueryMessage::Row(row) => {
            Some(Step::Row((0..row.len()).map(|i| row.get(i).map(str::to_string)).collect()))
        }
        SimpleQueryMessage::CommandComplete(_) => Some(Step::Complete),
        _ => None,
    })
}

/// The result set of the last statement that returns rows, even when that
/// set is empty. Statements without rows (INSERT, SET, ...) leave it alone.
fn last_result_set(steps: impl IntoIterator<Item = Step>) -> RawQueryResult {
    let mut last = RawQueryResult::empty();
    let mut current: Option<RawQueryResult> = None;

    for step in steps {
        match step {
            Step::Describe(columns) => current = Some(RawQueryResult::new(columns, Vec::new())),
            Step::Row(values) => {
                let values = values
                    .into_iter()
                    .map(|v| v.map(SqlValue::from).unwrap_or(SqlValue::Null))
                    .collect();
                current
                    .get_or_insert_with(RawQueryResult::empty)
                    .rows
                    .push(values);
            }
            Step::Complete => {
                if let Some(result) = current.take() {
                    last = result;
                }
            }
        }
    }

    if let Some(result) = current {
        last = result;
    }
    last
}

/// Surface the server's own error text where there is one.
fn query_error(e: tokio_postgres::Error) -> LabError {
    match e.as_db_error() {
        Some(db) => LabError::QueryFailed(db.to_string()),
        None => LabError::QueryFailed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn users() -> Step {
        Step::Describe(vec!["id".into(), "username".into(), "password".into()])
    }

    fn row(values: &[&str]) -> Step {
        Step::Row(values.iter().map(|v| Some(v.to_string())).collect())
    }

    #[test]
    fn test_single_select() {
        let result = last_result_set(vec![
            users(),
            row(&["1", "admin", "admin123"]),
            row(&["2", "user1", "pass1"]),
            Step::Complete,
        ]);
        assert_eq!(result.columns, vec!["id", "username", "password"]);
        assert_eq!(result.len(), 2);
        assert_eq!(result.get(0, "id"), Some(&SqlValue::from("1")));
    }

    #[test]
    fn test_empty_trailing_select_wins() {
        // SELECT * FROM users ORDER BY 1; SELECT * FROM users WHERE 1=0
        let result = last_result_set(vec![
            users(),
            row(&["1", "admin", "admin123"]),
            row(&["2", "user1", "pass1"]),
            Step::Complete,
            users(),
            Step::Complete,
        ]);
        assert!(result.is_empty());
        assert_eq!(result.columns, vec!["id", "username", "password"]);
    }

    #[test]
    fn test_statements_without_rows_keep_previous_result() {
        // SELECT * FROM users WHERE id = 1; UPDATE users SET password = 'x'
        let result = last_result_set(vec![
            users(),
            row(&["1", "admin", "admin123"]),
            Step::Complete,
            Step::Complete,
        ]);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_nulls_and_no_statements() {
        let result = last_result_set(vec![
            users(),
            Step::Row(vec![Some("3".into()), None, None]),
            Step::Complete,
        ]);
        assert_eq!(result.get(0, "username"), Some(&SqlValue::Null));

        assert!(last_result_set(Vec::new()).is_empty());
    }
}
