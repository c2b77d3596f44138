use async_trait::async_trait;
use serde::Deserialize;

use crate::config::DatabaseSettings;
use crate::error::{LabError, Result};
use crate::registry::Engine;
use crate::traits::{Connection, DatabaseDriver};
use crate::types::{RawQueryResult, SqlValue};

/// ClickHouse driver speaking the HTTP interface through reqwest.
///
/// The rendered query is sent as the request body untouched; the output
/// format is chosen through `default_format` so trailing comments in the
/// query cannot swallow a `FORMAT` clause.
pub struct ClickHouseDriver {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    database: String,
}

impl ClickHouseDriver {
    pub fn new(settings: &DatabaseSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: format!("http://{}:{}", settings.host, settings.port),
            user: settings.user.clone(),
            password: settings.password.clone(),
            database: settings.database.clone(),
        }
    }
}

#[async_trait]
impl DatabaseDriver for ClickHouseDriver {
    fn engine(&self) -> Engine {
        Engine::ClickHouse
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        let unreachable = |reason: String| LabError::ConnectionFailed {
            engine: Engine::ClickHouse,
            reason,
        };

        let response = self
            .http
            .get(format!("{}/ping", self.base_url))
            .send()
            .await
            .map_err(|e| unreachable(e.to_string()))?;
        if !response.status().is_success() {
            return Err(unreachable(format!("ping returned {}", response.status())));
        }

        Ok(Box::new(ClickHouseConnection::new(self)))
    }
}

struct ClickHouseConnection {
    http: reqwest::Client,
    base_url: String,
    user: String,
    password: String,
    database: String,
}

impl ClickHouseConnection {
    fn new(driver: &ClickHouseDriver) -> Self {
        Self {
            http: driver.http.clone(),
            base_url: driver.base_url.clone(),
            user: driver.user.clone(),
            password: driver.password.clone(),
            database: driver.database.clone(),
        }
    }

    /// `database` is only the session default and must already exist.
    /// Templates name `sqli_lab.users` in full.
    fn request(&self, sql: &str) -> reqwest::RequestBuilder {
        self.http
            .post(&self.base_url)
            .query(&[
                ("database", self.database.as_str()),
                ("default_format", "JSONCompact"),
                ("output_format_json_quote_64bit_integers", "0"),
            ])
            .header("X-ClickHouse-User", &self.user)
            .header("X-ClickHouse-Key", &self.password)
            .body(sql.to_string())
    }
}

#[async_trait]
impl Connection for ClickHouseConnection {
    fn engine(&self) -> Engine {
        Engine::ClickHouse
    }

    async fn execute(&mut self, sql: &str) -> Result<RawQueryResult> {
        let response = self
            .request(sql)
            .send()
            .await
            .map_err(|e| LabError::QueryFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| LabError::QueryFailed(e.to_string()))?;

        if !status.is_success() {
            return Err(LabError::QueryFailed(body.trim().to_string()));
        }
        parse_json_compact(&body)
    }

    async fn close(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[derive(Deserialize)]
struct JsonCompact {
    meta: Vec<ColumnMeta>,
    data: Vec<Vec<serde_json::Value>>,
}

#[derive(Deserialize)]
struct ColumnMeta {
    name: String,
}

/// Parse a `JSONCompact` response. Statements without a result set return
/// an empty body.
fn parse_json_compact(body: &str) -> Result<RawQueryResult> {
    if body.trim().is_empty() {
        return Ok(RawQueryResult::empty());
    }
    let parsed: JsonCompact = serde_json::from_str(body)
        .map_err(|e| LabError::QueryFailed(format!("unreadable ClickHouse response: {e}")))?;

    let columns = parsed.meta.into_iter().map(|m| m.name).collect();
    let rows = parsed
        .data
        .into_iter()
        .map(|row| row.into_iter().map(SqlValue::from_json).collect())
        .collect();
    Ok(RawQueryResult::new(columns, rows))
}
