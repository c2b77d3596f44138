use std::sync::Arc;

use serde_json::{json, Value};

use crate::error::{LabError, Result};
use crate::registry::{BackendRegistry, Engine, ExecutionStyle};
use crate::template::{Params, QueryTemplate};
use crate::traits::Connection;
use crate::types::RawQueryResult;

/// Result of one dispatch, ready to be turned into an HTTP response.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOutcome {
    pub success: bool,
    /// Exactly the text sent to the engine.
    pub rendered_query: String,
    pub rows: Option<RawQueryResult>,
    pub error_message: Option<String>,
    pub status_code: u16,
}

impl QueryOutcome {
    fn succeeded(rendered_query: String, rows: RawQueryResult) -> Self {
        Self {
            success: true,
            rendered_query,
            rows: Some(rows),
            error_message: None,
            status_code: 200,
        }
    }

    fn failed(rendered_query: String, error: &LabError) -> Self {
        Self {
            success: false,
            rendered_query,
            rows: None,
            error_message: Some(error.to_string()),
            status_code: error.status_code(),
        }
    }

    /// JSON body: `{"query", "result"}` on success, `{"query", "error"}` otherwise.
    pub fn body(&self) -> Value {
        match (&self.rows, &self.error_message) {
            (Some(rows), _) if self.success => json!({
                "query": self.rendered_query,
                "result": rows.rows,
            }),
            (_, error) => json!({
                "query": self.rendered_query,
                "error": error.as_deref().unwrap_or_default(),
            }),
        }
    }
}

/// Renders route templates and runs them against the registry's engines.
///
/// Every dispatch opens its own connection and releases it before
/// returning; nothing is shared between requests except the registry.
#[derive(Clone)]
pub struct Querier {
    registry: Arc<BackendRegistry>,
}

impl Querier {
    pub fn new(registry: Arc<BackendRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<BackendRegistry> {
        &self.registry
    }

    /// Render `template` with `params` and run it on `engine`.
    ///
    /// Never fails: every error, including an unreachable engine, is folded
    /// into the returned outcome.
    pub async fn dispatch(
        &self,
        engine: Engine,
        template: &QueryTemplate,
        params: &Params,
    ) -> QueryOutcome {
        let rendered = match template.render(params) {
            Ok(sql) => sql,
            Err(e) => {
                tracing::warn!(
                    engine = %engine,
                    template = template.as_str(),
                    error = %e,
                    "cannot render query"
                );
                return QueryOutcome::failed(template.as_str().to_string(), &e);
            }
        };

        tracing::info!(engine = %engine, query = %rendered, "dispatching query");

        match self.run_scoped(engine, &rendered).await {
            Ok(rows) => {
                tracing::debug!(engine = %engine, rows = rows.len(), "query succeeded");
                QueryOutcome::succeeded(rendered, rows)
            }
            Err(e) => {
                tracing::info!(engine = %engine, error = %e, "query failed");
                QueryOutcome::failed(rendered, &e)
            }
        }
    }

    /// Connect, run `sql` through the engine's execution style, then release
    /// the connection whatever happened.
    async fn run_scoped(&self, engine: Engine, sql: &str) -> Result<RawQueryResult> {
        let style = self.registry.descriptor(engine).executes_via;
        let mut connection = self.registry.connect(engine).await?;

        let result = match style {
            ExecutionStyle::Cursor => run_with_cursor(connection.as_mut(), sql).await,
            ExecutionStyle::Direct => connection.execute(sql).await,
        };

        if let Err(e) = connection.close().await {
            tracing::warn!(engine = %engine, error = %e, "failed to close connection");
        }
        result
    }
}

/// Cursor path: open, execute, fetch, and close the cursor before the
/// connection is touched again.
async fn run_with_cursor(connection: &mut dyn Connection, sql: &str) -> Result<RawQueryResult> {
    let engine = connection.engine();
    let mut cursor = connection.cursor()?;

    let result = match cursor.execute(sql).await {
        Ok(()) => cursor.fetch_all().await,
        Err(e) => Err(e),
    };

    if let Err(e) = cursor.close().await {
        tracing::warn!(engine = %engine, error = %e, "failed to close cursor");
    }
    result
}
