//! Backend registry: one descriptor and one driver per engine, built once at
//! start-up and shared read-only by every request.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;

use crate::config::Settings;
use crate::drivers::{ClickHouseDriver, MySqlDriver, TokioPostgresDriver, UnavailableDriver};
use crate::error::{LabError, Result};
use crate::traits::{Connection, DatabaseDriver};

/// The four SQL-capable engines behind the lab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    MySql,
    Postgres,
    ClickHouse,
    Oracle,
}

impl Engine {
    pub const ALL: [Engine; 4] = [
        Engine::MySql,
        Engine::Postgres,
        Engine::ClickHouse,
        Engine::Oracle,
    ];

    /// Path segment used in routes.
    pub fn slug(self) -> &'static str {
        match self {
            Engine::MySql => "mysql",
            Engine::Postgres => "postgres",
            Engine::ClickHouse => "clickhouse",
            Engine::Oracle => "oracle",
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Engine::MySql => "MySQL",
            Engine::Postgres => "PostgreSQL",
            Engine::ClickHouse => "ClickHouse",
            Engine::Oracle => "Oracle",
        })
    }
}

impl FromStr for Engine {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Engine::ALL
            .into_iter()
            .find(|e| e.slug() == s)
            .ok_or_else(|| format!("unknown engine: {s}"))
    }
}

/// How a connection runs a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStyle {
    /// Open a cursor, `execute`, `fetch_all`, close the cursor.
    Cursor,
    /// `execute` on the connection returns rows.
    Direct,
}

/// The engine's native bind-parameter syntax. Queries here are built by
/// textual substitution, so this is recorded for display only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceholderStyle {
    /// `?`
    QuestionMark,
    /// `$1`, `$2`, ...
    Numbered,
    /// `{name:Type}`
    TypedBraces,
    /// `:name`
    Colon,
}

/// One statement of a seed plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedStatement {
    pub sql: &'static str,
    /// Error text that marks a failure of this statement as harmless.
    pub tolerate: Option<&'static str>,
}

impl SeedStatement {
    const fn new(sql: &'static str) -> Self {
        Self {
            sql,
            tolerate: None,
        }
    }

    const fn tolerating(sql: &'static str, marker: &'static str) -> Self {
        Self {
            sql,
            tolerate: Some(marker),
        }
    }
}

/// Ordered statements that create, clear and fill the users table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedPlan {
    pub statements: &'static [SeedStatement],
    /// Whether the engine needs an explicit commit afterwards.
    pub commit: bool,
}

/// Immutable capability record for one engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub engine: Engine,
    pub display_name: &'static str,
    pub executes_via: ExecutionStyle,
    pub placeholder_style: PlaceholderStyle,
    /// Table the route templates address.
    pub users_table: &'static str,
    pub seed: SeedPlan,
}

const MYSQL_SEED: &[SeedStatement] = &[
    SeedStatement::new(
        "CREATE TABLE IF NOT EXISTS users (id INT AUTO_INCREMENT PRIMARY KEY, username VARCHAR(255), password VARCHAR(255))",
    ),
    SeedStatement::new("TRUNCATE TABLE users"),
    SeedStatement::new(
        "INSERT INTO users (username, password) VALUES ('admin', 'admin123'), ('user1', 'pass1')",
    ),
];

const POSTGRES_SEED: &[SeedStatement] = &[
    SeedStatement::new(
        "CREATE TABLE IF NOT EXISTS users (id SERIAL PRIMARY KEY, username VARCHAR(255), password VARCHAR(255))",
    ),
    SeedStatement::new("TRUNCATE TABLE users RESTART IDENTITY"),
    SeedStatement::new(
        "INSERT INTO users (username, password) VALUES ('admin', 'admin123'), ('user1', 'pass1')",
    ),
];

const CLICKHOUSE_SEED: &[SeedStatement] = &[
    SeedStatement::new("CREATE DATABASE IF NOT EXISTS sqli_lab"),
    SeedStatement::new(
        "CREATE TABLE IF NOT EXISTS sqli_lab.users (id UInt32, username String, password String) ENGINE = MergeTree() ORDER BY id",
    ),
    SeedStatement::new("TRUNCATE TABLE sqli_lab.users"),
    SeedStatement::new(
        "INSERT INTO sqli_lab.users (id, username, password) VALUES (1, 'admin', 'admin123'), (2, 'user1', 'pass1')",
    ),
];

const ORACLE_SEED: &[SeedStatement] = &[
    // ORA-00955: name is already used by an existing object
    SeedStatement::tolerating(
        "CREATE TABLE users (id NUMBER GENERATED BY DEFAULT AS IDENTITY, username VARCHAR2(255), password VARCHAR2(255))",
        "ORA-00955",
    ),
    SeedStatement::new("DELETE FROM users"),
    SeedStatement::new("INSERT INTO users (username, password) VALUES ('admin', 'admin123')"),
    SeedStatement::new("INSERT INTO users (username, password) VALUES ('user1', 'pass1')"),
];

impl BackendDescriptor {
    /// The fixed descriptor for `engine`.
    pub fn for_engine(engine: Engine) -> Self {
        match engine {
            Engine::MySql => Self {
                engine,
                display_name: "MySQL",
                executes_via: ExecutionStyle::Cursor,
                placeholder_style: PlaceholderStyle::QuestionMark,
                users_table: "users",
                seed: SeedPlan {
                    statements: MYSQL_SEED,
                    commit: true,
                },
            },
            Engine::Postgres => Self {
                engine,
                display_name: "PostgreSQL",
                executes_via: ExecutionStyle::Cursor,
                placeholder_style: PlaceholderStyle::Numbered,
                users_table: "users",
                seed: SeedPlan {
                    statements: POSTGRES_SEED,
                    commit: false,
                },
            },
            Engine::ClickHouse => Self {
                engine,
                display_name: "ClickHouse",
                executes_via: ExecutionStyle::Direct,
                placeholder_style: PlaceholderStyle::TypedBraces,
                users_table: "sqli_lab.users",
                seed: SeedPlan {
                    statements: CLICKHOUSE_SEED,
                    commit: false,
                },
            },
            Engine::Oracle => Self {
                engine,
                display_name: "Oracle",
                executes_via: ExecutionStyle::Cursor,
                placeholder_style: PlaceholderStyle::Colon,
                users_table: "users",
                seed: SeedPlan {
                    statements: ORACLE_SEED,
                    commit: true,
                },
            },
        }
    }
}

struct Backend {
    descriptor: BackendDescriptor,
    driver: Arc<dyn DatabaseDriver>,
}

/// Holds a descriptor and a driver for every engine.
/// Engines without a configured driver are registered as unavailable.
pub struct BackendRegistry {
    backends: HashMap<Engine, Backend>,
}

impl BackendRegistry {
    /// Build the production registry. Oracle has no backend in this
    /// deployment and is always registered as unavailable.
    pub fn from_settings(settings: &Settings) -> Self {
        Self::builder()
            .driver(Arc::new(MySqlDriver::new(&settings.mysql)))
            .driver(Arc::new(TokioPostgresDriver::new(&settings.postgres)))
            .driver(Arc::new(ClickHouseDriver::new(&settings.clickhouse)))
            .driver(Arc::new(UnavailableDriver::new(
                Engine::Oracle,
                "Oracle is not available in this deployment",
            )))
            .build()
    }

    pub fn builder() -> BackendRegistryBuilder {
        BackendRegistryBuilder::default()
    }

    /// Descriptor for `engine`.
    pub fn descriptor(&self, engine: Engine) -> BackendDescriptor {
        self.backends
            .get(&engine)
            .map(|b| b.descriptor.clone())
            .unwrap_or_else(|| BackendDescriptor::for_engine(engine))
    }

    /// Whether `engine` has a driver that can ever connect.
    pub fn is_available(&self, engine: Engine) -> bool {
        self.backends
            .get(&engine)
            .is_some_and(|b| b.driver.is_available())
    }

    /// Open a fresh connection to `engine`.
    pub async fn connect(&self, engine: Engine) -> Result<Box<dyn Connection>> {
        let backend = self
            .backends
            .get(&engine)
            .ok_or_else(|| LabError::ConnectionFailed {
                engine,
                reason: "engine not registered".to_string(),
            })?;
        backend.driver.connect().await
    }
}

/// Builder for `BackendRegistry`.
#[derive(Default)]
pub struct BackendRegistryBuilder {
    drivers: HashMap<Engine, Arc<dyn DatabaseDriver>>,
}

impl BackendRegistryBuilder {
    /// Register a driver for the engine it reports. A later driver for the
    /// same engine replaces the earlier one.
    pub fn driver(mut self, driver: Arc<dyn DatabaseDriver>) -> Self {
        self.drivers.insert(driver.engine(), driver);
        self
    }

    pub fn build(mut self) -> BackendRegistry {
        let backends = Engine::ALL
            .into_iter()
            .map(|engine| {
                let driver = self.drivers.remove(&engine).unwrap_or_else(|| {
                    Arc::new(UnavailableDriver::new(engine, "no driver configured"))
                });
                let backend = Backend {
                    descriptor: BackendDescriptor::for_engine(engine),
                    driver,
                };
                (engine, backend)
            })
            .collect();
        BackendRegistry { backends }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::InMemoryTestDriver;

    #[test]
    fn test_engine_slug_round_trip_and_display() {
        for engine in Engine::ALL {
            assert_eq!(engine.slug().parse::<Engine>().unwrap(), engine);
        }
        assert!("sqlite".parse::<Engine>().is_err());
        assert_eq!(Engine::Postgres.to_string(), "PostgreSQL");
    }

    #[test]
    fn test_capability_table() {
        let styles: Vec<_> = Engine::ALL
            .into_iter()
            .map(|e| BackendDescriptor::for_engine(e).executes_via)
            .collect();
        assert_eq!(
            styles,
            vec![
                ExecutionStyle::Cursor,
                ExecutionStyle::Cursor,
                ExecutionStyle::Direct,
                ExecutionStyle::Cursor,
            ]
        );
        assert_eq!(
            BackendDescriptor::for_engine(Engine::ClickHouse).users_table,
            "sqli_lab.users"
        );
    }

    #[test]
    fn test_oracle_create_tolerates_existing_table() {
        let plan = BackendDescriptor::for_engine(Engine::Oracle).seed;
        assert_eq!(plan.statements[0].tolerate, Some("ORA-00955"));
        assert!(plan.commit);
    }

    #[tokio::test]
    async fn test_unconfigured_engines_are_unavailable() {
        let registry = BackendRegistry::builder()
            .driver(Arc::new(InMemoryTestDriver::new(Engine::MySql)))
            .build();

        assert!(registry.connect(Engine::MySql).await.is_ok());
        assert!(registry.is_available(Engine::MySql));
        for engine in [Engine::Postgres, Engine::ClickHouse, Engine::Oracle] {
            assert!(!registry.is_available(engine));
            match registry.connect(engine).await {
                Err(LabError::ConnectionFailed { engine: e, .. }) => assert_eq!(e, engine),
                _ => panic!("Expected ConnectionFailed for {engine}"),
            }
        }
    }
}
