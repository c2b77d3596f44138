//! Configuration for the lab service.
//!
//! # Configuration Sources (in priority order)
//!
//! 1. Legacy host variables `MYSQL_HOST`, `POSTGRES_HOST`, `CLICKHOUSE_HOST`, `ORACLE_HOST`
//! 2. Environment variables (prefix: `SQLI_LAB__`, separator `__`)
//! 3. Config file (`--config <path>`, or `sqli-lab.toml` in the working directory)
//! 4. Built-in defaults
//!
//! # Examples
//!
//! ```bash
//! # Point the PostgreSQL backend at another host
//! SQLI_LAB__POSTGRES__HOST=db.internal cargo run
//! ```

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use config::{Config, ConfigBuilder, Environment, File, builder::DefaultState};
use serde::Deserialize;

use crate::error::Result;

const DEFAULT_CONFIG_FILE: &str = "sqli-lab";

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub server: ServerSettings,
    pub mysql: DatabaseSettings,
    pub postgres: DatabaseSettings,
    pub clickhouse: DatabaseSettings,
    pub oracle: DatabaseSettings,
    pub seed: SeedSettings,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerSettings {
    /// Socket address to listen on.
    pub bind: String,
}

/// Connection parameters for one engine.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
}

/// Bootstrap retry budget.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedSettings {
    /// Total connection attempts per engine.
    pub attempts: usize,
    /// Fixed pause between attempts, in milliseconds.
    pub delay_ms: u64,
    /// Seed every engine before the server starts accepting requests.
    pub on_startup: bool,
}

impl SeedSettings {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

/// Load settings from the optional file and the process environment.
pub fn load_settings(config_path: Option<&Path>) -> Result<Settings> {
    build(config_path, None)
}

/// Load settings reading environment variables from `vars` instead of the
/// process environment.
pub fn load_settings_with_env(
    config_path: Option<&Path>,
    vars: HashMap<String, String>,
) -> Result<Settings> {
    build(config_path, Some(vars))
}

fn build(config_path: Option<&Path>, vars: Option<HashMap<String, String>>) -> Result<Settings> {
    let file = match config_path {
        Some(path) => File::from(path).required(true),
        None => File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    let legacy = |name: &str| match &vars {
        Some(map) => map.get(name).cloned(),
        None => std::env::var(name).ok(),
    };

    let config = with_defaults(Config::builder())?
        .add_source(file)
        .add_source(
            Environment::with_prefix("SQLI_LAB")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(vars.clone()),
        )
        .set_override_option("mysql.host", legacy("MYSQL_HOST"))?
        .set_override_option("postgres.host", legacy("POSTGRES_HOST"))?
        .set_override_option("clickhouse.host", legacy("CLICKHOUSE_HOST"))?
        .set_override_option("oracle.host", legacy("ORACLE_HOST"))?
        .build()?;

    Ok(config.try_deserialize()?)
}

fn with_defaults(
    builder: ConfigBuilder<DefaultState>,
) -> std::result::Result<ConfigBuilder<DefaultState>, config::ConfigError> {
    let mut builder = builder
        .set_default("server.bind", "0.0.0.0:8888")?
        .set_default("seed.attempts", 5)?
        .set_default("seed.delay_ms", 2000)?
        .set_default("seed.on_startup", true)?;

    // ClickHouse creates `sqli_lab` itself during seeding, so its session
    // database has to be one that already exists.
    let databases: [(&str, i64, &str, &str, &str); 4] = [
        ("mysql", 3306, "root", "rootpassword", "sqli_lab"),
        ("postgres", 5432, "root", "rootpassword", "sqli_lab"),
        ("clickhouse", 8123, "default", "", "default"),
        ("oracle", 1521, "system", "oracle", "sqli_lab"),
    ];
    for (section, port, user, password, database) in databases {
        builder = builder
            .set_default(format!("{section}.host"), "localhost")?
            .set_default(format!("{section}.port"), port)?
            .set_default(format!("{section}.user"), user)?
            .set_default(format!("{section}.password"), password)?
            .set_default(format!("{section}.database"), database)?;
    }
    Ok(builder)
}
