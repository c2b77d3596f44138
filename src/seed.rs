//! Bootstrap: bring every engine's `users` table to the two-row lab state.
//!
//! Each engine is seeded independently with a fixed-delay retry budget. An
//! engine that never comes up is logged and skipped; the others still seed.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};
use serde::Serialize;

use crate::config::SeedSettings;
use crate::error::{LabError, Result};
use crate::registry::{BackendRegistry, Engine, ExecutionStyle, SeedPlan, SeedStatement};
use crate::traits::Connection;

/// Per-engine "initialized" flags.
#[derive(Debug, Default)]
struct SeedState {
    flags: [AtomicBool; 4],
}

impl SeedState {
    fn is_seeded(&self, engine: Engine) -> bool {
        self.flags[slot(engine)].load(Ordering::Acquire)
    }

    fn set(&self, engine: Engine, seeded: bool) {
        self.flags[slot(engine)].store(seeded, Ordering::Release);
    }
}

fn slot(engine: Engine) -> usize {
    match engine {
        Engine::MySql => 0,
        Engine::Postgres => 1,
        Engine::ClickHouse => 2,
        Engine::Oracle => 3,
    }
}

/// What happened to one engine during a seeding run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EngineSeedOutcome {
    pub engine: Engine,
    pub seeded: bool,
    pub attempts: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeedReport {
    pub engines: Vec<EngineSeedOutcome>,
}

impl SeedReport {
    pub fn all_seeded(&self) -> bool {
        self.engines.iter().all(|o| o.seeded)
    }

    pub fn outcome(&self, engine: Engine) -> Option<&EngineSeedOutcome> {
        self.engines.iter().find(|o| o.engine == engine)
    }
}

pub struct Seeder {
    registry: Arc<BackendRegistry>,
    attempts: usize,
    delay: Duration,
    state: SeedState,
}

impl Seeder {
    pub fn new(registry: Arc<BackendRegistry>, settings: &SeedSettings) -> Self {
        Self {
            registry,
            attempts: settings.attempts.max(1),
            delay: settings.delay(),
            state: SeedState::default(),
        }
    }

    pub fn is_seeded(&self, engine: Engine) -> bool {
        self.state.is_seeded(engine)
    }

    /// Seed every engine in turn. Never fails; per-engine results are in the
    /// report and in the logs.
    pub async fn initialize_all(&self) -> SeedReport {
        let mut engines = Vec::with_capacity(Engine::ALL.len());
        for engine in Engine::ALL {
            engines.push(self.initialize(engine).await);
        }

        let seeded = engines.iter().filter(|o| o.seeded).count();
        tracing::info!(seeded, total = engines.len(), "database initialization finished");
        SeedReport { engines }
    }

    /// Seed one engine, retrying with a fixed delay until the budget runs out.
    /// Engines registered as unavailable get a single attempt.
    pub async fn initialize(&self, engine: Engine) -> EngineSeedOutcome {
        let retries_allowed = if self.registry.is_available(engine) {
            self.attempts - 1
        } else {
            0
        };
        let backoff = ConstantBuilder::default()
            .with_delay(self.delay)
            .with_max_times(retries_allowed);
        let mut retries = 0;

        let result = (move || async move { self.seed_once(engine).await })
            .retry(backoff)
            .notify(|err: &LabError, dur: Duration| {
                retries += 1;
                tracing::warn!(
                    engine = %engine,
                    attempt = retries,
                    error = %err,
                    reason = ?err_reason(err),
                    delay = ?dur,
                    "seeding failed, retrying"
                );
            })
            .await;
        let attempts = retries + 1;

        match result {
            Ok(()) => {
                self.state.set(engine, true);
                tracing::info!(engine = %engine, attempts, "database initialized");
                EngineSeedOutcome {
                    engine,
                    seeded: true,
                    attempts,
                    error: None,
                }
            }
            Err(e) => {
                self.state.set(engine, false);
                tracing::error!(
                    engine = %engine,
                    attempts,
                    error = %e,
                    reason = ?err_reason(&e),
                    "could not initialize database"
                );
                EngineSeedOutcome {
                    engine,
                    seeded: false,
                    attempts,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn seed_once(&self, engine: Engine) -> Result<()> {
        let descriptor = self.registry.descriptor(engine);
        let mut connection = self.registry.connect(engine).await?;

        let result =
            apply_plan(connection.as_mut(), descriptor.executes_via, &descriptor.seed).await;

        if let Err(e) = connection.close().await {
            tracing::warn!(
                engine = %engine,
                error = %e,
                "failed to close connection after seeding"
            );
        }
        result
    }
}

/// Run every statement of `plan`, then commit if the engine needs it.
async fn apply_plan(
    connection: &mut dyn Connection,
    style: ExecutionStyle,
    plan: &SeedPlan,
) -> Result<()> {
    match style {
        ExecutionStyle::Cursor => {
            let engine = connection.engine();
            let mut cursor = connection.cursor()?;
            let mut result = Ok(());
            for statement in plan.statements {
                if let Err(e) = cursor.execute(statement.sql).await {
                    if !tolerated(statement, &e) {
                        result = Err(e);
                        break;
                    }
                }
            }
            if let Err(e) = cursor.close().await {
                tracing::warn!(engine = %engine, error = %e, "failed to close cursor");
            }
            result?;
        }
        ExecutionStyle::Direct => {
            for statement in plan.statements {
                if let Err(e) = connection.execute(statement.sql).await {
                    if !tolerated(statement, &e) {
                        return Err(e);
                    }
                }
            }
        }
    }

    if plan.commit {
        connection.commit().await?;
    }
    Ok(())
}

fn tolerated(statement: &SeedStatement, error: &LabError) -> bool {
    match statement.tolerate {
        Some(marker) if error.to_string().contains(marker) => {
            tracing::debug!(statement = statement.sql, error = %error, "ignoring expected error");
            true
        }
        _ => false,
    }
}

/// Underlying driver reason for connection failures, which the display text omits.
fn err_reason(error: &LabError) -> Option<&str> {
    match error {
        LabError::ConnectionFailed { reason, .. } => Some(reason.as_str()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::InMemoryTestDriver;

    fn settings(attempts: usize) -> SeedSettings {
        SeedSettings {
            attempts,
            delay_ms: 0,
            on_startup: false,
        }
    }

    #[test]
    fn test_report_helpers() {
        let report = SeedReport {
            engines: vec![
                EngineSeedOutcome {
                    engine: Engine::MySql,
                    seeded: true,
                    attempts: 1,
                    error: None,
                },
                EngineSeedOutcome {
                    engine: Engine::Oracle,
                    seeded: false,
                    attempts: 5,
                    error: Some("cannot connect to Oracle".to_string()),
                },
            ],
        };
        assert!(!report.all_seeded());
        assert_eq!(report.outcome(Engine::Oracle).map(|o| o.attempts), Some(5));
        assert!(report.outcome(Engine::Postgres).is_none());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let driver = Arc::new(InMemoryTestDriver::new(Engine::MySql));
        let registry = Arc::new(BackendRegistry::builder().driver(driver.clone()).build());
        let seeder = Seeder::new(registry, &settings(0));

        let outcome = seeder.initialize(Engine::MySql).await;
        assert!(outcome.seeded);
        assert_eq!(outcome.attempts, 1);
        assert_eq!(driver.rows().len(), 2);
    }

    #[tokio::test]
    async fn test_untolerated_error_fails_the_attempt() {
        let driver = Arc::new(
            InMemoryTestDriver::new(Engine::MySql)
                .with_failing_query("TRUNCATE", "Lock wait timeout exceeded"),
        );
        let registry = Arc::new(BackendRegistry::builder().driver(driver.clone()).build());
        let seeder = Seeder::new(registry, &settings(2));

        let outcome = seeder.initialize(Engine::MySql).await;
        assert!(!outcome.seeded);
        assert_eq!(outcome.attempts, 2);
        assert_eq!(outcome.error.as_deref(), Some("Lock wait timeout exceeded"));
        assert!(!seeder.is_seeded(Engine::MySql));
    }
}
