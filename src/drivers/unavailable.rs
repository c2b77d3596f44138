use async_trait::async_trait;

use crate::error::{LabError, Result};
use crate::registry::Engine;
use crate::traits::{Connection, DatabaseDriver};

/// Driver for an engine with no working backend in this deployment.
/// Every connect fails the same way.
pub struct UnavailableDriver {
    engine: Engine,
    reason: String,
}

impl UnavailableDriver {
    pub fn new(engine: Engine, reason: impl Into<String>) -> Self {
        Self {
            engine,
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl DatabaseDriver for UnavailableDriver {
    fn engine(&self) -> Engine {
        self.engine
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn connect(&self) -> Result<Box<dyn Connection>> {
        tracing::debug!(engine = %self.engine, reason = %self.reason, "engine unavailable");
        Err(LabError::ConnectionFailed {
            engine: self.engine,
            reason: self.reason.clone(),
        })
    }
}
