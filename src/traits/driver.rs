use async_trait::async_trait;

use crate::error::{LabError, Result};
use crate::registry::Engine;
use crate::types::RawQueryResult;

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Opening connections, turning every failure into `LabError::ConnectionFailed`
/// - Converting native result values to `SqlValue`
///
/// A driver never pools: each call to `connect` yields a connection owned by
/// exactly one caller.
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Engine this driver talks to.
    fn engine(&self) -> Engine;

    /// False for drivers that can never connect; retrying them is pointless.
    fn is_available(&self) -> bool {
        true
    }

    /// Open a new connection.
    async fn connect(&self) -> Result<Box<dyn Connection>>;
}

/// A live connection returned by a `DatabaseDriver`.
///
/// Engines execute either directly on the connection or through a cursor;
/// a driver implements the path matching its `ExecutionStyle` and leaves the
/// other at its default, which reports `LabError::Unsupported`.
#[async_trait]
pub trait Connection: Send {
    fn engine(&self) -> Engine;

    /// Run `sql` and return its rows (direct-style engines).
    async fn execute(&mut self, _sql: &str) -> Result<RawQueryResult> {
        Err(LabError::Unsupported {
            engine: self.engine(),
            operation: "direct execution",
        })
    }

    /// Open a cursor borrowing this connection (cursor-style engines).
    fn cursor(&mut self) -> Result<Box<dyn Cursor + '_>> {
        Err(LabError::Unsupported {
            engine: self.engine(),
            operation: "cursors",
        })
    }

    /// Commit pending work. Engines without explicit transactions keep the default.
    async fn commit(&mut self) -> Result<()> {
        Ok(())
    }

    /// Release the connection.
    async fn close(self: Box<Self>) -> Result<()>;
}

/// Cursor over a borrowed connection: `execute`, then `fetch_all`, then `close`.
#[async_trait]
pub trait Cursor: Send {
    async fn execute(&mut self, sql: &str) -> Result<()>;

    /// Return every row produced by the last `execute`.
    async fn fetch_all(&mut self) -> Result<RawQueryResult>;

    async fn close(self: Box<Self>) -> Result<()>;
}
