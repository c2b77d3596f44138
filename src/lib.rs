//! sqli-lab - deliberately injectable SQL endpoints for SQL-injection training
//!
//! Each of MySQL, PostgreSQL, ClickHouse and Oracle exposes four routes that
//! splice a request parameter straight into a SQL template. Nothing is
//! escaped: the injection is the point.
//!
//! # Example
//! ```no_run
//! use std::sync::Arc;
//! use sqli_lab::{BackendRegistry, Engine, Params, ParamValue, Querier, QueryTemplate};
//!
//! # async fn run(settings: sqli_lab::config::Settings) {
//! let registry = Arc::new(BackendRegistry::from_settings(&settings));
//! let querier = Querier::new(registry);
//!
//! let mut params = Params::new();
//! params.insert("uid".to_string(), ParamValue::from("1 OR 1=1"));
//!
//! let outcome = querier
//!     .dispatch(
//!         Engine::MySql,
//!         &QueryTemplate::new("SELECT * FROM users WHERE id = {uid}"),
//!         &params,
//!     )
//!     .await;
//! assert_eq!(outcome.rendered_query, "SELECT * FROM users WHERE id = 1 OR 1=1");
//! # }
//! ```

pub mod config;
pub mod drivers;
pub mod error;
pub mod extract;
pub mod logging;
pub mod querier;
pub mod registry;
pub mod seed;
pub mod server;
pub mod template;
pub mod traits;
pub mod types;

// Re-export main types for convenient access
pub use error::{LabError, Result};
pub use querier::{QueryOutcome, Querier};
pub use registry::{BackendDescriptor, BackendRegistry, Engine, ExecutionStyle};
pub use seed::{SeedReport, Seeder};
pub use template::{Params, QueryTemplate};
pub use traits::{Connection, Cursor, DatabaseDriver};
pub use types::{ParamValue, RawQueryResult, SqlValue};
