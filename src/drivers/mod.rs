mod clickhouse;
mod mysql;
mod tokio_postgres;
mod unavailable;

pub use self::clickhouse::ClickHouseDriver;
pub use self::in_memory_test::{InMemoryTestDriver, LifecycleEvent, RecordedQuery};
pub use self::mysql::MySqlDriver;
pub use self::tokio_postgres::TokioPostgresDriver;
pub use self::unavailable::UnavailableDriver;
