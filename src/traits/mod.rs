mod driver;

pub use driver::{Connection, Cursor, DatabaseDriver};
