mod param_value;
mod row;
mod sql_value;

pub use param_value::ParamValue;
pub use row::RawQueryResult;
pub use sql_value::SqlValue;
