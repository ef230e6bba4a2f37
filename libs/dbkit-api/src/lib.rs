extern crate self as dbkit_api;

pub mod builder;
pub mod coerce;
pub mod column;
pub mod error;
pub mod executor;
pub mod field;
pub mod keyed;
pub mod materialize;
pub mod record;
pub mod result;
pub mod temporal;
pub mod value;

pub use builder::{Dialect, StatementBuilder, build_insert_sql, build_update_sql, in_keys, in_values};
pub use column::{Column, Cursor, MemoryCursor, ScanBuffer};
pub use dbkit_api_derive::Record;
pub use error::DbError;
pub use executor::{ExecOutcome, QueryExecutor, StatementExecutor};
pub use field::FieldValue;
pub use keyed::KeyedData;
pub use record::{FieldInfo, Record};
pub use materialize::{Destination, KvMap, RowShape, RowTarget, Shape, Tuple, materialize, materialize_kv};
pub use result::{ExecResult, QueryResult};
pub use value::{Kind, Value};
