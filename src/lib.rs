//! SQL fragment building and a small CRUD facade over SQLite.
//!
//! # Intention
//!
//! - Compose `WHERE` clauses, column declarations and `CREATE TABLE`
//!   statements without hand-writing SQL strings.
//! - Run inserts, selects, updates and deletes against one owned connection,
//!   with every value travelling as a bound parameter.
//!
//! # Architectural Boundaries
//!
//! - Only SQLite/database code belongs here.
//! - No query planning, pooling, or migrations.

pub mod condition;
pub mod config;
pub mod database;
pub mod dump;
pub mod error;
pub mod ident;
pub mod query;
pub mod schema;
pub mod value;

pub use condition::{Condition, Fragment, Logic, Operator, Where};
pub use config::SqliteConfig;
pub use database::{Assignment, Database, Direction, OrderBy, SelectOptions, Selection};
pub use error::{Error, Result};
pub use query::{Params, SqlQuery};
pub use schema::{
    create_table_statement, ColumnConstraint, ColumnDefinition, DataType, DefaultValue, Schema,
    TableDefinition,
};
pub use value::{format_value, Row, Value};
