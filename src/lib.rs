//! # ybeasy
//!
//! Core of a set of command line utilities that generate SQL and run it
//! through the `ybsql` client.
//!
//! - [`filter`] compiles database object filter selections into a SQL
//!   predicate that can be dropped after `WHERE`
//! - [`transpiler`] turns a stored procedure file into an anonymous block
//!   and recovers its return value from the client output
//! - [`engine`] and [`executor`] run statements through the client
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use ybeasy::prelude::*;
//!
//! let roles = FilterRoles::new([ObjectType::Table], [ObjectType::Schema], [ObjectType::Owner])?;
//! let mut filters = FilterArgs::new(roles);
//! filters.set_single(ObjectType::Table, "orders")?;
//!
//! let clause = filters.sql_filter(&ColumnMapping::from([
//!     (ObjectType::Table, "tablename"),
//!     (ObjectType::Schema, "schemaname"),
//! ]));
//! // => "tablename = 'orders'\n    AND TRUE\n    AND schemaname = CURRENT_SCHEMA"
//!
//! let mut conn = Connection::new(&Config::load(None)?, "get_table_name")?;
//! let result = conn.query(&format!("SELECT tablename FROM pg_tables WHERE {}", clause))?;
//! result.on_error_exit();
//! ```

pub mod argfile;
pub mod config;
pub mod engine;
pub mod error;
pub mod executor;
pub mod filter;
pub mod object_path;
pub mod parser;
pub mod procedure;
pub mod result;
pub mod tokenizer;
pub mod transpiler;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::engine::{Connection, DbInfo};
    pub use crate::error::*;
    pub use crate::executor::{Executor, ShellCommand};
    pub use crate::filter::{ColumnMapping, FilterArgs, FilterRoles, MultiKind, ObjectType};
    pub use crate::procedure::{ProcedureSignature, ReturnType};
    pub use crate::result::{CommandResult, ProcReturn};
    pub use crate::transpiler::{ArgValue, ProcArgs, Transpiler};
}

/// Split a delimited list, respecting quote and bracket nesting.
///
/// # Example
///
/// ```
/// let tokens = ybeasy::split("a VARCHAR(10), b NUMERIC(18, 2)", ',').unwrap();
/// assert_eq!(tokens, vec!["a VARCHAR(10)", "b NUMERIC(18, 2)"]);
/// ```
pub fn split(text: &str, delim: char) -> Result<Vec<String>, error::YbError> {
    tokenizer::split(text, delim)
}
