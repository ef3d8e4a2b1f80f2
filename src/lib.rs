//! sqlrun: splits SQL scripts into statements for Oracle, PostgreSQL, MySQL
//! and SQL Server, parses many files concurrently, and runs them through a
//! database session.

pub mod app;
pub mod db;
pub mod error;
pub mod utils;

pub use db::{AggregateResult, ConcurrentParser, Dialect, ParseResult, ScriptParser, Statement};
pub use error::{Result, ScriptError};
