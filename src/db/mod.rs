pub mod connection;
pub mod dialect;
pub mod query;

pub use connection::*;
pub use dialect::Dialect;
pub use query::*;
