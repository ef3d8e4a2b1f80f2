mod concurrent;
mod executor;
mod procedure;
mod reader;
mod script;
mod types;

pub use concurrent::*;
pub use executor::*;
pub use procedure::*;
pub use reader::read_script;
pub use script::ScriptParser;
pub use types::*;

#[cfg(test)]
mod query_tests;
