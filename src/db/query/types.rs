use serde::Serialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::ScriptError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    /// 1-based position in the source script.
    pub index: usize,
    pub text: String,
}

/// Statements of one script, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ParseResult {
    statements: Vec<Statement>,
}

impl ParseResult {
    pub fn new() -> Self {
        Self {
            statements: Vec::new(),
        }
    }

    /// Append a statement with the next sequence index and return that index.
    pub(crate) fn push(&mut self, text: String) -> usize {
        let index = self.statements.len() + 1;
        self.statements.push(Statement { index, text });
        index
    }

    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Statement text by 1-based sequence index.
    pub fn get(&self, index: usize) -> Option<&str> {
        index
            .checked_sub(1)
            .and_then(|pos| self.statements.get(pos))
            .map(|statement| statement.text.as_str())
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Statement> {
        self.statements.iter()
    }

    pub fn texts(&self) -> Vec<&str> {
        self.statements.iter().map(|s| s.text.as_str()).collect()
    }

    pub fn into_statements(self) -> Vec<Statement> {
        self.statements
    }
}

impl<'a> IntoIterator for &'a ParseResult {
    type Item = &'a Statement;
    type IntoIter = std::slice::Iter<'a, Statement>;

    fn into_iter(self) -> Self::IntoIter {
        self.statements.iter()
    }
}

/// Per-file parse results keyed by file name.
///
/// A file that could not be read still has an (empty) entry; the reason is
/// kept alongside in `failures`.
#[derive(Debug, Clone, Default)]
pub struct AggregateResult {
    files: HashMap<String, ParseResult>,
    failures: HashMap<String, ScriptError>,
}

impl AggregateResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn insert(&mut self, key: String, result: ParseResult) {
        self.files.insert(key, result);
    }

    pub(crate) fn insert_failure(&mut self, key: String, error: ScriptError) {
        self.files.insert(key.clone(), ParseResult::new());
        self.failures.insert(key, error);
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.files.contains_key(key)
    }

    pub fn get(&self, key: &str) -> Option<&ParseResult> {
        self.files.get(key)
    }

    pub fn failure(&self, key: &str) -> Option<&ScriptError> {
        self.failures.get(key)
    }

    pub fn failures(&self) -> &HashMap<String, ScriptError> {
        &self.failures
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParseResult)> {
        self.files.iter()
    }

    /// Keys sorted for stable presentation.
    pub fn sorted_keys(&self) -> Vec<&String> {
        let mut keys: Vec<&String> = self.files.keys().collect();
        keys.sort();
        keys
    }

    pub fn total_statements(&self) -> usize {
        self.files.values().map(ParseResult::len).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    pub index: usize,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionReport {
    pub executed: usize,
    pub rows_affected: u64,
    pub failures: Vec<StatementFailure>,
    pub execution_time: Duration,
}

impl ExecutionReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn message(&self, total: usize) -> String {
        if self.failures.is_empty() {
            format!(
                "Executed {} statements, {} row(s) affected",
                self.executed, self.rows_affected
            )
        } else {
            let errors: Vec<String> = self
                .failures
                .iter()
                .map(|f| format!("Statement {}: {}", f.index, f.message))
                .collect();
            format!(
                "Executed {} of {} statements, {} row(s) affected | Errors: {}",
                self.executed,
                total,
                self.rows_affected,
                errors.join("; ")
            )
        }
    }
}
