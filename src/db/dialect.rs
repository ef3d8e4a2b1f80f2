use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::ScriptError;

/// Number of leading words inspected when deciding whether a statement
/// opens a procedural block.
pub(crate) const PLSQL_LOOKAHEAD_WORDS: usize = 8;

/// Closed set of supported database vendors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    Oracle,
    PostgreSql,
    MySql,
    SqlServer,
}

static REGISTRY: Lazy<BTreeMap<&'static str, Dialect>> = Lazy::new(|| {
    Dialect::all()
        .into_iter()
        .map(|dialect| (dialect.name(), dialect))
        .collect()
});

impl Dialect {
    pub fn all() -> [Dialect; 4] {
        [
            Dialect::Oracle,
            Dialect::PostgreSql,
            Dialect::MySql,
            Dialect::SqlServer,
        ]
    }

    /// Name -> dialect map keyed by the lowercase vendor name.
    pub fn registry() -> &'static BTreeMap<&'static str, Dialect> {
        &REGISTRY
    }

    /// Case-insensitive lookup. Unknown, empty or absent names resolve to `None`.
    pub fn lookup(name: Option<&str>) -> Option<Dialect> {
        let name = name?.trim();
        if name.is_empty() {
            return None;
        }
        REGISTRY.get(name.to_lowercase().as_str()).copied()
    }

    pub fn name(&self) -> &'static str {
        match self {
            Dialect::Oracle => "oracle",
            Dialect::PostgreSql => "postgresql",
            Dialect::MySql => "mysql",
            Dialect::SqlServer => "sqlserver",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Dialect::Oracle => "Commercial Oracle Database",
            Dialect::PostgreSql => "Open Source PostgreSQL Database",
            Dialect::MySql => "Open Source MySQL Database",
            Dialect::SqlServer => "Commercial SQL Server Database",
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Dialect::Oracle => 1521,
            Dialect::PostgreSql => 5432,
            Dialect::MySql => 3306,
            Dialect::SqlServer => 1433,
        }
    }

    pub fn validation_query(&self) -> &'static str {
        match self {
            Dialect::Oracle => "SELECT 1 FROM DUAL",
            Dialect::PostgreSql | Dialect::MySql | Dialect::SqlServer => "SELECT 1",
        }
    }

    pub fn explain_plan_sql(&self, sql: &str) -> String {
        match self {
            Dialect::Oracle => format!("EXPLAIN PLAN FOR {}", sql),
            Dialect::PostgreSql => {
                format!("EXPLAIN (ANALYZE false, COSTS true, FORMAT TEXT) {}", sql)
            }
            Dialect::MySql => format!("EXPLAIN {}", sql),
            Dialect::SqlServer => format!("SET SHOWPLAN_TEXT ON; {}", sql),
        }
    }

    /// True when a line holding only `/` closes a procedural block.
    pub fn uses_slash_block_terminator(&self) -> bool {
        matches!(self, Dialect::Oracle)
    }

    /// True when `$tag$ ... $tag$` bodies are literal text.
    pub fn supports_dollar_quotes(&self) -> bool {
        matches!(self, Dialect::PostgreSql)
    }

    /// True for Oracle alternative quoting: `q'[...]'`, `nq'{...}'`.
    pub fn supports_q_quotes(&self) -> bool {
        matches!(self, Dialect::Oracle)
    }

    /// True when `\` escapes the next character inside string literals.
    pub fn supports_backslash_escapes(&self) -> bool {
        matches!(self, Dialect::MySql)
    }

    /// Opening and closing characters of vendor identifier quoting.
    pub fn identifier_quotes(&self) -> Option<(char, char)> {
        match self {
            Dialect::MySql => Some(('`', '`')),
            Dialect::SqlServer => Some(('[', ']')),
            Dialect::Oracle | Dialect::PostgreSql => None,
        }
    }

    /// Whether a statement starting with `candidate` opens a procedural block.
    pub fn is_plsql_start(&self, candidate: &str) -> bool {
        let words = leading_words_upper(candidate, PLSQL_LOOKAHEAD_WORDS);
        let Some(first) = words.first().map(String::as_str) else {
            return false;
        };

        match self {
            Dialect::Oracle => {
                matches!(first, "BEGIN" | "DECLARE")
                    || matches!(
                        create_target(&words, &["OR", "REPLACE", "EDITIONABLE", "NONEDITIONABLE"]),
                        Some("FUNCTION" | "PROCEDURE" | "TRIGGER" | "PACKAGE" | "TYPE")
                    )
            }
            Dialect::PostgreSql => {
                first == "DO"
                    || matches!(
                        create_target(&words, &["OR", "REPLACE"]),
                        Some("FUNCTION" | "PROCEDURE" | "TRIGGER")
                    )
            }
            Dialect::MySql => {
                let Some(kind_pos) = words
                    .iter()
                    .position(|w| matches!(w.as_str(), "PROCEDURE" | "FUNCTION" | "TRIGGER" | "EVENT"))
                else {
                    return false;
                };
                // CREATE [DEFINER = user@host] kind
                first == "CREATE"
                    && (kind_pos == 1 || words.get(1).is_some_and(|w| w == "DEFINER"))
            }
            Dialect::SqlServer => {
                if first == "BEGIN" {
                    return !matches!(
                        words.get(1).map(String::as_str),
                        Some("TRAN" | "TRANSACTION" | "DISTRIBUTED")
                    );
                }
                matches!(
                    create_target(&words, &["OR", "ALTER"]),
                    Some("PROCEDURE" | "PROC" | "FUNCTION" | "TRIGGER")
                )
            }
        }
    }
}

/// The object kind following `CREATE` once the allowed modifiers are skipped.
fn create_target<'a>(words: &'a [String], modifiers: &[&str]) -> Option<&'a str> {
    if words.first().map(String::as_str) != Some("CREATE") {
        return None;
    }
    words[1..]
        .iter()
        .map(String::as_str)
        .find(|word| !modifiers.contains(word))
}

pub(crate) fn leading_words_upper(text: &str, limit: usize) -> Vec<String> {
    text.split(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '$' || c == '#'))
        .filter(|w| !w.is_empty())
        .take(limit)
        .map(|w| w.to_uppercase())
        .collect()
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Dialect {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Dialect::lookup(Some(s)).ok_or_else(|| ScriptError::UnknownDialect(s.to_string()))
    }
}
