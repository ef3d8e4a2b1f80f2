use std::time::Instant;

use crate::db::dialect::Dialect;
use crate::error::{Result, ScriptError};

use super::script::ScriptParser;
use super::{ExecutionReport, ParseResult, StatementFailure};

/// A connection able to run single statements.
pub trait StatementRunner {
    /// Run one statement, returning the affected row count.
    fn execute(&mut self, sql: &str) -> Result<u64>;
    fn commit(&mut self) -> Result<()>;
    fn rollback(&mut self) -> Result<()>;
    fn set_auto_commit(&mut self, enabled: bool) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionOptions {
    pub stop_on_error: bool,
    pub transactional: bool,
    pub print_statements: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            transactional: false,
            print_statements: false,
        }
    }
}

/// Runs the statements of one parsed script against a [`StatementRunner`].
pub struct ScriptExecutor<'a, R: StatementRunner + ?Sized> {
    runner: &'a mut R,
    dialect: Dialect,
    options: ExecutionOptions,
}

impl<'a, R: StatementRunner + ?Sized> ScriptExecutor<'a, R> {
    pub fn new(runner: &'a mut R, dialect: Dialect, options: ExecutionOptions) -> Self {
        Self {
            runner,
            dialect,
            options,
        }
    }

    /// Execute every statement in sequence-index order.
    ///
    /// With `stop_on_error` the first failure is returned as the error (after
    /// rolling back when transactional); otherwise failures are collected in
    /// the report.
    pub fn run(&mut self, script: &ParseResult) -> Result<ExecutionReport> {
        let span = tracing::info_span!(
            "execute_script",
            dialect = %self.dialect,
            statements = script.len()
        );
        let _enter = span.enter();

        let start = Instant::now();
        let mut report = ExecutionReport::default();

        if script.is_empty() {
            tracing::info!("No statements to execute");
            return Ok(report);
        }

        if self.options.transactional {
            self.runner.set_auto_commit(false)?;
        }

        for statement in script {
            let sql = ScriptParser::executable_sql(&statement.text, self.dialect);
            if self.options.print_statements {
                println!("[{}] {}", statement.index, sql);
            }

            match self.runner.execute(&sql) {
                Ok(rows) => {
                    report.executed += 1;
                    report.rows_affected += rows;
                    tracing::debug!(index = statement.index, rows, "Statement executed");
                    if !self.options.transactional {
                        self.runner.commit()?;
                    }
                }
                Err(err) => {
                    tracing::warn!(index = statement.index, error = %err, "Statement failed");
                    if self.options.stop_on_error {
                        if self.options.transactional {
                            if let Err(rollback_err) = self.runner.rollback() {
                                tracing::error!(error = %rollback_err, "Rollback failed");
                            }
                        }
                        return Err(stop_error(statement.index, err));
                    }
                    report.failures.push(StatementFailure {
                        index: statement.index,
                        message: err.to_string(),
                    });
                }
            }
        }

        if self.options.transactional {
            self.runner.commit()?;
        }

        report.execution_time = start.elapsed();
        tracing::info!("{}", report.message(script.len()));
        Ok(report)
    }

    /// Explain-plan SQL for each statement, without executing anything.
    pub fn explain_plan(script: &ParseResult, dialect: Dialect) -> Vec<String> {
        script
            .iter()
            .map(|statement| {
                dialect.explain_plan_sql(&ScriptParser::executable_sql(&statement.text, dialect))
            })
            .collect()
    }
}

fn stop_error(index: usize, err: ScriptError) -> ScriptError {
    match err {
        ScriptError::Database(message) => {
            ScriptError::Database(format!("Statement {}: {}", index, message))
        }
        other => other,
    }
}
