use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::Duration;

use crate::db::dialect::Dialect;
use crate::error::{Result, ScriptError};

use super::script::ScriptParser;
use super::{AggregateResult, ParseResult};

type ParseMessage = (String, Result<ParseResult>);

/// Parses many script files in parallel and reports once, when all are done.
#[derive(Debug, Clone)]
pub struct ConcurrentParser {
    dialect: Dialect,
    max_workers: usize,
}

impl ConcurrentParser {
    pub fn new(dialect: Dialect) -> Self {
        Self {
            dialect,
            max_workers: default_workers(),
        }
    }

    /// 0 selects the default worker count.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = if max_workers == 0 {
            default_workers()
        } else {
            max_workers
        };
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Start parsing `files` and return immediately.
    ///
    /// `on_complete` runs exactly once, on a background thread, with one entry
    /// per file. Files that fail to read map to an empty result and a
    /// recorded failure.
    pub fn parse_many<F>(&self, files: Vec<PathBuf>, on_complete: F)
    where
        F: FnOnce(AggregateResult) + Send + 'static,
    {
        let keys = unique_keys(&files);
        let expected = keys.clone();
        let total = files.len();

        // Reversed so that pop() hands out files in input order.
        let mut jobs: Vec<(String, PathBuf)> = keys.into_iter().zip(files).collect();
        jobs.reverse();

        let n_workers = self.max_workers.max(1).min(jobs.len());
        let queue = Arc::new(Mutex::new(jobs));
        let (sender, receiver) = mpsc::channel::<ParseMessage>();

        for _ in 0..n_workers {
            let queue = Arc::clone(&queue);
            let sender = sender.clone();
            let dialect = self.dialect;
            thread::spawn(move || loop {
                let job = {
                    let mut guard = match queue.lock() {
                        Ok(g) => g,
                        Err(poisoned) => poisoned.into_inner(),
                    };
                    guard.pop()
                };
                let Some((key, path)) = job else { break };
                let result = ScriptParser::parse_file(&path, dialect);
                if sender.send((key, result)).is_err() {
                    break;
                }
            });
        }
        drop(sender);

        let dialect = self.dialect;
        thread::spawn(move || {
            let mut aggregate = AggregateResult::new();

            // Ends once every worker has dropped its sender.
            for (key, result) in receiver.iter() {
                match result {
                    Ok(parsed) => aggregate.insert(key, parsed),
                    Err(err) => {
                        tracing::warn!(file = %key, error = %err, "Failed to parse script");
                        aggregate.insert_failure(key, err);
                    }
                }
            }

            for key in expected {
                if !aggregate.contains_key(&key) {
                    tracing::warn!(file = %key, "Parse task ended without a result");
                    aggregate.insert_failure(
                        key,
                        ScriptError::MalformedInput("parse task ended without a result".to_string()),
                    );
                }
            }

            tracing::info!(
                dialect = %dialect,
                files = total,
                failed = aggregate.failures().len(),
                statements = aggregate.total_statements(),
                "Concurrent parse finished"
            );
            on_complete(aggregate);
        });
    }

    /// Block until every file is parsed or `timeout` elapses.
    pub fn parse_many_blocking(
        &self,
        files: Vec<PathBuf>,
        timeout: Duration,
    ) -> Result<AggregateResult> {
        let (sender, receiver) = mpsc::sync_channel::<AggregateResult>(1);
        self.parse_many(files, move |aggregate| {
            let _ = sender.send(aggregate);
        });
        receiver
            .recv_timeout(timeout)
            .map_err(|_| ScriptError::Timeout { waited: timeout })
    }
}

/// Free-function form of [`ConcurrentParser::parse_many`].
pub fn parse_files_async<F>(files: Vec<PathBuf>, dialect: Dialect, on_complete: F)
where
    F: FnOnce(AggregateResult) + Send + 'static,
{
    ConcurrentParser::new(dialect).parse_many(files, on_complete);
}

fn default_workers() -> usize {
    thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn file_key(path: &Path) -> String {
    match path.file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => path.display().to_string(),
    }
}

/// File names as keys; a repeated name falls back to the full path.
fn unique_keys(files: &[PathBuf]) -> Vec<String> {
    let mut seen: HashSet<String> = HashSet::new();
    files
        .iter()
        .map(|path| {
            let mut key = file_key(path);
            if seen.contains(&key) {
                key = path.display().to_string();
            }
            if seen.contains(&key) {
                let base = key.clone();
                let mut n = 2usize;
                while seen.contains(&key) {
                    key = format!("{}#{}", base, n);
                    n += 1;
                }
            }
            seen.insert(key.clone());
            key
        })
        .collect()
}
