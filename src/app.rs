use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::db::{
    parse_procedure_params, AggregateResult, ConcurrentParser, ConnectionInfo, Dialect,
    ExecutionOptions, ExecutionReport, OracleSession, ParseResult, ProcedureCall, ProcedureRunner,
    ScriptExecutor,
};
use crate::error::{Result, ScriptError};
use crate::utils::{credential_store, AppConfig};

/// Procedure name plus the raw `name:type[:value]` parameter lists.
#[derive(Debug, Clone, Default)]
pub struct ProcedureRequest {
    pub name: String,
    pub input: Option<String>,
    pub output: Option<String>,
    pub inout: Option<String>,
}

/// Connection settings from the command line. `name` selects a saved
/// connection; the other fields override it or describe a new one.
#[derive(Debug, Clone, Default)]
pub struct ConnectionArgs {
    pub name: Option<String>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<String>,
}

impl ConnectionArgs {
    fn is_inline(&self) -> bool {
        self.host.is_some() || self.username.is_some() || self.database.is_some()
    }
}

const INLINE_CONNECTION_NAME: &str = "cli";

pub struct App {
    config: AppConfig,
    config_path: Option<PathBuf>,
}

impl App {
    pub fn new() -> Self {
        let config_path = AppConfig::config_path();
        let config = match &config_path {
            Some(path) => AppConfig::load_from(path),
            None => AppConfig::new(),
        };
        Self {
            config,
            config_path,
        }
    }

    /// An app that never persists its config.
    pub fn with_config(config: AppConfig) -> Self {
        Self {
            config,
            config_path: None,
        }
    }

    pub fn with_config_at(config: AppConfig, path: &Path) -> Self {
        Self {
            config,
            config_path: Some(path.to_path_buf()),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The named dialect, or the configured default when none is given.
    pub fn resolve_dialect(&self, name: Option<&str>) -> Result<Dialect> {
        match name {
            Some(name) => name.parse(),
            None => self.config.default_dialect(),
        }
    }

    pub fn execution_options(&self) -> ExecutionOptions {
        ExecutionOptions {
            stop_on_error: self.config.stop_on_error,
            transactional: self.config.transactional,
            print_statements: self.config.print_statements,
        }
    }

    /// Parse every file concurrently and wait for the aggregate.
    pub fn parse_files(
        &self,
        files: Vec<PathBuf>,
        dialect: Dialect,
        timeout: Option<Duration>,
        max_workers: Option<usize>,
    ) -> Result<AggregateResult> {
        if files.is_empty() {
            return Err(ScriptError::InvalidArgument(
                "at least one script file is required".to_string(),
            ));
        }
        let timeout = timeout.unwrap_or_else(|| self.config.parse_timeout());
        ConcurrentParser::new(dialect)
            .with_max_workers(max_workers.unwrap_or(self.config.max_workers))
            .parse_many_blocking(files, timeout)
    }

    /// Build the target connection from a saved entry, inline settings, or
    /// the last used connection, in that order. The password is only the
    /// one given on the command line; see [`App::open_session`].
    pub fn resolve_connection(
        &self,
        args: &ConnectionArgs,
        dialect: Dialect,
    ) -> Result<ConnectionInfo> {
        let mut info = match args.name.as_deref() {
            Some(name) => self.saved_connection(name)?,
            None if args.is_inline() => {
                let username = required(args.username.as_deref(), "--username")?;
                let database = required(args.database.as_deref(), "--database")?;
                ConnectionInfo::new(
                    INLINE_CONNECTION_NAME,
                    dialect,
                    username,
                    "",
                    args.host.as_deref().unwrap_or("localhost"),
                    args.port,
                    database,
                )
            }
            None => match self.config.last_connection.as_deref() {
                Some(name) => self.saved_connection(name)?,
                None => {
                    return Err(ScriptError::InvalidArgument(
                        "no connection given; use --connection or --username/--database"
                            .to_string(),
                    ))
                }
            },
        };

        if args.name.is_some() {
            if let Some(host) = &args.host {
                info.host = host.clone();
            }
            if let Some(username) = &args.username {
                info.username = username.clone();
            }
            if let Some(database) = &args.database {
                info.database = database.clone();
            }
        }
        if let Some(port) = args.port {
            info.port = port;
        }
        if let Some(password) = &args.password {
            info.password = password.clone();
        }
        Ok(info)
    }

    fn saved_connection(&self, name: &str) -> Result<ConnectionInfo> {
        self.config
            .get_connection_by_name(name)
            .cloned()
            .ok_or_else(|| ScriptError::Config(format!("no saved connection named '{}'", name)))
    }

    /// Save `info` under `name`; a non-empty password goes to the keyring.
    pub fn save_connection(
        &mut self,
        name: &str,
        info: &ConnectionInfo,
    ) -> Result<ConnectionInfo> {
        let mut saved = info.clone();
        saved.name = name.to_string();
        if !saved.password.is_empty() {
            credential_store::store_password(name, &saved.password)?;
        }
        self.config.add_connection(saved.clone());
        self.persist()?;
        tracing::info!(connection = %saved.display_string(), "Saved connection");
        Ok(saved)
    }

    /// Remove a saved connection and its keyring entry. False when unknown.
    pub fn forget_connection(&mut self, name: &str) -> Result<bool> {
        if self.config.get_connection_by_name(name).is_none() {
            return Ok(false);
        }
        self.config.remove_connection(name);
        self.persist()?;
        credential_store::delete_password(name)?;
        Ok(true)
    }

    fn persist(&self) -> Result<()> {
        match &self.config_path {
            Some(path) => self.config.save_to(path),
            None => Err(ScriptError::Config(
                "no configuration directory available".to_string(),
            )),
        }
    }

    /// Connect, taking the password from the keyring when none was given.
    fn open_session(&self, mut info: ConnectionInfo) -> Result<OracleSession> {
        if info.password.is_empty() {
            info.password = credential_store::get_password(&info.name)?.ok_or_else(|| {
                ScriptError::Credential(format!(
                    "no password given or stored for connection '{}'",
                    info.name
                ))
            })?;
        }
        OracleSession::connect(info)
    }

    /// Run each script, in key order, on one session.
    pub fn execute_scripts(
        &self,
        connection: ConnectionInfo,
        dialect: Dialect,
        scripts: &[(&String, &ParseResult)],
        options: ExecutionOptions,
    ) -> Result<Vec<(String, ExecutionReport)>> {
        let mut session = self.open_session(connection)?;
        session.validate()?;

        let mut reports = Vec::with_capacity(scripts.len());
        for (key, script) in scripts {
            let span = tracing::info_span!("script", file = %key);
            let _enter = span.enter();
            let report = ScriptExecutor::new(&mut session, dialect, options).run(script)?;
            reports.push(((*key).clone(), report));
        }
        Ok(reports)
    }

    pub fn call_procedure(
        &self,
        connection: ConnectionInfo,
        request: &ProcedureRequest,
    ) -> Result<HashMap<String, Option<String>>> {
        let params = parse_procedure_params(
            request.input.as_deref(),
            request.output.as_deref(),
            request.inout.as_deref(),
        )?;
        let call = ProcedureCall::new(&request.name, params)?;
        let mut session = self.open_session(connection)?;
        session.call_procedure(&call)
    }
}

fn required<'a>(value: Option<&'a str>, flag: &str) -> Result<&'a str> {
    match value {
        Some(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(ScriptError::InvalidArgument(format!(
            "{} is required for an inline connection",
            flag
        ))),
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// Numbered statements per file, files in name order.
pub fn render_text(aggregate: &AggregateResult) -> String {
    let mut out = String::new();
    for key in aggregate.sorted_keys() {
        out.push_str(&format!("== {} ==\n", key));
        if let Some(error) = aggregate.failure(key) {
            out.push_str(&format!("   error: {}\n", error));
        }
        if let Some(result) = aggregate.get(key) {
            for statement in result {
                out.push_str(&format!("[{}] {}\n", statement.index, statement.text));
            }
        }
    }
    out
}

pub fn render_json(aggregate: &AggregateResult) -> Result<String> {
    let mut files = serde_json::Map::new();
    for key in aggregate.sorted_keys() {
        let statements = match aggregate.get(key) {
            Some(result) => serde_json::to_value(result),
            None => Ok(serde_json::Value::Array(Vec::new())),
        }
        .map_err(|err| ScriptError::MalformedInput(err.to_string()))?;

        let mut entry = serde_json::Map::new();
        entry.insert("statements".to_string(), statements);
        if let Some(error) = aggregate.failure(key) {
            entry.insert(
                "error".to_string(),
                serde_json::Value::String(error.to_string()),
            );
        }
        files.insert(key.clone(), serde_json::Value::Object(entry));
    }
    serde_json::to_string_pretty(&files).map_err(|err| ScriptError::MalformedInput(err.to_string()))
}
