use oracle::sql_type::OracleType;
use oracle::{Connection, Statement};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::db::dialect::Dialect;
use crate::db::query::{
    BindValue, ParamType, ProcedureCall, ProcedureRunner, StatementRunner,
};
use crate::error::{Result, ScriptError};

const TEXT_BIND_SIZE: u32 = 4000;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConnectionInfo {
    pub name: String,
    pub dialect: Dialect,
    pub username: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub host: String,
    pub port: u16,
    pub database: String,
}

impl ConnectionInfo {
    pub fn new(
        name: &str,
        dialect: Dialect,
        username: &str,
        password: &str,
        host: &str,
        port: Option<u16>,
        database: &str,
    ) -> Self {
        Self {
            name: name.to_string(),
            dialect,
            username: username.to_string(),
            password: password.to_string(),
            host: host.to_string(),
            port: port.unwrap_or_else(|| dialect.default_port()),
            database: database.to_string(),
        }
    }

    pub fn connection_string(&self) -> String {
        match self.dialect {
            Dialect::Oracle => format!("//{}:{}/{}", self.host, self.port, self.database),
            Dialect::PostgreSql => {
                format!("postgresql://{}:{}/{}", self.host, self.port, self.database)
            }
            Dialect::MySql => format!("mysql://{}:{}/{}", self.host, self.port, self.database),
            Dialect::SqlServer => format!(
                "sqlserver://{}:{};databaseName={}",
                self.host, self.port, self.database
            ),
        }
    }

    pub fn display_string(&self) -> String {
        format!(
            "{} [{}] ({}@{}:{}/{})",
            self.name, self.dialect, self.username, self.host, self.port, self.database
        )
    }

    /// Securely clear the password from memory by overwriting with zeros
    /// then releasing the allocation.
    pub fn clear_password(&mut self) {
        // SAFETY: zero bytes are valid UTF-8
        let bytes = unsafe { self.password.as_bytes_mut() };
        for b in bytes.iter_mut() {
            // volatile so the zeroing is not optimized away
            unsafe { std::ptr::write_volatile(b, 0) };
        }
        self.password.clear();
        self.password.shrink_to_fit();
    }
}

impl Default for ConnectionInfo {
    fn default() -> Self {
        Self {
            name: String::new(),
            dialect: Dialect::Oracle,
            username: String::new(),
            password: String::new(),
            host: "localhost".to_string(),
            port: Dialect::Oracle.default_port(),
            database: "ORCL".to_string(),
        }
    }
}

/// A live Oracle connection used to run scripts and procedures.
pub struct OracleSession {
    connection: Connection,
    info: ConnectionInfo,
    auto_commit: bool,
}

impl OracleSession {
    /// Connect with `info`; the password is cleared once the session is open.
    pub fn connect(mut info: ConnectionInfo) -> Result<Self> {
        if info.dialect != Dialect::Oracle {
            return Err(ScriptError::Database(format!(
                "no driver available for {} connections",
                info.dialect
            )));
        }

        let conn_str = info.connection_string();
        let connection = match Connection::connect(&info.username, &info.password, &conn_str) {
            Ok(connection) => connection,
            Err(err) => {
                tracing::error!(connection = %info.display_string(), error = %err, "Connection error");
                info.clear_password();
                return Err(err.into());
            }
        };
        info.clear_password();

        Self::apply_default_session_settings(&connection);
        tracing::info!(connection = %info.display_string(), "Connected");

        Ok(Self {
            connection,
            info,
            auto_commit: false,
        })
    }

    fn apply_default_session_settings(conn: &Connection) {
        let statements = [
            "ALTER SESSION SET NLS_TIMESTAMP_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
            "ALTER SESSION SET NLS_DATE_FORMAT = 'yyyy-mm-dd hh24:mi:ss'",
        ];

        for statement in statements {
            if let Err(err) = conn.execute(statement, &[]) {
                tracing::warn!(statement, error = %err, "Failed to apply default session setting");
            }
        }
    }

    pub fn info(&self) -> &ConnectionInfo {
        &self.info
    }

    /// Run the dialect's validation query.
    pub fn validate(&self) -> Result<()> {
        self.connection
            .execute(self.info.dialect.validation_query(), &[])?;
        Ok(())
    }

    fn bind_inputs(stmt: &mut Statement, call: &ProcedureCall) -> Result<()> {
        for (position, value) in call.input_binds()? {
            match value {
                BindValue::Integer(v) => stmt.bind(position, &(&v, &OracleType::Number(0, 0)))?,
                BindValue::Float(v) => stmt.bind(position, &(&v, &OracleType::BinaryDouble))?,
                BindValue::Text(v) => {
                    stmt.bind(position, &(&v, &OracleType::Varchar2(TEXT_BIND_SIZE)))?
                }
                BindValue::Null => stmt.bind(position, &OracleType::Varchar2(TEXT_BIND_SIZE))?,
            }
        }
        Ok(())
    }
}

fn oracle_type(param_type: ParamType) -> OracleType {
    match param_type {
        ParamType::Numeric => OracleType::Number(0, 0),
        ParamType::Float => OracleType::BinaryDouble,
        ParamType::Date => OracleType::Date,
        ParamType::Timestamp => OracleType::Timestamp(6),
        ParamType::Boolean => OracleType::Boolean,
        ParamType::Text | ParamType::Other => OracleType::Varchar2(TEXT_BIND_SIZE),
    }
}

impl StatementRunner for OracleSession {
    fn execute(&mut self, sql: &str) -> Result<u64> {
        let stmt = self.connection.execute(sql, &[])?;
        let rows = stmt.row_count()?;
        if self.auto_commit {
            self.connection.commit()?;
        }
        Ok(rows)
    }

    fn commit(&mut self) -> Result<()> {
        self.connection.commit()?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        self.connection.rollback()?;
        Ok(())
    }

    fn set_auto_commit(&mut self, enabled: bool) -> Result<()> {
        self.auto_commit = enabled;
        Ok(())
    }
}

impl ProcedureRunner for OracleSession {
    fn call_procedure(&mut self, call: &ProcedureCall) -> Result<HashMap<String, Option<String>>> {
        let span = tracing::info_span!(
            "procedure",
            name = call.name(),
            dialect = %self.info.dialect,
            user = %self.info.username
        );
        let _enter = span.enter();

        let sql = call.plsql_block();
        tracing::debug!(sql = %sql, "Calling procedure");

        let mut stmt = self.connection.statement(&sql).build()?;
        Self::bind_inputs(&mut stmt, call)?;

        let outputs = call.output_positions();
        for (position, param) in &outputs {
            if param.value.is_none() {
                stmt.bind(*position, &oracle_type(param.param_type))?;
            }
        }

        stmt.execute(&[])?;

        let mut results = HashMap::new();
        for (position, param) in outputs {
            let value: Option<String> = stmt.bind_value(position)?;
            results.insert(param.name.clone(), value);
        }
        tracing::debug!(outputs = results.len(), "Procedure returned");
        Ok(results)
    }
}
