use std::collections::HashMap;
use std::fmt;

use crate::error::{Result, ScriptError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamMode {
    In,
    Out,
    InOut,
}

/// Declared parameter type, from the tag given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Text,
    Numeric,
    Float,
    Date,
    Timestamp,
    Boolean,
    Other,
}

impl ParamType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_uppercase().as_str() {
            "STRING" | "VARCHAR" | "VARCHAR2" => ParamType::Text,
            "INTEGER" | "INT" | "NUMBER" => ParamType::Numeric,
            "DOUBLE" => ParamType::Float,
            "DATE" => ParamType::Date,
            "TIMESTAMP" => ParamType::Timestamp,
            "BOOLEAN" => ParamType::Boolean,
            _ => ParamType::Other,
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            ParamType::Text => "VARCHAR2",
            ParamType::Numeric => "NUMBER",
            ParamType::Float => "DOUBLE",
            ParamType::Date => "DATE",
            ParamType::Timestamp => "TIMESTAMP",
            ParamType::Boolean => "BOOLEAN",
            ParamType::Other => "OTHER",
        };
        f.write_str(tag)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcedureParam {
    pub name: String,
    pub param_type: ParamType,
    pub value: Option<String>,
    pub mode: ParamMode,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BindValue {
    Integer(i64),
    Float(f64),
    Text(String),
    Null,
}

/// Parse `name:type:value,...` lists for inputs and in-out parameters and
/// `name:type,...` for outputs. Inputs come first, then in-out, then outputs.
pub fn parse_procedure_params(
    input: Option<&str>,
    output: Option<&str>,
    inout: Option<&str>,
) -> Result<Vec<ProcedureParam>> {
    let mut params = Vec::new();
    parse_param_list(input, ParamMode::In, &mut params)?;
    parse_param_list(inout, ParamMode::InOut, &mut params)?;
    parse_param_list(output, ParamMode::Out, &mut params)?;
    Ok(params)
}

fn parse_param_list(
    spec: Option<&str>,
    mode: ParamMode,
    params: &mut Vec<ProcedureParam>,
) -> Result<()> {
    let Some(spec) = spec else {
        return Ok(());
    };

    for entry in spec.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let mut parts = entry.splitn(3, ':');
        let name = parts.next().unwrap_or_default().trim();
        let tag = parts.next().map(str::trim).unwrap_or_default();
        let value = parts.next().map(|v| v.trim().to_string());

        if name.is_empty() || tag.is_empty() {
            return Err(ScriptError::InvalidArgument(format!(
                "malformed parameter '{}', expected name:type{}",
                entry,
                if mode == ParamMode::Out { "" } else { ":value" }
            )));
        }
        if mode != ParamMode::Out && value.is_none() {
            return Err(ScriptError::InvalidArgument(format!(
                "parameter '{}' is missing a value",
                name
            )));
        }

        params.push(ProcedureParam {
            name: name.to_string(),
            param_type: ParamType::from_tag(tag),
            value: if mode == ParamMode::Out { None } else { value },
            mode,
        });
    }
    Ok(())
}

/// A stored-procedure invocation with positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ProcedureCall {
    name: String,
    params: Vec<ProcedureParam>,
}

impl ProcedureCall {
    /// Inputs (In, InOut) are placed before outputs (Out).
    pub fn new(name: &str, params: Vec<ProcedureParam>) -> Result<Self> {
        let name = name.trim();
        let valid = !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '$' | '#' | '"'));
        if !valid {
            return Err(ScriptError::InvalidArgument(format!(
                "invalid procedure name '{}'",
                name
            )));
        }

        let (mut ordered, outputs): (Vec<_>, Vec<_>) =
            params.into_iter().partition(|p| p.mode != ParamMode::Out);
        ordered.extend(outputs);

        Ok(Self {
            name: name.to_string(),
            params: ordered,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn params(&self) -> &[ProcedureParam] {
        &self.params
    }

    /// `{call name(?, ?, ...)}`
    pub fn call_sql(&self) -> String {
        let placeholders = vec!["?"; self.params.len()].join(", ");
        format!("{{call {}({})}}", self.name, placeholders)
    }

    /// `BEGIN name(:1, :2); END;`
    pub fn plsql_block(&self) -> String {
        let placeholders: Vec<String> = (1..=self.params.len()).map(|i| format!(":{}", i)).collect();
        format!("BEGIN {}({}); END;", self.name, placeholders.join(", "))
    }

    /// 1-based positions and values of In and InOut parameters.
    pub fn input_binds(&self) -> Result<Vec<(usize, BindValue)>> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.mode != ParamMode::Out)
            .map(|(i, p)| Ok((i + 1, bind_value(p)?)))
            .collect()
    }

    /// 1-based positions of parameters whose value is read back (Out, InOut).
    pub fn output_positions(&self) -> Vec<(usize, &ProcedureParam)> {
        self.params
            .iter()
            .enumerate()
            .filter(|(_, p)| p.mode != ParamMode::In)
            .map(|(i, p)| (i + 1, p))
            .collect()
    }
}

fn bind_value(param: &ProcedureParam) -> Result<BindValue> {
    let Some(raw) = param.value.as_deref() else {
        return Ok(BindValue::Null);
    };
    match param.param_type {
        ParamType::Numeric => raw.parse::<i64>().map(BindValue::Integer).map_err(|_| {
            ScriptError::InvalidArgument(format!(
                "parameter '{}': '{}' is not an integer",
                param.name, raw
            ))
        }),
        ParamType::Float => raw.parse::<f64>().map(BindValue::Float).map_err(|_| {
            ScriptError::InvalidArgument(format!(
                "parameter '{}': '{}' is not a number",
                param.name, raw
            ))
        }),
        _ => Ok(BindValue::Text(raw.to_string())),
    }
}

/// A connection able to invoke stored procedures.
pub trait ProcedureRunner {
    /// Returns output-parameter name -> value.
    fn call_procedure(&mut self, call: &ProcedureCall) -> Result<HashMap<String, Option<String>>>;
}
