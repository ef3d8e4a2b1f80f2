use std::path::PathBuf;
use std::process;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use sqlrun::app::{render_json, render_text, App, ConnectionArgs, ProcedureRequest};
use sqlrun::db::{OracleSession, ScriptExecutor};
use sqlrun::error::ScriptError;

/// Split SQL scripts into statements and optionally run them
#[derive(Parser)]
#[command(name = "sqlrun")]
#[command(about = "PL/SQL-aware SQL script splitter and runner")]
struct Cli {
    /// Script files to parse
    files: Vec<PathBuf>,

    /// Database dialect: oracle, postgresql, mysql, sqlserver
    #[arg(short = 'd', long)]
    dialect: Option<String>,

    /// Seconds to wait for all files to be parsed
    #[arg(short = 't', long)]
    timeout: Option<u64>,

    /// Number of parse workers (0 = available parallelism)
    #[arg(short = 'w', long)]
    workers: Option<usize>,

    /// Print parse results as JSON
    #[arg(long)]
    json: bool,

    /// Print the explain-plan statement for each parsed statement
    #[arg(long)]
    explain: bool,

    /// Run the parsed scripts on the target connection
    #[arg(short = 'e', long)]
    execute: bool,

    /// Saved connection to use (defaults to the last saved one)
    #[arg(short = 'c', long, value_name = "NAME")]
    connection: Option<String>,

    /// Database host for an inline connection
    #[arg(short = 'H', long)]
    host: Option<String>,

    /// Database port (defaults to the dialect's port)
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Database username
    #[arg(short = 'u', long)]
    username: Option<String>,

    /// Database password (falls back to the keyring)
    #[arg(short = 'p', long)]
    password: Option<String>,

    /// Database or service name
    #[arg(short = 'D', long)]
    database: Option<String>,

    /// Print the connection string and exit
    #[arg(long)]
    show_connect_string: bool,

    /// Save the connection under this name; the password goes to the keyring
    #[arg(long, value_name = "NAME")]
    save_connection: Option<String>,

    /// Remove a saved connection and its stored password, then exit
    #[arg(long, value_name = "NAME")]
    forget_connection: Option<String>,

    /// Keep going after a failing statement
    #[arg(long)]
    continue_on_error: bool,

    /// Commit once per script instead of per statement
    #[arg(long)]
    transactional: bool,

    /// Echo each statement before running it
    #[arg(long)]
    print_statements: bool,

    /// Call a stored procedure on the target connection instead of running files
    #[arg(long, value_name = "PROCEDURE")]
    call: Option<String>,

    /// Input parameters: name:type:value,...
    #[arg(long, requires = "call")]
    input: Option<String>,

    /// Output parameters: name:type,...
    #[arg(long, requires = "call")]
    output: Option<String>,

    /// In-out parameters: name:type:value,...
    #[arg(long, requires = "call")]
    inout: Option<String>,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut app = App::new();

    match run(&mut app, cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            tracing::error!(error = %err, "sqlrun failed");
            eprintln!("Error: {}", err);
            process::exit(err.exit_code());
        }
    }
}

fn run(app: &mut App, cli: Cli) -> Result<i32, ScriptError> {
    let dialect = app.resolve_dialect(cli.dialect.as_deref())?;

    if let Some(name) = &cli.forget_connection {
        if app.forget_connection(name)? {
            println!("Removed connection {}", name);
            return Ok(0);
        }
        return Err(ScriptError::Config(format!("no saved connection named '{}'", name)));
    }

    let needs_connection = cli.execute
        || cli.call.is_some()
        || cli.show_connect_string
        || cli.save_connection.is_some();
    let mut connection = None;
    if needs_connection {
        let args = ConnectionArgs {
            name: cli.connection.clone(),
            host: cli.host.clone(),
            port: cli.port,
            username: cli.username.clone(),
            password: cli.password.clone(),
            database: cli.database.clone(),
        };
        let mut info = app.resolve_connection(&args, dialect)?;
        if let Some(name) = &cli.save_connection {
            info = app.save_connection(name, &info)?;
            println!("Saved connection {}", info.display_string());
        }
        connection = Some(info);
    }

    if cli.show_connect_string {
        if let Some(info) = &connection {
            println!("{}", info.connection_string());
        }
        return Ok(0);
    }

    if let (Some(procedure), Some(info)) = (cli.call, connection.clone()) {
        let request = ProcedureRequest {
            name: procedure,
            input: cli.input,
            output: cli.output,
            inout: cli.inout,
        };
        let outputs = app.call_procedure(info, &request)?;
        let mut names: Vec<&String> = outputs.keys().collect();
        names.sort();
        for name in names {
            let value = outputs.get(name).cloned().flatten();
            println!("{}: {}", name, value.as_deref().unwrap_or("NULL"));
        }
        return Ok(0);
    }

    if cli.files.is_empty() && cli.save_connection.is_some() {
        return Ok(0);
    }

    let aggregate = app.parse_files(
        cli.files,
        dialect,
        cli.timeout.map(Duration::from_secs),
        cli.workers,
    )?;

    if cli.json {
        println!("{}", render_json(&aggregate)?);
    } else if cli.explain {
        for key in aggregate.sorted_keys() {
            if let Some(result) = aggregate.get(key) {
                println!("== {} ==", key);
                for sql in ScriptExecutor::<OracleSession>::explain_plan(result, dialect) {
                    println!("{}", sql);
                }
            }
        }
    } else {
        print!("{}", render_text(&aggregate));
    }

    // Exit status of the first failed file, if any
    let parse_status = aggregate
        .sorted_keys()
        .into_iter()
        .find_map(|key| aggregate.failure(key))
        .map(ScriptError::exit_code)
        .unwrap_or(0);

    let Some(connection) = connection.filter(|_| cli.execute) else {
        return Ok(parse_status);
    };

    let mut options = app.execution_options();
    if cli.continue_on_error {
        options.stop_on_error = false;
    }
    options.transactional |= cli.transactional;
    options.print_statements |= cli.print_statements;

    let scripts: Vec<_> = aggregate
        .sorted_keys()
        .into_iter()
        .filter(|key| aggregate.failure(key).is_none())
        .filter_map(|key| aggregate.get(key).map(|result| (key, result)))
        .collect();

    let reports = app.execute_scripts(connection, dialect, &scripts, options)?;
    let mut status = parse_status;
    for (key, report) in reports {
        let total = aggregate.get(&key).map_or(0, |result| result.len());
        println!("{}: {}", key, report.message(total));
        if !report.success() && status == 0 {
            status = 1;
        }
    }
    Ok(status)
}
