use dosql::config::{self, Config};
use dosql::logger::{self, Level, TracingLogger};
use dosql::{Connection, DoError, Result, StatementType};
use std::process::ExitCode;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

const USAGE: &str = "Usage: dosql [--config FILE] <database> <sql>...";

struct Args {
    config: Option<String>,
    database: Option<String>,
    statements: Vec<String>,
}

fn parse_args() -> Result<Args> {
    let mut args = std::env::args().skip(1);
    let mut parsed = Args {
        config: None,
        database: None,
        statements: Vec::new(),
    };
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" | "-c" => {
                let path = args
                    .next()
                    .ok_or_else(|| DoError::Config("--config needs a file argument".to_string()))?;
                parsed.config = Some(path);
            }
            _ if parsed.database.is_none() => parsed.database = Some(arg),
            _ => parsed.statements.push(arg),
        }
    }
    Ok(parsed)
}

fn load(args: &Args) -> Result<Config> {
    if let Some(path) = &args.config {
        return config::load_config(path);
    }
    match config::default_config_path() {
        Some(path) if path.exists() => config::load_config(path),
        _ => Ok(Config::default()),
    }
}

fn init_logging(level: Option<Level>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match level {
        Some(Level::Debug) => EnvFilter::new("info,dosql=debug"),
        _ => EnvFilter::new("info"),
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let sink = match level {
        Some(level) => TracingLogger::with_level(level),
        None => TracingLogger::new(),
    };
    logger::set_logger(Arc::new(sink));
}

fn run_statement(conn: &Connection, sql: &str) -> Result<()> {
    let mut command = conn.create_command(sql)?;
    if StatementType::from_sql(sql).returns_rows() {
        let mut reader = command.execute_reader(&[])?;
        println!("{}", reader.field_names().join("\t"));
        while let Some(row) = reader.fetch_row()? {
            let cells: Vec<String> = row.iter().map(ToString::to_string).collect();
            println!("{}", cells.join("\t"));
        }
        reader.close();
    } else {
        let result = command.execute_non_query(&[])?;
        println!("{} row(s) affected", result.affected_rows);
    }
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = load(&args)?;
    init_logging(config.logger_level()?);

    let options = config.connection_options(args.database.as_deref())?;
    info!("Opening database {}", options.path);
    let mut conn = Connection::open(&options)?;

    for sql in &args.statements {
        run_statement(&conn, sql)?;
    }

    conn.close();
    Ok(())
}

fn main() -> ExitCode {
    let args = match parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("{}\n{}", e, USAGE);
            return ExitCode::FAILURE;
        }
    };
    if args.database.is_none() && args.config.is_none() {
        eprintln!("{}", USAGE);
        return ExitCode::FAILURE;
    }

    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e);
            ExitCode::FAILURE
        }
    }
}
