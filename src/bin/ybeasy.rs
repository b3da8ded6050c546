//! ybeasy: filter clauses, procedure transpiling and ybsql execution
//!
//! # Usage
//!
//! ```bash
//! # Build a filter clause
//! ybeasy filter --required table --eq table=orders --map table=tablename --map schema=schemaname
//!
//! # Show the anonymous block for a stored procedure (dry run)
//! ybeasy transpile yb_chunk_dml_by_date_part_p --arg a_table_name=sales
//!
//! # Run it
//! ybeasy @conn.args call yb_chunk_dml_by_date_part_p --arg a_table_name=sales
//! ```

use anyhow::{anyhow, Context};
use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::*;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;
use ybeasy::argfile;
use ybeasy::prelude::*;
use ybeasy::result::{error_line, util_name};

#[derive(Parser)]
#[command(name = "ybeasy")]
#[command(version)]
#[command(about = "Build SQL filters, transpile stored procedures and run them through ybsql", long_about = None)]
#[command(after_help = "EXAMPLES:
    ybeasy filter --multi owner --in owner=dze --like owner='etl%' --map owner=tableowner
    ybeasy transpile yb_chunk_dml_by_date_part_p --arg a_table_name=sales --arg a_min_chunk_size=1000000
    ybeasy @conn.args query 'SELECT CURRENT_SCHEMA'

argument files:
    @arg_file             file containing arguments
                          to enter multi-line argument, use: --arg \"\"\"multi-line value\"\"\"")]
struct Cli {
    /// Config file, defaults to ./ybeasy.toml then the user config dir
    #[arg(long, global = true, env = "YBEASY_CONFIG")]
    config: Option<PathBuf>,

    /// Display verbose execution {1 - info, 2 - debug, 3 - extended}
    #[arg(long, global = true, value_parser = clap::value_parser!(u8).range(1..=3))]
    verbose: Option<u8>,

    /// Turn off colored text output
    #[arg(long, global = true)]
    nocolor: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Split a delimited list, respecting quotes and brackets
    Split {
        text: String,
        #[arg(long, default_value_t = ',')]
        delim: char,
    },
    /// Print the SQL filter clause for database object filters
    Filter(FilterCmd),
    /// Print the anonymous block for a stored procedure
    Transpile(ProcCmd),
    /// Run a stored procedure as an anonymous block
    Call {
        #[command(flatten)]
        target: ProcCmd,
        /// Output format
        #[arg(short, long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Run SQL through ybsql
    Query {
        sql: String,
        /// Double quote object names that need it in the output
        #[arg(long)]
        quote: bool,
    },
    /// Check the connection and show database details
    Verify,
}

#[derive(Args)]
struct FilterCmd {
    /// Object types that require a single value
    #[arg(long, value_delimiter = ',')]
    required: Vec<ObjectType>,

    /// Object types that take an optional single value, defaults to schema
    #[arg(long, value_delimiter = ',')]
    single: Vec<ObjectType>,

    /// Object types that take in/like lists
    #[arg(long, value_delimiter = ',')]
    multi: Vec<ObjectType>,

    /// TYPE=VALUE exact match for a single valued type
    #[arg(long, value_parser = parse_key_value)]
    eq: Vec<(String, String)>,

    /// TYPE=NAME in the list
    #[arg(long = "in", value_parser = parse_key_value)]
    in_list: Vec<(String, String)>,

    /// TYPE=NAME not in the list
    #[arg(long = "not-in", value_parser = parse_key_value)]
    not_in_list: Vec<(String, String)>,

    /// TYPE=PATTERN like the pattern
    #[arg(long, value_parser = parse_key_value)]
    like: Vec<(String, String)>,

    /// TYPE=PATTERN not like the pattern
    #[arg(long, value_parser = parse_key_value)]
    not_like: Vec<(String, String)>,

    /// TYPE=COLUMN mapping of object type to SQL column
    #[arg(long = "map", required = true, value_parser = parse_key_value)]
    map: Vec<(String, String)>,

    /// Indent used after each line break
    #[arg(long, default_value = "    ")]
    indent: String,

    /// Double single quotes for embedding in a quoted string
    #[arg(long)]
    escape_quotes: bool,

    /// Match every schema instead of CURRENT_SCHEMA when none is given
    #[arg(long)]
    all_schemas: bool,
}

#[derive(Args)]
struct ProcCmd {
    /// Stored procedure name, read from <install_dir>/sql/<name>.sql
    procedure: String,

    /// NAME=VALUE procedure argument
    #[arg(short, long = "arg", value_parser = parse_key_value)]
    args: Vec<(String, String)>,

    /// SQL to run before the procedure
    #[arg(long, default_value = "")]
    pre_sql: String,

    /// SQL to run after the procedure
    #[arg(long, default_value = "")]
    post_sql: String,
}

impl ProcCmd {
    fn proc_args(&self) -> ProcArgs {
        self.args
            .iter()
            .map(|(name, value)| (name.clone(), ArgValue::from(value.as_str())))
            .collect()
    }
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", s))
}

#[tokio::main]
async fn main() {
    tokio::spawn(async {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("{}", error_line("user terminated..."));
            std::process::exit(1);
        }
    });

    let argv = match argfile::expand_args(std::env::args()) {
        Ok(argv) => argv,
        Err(e) => fail(e.into()),
    };
    let cli = Cli::parse_from(argv);

    if cli.nocolor {
        colored::control::set_override(false);
    }
    init_logging(cli.verbose);

    match tokio::task::spawn_blocking(move || run(cli)).await {
        Ok(Ok(code)) => std::process::exit(code),
        Ok(Err(e)) => fail(e),
        Err(e) => fail(anyhow!(e)),
    }
}

fn init_logging(verbose: Option<u8>) {
    let filter = match verbose {
        Some(1) => EnvFilter::new("info"),
        Some(2) => EnvFilter::new("debug"),
        Some(_) => EnvFilter::new("trace"),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn fail(e: anyhow::Error) -> ! {
    let code = e.downcast_ref::<YbError>().map_or(1, YbError::exit_code);
    eprintln!("{}", error_line(&format!("{:#}", e)));
    std::process::exit(code);
}

/// Run the command, returning the process exit code.
fn run(cli: Cli) -> anyhow::Result<i32> {
    match cli.command {
        Commands::Split { text, delim } => {
            for token in ybeasy::split(&text, delim)? {
                println!("{}", token);
            }
            Ok(0)
        }
        Commands::Filter(cmd) => {
            println!("{}", filter_clause(&cmd)?);
            Ok(0)
        }
        Commands::Transpile(cmd) => {
            let config = load_config(cli.config.as_deref())?;
            let transpiler = Transpiler::new(config.install_dir());
            let block = transpiler.transpile(&cmd.procedure, &cmd.proc_args(), &cmd.pre_sql, &cmd.post_sql)?;
            println!("{}", block.sql);
            Ok(0)
        }
        Commands::Call { target, format } => {
            let mut conn = connect(cli.config.as_deref())?;
            let result = conn.call_procedure(&target.procedure, &target.proc_args(), &target.pre_sql, &target.post_sql)?;
            match format {
                OutputFormat::Json => {
                    println!("{}", serde_json::to_string_pretty(&result)?);
                }
                OutputFormat::Text => {
                    result.write("", "", false);
                    match result.proc_return() {
                        Some(value) => println!("{} {}", "Return:".dimmed(), value.to_string().cyan()),
                        None => println!("{} {}", "Return:".dimmed(), "NULL".cyan()),
                    }
                }
            }
            Ok(result.exit_code())
        }
        Commands::Query { sql, quote } => {
            let mut conn = connect(cli.config.as_deref())?;
            let result = conn.query(&sql)?;
            result.write("", "", quote);
            Ok(result.exit_code())
        }
        Commands::Verify => {
            let mut conn = connect(cli.config.as_deref())?;
            let info = conn.verify()?;
            println!("{} {}", "Database:".dimmed(), info.database.cyan());
            println!("{} {}", "Current Schema:".dimmed(), info.schema.cyan());
            println!("{} {}", "DB User:".dimmed(), info.user.cyan());
            println!("{} {}", "Super User:".dimmed(), info.is_super_user.to_string().cyan());
            println!("{} {}", "YBDB:".dimmed(), info.version.cyan());
            Ok(0)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> anyhow::Result<Config> {
    Config::load(path).context("failed to load configuration")
}

fn connect(path: Option<&std::path::Path>) -> anyhow::Result<Connection> {
    let config = load_config(path)?;
    Ok(Connection::new(&config, util_name())?)
}

fn filter_clause(cmd: &FilterCmd) -> anyhow::Result<String> {
    let single = if cmd.single.is_empty() {
        vec![ObjectType::Schema]
    } else {
        cmd.single.clone()
    };
    let roles = FilterRoles::new(cmd.required.clone(), single, cmd.multi.clone())?;
    let mut filters = FilterArgs::new(roles);

    for (otype, value) in &cmd.eq {
        filters.set_single(otype.parse()?, value.as_str())?;
    }
    let multi_flags = [
        (MultiKind::In, &cmd.in_list),
        (MultiKind::NotIn, &cmd.not_in_list),
        (MultiKind::Like, &cmd.like),
        (MultiKind::NotLike, &cmd.not_like),
    ];
    for (kind, values) in multi_flags {
        for (otype, value) in values {
            filters.add_multi(otype.parse()?, kind, [value.as_str()])?;
        }
    }
    filters.validate()?;

    if cmd.all_schemas {
        filters.schema_set_all_if_none();
    }

    let columns = cmd
        .map
        .iter()
        .map(|(otype, column)| -> YbResult<(ObjectType, &str)> {
            Ok((otype.parse()?, column.as_str()))
        })
        .collect::<YbResult<ColumnMapping>>()?;

    Ok(filters.build_sql_filter(&columns, &cmd.indent, cmd.escape_quotes))
}
