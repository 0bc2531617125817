use clap::{Parser as ClapParser, Subcommand};
use recordql::cli::{self, CliError, CompileOptions, ParseOptions};
use std::io::{self, Read};
use tracing::Level;

#[derive(ClapParser)]
#[command(name = "recordql")]
#[command(about = "recordql - compile record queries (what/where/order_by) into SQL")]
#[command(version)]
struct Cli {
    /// Log to stderr; repeat for more detail
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a query into a SQL statement
    Compile {
        /// Base table (person, family, event, ...)
        #[arg(short, long, default_value = "person")]
        table: String,

        /// Expression to select; repeat for several columns
        #[arg(short, long)]
        what: Vec<String>,

        /// Filter expression
        #[arg(long = "where")]
        where_clause: Option<String>,

        /// Sort expression, prefix with '-' for descending; repeatable
        #[arg(short, long, allow_hyphen_values = true)]
        order_by: Vec<String>,

        /// Page number, starting at 1
        #[arg(long)]
        page: Option<i64>,

        /// Rows per page
        #[arg(long)]
        page_size: Option<i64>,

        /// sqlite or postgres
        #[arg(short, long, default_value = "sqlite")]
        dialect: String,

        /// Extra constants as a JSON object (reads from stdin if piped)
        #[arg(short, long)]
        env: Option<String>,
    },

    /// Show the lowered form of one expression
    Parse {
        /// The expression to parse
        expression: String,

        #[arg(short, long, default_value = "person")]
        table: String,

        /// Item variable bound to elements of --array-path
        #[arg(long, requires = "array_path")]
        item_var: Option<String>,

        #[arg(long)]
        array_path: Option<String>,

        /// Extra constants as a JSON object
        #[arg(short, long)]
        env: Option<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_max_level(level)
        .init();

    let result = match cli.command {
        Commands::Compile {
            table,
            what,
            where_clause,
            order_by,
            page,
            page_size,
            dialect,
            env,
        } => read_env(env).and_then(|env| {
            let options = CompileOptions {
                table,
                what,
                where_clause,
                order_by,
                page,
                page_size,
                dialect,
                env,
            };
            cli::execute_compile(&options).map(|sql| println!("{}", sql))
        }),
        Commands::Parse {
            expression,
            table,
            item_var,
            array_path,
            env,
        } => {
            let options = ParseOptions {
                table,
                expression,
                item_var,
                array_path,
                env,
            };
            cli::execute_parse(&options).map(|expr| println!("{:#?}", expr))
        }
    };

    if let Err(e) = result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

/// `--env`, or the piped stdin when it is not a terminal.
fn read_env(env: Option<String>) -> Result<Option<String>, CliError> {
    match env {
        Some(s) => Ok(Some(s)),
        None if !atty::is(atty::Stream::Stdin) => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            Ok(Some(buffer).filter(|b| !b.trim().is_empty()))
        }
        None => Ok(None),
    }
}
