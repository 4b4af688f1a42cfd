//! Asof CLI - ad-hoc, temporal, and vector queries from the terminal

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use asof::config::{self, AsofConfig, ConnectParams};
use asof::value::TabularResult;
use asof::{exec, search, temporal, ui};
use asof::{EmbeddingProvider, Registry, SearchOptions, SearchOutcome, Value};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "asof")]
#[command(version)]
#[command(about = "Ad-hoc, point-in-time, and vector similarity queries for analytical tables")]
#[command(long_about = r#"
Asof runs analytical queries against a relational backend without making you
care whether the server supports vector distance functions or system
versioning:

  asof init --database analytics.db
  asof query --sql "SELECT * FROM experiments LIMIT 5"
  asof temporal --sql "SELECT * FROM experiments" --as-of 2024-01-01
  asof search --table docs --query "failed login spikes" -k 5
"#)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to the config file (defaults to ./asof.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a starter asof.toml
    Init {
        /// Database name (for sqlite, a file path)
        #[arg(short, long)]
        database: String,

        /// Overwrite an existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Run an ad-hoc SQL statement
    Query {
        /// Statement text; use ?1, ?2, ... for parameters
        #[arg(short, long)]
        sql: String,

        /// Positional parameter values (repeatable)
        #[arg(short, long)]
        param: Vec<String>,
    },

    /// Run a point-in-time query against a system-versioned table
    Temporal {
        /// Base query, e.g. "SELECT * FROM experiments WHERE metric > 0.5"
        #[arg(short, long)]
        sql: String,

        /// As-of instant: "YYYY-MM-DD" or a full timestamp
        #[arg(short, long)]
        as_of: String,

        /// Dialect override for the temporal keyword
        #[arg(short, long)]
        keyword: Option<String>,
    },

    /// Rank the nearest rows of a table for a text query
    Search {
        /// Table holding the stored vectors
        #[arg(short, long)]
        table: String,

        /// Free-text query to embed
        #[arg(short, long)]
        query: String,

        /// Maximum number of results
        #[arg(short = 'k', long, default_value = "10")]
        top_k: usize,

        /// Column holding the stored vectors
        #[arg(long, default_value = "embedding")]
        embed_column: String,

        /// Column identifying a row
        #[arg(long, default_value = "id")]
        id_column: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    if let Commands::Init { database, force } = &cli.command {
        let path = cli.config.clone().unwrap_or_else(config::default_config_path);
        let cfg = AsofConfig {
            connection: ConnectParams::sqlite(database),
            embedding: Default::default(),
        };
        config::write_config(&path, &cfg, *force)?;
        ui::success(&format!("Wrote {}", path.display()));
        return Ok(());
    }

    let cfg = config::load_config(cli.config.as_deref())?.ok_or_else(|| {
        anyhow::anyhow!("no asof.toml found (run `asof init --database <path>` first)")
    })?;

    let registry = Registry::new();
    registry.connect("default", &cfg.connection)?;

    match cli.command {
        Commands::Init { .. } => unreachable!("handled before connecting"),

        Commands::Query { sql, param } => {
            let params: Vec<Value> = param.into_iter().map(Value::Text).collect();
            let result = exec::execute_sql(&registry, "default", &sql, &params)?;
            print_result(&result);
        }

        Commands::Temporal { sql, as_of, keyword } => {
            let result =
                temporal::temporal_query(&registry, "default", &sql, &as_of, keyword.as_deref())?;
            print_result(&result);
        }

        Commands::Search { table, query, top_k, embed_column, id_column } => {
            let provider = EmbeddingProvider::new(&cfg.embedding.provider, &cfg.embedding.model)?;
            let opts = SearchOptions { embed_column, id_column, top_k };

            println!("🧠 Searching {} for: '{}'...", table, query);
            match search::vector_search(&registry, &provider, "default", &table, &query, &opts)? {
                SearchOutcome::Ranked(matches) if matches.is_empty() => {
                    println!("∅ No rows found.");
                }
                SearchOutcome::Ranked(matches) => {
                    println!("{}", ui::matches_table(&matches));
                }
                SearchOutcome::Unscored(result) => {
                    ui::warn("No stored vector could be parsed; showing the raw fetch");
                    print_result(&result);
                }
            }
        }
    }

    registry.close_all();
    Ok(())
}

fn print_result(result: &TabularResult) {
    if result.columns.is_empty() {
        ui::success("OK (no result set)");
    } else {
        println!("{}", ui::result_table(result));
        println!("{}", ui::dim(&format!("{} row(s)", result.len())));
    }
}
