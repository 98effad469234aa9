mod commands;
mod logging;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "safeguard",
    version,
    about = "Inspect, review, and manage text-safety pipeline runs"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the run database and its schema
    Init {
        /// Path to the SQLite database
        #[arg(long)]
        db: PathBuf,
    },
    /// Validate a run configuration file
    Check {
        /// Path to run config YAML file
        config: PathBuf,
    },
    /// List recent runs with their statistics
    Runs {
        #[arg(long)]
        db: PathBuf,
        /// Maximum number of runs to show
        #[arg(long, default_value_t = 20)]
        limit: u32,
    },
    /// Show one run with its results and logs
    Show {
        #[arg(long)]
        db: PathBuf,
        run_id: i64,
    },
    /// Record a human review label on a stored result
    Review {
        #[arg(long)]
        db: PathBuf,
        result_id: i64,
        /// Verdict label (stored lowercased)
        #[arg(long)]
        label: String,
        #[arg(long)]
        notes: Option<String>,
        /// Which stage the verdict applies to (input, output, both)
        #[arg(long)]
        scope: Option<String>,
    },
    /// Mark a run as finished
    Complete {
        #[arg(long)]
        db: PathBuf,
        run_id: i64,
        /// Terminal status (completed, failed)
        #[arg(long, default_value = "completed")]
        status: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_sink = logging::init(&cli.log_level);

    match cli.command {
        Commands::Init { db } => commands::init::execute(&db),
        Commands::Check { config } => commands::check::execute(&config),
        Commands::Runs { db, limit } => commands::runs::execute(&db, limit),
        Commands::Show { db, run_id } => commands::show::execute(&db, run_id),
        Commands::Review {
            db,
            result_id,
            label,
            notes,
            scope,
        } => commands::review::execute(&db, result_id, &label, notes, scope.as_deref()),
        Commands::Complete { db, run_id, status } => {
            commands::complete::execute(&db, run_id, &status, &log_sink)
        }
    }
}
