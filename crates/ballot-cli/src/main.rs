// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// BALLOT CLI - Governance vote recommendations for a set of wallets
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

use ballot_core::{PipelineConfig, PipelineContext};
use clap::{Parser, Subcommand};
use colored::*;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "ballot")]
#[command(about = "Ballot - Snapshot vote recommendations for a wallet fleet", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML config file (every field optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// GraphQL endpoint of the Snapshot hub (overrides the config file)
    #[arg(short, long, env = "BALLOT_ENDPOINT", global = true)]
    endpoint: Option<String>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only warnings and errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve, thin, infer, filter and export recommendations for every wallet
    Run {
        /// Seed for diversity thinning (reproducible runs)
        #[arg(long)]
        seed: Option<u64>,

        /// Keep every recommendation
        #[arg(long)]
        no_thinning: bool,

        /// Wallet list (one address per line)
        #[arg(short, long)]
        wallets: Option<PathBuf>,
    },
    /// Show the unvoted active proposals of one wallet
    Candidates {
        /// Wallet address
        wallet: String,
    },
    /// Tally recent votes of a proposal and print the leading choice
    Infer {
        /// Proposal id
        proposal_id: String,
    },
    /// Voting history maintenance
    History {
        #[command(subcommand)]
        action: HistoryCommands,
    },
    /// Re-render the wallet → space table from an exported recommendation file
    ExportCsv {
        /// Recommendation JSON (default: export_json_path)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Table output (default: export_csv_path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum HistoryCommands {
    /// Bootstrap the history from the remote index (overwrites the file)
    Init {
        /// Wallet list (one address per line)
        #[arg(short, long)]
        wallets: Option<PathBuf>,
    },
    /// Print recorded votes
    Show {
        /// Only this wallet
        wallet: Option<String>,
    },
    /// Append votes cast on current candidates since the last run
    Refresh {
        /// Wallet list (one address per line)
        #[arg(short, long)]
        wallets: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    if !cli.quiet {
        print_banner();
    }

    if let Err(e) = dispatch(cli) {
        print_error(&e.to_string());
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// File config, then `BALLOT_*` environment, then command-line flags
fn load_context(
    config_path: Option<&PathBuf>,
    endpoint: Option<String>,
) -> Result<PipelineContext, Box<dyn std::error::Error>> {
    let mut config = match config_path {
        Some(path) => PipelineConfig::load_from_file(path)?,
        None => PipelineConfig::default(),
    };
    config.apply_env();
    if let Some(endpoint) = endpoint {
        config.endpoint = endpoint;
    }
    Ok(PipelineContext::new(config)?)
}

fn dispatch(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut ctx = load_context(cli.config.as_ref(), cli.endpoint)?;

    match cli.command {
        Commands::Run {
            seed,
            no_thinning,
            wallets,
        } => {
            if let Some(path) = wallets {
                ctx.config.wallet_path = path;
            }
            commands::run::handle(ctx, seed, no_thinning)?;
        }
        Commands::Candidates { wallet } => commands::candidates::handle(&ctx, &wallet)?,
        Commands::Infer { proposal_id } => commands::infer::handle(&ctx, &proposal_id)?,
        Commands::History { action } => commands::history::handle(action, ctx)?,
        Commands::ExportCsv { input, output } => commands::export::handle(&ctx, input, output)?,
    }

    Ok(())
}

fn print_banner() {
    println!(
        "{}",
        "╔═══════════════════════════════════════════════╗".cyan()
    );
    println!(
        "{}",
        "║        BALLOT - Vote Recommendation CLI       ║"
            .cyan()
            .bold()
    );
    println!(
        "{}",
        "╚═══════════════════════════════════════════════╝".cyan()
    );
    println!();
}

fn print_success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

fn print_error(msg: &str) {
    eprintln!("{} {}", "✗".red().bold(), msg);
}

fn print_info(msg: &str) {
    println!("{} {}", "ℹ".blue().bold(), msg);
}

// ─────────────────────────────────────────────────────────────────
// UNIT TESTS
// ─────────────────────────────────────────────────────────────────
