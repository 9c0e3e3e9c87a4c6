mod commands;
mod config;

use clap::{Parser, Subcommand};
use commands::Context;
use config::CliConfig;
use sealdraw_core::{LotteryId, Timestamp};
use sealdraw_lottery::{ErrorKind, LotteryError};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "sealdraw")]
#[command(about = "Commit-reveal lottery with escrowed ticket sales")]
#[command(version)]
struct Cli {
    /// Data directory for the lottery database
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Identity to act as (label or 0x address)
    #[arg(long = "as", global = true)]
    identity: Option<String>,

    /// Run the command at this unix time instead of now
    #[arg(long, global = true)]
    at: Option<Timestamp>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Owner and payment token
    #[command(subcommand)]
    Admin(commands::AdminCommands),

    /// Local token ledgers
    #[command(subcommand)]
    Token(commands::TokenCommands),

    /// Create, inspect and settle lotteries
    #[command(subcommand)]
    Lottery(commands::LotteryCommands),

    /// Buy, reveal and refund tickets
    #[command(subcommand)]
    Ticket(commands::TicketCommands),

    /// Show the event log
    Events {
        /// Only events after this sequence number
        #[arg(long, default_value_t = 0)]
        since: u64,
        /// Only events of this lottery
        #[arg(long)]
        lottery: Option<LotteryId>,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn report(e: &anyhow::Error) {
    let Some(err) = e.downcast_ref::<LotteryError>() else {
        eprintln!("Error: {:#}", e);
        return;
    };

    eprintln!("Error: {}", err);
    match err.kind() {
        ErrorKind::Phase => {
            eprintln!("Check the lottery's phase with 'sealdraw lottery show <id>'");
        }
        ErrorKind::Authorization => {
            eprintln!("Use --as to act as the right identity");
        }
        ErrorKind::Transfer => {
            eprintln!("Check your balance and allowance with 'sealdraw token balance <token>'");
            eprintln!("Approve the engine with 'sealdraw token approve <token> <amount>'");
        }
        ErrorKind::NotFound => {
            eprintln!("Use 'sealdraw lottery list' or 'sealdraw ticket list <id>' to see what exists");
        }
        ErrorKind::Validation | ErrorKind::StateConflict | ErrorKind::Storage => {}
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "sealdraw={},sealdraw_lottery={},sealdraw_core={}",
            log_level, log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Get data directory
    let data_dir = cli.data_dir.unwrap_or_else(|| {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sealdraw")
    });

    // Ensure data directory exists
    tokio::fs::create_dir_all(&data_dir).await?;

    let config = CliConfig::load(&data_dir).await?;
    let mut ctx = Context::open(&data_dir, &config, cli.identity.as_deref(), cli.at)?;

    // Execute command
    let result = match cli.command {
        Commands::Admin(cmd) => commands::handle_admin_command(cmd, &ctx).await,
        Commands::Token(cmd) => commands::handle_token_command(cmd, &mut ctx).await,
        Commands::Lottery(cmd) => commands::handle_lottery_command(cmd, &ctx).await,
        Commands::Ticket(cmd) => commands::handle_ticket_command(cmd, &ctx).await,
        Commands::Events {
            since,
            lottery,
            json,
        } => commands::handle_events_command(&ctx, since, lottery, json).await,
    };

    if let Err(e) = result {
        report(&e);
        std::process::exit(1);
    }

    Ok(())
}
