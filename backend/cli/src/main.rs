mod config_cmd;
mod context;
mod maintenance_cmd;
mod presence_cmd;
mod terminal_output;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use context::Context;

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Pulse: who is online in which community")]
#[command(version)]
struct Cli {
    /// Config file [default: $PULSE_CONFIG or ./pulse.yaml]
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print JSON instead of tables
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the cleanup sweep and stats rollup until Ctrl-C
    Serve,
    /// Mark a member online in one or more communities
    Join {
        member: String,
        #[arg(required = true)]
        communities: Vec<String>,
    },
    /// Mark a member offline in a community, or everywhere when none is given
    Leave {
        member: String,
        community: Option<String>,
    },
    /// Record activity for a member in a community
    Ping { member: String, community: String },
    /// Show online count and peaks for a community
    Status { community: String },
    /// List members online in a community
    Members { community: String },
    /// List online communities, or one member's communities
    Communities {
        #[arg(long)]
        member: Option<String>,
    },
    /// Run one cleanup sweep
    Sweep,
    /// Record today's stats for every online community
    Rollup,
    /// Show rolled-up daily stats for a community
    Stats {
        community: String,
        #[arg(long, default_value_t = 7)]
        days: usize,
    },
    /// Inspect or create the config file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective config with secrets masked
    Show,
    /// Write a config file with every default filled in
    Init {
        #[arg(long)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;

    // Works even when the existing file does not load.
    if let Commands::Config { action: ConfigAction::Init { force } } = cli.command {
        let path = pulse_config::config_file_path(cli.config.as_deref());
        return config_cmd::init(&path, force).await;
    }

    let ctx = Context::load(cli.config.as_deref()).await?;

    match cli.command {
        Commands::Serve => maintenance_cmd::serve(&ctx).await,
        Commands::Join { member, communities } => {
            presence_cmd::join(&*ctx.tracker().await?, &member, &communities, json).await
        }
        Commands::Leave { member, community } => {
            presence_cmd::leave(&*ctx.tracker().await?, &member, community.as_deref(), json).await
        }
        Commands::Ping { member, community } => {
            presence_cmd::ping(&*ctx.tracker().await?, &member, &community, json).await
        }
        Commands::Status { community } => {
            presence_cmd::status(&*ctx.tracker().await?, &community, json).await
        }
        Commands::Members { community } => {
            presence_cmd::members(&*ctx.tracker().await?, &community, json).await
        }
        Commands::Communities { member } => {
            presence_cmd::communities(&*ctx.tracker().await?, member.as_deref(), json).await
        }
        Commands::Sweep => maintenance_cmd::sweep(&*ctx.tracker().await?, json).await,
        Commands::Rollup => {
            maintenance_cmd::rollup(ctx.tracker().await?, ctx.rollup_store()?, json).await
        }
        Commands::Stats { community, days } => {
            maintenance_cmd::stats(&*ctx.rollup_store()?, &community, days, json)
        }
        Commands::Config { action: ConfigAction::Show } => {
            config_cmd::show(&ctx.config, &ctx.config_path, json).await
        }
        Commands::Config { action: ConfigAction::Init { force } } => {
            config_cmd::init(&ctx.config_path, force).await
        }
    }
}
