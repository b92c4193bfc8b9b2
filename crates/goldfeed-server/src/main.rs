// Copyright 2026 Goldfeed Contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use goldfeed::config::parse_time_of_day;
use goldfeed::{ConfigOverrides, FeedConfig, SeriesKind};
use goldfeed_server::commands;
use goldfeed_server::logging::{self, LogFormat, DEFAULT_FILTER};
use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "goldfeed",
    about = "Goldfeed: retail gold price scraper with a self-refreshing JSON cache",
    version,
    after_help = "Run 'goldfeed <command> --help' for details on each command."
)]
struct Cli {
    /// Directory holding the cached series and freshness records
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Upstream price page URL
    #[arg(long, global = true)]
    url: Option<String>,

    /// Hours before a cached series is considered stale
    #[arg(long, global = true)]
    staleness_hours: Option<u64>,

    /// Log filter (overridden by RUST_LOG)
    #[arg(long, global = true, default_value = DEFAULT_FILTER)]
    log_level: String,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the JSON API and run the refresh schedule
    Serve {
        /// Address to listen on
        #[arg(long, default_value = "0.0.0.0:8080")]
        addr: SocketAddr,
        /// Do not run scheduled refreshes
        #[arg(long)]
        no_schedule: bool,
        /// Local refresh time HH:MM (repeatable; default 09:00 and 18:00)
        #[arg(long = "at")]
        at: Vec<String>,
    },
    /// Refresh cached series now
    Refresh {
        #[arg(long, value_enum, default_value_t = KindArg::All)]
        kind: KindArg,
    },
    /// Print a cached series, refreshing it first if stale
    Show {
        #[arg(long, default_value = "daily")]
        kind: SeriesKind,
        /// Print at most this many entries
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show cache state for both series
    Status,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum KindArg {
    Daily,
    Yearly,
    All,
}

impl KindArg {
    fn kinds(self) -> Vec<SeriesKind> {
        match self {
            Self::Daily => vec![SeriesKind::Daily],
            Self::Yearly => vec![SeriesKind::Yearly],
            Self::All => SeriesKind::ALL.to_vec(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Commands::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "goldfeed", &mut std::io::stdout());
        return Ok(());
    }

    logging::init(&cli.log_level, cli.log_format)?;

    let schedule = match &cli.command {
        Commands::Serve { at, .. } if !at.is_empty() => Some(
            at.iter()
                .map(|raw| parse_time_of_day(raw))
                .collect::<Result<Vec<_>, _>>()?,
        ),
        _ => None,
    };

    let config = FeedConfig::resolve(ConfigOverrides {
        data_dir: cli.data_dir,
        source_url: cli.url,
        staleness_hours: cli.staleness_hours,
        fetch_timeout_secs: None,
        schedule,
    })?;

    match cli.command {
        Commands::Serve {
            addr, no_schedule, ..
        } => commands::serve(&config, addr, !no_schedule).await,
        Commands::Refresh { kind } => commands::refresh(&config, &kind.kinds(), cli.json).await,
        Commands::Show { kind, limit } => commands::show(&config, kind, limit, cli.json).await,
        Commands::Status => commands::status(&config, cli.json),
        Commands::Completions { .. } => Ok(()),
    }
}
