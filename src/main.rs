use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod agents;
mod archive;
mod config;
mod debug_log;
mod filters;
mod limits;
mod recommend;
mod registry;
mod render;
mod resolve;
mod sessions;
mod transcript;
mod types;
mod utils;

use types::SessionSummary;

#[derive(Parser)]
#[command(name = "capmon")]
#[command(version)]
#[command(disable_help_subcommand = true)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Scan a specific session directory instead of discovering agents
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// Aggregate across all configured agents
    #[arg(long, global = true)]
    all_agents: bool,

    /// Restrict output to one agent id
    #[arg(long, global = true)]
    agent: Option<String>,

    /// Output JSON instead of the plain-text table
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Show session capacity status and recommendations (default)
    Status(StatusArgs),
    /// Dump aggregated session summaries
    Sessions(SessionsArgs),
    /// Resolve a session identifier (uuid prefix, label, channel, or
    /// channel/label)
    Resolve {
        /// Identifier to resolve
        query: String,
    },
    /// Archive session transcripts into a dated subdirectory
    Archive(ArchiveArgs),
    /// Manage configuration
    Config(ConfigArgs),
}

#[derive(Args, Default)]
struct StatusArgs {
    /// Only show sessions at or above this capacity percentage
    #[arg(long)]
    threshold: Option<f64>,
}

#[derive(Args)]
struct SessionsArgs {
    /// Pretty-print JSON instead of a single line
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Args)]
struct ArchiveArgs {
    /// Session to archive (uuid prefix, label, channel, or channel/label)
    target: Option<String>,

    /// Archive sessions with no activity for this long (e.g. 2h, 7d, 1mo)
    #[arg(long)]
    older_than: Option<String>,

    /// Archive sessions at or above this capacity percentage
    #[arg(long)]
    threshold: Option<f64>,

    /// Report what would be archived without touching anything
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(Args)]
struct ConfigArgs {
    #[command(subcommand)]
    subcommand: ConfigSubcommands,
}

#[derive(Subcommand)]
enum ConfigSubcommands {
    /// Create default configuration file
    Init {
        #[arg(long, default_value_t = false)]
        overwrite: bool,
    },
    /// Show current configuration
    Show,
    /// Set configuration value
    Set {
        /// Configuration key (runtime-bin, base-dir, timeout-secs,
        /// multi-agent, excluded-agents, warn-threshold, number-comma,
        /// number-human, locale)
        key: String,
        /// Configuration value
        value: String,
    },
}

#[tokio::main]
async fn main() {
    debug_log::init();
    let mut cli = Cli::parse();

    let config = config::Config::load_or_default();

    let outcome = match cli.command.take() {
        None => run_status(&cli, &config, StatusArgs::default()).await,
        Some(Commands::Status(args)) => run_status(&cli, &config, args).await,
        Some(Commands::Sessions(args)) => run_sessions(&cli, &config, args).await,
        Some(Commands::Resolve { query }) => run_resolve(&cli, &config, &query).await,
        Some(Commands::Archive(args)) => run_archive(&cli, &config, args).await,
        Some(Commands::Config(config_args)) => handle_config_subcommand(config_args),
    };

    if let Err(e) = outcome {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

/// Aggregate sessions per the CLI scan flags layered over the config.
async fn load_sessions(cli: &Cli, config: &config::Config) -> Vec<SessionSummary> {
    let ctx = config.scan_context();
    let multi_agent = cli.all_agents || cli.agent.is_some() || config.agents.multi_agent;
    let mut sessions = sessions::get_all_sessions(
        &ctx,
        cli.dir.as_deref(),
        multi_agent,
        &config.agents.excluded,
    )
    .await;

    if let Some(agent) = &cli.agent {
        sessions.retain(|s| s.agent_id.as_deref() == Some(agent.as_str()));
    }
    sessions
}

async fn run_status(cli: &Cli, config: &config::Config, args: StatusArgs) -> Result<()> {
    let mut sessions = load_sessions(cli, config).await;
    if let Some(threshold) = args.threshold {
        sessions = filters::filter_by_threshold(sessions, threshold);
    }
    filters::sort_by_capacity(&mut sessions);

    let recommendations = recommend::recommendations(&sessions);

    if cli.json {
        let payload = serde_json::json!({
            "sessions": sessions,
            "recommendations": recommendations,
        });
        println!("{}", serde_json::to_string_pretty(&payload)?);
        return Ok(());
    }

    render::print_sessions_table(&sessions, &config.format_options(), Utc::now());
    let over = sessions
        .iter()
        .filter(|s| s.percentage >= config.display.warn_threshold)
        .count();
    if over > 0 {
        println!(
            "\n{over} session(s) at or above the {}% warn threshold.",
            config.display.warn_threshold
        );
    }
    render::print_recommendations(&recommendations);
    Ok(())
}

async fn run_sessions(cli: &Cli, config: &config::Config, args: SessionsArgs) -> Result<()> {
    let mut sessions = load_sessions(cli, config).await;
    filters::sort_by_capacity(&mut sessions);

    if args.pretty {
        println!("{}", serde_json::to_string_pretty(&sessions)?);
    } else {
        println!("{}", serde_json::to_string(&sessions)?);
    }
    Ok(())
}

async fn run_resolve(cli: &Cli, config: &config::Config, query: &str) -> Result<()> {
    let sessions = load_sessions(cli, config).await;
    let resolution = resolve::resolve_session_id(query, &sessions);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&resolution)?);
        return Ok(());
    }

    if let Some(session_id) = &resolution.session_id {
        println!("{session_id}");
        return Ok(());
    }
    if resolution.ambiguous {
        eprintln!("\"{query}\" matches {} sessions:", resolution.matches.len());
        for m in &resolution.matches {
            let label = m.label.as_deref().unwrap_or("-");
            eprintln!("  {}  {}/{}", m.session_id, m.channel, label);
        }
        std::process::exit(1);
    }
    anyhow::bail!(
        "{}",
        resolution
            .error
            .unwrap_or_else(|| "could not resolve session".to_string())
    );
}

async fn run_archive(cli: &Cli, config: &config::Config, args: ArchiveArgs) -> Result<()> {
    if args.target.is_none() && args.older_than.is_none() && args.threshold.is_none() {
        anyhow::bail!(
            "refusing to archive everything; pass a target session, --older-than, or --threshold"
        );
    }

    let mut sessions = load_sessions(cli, config).await;

    if let Some(target) = &args.target {
        let resolution = resolve::resolve_session_id(target, &sessions);
        if resolution.ambiguous {
            eprintln!("\"{target}\" matches {} sessions:", resolution.matches.len());
            for m in &resolution.matches {
                let label = m.label.as_deref().unwrap_or("-");
                eprintln!("  {}  {}/{}", m.session_id, m.channel, label);
            }
            std::process::exit(1);
        }
        let Some(session_id) = resolution.session_id else {
            anyhow::bail!(
                "{}",
                resolution
                    .error
                    .unwrap_or_else(|| "could not resolve session".to_string())
            );
        };
        // A uuid prefix resolves to itself; match transcripts by prefix.
        sessions.retain(|s| s.session_id.starts_with(&session_id));
        if sessions.is_empty() {
            anyhow::bail!("no session files found matching \"{session_id}\"");
        }
    }

    if let Some(older_than) = &args.older_than {
        let age = filters::parse_duration(older_than)?;
        sessions = filters::filter_older_than(sessions, age, Utc::now());
    }
    if let Some(threshold) = args.threshold {
        sessions = filters::filter_by_threshold(sessions, threshold);
    }

    let result = archive::archive_sessions(&sessions, cli.dir.as_deref(), args.dry_run);

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        render::print_archive_result(&result);
    }
    Ok(())
}

fn handle_config_subcommand(config_args: ConfigArgs) -> Result<()> {
    match config_args.subcommand {
        ConfigSubcommands::Init { overwrite } => config::create_default_config(overwrite),
        ConfigSubcommands::Show => config::show_config(),
        ConfigSubcommands::Set { key, value } => config::set_config_value(&key, &value),
    }
}
