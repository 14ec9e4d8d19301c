//! # gk-cli
//!
//! Command-line interface for the Gatekeeper policy engine.
//!
//! - `gk check <tool>` — evaluate one tool call against the loaded policies
//! - `gk rules` — list compiled rules in evaluation order
//! - `gk validate` — report every policy file or rule the loader skipped

mod commands;

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use gk_policy::{ApprovalMode, LoadOptions, LoadReport, PolicyEngine, PolicyPaths, PolicySettings};

/// Administrator rules live next to system-wide configuration.
const ADMIN_POLICY_DIR: &str = "/etc/gatekeeper/policies";

/// Gatekeeper CLI: inspect tool-call policies.
#[derive(Parser)]
#[command(name = "gk", version, about)]
struct Cli {
    /// Default-tier rule directory (defaults to the rules built into gk).
    #[arg(long, global = true)]
    default_dir: Option<PathBuf>,

    /// User-tier rule directory (defaults to <config dir>/gatekeeper/policies).
    #[arg(long, global = true)]
    user_dir: Option<PathBuf>,

    /// Admin-tier rule directory (defaults to /etc/gatekeeper/policies).
    #[arg(long, global = true)]
    admin_dir: Option<PathBuf>,

    /// Settings file (defaults to <config dir>/gatekeeper/settings.toml).
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// Approval mode to load and evaluate in.
    #[arg(long, global = true, default_value = "default")]
    mode: String,

    /// Report ask_user outcomes as deny.
    #[arg(long, global = true)]
    non_interactive: bool,

    /// Log output format.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a tool call and print the decision.
    Check {
        /// Tool name, bare or `server__tool`.
        tool: String,
        /// MCP server the tool belongs to.
        #[arg(long)]
        server: Option<String>,
        /// Tool arguments as a JSON object.
        #[arg(long)]
        args: Option<String>,
        /// Print the evaluation trace.
        #[arg(long)]
        trace: bool,
    },
    /// List compiled rules in evaluation order.
    Rules,
    /// Load every tier and report skipped files and rules.
    Validate,
}

impl Cli {
    fn gatekeeper_config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("gatekeeper"))
    }

    /// Tier directories, with flags taking precedence over the defaults.
    fn policy_paths(&self) -> PolicyPaths {
        PolicyPaths {
            default_dir: self.default_dir.clone(),
            user_dir: self
                .user_dir
                .clone()
                .or_else(|| Self::gatekeeper_config_dir().map(|dir| dir.join("policies"))),
            admin_dir: Some(
                self.admin_dir
                    .clone()
                    .unwrap_or_else(|| PathBuf::from(ADMIN_POLICY_DIR)),
            ),
        }
    }

    /// An explicit `--settings` file must exist; the default location is optional.
    fn policy_settings(&self) -> anyhow::Result<PolicySettings> {
        match &self.settings {
            Some(path) => PolicySettings::from_file(path)
                .with_context(|| format!("Failed to load settings from {}", path.display())),
            None => match Self::gatekeeper_config_dir() {
                Some(dir) => {
                    let path = dir.join("settings.toml");
                    PolicySettings::load_or_default(&path)
                        .with_context(|| format!("Failed to load settings from {}", path.display()))
                }
                None => Ok(PolicySettings::default()),
            },
        }
    }

    fn load_options(&self) -> anyhow::Result<LoadOptions> {
        Ok(LoadOptions {
            paths: self.policy_paths(),
            bundled_defaults: true,
            settings: self.policy_settings()?,
            mode: ApprovalMode::new(self.mode.as_str()),
            non_interactive: self.non_interactive,
        })
    }
}

fn init_tracing(format: LogFormat) -> anyhow::Result<()> {
    // Logs go to stderr so they don't interfere with command output on stdout.
    let filter = EnvFilter::from_default_env()
        .add_directive("gk_policy=info".parse()?)
        .add_directive("gk_cli=info".parse()?);
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(false);
    match format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
    Ok(())
}

/// Load the engine, abandoning the load on Ctrl-C.
async fn load_engine(options: LoadOptions) -> anyhow::Result<(PolicyEngine, LoadReport)> {
    let engine = PolicyEngine::pending();
    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };
    let loaded = engine.load(options, cancel).await;
    interrupt.abort();
    let report = loaded.context("Failed to load policies")?;
    Ok((engine, report))
}

fn describe_paths(paths: &PolicyPaths) {
    if paths.default_dir.is_none() {
        tracing::debug!("default tier: built-in rules");
    }
    for (tier, dir) in paths.tiers() {
        tracing::debug!("{} tier: {}", tier, display_dir(dir));
    }
}

fn display_dir(dir: &Path) -> String {
    if dir.is_dir() {
        dir.display().to_string()
    } else {
        format!("{} (missing)", dir.display())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format)?;

    let options = cli.load_options()?;
    describe_paths(&options.paths);
    let mode = options.mode.clone();
    let (engine, report) = load_engine(options).await?;

    match &cli.command {
        Commands::Check {
            tool,
            server,
            args,
            trace,
        } => commands::check::execute(
            &engine,
            tool,
            server.as_deref(),
            args.as_deref(),
            &mode,
            *trace,
        ),
        Commands::Rules => commands::rules::execute(&engine, &mode),
        Commands::Validate => commands::validate::execute(&report),
    }
}
