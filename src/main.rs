use anyhow::{Context, Result};
use clap::{ArgGroup, Parser};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use msr_policy_updater::{Config, Credentials, MsrClient, PolicyUpdater, UpdateConfig};

const LONG_ABOUT: &str = "\
MSR Mirroring Policy Password Update Tool

This tool can be used to update all push and poll mirroring policies affiliated
with a target MSR domain name with a new username and password combo.";

#[derive(Parser, Debug)]
#[command(name = "msr-policy-updater")]
#[command(about = "Update credentials on MSR push and poll mirroring policies")]
#[command(long_about = LONG_ABOUT)]
#[command(version)]
#[command(group(
    ArgGroup::new("mirroring")
        .required(true)
        .multiple(true)
        .args(["poll_mirroring", "push_mirroring"])
))]
struct Cli {
    /// Log level to use (overridden by RUST_LOG)
    #[arg(long)]
    log_level: Option<String>,

    /// Configuration file path (defaults to XDG config location)
    #[arg(short, long)]
    config: Option<String>,

    /// URL of MSR to perform update against (required unless set in config)
    #[arg(long)]
    msr_url: Option<String>,

    /// Username to use when authenticating against the target MSR (required unless set in config)
    #[arg(long)]
    msr_username: Option<String>,

    /// Password to use when authenticating against the target MSR
    #[arg(long)]
    msr_password: String,

    /// Update poll mirroring policies
    #[arg(long)]
    poll_mirroring: bool,

    /// Update push mirroring policies
    #[arg(long)]
    push_mirroring: bool,

    /// Username to update across policies
    #[arg(short, long)]
    username: String,

    /// Password to update across policies
    #[arg(short, long)]
    password: String,

    /// Number of repositories to fetch for updating at a time
    #[arg(short, long)]
    batch_size: Option<u32>,

    /// Skip TLS certificate verification when talking to MSR
    #[arg(long)]
    insecure_skip_tls_verify: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = Config::load_from(cli.config.as_deref())?;

    let log_level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_logging(&log_level)?;

    info!(
        "Updating mirroring policies (Push: {}, Poll: {})",
        cli.push_mirroring, cli.poll_mirroring
    );

    let host = cli
        .msr_url
        .or(config.msr.url.clone())
        .context("MSR URL is required: pass --msr-url or set msr.url in the config file")?;
    let msr_username = cli
        .msr_username
        .or(config.msr.username.clone())
        .context("MSR username is required: pass --msr-username or set msr.username in the config file")?;

    let client = MsrClient::builder(host)
        .with_credentials(msr_username, cli.msr_password)
        .with_insecure_tls(cli.insecure_skip_tls_verify || config.msr.insecure_skip_tls_verify)
        .with_timeout(config.request_timeout())
        .build()
        .context("failed to setup new policy updater")?;

    let update_config = UpdateConfig::new(
        Credentials::new(cli.username, cli.password),
        cli.poll_mirroring,
        cli.push_mirroring,
    )
    .with_batch_size(cli.batch_size.unwrap_or(config.update.batch_size));

    let summary = PolicyUpdater::new(client).run(&update_config).await?;

    info!(
        "Done: {} policies updated across {} repositories",
        summary.policies_updated(),
        summary.repositories
    );

    Ok(())
}

/// Initialize logging, letting RUST_LOG take precedence over `level`
fn init_logging(level: &str) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(level)
            .with_context(|| format!("failed to parse defined log-level: {:?}", level))?,
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    Ok(())
}
