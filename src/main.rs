use anyhow::Context;
use clap::Parser;
use fillreports::runtime::config::{DEFAULT_LOG_STEP, DEFAULT_THREAD_COUNT};
use fillreports::{init_tracing, FillConfig, Runner};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fillreports")]
#[command(about = "Fill missing guilty files of open crash reports on the dashboard")]
struct Cli {
    /// Dashboard address
    #[arg(long, default_value = "https://syzkaller.appspot.com")]
    dashboard: String,
    /// Dashboard API client name; an empty value is rejected before the run starts
    #[arg(long)]
    client: String,
    /// Dashboard API key; an empty value is rejected before the run starts
    #[arg(long)]
    key: String,
    /// Number of concurrent fetch workers
    #[arg(long, default_value_t = DEFAULT_THREAD_COUNT)]
    threads: usize,
    /// Number of dispatched bugs between progress lines
    #[arg(long, default_value_t = DEFAULT_LOG_STEP)]
    log_step: usize,
    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 30)]
    timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let config = FillConfig::builder()
        .dashboard_url(cli.dashboard)
        .client(cli.client)
        .key(cli.key)
        .thread_count(cli.threads)
        .log_step(cli.log_step)
        .request_timeout(Duration::from_secs(cli.timeout_secs))
        .build()
        .context("invalid configuration")?;

    let runner = Runner::from_config(config).context("failed to create dashboard client")?;
    let summary = runner.run_until_ctrl_c().await?;

    if summary.interrupted {
        tracing::warn!(updated = summary.updated, "run interrupted before all bugs were processed");
    }
    Ok(())
}
