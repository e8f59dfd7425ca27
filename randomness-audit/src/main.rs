// Randomness Pallet Audit Tool
//
// Purpose: Check a node's randomness pallet state for internal consistency
// and obviously non-random outputs at a single block.
//
// Usage:
//   cargo run --bin randomness-audit -- --url http://127.0.0.1:9944
//   cargo run --bin randomness-audit -- --block-number 1200 --scenario deposit-solvency
//
// Exit code: 0 all scenarios passed, 1 a scenario failed, 2 the audit could not run.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Duration;

use randomness_audit::config::{DEFAULT_FETCH_TIMEOUT, DEFAULT_RPC_URL, DEFAULT_SCENARIO_TIMEOUT};
use randomness_audit::fetcher::DEFAULT_PAGE_SIZE;
use randomness_audit::provider::storage::DEFAULT_MAX_PAGES;
use randomness_audit::{AuditConfig, Auditor, RpcProvider, Scenario, VERSION};

#[derive(Parser, Debug)]
#[command(name = "randomness-audit")]
#[command(version = VERSION)]
#[command(about = "Consistency and randomness smoke tests for the randomness pallet")]
struct Args {
    /// Node HTTP JSON-RPC URL
    #[arg(short, long, env = "RPC_URL", default_value = DEFAULT_RPC_URL)]
    url: String,

    /// Block to audit (defaults to the chain head)
    #[arg(short, long, env = "BLOCK_NUMBER")]
    block_number: Option<u64>,

    /// Requests per storage page
    #[arg(long, default_value_t = DEFAULT_PAGE_SIZE)]
    page_size: u32,

    /// Maximum number of pages read from one storage map
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    max_pages: usize,

    /// Timeout for building the snapshot, in seconds
    #[arg(long, default_value_t = DEFAULT_FETCH_TIMEOUT.as_secs())]
    fetch_timeout_secs: u64,

    /// Timeout for each scenario, in seconds
    #[arg(long, default_value_t = DEFAULT_SCENARIO_TIMEOUT.as_secs())]
    scenario_timeout_secs: u64,

    /// Scenario to run, repeatable (defaults to all)
    #[arg(short, long = "scenario", value_parser = parse_scenario)]
    scenarios: Vec<Scenario>,

    /// Print the report as JSON instead of the text summary
    #[arg(long)]
    json: bool,

    /// Log filter
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    log_level: String,
}

fn parse_scenario(value: &str) -> Result<Scenario, String> {
    Scenario::from_str(value).map_err(|_| format!("unknown scenario '{}'", value))
}

impl Args {
    fn config(&self) -> AuditConfig {
        AuditConfig {
            block_number: self.block_number,
            page_size: self.page_size,
            max_pages: self.max_pages,
            fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
            scenario_timeout: Duration::from_secs(self.scenario_timeout_secs),
        }
    }
}

/// Runs the audit, `Ok(false)` when a scenario failed
async fn run(args: &Args) -> Result<bool> {
    let config = args.config();
    config.validate().context("Invalid arguments")?;

    let provider = RpcProvider::new(args.url.as_str())
        .context("Failed to create RPC client")?
        .with_max_pages(args.max_pages);
    info!("Connecting to {}", args.url);

    let mut auditor = Auditor::new(provider, config);
    if !args.scenarios.is_empty() {
        auditor = auditor.with_scenarios(args.scenarios.iter().copied());
    }

    let report = auditor.run().await.context("Audit aborted")?;
    if args.json {
        println!("{}", report.to_json().context("Failed to serialize report")?);
    } else {
        report.print();
    }
    Ok(report.success())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("Randomness Pallet Audit v{}", VERSION);

    match run(&args).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            error!("{:#}", e);
            ExitCode::from(2)
        }
    }
}
