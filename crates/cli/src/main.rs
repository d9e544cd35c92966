//! Seki - Solidity Reentrancy Auditor
//!
//! Single-purpose CLI: point it at a local `.sol` file or a `0x`-prefixed
//! contract address (fetched from Etherscan, `ETHERSCAN_API_KEY` required)
//! and it reports reentrancy findings grouped by file, contract, and
//! function. Exits 0 on a successful analysis regardless of findings;
//! non-zero only when acquisition or analysis itself fails.

use anyhow::{bail, Context, Result};
use clap::Parser;
use seki_scanners::{AnalysisContext, ScannerConfig, ScannerRegistry, ScanningEngine};

mod etherscan;
mod output;

#[derive(Parser)]
#[command(name = "seki")]
#[command(about = "Reentrancy auditing for Solidity contracts")]
#[command(version)]
struct Cli {
    /// Path to a .sol file, or a 0x-prefixed contract address
    input: String,

    /// Emit the report as JSON instead of the grouped text view
    #[arg(long)]
    json: bool,

    /// Enable verbose diagnostics
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let source = acquire_source(&cli.input)?;

    let config = ScannerConfig::default();
    let context = AnalysisContext::new(config.clone())
        .with_source(source)
        .with_source_path(&cli.input);
    let engine =
        ScanningEngine::new(config).with_scanners(ScannerRegistry::with_defaults().enabled());

    let report = engine.run(&context)?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        output::render(&report, &cli.input);
    }

    Ok(())
}

fn acquire_source(input: &str) -> Result<String> {
    if input.ends_with(".sol") {
        return std::fs::read_to_string(input).with_context(|| format!("cannot read {input}"));
    }
    if input.starts_with("0x") {
        let runtime = tokio::runtime::Runtime::new()?;
        return runtime.block_on(etherscan::fetch_verified_source(input));
    }
    bail!("input must be a .sol path or a 0x-prefixed contract address");
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}
