//! Contract Export CLI
//!
//! Exports the contract catalog, identifier tables and topic registry.

use std::path::PathBuf;

use clap::Parser;
use pipeline_contracts::export::{export_catalog, verify_export};
use pipeline_contracts::ContractsConfig;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "contract-export")]
#[command(about = "Export the contract catalog with a manifest and checksums")]
struct Cli {
    /// Output directory (defaults to [export].output_dir)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Config file to load (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Skip checksums.sha256 regardless of config
    #[arg(long)]
    no_checksums: bool,

    /// Verify an existing export instead of writing one
    #[arg(long)]
    verify: bool,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let config = ContractsConfig::load_from(cli.config.as_deref())?;
    let output = cli.output.unwrap_or_else(|| config.export.output_dir.clone());

    if cli.verify {
        println!("🔍 Verifying export at {:?}", output);
        let mismatched = verify_export(&output)?;
        if mismatched.is_empty() {
            println!("✅ All checksums valid");
            return Ok(());
        }
        for path in &mismatched {
            println!("  ❌ {}", path);
        }
        println!("❌ {} file(s) changed since export", mismatched.len());
        std::process::exit(1);
    }

    let include_checksums = config.export.include_checksums && !cli.no_checksums;

    println!("📦 Contract Export");
    println!("  Output: {:?}", output);
    println!();

    let manifest = export_catalog(&output, include_checksums, chrono::Utc::now())?;

    println!("📊 Export Summary:");
    println!("  Contracts: {} ({} events)", manifest.stats.contracts, manifest.stats.event_contracts);
    println!("  Identifiers: {}", manifest.stats.identifiers);
    println!("  Topics: {}", manifest.stats.topics);
    println!("  Manifest checksum: {}", manifest.manifest_checksum);
    println!();
    println!("✅ Exported {} files", manifest.files.len());
    Ok(())
}
