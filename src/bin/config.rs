//! Contract Config CLI
//!
//! View and manage contract tool configuration.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use pipeline_contracts::ContractsConfig;

#[derive(Parser)]
#[command(name = "contract-config")]
#[command(about = "View and manage contract tool configuration")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show current configuration
    Show {
        /// Config file to load (optional)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output as TOML
        #[arg(long)]
        toml: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Initialize a new config file
    Init {
        /// Output path
        #[arg(short, long, default_value = "contracts.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration
    Validate {
        /// Config file to validate
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Show { config, toml, json } => {
            let cfg = ContractsConfig::load_from(config.as_deref())?;

            if json {
                println!("{}", serde_json::to_string_pretty(&cfg)?);
            } else if toml {
                println!("{}", ::toml::to_string_pretty(&cfg)?);
            } else {
                println!("📋 Contract Tool Configuration\n");
                println!("Codec:");
                println!("  Strict decode: {}", cfg.codec.strict_decode);
                println!("  Output format: {:?}", cfg.codec.output_format);

                println!("\nCompatibility:");
                println!("  Reader version: {}", cfg.compatibility.reader_version);
                println!("  Reject incompatible: {}", cfg.compatibility.reject_incompatible);

                println!("\nExport:");
                println!("  Output dir: {:?}", cfg.export.output_dir);
                println!("  Checksums: {}", cfg.export.include_checksums);
            }
        }

        Commands::Init { output, force } => {
            if output.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", output.display());
            }
            ContractsConfig::default().save(&output)?;
            println!("✅ Created config file: {}", output.display());
        }

        Commands::Validate { config } => {
            let checked = ContractsConfig::load_from(config.as_deref())
                .map_err(anyhow::Error::from)
                .and_then(|cfg| cfg.validate().map(|_| cfg).map_err(anyhow::Error::from));
            match checked {
                Ok(cfg) => {
                    println!("✅ Configuration is valid");
                    println!("   Reader version: {}", cfg.compatibility.reader_version);
                    println!("   Strict decode: {}", cfg.codec.strict_decode);
                }
                Err(e) => {
                    eprintln!("❌ Configuration error: {:#}", e);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
