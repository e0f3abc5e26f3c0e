//! Contract Validator CLI
//!
//! Validates payload files against contracts and checks version compatibility.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pipeline_contracts::codec::{self, WireFormat};
use pipeline_contracts::config::OutputFormat;
use pipeline_contracts::contracts::checks::{CheckResult, CheckStatus};
use pipeline_contracts::registry::{self, ContractDescriptor};
use pipeline_contracts::{is_compatible, Checksum, ContractsConfig, DecodeMode, Decoder};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

#[derive(Parser)]
#[command(name = "contract-validator")]
#[command(about = "Validate contract payloads and check schema compatibility")]
struct Cli {
    /// Config file to load (optional)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate payload files (or every .json/.yaml under a directory)
    Validate {
        /// Contract name, e.g. CheckResult
        contract: String,
        path: PathBuf,
        /// Reject unknown fields even where the contract allows them
        #[arg(long)]
        strict: bool,
    },

    /// Check whether a reader can interpret a payload version
    Compat {
        /// Version on the wire
        wire: String,
        /// Version the reader expects
        reader: String,
    },

    /// Print the canonical encoding of a payload
    Canonical {
        contract: String,
        file: PathBuf,
        /// Emit YAML instead of JSON
        #[arg(long)]
        yaml: bool,
    },

    /// Print the SHA256 of a payload's canonical encoding
    Checksum { contract: String, file: PathBuf },

    /// Diff the canonical encodings of two payloads
    Diff {
        contract: String,
        old: PathBuf,
        new: PathBuf,
    },

    /// List catalogued contracts
    List,
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

    match cli.command {
        Commands::Validate {
            contract,
            path,
            strict,
        } => {
            let descriptor = find_contract(&contract)?;
            let mut decoder = config.decoder()?;
            if strict {
                decoder = decoder.with_mode(DecodeMode::Strict);
            }

            let files = payload_files(&path)?;
            if files.is_empty() {
                bail!("no .json or .yaml files under {}", path.display());
            }

            println!("🔍 Validating {} file(s) as {}", files.len(), descriptor.name);
            if decoder.mode() == DecodeMode::Strict {
                println!("  (strict mode enabled)");
            }
            println!();

            let reports = check_files(descriptor, &decoder, &files);
            let failures = reports.iter().filter(|r| !r.passed()).count();
            for (file, report) in files.iter().zip(&reports) {
                match report {
                    FileReport::Checked(result) if result.status == CheckStatus::Pass => {
                        println!("  ✅ {}", file.display());
                    }
                    FileReport::Checked(result) => {
                        println!("  ❌ {} [{}]", file.display(), result.check_id);
                        if let Some(message) = &result.message {
                            println!("     └─ {}", message);
                        }
                    }
                    FileReport::Unreadable(e) => {
                        println!("  ❌ {} [unreadable]", file.display());
                        println!("     └─ {:#}", e);
                    }
                }
            }

            println!();
            if failures > 0 {
                println!("❌ {} of {} file(s) failed", failures, files.len());
                std::process::exit(1);
            }
            println!("✅ All payloads conform to {}", descriptor.name);
            Ok(())
        }

        Commands::Compat { wire, reader } => {
            if is_compatible(&wire, &reader)? {
                println!("✅ {} can be read as {}", wire, reader);
                Ok(())
            } else {
                println!("❌ {} is on another major line than {}", wire, reader);
                std::process::exit(1);
            }
        }

        Commands::Canonical {
            contract,
            file,
            yaml,
        } => {
            let canonical = check_file(&config, &contract, &file)?;
            if yaml {
                print!("{}", serde_yaml::to_string(&canonical)?);
            } else if config.codec.output_format == OutputFormat::Compact {
                println!("{}", serde_json::to_string(&canonical)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&canonical)?);
            }
            Ok(())
        }

        Commands::Checksum { contract, file } => {
            let canonical = check_file(&config, &contract, &file)?;
            println!("{}  {}", Checksum::from_json(&canonical)?, file.display());
            Ok(())
        }

        Commands::Diff { contract, old, new } => {
            let old_value = check_file(&config, &contract, &old)?;
            let new_value = check_file(&config, &contract, &new)?;
            let diff = codec::diff_values(&old_value, &new_value)?;
            if diff.is_empty() {
                println!("✅ Canonical encodings are identical");
            } else {
                print!("{}", diff);
            }
            Ok(())
        }

        Commands::List => {
            println!("📋 {} contracts\n", registry::contracts().len());
            for descriptor in registry::contracts() {
                let policy = descriptor.policy.to_string();
                let route = descriptor
                    .event_type
                    .and_then(|event_type| registry::topic_for(event_type).map(|topic| (event_type, topic)));
                match route {
                    Some((event_type, topic)) => println!(
                        "  {:<24} {:<6} {} → {}",
                        descriptor.name, policy, event_type, topic
                    ),
                    None => println!("  {:<24} {}", descriptor.name, policy),
                }
            }
            Ok(())
        }
    }
}

/// Outcome for one file of a batch
enum FileReport {
    Checked(CheckResult),
    Unreadable(anyhow::Error),
}

impl FileReport {
    fn passed(&self) -> bool {
        matches!(self, FileReport::Checked(result) if result.status == CheckStatus::Pass)
    }
}

/// Check every file; one that cannot be read or parsed does not stop the batch
fn check_files(descriptor: &ContractDescriptor, decoder: &Decoder, files: &[PathBuf]) -> Vec<FileReport> {
    files
        .iter()
        .map(|file| match read_payload(file) {
            Ok(payload) => FileReport::Checked(descriptor.check_payload(decoder, payload)),
            Err(e) => FileReport::Unreadable(e),
        })
        .collect()
}

fn find_contract(name: &str) -> anyhow::Result<&'static ContractDescriptor> {
    match registry::lookup(name) {
        Ok(descriptor) => Ok(descriptor),
        Err(e) => {
            let suggestions = registry::suggest(name, 3);
            if suggestions.is_empty() {
                Err(e.into())
            } else {
                bail!("{} (did you mean: {}?)", e, suggestions.join(", "))
            }
        }
    }
}

fn check_file(config: &ContractsConfig, contract: &str, file: &Path) -> anyhow::Result<serde_json::Value> {
    let descriptor = find_contract(contract)?;
    let payload = read_payload(file)?;
    descriptor
        .check(&config.decoder()?, payload)
        .with_context(|| format!("{} is not a valid {}", file.display(), descriptor.name))
}

fn wire_format(path: &Path) -> Option<WireFormat> {
    path.extension()
        .and_then(|ext| ext.to_str())
        .and_then(WireFormat::from_extension)
}

fn read_payload(path: &Path) -> anyhow::Result<serde_json::Value> {
    let format = wire_format(path).unwrap_or(WireFormat::Json);
    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    codec::parse_value(&text, format).with_context(|| format!("parsing {}", path.display()))
}

fn payload_files(path: &Path) -> anyhow::Result<Vec<PathBuf>> {
    if path.is_file() {
        return Ok(vec![path.to_path_buf()]);
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(path).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && wire_format(entry.path()).is_some() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}
