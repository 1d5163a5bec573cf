use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, Command};
use std::path::Path;
use tracing::{error, info, warn};

use evidence_ledger::crypto::Secp256k1Signer;
use evidence_ledger::database::Database;
use evidence_ledger::ledger::{build_root, BlockRecord, Ledger, LedgerStore, MemoryStore};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = Command::new("verify-ledger")
        .version("0.1.0")
        .about("Verify evidence ledger integrity")
        .arg(
            Arg::new("database-url")
                .short('d')
                .long("database-url")
                .value_name("URL")
                .help("Ledger database to verify")
                .default_value("sqlite://evidence-ledger.db"),
        )
        .arg(
            Arg::new("snapshot")
                .short('s')
                .long("snapshot")
                .value_name("PATH")
                .help("Verify an exported JSON snapshot instead of a database"),
        )
        .arg(
            Arg::new("public-key")
                .short('k')
                .long("public-key")
                .value_name("HEX")
                .help("Issuer public key; checks every block signature"),
        )
        .arg(
            Arg::new("export")
                .short('e')
                .long("export")
                .value_name("PATH")
                .help("Write the ledger to a JSON snapshot after verifying"),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .action(ArgAction::SetTrue)
                .help("Enable verbose output"),
        )
        .arg(
            Arg::new("quiet")
                .short('q')
                .long("quiet")
                .action(ArgAction::SetTrue)
                .help("Suppress output except errors"),
        )
        .get_matches();

    let verbose = matches.get_flag("verbose");
    let quiet = matches.get_flag("quiet");

    let level = if quiet {
        tracing::Level::ERROR
    } else if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let options = Options {
        public_key: matches.get_one::<String>("public-key").cloned(),
        export: matches.get_one::<String>("export").cloned(),
        verbose,
        quiet,
    };

    let outcome = match matches.get_one::<String>("snapshot") {
        Some(path) => {
            let ledger = Ledger::new(MemoryStore::from_records(load_snapshot(path)?));
            verify(&ledger, &options).await
        }
        None => {
            let url = matches
                .get_one::<String>("database-url")
                .ok_or_else(|| anyhow!("--database-url is required"))?;
            let database = Database::open_existing(url)
                .await
                .with_context(|| format!("Failed to open ledger database {}", url))?;
            verify(&Ledger::new(database), &options).await
        }
    };

    match outcome {
        Ok(true) => {
            if !quiet {
                println!("✓ Ledger verification completed successfully");
            }
            Ok(())
        }
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Ledger verification failed: {:#}", e);
            std::process::exit(1);
        }
    }
}

struct Options {
    public_key: Option<String>,
    export: Option<String>,
    verbose: bool,
    quiet: bool,
}

fn load_snapshot(path: &str) -> Result<Vec<BlockRecord>> {
    if !Path::new(path).exists() {
        return Err(anyhow!("Snapshot file not found: {}", path));
    }
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path))?;
    serde_json::from_str(&content).with_context(|| format!("Invalid snapshot {}", path))
}

/// Returns whether every check passed.
async fn verify<S: LedgerStore>(ledger: &Ledger<S>, options: &Options) -> Result<bool> {
    info!("Verifying hash chain");
    let report = ledger.verify_chain().await?;
    let mut passed = report.ok;

    if !options.quiet {
        println!("{}", report.summary());
        for problem in &report.problems {
            println!("  block {}: {:?} {}", problem.index, problem.issue, problem.details);
        }
    }

    info!("Checking stored leaves against Merkle roots");
    let blocks = ledger.store().blocks().await?;
    for block in &blocks {
        let leaves = ledger.store().leaves(block.index).await?;
        let root = build_root(&leaves);
        if root != block.merkle_root {
            passed = false;
            println!(
                "  block {}: stored leaves give root {}, block records {}",
                block.index,
                root.short(),
                block.merkle_root.short()
            );
        } else if options.verbose {
            println!("  block {}: {} leaves, root {}", block.index, leaves.len(), root.short());
        }
    }

    if let Some(public_key) = &options.public_key {
        info!("Checking block signatures");
        for block in &blocks {
            let valid = match &block.signature {
                Some(signature) => {
                    Secp256k1Signer::verify(&block.block_hash, signature, public_key)?
                }
                None => {
                    warn!("Block {} is unsigned", block.index);
                    false
                }
            };
            if !valid {
                passed = false;
                println!("  block {}: signature does not verify", block.index);
            }
        }
        if options.verbose && passed {
            println!("✓ All {} block signatures verified", blocks.len());
        }
    }

    if let Some(path) = &options.export {
        let records = ledger.export().await?;
        let json = serde_json::to_string_pretty(&records)?;
        std::fs::write(path, json).with_context(|| format!("Failed to write {}", path))?;
        if !options.quiet {
            println!("Exported {} blocks to {}", records.len(), path);
        }
    }

    Ok(passed)
}
