//! Issuer key tool
//!
//! Generates the secp256k1 key used to sign block hashes and prints the
//! public half for verifiers.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use evidence_ledger::crypto::Secp256k1Signer;

#[derive(Parser)]
#[command(name = "key-manager")]
#[command(about = "Evidence ledger issuer key tool")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new issuer key
    Generate {
        /// Where to write the hex-encoded secret key
        #[arg(short, long)]
        output: PathBuf,

        /// Overwrite an existing key file
        #[arg(long)]
        force: bool,
    },

    /// Print the public key for an existing secret key file
    ShowPublic {
        /// Path to the hex-encoded secret key
        #[arg(short, long)]
        key: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate { output, force } => {
            if output.exists() && !force {
                anyhow::bail!(
                    "{} already exists, pass --force to overwrite it",
                    output.display()
                );
            }
            let signer = Secp256k1Signer::generate();
            signer.save(&output)?;
            println!("Generated issuer key at {}", output.display());
            println!("Public key: {}", signer.public_key_hex());
        }
        Commands::ShowPublic { key } => {
            let signer = Secp256k1Signer::load(&key)?;
            println!("{}", signer.public_key_hex());
        }
    }

    Ok(())
}
