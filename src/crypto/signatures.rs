use rand::rngs::OsRng;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::crypto::digest::Digest;
use crate::error::LedgerError;

/// Detached signer for committed block hashes.
///
/// The ledger stores whatever string the signer returns next to the block
/// and never interprets it.
pub trait BlockSigner: Send + Sync {
    fn sign(&self, block_hash: &Digest) -> Result<String, LedgerError>;
}

/// ECDSA over secp256k1, signing the raw 32-byte block hash.
pub struct Secp256k1Signer {
    secp: Secp256k1<secp256k1::All>,
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Secp256k1Signer {
    pub fn new(secret_key: SecretKey) -> Self {
        let secp = Secp256k1::new();
        let public_key = PublicKey::from_secret_key(&secp, &secret_key);
        Self {
            secp,
            secret_key,
            public_key,
        }
    }

    /// Generate a new random issuer key
    pub fn generate() -> Self {
        Self::new(SecretKey::new(&mut OsRng))
    }

    /// Load a hex-encoded secret key from disk
    pub fn load(path: &Path) -> Result<Self, LedgerError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            LedgerError::Config(format!("Failed to read signing key {:?}: {}", path, e))
        })?;
        let bytes = hex::decode(contents.trim())
            .map_err(|e| LedgerError::Signing(format!("Invalid signing key hex: {}", e)))?;
        let secret_key = SecretKey::from_slice(&bytes)
            .map_err(|e| LedgerError::Signing(format!("Invalid signing key: {}", e)))?;

        info!("Loaded signing key from {:?}", path);
        Ok(Self::new(secret_key))
    }

    /// Write the secret key as hex, creating parent directories as needed
    pub fn save(&self, path: &Path) -> Result<(), LedgerError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, hex::encode(self.secret_key.secret_bytes()))?;
        Ok(())
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Check a compact hex signature against a block hash and public key
    pub fn verify(
        block_hash: &Digest,
        signature_hex: &str,
        public_key_hex: &str,
    ) -> Result<bool, LedgerError> {
        let secp = Secp256k1::verification_only();
        let message = Message::from_digest_slice(block_hash.as_bytes())
            .map_err(|e| LedgerError::Signing(format!("Invalid message hash: {}", e)))?;

        let signature_bytes = hex::decode(signature_hex)
            .map_err(|e| LedgerError::Signing(format!("Invalid signature hex: {}", e)))?;
        let signature = Signature::from_compact(&signature_bytes)
            .map_err(|e| LedgerError::Signing(format!("Invalid signature format: {}", e)))?;

        let public_key_bytes = hex::decode(public_key_hex)
            .map_err(|e| LedgerError::Signing(format!("Invalid public key hex: {}", e)))?;
        let public_key = PublicKey::from_slice(&public_key_bytes)
            .map_err(|e| LedgerError::Signing(format!("Invalid public key format: {}", e)))?;

        Ok(secp.verify_ecdsa(&message, &signature, &public_key).is_ok())
    }
}

impl BlockSigner for Secp256k1Signer {
    fn sign(&self, block_hash: &Digest) -> Result<String, LedgerError> {
        let message = Message::from_digest_slice(block_hash.as_bytes())
            .map_err(|e| LedgerError::Signing(format!("Invalid message hash: {}", e)))?;
        let signature = self.secp.sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(signature.serialize_compact()))
    }
}
