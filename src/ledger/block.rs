//! Ledger Blocks and Transactions
//!
//! A block commits to its predecessor through `previous_hash` and to its
//! evidence through `merkle_root`. `block_hash` is the digest of the
//! canonical header `{index, timestamp, previous_hash, merkle_root,
//! transaction_ids}`.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::digest::{canonical_bytes, digest, Digest};
use crate::error::{LedgerError, Result};
use crate::report::ReportMetadata;

/// `previous_hash` of the genesis block (64 zero characters in hex).
pub const GENESIS_PREVIOUS_HASH: Digest = Digest::ZERO;

/// Index of the first block.
pub const GENESIS_INDEX: u64 = 0;

/// Timestamp precision kept by the ledger so stored values hash the same way.
pub fn block_timestamp() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Committed ledger block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub previous_hash: Digest,
    pub merkle_root: Digest,
    pub block_hash: Digest,
    pub transaction_ids: Vec<String>,
    /// Detached signature over `block_hash`, if a signer was configured.
    #[serde(default)]
    pub signature: Option<String>,
}

#[derive(Serialize)]
struct BlockHeader<'a> {
    index: u64,
    timestamp: String,
    previous_hash: &'a Digest,
    merkle_root: &'a Digest,
    transaction_ids: &'a [String],
}

impl Block {
    /// Assemble a block and compute its hash.
    pub fn new(
        index: u64,
        timestamp: DateTime<Utc>,
        previous_hash: Digest,
        merkle_root: Digest,
        transaction_ids: Vec<String>,
    ) -> Result<Self> {
        let mut block = Self {
            index,
            timestamp,
            previous_hash,
            merkle_root,
            block_hash: Digest::ZERO,
            transaction_ids,
            signature: None,
        };
        block.block_hash = block.calculate_hash()?;
        Ok(block)
    }

    /// Canonical header bytes fed into the block hash
    pub fn header_bytes(&self) -> Result<Vec<u8>> {
        canonical_bytes(&BlockHeader {
            index: self.index,
            timestamp: format_timestamp(&self.timestamp),
            previous_hash: &self.previous_hash,
            merkle_root: &self.merkle_root,
            transaction_ids: &self.transaction_ids,
        })
    }

    /// Recompute the block hash from the stored fields
    pub fn calculate_hash(&self) -> Result<Digest> {
        Ok(digest(&self.header_bytes()?))
    }

    /// Block hash the header would have with `previous_hash` replaced
    pub fn hash_with_previous(&self, previous_hash: Digest) -> Result<Digest> {
        let relinked = Block {
            previous_hash,
            signature: None,
            ..self.clone()
        };
        relinked.calculate_hash()
    }

    pub fn summary(&self) -> BlockSummary {
        BlockSummary {
            index: self.index,
            block_hash: self.block_hash,
            previous_hash: self.previous_hash,
            merkle_root: self.merkle_root,
            timestamp: self.timestamp,
            transaction_count: self.transaction_ids.len(),
        }
    }
}

/// RFC 3339 with microseconds and a `Z` suffix.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Explorer view of a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockSummary {
    pub index: u64,
    pub block_hash: Digest,
    pub previous_hash: Digest,
    pub merkle_root: Digest,
    pub timestamp: DateTime<Utc>,
    pub transaction_count: usize,
}

/// Report recorded in a block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub tx_id: String,
    pub block_index: u64,
    pub report_id: Uuid,
    pub title: String,
    pub uploader: String,
    pub metadata_json: String,
    pub report_digest: Digest,
}

/// Transaction fields known before the block index is assigned
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionDraft {
    pub report_id: Uuid,
    pub title: String,
    pub uploader: String,
    pub metadata: ReportMetadata,
    pub report_digest: Digest,
}

impl TransactionDraft {
    pub fn into_transaction(self, block_index: u64) -> Result<Transaction> {
        let metadata_json = String::from_utf8(canonical_bytes(&self.metadata)?)
            .map_err(|e| LedgerError::Canonicalization(e.to_string()))?;

        Ok(Transaction {
            tx_id: format!("tx-{}", Uuid::new_v4()),
            block_index,
            report_id: self.report_id,
            title: self.title,
            uploader: self.uploader,
            metadata_json,
            report_digest: self.report_digest,
        })
    }
}

/// Everything written by one append: the block, its transactions and the
/// leaf set its Merkle root was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    pub block: Block,
    pub transactions: Vec<Transaction>,
    pub leaves: Vec<Digest>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fixed_block() -> Block {
        let timestamp = Utc.with_ymd_and_hms(2024, 4, 2, 7, 15, 0).unwrap();
        Block::new(
            3,
            timestamp,
            digest(b"previous"),
            digest(b"root"),
            vec!["tx-1".to_string()],
        )
        .unwrap()
    }

    #[test]
    fn test_header_layout() {
        let block = fixed_block();
        let header = String::from_utf8(block.header_bytes().unwrap()).unwrap();
        assert_eq!(
            header,
            format!(
                r#"{{"index":3,"merkle_root":"{}","previous_hash":"{}","timestamp":"2024-04-02T07:15:00.000000Z","transaction_ids":["tx-1"]}}"#,
                digest(b"root"),
                digest(b"previous")
            )
        );
        assert_eq!(block.block_hash, digest(header.as_bytes()));
    }

    #[test]
    fn test_hash_covers_every_header_field() {
        let block = fixed_block();

        let mut changed = block.clone();
        changed.index += 1;
        assert_ne!(changed.calculate_hash().unwrap(), block.block_hash);

        let mut changed = block.clone();
        changed.merkle_root = digest(b"other root");
        assert_ne!(changed.calculate_hash().unwrap(), block.block_hash);

        let mut changed = block.clone();
        changed.transaction_ids.push("tx-2".to_string());
        assert_ne!(changed.calculate_hash().unwrap(), block.block_hash);

        let mut changed = block.clone();
        changed.signature = Some("abcd".to_string());
        assert_eq!(changed.calculate_hash().unwrap(), block.block_hash);
    }

    #[test]
    fn test_hash_with_previous_restores_original() {
        let block = fixed_block();
        let mut relinked = block.clone();
        relinked.previous_hash = digest(b"wrong");

        assert_ne!(relinked.calculate_hash().unwrap(), block.block_hash);
        assert_eq!(
            relinked.hash_with_previous(block.previous_hash).unwrap(),
            block.block_hash
        );
    }

    #[test]
    fn test_json_round_trip_keeps_hash() {
        let mut block = fixed_block();
        block.timestamp = block_timestamp();
        block.block_hash = block.calculate_hash().unwrap();

        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
        assert_eq!(back.calculate_hash().unwrap(), block.block_hash);
    }

    #[test]
    fn test_draft_assigns_prefixed_id() {
        let draft = TransactionDraft {
            report_id: Uuid::new_v4(),
            title: "t".to_string(),
            uploader: "u".to_string(),
            metadata: ReportMetadata {
                description: "d".to_string(),
                location: "l".to_string(),
                time: "now".to_string(),
                extra: Default::default(),
            },
            report_digest: digest(b"report"),
        };
        let tx = draft.into_transaction(7).unwrap();
        assert!(tx.tx_id.starts_with("tx-"));
        assert_eq!(tx.block_index, 7);
        assert_eq!(
            tx.metadata_json,
            r#"{"description":"d","extra":{},"location":"l","time":"now"}"#
        );
    }
}
