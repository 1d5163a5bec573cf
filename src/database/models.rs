use chrono::{DateTime, Utc};
use sqlx::FromRow;
use uuid::Uuid;

use crate::crypto::digest::Digest;
use crate::error::{LedgerError, Result};
use crate::ledger::block::{format_timestamp, Block, Transaction};

#[derive(Debug, Clone, FromRow)]
pub struct BlockRow {
    pub idx: i64,
    pub timestamp: String,
    pub previous_hash: String,
    pub merkle_root: String,
    pub block_hash: String,
    pub transaction_ids: String,
    pub signature: Option<String>,
}

#[derive(Debug, Clone, FromRow)]
pub struct TransactionRow {
    pub tx_id: String,
    pub block_idx: i64,
    pub report_id: String,
    pub title: String,
    pub uploader: String,
    pub metadata: String,
    pub report_hash: String,
}

fn corrupt(what: &str, err: impl std::fmt::Display) -> LedgerError {
    LedgerError::Storage(format!("Corrupt {} column: {}", what, err))
}

fn stored_digest(what: &str, hex: &str) -> Result<Digest> {
    Digest::from_hex(hex).map_err(|e| corrupt(what, e))
}

fn stored_index(idx: i64) -> Result<u64> {
    u64::try_from(idx).map_err(|e| corrupt("idx", e))
}

pub fn db_index(index: u64) -> Result<i64> {
    i64::try_from(index)
        .map_err(|_| LedgerError::InvalidInput(format!("Block index {} out of range", index)))
}

impl BlockRow {
    pub fn from_block(block: &Block) -> Result<Self> {
        Ok(Self {
            idx: db_index(block.index)?,
            timestamp: format_timestamp(&block.timestamp),
            previous_hash: block.previous_hash.to_hex(),
            merkle_root: block.merkle_root.to_hex(),
            block_hash: block.block_hash.to_hex(),
            transaction_ids: serde_json::to_string(&block.transaction_ids)?,
            signature: block.signature.clone(),
        })
    }

    pub fn into_block(self) -> Result<Block> {
        let timestamp = DateTime::parse_from_rfc3339(&self.timestamp)
            .map_err(|e| corrupt("timestamp", e))?
            .with_timezone(&Utc);
        let transaction_ids: Vec<String> =
            serde_json::from_str(&self.transaction_ids).map_err(|e| corrupt("transaction_ids", e))?;

        Ok(Block {
            index: stored_index(self.idx)?,
            timestamp,
            previous_hash: stored_digest("previous_hash", &self.previous_hash)?,
            merkle_root: stored_digest("merkle_root", &self.merkle_root)?,
            block_hash: stored_digest("block_hash", &self.block_hash)?,
            transaction_ids,
            signature: self.signature,
        })
    }
}

impl TransactionRow {
    pub fn from_transaction(tx: &Transaction) -> Result<Self> {
        Ok(Self {
            tx_id: tx.tx_id.clone(),
            block_idx: db_index(tx.block_index)?,
            report_id: tx.report_id.to_string(),
            title: tx.title.clone(),
            uploader: tx.uploader.clone(),
            metadata: tx.metadata_json.clone(),
            report_hash: tx.report_digest.to_hex(),
        })
    }

    pub fn into_transaction(self) -> Result<Transaction> {
        Ok(Transaction {
            tx_id: self.tx_id,
            block_index: stored_index(self.block_idx)?,
            report_id: Uuid::parse_str(&self.report_id).map_err(|e| corrupt("report_id", e))?,
            title: self.title,
            uploader: self.uploader,
            metadata_json: self.metadata,
            report_digest: stored_digest("report_hash", &self.report_hash)?,
        })
    }
}
