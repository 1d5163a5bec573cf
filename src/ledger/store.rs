//! Ledger Persistence
//!
//! Storage contract used by the ledger plus an in-memory implementation.
//! A store only has to offer an ordered-by-index scan and an atomic commit
//! of one [`BlockRecord`].

use std::future::Future;
use tokio::sync::RwLock;
use tracing::debug;

use crate::crypto::digest::Digest;
use crate::error::{LedgerError, Result};
use crate::ledger::block::{Block, BlockRecord, Transaction, GENESIS_INDEX, GENESIS_PREVIOUS_HASH};

/// Durable home of committed blocks.
///
/// `commit` must write the block, its transactions and its leaves all or
/// nothing, and must refuse a record that does not extend the current tip
/// with [`LedgerError::ConcurrentAppendConflict`].
pub trait LedgerStore: Send + Sync {
    /// Last committed block, if any
    fn tip(&self) -> impl Future<Output = Result<Option<Block>>> + Send;

    fn commit(&self, record: BlockRecord) -> impl Future<Output = Result<()>> + Send;

    fn block(&self, index: u64) -> impl Future<Output = Result<Option<Block>>> + Send;

    /// Every block in ascending index order
    fn blocks(&self) -> impl Future<Output = Result<Vec<Block>>> + Send;

    /// At most `limit` blocks, highest index first
    fn recent(&self, limit: usize) -> impl Future<Output = Result<Vec<Block>>> + Send;

    fn transactions(&self, index: u64) -> impl Future<Output = Result<Vec<Transaction>>> + Send;

    fn leaves(&self, index: u64) -> impl Future<Output = Result<Vec<Digest>>> + Send;

    /// Indices of the blocks whose leaf set contains `leaf`, ascending
    fn blocks_containing(&self, leaf: &Digest) -> impl Future<Output = Result<Vec<u64>>> + Send;

    /// Transactions whose title or metadata contains `query`, ignoring
    /// ASCII case, in block order
    fn search_transactions(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Transaction>>> + Send;
}

/// Check that `block` may follow `tip`.
pub fn check_extends_tip(tip: Option<&Block>, block: &Block) -> Result<()> {
    let (expected_index, expected_previous) = match tip {
        Some(tip) => (tip.index + 1, tip.block_hash),
        None => (GENESIS_INDEX, GENESIS_PREVIOUS_HASH),
    };

    if block.index != expected_index {
        return Err(LedgerError::index_conflict(expected_index, block.index));
    }
    if block.previous_hash != expected_previous {
        return Err(LedgerError::ConcurrentAppendConflict(format!(
            "block {} links to {} but the tip hash is {}",
            block.index, block.previous_hash, expected_previous
        )));
    }
    Ok(())
}

/// In-memory store, also used to re-verify exported snapshots
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Vec<BlockRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load records as-is, without checking linkage.
    ///
    /// Records are ordered by block index; verification is left to
    /// [`crate::ledger::Ledger::verify_chain`].
    pub fn from_records(mut records: Vec<BlockRecord>) -> Self {
        records.sort_by_key(|r| r.block.index);
        Self {
            records: RwLock::new(records),
        }
    }

    /// Copy of every committed record
    pub async fn records(&self) -> Vec<BlockRecord> {
        self.records.read().await.clone()
    }

    fn find(records: &[BlockRecord], index: u64) -> Option<&BlockRecord> {
        records
            .binary_search_by_key(&index, |r| r.block.index)
            .ok()
            .map(|pos| &records[pos])
    }
}

impl LedgerStore for MemoryStore {
    async fn tip(&self) -> Result<Option<Block>> {
        Ok(self.records.read().await.last().map(|r| r.block.clone()))
    }

    async fn commit(&self, record: BlockRecord) -> Result<()> {
        let mut records = self.records.write().await;
        check_extends_tip(records.last().map(|r| &r.block), &record.block)?;

        debug!("Committing block {} to memory store", record.block.index);
        records.push(record);
        Ok(())
    }

    async fn block(&self, index: u64) -> Result<Option<Block>> {
        let records = self.records.read().await;
        Ok(Self::find(&records, index).map(|r| r.block.clone()))
    }

    async fn blocks(&self) -> Result<Vec<Block>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .map(|r| r.block.clone())
            .collect())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Block>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .rev()
            .take(limit)
            .map(|r| r.block.clone())
            .collect())
    }

    async fn transactions(&self, index: u64) -> Result<Vec<Transaction>> {
        let records = self.records.read().await;
        Ok(Self::find(&records, index)
            .map(|r| r.transactions.clone())
            .unwrap_or_default())
    }

    async fn leaves(&self, index: u64) -> Result<Vec<Digest>> {
        let records = self.records.read().await;
        Ok(Self::find(&records, index)
            .map(|r| r.leaves.clone())
            .unwrap_or_default())
    }

    async fn blocks_containing(&self, leaf: &Digest) -> Result<Vec<u64>> {
        Ok(self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.leaves.contains(leaf))
            .map(|r| r.block.index)
            .collect())
    }

    async fn search_transactions(&self, query: &str) -> Result<Vec<Transaction>> {
        let needle = query.to_ascii_lowercase();
        Ok(self
            .records
            .read()
            .await
            .iter()
            .flat_map(|r| r.transactions.iter())
            .filter(|tx| {
                tx.title.to_ascii_lowercase().contains(&needle)
                    || tx.metadata_json.to_ascii_lowercase().contains(&needle)
            })
            .cloned()
            .collect())
    }
}
