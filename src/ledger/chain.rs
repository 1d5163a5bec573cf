//! Evidence Ledger
//!
//! Append-only chain of blocks over a [`LedgerStore`]. Appends are
//! serialized by a single-writer lock; reads go straight to the store since
//! committed blocks never change.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::crypto::digest::Digest;
use crate::crypto::signatures::BlockSigner;
use crate::error::{LedgerError, Result};
use crate::ledger::block::{
    block_timestamp, Block, BlockRecord, BlockSummary, Transaction, TransactionDraft,
    GENESIS_INDEX, GENESIS_PREVIOUS_HASH,
};
use crate::ledger::merkle::{build_proof, build_root, verify_proof, MerkleProof};
use crate::ledger::store::LedgerStore;
use crate::report::{LeafSet, Report};

/// Proof that a leaf is committed in a specific block
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafProof {
    pub block_index: u64,
    pub leaf: Digest,
    pub merkle_root: Digest,
    pub proof: MerkleProof,
}

impl LeafProof {
    /// Check the proof on its own, without access to the ledger
    pub fn verify(&self) -> bool {
        verify_proof(&self.leaf, &self.proof, &self.merkle_root)
    }
}

pub struct Ledger<S> {
    store: S,
    append_lock: Mutex<()>,
    signer: Option<Arc<dyn BlockSigner>>,
}

impl<S: LedgerStore> Ledger<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            append_lock: Mutex::new(()),
            signer: None,
        }
    }

    /// Sign every new block hash with `signer`
    pub fn with_signer(mut self, signer: Arc<dyn BlockSigner>) -> Self {
        self.signer = Some(signer);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Commit `leaf_set` and its transaction as the next block.
    ///
    /// The tip is read and the new block committed under the append lock, so
    /// two appends never claim the same index. On any error nothing is
    /// written.
    pub async fn append(&self, leaf_set: LeafSet, draft: TransactionDraft) -> Result<Block> {
        let merkle_root = build_root(leaf_set.as_slice());

        let _guard = self.append_lock.lock().await;

        let (index, previous_hash) = match self.store.tip().await? {
            Some(tip) => (tip.index + 1, tip.block_hash),
            None => (GENESIS_INDEX, GENESIS_PREVIOUS_HASH),
        };

        let transaction = draft.into_transaction(index)?;
        let mut block = Block::new(
            index,
            block_timestamp(),
            previous_hash,
            merkle_root,
            vec![transaction.tx_id.clone()],
        )?;

        if let Some(signer) = &self.signer {
            block.signature = Some(signer.sign(&block.block_hash)?);
        }

        self.store
            .commit(BlockRecord {
                block: block.clone(),
                transactions: vec![transaction],
                leaves: leaf_set.into_inner(),
            })
            .await?;

        info!(
            "Appended block {} ({}), merkle root {}",
            block.index,
            block.block_hash.short(),
            block.merkle_root.short()
        );
        Ok(block)
    }

    /// Bundle `report` into its leaf set and append it.
    pub async fn submit_report(&self, report: &Report) -> Result<Block> {
        let leaf_set = report.leaf_set()?;
        let report_digest = report.digest()?;
        debug!(
            "Report {} bundled into {} leaves",
            report.report_id,
            leaf_set.len()
        );

        let draft = TransactionDraft {
            report_id: report.report_id,
            title: report.title.clone(),
            uploader: report.uploader.clone(),
            metadata: report.metadata.clone(),
            report_digest,
        };
        self.append(leaf_set, draft).await
    }

    pub async fn get_block(&self, index: u64) -> Result<Block> {
        self.store
            .block(index)
            .await?
            .ok_or_else(|| LedgerError::block_not_found(index))
    }

    /// Summaries of the newest `limit` blocks, most recent first
    pub async fn list_recent(&self, limit: usize) -> Result<Vec<BlockSummary>> {
        Ok(self
            .store
            .recent(limit)
            .await?
            .iter()
            .map(Block::summary)
            .collect())
    }

    pub async fn transactions(&self, index: u64) -> Result<Vec<Transaction>> {
        self.get_block(index).await?;
        self.store.transactions(index).await
    }

    /// Check `proof` for `leaf` against the stored Merkle root of block `index`.
    ///
    /// A missing block or a proof that does not lead to the root yields
    /// `false`; only storage failures are errors.
    pub async fn verify_leaf_against_block(
        &self,
        index: u64,
        leaf: &Digest,
        proof: &MerkleProof,
    ) -> Result<bool> {
        match self.store.block(index).await? {
            Some(block) => Ok(verify_proof(leaf, proof, &block.merkle_root)),
            None => {
                debug!("Proof check against missing block {}", index);
                Ok(false)
            }
        }
    }

    /// Regenerate the Merkle proof of `leaf` from the stored leaf set of block `index`.
    pub async fn prove_leaf(&self, index: u64, leaf: &Digest) -> Result<LeafProof> {
        let block = self.get_block(index).await?;
        let leaves = self.store.leaves(index).await?;
        let proof = build_proof(&leaves, leaf)?;

        let leaf_proof = LeafProof {
            block_index: index,
            leaf: *leaf,
            merkle_root: block.merkle_root,
            proof,
        };
        if !leaf_proof.verify() {
            warn!(
                "Stored leaves of block {} no longer match its merkle root",
                index
            );
            return Err(LedgerError::IntegrityViolation(format!(
                "leaf set of block {} does not reproduce merkle root {}",
                index, block.merkle_root
            )));
        }
        Ok(leaf_proof)
    }

    /// Every block committing to `leaf`, each with its proof
    pub async fn locate_evidence(&self, leaf: &Digest) -> Result<Vec<LeafProof>> {
        let mut found = Vec::new();
        for index in self.store.blocks_containing(leaf).await? {
            found.push(self.prove_leaf(index, leaf).await?);
        }
        Ok(found)
    }

    /// Reports whose title or metadata mentions `query`
    pub async fn search(&self, query: &str) -> Result<Vec<Transaction>> {
        let query = query.trim();
        let found = self.store.search_transactions(query).await?;
        debug!("Search for {:?} matched {} transactions", query, found.len());
        Ok(found)
    }

    /// Full contents of the ledger, for offline re-verification
    pub async fn export(&self) -> Result<Vec<BlockRecord>> {
        let mut records = Vec::new();
        for block in self.store.blocks().await? {
            let transactions = self.store.transactions(block.index).await?;
            let leaves = self.store.leaves(block.index).await?;
            records.push(BlockRecord {
                block,
                transactions,
                leaves,
            });
        }
        Ok(records)
    }
}
