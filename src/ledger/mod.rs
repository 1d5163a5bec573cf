//! Evidence Ledger
//!
//! Tamper-evident chain of blocks, each committing to its evidence through
//! a Merkle root and to its predecessor through a hash link.

pub mod block;
pub mod chain;
pub mod merkle;
pub mod store;
pub mod verify;

pub use block::{Block, BlockRecord, BlockSummary, Transaction, TransactionDraft};
pub use chain::{LeafProof, Ledger};
pub use merkle::{build_proof, build_root, verify_proof, MerkleProof, Position, ProofStep};
pub use store::{LedgerStore, MemoryStore};
pub use verify::{verify_blocks, ChainIssue, ChainProblem, ChainReport};
