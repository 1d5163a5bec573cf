// Database schema definitions for the ledger tables.
// Statements are idempotent and run in order at startup.

pub const CREATE_BLOCKS: &str = r#"
CREATE TABLE IF NOT EXISTS blocks (
    idx INTEGER PRIMARY KEY,
    timestamp TEXT NOT NULL,
    previous_hash TEXT NOT NULL,
    merkle_root TEXT NOT NULL,
    block_hash TEXT NOT NULL,
    transaction_ids TEXT NOT NULL,
    signature TEXT
)
"#;

pub const CREATE_TRANSACTIONS: &str = r#"
CREATE TABLE IF NOT EXISTS transactions (
    tx_id TEXT PRIMARY KEY,
    block_idx INTEGER NOT NULL REFERENCES blocks(idx),
    position INTEGER NOT NULL,
    report_id TEXT NOT NULL,
    title TEXT NOT NULL,
    uploader TEXT NOT NULL,
    metadata TEXT NOT NULL,
    report_hash TEXT NOT NULL
)
"#;

pub const CREATE_BLOCK_LEAVES: &str = r#"
CREATE TABLE IF NOT EXISTS block_leaves (
    block_idx INTEGER NOT NULL REFERENCES blocks(idx),
    position INTEGER NOT NULL,
    leaf TEXT NOT NULL,
    PRIMARY KEY (block_idx, position)
)
"#;

pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_transactions_block ON transactions(block_idx)",
    "CREATE INDEX IF NOT EXISTS idx_block_leaves_leaf ON block_leaves(leaf)",
];

pub fn migrations() -> impl Iterator<Item = &'static str> {
    [CREATE_BLOCKS, CREATE_TRANSACTIONS, CREATE_BLOCK_LEAVES]
        .into_iter()
        .chain(CREATE_INDEXES.iter().copied())
}
