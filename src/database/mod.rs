pub mod models;
pub mod schema;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use crate::crypto::digest::Digest;
use crate::error::{LedgerError, Result};
use crate::ledger::block::{Block, BlockRecord, Transaction};
use crate::ledger::store::{check_extends_tip, LedgerStore};
use models::{db_index, BlockRow, TransactionRow};

const SELECT_TIP: &str = "SELECT idx, timestamp, previous_hash, merkle_root, block_hash, transaction_ids, signature \
     FROM blocks ORDER BY idx DESC LIMIT 1";

const SELECT_BLOCK: &str = "SELECT idx, timestamp, previous_hash, merkle_root, block_hash, transaction_ids, signature \
     FROM blocks WHERE idx = ?";

const SELECT_ALL_BLOCKS: &str = "SELECT idx, timestamp, previous_hash, merkle_root, block_hash, transaction_ids, signature \
     FROM blocks ORDER BY idx ASC";

const SELECT_RECENT_BLOCKS: &str = "SELECT idx, timestamp, previous_hash, merkle_root, block_hash, transaction_ids, signature \
     FROM blocks ORDER BY idx DESC LIMIT ?";

const SEARCH_TRANSACTIONS: &str = r#"
    SELECT tx_id, block_idx, report_id, title, uploader, metadata, report_hash
    FROM transactions
    WHERE title LIKE ?1 ESCAPE '\' OR metadata LIKE ?1 ESCAPE '\'
    ORDER BY block_idx ASC, position ASC
"#;

/// `%query%` with LIKE wildcards in `query` matched literally
fn like_pattern(query: &str) -> String {
    let mut pattern = String::with_capacity(query.len() + 2);
    pattern.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// SQLite-backed ledger store
#[derive(Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Connect to `database_url`, creating the database file if needed
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::connect(database_url, true).await
    }

    /// Connect to an existing database; a missing file is an error
    pub async fn open_existing(database_url: &str) -> Result<Self> {
        Self::connect(database_url, false).await
    }

    async fn connect(database_url: &str, create_if_missing: bool) -> Result<Self> {
        let options =
            SqliteConnectOptions::from_str(database_url)?.create_if_missing(create_if_missing);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        info!("Connected to {}", database_url);
        Ok(Database { pool })
    }

    /// Private in-memory database on a single connection, mainly for tests
    pub async fn new_in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None::<Duration>)
            .max_lifetime(None::<Duration>)
            .connect("sqlite::memory:")
            .await?;
        let db = Database { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        for statement in schema::migrations() {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        debug!("Ledger schema is up to date");
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn map_insert_error(err: sqlx::Error, index: u64) -> LedgerError {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                LedgerError::ConcurrentAppendConflict(format!(
                    "block index {} was committed by another writer",
                    index
                ))
            }
            _ => err.into(),
        }
    }
}

impl LedgerStore for Database {
    async fn tip(&self) -> Result<Option<Block>> {
        let row: Option<BlockRow> = sqlx::query_as(SELECT_TIP)
            .fetch_optional(&self.pool)
            .await?;
        row.map(BlockRow::into_block).transpose()
    }

    async fn commit(&self, record: BlockRecord) -> Result<()> {
        let index = record.block.index;
        let block_row = BlockRow::from_block(&record.block)?;

        // Dropping the transaction on any early return rolls it back.
        let mut tx = self.pool.begin().await?;

        let tip: Option<BlockRow> = sqlx::query_as(SELECT_TIP)
            .fetch_optional(&mut *tx)
            .await?;
        let tip = tip.map(BlockRow::into_block).transpose()?;
        check_extends_tip(tip.as_ref(), &record.block)?;

        sqlx::query(
            r#"
            INSERT INTO blocks (idx, timestamp, previous_hash, merkle_root, block_hash, transaction_ids, signature)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(block_row.idx)
        .bind(&block_row.timestamp)
        .bind(&block_row.previous_hash)
        .bind(&block_row.merkle_root)
        .bind(&block_row.block_hash)
        .bind(&block_row.transaction_ids)
        .bind(&block_row.signature)
        .execute(&mut *tx)
        .await
        .map_err(|e| Self::map_insert_error(e, index))?;

        for (position, transaction) in record.transactions.iter().enumerate() {
            let row = TransactionRow::from_transaction(transaction)?;
            sqlx::query(
                r#"
                INSERT INTO transactions (tx_id, block_idx, position, report_id, title, uploader, metadata, report_hash)
                VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&row.tx_id)
            .bind(row.block_idx)
            .bind(position as i64)
            .bind(&row.report_id)
            .bind(&row.title)
            .bind(&row.uploader)
            .bind(&row.metadata)
            .bind(&row.report_hash)
            .execute(&mut *tx)
            .await?;
        }

        for (position, leaf) in record.leaves.iter().enumerate() {
            sqlx::query("INSERT INTO block_leaves (block_idx, position, leaf) VALUES (?, ?, ?)")
                .bind(block_row.idx)
                .bind(position as i64)
                .bind(leaf.to_hex())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        debug!("Committed block {} to database", index);
        Ok(())
    }

    async fn block(&self, index: u64) -> Result<Option<Block>> {
        let row: Option<BlockRow> = sqlx::query_as(SELECT_BLOCK)
            .bind(db_index(index)?)
            .fetch_optional(&self.pool)
            .await?;
        row.map(BlockRow::into_block).transpose()
    }

    async fn blocks(&self) -> Result<Vec<Block>> {
        let rows: Vec<BlockRow> = sqlx::query_as(SELECT_ALL_BLOCKS)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(BlockRow::into_block).collect()
    }

    async fn recent(&self, limit: usize) -> Result<Vec<Block>> {
        let rows: Vec<BlockRow> = sqlx::query_as(SELECT_RECENT_BLOCKS)
            .bind(i64::try_from(limit).unwrap_or(i64::MAX))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(BlockRow::into_block).collect()
    }

    async fn transactions(&self, index: u64) -> Result<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(
            r#"
            SELECT tx_id, block_idx, report_id, title, uploader, metadata, report_hash
            FROM transactions
            WHERE block_idx = ?
            ORDER BY position ASC
            "#,
        )
        .bind(db_index(index)?)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }

    async fn leaves(&self, index: u64) -> Result<Vec<Digest>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT leaf FROM block_leaves WHERE block_idx = ? ORDER BY position ASC",
        )
        .bind(db_index(index)?)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|(hex,)| {
                Digest::from_hex(hex)
                    .map_err(|e| LedgerError::Storage(format!("Corrupt leaf column: {}", e)))
            })
            .collect()
    }

    async fn blocks_containing(&self, leaf: &Digest) -> Result<Vec<u64>> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            "SELECT DISTINCT block_idx FROM block_leaves WHERE leaf = ? ORDER BY block_idx ASC",
        )
        .bind(leaf.to_hex())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(idx,)| idx as u64).collect())
    }

    async fn search_transactions(&self, query: &str) -> Result<Vec<Transaction>> {
        let rows: Vec<TransactionRow> = sqlx::query_as(SEARCH_TRANSACTIONS)
            .bind(like_pattern(query))
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(TransactionRow::into_transaction).collect()
    }
}
