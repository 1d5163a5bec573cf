#![allow(dead_code)]

use evidence_ledger::database::Database;
use evidence_ledger::ledger::{Ledger, MemoryStore};
use evidence_ledger::report::{EvidenceItem, Report, ReportMetadata};

/// Setup an in-memory SQLite database for testing
pub async fn setup_test_db() -> Database {
    Database::new_in_memory()
        .await
        .expect("Failed to create test database")
}

pub fn memory_ledger() -> Ledger<MemoryStore> {
    Ledger::new(MemoryStore::new())
}

pub async fn sqlite_ledger() -> Ledger<Database> {
    Ledger::new(setup_test_db().await)
}

pub fn sample_metadata() -> ReportMetadata {
    ReportMetadata {
        description: "Flooding on the lower bridge".to_string(),
        location: "Riverside".to_string(),
        time: "2024-04-02T07:15:00Z".to_string(),
        ..Default::default()
    }
}

/// Report with one evidence file per entry in `contents`
pub fn sample_report(title: &str, contents: &[&[u8]]) -> Report {
    let evidence = contents
        .iter()
        .enumerate()
        .map(|(i, bytes)| {
            EvidenceItem::from_bytes(format!("file{}.bin", i), "application/octet-stream", bytes)
        })
        .collect();
    Report::new(title, "tester", sample_metadata(), evidence)
}
