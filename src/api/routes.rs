use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use tracing::{debug, info};
use uuid::Uuid;

use crate::api::{ApiError, AppState};
use crate::crypto::digest::{digest, Digest};
use crate::error::LedgerError;
use crate::ledger::{
    Block, BlockSummary, ChainReport, LeafProof, LedgerStore, MerkleProof, Transaction,
};
use crate::report::{EvidenceItem, Report, ReportMetadata};

const MAX_EXPLORER_LIMIT: usize = 500;

#[derive(Debug, Deserialize)]
pub struct UploadedFile {
    pub filename: String,
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    pub content_base64: String,
}

fn default_mime_type() -> String {
    "application/octet-stream".to_string()
}

#[derive(Debug, Deserialize)]
pub struct SubmitReportRequest {
    pub title: String,
    #[serde(default)]
    pub uploader: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub time: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
    pub files: Vec<UploadedFile>,
}

#[derive(Debug, Serialize)]
pub struct SubmitReportResponse {
    pub message: String,
    pub report_id: Uuid,
    pub report_digest: Digest,
    pub evidence: Vec<EvidenceItem>,
    pub block: Block,
}

fn decode_content(content_base64: &str) -> Result<Vec<u8>, LedgerError> {
    STANDARD
        .decode(content_base64.trim())
        .map_err(|e| LedgerError::InvalidInput(format!("Invalid base64 content: {}", e)))
}

/// POST /api/report
pub async fn submit_report<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Json(payload): Json<SubmitReportRequest>,
) -> Result<(StatusCode, Json<SubmitReportResponse>), ApiError> {
    if payload.title.trim().is_empty() || payload.files.is_empty() {
        return Err(LedgerError::InvalidInput(
            "Title and at least one file are required".to_string(),
        )
        .into());
    }

    let mut evidence = Vec::with_capacity(payload.files.len());
    for file in &payload.files {
        let bytes = decode_content(&file.content_base64)?;
        evidence.push(EvidenceItem::from_bytes(&file.filename, &file.mime_type, &bytes));
    }

    let report = Report::new(
        payload.title,
        payload.uploader.unwrap_or_else(|| "anonymous".to_string()),
        ReportMetadata {
            description: payload.description,
            location: payload.location,
            time: payload.time,
            extra: payload.extra,
        },
        evidence,
    );
    let report_digest = report.digest()?;
    let block = state.ledger.submit_report(&report).await?;

    info!("Report {} recorded in block {}", report.report_id, block.index);
    Ok((
        StatusCode::CREATED,
        Json(SubmitReportResponse {
            message: "Report created and added to the ledger".to_string(),
            report_id: report.report_id,
            report_digest,
            evidence: report.evidence,
            block,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct ExplorerQuery {
    pub limit: Option<usize>,
}

/// GET /api/explorer
pub async fn explorer<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<ExplorerQuery>,
) -> Result<Json<Vec<BlockSummary>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(state.config.explorer_limit)
        .min(MAX_EXPLORER_LIMIT);
    Ok(Json(state.ledger.list_recent(limit).await?))
}

#[derive(Debug, Serialize)]
pub struct BlockDetails {
    pub block: Block,
    pub transactions: Vec<Transaction>,
}

/// GET /api/block/:index
pub async fn get_block<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(index): Path<u64>,
) -> Result<Json<BlockDetails>, ApiError> {
    let block = state.ledger.get_block(index).await?;
    let transactions = state.ledger.transactions(index).await?;
    Ok(Json(BlockDetails { block, transactions }))
}

#[derive(Debug, Deserialize)]
pub struct ProofQuery {
    pub leaf: String,
}

/// GET /api/block/:index/proof?leaf=<hex>
pub async fn leaf_proof<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(index): Path<u64>,
    Query(query): Query<ProofQuery>,
) -> Result<Json<LeafProof>, ApiError> {
    let leaf = Digest::from_hex(&query.leaf)?;
    Ok(Json(state.ledger.prove_leaf(index, &leaf).await?))
}

#[derive(Debug, Serialize)]
pub struct ProofCheck {
    pub valid: bool,
}

/// POST /api/block/:index/verify-proof
///
/// Accepts `{"leaf": <hex>, "proof": {"steps": [...]}}`. A body that does
/// not parse as a leaf and proof is reported as invalid, not as an error.
pub async fn verify_leaf<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Path(index): Path<u64>,
    Json(body): Json<Value>,
) -> Result<Json<ProofCheck>, ApiError> {
    let leaf = body
        .get("leaf")
        .and_then(Value::as_str)
        .and_then(|s| Digest::from_hex(s).ok());
    let proof = body
        .get("proof")
        .cloned()
        .and_then(|p| serde_json::from_value::<MerkleProof>(p).ok());

    let valid = match (leaf, proof) {
        (Some(leaf), Some(proof)) => {
            state
                .ledger
                .verify_leaf_against_block(index, &leaf, &proof)
                .await?
        }
        _ => {
            debug!("Malformed proof submitted for block {}", index);
            false
        }
    };
    Ok(Json(ProofCheck { valid }))
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    pub q: String,
}

/// GET /api/search?q=<text>
pub async fn search<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Vec<Transaction>>, ApiError> {
    Ok(Json(state.ledger.search(&query.q).await?))
}

#[derive(Debug, Deserialize)]
pub struct VerifyFileRequest {
    pub content_base64: String,
}

#[derive(Debug, Serialize)]
pub struct VerifyFileResponse {
    pub verified: bool,
    pub message: String,
    pub digest: Digest,
    pub locations: Vec<LeafProof>,
}

/// POST /api/verify
pub async fn verify_file<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
    Json(payload): Json<VerifyFileRequest>,
) -> Result<Json<VerifyFileResponse>, ApiError> {
    let bytes = decode_content(&payload.content_base64)?;
    let file_digest = digest(&bytes);
    let locations = state.ledger.locate_evidence(&file_digest).await?;

    let verified = !locations.is_empty();
    let message = if verified {
        "File is recorded on the ledger".to_string()
    } else {
        "File not found on the ledger".to_string()
    };

    Ok(Json(VerifyFileResponse {
        verified,
        message,
        digest: file_digest,
        locations,
    }))
}

/// GET /api/chain/verify
pub async fn verify_chain<S: LedgerStore + 'static>(
    State(state): State<AppState<S>>,
) -> Result<Json<ChainReport>, ApiError> {
    Ok(Json(state.ledger.verify_chain().await?))
}

/// GET /api/health
pub async fn health() -> Json<Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "evidence-ledger",
        "timestamp": chrono::Utc::now()
    }))
}
