//! Evidence Reports
//!
//! Turns an inbound evidence set into the ordered leaf list that the
//! ledger commits under a Merkle root.

pub mod evidence;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

use crate::crypto::digest::{canonical_bytes, digest, Digest};
use crate::error::Result;

pub use evidence::EvidenceItem;

/// Report metadata with a fixed schema plus free-form string extensions
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub description: String,
    pub location: String,
    pub time: String,
    #[serde(default)]
    pub extra: BTreeMap<String, String>,
}

/// A submitted evidence report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub report_id: Uuid,
    pub title: String,
    pub uploader: String,
    pub metadata: ReportMetadata,
    pub evidence: Vec<EvidenceItem>,
}

impl Report {
    pub fn new(
        title: impl Into<String>,
        uploader: impl Into<String>,
        metadata: ReportMetadata,
        evidence: Vec<EvidenceItem>,
    ) -> Self {
        Self {
            report_id: Uuid::new_v4(),
            title: title.into(),
            uploader: uploader.into(),
            metadata,
            evidence,
        }
    }

    /// Canonical bytes hashed into the report digest
    pub fn canonical_bytes(&self) -> Result<Vec<u8>> {
        canonical_bytes(self)
    }

    pub fn digest(&self) -> Result<Digest> {
        Ok(digest(&self.canonical_bytes()?))
    }

    /// Evidence digests followed by the report digest, de-duplicated
    pub fn leaf_set(&self) -> Result<LeafSet> {
        let report_digest = self.digest()?;
        Ok(LeafSet::new(
            self.evidence
                .iter()
                .map(|item| item.digest)
                .chain(std::iter::once(report_digest)),
        ))
    }
}

/// Ordered Merkle leaves of one block, free of exact duplicates
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeafSet(Vec<Digest>);

impl LeafSet {
    /// Keep the first occurrence of every digest, in input order.
    pub fn new(digests: impl IntoIterator<Item = Digest>) -> Self {
        let mut seen = HashSet::new();
        Self(digests.into_iter().filter(|d| seen.insert(*d)).collect())
    }

    pub fn as_slice(&self) -> &[Digest] {
        &self.0
    }

    pub fn into_inner(self) -> Vec<Digest> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, digest: &Digest) -> bool {
        self.0.contains(digest)
    }
}
