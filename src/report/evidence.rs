use serde::{Deserialize, Serialize};
use std::io::Read;

use crate::crypto::digest::{digest, digest_reader, Digest};

/// One uploaded file of a report
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceItem {
    pub filename: String,
    pub digest: Digest,
    pub mime_type: String,
    pub size_bytes: u64,
}

impl EvidenceItem {
    /// Hash a file already held in memory
    pub fn from_bytes(filename: impl Into<String>, mime_type: impl Into<String>, bytes: &[u8]) -> Self {
        Self {
            filename: filename.into(),
            digest: digest(bytes),
            mime_type: mime_type.into(),
            size_bytes: bytes.len() as u64,
        }
    }

    /// Hash a file from any byte stream, counting its size on the way
    pub fn from_reader<R: Read>(
        filename: impl Into<String>,
        mime_type: impl Into<String>,
        reader: R,
    ) -> std::io::Result<Self> {
        let mut counter = CountingReader { inner: reader, count: 0 };
        let digest = digest_reader(&mut counter)?;
        Ok(Self {
            filename: filename.into(),
            digest,
            mime_type: mime_type.into(),
            size_bytes: counter.count,
        })
    }
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}
