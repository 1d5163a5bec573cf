//! Content Digests
//!
//! SHA-256 digests over raw bytes, byte streams and canonicalized records.
//! Every record that is hashed anywhere in the ledger (reports, block
//! headers) goes through [`canonical_bytes`], so the write path and any
//! later re-verification see identical input bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest as _, Sha256};
use std::fmt;
use std::io::Read;
use std::str::FromStr;

use crate::error::{LedgerError, Result};

/// Size of a digest in bytes.
pub const DIGEST_LEN: usize = 32;

/// Fixed-length SHA-256 digest, hex-encoded for transport.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    /// All-zero digest: the genesis `previous_hash` and the empty Merkle root.
    pub const ZERO: Digest = Digest([0u8; DIGEST_LEN]);

    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self> {
        let bytes = hex::decode(s.trim())
            .map_err(|e| LedgerError::InvalidInput(format!("Invalid digest hex: {}", e)))?;
        let bytes: [u8; DIGEST_LEN] = bytes.try_into().map_err(|b: Vec<u8>| {
            LedgerError::InvalidInput(format!(
                "Digest must be {} bytes, got {}",
                DIGEST_LEN,
                b.len()
            ))
        })?;
        Ok(Self(bytes))
    }

    /// First eight hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Digest::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

/// SHA-256 of a byte slice.
pub fn digest(bytes: &[u8]) -> Digest {
    Digest(Sha256::digest(bytes).into())
}

/// SHA-256 of a byte stream, read in 8 KiB chunks.
pub fn digest_reader<R: Read>(mut reader: R) -> std::io::Result<Digest> {
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = reader.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(Digest(hasher.finalize().into()))
}

/// Interior Merkle node: SHA-256 over the raw bytes of `left ++ right`.
pub fn hash_pair(left: &Digest, right: &Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(left.0);
    hasher.update(right.0);
    Digest(hasher.finalize().into())
}

/// Canonical JSON encoding of a record.
///
/// Object keys are sorted lexicographically by their UTF-8 bytes, no
/// whitespace is emitted, array order is preserved and strings use JSON
/// escaping. Floating point numbers are rejected since their textual form
/// is not unique.
pub fn canonical_bytes<T: Serialize + ?Sized>(record: &T) -> Result<Vec<u8>> {
    let value = serde_json::to_value(record)?;
    let mut out = Vec::with_capacity(256);
    write_canonical(&value, &mut out)?;
    Ok(out)
}

/// Digest of a record's canonical encoding.
pub fn digest_record<T: Serialize + ?Sized>(record: &T) -> Result<Digest> {
    Ok(digest(&canonical_bytes(record)?))
}

fn write_canonical(value: &Value, out: &mut Vec<u8>) -> Result<()> {
    match value {
        Value::Null => out.extend_from_slice(b"null"),
        Value::Bool(b) => out.extend_from_slice(if *b { b"true" } else { b"false" }),
        Value::Number(n) => {
            if n.is_f64() {
                return Err(LedgerError::Canonicalization(format!(
                    "floating point value {} has no canonical encoding",
                    n
                )));
            }
            out.extend_from_slice(n.to_string().as_bytes());
        }
        Value::String(s) => serde_json::to_writer(&mut *out, s)?,
        Value::Array(items) => {
            out.push(b'[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                write_canonical(item, out)?;
            }
            out.push(b']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push(b'{');
            for (i, key) in keys.into_iter().enumerate() {
                if i > 0 {
                    out.push(b',');
                }
                serde_json::to_writer(&mut *out, key)?;
                out.push(b':');
                write_canonical(&map[key], out)?;
            }
            out.push(b'}');
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    #[test]
    fn test_digest_known_vector() {
        assert_eq!(
            digest(b"").to_hex(),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
        assert_eq!(
            digest(b"abc").to_hex(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_digest_reader_matches_slice() {
        let data = vec![7u8; 20_000];
        let streamed = digest_reader(&data[..]).unwrap();
        assert_eq!(streamed, digest(&data));
    }

    #[test]
    fn test_hex_round_trip_and_rejection() {
        let d = digest(b"evidence");
        assert_eq!(Digest::from_hex(&d.to_hex()).unwrap(), d);
        assert!(Digest::from_hex("abcd").is_err());
        assert!(Digest::from_hex("zz").is_err());
        assert_eq!(Digest::ZERO.to_hex(), "0".repeat(64));
    }

    #[test]
    fn test_hash_pair_is_concatenation() {
        let a = digest(b"a");
        let b = digest(b"b");
        let mut joined = a.as_bytes().to_vec();
        joined.extend_from_slice(b.as_bytes());
        assert_eq!(hash_pair(&a, &b), digest(&joined));
        assert_ne!(hash_pair(&a, &b), hash_pair(&b, &a));
    }

    #[test]
    fn test_canonical_sorts_keys_and_strips_whitespace() {
        let bytes = canonical_bytes(&json!({"b": 1, "a": {"z": true, "y": null}, "c": [3, 1]}))
            .unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"y":null,"z":true},"b":1,"c":[3,1]}"#
        );
    }

    #[test]
    fn test_canonical_independent_of_insertion_order() {
        let mut first = HashMap::new();
        first.insert("location", "harbour");
        first.insert("description", "flood damage");
        let mut second = HashMap::new();
        second.insert("description", "flood damage");
        second.insert("location", "harbour");

        assert_eq!(canonical_bytes(&first).unwrap(), canonical_bytes(&second).unwrap());
        assert_eq!(digest_record(&first).unwrap(), digest_record(&second).unwrap());
    }

    #[test]
    fn test_canonical_rejects_floats() {
        let err = canonical_bytes(&json!({"size": 1.5})).unwrap_err();
        assert!(matches!(err, LedgerError::Canonicalization(_)));
    }

    #[test]
    fn test_canonical_escapes_strings() {
        let bytes = canonical_bytes(&json!({"k": "line\n\"quoted\""})).unwrap();
        assert_eq!(String::from_utf8(bytes).unwrap(), r#"{"k":"line\n\"quoted\""}"#);
    }

    #[test]
    fn test_digest_serde_as_hex() {
        let d = digest(b"x");
        let json = serde_json::to_string(&d).unwrap();
        assert_eq!(json, format!("\"{}\"", d.to_hex()));
        let back: Digest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, d);
    }
}
