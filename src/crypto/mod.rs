pub mod digest;
pub mod signatures;

pub use digest::{canonical_bytes, digest, digest_reader, digest_record, hash_pair, Digest};
pub use signatures::{BlockSigner, Secp256k1Signer};
