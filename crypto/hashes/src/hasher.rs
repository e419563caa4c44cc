use crate::Hash;
use sha2::{Digest, Sha256};
use sha3::Keccak256;
use std::io::Write;

/// Compute SHA256(SHA256(data))
pub fn double_sha256(data: &[u8]) -> Hash {
    let first = Sha256::digest(data);
    let second = Sha256::digest(first);
    Hash::from_bytes(second.into())
}

/// Compute SHA256(data)
pub fn sha256(data: &[u8]) -> Hash {
    Hash::from_bytes(Sha256::digest(data).into())
}

/// Compute BLAKE2b-256(BLAKE2b-256(data))
pub fn blake2bd(data: &[u8]) -> Hash {
    let params = blake2b_simd::Params::new().hash_length(32).to_owned();
    let first = params.hash(data);
    let second = params.hash(first.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(second.as_bytes());
    Hash::from_bytes(out)
}

/// Compute Keccak-256(data)
pub fn keccak256(data: &[u8]) -> Hash {
    Hash::from_bytes(Keccak256::digest(data).into())
}

/// HashWriter wraps a Sha256 hasher to implement the Write trait.
/// `finalize_double` yields the double-SHA256 digest used for ids.
#[derive(Clone)]
pub struct HashWriter(Sha256);

impl HashWriter {
    pub fn new() -> Self {
        Self(Sha256::new())
    }

    pub fn update(&mut self, data: impl AsRef<[u8]>) -> &mut Self {
        self.0.update(data.as_ref());
        self
    }

    pub fn finalize(self) -> Hash {
        Hash::from_bytes(self.0.finalize().into())
    }

    pub fn finalize_double(self) -> Hash {
        let first = self.0.finalize();
        Hash::from_bytes(Sha256::digest(first).into())
    }
}

impl Write for HashWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl Default for HashWriter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;

    #[test]
    fn test_double_sha256() {
        let hash = double_sha256(b"hello");
        assert_eq!(hash.to_bytes(), hex!("9595c9df90075148eb06860365df33584b75bff782a510c6cd4883a419833d50"));
    }

    #[test]
    fn test_hash_writer() {
        let mut writer = HashWriter::new();
        writer.write_all(b"hello").unwrap();
        assert_eq!(writer.clone().finalize().to_bytes(), hex!("2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"));
        assert_eq!(writer.finalize_double(), double_sha256(b"hello"));
    }

    #[test]
    fn test_keccak256_empty() {
        assert_eq!(keccak256(b"").to_bytes(), hex!("c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"));
    }

    #[test]
    fn test_blake2bd_differs_from_single_pass() {
        let once = blake2b_simd::Params::new().hash_length(32).hash(b"abc");
        assert_ne!(blake2bd(b"abc").as_bytes().as_slice(), once.as_bytes());
    }
}
