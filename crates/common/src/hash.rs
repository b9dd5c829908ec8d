//! MD5 content hashing utilities.

/// Compute the MD5 of a byte slice.
///
/// # Arguments
/// * `data` - Bytes to hash
///
/// # Returns
/// 32-character lowercase hex string.
pub fn hash_bytes(data: &[u8]) -> String {
    format!("{:x}", md5::compute(data))
}

/// Streaming hasher for incremental MD5 hashing.
///
/// Use this when the content arrives in pieces, such as chunks
/// pulled from an async byte stream.
pub struct Md5Hasher {
    inner: md5::Context,
}

impl Md5Hasher {
    /// Create a new streaming hasher.
    pub fn new() -> Self {
        Self {
            inner: md5::Context::new(),
        }
    }

    /// Update the hasher with additional data.
    ///
    /// # Arguments
    /// * `data` - Bytes to add to the hash computation
    pub fn update(&mut self, data: &[u8]) {
        self.inner.consume(data);
    }

    /// Finalize and return the digest as 32-char lowercase hex.
    pub fn finish_hex(self) -> String {
        format!("{:x}", self.inner.compute())
    }
}

impl Default for Md5Hasher {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_bytes_known_vector() {
        assert_eq!(hash_bytes(b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            hash_bytes(b"hello world"),
            "5eb63bbbe01eeed093cb22bb8f5acdc3"
        );
    }

    #[test]
    fn test_md5_hasher_incremental() {
        let mut hasher: Md5Hasher = Md5Hasher::new();
        hasher.update(b"hello ");
        hasher.update(b"world");

        let incremental: String = hasher.finish_hex();
        assert_eq!(incremental, hash_bytes(b"hello world"));
    }
}
