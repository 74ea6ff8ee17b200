//! SHA-256 digests for source file verification
//!
//! Digests are lower-case hex over the full content. Comparison is byte-exact,
//! so catalogs must store lower-case digests.

use crate::error::{CommonError, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// Digest of an in-memory buffer
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// Digest of everything `reader` yields
pub fn sha256_reader(mut reader: impl Read) -> Result<String> {
    let mut hasher = Sha256::new();
    io::copy(&mut reader, &mut hasher)?;
    Ok(hex::encode(hasher.finalize()))
}

pub fn sha256_file(path: impl AsRef<Path>) -> Result<String> {
    let file = File::open(path.as_ref())?;
    sha256_reader(BufReader::with_capacity(1 << 16, file))
}

/// Hash `path` and compare against `expected`
///
/// A differing digest is reported as [`CommonError::ChecksumMismatch`].
pub fn verify_sha256(path: impl AsRef<Path>, expected: &str) -> Result<()> {
    let path = path.as_ref();
    let actual = sha256_file(path)?;
    if actual != expected {
        return Err(CommonError::checksum_mismatch(path, expected, actual));
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    // sha256("test data")
    const TEST_DATA_DIGEST: &str =
        "916f0027a575074ce72a331777c3478d6513f786a591bd892da1a577bf2335f9";

    fn file_with(content: &[u8]) -> (TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("track.mp3");
        std::fs::write(&path, content).unwrap();
        (dir, path)
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(sha256_hex(b"test data"), TEST_DATA_DIGEST);
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_reader_and_file_agree_with_buffer() {
        let data: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
        assert_eq!(sha256_reader(data.as_slice()).unwrap(), sha256_hex(&data));

        let (_dir, path) = file_with(&data);
        assert_eq!(sha256_file(&path).unwrap(), sha256_hex(&data));
    }

    #[test]
    fn test_verify_sha256() {
        let (_dir, path) = file_with(b"test data");
        verify_sha256(&path, TEST_DATA_DIGEST).unwrap();

        match verify_sha256(&path, &"0".repeat(64)) {
            Err(CommonError::ChecksumMismatch { actual, .. }) => {
                assert_eq!(actual, TEST_DATA_DIGEST)
            }
            other => panic!("expected ChecksumMismatch, got {other:?}"),
        }

        // upper-case digests do not match
        assert!(verify_sha256(&path, &TEST_DATA_DIGEST.to_uppercase()).is_err());
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let result = sha256_file(dir.path().join("absent.mp3"));
        assert!(matches!(result, Err(CommonError::Io(_))));
    }
}
