use std::{fs::File, io::Read, path::Path};

use sha2::{Digest, Sha256};

use crate::error::Result;

/// Streaming SHA-256 of a file, hex encoded.
pub fn file_sha256_hex(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Whether `path` exists and matches `expected_hex` (case-insensitive).
pub fn verify_sha256(path: &Path, expected_hex: &str) -> Result<bool> {
    Ok(file_sha256_hex(path)?.eq_ignore_ascii_case(expected_hex))
}
