// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache keys and checksum computation.

use serde::{Deserialize, Serialize};
use sha2::Digest;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

/// Supported checksum algorithms for cache entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChecksumAlgorithm {
    Crc32c,
    Md5,
    Sha256,
}

olc_core::simple_display! {
    ChecksumAlgorithm {
        Crc32c => "crc32c",
        Md5 => "md5",
        Sha256 => "sha256",
    }
}

/// Identity of one cache entry.
///
/// Two keys with the same `(namespace, algorithm, checksum_hex)` address the
/// same on-disk entry regardless of `original_key`; the original key is kept
/// for symlink naming and diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    /// Source identifier, e.g. the remote path the bytes came from.
    pub original_key: String,
    /// Isolation namespace, one directory level under the cache root.
    pub namespace: String,
    pub algorithm: ChecksumAlgorithm,
    /// Lowercase hex digest the entry data must hash to.
    pub checksum_hex: String,
}

impl CacheKey {
    pub fn new(
        original_key: impl Into<String>,
        namespace: impl Into<String>,
        algorithm: ChecksumAlgorithm,
        checksum_hex: impl Into<String>,
    ) -> Self {
        Self {
            original_key: original_key.into(),
            namespace: namespace.into(),
            algorithm,
            checksum_hex: checksum_hex.into().to_ascii_lowercase(),
        }
    }

    /// Filename component derived from the original key, for symlinks into a
    /// target directory.
    pub fn file_name(&self) -> &str {
        self.original_key.rsplit('/').next().unwrap_or(&self.original_key)
    }
}

/// Compute the hex digest of a file, streaming in 64 KiB chunks.
pub fn checksum_file(path: &Path, algorithm: ChecksumAlgorithm) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut buf = vec![0u8; 64 * 1024];
    match algorithm {
        ChecksumAlgorithm::Crc32c => {
            let mut acc: u32 = 0;
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                acc = crc32c::crc32c_append(acc, &buf[..n]);
            }
            Ok(format!("{acc:08x}"))
        }
        ChecksumAlgorithm::Md5 => {
            let mut ctx = md5::Context::new();
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                ctx.consume(&buf[..n]);
            }
            Ok(format!("{:x}", ctx.compute()))
        }
        ChecksumAlgorithm::Sha256 => {
            let mut hasher = sha2::Sha256::new();
            loop {
                let n = file.read(&mut buf)?;
                if n == 0 {
                    break;
                }
                hasher.update(&buf[..n]);
            }
            Ok(hex::encode(hasher.finalize()))
        }
    }
}

#[cfg(test)]
#[path = "key_tests.rs"]
mod tests;
