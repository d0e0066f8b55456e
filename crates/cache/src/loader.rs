// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! File loader seam: how raw bytes get into the cache.

use crate::cache::CacheError;
use crate::key::CacheKey;
use std::path::Path;

/// Materializes the raw bytes for a cache key into a destination path.
///
/// Implementations download, copy, or generate the file; the cache owns
/// validation and placement. Loaders are invoked under the entry's exclusive
/// lock, so at most one load per key runs across all processes sharing the
/// cache root.
pub trait FileLoader: Send + Sync {
    fn load(&self, key: &CacheKey, dest: &Path) -> Result<(), CacheError>;
}

impl<F> FileLoader for F
where
    F: Fn(&CacheKey, &Path) -> Result<(), CacheError> + Send + Sync,
{
    fn load(&self, key: &CacheKey, dest: &Path) -> Result<(), CacheError> {
        self(key, dest)
    }
}
