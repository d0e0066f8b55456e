// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed persistent cache, safe across threads and processes.
//!
//! Layout: `<root>/<namespace>/<algorithm>/<checksum>/{.data, .lock,
//! .metadata}`. Entry data is immutable once created; replacement is only
//! by full re-creation under the exclusive file lock. Correctness across
//! processes comes from advisory `fs2` locks on `.lock`; correctness inside
//! one process comes from a per-entry task-fair `RwLock` (queued writers
//! block new readers, so repeated shared lookups cannot starve a loader).

use crate::key::{checksum_file, CacheKey};
use crate::loader::FileLoader;
use crate::metadata::{self, MetadataHeader};
use olc_core::{ErrorId, InfraError};
use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

const DATA_FILE: &str = ".data";
const LOCK_FILE: &str = ".lock";
const METADATA_FILE: &str = ".metadata";

/// Errors from cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// No valid entry for the key; only reported by loaderless reads.
    #[error("entry not present")]
    NotPresent,

    /// The loader failed, or the loaded bytes did not match the key's
    /// checksum. Never retried internally; callers retry with backoff.
    #[error("load failed: {0}")]
    LoadFailure(String),

    /// An existing entry's data no longer matches its checksum.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// Advisory file locking failed or is unsupported on this filesystem.
    #[error("file lock failed")]
    LockFailure(#[source] io::Error),

    #[error("io failure")]
    Io(#[from] io::Error),
}

impl From<CacheError> for InfraError {
    fn from(e: CacheError) -> Self {
        let id = match &e {
            CacheError::NotPresent => ErrorId::NotFound,
            CacheError::LoadFailure(_) => ErrorId::LoadFailure,
            CacheError::ChecksumMismatch { .. } => ErrorId::ChecksumMismatch,
            CacheError::LockFailure(_) => ErrorId::IoFailure,
            CacheError::Io(_) => ErrorId::IoFailure,
        };
        InfraError::with_source(id, "cache operation failed", e)
    }
}

/// Process-local locks for one entry directory.
struct DirLock {
    rw: RwLock<()>,
    /// Serializes metadata appends among threads sharing the shared file lock.
    append: Mutex<()>,
}

/// Content-addressed cache rooted at one directory.
///
/// Clone-cheap: share via `Arc`. Multiple `Cache` instances (or processes)
/// over the same root coordinate through the per-entry file locks.
pub struct Cache {
    root: PathBuf,
    dir_locks: Mutex<HashMap<PathBuf, Arc<DirLock>>>,
}

impl Cache {
    /// Open a cache at `root`, creating it if needed.
    ///
    /// Probes advisory lock support and refuses to construct the cache on
    /// filesystems without it (e.g. some NFS mounts) — running without
    /// locks would silently allow duplicate loads.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        probe_advisory_locks(&root)?;
        Ok(Self { root, dir_locks: Mutex::new(HashMap::new()) })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Ensure a validated copy of the data for `key` exists and return a
    /// symlink to it.
    ///
    /// `target` is the symlink path itself, or a directory to place a
    /// symlink named after the key when `is_target_dir` is set. The loader
    /// is invoked at most once per key across all processes sharing the
    /// root.
    pub fn get(
        &self,
        key: &CacheKey,
        loader: &dyn FileLoader,
        target: &Path,
        is_target_dir: bool,
    ) -> Result<PathBuf, CacheError> {
        let dir = self.entry_dir(key);
        fs::create_dir_all(&dir)?;
        let link = link_path(key, target, is_target_dir);
        let dir_lock = self.dir_lock(&dir);

        // Fast path: shared file lock, entry already valid.
        {
            let _read = dir_lock.rw.read();
            let lock_file = open_lock_file(&dir)?;
            fs2::FileExt::lock_shared(&lock_file).map_err(CacheError::LockFailure)?;
            let result = self.use_existing(key, &dir, &link, &dir_lock);
            let _ = fs2::FileExt::unlock(&lock_file);
            if let Some(path) = result? {
                debug!(key = %key.checksum_hex, "cache hit");
                return Ok(path);
            }
        }

        // Slow path: exclusive file lock, (re-)create the entry.
        let _write = dir_lock.rw.write();
        let lock_file = open_lock_file(&dir)?;
        fs2::FileExt::lock_exclusive(&lock_file).map_err(CacheError::LockFailure)?;
        let result = self.create_entry(key, loader, &dir, &link, &dir_lock);
        let _ = fs2::FileExt::unlock(&lock_file);
        result
    }

    /// Look up an entry without loading.
    ///
    /// Reports `NotPresent` for a key that was never (or not successfully)
    /// loaded. An entry whose data fails validation reports
    /// `ChecksumMismatch` rather than silently handing out a bad symlink.
    pub fn lookup(
        &self,
        key: &CacheKey,
        target: &Path,
        is_target_dir: bool,
    ) -> Result<PathBuf, CacheError> {
        let dir = self.entry_dir(key);
        if !dir.exists() {
            return Err(CacheError::NotPresent);
        }
        let link = link_path(key, target, is_target_dir);
        let dir_lock = self.dir_lock(&dir);

        let _read = dir_lock.rw.read();
        let lock_file = open_lock_file(&dir)?;
        fs2::FileExt::lock_shared(&lock_file).map_err(CacheError::LockFailure)?;
        let result = (|| {
            let data_path = dir.join(DATA_FILE);
            if metadata::read(&dir.join(METADATA_FILE))?.is_none() || !data_path.exists() {
                return Err(CacheError::NotPresent);
            }
            let actual = checksum_file(&data_path, key.algorithm)?;
            if actual != key.checksum_hex {
                return Err(CacheError::ChecksumMismatch {
                    expected: key.checksum_hex.clone(),
                    actual,
                });
            }
            self.use_existing(key, &dir, &link, &dir_lock)?
                .ok_or(CacheError::NotPresent)
        })();
        let _ = fs2::FileExt::unlock(&lock_file);
        result
    }

    fn entry_dir(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(&key.namespace)
            .join(key.algorithm.to_string())
            .join(&key.checksum_hex)
    }

    fn dir_lock(&self, dir: &Path) -> Arc<DirLock> {
        let mut locks = self.dir_locks.lock();
        Arc::clone(locks.entry(dir.to_path_buf()).or_insert_with(|| {
            Arc::new(DirLock { rw: RwLock::new(()), append: Mutex::new(()) })
        }))
    }

    /// Validate the entry and hand out a symlink. `Ok(None)` means the
    /// entry is absent or stale and must be (re-)created.
    fn use_existing(
        &self,
        key: &CacheKey,
        dir: &Path,
        link: &Path,
        dir_lock: &DirLock,
    ) -> Result<Option<PathBuf>, CacheError> {
        let meta_path = dir.join(METADATA_FILE);
        let data_path = dir.join(DATA_FILE);

        let Some(meta) = metadata::read(&meta_path)? else {
            return Ok(None);
        };
        if !data_path.exists() {
            return Ok(None);
        }
        let actual = checksum_file(&data_path, key.algorithm)?;
        if actual != key.checksum_hex {
            warn!(
                entry = %dir.display(),
                expected = %key.checksum_hex,
                actual = %actual,
                "stale cache entry, scheduling re-create"
            );
            return Ok(None);
        }

        install_symlink(&data_path, link)?;
        if !meta.symlinks.iter().any(|p| p == link) {
            let _append = dir_lock.append.lock();
            metadata::append_symlink(&meta_path, link)?;
        }
        Ok(Some(link.to_path_buf()))
    }

    /// (Re-)create the entry under the exclusive lock.
    fn create_entry(
        &self,
        key: &CacheKey,
        loader: &dyn FileLoader,
        dir: &Path,
        link: &Path,
        dir_lock: &DirLock,
    ) -> Result<PathBuf, CacheError> {
        // Another process may have completed the load while we waited.
        if let Some(path) = self.use_existing(key, dir, link, dir_lock)? {
            return Ok(path);
        }

        let data_path = dir.join(DATA_FILE);
        let meta_path = dir.join(METADATA_FILE);
        // Prior registrations whose symlink is gone are dropped here; the
        // survivors re-register below and stay valid because the data is
        // re-created at the same path.
        let survivors = metadata::remove_stale_symlinks(&meta_path)?;
        if data_path.exists() {
            fs::remove_file(&data_path)?;
        }
        if meta_path.exists() {
            fs::remove_file(&meta_path)?;
        }

        let tmp = dir.join(format!("{DATA_FILE}.tmp.{}", std::process::id()));
        if let Err(e) = loader.load(key, &tmp) {
            let _ = fs::remove_file(&tmp);
            return Err(e);
        }

        let actual = checksum_file(&tmp, key.algorithm)?;
        if actual != key.checksum_hex {
            let _ = fs::remove_file(&tmp);
            return Err(CacheError::LoadFailure(format!(
                "loaded data hashed to {actual}, key expects {}",
                key.checksum_hex
            )));
        }

        // Entry data is read-only for everyone from here on.
        let mut perms = fs::metadata(&tmp)?.permissions();
        perms.set_mode(0o444);
        fs::set_permissions(&tmp, perms)?;
        fs::rename(&tmp, &data_path)?;

        metadata::write_header(
            &meta_path,
            &MetadataHeader {
                created_at_ms: chrono::Utc::now().timestamp_millis() as u64,
                algorithm: key.algorithm,
                original_key: key.original_key.clone(),
            },
        )?;

        install_symlink(&data_path, link)?;
        {
            let _append = dir_lock.append.lock();
            for survivor in &survivors {
                metadata::append_symlink(&meta_path, survivor)?;
            }
            if !survivors.iter().any(|p| p == link) {
                metadata::append_symlink(&meta_path, link)?;
            }
        }

        debug!(key = %key.checksum_hex, data = %data_path.display(), "cache entry created");
        Ok(link.to_path_buf())
    }
}

fn link_path(key: &CacheKey, target: &Path, is_target_dir: bool) -> PathBuf {
    if is_target_dir {
        target.join(key.file_name())
    } else {
        target.to_path_buf()
    }
}

fn open_lock_file(dir: &Path) -> Result<std::fs::File, CacheError> {
    Ok(OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(false)
        .open(dir.join(LOCK_FILE))?)
}

fn install_symlink(data: &Path, link: &Path) -> Result<(), CacheError> {
    if let Some(parent) = link.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::symlink_metadata(link) {
        Ok(m) if m.file_type().is_symlink() => {
            if fs::read_link(link)? == data {
                return Ok(());
            }
            fs::remove_file(link)?;
        }
        Ok(_) => {
            return Err(CacheError::Io(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("symlink target {} exists and is not a symlink", link.display()),
            )))
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    std::os::unix::fs::symlink(data, link)?;
    Ok(())
}

/// Take and release an exclusive lock on a probe file to verify the
/// filesystem supports advisory locks.
fn probe_advisory_locks(root: &Path) -> Result<(), CacheError> {
    let probe_path = root.join(".lock_probe");
    let probe = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&probe_path)?;
    fs2::FileExt::try_lock_exclusive(&probe).map_err(CacheError::LockFailure)?;
    let _ = fs2::FileExt::unlock(&probe);
    Ok(())
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
