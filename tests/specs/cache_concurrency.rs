// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache concurrency: many callers, one slow loader invocation.

use olc_cache::{Cache, CacheError, CacheKey, ChecksumAlgorithm, FileLoader};
use sha2::Digest;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

/// Loader that takes its time, then writes fixed bytes.
struct SlowLoader {
    bytes: Vec<u8>,
    delay: Duration,
    calls: AtomicU32,
}

impl FileLoader for SlowLoader {
    fn load(&self, _key: &CacheKey, dest: &Path) -> Result<(), CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);
        std::fs::write(dest, &self.bytes)?;
        Ok(())
    }
}

fn sha256_key(bytes: &[u8]) -> CacheKey {
    CacheKey::new(
        "gs://builds/system.img",
        "android",
        ChecksumAlgorithm::Sha256,
        hex::encode(sha2::Sha256::digest(bytes)),
    )
}

#[test]
fn ten_concurrent_callers_one_load() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();

    let payload = b"large image payload".to_vec();
    let key = sha256_key(&payload);
    let loader = Arc::new(SlowLoader {
        bytes: payload.clone(),
        delay: Duration::from_millis(500),
        calls: AtomicU32::new(0),
    });

    // Two cache instances over one root stand in for separate processes:
    // they share no in-process state, only the file locks.
    let caches = [
        Arc::new(Cache::new(root.path()).unwrap()),
        Arc::new(Cache::new(root.path()).unwrap()),
    ];

    let threads = 10;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|i| {
            let cache = Arc::clone(&caches[i % caches.len()]);
            let loader = Arc::clone(&loader);
            let barrier = Arc::clone(&barrier);
            let key = key.clone();
            let link = out.path().join(format!("link_{i}"));
            std::thread::spawn(move || {
                barrier.wait();
                cache.get(&key, loader.as_ref(), &link, false).unwrap()
            })
        })
        .collect();
    let links: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // The loader ran exactly once across both "processes".
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1);

    // Every symlink resolves to the same inode with the right content.
    use std::os::unix::fs::MetadataExt;
    let inodes: std::collections::HashSet<u64> = links
        .iter()
        .map(|link| std::fs::metadata(link).unwrap().ino())
        .collect();
    assert_eq!(inodes.len(), 1);
    for link in &links {
        assert_eq!(std::fs::read(link).unwrap(), payload);
    }

    // The metadata file lists all ten symlinks.
    let meta_path = root
        .path()
        .join("android")
        .join("sha256")
        .join(&key.checksum_hex)
        .join(".metadata");
    let meta = olc_cache::metadata::read(&meta_path).unwrap().unwrap();
    assert_eq!(meta.symlinks.len(), threads);
}

#[test]
fn second_get_is_metadata_only() {
    let root = tempfile::tempdir().unwrap();
    let out = tempfile::tempdir().unwrap();
    let payload = b"payload".to_vec();
    let key = sha256_key(&payload);
    let loader = SlowLoader {
        bytes: payload,
        delay: Duration::from_millis(10),
        calls: AtomicU32::new(0),
    };
    let cache = Cache::new(root.path()).unwrap();
    let link = out.path().join("link");

    let first = cache.get(&key, &loader, &link, false).unwrap();
    let second = cache.get(&key, &loader, &link, false).unwrap();

    assert_eq!(first, second);
    assert_eq!(loader.calls.load(Ordering::SeqCst), 1, "second get must not re-load");
}
