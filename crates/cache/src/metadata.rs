// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-entry metadata: a header frame plus appended symlink registrations.
//!
//! The `.metadata` file is JSON lines. The first frame is the header; every
//! later frame registers one symlink handed out for the entry. Readers merge
//! all frames. Header writes and truncation require the exclusive file lock
//! on the entry; symlink frames may be appended under the shared lock while
//! the process-local append mutex is held (appends are single `O_APPEND`
//! writes).

use crate::key::ChecksumAlgorithm;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// One frame in the metadata log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "frame", rename_all = "snake_case")]
pub enum MetadataFrame {
    Header(MetadataHeader),
    Symlink { path: PathBuf },
}

/// Header frame: written once per (re-)creation of the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataHeader {
    pub created_at_ms: u64,
    pub algorithm: ChecksumAlgorithm,
    pub original_key: String,
}

/// Merged view of a metadata file.
#[derive(Debug, Clone, PartialEq)]
pub struct Metadata {
    pub header: MetadataHeader,
    pub symlinks: Vec<PathBuf>,
}

/// Read and merge a metadata file.
///
/// Returns `None` when the file is missing, empty, or does not start with a
/// header frame (a torn write from a crashed creator); such entries are
/// treated as invalid and re-created.
pub fn read(path: &Path) -> io::Result<Option<Metadata>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e),
    };

    let mut header: Option<MetadataHeader> = None;
    let mut symlinks = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        // A torn trailing frame is tolerated; everything before it counts.
        let Ok(frame) = serde_json::from_str::<MetadataFrame>(&line) else {
            break;
        };
        match frame {
            MetadataFrame::Header(h) => {
                if header.is_none() {
                    header = Some(h);
                } else {
                    // Second header means a concurrent writer violated the
                    // exclusive-lock contract; treat the entry as invalid.
                    return Ok(None);
                }
            }
            MetadataFrame::Symlink { path } => {
                if header.is_some() {
                    symlinks.push(path);
                }
            }
        }
    }

    Ok(header.map(|header| Metadata { header, symlinks }))
}

/// Replace the metadata file with a fresh header (exclusive lock held).
pub fn write_header(path: &Path, header: &MetadataHeader) -> io::Result<()> {
    let mut file = File::create(path)?;
    serde_json::to_writer(&mut file, &MetadataFrame::Header(header.clone()))?;
    file.write_all(b"\n")?;
    file.sync_all()
}

/// Append one symlink registration frame.
///
/// The caller holds at least the shared file lock and the process-local
/// append mutex; the frame goes out as a single append write.
pub fn append_symlink(path: &Path, symlink: &Path) -> io::Result<()> {
    let frame = MetadataFrame::Symlink { path: symlink.to_path_buf() };
    let mut line = serde_json::to_vec(&frame)?;
    line.push(b'\n');

    let mut file = OpenOptions::new().append(true).open(path)?;
    file.write_all(&line)
}

/// Registrations in the old log whose symlink still exists on disk.
///
/// Runs during exclusive re-creation of an entry: the caller re-appends
/// the survivors after the fresh header, so registrations whose symlink
/// was deleted out from under us are dropped rather than carried forever.
/// Entry data always lives at the same `.data` path, which keeps the
/// surviving links valid against the re-created data.
pub fn remove_stale_symlinks(path: &Path) -> io::Result<Vec<PathBuf>> {
    let Some(meta) = read(path)? else {
        return Ok(Vec::new());
    };
    Ok(meta
        .symlinks
        .into_iter()
        .filter(|p| {
            fs::symlink_metadata(p).is_ok_and(|m| m.file_type().is_symlink())
        })
        .collect())
}

#[cfg(test)]
#[path = "metadata_tests.rs"]
mod tests;
