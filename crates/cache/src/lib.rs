// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! olc-cache: content-addressed persistent cache for large test inputs.
//!
//! Cross-process safety comes from advisory file locks on each entry's
//! `.lock` file; in-process writer preference comes from a per-entry
//! task-fair rwlock. Entry data is never mutated after creation.

pub mod cache;
pub mod key;
pub mod loader;
pub mod metadata;

pub use cache::{Cache, CacheError};
pub use key::{checksum_file, CacheKey, ChecksumAlgorithm};
pub use loader::FileLoader;
pub use metadata::{Metadata, MetadataFrame, MetadataHeader};
