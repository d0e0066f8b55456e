// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn supports_checks_both_maps() {
    let mut dims = DimensionSet::default();
    dims.support("pool", "shared");
    dims.require("label", "perf");

    assert!(dims.supports("pool", "shared"));
    assert!(dims.supports("label", "perf"));
    assert!(!dims.supports("pool", "private"));
    assert!(!dims.supports("missing", "x"));
}

#[test]
fn multi_valued_dimensions() {
    let mut dims = DimensionSet::default();
    dims.support("pool", "shared");
    dims.support("pool", "perf");

    assert!(dims.supports("pool", "shared"));
    assert!(dims.supports("pool", "perf"));
}

#[test]
fn satisfies_requires_job_demands_met() {
    let mut device = DimensionSet::default();
    device.support("pool", "shared");

    let mut job = DimensionSet::default();
    job.support("pool", "shared");
    assert!(device.satisfies(&job));

    job.support("gpu", "adreno");
    assert!(!device.satisfies(&job));
}

#[test]
fn satisfies_enforces_device_required_dimensions() {
    let mut device = DimensionSet::default();
    device.require("pool", "dedicated");

    // Job that does not declare the required dimension is refused.
    let job = DimensionSet::default();
    assert!(!device.satisfies(&job));

    let mut declaring = DimensionSet::default();
    declaring.support("pool", "dedicated");
    assert!(device.satisfies(&declaring));
}

#[test]
fn empty_sets_satisfy_each_other() {
    let a = DimensionSet::default();
    let b = DimensionSet::default();
    assert!(a.satisfies(&b));
    assert!(a.is_empty());
}
