// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! olc-engine: driver/decorator execution, job running, testbed barrier.

pub mod bus;
pub mod driver;
pub mod registry;
pub mod runner;
pub mod testbed;

pub use bus::{JobEventBus, JobEventHandler};
pub use driver::{Decorator, Driver, DriverChain, Next, TestContext};
pub use registry::{DriverRegistry, NoopDriver, SleepDriver, TimingDecorator};
pub use runner::{JobOutcome, JobRunner};
pub use testbed::{run_testbed, Latch};
