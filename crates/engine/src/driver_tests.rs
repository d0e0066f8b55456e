// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use olc_core::DeviceId;

fn make_ctx() -> (TestContext, Arc<Mutex<Test>>) {
    let recorder = Arc::new(Mutex::new(Test::new(JobId::new("job-1"), "t1", 1_000)));
    let test_id = recorder.lock().id;
    let allocation = Allocation::new(test_id, vec![DeviceId::new("d1")], 1_000);
    let ctx = TestContext::new(
        HashMap::new(),
        allocation,
        Vec::new(),
        CancellationToken::new(),
        Arc::clone(&recorder),
        Arc::new(|| 1_000),
    );
    (ctx, recorder)
}

struct TraceDriver;

#[async_trait::async_trait]
impl Driver for TraceDriver {
    fn name(&self) -> &str {
        "trace"
    }

    async fn run(&self, ctx: &TestContext) -> Result<TestResult, InfraError> {
        ctx.log("driver");
        Ok(TestResult::Pass)
    }
}

struct TraceDecorator(&'static str);

#[async_trait::async_trait]
impl Decorator for TraceDecorator {
    fn name(&self) -> &str {
        self.0
    }

    async fn run(&self, ctx: &TestContext, next: Next<'_>) -> Result<TestResult, InfraError> {
        ctx.log(&format!("enter {}", self.0));
        let result = next.run(ctx).await;
        ctx.log(&format!("exit {}", self.0));
        result
    }
}

#[tokio::test]
async fn decorators_nest_outermost_first() {
    let (ctx, recorder) = make_ctx();
    let chain = DriverChain::new(
        vec![Arc::new(TraceDecorator("outer")), Arc::new(TraceDecorator("inner"))],
        Arc::new(TraceDriver),
    );

    let result = chain.run(&ctx).await.unwrap();
    assert_eq!(result, TestResult::Pass);
    assert_eq!(
        recorder.lock().log,
        "enter outer\nenter inner\ndriver\nexit inner\nexit outer\n"
    );
}

#[tokio::test]
async fn bare_driver_chain_runs_driver() {
    let (ctx, recorder) = make_ctx();
    let chain = DriverChain::new(Vec::new(), Arc::new(TraceDriver));
    chain.run(&ctx).await.unwrap();
    assert_eq!(recorder.lock().log, "driver\n");
}

struct ShortCircuitDecorator;

#[async_trait::async_trait]
impl Decorator for ShortCircuitDecorator {
    fn name(&self) -> &str {
        "short_circuit"
    }

    async fn run(&self, _ctx: &TestContext, _next: Next<'_>) -> Result<TestResult, InfraError> {
        Ok(TestResult::Skip)
    }
}

#[tokio::test]
async fn decorator_can_skip_the_driver() {
    let (ctx, recorder) = make_ctx();
    let chain = DriverChain::new(vec![Arc::new(ShortCircuitDecorator)], Arc::new(TraceDriver));
    let result = chain.run(&ctx).await.unwrap();
    assert_eq!(result, TestResult::Skip);
    assert!(recorder.lock().log.is_empty());
}

#[tokio::test]
async fn context_writes_reach_the_recorder() {
    let (ctx, recorder) = make_ctx();
    ctx.set_property("build", "1234");
    ctx.add_subtest("sub-1", TestResult::Pass, None);
    ctx.log("hello");

    let test = recorder.lock();
    assert_eq!(test.properties.get("build").map(String::as_str), Some("1234"));
    assert_eq!(test.subtests.len(), 1);
    assert_eq!(test.subtests[0].result, TestResult::Pass);
    assert_eq!(test.log, "hello\n");
}

#[test]
fn reboot_request_is_sticky_across_clones() {
    let (ctx, _recorder) = make_ctx();
    let clone = ctx.clone();
    clone.request_reboot();
    assert!(ctx.reboot_requested());
}

#[test]
fn subdevice_view_narrows_devices() {
    let recorder = Arc::new(Mutex::new(Test::new(JobId::new("job-1"), "t1", 1_000)));
    let test_id = recorder.lock().id;
    let devices = vec![
        olc_core::test_support::idle_device("d1", "pixel", 34),
        olc_core::test_support::idle_device("d2", "pixel", 34),
    ];
    let allocation =
        Allocation::new(test_id, vec![DeviceId::new("d1"), DeviceId::new("d2")], 1_000);
    let ctx = TestContext::new(
        HashMap::new(),
        allocation,
        devices,
        CancellationToken::new(),
        recorder,
        Arc::new(|| 1_000),
    );

    let sub = ctx.for_subdevice(1);
    assert_eq!(sub.devices.len(), 1);
    assert_eq!(sub.devices[0].control_id, "d2");
    // Both views share the recorder.
    sub.log("from sub");
    assert!(ctx.devices.len() == 2);
}
