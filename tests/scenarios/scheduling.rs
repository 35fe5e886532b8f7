//! Instance scheduling: parallelism, max-parallel caps and result order

use crate::helpers::*;
use matrix_ci::core::ExitSignal;
use matrix_ci::execution::{ExecutionEvent, SchedulingStrategy};
use std::time::Duration;

fn workflow(max_parallel: Option<usize>) -> String {
    let strategy_cap = max_parallel
        .map(|n| format!("      max-parallel: {}\n", n))
        .unwrap_or_default();
    format!(
        r#"
jobs:
  test:
    strategy:
{}      matrix:
        shard: [a, b, c]
    steps:
      - run: ./test-shard.sh ${{{{ matrix.shard }}}}
"#,
        strategy_cap
    )
}

/// Labels in the order their instances started and finished
fn lifecycle(events: &[ExecutionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|event| match event {
            ExecutionEvent::InstanceStarted { label, .. } => Some(format!("start {}", label)),
            ExecutionEvent::InstanceFinished { label, .. } => Some(format!("finish {}", label)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_parallel_results_keep_expansion_order() {
    let workflow = load(&workflow(None));
    // The first shard finishes last
    let runner = MockRunner::new().delay_on("shard=a", Duration::from_millis(200));

    let run = run_with_strategy(
        &workflow,
        runner,
        MockFetcher::new(),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_success(&run.result);
    let labels: Vec<String> = run.result.instances.iter().map(|r| r.instance.label()).collect();
    assert_eq!(
        labels,
        vec!["test (shard=a)", "test (shard=b)", "test (shard=c)"]
    );

    let events = lifecycle(&run.events);
    let finish_a = events.iter().position(|e| e == "finish test (shard=a)").unwrap();
    let finish_b = events.iter().position(|e| e == "finish test (shard=b)").unwrap();
    assert!(finish_b < finish_a, "shard b should finish first: {:?}", events);
}

#[tokio::test]
async fn test_max_parallel_one_runs_instances_back_to_back() {
    let workflow = load(&workflow(Some(1)));
    let runner = MockRunner::new().delay_on("shard=a", Duration::from_millis(50));

    let run = run_with_strategy(
        &workflow,
        runner,
        MockFetcher::new(),
        SchedulingStrategy::Parallel,
    )
    .await;

    assert_eq!(
        lifecycle(&run.events),
        vec![
            "start test (shard=a)",
            "finish test (shard=a)",
            "start test (shard=b)",
            "finish test (shard=b)",
            "start test (shard=c)",
            "finish test (shard=c)",
        ]
    );
}

#[tokio::test]
async fn test_sequential_strategy_ignores_larger_cap() {
    let workflow = load(&workflow(Some(3)));
    let runner = MockRunner::new();

    run_with_strategy(
        &workflow,
        runner.clone(),
        MockFetcher::new(),
        SchedulingStrategy::Sequential,
    )
    .await;

    let scripts: Vec<String> = runner.invocations().into_iter().map(|i| i.script).collect();
    assert_eq!(
        scripts,
        vec!["./test-shard.sh a", "./test-shard.sh b", "./test-shard.sh c"]
    );
}

#[tokio::test]
async fn test_parallel_failure_does_not_cancel_siblings() {
    let workflow = load(&workflow(None));
    let runner = MockRunner::new().fail_on("shard=b", "test-shard", ExitSignal::Code(1));

    let run = run_with_strategy(
        &workflow,
        runner,
        MockFetcher::new(),
        SchedulingStrategy::LimitedParallel(2),
    )
    .await;

    assert_eq!(run.result.failed(), 1);
    assert_eq!(run.result.succeeded(), 2);
    assert!(instance(&run.result, "test (shard=c)").outcome.is_success());
}
