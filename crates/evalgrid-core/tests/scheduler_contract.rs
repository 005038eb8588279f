//! End-to-end scheduling behavior through `Runner` with scripted capabilities.
//!
//! Time is paused in every test that involves latency or backoff, so the
//! assertions on elapsed time are exact and the tests run instantly.

use evalgrid_core::dataset::InMemoryDataset;
use evalgrid_core::engine::{ExecutionSettings, RetryPolicy};
use evalgrid_core::errors::TrialError;
use evalgrid_core::model::ToolInvocation;
use evalgrid_core::observer::RecordingObserver;
use evalgrid_core::providers::fake::{
    agent_outcome, agent_outcome_with_tools, FakeAgentFactory, FakeJudgeFactory,
};
use evalgrid_core::{CapabilityError, Condition, RunError, RunEvent, RunPlan, Runner, Sample};
use std::sync::Arc;
use std::time::Duration;

fn samples(ids: &[&str]) -> InMemoryDataset {
    InMemoryDataset::new(
        ids.iter()
            .map(|id| Sample {
                id: (*id).to_string(),
                question: format!("question {id}"),
                reference_answer: format!("answer {id}"),
            })
            .collect(),
    )
}

fn condition(name: &str) -> Condition {
    Condition {
        name: name.to_string(),
        system_prompt: "Answer the question.".into(),
        tool_servers: vec![],
        require_tool_use: false,
        require_tool_success: false,
    }
}

fn plan(conditions: Vec<Condition>, repetitions: u32, max_concurrent: usize) -> RunPlan {
    RunPlan {
        config_name: "contract".into(),
        conditions,
        repetitions,
        settings: ExecutionSettings {
            max_concurrent,
            retry: RetryPolicy {
                max_attempts: 3,
                initial_backoff: Duration::from_secs(2),
                multiplier: 3.0,
            },
        },
    }
}

fn runner(agents: FakeAgentFactory, recorder: &Arc<RecordingObserver>) -> Runner {
    Runner::new(Arc::new(agents), Arc::new(FakeJudgeFactory::default()))
        .with_observer(recorder.clone())
}

fn completed_samples(recorder: &RecordingObserver) -> Vec<String> {
    recorder
        .of_kind("trial.completed")
        .into_iter()
        .filter_map(|e| match e {
            RunEvent::TrialCompleted { identity, .. } => Some(identity.sample_id),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn full_grid_produces_sorted_results_and_ordered_progress() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents =
        FakeAgentFactory::returning(agent_outcome("ok")).with_latency(Duration::from_millis(50));
    let stats = agents.stats();

    let summary = runner(agents, &recorder)
        .run(
            &plan(vec![condition("with-graph"), condition("baseline")], 2, 4),
            &samples(&["s1", "s2"]),
        )
        .await
        .unwrap();

    assert_eq!(summary.runs.len(), 8);
    let ids: Vec<_> = summary.runs.iter().map(|r| r.identity.clone()).collect();
    let mut sorted = ids.clone();
    sorted.sort();
    sorted.dedup();
    assert_eq!(ids, sorted, "runs must be sorted and unique");
    assert!(summary.runs.iter().all(|r| r.run_id == summary.run_id));

    let progress = recorder.progress();
    assert_eq!(progress, (1..=8).map(|d| (d, 8)).collect::<Vec<_>>());

    assert_eq!(stats.peak_concurrency(), 4);
    assert_eq!(recorder.count("trial.started"), 8);
    assert_eq!(recorder.count("trial.completed"), 8);
    assert!(recorder.retries().is_empty());
}

#[tokio::test(start_paused = true)]
async fn concurrency_never_exceeds_the_bound() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents =
        FakeAgentFactory::returning(agent_outcome("ok")).with_latency(Duration::from_millis(20));
    let stats = agents.stats();

    runner(agents, &recorder)
        .run(
            &plan(vec![condition("a"), condition("b"), condition("c")], 3, 2),
            &samples(&["s1", "s2", "s3"]),
        )
        .await
        .unwrap();

    assert_eq!(stats.total(), 27);
    assert!(stats.peak_concurrency() <= 2, "peak {}", stats.peak_concurrency());
}

#[tokio::test(start_paused = true)]
async fn retriable_failure_once_then_success() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents = FakeAgentFactory::scripted(|call| {
        if call.call_index == 0 {
            Err(CapabilityError::agent("rate limited").retriable())
        } else {
            Ok(agent_outcome("ok"))
        }
    });
    let stats = agents.stats();
    let started = tokio::time::Instant::now();

    let summary = runner(agents, &recorder)
        .run(&plan(vec![condition("baseline")], 1, 1), &samples(&["s1"]))
        .await
        .unwrap();

    assert_eq!(summary.runs.len(), 1);
    assert_eq!(stats.calls_for("baseline", "s1"), 2);

    let retries = recorder.retries();
    assert_eq!(retries.len(), 1);
    match &retries[0] {
        RunEvent::TrialRetried {
            attempt,
            backoff_seconds,
            reason,
            ..
        } => {
            assert_eq!(*attempt, 1);
            assert_eq!(*backoff_seconds, 2.0);
            assert_eq!(reason, "failed to invoke agent: rate limited");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(recorder.count("trial.started"), 1);
    assert!(started.elapsed() >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn non_retriable_failure_aborts_without_retrying() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents = FakeAgentFactory::scripted(|call| {
        if call.sample_id == "s1" {
            Err(CapabilityError::agent("invalid request"))
        } else {
            Ok(agent_outcome("ok"))
        }
    })
    .with_sample_latency("s0", Duration::from_secs(10));
    let stats = agents.stats();

    let err = runner(agents, &recorder)
        .run(
            &plan(vec![condition("baseline")], 1, 2),
            &samples(&["s0", "s1", "s2"]),
        )
        .await
        .unwrap_err();

    match &err {
        RunError::Trial {
            identity,
            attempts,
            source,
        } => {
            assert_eq!(identity.sample_id, "s1");
            assert_eq!(*attempts, 1);
            assert!(matches!(source, TrialError::Capability(_)));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(err.kind(), "agent_invocation");
    assert!(recorder.retries().is_empty());
    assert_eq!(recorder.count("trial.failed"), 1);

    // s0 was already running and is awaited, but its result is discarded.
    // s2 never got a slot.
    assert_eq!(stats.calls_for("baseline", "s0"), 1);
    assert_eq!(stats.calls_for("baseline", "s2"), 0);
    assert!(completed_samples(&recorder).is_empty());
    assert_eq!(recorder.progress(), [(1, 3)]);
    assert_eq!(recorder.count("run.completed"), 0);
}

#[tokio::test(start_paused = true)]
async fn trials_resolved_before_an_abort_are_still_reported() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents = FakeAgentFactory::scripted(|call| {
        if call.sample_id == "failing" {
            Err(CapabilityError::agent("invalid request"))
        } else {
            Ok(agent_outcome("ok"))
        }
    })
    .with_sample_latency("failing", Duration::from_secs(1))
    .with_sample_latency("late", Duration::from_secs(5));

    let err = runner(agents, &recorder)
        .run(
            &plan(vec![condition("baseline")], 1, 3),
            &samples(&["fast", "failing", "late"]),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Trial { ref identity, .. } if identity.sample_id == "failing"));
    assert_eq!(completed_samples(&recorder), ["fast"]);
    assert_eq!(recorder.progress(), [(1, 3), (2, 3)]);

    let progress_conditions: Vec<String> = recorder
        .of_kind("run.progress")
        .into_iter()
        .filter_map(|e| match e {
            RunEvent::Progress { condition, .. } => Some(condition),
            _ => None,
        })
        .collect();
    assert_eq!(progress_conditions, ["baseline", "baseline"]);

    let failed: Vec<String> = recorder
        .of_kind("trial.failed")
        .into_iter()
        .filter_map(|e| match e {
            RunEvent::TrialFailed { identity, .. } => Some(identity.sample_id),
            _ => None,
        })
        .collect();
    assert_eq!(failed, ["failing"]);
    assert_eq!(recorder.count("run.completed"), 0);
}

#[tokio::test(start_paused = true)]
async fn exhausted_retries_abort_with_the_last_error() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents =
        FakeAgentFactory::scripted(|_| Err(CapabilityError::agent("overloaded").retriable()));

    let err = runner(agents, &recorder)
        .run(&plan(vec![condition("baseline")], 1, 1), &samples(&["s1"]))
        .await
        .unwrap_err();

    assert!(matches!(err, RunError::Trial { attempts: 3, .. }));
    let backoffs: Vec<f64> = recorder
        .retries()
        .into_iter()
        .filter_map(|e| match e {
            RunEvent::TrialRetried {
                backoff_seconds, ..
            } => Some(backoff_seconds),
            _ => None,
        })
        .collect();
    assert_eq!(backoffs, [2.0, 6.0]);
}

#[tokio::test(start_paused = true)]
async fn tool_use_gate_retries_until_tools_are_used() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents = FakeAgentFactory::scripted(|call| {
        if call.call_index == 0 {
            Ok(agent_outcome("from memory"))
        } else {
            Ok(agent_outcome_with_tools(
                "from the graph",
                vec![ToolInvocation::ok("graph_query")],
            ))
        }
    });
    let mut gated = condition("with-graph");
    gated.require_tool_use = true;

    let summary = runner(agents, &recorder)
        .run(&plan(vec![gated], 1, 1), &samples(&["s1"]))
        .await
        .unwrap();

    assert_eq!(summary.runs[0].agent.response, "from the graph");
    assert_eq!(recorder.count("trial.tool_use_absent"), 1);
    assert_eq!(recorder.retries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn tool_use_gate_exhaustion_fails_the_run() {
    let recorder = Arc::new(RecordingObserver::default());
    let mut gated = condition("with-graph");
    gated.require_tool_use = true;

    let err = runner(FakeAgentFactory::returning(agent_outcome("guess")), &recorder)
        .run(&plan(vec![gated], 1, 1), &samples(&["s1"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "tool_use_absent");
    assert_eq!(recorder.count("trial.tool_use_absent"), 3);
}

#[tokio::test(start_paused = true)]
async fn tool_success_gate_only_applies_when_tools_were_called() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents = FakeAgentFactory::scripted(|call| match call.sample_id.as_str() {
        "no-tools" => Ok(agent_outcome("plain")),
        _ if call.call_index == 0 => Ok(agent_outcome_with_tools(
            "broken",
            vec![ToolInvocation::failed("graph_query")],
        )),
        _ => Ok(agent_outcome_with_tools(
            "fixed",
            vec![ToolInvocation::ok("graph_query")],
        )),
    });
    let mut gated = condition("with-graph");
    gated.require_tool_success = true;

    let summary = runner(agents, &recorder)
        .run(&plan(vec![gated], 1, 2), &samples(&["failing-tools", "no-tools"]))
        .await
        .unwrap();

    assert_eq!(summary.runs.len(), 2);
    assert_eq!(recorder.count("trial.tool_success_absent"), 1);
    assert_eq!(recorder.retries().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn backoff_releases_the_slot_for_other_trials() {
    let recorder = Arc::new(RecordingObserver::default());
    let agents = FakeAgentFactory::scripted(|call| {
        if call.sample_id == "flaky" && call.call_index == 0 {
            Err(CapabilityError::agent("timeout").retriable())
        } else {
            Ok(agent_outcome("ok"))
        }
    })
    .with_sample_latency("steady", Duration::from_secs(1));
    let mut p = plan(vec![condition("baseline")], 1, 1);
    p.settings.retry.initial_backoff = Duration::from_secs(10);
    let started = tokio::time::Instant::now();

    runner(agents, &recorder)
        .run(&p, &samples(&["flaky", "steady"]))
        .await
        .unwrap();

    // With the slot held across the backoff this would take 11s.
    let elapsed = started.elapsed();
    assert!(
        elapsed >= Duration::from_secs(10) && elapsed < Duration::from_secs(11),
        "elapsed {elapsed:?}"
    );
    assert_eq!(completed_samples(&recorder), ["steady", "flaky"]);
}

#[tokio::test]
async fn dataset_failure_is_a_setup_error() {
    struct Broken;
    impl evalgrid_core::dataset::DatasetSupplier for Broken {
        fn load(
            &self,
        ) -> Result<evalgrid_core::dataset::LoadedDataset, evalgrid_core::DatasetError> {
            Err(evalgrid_core::DatasetError::Empty {
                path: "qa.jsonl".into(),
            })
        }
    }

    let recorder = Arc::new(RecordingObserver::default());
    let err = runner(FakeAgentFactory::returning(agent_outcome("ok")), &recorder)
        .run(&plan(vec![condition("baseline")], 1, 1), &Broken)
        .await
        .unwrap_err();
    assert!(err.is_setup_error());
    assert_eq!(err.kind(), "dataset");
    assert!(recorder.events().is_empty());
}
