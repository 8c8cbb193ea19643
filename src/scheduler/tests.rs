//! End-to-end trigger execution against the in-memory build API.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use super::*;
use crate::buildapi::BuildRecord;
use crate::config::EngineConfig;
use crate::engine::{AllowList, TriggerEngine, TriggerOrigin, TriggerRequest};
use crate::test_utils::{LookupMode, MockBuildApi, PLAIN_TRY, finished, rev, started};
use crate::types::{Branch, Revision};

type Executor = TriggerExecutor<MockBuildApi, MockBuildApi>;

fn executor(engine: &Arc<TriggerEngine>, api: &MockBuildApi) -> Executor {
    TriggerExecutor::new(Arc::clone(engine), api.clone(), api.clone())
}

fn engine_with(config: EngineConfig) -> Arc<TriggerEngine> {
    Arc::new(TriggerEngine::new(config, AllowList::Everyone))
}

/// Registers `revision` and fails `builder` on it, returning the decision.
async fn fail(engine: &TriggerEngine, revision: &Revision, builder: &str) -> TriggerRequest {
    engine.handle_event(&started(revision, builder, PLAIN_TRY)).await;
    let mut requests = engine.handle_event(&finished(revision, builder, 1)).await;
    assert_eq!(requests.len(), 1, "expected one decision for {}", builder);
    requests.remove(0)
}

fn pool(executor: Executor, delay: Duration, shutdown: &CancellationToken) -> TriggerPool<MockBuildApi, MockBuildApi> {
    TriggerPool::new(executor, RetrySchedule::new(delay, 5), 2, shutdown.clone())
}

async fn wait_for_pending(pool: &TriggerPool<MockBuildApi, MockBuildApi>, n: usize) {
    for _ in 0..2000 {
        if pool.pending_retries().await == n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("never reached {} pending retries", n);
}

// ==================== Executor ====================

#[tokio::test]
async fn failure_triggers_the_found_build() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.seed(&r, &["b1"], 10);

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert_eq!(
        outcome,
        TriggerOutcome::Triggered {
            id: 1000,
            endpoint: "build"
        }
    );
    assert_eq!(api.triggered_for(1000), 2);
    assert_eq!(engine.stats().await.global_triggers, 2);
}

#[tokio::test]
async fn build_id_is_preferred_over_request_id() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.set_records(
        &r,
        vec![BuildRecord::request("b1", 7), BuildRecord::build("b1", 8)],
    );

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Triggered { id: 8, endpoint: "build" });
}

#[tokio::test]
async fn request_id_used_for_pending_builds() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.set_records(&r, vec![BuildRecord::request("b1", 7)]);

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Triggered { id: 7, endpoint: "request" });
    assert_eq!(api.triggered_for(7), 2);
}

#[tokio::test]
async fn enough_runs_already_exist() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.set_records(
        &r,
        vec![
            BuildRecord::build("b1", 1),
            BuildRecord::build("b1", 2),
            BuildRecord::build("b1", 3),
        ],
    );

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::AlreadySatisfied { found: 3 });
    assert!(api.triggers().is_empty());
    assert_eq!(engine.stats().await.global_triggers, 0);
}

#[tokio::test]
async fn as_many_runs_as_requested_still_triggers() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.set_records(&r, vec![BuildRecord::build("b1", 1), BuildRecord::build("b1", 2)]);

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Triggered { .. }));
}

#[tokio::test]
async fn nothing_recorded_yet_asks_for_retry() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.seed(&r, &["other"], 3);

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::RetryLater);
    assert_eq!(api.lookups(), 1);
    assert_eq!(engine.stats().await.global_triggers, 0);
}

#[tokio::test]
async fn evicted_revision_is_a_noop() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let request = TriggerRequest {
        branch: Branch::try_queue(),
        revision: rev(42),
        builder: "b1".into(),
        count: 2,
        origin: TriggerOrigin::Failure,
    };

    let outcome = executor(&engine, &api).execute(&request, 3).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::Evicted);
    assert_eq!(api.lookups(), 0);
    assert!(!engine.is_known(&Branch::try_queue(), &rev(42)).await);
}

#[tokio::test]
async fn malformed_revision_never_reaches_the_api() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let bad = Revision::new("NOT-A-REV");
    engine
        .handle_event(&started(&bad, "b1", "try: -b o --rebuild 3"))
        .await;
    let request = TriggerRequest {
        branch: Branch::try_queue(),
        revision: bad,
        builder: "b1".into(),
        count: 3,
        origin: TriggerOrigin::Requested,
    };

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::InvalidRevision);
    assert_eq!(api.lookups(), 0);
}

#[tokio::test]
async fn unparseable_lookup_is_an_error() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.set_mode(LookupMode::Malformed);

    let err = executor(&engine, &api).execute(&request, 0).await.unwrap_err();
    assert!(err.is_malformed());
    assert!(api.triggers().is_empty());
}

#[tokio::test]
async fn disallowed_user_is_accounted_but_not_triggered() {
    let engine = Arc::new(TriggerEngine::new(
        EngineConfig::new(),
        AllowList::only(["someone-else@example.com"]),
    ));
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.seed(&r, &["b1"], 0);

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert_eq!(outcome, TriggerOutcome::NotAllowed);
    assert!(api.triggers().is_empty());
    assert_eq!(api.lookups(), 0);
    assert_eq!(engine.stats().await.global_triggers, 2);
    assert_eq!(
        engine.entry(&Branch::try_queue(), &r).await.unwrap().rev_trigger_count,
        2
    );
}

#[tokio::test]
async fn disallowed_user_is_never_retried() {
    let engine = Arc::new(TriggerEngine::new(
        EngineConfig::new(),
        AllowList::only(["someone-else@example.com"]),
    ));
    let api = MockBuildApi::new();
    let shutdown = CancellationToken::new();
    let pool = pool(executor(&engine, &api), Duration::from_millis(1), &shutdown);

    // Nothing recorded for the builder, which would otherwise mean retries
    let request = fail(&engine, &rev(1), "b1").await;
    pool.submit(request).await.unwrap();

    assert_eq!(api.lookups(), 0);
    assert!(api.triggers().is_empty());
    assert_eq!(engine.stats().await.global_triggers, 2);
}

#[tokio::test]
async fn allowed_user_is_triggered() {
    let engine = Arc::new(TriggerEngine::new(
        EngineConfig::new(),
        AllowList::only(["dev@example.com"]),
    ));
    let api = MockBuildApi::new();
    let r = rev(1);
    let request = fail(&engine, &r, "b1").await;
    api.seed(&r, &["b1"], 0);

    let outcome = executor(&engine, &api).execute(&request, 0).await.unwrap();
    assert!(matches!(outcome, TriggerOutcome::Triggered { .. }));
}

// ==================== Quota ====================

#[tokio::test]
async fn small_push_stops_at_the_limit() {
    let engine = engine_with(EngineConfig::new().with_lower_trigger_limit(6));
    let api = MockBuildApi::new();
    let r = rev(1);
    let builders = ["b1", "b2", "b3", "b4", "b5"];
    api.seed(&r, &builders, 0);
    let exec = executor(&engine, &api);

    let mut outcomes = Vec::new();
    for b in builders {
        let request = fail(&engine, &r, b).await;
        outcomes.push(exec.execute(&request, 0).await.unwrap());
    }

    assert!(outcomes[..3]
        .iter()
        .all(|o| matches!(o, TriggerOutcome::Triggered { .. })));
    assert_eq!(
        outcomes[3..],
        [
            TriggerOutcome::OverTolerance { issued: 6, rev_total: 5 },
            TriggerOutcome::OverTolerance { issued: 6, rev_total: 5 },
        ]
    );
    assert_eq!(api.triggered_for(1003), 0);
    assert_eq!(api.triggered_for(1004), 0);
    assert_eq!(api.total_triggered(), 6);
    assert_eq!(
        engine.entry(&Branch::try_queue(), &r).await.unwrap().rev_trigger_count,
        6
    );
}

#[tokio::test]
async fn large_push_tolerates_more_failures() {
    let engine = engine_with(EngineConfig::new().with_lower_trigger_limit(6));
    let api = MockBuildApi::new();
    let r = rev(1);
    let builders = ["b1", "b2", "b3", "b4", "b5"];
    // 8 * 33 = 264 jobs are needed for the fifth builder's retries
    api.seed(&r, &builders, 300);
    let exec = executor(&engine, &api);

    for b in builders {
        let request = fail(&engine, &r, b).await;
        let outcome = exec.execute(&request, 0).await.unwrap();
        assert!(matches!(outcome, TriggerOutcome::Triggered { .. }), "{}: {:?}", b, outcome);
    }

    assert_eq!(api.total_triggered(), 10);
    assert_eq!(
        engine.entry(&Branch::try_queue(), &r).await.unwrap().rev_trigger_count,
        10
    );
}

#[tokio::test]
async fn concurrent_over_limit_requests_share_the_tolerance() {
    let engine = engine_with(EngineConfig::new().with_lower_trigger_limit(6));
    let api = MockBuildApi::new();
    let r = rev(1);
    let builders = ["b1", "b2", "b3", "b4", "b5"];
    // 200 jobs tolerate 6 issued runs (198) but not 8 (264)
    api.seed(&r, &builders, 195);
    let exec = executor(&engine, &api);

    for b in &builders[..3] {
        let request = fail(&engine, &r, b).await;
        assert!(matches!(
            exec.execute(&request, 0).await.unwrap(),
            TriggerOutcome::Triggered { .. }
        ));
    }
    let fourth = fail(&engine, &r, "b4").await;
    let fifth = fail(&engine, &r, "b5").await;
    assert_eq!(fourth.origin, TriggerOrigin::FailureOverLimit { issued: 6 });
    assert_eq!(fifth.origin, TriggerOrigin::FailureOverLimit { issued: 6 });

    let (a, b) = tokio::join!(exec.execute(&fourth, 0), exec.execute(&fifth, 0));
    let outcomes = [a.unwrap(), b.unwrap()];

    let triggered = outcomes
        .iter()
        .filter(|o| matches!(o, TriggerOutcome::Triggered { .. }))
        .count();
    assert_eq!(triggered, 1, "{:?}", outcomes);
    assert!(outcomes.contains(&TriggerOutcome::OverTolerance { issued: 8, rev_total: 200 }));
    assert_eq!(api.total_triggered(), 8);
    assert_eq!(
        engine.entry(&Branch::try_queue(), &r).await.unwrap().rev_trigger_count,
        8
    );
}

#[tokio::test]
async fn concurrent_over_limit_requests_on_a_wide_pool() {
    let engine = engine_with(EngineConfig::new().with_lower_trigger_limit(0));
    let api = MockBuildApi::new();
    let r = rev(1);
    let builders = ["b1", "b2", "b3", "b4"];
    // 0 issued always passes; 2 * 33 = 66 > 40 never does
    api.seed(&r, &builders, 36);
    let shutdown = CancellationToken::new();
    let pool = TriggerPool::new(
        executor(&engine, &api),
        RetrySchedule::new(Duration::from_millis(1), 0),
        4,
        shutdown.clone(),
    );

    let mut handles = Vec::new();
    for b in builders {
        handles.push(pool.submit(fail(&engine, &r, b).await));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(api.total_triggered(), 2);
    assert_eq!(
        engine.entry(&Branch::try_queue(), &r).await.unwrap().rev_trigger_count,
        2
    );
}

#[tokio::test]
async fn requested_triggers_ignore_the_failure_quota() {
    let engine = engine_with(EngineConfig::new().with_lower_trigger_limit(0));
    let api = MockBuildApi::new();
    let r = rev(1);
    api.seed(&r, &["b1"], 0);

    let requests = engine
        .handle_event(&started(&r, "b1", "try: -b o --rebuild 5"))
        .await;
    let outcome = executor(&engine, &api).execute(&requests[0], 0).await.unwrap();

    assert!(matches!(outcome, TriggerOutcome::Triggered { .. }));
    assert_eq!(api.triggered_for(1000), 5);
    assert_eq!(
        engine.entry(&Branch::try_queue(), &r).await.unwrap().rev_trigger_count,
        0
    );
}

// ==================== Pool ====================

#[tokio::test]
async fn pool_triggers_in_the_background() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    api.seed(&r, &["b1"], 0);
    let shutdown = CancellationToken::new();
    let pool = pool(executor(&engine, &api), Duration::from_millis(1), &shutdown);

    let request = fail(&engine, &r, "b1").await;
    pool.submit(request).await.unwrap();

    assert_eq!(api.triggered_for(1000), 2);
    assert_eq!(pool.pending_retries().await, 0);
}

#[tokio::test]
async fn pool_gives_up_after_max_attempts() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let shutdown = CancellationToken::new();
    let pool = pool(executor(&engine, &api), Duration::from_millis(1), &shutdown);

    let request = fail(&engine, &rev(1), "b1").await;
    pool.submit(request).await.unwrap();

    // The first lookup plus five re-attempts
    assert_eq!(api.lookups(), 6);
    assert!(api.triggers().is_empty());
    assert_eq!(pool.pending_retries().await, 0);
}

#[tokio::test]
async fn pool_retry_finds_late_records() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let r = rev(1);
    let shutdown = CancellationToken::new();
    let pool = pool(executor(&engine, &api), Duration::from_millis(50), &shutdown);

    let request = fail(&engine, &r, "b1").await;
    let handle = pool.submit(request);
    wait_for_pending(&pool, 1).await;
    api.seed(&r, &["b1"], 0);
    handle.await.unwrap();

    assert_eq!(api.lookups(), 2);
    assert_eq!(api.triggered_for(1000), 2);
}

#[tokio::test]
async fn shutdown_cancels_scheduled_retries() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let shutdown = CancellationToken::new();
    let pool = pool(executor(&engine, &api), Duration::from_secs(3600), &shutdown);

    let first = pool.submit(fail(&engine, &rev(1), "b1").await);
    let second = pool.submit(fail(&engine, &rev(2), "b1").await);
    wait_for_pending(&pool, 2).await;

    shutdown.cancel();
    first.await.unwrap();
    second.await.unwrap();

    assert_eq!(api.lookups(), 2);
    assert_eq!(pool.pending_retries().await, 0);
}

#[tokio::test]
async fn retries_can_be_cancelled_per_revision() {
    let engine = engine_with(EngineConfig::new());
    let api = MockBuildApi::new();
    let shutdown = CancellationToken::new();
    let pool = pool(executor(&engine, &api), Duration::from_secs(3600), &shutdown);

    let first = pool.submit(fail(&engine, &rev(1), "b1").await);
    let _second = pool.submit(fail(&engine, &rev(2), "b1").await);
    wait_for_pending(&pool, 2).await;

    assert_eq!(pool.cancel_revision(&Branch::try_queue(), &rev(1)).await, 1);
    first.await.unwrap();
    assert_eq!(pool.pending_retries().await, 1);
    shutdown.cancel();
}

#[tokio::test]
async fn retry_after_eviction_does_nothing() {
    let engine = engine_with(EngineConfig::new().with_revmap_threshold(3));
    let api = MockBuildApi::new();
    let shutdown = CancellationToken::new();
    let pool = pool(executor(&engine, &api), Duration::from_millis(50), &shutdown);

    let handle = pool.submit(fail(&engine, &rev(1), "b1").await);
    wait_for_pending(&pool, 1).await;

    for n in 2..=4 {
        engine.handle_event(&started(&rev(n), "b1", PLAIN_TRY)).await;
    }
    assert!(!engine.is_known(&Branch::try_queue(), &rev(1)).await);
    api.seed(&rev(1), &["b1"], 0);
    handle.await.unwrap();

    assert_eq!(api.lookups(), 1);
    assert!(api.triggers().is_empty());
    assert!(!engine.is_known(&Branch::try_queue(), &rev(1)).await);
}
