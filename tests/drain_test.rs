//! Offline queue drain behavior, end to end over a real (in-memory) store.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use helpers::{food, memory_pool, RecordingNotifier, ScriptedProvider};

use calosnap::db::queries;
use calosnap::models::meal::day_label;
use calosnap::services::analysis::{CloudProvider, ProviderRegistry};
use calosnap::services::connectivity::{StaticNetworkState, Transport};
use calosnap::services::drain::{drain_offline_queue, OfflineAnalysisJob};
use calosnap::services::scheduler::{
    Constraint, DeferredJobScheduler, JobOutcome, JobScheduler, SchedulerOptions,
};

#[tokio::test]
async fn successful_drain_logs_every_meal_with_its_capture_timestamp() {
    let pool = memory_pool().await;
    let timestamps = [1_700_000_000_000_i64, 1_700_000_060_000, 1_700_003_600_000];
    for (i, ts) in timestamps.iter().enumerate() {
        queries::enqueue_request(&pool, &format!("img-{i}"), *ts)
            .await
            .unwrap();
    }

    let provider = ScriptedProvider::new(vec![
        Ok(food("김치찌개", 450, 30.0, 20.0, 15.0)),
        Ok(food("bibimbap", 560, 80.0, 18.0, 12.0)),
        Ok(food("salad", 180, 10.0, 5.0, 9.0)),
    ]);
    let notifier = RecordingNotifier::default();

    let outcome = drain_offline_queue(&pool, &provider, &notifier).await;
    assert_eq!(outcome, JobOutcome::Success);

    // Exactly N meals, each under its original capture timestamp.
    let meals = queries::list_meals(&pool).await.unwrap();
    assert_eq!(meals.len(), 3);
    // The list is newest-first; the queue drained oldest-first.
    assert_eq!(meals[2].food_name, "김치찌개");
    assert_eq!(meals[2].eaten_at_ms, timestamps[0]);
    assert_eq!(meals[1].eaten_at_ms, timestamps[1]);
    assert_eq!(meals[0].eaten_at_ms, timestamps[2]);
    for meal in &meals {
        assert_eq!(meal.day, day_label(meal.eaten_at_ms));
    }

    // Queue fully drained; one notification per record, in drain order.
    assert!(queries::pending_requests(&pool).await.unwrap().is_empty());
    assert_eq!(notifier.notified(), vec!["김치찌개", "bibimbap", "salad"]);
}

#[tokio::test]
async fn drain_processes_records_oldest_first() {
    let pool = memory_pool().await;
    // Two records share a timestamp; insertion order breaks the tie.
    for (payload, ts) in [
        ("first", 1_700_000_000_000_i64),
        ("second", 1_700_000_000_000),
        ("third", 1_700_000_500_000),
    ] {
        queries::enqueue_request(&pool, payload, ts).await.unwrap();
    }

    let provider = ScriptedProvider::new(vec![
        Ok(food("a", 1, 0.0, 0.0, 0.0)),
        Ok(food("b", 2, 0.0, 0.0, 0.0)),
        Ok(food("c", 3, 0.0, 0.0, 0.0)),
    ]);
    let notifier = RecordingNotifier::default();

    drain_offline_queue(&pool, &provider, &notifier).await;
    assert_eq!(provider.calls(), vec!["first", "second", "third"]);
}

#[tokio::test]
async fn failure_aborts_the_batch_and_keeps_remaining_records() {
    let pool = memory_pool().await;
    for i in 0..3_i64 {
        queries::enqueue_request(&pool, &format!("img-{i}"), 1_700_000_000_000 + i * 1_000)
            .await
            .unwrap();
    }

    let provider = ScriptedProvider::new(vec![
        Ok(food("gukbap", 400, 35.0, 22.0, 10.0)),
        Err("model overloaded".to_string()),
    ]);
    let notifier = RecordingNotifier::default();

    let outcome = drain_offline_queue(&pool, &provider, &notifier).await;
    assert_eq!(outcome, JobOutcome::Retry);

    // Record 1 committed and removed; record 3 never attempted.
    assert_eq!(provider.calls().len(), 2);
    assert_eq!(queries::list_meals(&pool).await.unwrap().len(), 1);
    assert_eq!(notifier.notified(), vec!["gukbap"]);

    let remaining = queries::pending_requests(&pool).await.unwrap();
    assert_eq!(remaining.len(), 2);
    assert_eq!(remaining[0].image_base64, "img-1");
    assert_eq!(remaining[0].created_at_ms, 1_700_000_001_000);
    assert_eq!(remaining[1].image_base64, "img-2");

    // The next trigger picks up exactly where the failure left off.
    let provider = ScriptedProvider::new(vec![
        Ok(food("ramen", 550, 70.0, 15.0, 18.0)),
        Ok(food("kimbap", 320, 50.0, 9.0, 8.0)),
    ]);
    let outcome = drain_offline_queue(&pool, &provider, &notifier).await;
    assert_eq!(outcome, JobOutcome::Success);
    assert_eq!(provider.calls(), vec!["img-1", "img-2"]);
    assert!(queries::pending_requests(&pool).await.unwrap().is_empty());
    assert_eq!(queries::list_meals(&pool).await.unwrap().len(), 3);
}

#[tokio::test]
async fn empty_queue_drain_is_a_successful_noop() {
    let pool = memory_pool().await;
    let provider = ScriptedProvider::new(vec![]);
    let notifier = RecordingNotifier::default();

    let outcome = drain_offline_queue(&pool, &provider, &notifier).await;

    assert_eq!(outcome, JobOutcome::Success);
    assert!(provider.calls().is_empty());
    assert!(notifier.notified().is_empty());
    assert!(queries::list_meals(&pool).await.unwrap().is_empty());
}

#[tokio::test]
async fn rapid_reconnect_neither_loses_nor_duplicates_the_image() {
    let pool = memory_pool().await;
    let payload = "aGVsbG8gZm9vZA==";
    queries::enqueue_request(&pool, payload, 1_700_000_000_000)
        .await
        .unwrap();

    let provider = ScriptedProvider::new(vec![Ok(food("toast", 220, 30.0, 6.0, 8.0))]);
    let notifier = RecordingNotifier::default();

    let outcome = drain_offline_queue(&pool, &provider, &notifier).await;
    assert_eq!(outcome, JobOutcome::Success);
    assert_eq!(provider.calls(), vec![payload.to_string()]);
    assert_eq!(queries::list_meals(&pool).await.unwrap().len(), 1);

    // A second trigger finds an empty queue and does nothing.
    let outcome = drain_offline_queue(&pool, &provider, &notifier).await;
    assert_eq!(outcome, JobOutcome::Success);
    assert_eq!(provider.calls().len(), 1);
    assert_eq!(queries::list_meals(&pool).await.unwrap().len(), 1);
}

#[tokio::test]
async fn scheduled_drain_waits_for_connectivity_then_runs() {
    let pool = memory_pool().await;
    queries::enqueue_request(&pool, "offline-img", 1_700_000_000_000)
        .await
        .unwrap();

    let providers = Arc::new(ProviderRegistry::new(
        Arc::new(ScriptedProvider::new(vec![Ok(food(
            "갈비탕", 520, 20.0, 40.0, 22.0,
        ))])),
        Arc::new(ScriptedProvider::new(vec![])),
        CloudProvider::OpenAi,
    ));
    let notifier = Arc::new(RecordingNotifier::default());
    let network = Arc::new(StaticNetworkState::new(vec![]));

    let job = Arc::new(OfflineAnalysisJob::new(
        pool.clone(),
        providers,
        notifier.clone(),
    ));
    let scheduler = DeferredJobScheduler::spawn(
        network.clone(),
        job,
        SchedulerOptions {
            poll_interval: Duration::from_millis(10),
            initial_backoff: Duration::from_millis(10),
            max_backoff: Duration::from_millis(40),
        },
    );

    scheduler
        .schedule(Constraint::NetworkConnected)
        .await
        .unwrap();

    // Still offline: the record must stay queued.
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(queries::pending_requests(&pool).await.unwrap().len(), 1);

    network.set(vec![Transport::Cellular]);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert!(queries::pending_requests(&pool).await.unwrap().is_empty());
    assert_eq!(queries::list_meals(&pool).await.unwrap().len(), 1);
    assert_eq!(notifier.notified(), vec!["갈비탕"]);
}
