//! End-to-end flows through the public service API, backed by in-memory
//! stores. These mirror how the push-channel handlers drive the controller:
//! mutate, re-read the merged list, fan it out.

mod support;

use support::{service_with_stores, task_at};
use tasktide::application::events::TodoFeed;
use tasktide::application::stores::StoreTier;

#[tokio::test]
async fn single_add_round_trips_with_field_fidelity() {
    let (service, _hot, _) = service_with_stores(true, 50);

    let added = service.add("water the plants").await.expect("add").task;

    let listing = service.list().await.expect("list");
    assert_eq!(listing.tasks.len(), 1);
    let got = &listing.tasks[0];
    assert_eq!(got.id, added.id);
    assert_eq!(got.text, "water the plants");
    assert!(!got.completed);
    assert_eq!(got.created_at, added.created_at);
}

#[tokio::test]
async fn fifty_first_add_drains_the_first_fifty() {
    let (service, hot, cold) = service_with_stores(true, 50);
    let cold = cold.expect("archive configured");

    let mut ids = Vec::new();
    for round in 0..51 {
        let outcome = service.add(&format!("task {round}")).await.expect("add");
        ids.push(outcome.task.id.clone());
        assert!(
            hot.snapshot().len() <= 50,
            "hot set exceeded the threshold after add {round}"
        );
        if round < 50 {
            assert!(outcome.migration.is_none());
        } else {
            let report = outcome.migration.expect("migration fired on the 51st add");
            assert_eq!(report.moved, 50);
            assert!(report.archive_error.is_none());
        }
    }

    let hot_now = hot.snapshot();
    assert_eq!(hot_now.len(), 1);
    assert_eq!(hot_now[0].id, ids[50]);

    let mut archived: Vec<String> = cold.snapshot().into_iter().map(|task| task.id).collect();
    archived.sort();
    let mut expected = ids[..50].to_vec();
    expected.sort();
    assert_eq!(archived, expected);

    // The merged view still reaches every task exactly once.
    let listing = service.list().await.expect("list");
    assert_eq!(listing.tasks.len(), 51);
}

#[tokio::test]
async fn hot_set_grows_unbounded_without_an_archive() {
    let (service, hot, _) = service_with_stores(false, 50);

    for round in 0..60 {
        let outcome = service.add(&format!("task {round}")).await.expect("add");
        assert!(outcome.migration.is_none());
    }

    assert_eq!(hot.snapshot().len(), 60);
    assert!(!service.archive_available());
}

#[tokio::test]
async fn archived_tasks_stay_reachable_for_toggle_and_delete() {
    let (service, hot, cold) = service_with_stores(true, 3);
    let cold = cold.expect("archive configured");

    let mut ids = Vec::new();
    for round in 0..4 {
        let outcome = service.add(&format!("task {round}")).await.expect("add");
        ids.push(outcome.task.id.clone());
    }
    assert_eq!(hot.snapshot().len(), 1);
    assert_eq!(cold.snapshot().len(), 3);

    let toggled = service.toggle(&ids[0]).await.expect("toggle");
    assert_eq!(toggled.applied, Some(StoreTier::Archive));

    let deleted = service.delete(&ids[1]).await.expect("delete");
    assert_eq!(deleted.applied, Some(StoreTier::Archive));

    let deleted = service.delete(&ids[3]).await.expect("delete");
    assert_eq!(deleted.applied, Some(StoreTier::Hot));
    assert!(hot.snapshot().is_empty());

    let listing = service.list().await.expect("list");
    let mut remaining: Vec<(String, bool)> = listing
        .tasks
        .into_iter()
        .map(|task| (task.id, task.completed))
        .collect();
    remaining.sort();
    let mut expected = vec![(ids[0].clone(), true), (ids[2].clone(), false)];
    expected.sort();
    assert_eq!(remaining, expected);
}

#[tokio::test]
async fn toggling_twice_restores_the_original_state() {
    let (service, hot, _) = service_with_stores(true, 50);
    let task = service.add("flip me").await.expect("add").task;

    service.toggle(&task.id).await.expect("toggle");
    assert!(hot.snapshot()[0].completed);

    service.toggle(&task.id).await.expect("toggle");
    assert!(!hot.snapshot()[0].completed);
}

#[tokio::test]
async fn list_orders_both_tiers_newest_first() {
    let (service, hot, cold) = service_with_stores(true, 50);
    let cold = cold.expect("archive configured");

    hot.seed(vec![task_at("warm-new", 400), task_at("warm-old", 100)]);
    cold.seed(vec![task_at("cold-mid", 300), task_at("cold-older", 200)]);

    let listing = service.list().await.expect("list");
    let order: Vec<&str> = listing.tasks.iter().map(|task| task.id.as_str()).collect();
    assert_eq!(order, ["warm-new", "cold-mid", "cold-older", "warm-old"]);
}

#[tokio::test]
async fn deleting_an_unknown_id_touches_neither_tier() {
    let (service, hot, cold) = service_with_stores(true, 50);
    let cold = cold.expect("archive configured");

    service.add("keep me").await.expect("add");
    let outcome = service.delete("no-such-id").await.expect("delete");

    assert!(outcome.applied.is_none());
    assert!(outcome.archive_error.is_none());
    assert_eq!(hot.snapshot().len(), 1);
    assert!(cold.snapshot().is_empty());
}

#[tokio::test]
async fn failed_bulk_insert_never_loses_the_new_task() {
    let (service, hot, cold) = service_with_stores(true, 2);
    let cold = cold.expect("archive configured");
    cold.fail_inserts();

    for round in 0..2 {
        service.add(&format!("task {round}")).await.expect("add");
    }
    let outcome = service.add("the straw").await.expect("add");

    let report = outcome.migration.expect("migration attempted");
    assert_eq!(report.moved, 0);
    assert!(report.archive_error.is_some());

    let hot_now = hot.snapshot();
    assert_eq!(hot_now.len(), 1);
    assert_eq!(hot_now[0].id, outcome.task.id);
    assert!(cold.snapshot().is_empty());
}

#[tokio::test]
async fn mutation_snapshots_fan_out_to_every_subscriber() {
    let (service, _hot, _) = service_with_stores(false, 50);
    let feed = TodoFeed::new(8);
    let mut first = feed.subscribe();
    let mut second = feed.subscribe();

    let added = service.add("share me").await.expect("add").task;
    let listing = service.list().await.expect("list");
    feed.publish(listing.tasks);

    let snapshot = first.recv().await.expect("first subscriber snapshot");
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, added.id);

    let snapshot = second.recv().await.expect("second subscriber snapshot");
    assert_eq!(snapshot[0].id, added.id);
}
