// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use event_sync::*;
use event_sync_inmem::*;
use pretty_assertions::assert_eq;

use super::harness::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_try_save_persists_snapshot() {
    let storage = InMemoryEventLogStorage::new();
    seed(
        &storage,
        &[AccountEvent::Deposited(10), AccountEvent::Withdrawn(4)],
    );

    let cache = Arc::new(InMemorySnapshotCache::<Account>::new());
    let mut harness = SyncHarness::builder(&storage).cache(cache.clone()).build();
    harness.initialize().await;

    let saved = harness
        .synchronizer
        .try_save(CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert!(saved);

    let snapshot = cache.get().unwrap();
    assert_eq!(snapshot.sequence, SequenceNumber::new(2));
    assert_eq!(*snapshot.state, Account::new(6, 2));
    assert!(!snapshot.possibly_inconsistent);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_try_save_skips_empty_projection() {
    let storage = InMemoryEventLogStorage::new();

    let cache = Arc::new(InMemorySnapshotCache::<Account>::new());
    let mut harness = SyncHarness::builder(&storage).cache(cache.clone()).build();
    harness.initialize().await;

    let saved = harness
        .synchronizer
        .try_save(CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    assert!(!saved);
    assert!(cache.get().is_none());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_snapshot_keeps_inconsistency_flag() {
    let storage = InMemoryEventLogStorage::new();
    seed(&storage, &[AccountEvent::Deposited(3)]);
    storage.append_raw(b"\xff".to_vec());
    seed(&storage, &[AccountEvent::Deposited(4)]);

    let cache = Arc::new(InMemorySnapshotCache::<Account>::new());

    let mut first = SyncHarness::builder(&storage).cache(cache.clone()).build();
    first.initialize().await;
    first
        .synchronizer
        .try_save(CancellationToken::new())
        .await
        .unwrap()
        .unwrap();

    let mut second = SyncHarness::builder(&storage).cache(cache.clone()).build();
    let outcome = second.initialize().await;

    assert_eq!(
        outcome,
        InitializeOutcome::RestoredFromSnapshot {
            sequence: SequenceNumber::new(3)
        }
    );
    assert!(second.synchronizer.is_possibly_inconsistent());
    assert_eq!(second.current(), Account::new(7, 2));
    // The corrupt event was folded into the snapshot, not read again
    assert!(second.quarantine.is_empty());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_json_file_snapshot_survives_restart() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("snapshots").join("account.json");

    let storage = InMemoryEventLogStorage::new();
    seed(
        &storage,
        &[AccountEvent::Deposited(10), AccountEvent::Deposited(20)],
    );

    let mut first = SyncHarness::builder(&storage)
        .cache(Arc::new(JsonFileSnapshotCache::<Account>::new(&path)))
        .build();
    first.initialize().await;
    let saved = first
        .synchronizer
        .try_save(CancellationToken::new())
        .await
        .unwrap()
        .unwrap();
    assert!(saved);
    assert!(path.exists());

    seed(&storage, &[AccountEvent::Withdrawn(5)]);

    let mut second = SyncHarness::builder(&storage)
        .cache(Arc::new(JsonFileSnapshotCache::<Account>::new(&path)))
        .build();
    let outcome = second.initialize().await;

    assert_eq!(
        outcome,
        InitializeOutcome::RestoredFromSnapshot {
            sequence: SequenceNumber::new(2)
        }
    );
    assert_eq!(second.current(), Account::new(25, 3));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_json_file_snapshot_missing_or_corrupt() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("account.json");
    let cache = JsonFileSnapshotCache::<Account>::new(&path);

    assert!(cache.load().await.unwrap().is_none());

    std::fs::write(&path, b"{\"sequence\": 3, \"state\": ").unwrap();
    assert!(cache.load().await.unwrap().is_none());

    let storage = InMemoryEventLogStorage::new();
    seed(&storage, &[AccountEvent::Deposited(1)]);

    let mut harness = SyncHarness::builder(&storage)
        .cache(Arc::new(cache))
        .build();
    assert_eq!(
        harness.initialize().await,
        InitializeOutcome::ReplayedFromScratch
    );
    assert_eq!(harness.current(), Account::new(1, 1));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_json_file_overlapping_saves() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("account.json");

    let storage = InMemoryEventLogStorage::new();
    seed(&storage, &[AccountEvent::Deposited(10)]);

    let mut harness = SyncHarness::builder(&storage)
        .cache(Arc::new(JsonFileSnapshotCache::<Account>::new(&path)))
        .build();
    harness.initialize().await;

    for _ in 0..5 {
        let first = harness.synchronizer.try_save(CancellationToken::new());
        let second = harness.synchronizer.try_save(CancellationToken::new());

        assert!(first.await.unwrap().unwrap());
        assert!(second.await.unwrap().unwrap());
    }

    let snapshot = JsonFileSnapshotCache::<Account>::new(&path)
        .load()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.sequence, SequenceNumber::new(1));
    assert_eq!(*snapshot.state, Account::new(10, 1));

    // No temporary files are left next to the snapshot
    let file_names: Vec<_> = std::fs::read_dir(temp_dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name())
        .collect();
    assert_eq!(file_names, [std::ffi::OsString::from("account.json")]);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
