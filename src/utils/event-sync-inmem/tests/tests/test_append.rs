// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::convert::Infallible;

use event_sync::*;
use event_sync_inmem::*;
use pretty_assertions::assert_eq;

use super::harness::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
#[error("Cannot withdraw {requested}, balance is {balance}")]
struct InsufficientFundsError {
    requested: u64,
    balance: u64,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_append_events() {
    let storage = InMemoryEventLogStorage::new();
    let mut harness = SyncHarness::new(&storage);
    harness.initialize().await;

    let res = harness
        .synchronizer
        .append_events(
            |_: &Account| Ok::<_, Infallible>(vec![AccountEvent::Deposited(10)]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        res,
        AppendResult {
            requested: 1,
            committed_sequence: Some(SequenceNumber::new(1)),
            payload: (),
        }
    );
    assert_eq!(harness.current(), Account::new(10, 1));
    assert_eq!(harness.synchronizer.sequence(), SequenceNumber::new(1));
    assert_eq!(harness.synchronizer.sync_step(), 2);
    assert_eq!(storage.last_sequence(), SequenceNumber::new(1));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_append_zero_events_writes_nothing() {
    let storage = InMemoryEventLogStorage::new();
    let mut harness = SyncHarness::new(&storage);
    harness.initialize().await;

    let res = harness
        .synchronizer
        .append_events_with_payload(
            |state: &Account| Ok::<_, Infallible>((Vec::new(), state.balance)),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(
        res,
        AppendResult {
            requested: 0,
            committed_sequence: None,
            payload: 0,
        }
    );
    assert_eq!(harness.synchronizer.sync_step(), 1);
    assert_eq!(storage.last_sequence(), SequenceNumber::ZERO);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_append_builder_error_is_returned_verbatim() {
    let storage = InMemoryEventLogStorage::new();
    seed(&storage, &[AccountEvent::Deposited(5)]);

    let mut harness = SyncHarness::new(&storage);
    harness.initialize().await;

    let res = harness
        .synchronizer
        .append_events(
            |state: &Account| {
                if state.balance < 20 {
                    Err(InsufficientFundsError {
                        requested: 20,
                        balance: state.balance,
                    })
                } else {
                    Ok(vec![AccountEvent::Withdrawn(20)])
                }
            },
            CancellationToken::new(),
        )
        .await;

    let Err(err) = res else {
        panic!("Expected the builder error");
    };
    assert_eq!(
        err.builder_error(),
        Some(InsufficientFundsError {
            requested: 20,
            balance: 5,
        })
    );
    assert_eq!(storage.last_sequence(), SequenceNumber::new(1));
    assert_eq!(harness.synchronizer.sync_step(), 1);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_append_retries_with_fresh_state_after_conflict() {
    let storage = InMemoryEventLogStorage::new();

    let mut writer_a = SyncHarness::new(&storage);
    let mut writer_b = SyncHarness::new(&storage);
    writer_a.initialize().await;
    writer_b.initialize().await;

    writer_a
        .synchronizer
        .append_events(
            |_: &Account| Ok::<_, Infallible>(vec![AccountEvent::Deposited(10)]),
            CancellationToken::new(),
        )
        .await
        .unwrap();

    // Writer B has not seen A's event, so its first attempt conflicts
    let mut builds = Vec::new();
    let res = writer_b
        .synchronizer
        .append_events_with_payload(
            |state: &Account| {
                builds.push(state.balance);
                Ok::<_, Infallible>((
                    vec![AccountEvent::Deposited(state.balance + 1)],
                    state.balance,
                ))
            },
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(builds, [0, 10]);
    assert_eq!(
        res,
        AppendResult {
            requested: 1,
            committed_sequence: Some(SequenceNumber::new(2)),
            payload: 10,
        }
    );
    assert_eq!(writer_b.current(), Account::new(21, 2));
    // Initialization, catch-up after the conflict and the append itself
    assert_eq!(writer_b.synchronizer.sync_step(), 3);

    writer_a.catch_up().await;
    assert_eq!(writer_a.current(), writer_b.current());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_append_unconditionally() {
    let storage = InMemoryEventLogStorage::new();
    let mut writer = SyncHarness::new(&storage);
    writer.initialize().await;

    seed(&storage, &[AccountEvent::Deposited(10)]);

    let res = writer
        .synchronizer
        .append_events_unconditionally(
            vec![AccountEvent::Deposited(1), AccountEvent::Deposited(2)],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(res.requested, 2);
    assert_eq!(res.committed_sequence, Some(SequenceNumber::new(3)));
    assert_eq!(writer.current(), Account::new(13, 3));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_append_gives_up_after_max_attempts() {
    let storage = InMemoryEventLogStorage::new();
    let mut writer = SyncHarness::builder(&storage)
        .config(SynchronizerConfig::builder().max_append_attempts(1).build())
        .build();
    writer.initialize().await;

    seed(&storage, &[AccountEvent::Deposited(10)]);

    let res = writer
        .synchronizer
        .append_events_unconditionally(vec![AccountEvent::Deposited(1)], CancellationToken::new())
        .await;

    assert!(matches!(res, Err(AppendError::Internal(_))), "{res:?}");
    assert_eq!(storage.last_sequence(), SequenceNumber::new(1));
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_appended_events_reach_listeners() {
    let storage = InMemoryEventLogStorage::new();
    seed(&storage, &[AccountEvent::Deposited(10)]);

    let mut writer = SyncHarness::new(&storage);
    let seen = writer.record_committed(1);
    writer.initialize().await;

    writer
        .synchronizer
        .append_events_unconditionally(
            vec![AccountEvent::Withdrawn(4), AccountEvent::Deposited(1)],
            CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(*seen.lock().unwrap(), [1, 2, 3]);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[test_log::test(tokio::test)]
async fn test_appended_event_rejected_by_projection_is_quarantined() {
    let storage = InMemoryEventLogStorage::new();
    let mut writer = SyncHarness::new(&storage);
    writer.initialize().await;

    let res = writer
        .synchronizer
        .append_events_unconditionally(vec![AccountEvent::Withdrawn(100)], CancellationToken::new())
        .await
        .unwrap();

    // The write itself succeeded
    assert_eq!(res.committed_sequence, Some(SequenceNumber::new(1)));
    assert_eq!(writer.quarantined(), [1]);
    assert_eq!(writer.current(), Account::default());
    assert!(writer.synchronizer.is_possibly_inconsistent());
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
