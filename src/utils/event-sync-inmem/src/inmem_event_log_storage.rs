// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};

use event_sync::SequenceNumber;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub type StoredRecord = Arc<[u8]>;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// The "remote" side of an in-memory log: encoded records shared by every
/// [`crate::InMemoryEventLog`] created over it.
///
/// Cloning yields another handle to the same records.
#[derive(Clone, Default)]
pub struct InMemoryEventLogStorage {
    state: Arc<Mutex<State>>,
}

#[derive(Default)]
struct State {
    // Record at index `i` has sequence `i + 1`
    records: Vec<StoredRecord>,
}

impl InMemoryEventLogStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sequence of the last stored record
    pub fn last_sequence(&self) -> SequenceNumber {
        let state = self.state.lock().unwrap();
        Self::last_sequence_of(&state)
    }

    /// Stores a record no matter what other writers did, returning its
    /// sequence.
    ///
    /// Useful to seed the log or to simulate foreign writers and corrupted
    /// records.
    pub fn append_raw(&self, record: impl Into<Vec<u8>>) -> SequenceNumber {
        let record: Vec<u8> = record.into();

        let mut state = self.state.lock().unwrap();
        state.records.push(record.into());
        Self::last_sequence_of(&state)
    }

    /// Stores records only if the last stored sequence is still
    /// `expected_last`; returns the new last sequence on success
    pub fn append_if_last(
        &self,
        expected_last: SequenceNumber,
        records: Vec<Vec<u8>>,
    ) -> Option<SequenceNumber> {
        let mut state = self.state.lock().unwrap();

        if Self::last_sequence_of(&state) != expected_last {
            return None;
        }

        state
            .records
            .extend(records.into_iter().map(StoredRecord::from));
        Some(Self::last_sequence_of(&state))
    }

    /// Up to `limit` records following `after`, in order
    pub fn read_after(
        &self,
        after: SequenceNumber,
        limit: usize,
    ) -> Vec<(SequenceNumber, StoredRecord)> {
        let state = self.state.lock().unwrap();
        let skip = usize::try_from(after.into_inner()).unwrap();

        state
            .records
            .iter()
            .enumerate()
            .skip(skip)
            .take(limit)
            .map(|(i, record)| (Self::sequence_at(i), Arc::clone(record)))
            .collect()
    }

    fn last_sequence_of(state: &State) -> SequenceNumber {
        SequenceNumber::new(u64::try_from(state.records.len()).unwrap())
    }

    fn sequence_at(index: usize) -> SequenceNumber {
        SequenceNumber::new(u64::try_from(index + 1).unwrap())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
