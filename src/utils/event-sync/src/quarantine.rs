// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::{Arc, Mutex};

use internal_error::BoxedError;
use thiserror::Error;

use crate::{DecodeEventError, SequenceNumber};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Write-only sink for events that could not be decoded or applied
pub trait Quarantine<Event>: Send + Sync {
    fn add(&self, sequence: SequenceNumber, reason: QuarantineReason);

    fn add_with_event(&self, sequence: SequenceNumber, event: Event, reason: QuarantineReason);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum QuarantineReason {
    #[error(transparent)]
    Decode(DecodeEventError),

    #[error("Projection rejected the event")]
    Apply(#[source] BoxedError),

    #[error("Listener #{listener_index} failed to handle the event")]
    Listener {
        listener_index: usize,
        #[source]
        source: BoxedError,
    },
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug)]
pub struct QuarantineEntry<Event> {
    pub sequence: SequenceNumber,
    pub event: Option<Event>,
    pub reason: QuarantineReason,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Keeps quarantined entries in memory for the lifetime of the process
pub struct InMemoryQuarantine<Event> {
    entries: Mutex<Vec<Arc<QuarantineEntry<Event>>>>,
}

impl<Event> InMemoryQuarantine<Event> {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
        }
    }

    /// Entries in the order they were recorded
    pub fn entries(&self) -> Vec<Arc<QuarantineEntry<Event>>> {
        self.entries.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sequences(&self) -> Vec<SequenceNumber> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|e| e.sequence)
            .collect()
    }

    fn push(&self, entry: QuarantineEntry<Event>) {
        self.entries.lock().unwrap().push(Arc::new(entry));
    }
}

impl<Event> Default for InMemoryQuarantine<Event> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Event: Send + Sync> Quarantine<Event> for InMemoryQuarantine<Event> {
    fn add(&self, sequence: SequenceNumber, reason: QuarantineReason) {
        self.push(QuarantineEntry {
            sequence,
            event: None,
            reason,
        });
    }

    fn add_with_event(&self, sequence: SequenceNumber, event: Event, reason: QuarantineReason) {
        self.push(QuarantineEntry {
            sequence,
            event: Some(event),
            reason,
        });
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
