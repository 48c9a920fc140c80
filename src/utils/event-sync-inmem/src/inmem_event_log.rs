// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::collections::VecDeque;
use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use event_sync::*;
use internal_error::ResultIntoInternal;
use serde::{Deserialize, Serialize};

use crate::{EventCodec, InMemoryEventLogStorage, JsonEventCodec, StoredRecord};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub const DEFAULT_FETCH_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InMemoryEventLogConfig {
    /// Maximum number of records one background fetch brings in. Zero is
    /// treated as one.
    pub fetch_batch_size: usize,
}

impl Default for InMemoryEventLogConfig {
    fn default() -> Self {
        Self {
            fetch_batch_size: DEFAULT_FETCH_BATCH_SIZE,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// [`EventLog`] reading from and writing to an [`InMemoryEventLogStorage`]
pub struct InMemoryEventLog<Event, Codec = JsonEventCodec> {
    storage: InMemoryEventLogStorage,
    codec: Codec,
    config: InMemoryEventLogConfig,
    buffer: Arc<Mutex<LocalBuffer>>,
    sequence: SequenceNumber,
    _event: PhantomData<fn() -> Event>,
}

#[derive(Default)]
struct LocalBuffer {
    /// Last sequence brought in from storage
    fetched: SequenceNumber,
    pending: VecDeque<(SequenceNumber, StoredRecord)>,
    /// Bumped on reset so that fetches started earlier are dropped
    generation: u64,
}

impl<Event> InMemoryEventLog<Event, JsonEventCodec> {
    pub fn new(storage: InMemoryEventLogStorage) -> Self {
        Self::with_codec(storage, JsonEventCodec, InMemoryEventLogConfig::default())
    }
}

impl<Event, Codec> InMemoryEventLog<Event, Codec> {
    pub fn with_codec(
        storage: InMemoryEventLogStorage,
        codec: Codec,
        mut config: InMemoryEventLogConfig,
    ) -> Self {
        config.fetch_batch_size = config.fetch_batch_size.max(1);

        Self {
            storage,
            codec,
            config,
            buffer: Arc::new(Mutex::new(LocalBuffer::default())),
            sequence: SequenceNumber::ZERO,
            _event: PhantomData,
        }
    }

    pub fn storage(&self) -> &InMemoryEventLogStorage {
        &self.storage
    }

    /// Number of fetched records that were not consumed yet
    pub fn buffered_len(&self) -> usize {
        self.buffer.lock().unwrap().pending.len()
    }
}

#[async_trait::async_trait]
impl<Event, Codec> EventLog for InMemoryEventLog<Event, Codec>
where
    Event: Clone + std::fmt::Debug + Send + Sync + 'static,
    Codec: EventCodec<Event>,
{
    type Event = Event;

    fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    fn try_get_next(&mut self) -> Result<Option<LogEntry<Event>>, DecodeEventError> {
        let Some((sequence, record)) = self.buffer.lock().unwrap().pending.pop_front() else {
            return Ok(None);
        };

        self.sequence = sequence;

        match self.codec.decode(&record) {
            Ok(event) => Ok(Some(LogEntry::new(sequence, event))),
            Err(e) => Err(DecodeEventError::new(sequence, e)),
        }
    }

    fn background_fetch(&mut self, _cancel: CancellationToken) -> FetchFuture {
        let storage = self.storage.clone();
        let buffer = Arc::clone(&self.buffer);
        let batch_size = self.config.fetch_batch_size;
        let generation = buffer.lock().unwrap().generation;

        Box::pin(async move {
            // Records arrive asynchronously, after the caller got the future
            tokio::task::yield_now().await;

            let mut buffer = buffer.lock().unwrap();
            if buffer.generation != generation {
                return Ok(false);
            }

            let records = storage.read_after(buffer.fetched, batch_size);
            let Some((last_sequence, _)) = records.last() else {
                return Ok(false);
            };

            tracing::trace!(
                from = %buffer.fetched,
                to = %last_sequence,
                "Fetched records into the local buffer"
            );

            buffer.fetched = *last_sequence;
            buffer.pending.extend(records);
            Ok(true)
        })
    }

    async fn write(
        &mut self,
        events: Vec<Event>,
        _cancel: CancellationToken,
    ) -> Result<WriteOutcome, InternalError> {
        let records = events
            .iter()
            .map(|event| self.codec.encode(event))
            .collect::<Result<Vec<_>, _>>()
            .int_err()?;

        let mut buffer = self.buffer.lock().unwrap();

        // Writer must have consumed everything stored so far
        let Some(last_sequence) = self.storage.append_if_last(self.sequence, records) else {
            return Ok(WriteOutcome::Conflict);
        };

        let written = self.storage.read_after(self.sequence, events.len());
        buffer.pending.extend(written);
        buffer.fetched = last_sequence;

        Ok(WriteOutcome::Written(last_sequence))
    }

    async fn discard_up_to(
        &mut self,
        sequence: SequenceNumber,
        _cancel: CancellationToken,
    ) -> Result<(), InternalError> {
        let last_to_skip = SequenceNumber::new(sequence.into_inner().saturating_sub(1));
        let new_position = last_to_skip.min(self.storage.last_sequence());

        if new_position <= self.sequence {
            return Ok(());
        }

        let mut buffer = self.buffer.lock().unwrap();
        buffer.pending.retain(|(seq, _)| *seq > new_position);
        if buffer.fetched < new_position {
            buffer.fetched = new_position;
        }
        self.sequence = new_position;

        tracing::debug!(%new_position, "Discarded log prefix");
        Ok(())
    }

    fn reset(&mut self) {
        let mut buffer = self.buffer.lock().unwrap();
        buffer.pending.clear();
        buffer.fetched = SequenceNumber::ZERO;
        buffer.generation += 1;
        self.sequence = SequenceNumber::ZERO;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
