// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use futures::future::BoxFuture;
use internal_error::InternalError;
use tokio_util::sync::CancellationToken;

use crate::{DecodeEventError, SequenceNumber};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Completes once a background fetch round is over, telling whether new
/// events were appended to the local buffer
pub type FetchFuture = BoxFuture<'static, Result<bool, InternalError>>;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Append-only ordered sequence of events, consisting of a remote part and a
/// locally buffered part that has been fetched but not consumed yet
#[async_trait::async_trait]
pub trait EventLog: Send + Sync {
    type Event: Clone + std::fmt::Debug + Send + Sync + 'static;

    /// Sequence of the last event consumed via [`EventLog::try_get_next`]
    fn sequence(&self) -> SequenceNumber;

    /// Pops the next locally buffered event without touching the network.
    ///
    /// A decode failure still consumes the event, so the next call moves on
    /// to the following sequence.
    fn try_get_next(&mut self) -> Result<Option<LogEntry<Self::Event>>, DecodeEventError>;

    /// Starts fetching the next batch of remote events into the local buffer.
    ///
    /// The returned future owns everything it needs, so local consumption may
    /// proceed while it is in flight.
    fn background_fetch(&mut self, cancel: CancellationToken) -> FetchFuture;

    /// Conditionally appends events: succeeds only if no other writer has
    /// appended since the last event known to this log.
    ///
    /// Written events become visible through [`EventLog::try_get_next`].
    async fn write(
        &mut self,
        events: Vec<Self::Event>,
        cancel: CancellationToken,
    ) -> Result<WriteOutcome, InternalError>;

    /// Skips every event with sequence strictly before `sequence`, as far as
    /// the log has them
    async fn discard_up_to(
        &mut self,
        sequence: SequenceNumber,
        cancel: CancellationToken,
    ) -> Result<(), InternalError>;

    /// Drops all local buffering and rewinds to the beginning of the log
    fn reset(&mut self);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry<Event> {
    pub sequence: SequenceNumber,
    pub event: Event,
}

impl<Event> LogEntry<Event> {
    pub fn new(sequence: SequenceNumber, event: Event) -> Self {
        Self { sequence, event }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// All events were appended; carries the sequence of the last one
    Written(SequenceNumber),
    /// Another writer appended first, nothing was written
    Conflict,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
