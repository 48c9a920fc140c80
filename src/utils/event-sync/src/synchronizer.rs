// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::convert::Infallible;
use std::sync::Arc;

use internal_error::{ErrorIntoInternal, InternalError, ResultIntoInternal};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::Instrument as _;

use crate::listeners::ListenerRegistry;
use crate::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Keeps a [`Projection`] in sync with an [`EventLog`], dispatches committed
/// events to listeners and appends new events under optimistic concurrency.
///
/// Mutating operations take `&mut self`: one logical owner drives an
/// instance at a time.
pub struct EventLogSynchronizer<L, P>
where
    L: EventLog,
    P: Projection<Event = L::Event>,
{
    log: L,
    projection: P,
    quarantine: Arc<dyn Quarantine<L::Event>>,
    listeners: ListenerRegistry<L::Event>,
    config: SynchronizerConfig,
    sync_step: u64,
}

impl<L, P> EventLogSynchronizer<L, P>
where
    L: EventLog,
    P: Projection<Event = L::Event>,
{
    pub fn new(
        log: L,
        projection: P,
        quarantine: Arc<dyn Quarantine<L::Event>>,
        config: SynchronizerConfig,
    ) -> Self {
        Self {
            log,
            projection,
            quarantine,
            listeners: ListenerRegistry::new(),
            config,
            sync_step: 0,
        }
    }

    /// Incremented once per completed catch-up and once per successful append
    pub fn sync_step(&self) -> u64 {
        self.sync_step
    }

    pub fn current(&self) -> Arc<P::State> {
        self.projection.current()
    }

    /// Sequence of the last event reflected in the projection
    pub fn sequence(&self) -> SequenceNumber {
        self.projection.sequence()
    }

    pub fn log_sequence(&self) -> SequenceNumber {
        self.log.sequence()
    }

    pub fn is_possibly_inconsistent(&self) -> bool {
        self.projection.is_possibly_inconsistent()
    }

    pub fn quarantine(&self) -> &Arc<dyn Quarantine<L::Event>> {
        &self.quarantine
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Registers a listener for every event with sequence `>= start_sequence`.
    ///
    /// Events that were already processed are not replayed to it.
    pub fn on_each_committed(
        &mut self,
        listener: impl CommittedEventListener<L::Event> + 'static,
        start_sequence: SequenceNumber,
    ) {
        self.listeners.register(Box::new(listener), start_sequence);
    }

    /// Restores the projection from its snapshot when the log still has the
    /// events following it, otherwise starts over, then catches up fully
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn initialize(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<InitializeOutcome, InitializeError> {
        let outcome = match self.restore_from_snapshot(&cancel).await {
            Ok(SnapshotValidation::Restored(sequence)) => {
                InitializeOutcome::RestoredFromSnapshot { sequence }
            }
            Ok(SnapshotValidation::NoSnapshot) => InitializeOutcome::ReplayedFromScratch,
            Ok(SnapshotValidation::Mismatch) => {
                self.reset();
                InitializeOutcome::ReplayedFromScratch
            }
            Err(InitializeError::Cancelled(e)) => return Err(e.into()),
            Err(InitializeError::Internal(_)) if cancel.is_cancelled() => {
                return Err(CancelledError.into());
            }
            Err(InitializeError::Internal(e)) => {
                tracing::warn!(
                    error = ?e,
                    error_msg = %e,
                    "Failed to restore projection snapshot, replaying the log from scratch"
                );
                self.reset();
                InitializeOutcome::ReplayedFromScratch
            }
        };

        let stats = self.catch_up(cancel).await?;

        tracing::info!(
            ?outcome,
            sequence = %self.projection.sequence(),
            events_applied = stats.events_applied,
            events_quarantined = stats.events_quarantined,
            possibly_inconsistent = self.projection.is_possibly_inconsistent(),
            "Initialized event log synchronizer"
        );

        Ok(outcome)
    }

    async fn restore_from_snapshot(
        &mut self,
        cancel: &CancellationToken,
    ) -> Result<SnapshotValidation, InitializeError> {
        let restored =
            run_cancellable(cancel, self.projection.try_load(cancel.clone())).await??;

        // Snapshot must be covered by the log regardless of listener starts
        let projection_next = self.projection.sequence().next();
        if !self.discard_reaches(projection_next, cancel).await? {
            return Ok(SnapshotValidation::Mismatch);
        }

        let min_required = self.min_required_sequence();
        if min_required < projection_next {
            self.log.reset();
            if !self.discard_reaches(min_required, cancel).await? {
                return Ok(SnapshotValidation::Mismatch);
            }
        }

        if restored {
            Ok(SnapshotValidation::Restored(self.projection.sequence()))
        } else {
            Ok(SnapshotValidation::NoSnapshot)
        }
    }

    /// Discards the log prefix before `sequence` and tells whether the log
    /// holds every event up to it
    async fn discard_reaches(
        &mut self,
        sequence: SequenceNumber,
        cancel: &CancellationToken,
    ) -> Result<bool, InitializeError> {
        run_cancellable(cancel, self.log.discard_up_to(sequence, cancel.clone())).await??;

        if self.log.sequence().next() < sequence {
            tracing::warn!(
                log_sequence = %self.log.sequence(),
                projection_sequence = %self.projection.sequence(),
                required = %sequence,
                "Projection snapshot is ahead of the log, discarding it"
            );
            return Ok(false);
        }

        Ok(true)
    }

    /// First sequence that still has to be read: either the one following
    /// the projection or the earliest one a listener asked for
    fn min_required_sequence(&self) -> SequenceNumber {
        let projection_next = self.projection.sequence().next();
        match self.listeners.min_start_sequence() {
            Some(listener_start) => projection_next.min(listener_start),
            None => projection_next,
        }
    }

    /// Applies every locally buffered event to the projection and the
    /// listeners without touching the network.
    ///
    /// Events that fail to decode, apply or dispatch are quarantined and do
    /// not stop the loop.
    pub fn catch_up_local(&mut self) -> CatchUpStats {
        let mut stats = CatchUpStats::default();

        // Events already folded into a restored snapshot are skipped, and
        // since sequences only grow, the first one past it ends the skipping
        let mut past_projection = false;

        loop {
            let entry = match self.log.try_get_next() {
                Ok(Some(entry)) => entry,
                Ok(None) => break,
                Err(err) => {
                    stats.events_seen += 1;
                    stats.events_quarantined += 1;

                    let sequence = err.sequence;
                    tracing::warn!(
                        %sequence,
                        error = ?err,
                        error_msg = %err,
                        "Quarantining event that cannot be decoded"
                    );
                    self.quarantine.add(sequence, QuarantineReason::Decode(err));
                    self.projection.set_possibly_inconsistent();
                    continue;
                }
            };

            let LogEntry { sequence, event } = entry;
            stats.events_seen += 1;

            if !past_projection && sequence > self.projection.sequence() {
                past_projection = true;
            }

            if past_projection {
                match self.projection.apply(sequence, &event) {
                    Ok(()) => stats.events_applied += 1,
                    Err(err) => {
                        stats.events_quarantined += 1;

                        tracing::warn!(
                            %sequence,
                            error = ?err,
                            error_msg = %err,
                            "Quarantining event rejected by the projection"
                        );
                        self.quarantine.add_with_event(
                            sequence,
                            event.clone(),
                            QuarantineReason::Apply(err),
                        );
                        self.projection.set_possibly_inconsistent();
                    }
                }
            }

            let quarantine = &self.quarantine;
            let projection = &mut self.projection;
            self.listeners
                .dispatch(sequence, &event, |listener_index, source| {
                    stats.events_quarantined += 1;

                    tracing::warn!(
                        %sequence,
                        listener_index,
                        error = ?source,
                        error_msg = %source,
                        "Quarantining event that a listener failed to handle"
                    );
                    quarantine.add_with_event(
                        sequence,
                        event.clone(),
                        QuarantineReason::Listener {
                            listener_index,
                            source,
                        },
                    );
                    projection.set_possibly_inconsistent();
                });

            let interval = self.config.progress_report_interval;
            if interval != 0 && stats.events_seen % interval == 0 {
                tracing::info!(
                    %sequence,
                    events_seen = stats.events_seen,
                    events_quarantined = stats.events_quarantined,
                    "Catching up with the event log"
                );
            }
        }

        stats
    }

    /// Brings local state up to date with the remote log.
    ///
    /// Each round starts one background fetch and drains the local buffer
    /// while it is in flight. Rounds repeat until a fetch brings nothing new.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn catch_up(
        &mut self,
        cancel: CancellationToken,
    ) -> Result<CatchUpStats, CatchUpError> {
        let mut stats = CatchUpStats::default();
        let mut rounds = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(CancelledError.into());
            }
            rounds += 1;

            let mut fetch = FetchTask::spawn(self.log.background_fetch(cancel.clone()));

            stats += self.catch_up_local();

            let has_more = fetch.join(&cancel).await?;
            if !has_more {
                break;
            }
        }

        self.sync_step += 1;

        tracing::debug!(
            rounds,
            events_seen = stats.events_seen,
            events_applied = stats.events_applied,
            sequence = %self.projection.sequence(),
            sync_step = self.sync_step,
            "Caught up with the event log"
        );

        Ok(stats)
    }

    /// Appends events computed from the current state.
    ///
    /// The builder is re-invoked against fresh state after every write
    /// conflict, so it must be free of side effects. Its errors are returned
    /// as [`AppendError::Builder`] without retrying.
    #[tracing::instrument(level = "debug", skip_all)]
    pub async fn append_events_with_payload<B, R, BE>(
        &mut self,
        mut builder: B,
        cancel: CancellationToken,
    ) -> Result<AppendResult<R>, AppendError<BE>>
    where
        B: FnMut(&P::State) -> Result<(Vec<L::Event>, R), BE>,
    {
        let mut attempts = 0;

        loop {
            let (events, payload) = {
                let state = self.projection.current();
                builder(state.as_ref()).map_err(AppendError::Builder)?
            };

            if events.is_empty() {
                return Ok(AppendResult {
                    requested: 0,
                    committed_sequence: None,
                    payload,
                });
            }

            let requested = events.len();
            attempts += 1;

            let write_res =
                run_cancellable(&cancel, self.log.write(events, cancel.clone())).await?;
            match write_res {
                Ok(WriteOutcome::Written(committed_sequence)) => {
                    self.catch_up_local();
                    self.sync_step += 1;

                    tracing::debug!(
                        requested,
                        %committed_sequence,
                        attempts,
                        sync_step = self.sync_step,
                        "Appended events"
                    );

                    return Ok(AppendResult {
                        requested,
                        committed_sequence: Some(committed_sequence),
                        payload,
                    });
                }
                Ok(WriteOutcome::Conflict) => {
                    tracing::debug!(
                        attempts,
                        log_sequence = %self.log.sequence(),
                        "Write conflict, catching up before rebuilding events"
                    );

                    if self
                        .config
                        .max_append_attempts
                        .is_some_and(|max_attempts| attempts >= max_attempts)
                    {
                        return Err(Self::internal_append_error(
                            AppendAttemptsExhaustedError { attempts }.int_err(),
                        ));
                    }

                    match self.catch_up(cancel.clone()).await {
                        Ok(_) => {}
                        Err(CatchUpError::Cancelled(e)) => return Err(e.into()),
                        Err(CatchUpError::Internal(e)) => {
                            return Err(Self::internal_append_error(e));
                        }
                    }
                }
                Err(e) => return Err(Self::internal_append_error(e)),
            }
        }
    }

    fn internal_append_error<BE>(e: InternalError) -> AppendError<BE> {
        tracing::error!(
            error = ?e,
            error_msg = %e,
            "Internal error while appending events"
        );
        AppendError::Internal(e)
    }

    /// Same as [`Self::append_events_with_payload`] for builders that
    /// produce no payload
    pub async fn append_events<B, BE>(
        &mut self,
        mut builder: B,
        cancel: CancellationToken,
    ) -> Result<AppendResult<()>, AppendError<BE>>
    where
        B: FnMut(&P::State) -> Result<Vec<L::Event>, BE>,
    {
        self.append_events_with_payload(|state| builder(state).map(|events| (events, ())), cancel)
            .await
    }

    /// Appends events regardless of the current state.
    ///
    /// Only suitable for events that tolerate duplicates or reordering under
    /// concurrent writers: conflicts are retried with the very same events.
    pub async fn append_events_unconditionally(
        &mut self,
        events: Vec<L::Event>,
        cancel: CancellationToken,
    ) -> Result<AppendResult<()>, AppendError<Infallible>> {
        self.append_events(|_| Ok(events.clone()), cancel).await
    }

    /// Persists an immutable copy of the projection in a detached task.
    ///
    /// Awaiting the handle is optional; failures are logged either way.
    pub fn try_save(
        &self,
        cancel: CancellationToken,
    ) -> JoinHandle<Result<bool, InternalError>> {
        let save = self.projection.try_save(cancel);
        let sequence = self.projection.sequence();

        tokio::spawn(
            async move {
                let res = save.await;
                if let Err(e) = &res {
                    tracing::warn!(
                        error = ?e,
                        error_msg = %e,
                        "Failed to save projection snapshot"
                    );
                }
                res
            }
            .instrument(tracing::debug_span!("EventLogSynchronizer::try_save", %sequence)),
        )
    }

    /// Discards all local log buffering and projection state.
    ///
    /// Listeners and quarantine entries are kept.
    pub fn reset(&mut self) {
        tracing::debug!(
            log_sequence = %self.log.sequence(),
            projection_sequence = %self.projection.sequence(),
            "Resetting event log and projection"
        );

        self.log.reset();
        self.projection.reset();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

enum SnapshotValidation {
    Restored(SequenceNumber),
    NoSnapshot,
    Mismatch,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// The single background fetch in flight; aborted if dropped before joining
struct FetchTask {
    handle: JoinHandle<Result<bool, InternalError>>,
}

impl FetchTask {
    fn spawn(fetch: FetchFuture) -> Self {
        Self {
            handle: tokio::spawn(fetch),
        }
    }

    async fn join(&mut self, cancel: &CancellationToken) -> Result<bool, CatchUpError> {
        let joined = run_cancellable(cancel, &mut self.handle).await?;
        let has_more = joined.int_err()??;
        Ok(has_more)
    }
}

impl Drop for FetchTask {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitializeOutcome {
    /// Projection was restored from a snapshot and caught up from there
    RestoredFromSnapshot { sequence: SequenceNumber },
    /// No usable snapshot, the whole log was replayed
    ReplayedFromScratch,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CatchUpStats {
    pub events_seen: usize,
    pub events_applied: usize,
    pub events_quarantined: usize,
}

impl std::ops::AddAssign for CatchUpStats {
    fn add_assign(&mut self, rhs: Self) {
        self.events_seen += rhs.events_seen;
        self.events_applied += rhs.events_applied;
        self.events_quarantined += rhs.events_quarantined;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendResult<R> {
    /// Number of events the builder asked to append
    pub requested: usize,
    /// Sequence of the last written event, `None` if nothing was written
    pub committed_sequence: Option<SequenceNumber>,
    pub payload: R,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
