// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use internal_error::{BoxedError, ErrorIntoInternal, InternalError};
use tokio_util::sync::CancellationToken;

use crate::*;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// [`Projection`] that folds events with a [`StateFold`] and persists
/// snapshots through a [`SnapshotCache`]
pub struct MaterializedProjection<State: StateFold> {
    state: Arc<State>,
    sequence: SequenceNumber,
    possibly_inconsistent: bool,
    cache: Arc<dyn SnapshotCache<State>>,
}

impl<State: StateFold> MaterializedProjection<State> {
    pub fn new(cache: Arc<dyn SnapshotCache<State>>) -> Self {
        Self {
            state: Arc::new(State::default()),
            sequence: SequenceNumber::ZERO,
            possibly_inconsistent: false,
            cache,
        }
    }

    pub fn without_cache() -> Self {
        Self::new(Arc::new(NoSnapshotCache))
    }

    pub fn snapshot(&self) -> ProjectionSnapshot<State> {
        ProjectionSnapshot {
            sequence: self.sequence,
            state: Arc::clone(&self.state),
            possibly_inconsistent: self.possibly_inconsistent,
        }
    }
}

impl<State: StateFold> std::fmt::Debug for MaterializedProjection<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MaterializedProjection")
            .field("state", &self.state)
            .field("sequence", &self.sequence)
            .field("possibly_inconsistent", &self.possibly_inconsistent)
            .finish_non_exhaustive()
    }
}

#[async_trait::async_trait]
impl<State: StateFold> Projection for MaterializedProjection<State> {
    type Event = State::Event;
    type State = State;

    fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    fn current(&self) -> Arc<State> {
        Arc::clone(&self.state)
    }

    async fn try_load(&mut self, cancel: CancellationToken) -> Result<bool, InternalError> {
        let maybe_snapshot = match run_cancellable(&cancel, self.cache.load()).await {
            Ok(res) => res?,
            Err(e) => return Err(e.int_err()),
        };

        let Some(snapshot) = maybe_snapshot else {
            return Ok(false);
        };

        tracing::debug!(
            sequence = %snapshot.sequence,
            possibly_inconsistent = snapshot.possibly_inconsistent,
            "Restored projection snapshot",
        );

        self.state = snapshot.state;
        self.sequence = snapshot.sequence;
        self.possibly_inconsistent = snapshot.possibly_inconsistent;
        Ok(true)
    }

    fn try_save(&self, cancel: CancellationToken) -> SaveFuture {
        let cache = Arc::clone(&self.cache);
        let snapshot = self.snapshot();

        Box::pin(async move {
            if snapshot.sequence.is_zero() {
                return Ok(false);
            }

            let sequence = snapshot.sequence;
            match run_cancellable(&cancel, cache.save(snapshot)).await {
                Ok(res) => res?,
                Err(e) => return Err(e.int_err()),
            }

            tracing::debug!(%sequence, "Saved projection snapshot");
            Ok(true)
        })
    }

    fn apply(
        &mut self,
        sequence: SequenceNumber,
        event: &State::Event,
    ) -> Result<(), BoxedError> {
        let new_state = StateFold::apply(self.state.as_ref(), sequence, event)?;
        self.state = Arc::new(new_state);
        self.sequence = sequence;
        Ok(())
    }

    fn set_possibly_inconsistent(&mut self) {
        self.possibly_inconsistent = true;
    }

    fn is_possibly_inconsistent(&self) -> bool {
        self.possibly_inconsistent
    }

    fn reset(&mut self) {
        self.state = Arc::new(State::default());
        self.sequence = SequenceNumber::ZERO;
        self.possibly_inconsistent = false;
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
