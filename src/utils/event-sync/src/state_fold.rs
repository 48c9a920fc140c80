// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use crate::SequenceNumber;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Pure state-fold: reconstructs some state from a series of events.
///
/// The empty log folds into [`Default::default`].
pub trait StateFold
where
    Self: Default + Clone + std::fmt::Debug + Send + Sync + 'static,
{
    /// Type of the event this state considers
    type Event: Clone + std::fmt::Debug + Send + Sync + 'static;

    /// Produces the state that follows applying the event
    fn apply(
        &self,
        sequence: SequenceNumber,
        event: &Self::Event,
    ) -> Result<Self, ProjectionError<Self>>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
// ProjectionError
////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(thiserror::Error, Debug)]
pub struct ProjectionError<State: StateFold> {
    pub inner: Box<ProjectionErrorInner<State>>,
}

#[derive(Debug)]
pub struct ProjectionErrorInner<State: StateFold> {
    pub state: State,
    pub event: <State as StateFold>::Event,
    pub reason: Option<String>,
}

impl<State: StateFold> ProjectionError<State> {
    pub fn new(state: State, event: <State as StateFold>::Event) -> Self {
        Self {
            inner: Box::new(ProjectionErrorInner {
                state,
                event,
                reason: None,
            }),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.inner.reason = Some(reason.into());
        self
    }
}

impl<State: StateFold> std::fmt::Display for ProjectionError<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Event {:?} is illegal for state {:?}",
            self.inner.event, self.inner.state
        )?;
        if let Some(reason) = &self.inner.reason {
            write!(f, ": {reason}")?;
        }
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
