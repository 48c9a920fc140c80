// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::BoxedError;

use crate::SequenceNumber;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Callback invoked once per committed event, in log order
pub trait CommittedEventListener<Event>: Send {
    fn on_committed(&mut self, sequence: SequenceNumber, event: &Event) -> Result<(), BoxedError>;
}

impl<Event, F> CommittedEventListener<Event> for F
where
    F: FnMut(SequenceNumber, &Event) -> Result<(), BoxedError> + Send,
{
    fn on_committed(&mut self, sequence: SequenceNumber, event: &Event) -> Result<(), BoxedError> {
        self(sequence, event)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub(crate) struct ListenerRegistration<Event> {
    pub listener: Box<dyn CommittedEventListener<Event>>,
    pub start_sequence: SequenceNumber,
}

/// Listeners in registration order
pub(crate) struct ListenerRegistry<Event> {
    registrations: Vec<ListenerRegistration<Event>>,
}

impl<Event> ListenerRegistry<Event> {
    pub fn new() -> Self {
        Self {
            registrations: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        listener: Box<dyn CommittedEventListener<Event>>,
        start_sequence: SequenceNumber,
    ) {
        self.registrations.push(ListenerRegistration {
            listener,
            start_sequence,
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Earliest sequence any listener still wants to see
    pub fn min_start_sequence(&self) -> Option<SequenceNumber> {
        self.registrations.iter().map(|r| r.start_sequence).min()
    }

    /// Invokes every listener interested in `sequence`, calling `on_error`
    /// with the listener index for each failure
    pub fn dispatch(
        &mut self,
        sequence: SequenceNumber,
        event: &Event,
        mut on_error: impl FnMut(usize, BoxedError),
    ) {
        for (index, registration) in self.registrations.iter_mut().enumerate() {
            if registration.start_sequence > sequence {
                continue;
            }
            if let Err(err) = registration.listener.on_committed(sequence, event) {
                on_error(index, err);
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
