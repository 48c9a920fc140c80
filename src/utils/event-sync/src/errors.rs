// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::{BoxedError, InternalError};
use thiserror::Error;

use crate::SequenceNumber;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("Operation was cancelled")]
pub struct CancelledError;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Stored bytes of an event could not be turned into a typed event.
///
/// The log has already moved past `sequence` when this error is returned.
#[derive(Error, Debug)]
#[error("Event #{sequence} cannot be decoded")]
pub struct DecodeEventError {
    pub sequence: SequenceNumber,
    #[source]
    pub source: BoxedError,
}

impl DecodeEventError {
    pub fn new(sequence: SequenceNumber, source: impl Into<BoxedError>) -> Self {
        Self {
            sequence,
            source: source.into(),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum InitializeError {
    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl From<CatchUpError> for InitializeError {
    fn from(value: CatchUpError) -> Self {
        match value {
            CatchUpError::Cancelled(e) => Self::Cancelled(e),
            CatchUpError::Internal(e) => Self::Internal(e),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
pub enum CatchUpError {
    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Failure of an append call.
///
/// Write conflicts never show up here: they are retried internally.
#[derive(Error, Debug)]
pub enum AppendError<E> {
    /// Returned verbatim from the caller-supplied builder
    #[error("Append builder failed")]
    Builder(#[source] E),

    #[error(transparent)]
    Cancelled(#[from] CancelledError),

    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl<E> From<CatchUpError> for AppendError<E> {
    fn from(value: CatchUpError) -> Self {
        match value {
            CatchUpError::Cancelled(e) => Self::Cancelled(e),
            CatchUpError::Internal(e) => Self::Internal(e),
        }
    }
}

impl<E> AppendError<E> {
    pub fn builder_error(self) -> Option<E> {
        match self {
            Self::Builder(e) => Some(e),
            Self::Cancelled(_) | Self::Internal(_) => None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Error, Debug)]
#[error("Gave up appending after {attempts} conflicting write attempts")]
pub struct AppendAttemptsExhaustedError {
    pub attempts: usize,
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
