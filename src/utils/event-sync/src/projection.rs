// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use futures::future::BoxFuture;
use internal_error::{BoxedError, InternalError};
use tokio_util::sync::CancellationToken;

use crate::SequenceNumber;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Persists an immutable copy of the projection. Resolves to `false` when
/// there was nothing to persist.
pub type SaveFuture = BoxFuture<'static, Result<bool, InternalError>>;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Materialized state derived by folding log events in order
#[async_trait::async_trait]
pub trait Projection: Send + Sync {
    type Event: Send + Sync + 'static;
    type State: Send + Sync + 'static;

    /// Sequence of the last event reflected in [`Projection::current`]
    fn sequence(&self) -> SequenceNumber;

    fn current(&self) -> Arc<Self::State>;

    /// Best-effort restore from a persisted snapshot. Returns whether
    /// anything was restored.
    async fn try_load(&mut self, cancel: CancellationToken) -> Result<bool, InternalError>;

    fn try_save(&self, cancel: CancellationToken) -> SaveFuture;

    fn apply(&mut self, sequence: SequenceNumber, event: &Self::Event) -> Result<(), BoxedError>;

    /// One-way latch, cleared only by [`Projection::reset`]
    fn set_possibly_inconsistent(&mut self);

    fn is_possibly_inconsistent(&self) -> bool;

    fn reset(&mut self);
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
