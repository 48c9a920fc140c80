// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Arc;

use internal_error::InternalError;
use serde::{Deserialize, Serialize};

use crate::SequenceNumber;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Storage medium for persisted projection snapshots
#[async_trait::async_trait]
pub trait SnapshotCache<State>: Send + Sync
where
    State: Send + Sync + 'static,
{
    /// Returns `None` when nothing was persisted yet
    async fn load(&self) -> Result<Option<ProjectionSnapshot<State>>, InternalError>;

    async fn save(&self, snapshot: ProjectionSnapshot<State>) -> Result<(), InternalError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Immutable copy of a projection at a given sequence
#[derive(Debug, Serialize, Deserialize)]
pub struct ProjectionSnapshot<State> {
    pub sequence: SequenceNumber,
    pub state: Arc<State>,
    #[serde(default)]
    pub possibly_inconsistent: bool,
}

impl<State> Clone for ProjectionSnapshot<State> {
    fn clone(&self) -> Self {
        Self {
            sequence: self.sequence,
            state: Arc::clone(&self.state),
            possibly_inconsistent: self.possibly_inconsistent,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Cache that never remembers anything, so every start replays the full log
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSnapshotCache;

#[async_trait::async_trait]
impl<State> SnapshotCache<State> for NoSnapshotCache
where
    State: Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<ProjectionSnapshot<State>>, InternalError> {
        Ok(None)
    }

    async fn save(&self, _snapshot: ProjectionSnapshot<State>) -> Result<(), InternalError> {
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
