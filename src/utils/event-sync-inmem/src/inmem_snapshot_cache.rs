// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::sync::Mutex;

use event_sync::{InternalError, ProjectionSnapshot, SnapshotCache};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub struct InMemorySnapshotCache<State> {
    snapshot: Mutex<Option<ProjectionSnapshot<State>>>,
}

impl<State> InMemorySnapshotCache<State> {
    pub fn new() -> Self {
        Self {
            snapshot: Mutex::new(None),
        }
    }

    pub fn with_snapshot(snapshot: ProjectionSnapshot<State>) -> Self {
        Self {
            snapshot: Mutex::new(Some(snapshot)),
        }
    }

    /// Last saved snapshot, if any
    pub fn get(&self) -> Option<ProjectionSnapshot<State>> {
        self.snapshot.lock().unwrap().clone()
    }
}

impl<State> Default for InMemorySnapshotCache<State> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl<State> SnapshotCache<State> for InMemorySnapshotCache<State>
where
    State: Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<ProjectionSnapshot<State>>, InternalError> {
        Ok(self.get())
    }

    async fn save(&self, snapshot: ProjectionSnapshot<State>) -> Result<(), InternalError> {
        *self.snapshot.lock().unwrap() = Some(snapshot);
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
