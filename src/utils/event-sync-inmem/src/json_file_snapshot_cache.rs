// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use event_sync::{InternalError, ProjectionSnapshot, ResultIntoInternal, SnapshotCache};
use serde::Serialize;
use serde::de::DeserializeOwned;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Distinguishes temporary files of saves running in the same process
static SAVE_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Keeps the snapshot as a JSON document on the local file system.
///
/// Saving writes a temporary file and renames it over the previous one, so
/// readers never observe a partially written snapshot. Every save gets its own
/// temporary file, so overlapping saves do not interfere.
pub struct JsonFileSnapshotCache<State> {
    path: PathBuf,
    _state: PhantomData<fn() -> State>,
}

impl<State> JsonFileSnapshotCache<State> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _state: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn next_temp_path(&self) -> PathBuf {
        let mut file_name = self.path.file_name().unwrap_or_default().to_os_string();
        let save_id = SAVE_COUNTER.fetch_add(1, Ordering::Relaxed);
        file_name.push(format!(".{}.{save_id}.tmp", std::process::id()));
        self.path.with_file_name(file_name)
    }
}

#[async_trait::async_trait]
impl<State> SnapshotCache<State> for JsonFileSnapshotCache<State>
where
    State: Serialize + DeserializeOwned + Send + Sync + 'static,
{
    async fn load(&self) -> Result<Option<ProjectionSnapshot<State>>, InternalError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).context_int_err(format!(
                    "reading snapshot from '{}'",
                    self.path.display()
                ));
            }
        };

        match serde_json::from_slice(&content) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = ?e,
                    error_msg = %e,
                    "Ignoring corrupt projection snapshot"
                );
                Ok(None)
            }
        }
    }

    async fn save(&self, snapshot: ProjectionSnapshot<State>) -> Result<(), InternalError> {
        let content = serde_json::to_vec_pretty(&snapshot).int_err()?;

        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(dir).await.int_err()?;
        }

        let temp_path = self.next_temp_path();
        let res = match tokio::fs::write(&temp_path, content).await {
            Ok(()) => tokio::fs::rename(&temp_path, &self.path).await,
            Err(e) => Err(e),
        };

        if let Err(e) = res {
            // Best effort, the save already failed
            let _ = tokio::fs::remove_file(&temp_path).await;
            return Err(e).context_int_err(format!(
                "writing snapshot to '{}'",
                self.path.display()
            ));
        }

        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
