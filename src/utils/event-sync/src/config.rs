// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use serde::{Deserialize, Serialize};

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

pub const DEFAULT_PROGRESS_REPORT_INTERVAL: usize = 1000;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Clone, PartialEq, Eq, bon::Builder, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SynchronizerConfig {
    /// Emit a progress line every this many events during local catch-up;
    /// `0` disables progress reporting
    #[builder(default = DEFAULT_PROGRESS_REPORT_INTERVAL)]
    pub progress_report_interval: usize,

    /// Upper bound on conflicting write attempts per append call;
    /// unbounded when not set
    pub max_append_attempts: Option<usize>,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            progress_report_interval: DEFAULT_PROGRESS_REPORT_INTERVAL,
            max_append_attempts: None,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
