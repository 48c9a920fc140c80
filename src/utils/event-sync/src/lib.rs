// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

//! Keeps a locally materialized projection in sync with an append-only event
//! log and appends new events under optimistic concurrency control.

mod cancellation;
mod config;
mod errors;
mod event_log;
mod listeners;
mod materialized_projection;
mod projection;
mod quarantine;
mod sequence_number;
mod snapshot_cache;
mod state_fold;
mod synchronizer;

pub use cancellation::*;
pub use config::*;
pub use errors::*;
pub use event_log::*;
pub use internal_error::{BoxedError, ErrorIntoInternal, InternalError, ResultIntoInternal};
pub use listeners::*;
pub use materialized_projection::*;
pub use projection::*;
pub use quarantine::*;
pub use sequence_number::*;
pub use snapshot_cache::*;
pub use state_fold::*;
pub use synchronizer::*;
pub use tokio_util::sync::CancellationToken;
