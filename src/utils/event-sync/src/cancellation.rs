// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::CancelledError;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Races a suspension point against the cancellation signal.
///
/// Cancellation wins ties, so an already cancelled token never lets the
/// future make progress.
pub async fn run_cancellable<F>(
    cancel: &CancellationToken,
    fut: F,
) -> Result<F::Output, CancelledError>
where
    F: Future,
{
    if cancel.is_cancelled() {
        return Err(CancelledError);
    }

    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(CancelledError),
        res = fut => Ok(res),
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
