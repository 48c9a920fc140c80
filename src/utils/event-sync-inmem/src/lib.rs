// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

mod event_codec;
mod inmem_event_log;
mod inmem_event_log_storage;
mod inmem_snapshot_cache;
mod json_file_snapshot_cache;

pub use event_codec::*;
pub use inmem_event_log::*;
pub use inmem_event_log_storage::*;
pub use inmem_snapshot_cache::*;
pub use json_file_snapshot_cache::*;
