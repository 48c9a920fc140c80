// Copyright Kamu Data, Inc. and contributors. All rights reserved.
//
// Use of this software is governed by the Business Source License
// included in the LICENSE file.
//
// As of the Change Date specified in that file, in accordance with
// the Business Source License, use of this software will be governed
// by the Apache License, Version 2.0.

use internal_error::BoxedError;
use serde::Serialize;
use serde::de::DeserializeOwned;

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

/// Turns typed events into stored bytes and back
pub trait EventCodec<Event>: Send + Sync {
    fn encode(&self, event: &Event) -> Result<Vec<u8>, BoxedError>;

    fn decode(&self, bytes: &[u8]) -> Result<Event, BoxedError>;
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////

#[derive(Debug, Default, Clone, Copy)]
pub struct JsonEventCodec;

impl<Event> EventCodec<Event> for JsonEventCodec
where
    Event: Serialize + DeserializeOwned,
{
    fn encode(&self, event: &Event) -> Result<Vec<u8>, BoxedError> {
        Ok(serde_json::to_vec(event)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Event, BoxedError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

////////////////////////////////////////////////////////////////////////////////////////////////////////////////////////
