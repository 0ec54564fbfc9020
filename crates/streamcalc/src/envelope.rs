/*
 *  Copyright 2025-2026 Colliery Software
 *
 *  Licensed under the Apache License, Version 2.0 (the "License");
 *  you may not use this file except in compliance with the License.
 *  You may obtain a copy of the License at
 *
 *      http://www.apache.org/licenses/LICENSE-2.0
 *
 *  Unless required by applicable law or agreed to in writing, software
 *  distributed under the License is distributed on an "AS IS" BASIS,
 *  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 *  See the License for the specific language governing permissions and
 *  limitations under the License.
 */

//! Task envelope codec.
//!
//! The log stores each entry as a flat list of string fields. This module maps
//! a typed [`TaskEnvelope`] onto that representation and back:
//!
//! ```text
//! type addition requestId 6f1c... a 2 b 3 timestamp 2025-01-02T03:04:05.678Z
//! ```
//!
//! Decoding is split in two steps. [`decode`] reads the common header fields
//! (`type`, `requestId`, `timestamp`) and keeps the remaining fields around in
//! a [`FieldMap`]; the consumer then picks a handler by type and the handler
//! asks for its concrete payload with [`DecodedEnvelope::payload`]. Unknown
//! fields are ignored so newer producers can add fields without breaking
//! older consumers.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::str::FromStr;
use thiserror::Error;

use crate::models::iso_millis;
use crate::models::task_envelope::TaskEnvelope;

/// Ordered field-name / field-value pairs, as appended to the log.
pub type Fields = Vec<(String, String)>;

pub const FIELD_TYPE: &str = "type";
pub const FIELD_REQUEST_ID: &str = "requestId";
pub const FIELD_TIMESTAMP: &str = "timestamp";

/// Errors raised while decoding an envelope from log fields.
///
/// All variants describe a malformed envelope; the consumer logs and skips
/// such entries instead of retrying them.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Malformed envelope: missing required field '{0}'")]
    MissingField(String),

    #[error("Malformed envelope: field '{field}' has invalid value '{value}'")]
    InvalidField { field: String, value: String },

    #[error("Envelope type '{actual}' does not match payload type '{expected}'")]
    TypeMismatch { expected: String, actual: String },
}

/// A typed task payload that can be written to and read from log fields.
///
/// Implement this for every task type the system should carry. The
/// `TASK_TYPE` tag is written to the `type` field and selects the consumer
/// handler.
pub trait TaskPayload: Sized + Send + Sync {
    const TASK_TYPE: &'static str;

    /// Appends the payload's fields after the envelope header.
    fn write_fields(&self, fields: &mut Fields);

    /// Reconstructs the payload from a decoded field map.
    fn read_fields(fields: &FieldMap) -> Result<Self, EnvelopeError>;
}

/// Payload of the `addition` task: two numeric operands.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Addition {
    pub a: f64,
    pub b: f64,
}

impl Addition {
    pub fn new(a: f64, b: f64) -> Self {
        Self { a, b }
    }

    pub fn sum(&self) -> f64 {
        self.a + self.b
    }
}

impl TaskPayload for Addition {
    const TASK_TYPE: &'static str = "addition";

    fn write_fields(&self, fields: &mut Fields) {
        fields.push(("a".to_string(), self.a.to_string()));
        fields.push(("b".to_string(), self.b.to_string()));
    }

    fn read_fields(fields: &FieldMap) -> Result<Self, EnvelopeError> {
        Ok(Self {
            a: fields.parse("a")?,
            b: fields.parse("b")?,
        })
    }
}

/// Field lookup over a decoded entry.
///
/// Built from the flat pairs the log returns; when a field name repeats the
/// last value wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldMap {
    fields: HashMap<String, String>,
}

impl FieldMap {
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Returns the field or a [`EnvelopeError::MissingField`].
    pub fn require(&self, name: &str) -> Result<&str, EnvelopeError> {
        self.get(name)
            .ok_or_else(|| EnvelopeError::MissingField(name.to_string()))
    }

    /// Parses a required field with `FromStr`.
    pub fn parse<T: FromStr>(&self, name: &str) -> Result<T, EnvelopeError> {
        let raw = self.require(name)?;
        raw.trim()
            .parse::<T>()
            .map_err(|_| EnvelopeError::InvalidField {
                field: name.to_string(),
                value: raw.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An entry whose header has been decoded but whose payload type is not yet known.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedEnvelope {
    pub task_type: String,
    /// Kept as written by the producer; any non-empty string is accepted.
    pub request_id: String,
    /// `None` when the producer omitted the timestamp or wrote one we cannot parse.
    pub enqueued_at: Option<DateTime<Utc>>,
    pub fields: FieldMap,
}

impl DecodedEnvelope {
    /// Decodes the payload as `P`, checking that the type tag matches.
    pub fn payload<P: TaskPayload>(&self) -> Result<P, EnvelopeError> {
        if self.task_type != P::TASK_TYPE {
            return Err(EnvelopeError::TypeMismatch {
                expected: P::TASK_TYPE.to_string(),
                actual: self.task_type.clone(),
            });
        }
        P::read_fields(&self.fields)
    }
}

/// Encodes an envelope into ordered log fields: `type`, `requestId`, the
/// payload fields, then `timestamp`.
pub fn encode<P: TaskPayload>(envelope: &TaskEnvelope<P>) -> Fields {
    let mut fields = Fields::new();
    fields.push((FIELD_TYPE.to_string(), envelope.task_type.clone()));
    fields.push((FIELD_REQUEST_ID.to_string(), envelope.request_id.to_string()));
    envelope.payload.write_fields(&mut fields);
    fields.push((
        FIELD_TIMESTAMP.to_string(),
        iso_millis::format(&envelope.enqueued_at),
    ));
    fields
}

/// Decodes the envelope header from log fields.
///
/// Fails with [`EnvelopeError::MissingField`] when `type` or `requestId` is
/// absent or empty. The request id is not required to be a UUID.
pub fn decode(fields: &[(String, String)]) -> Result<DecodedEnvelope, EnvelopeError> {
    let map = FieldMap::from_pairs(fields.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    let task_type = required_text(&map, FIELD_TYPE)?;
    let request_id = required_text(&map, FIELD_REQUEST_ID)?;
    let enqueued_at = map
        .get(FIELD_TIMESTAMP)
        .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
        .map(|ts| ts.with_timezone(&Utc));

    Ok(DecodedEnvelope {
        task_type,
        request_id,
        enqueued_at,
        fields: map,
    })
}

fn required_text(map: &FieldMap, name: &str) -> Result<String, EnvelopeError> {
    match map.require(name)?.trim() {
        "" => Err(EnvelopeError::MissingField(name.to_string())),
        value => Ok(value.to_string()),
    }
}

/// Flattens pairs into the alternating name/value argument list the log expects.
pub fn flatten(fields: &[(String, String)]) -> Vec<&str> {
    fields
        .iter()
        .flat_map(|(k, v)| [k.as_str(), v.as_str()])
        .collect()
}
