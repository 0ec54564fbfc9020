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

//! Log entry identifiers.
//!
//! Entry ids are assigned by the log at append time and are totally ordered.
//! They use the Redis stream shape `<milliseconds>-<sequence>`; the in-memory
//! backend generates ids of the same shape so cursors are interchangeable.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced when parsing an entry id from its wire form.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EntryIdError {
    #[error("Entry id is empty")]
    Empty,

    #[error("Invalid entry id '{0}': expected '<ms>-<seq>'")]
    Invalid(String),
}

/// Identifier of a single log entry.
///
/// Ordering is by milliseconds first, then sequence number, which matches the
/// order in which the log hands entries to readers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntryId {
    ms: u64,
    seq: u64,
}

impl EntryId {
    /// The position before the first possible entry. Reading after `START`
    /// replays the whole log.
    pub const START: EntryId = EntryId { ms: 0, seq: 0 };

    pub const fn new(ms: u64, seq: u64) -> Self {
        Self { ms, seq }
    }

    pub fn ms(&self) -> u64 {
        self.ms
    }

    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Smallest id strictly greater than `self`.
    pub fn successor(&self) -> Self {
        match self.seq.checked_add(1) {
            Some(seq) => Self { ms: self.ms, seq },
            None => Self {
                ms: self.ms + 1,
                seq: 0,
            },
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

impl FromStr for EntryId {
    type Err = EntryIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(EntryIdError::Empty);
        }

        // A bare millisecond value is accepted with an implicit sequence of 0,
        // the same way the log service treats `XREAD ... STREAMS key 0`.
        let (ms, seq) = match s.split_once('-') {
            Some((ms, seq)) => (ms, seq),
            None => (s, "0"),
        };

        let ms = ms
            .parse::<u64>()
            .map_err(|_| EntryIdError::Invalid(s.to_string()))?;
        let seq = seq
            .parse::<u64>()
            .map_err(|_| EntryIdError::Invalid(s.to_string()))?;

        Ok(Self { ms, seq })
    }
}
