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

//! Result Record Model
//!
//! A result record is what the consumer publishes to the result store once a
//! task has been computed. It is stored as JSON under `results:{requestId}`
//! with a fixed time-to-live and is never persisted beyond that.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a published result.
///
/// Only completed results are ever written; "pending" is the absence of a
/// record and is modelled by the query API, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Completed,
}

impl ResultStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultStatus::Completed => "completed",
        }
    }
}

/// Stored shape of a computed result: `{"result", "status", "timestamp"}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    /// The computed value. Additions produce a JSON number.
    pub result: serde_json::Value,
    pub status: ResultStatus,
    /// When the consumer completed the task.
    #[serde(with = "super::iso_millis")]
    pub timestamp: DateTime<Utc>,
}

impl ResultRecord {
    /// Creates a completed record stamped with the current time.
    pub fn completed(result: serde_json::Value) -> Self {
        Self {
            result,
            status: ResultStatus::Completed,
            timestamp: Utc::now(),
        }
    }

    /// Wire timestamp, as written to the store.
    pub fn timestamp_string(&self) -> String {
        super::iso_millis::format(&self.timestamp)
    }
}

/// Converts a computed number into JSON the way a dynamically typed producer
/// would see it: integral values become JSON integers, non-finite values
/// become `null`.
pub fn number_value(value: f64) -> serde_json::Value {
    const MAX_SAFE_INTEGER: f64 = 9_007_199_254_740_991.0;

    if value.is_finite() && value.fract() == 0.0 && value.abs() <= MAX_SAFE_INTEGER {
        serde_json::Value::from(value as i64)
    } else {
        serde_json::Value::from(value)
    }
}
