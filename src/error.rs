// Copyright 2024 Saptak Santra
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Error types

use std::fmt;

use crate::stage::BufferId;

/// Simulation error type
///
/// Every variant is recoverable: callers either retry later, skip the
/// current tick or log and carry on.
#[derive(Debug, Clone, PartialEq)]
pub enum SimError {
    /// Pool is full and not allowed to grow
    PoolExhausted { pool: &'static str, capacity: usize },

    /// Handle does not belong to the pool it was returned to
    InvalidHandle { pool: &'static str },

    /// Pool and structure-of-arrays lengths disagree
    Desync {
        lane: &'static str,
        pool_len: usize,
        state_len: usize,
    },

    /// A stage consumes a per-tick buffer before anything produced it
    StageOrder {
        stage: &'static str,
        buffer: BufferId,
    },

    /// Settings could not be parsed
    Config(String),

    /// IO error (settings files)
    Io(String),
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::PoolExhausted { pool, capacity } => {
                write!(f, "Pool '{pool}' exhausted: all {capacity} instances in use")
            }
            SimError::InvalidHandle { pool } => {
                write!(f, "Handle returned to the wrong pool ('{pool}')")
            }
            SimError::Desync {
                lane,
                pool_len,
                state_len,
            } => write!(
                f,
                "{lane} arrays out of sync: pool has {pool_len} slots, state has {state_len}"
            ),
            SimError::StageOrder { stage, buffer } => {
                write!(f, "Stage '{stage}' reads {buffer:?} before any stage writes it")
            }
            SimError::Config(msg) => write!(f, "Config error: {msg}"),
            SimError::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for SimError {}

impl From<std::io::Error> for SimError {
    fn from(err: std::io::Error) -> Self {
        SimError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        SimError::Config(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, SimError>;
