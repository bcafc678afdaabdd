// SPDX-License-Identifier: PMPL-1.0-or-later
//! Ring log configuration.
//!
//! Defaults size the ring for one day of fixes at one fix every ten seconds
//! (8 640 slots, 540 KiB of slot data).

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{LogError, LogResult};
use crate::fs::{DEFAULT_DATA_FILE, DEFAULT_HEADER_FILE};
use crate::retry::RetryPolicy;
use crate::storage::SyncMode;

/// Configuration for a [`crate::CircularLog`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// File name of the header location (filesystem driver only).
    pub header_file: String,
    /// File name of the slot array (filesystem driver only).
    pub data_file: String,
    /// How long a record must stay retrievable, in seconds.
    pub retention_secs: u64,
    /// Expected interval between appended records, in seconds.
    pub sample_interval_secs: u64,
    /// Retry schedule for every storage open.
    pub retry: RetryPolicy,
    /// Records delivered by a range read between cooperative pauses.
    pub read_batch_size: usize,
    /// Length of each cooperative pause, in milliseconds.
    pub read_pause_ms: u64,
    /// Durability of header saves.
    pub sync_mode: SyncMode,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            header_file: DEFAULT_HEADER_FILE.to_string(),
            data_file: DEFAULT_DATA_FILE.to_string(),
            retention_secs: 24 * 60 * 60,
            sample_interval_secs: 10,
            retry: RetryPolicy::default(),
            read_batch_size: 10,
            read_pause_ms: 5,
            sync_mode: SyncMode::Fsync,
        }
    }
}

impl LogConfig {
    /// A configuration holding exactly `capacity` records, one per second.
    pub fn with_capacity(capacity: u32) -> Self {
        Self {
            retention_secs: u64::from(capacity),
            sample_interval_secs: 1,
            ..Self::default()
        }
    }

    /// Number of slots: retention window divided by sampling interval.
    pub fn capacity(&self) -> LogResult<u32> {
        if self.sample_interval_secs == 0 {
            return Err(LogError::InvalidConfig(
                "sample_interval_secs must be non-zero".to_string(),
            ));
        }
        let slots = self.retention_secs / self.sample_interval_secs;
        if slots == 0 {
            return Err(LogError::InvalidConfig(format!(
                "retention of {}s holds no samples at {}s intervals",
                self.retention_secs, self.sample_interval_secs
            )));
        }
        u32::try_from(slots).map_err(|_| {
            LogError::InvalidConfig(format!("capacity of {slots} slots exceeds u32"))
        })
    }

    /// Check every field, returning the derived capacity.
    pub fn validate(&self) -> LogResult<u32> {
        if self.retry.attempts == 0 {
            return Err(LogError::InvalidConfig(
                "retry.attempts must be at least 1".to_string(),
            ));
        }
        if self.read_batch_size == 0 {
            return Err(LogError::InvalidConfig(
                "read_batch_size must be non-zero".to_string(),
            ));
        }
        self.capacity()
    }

    /// The cooperative pause taken between read batches.
    pub fn read_pause(&self) -> Duration {
        Duration::from_millis(self.read_pause_ms)
    }
}
