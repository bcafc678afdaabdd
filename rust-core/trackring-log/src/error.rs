// SPDX-License-Identifier: PMPL-1.0-or-later
//
// TrackRing - Error types
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Defines all error conditions that can arise during ring log operations:
// use before initialization, header corruption, and the I/O family (open,
// seek, short read, short write).

use thiserror::Error;

/// Errors that can occur during ring log operations.
#[derive(Debug, Error)]
pub enum LogError {
    /// An operation was attempted before a successful `begin()`.
    #[error("ring log is not initialized")]
    NotInitialized,

    /// The persisted header failed size, magic or structural validation.
    #[error("corrupt ring header: {reason}")]
    CorruptHeader {
        /// What the validation tripped on.
        reason: String,
    },

    /// An I/O error occurred while opening, seeking, reading or writing a
    /// storage location, after any bounded retries were exhausted.
    #[error("ring I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A write reported fewer bytes than were requested.
    #[error("short write: expected {expected} bytes, wrote {actual}")]
    ShortWrite {
        /// Bytes handed to the storage driver.
        expected: usize,
        /// Bytes the driver reported as written.
        actual: usize,
    },

    /// A read returned fewer bytes than the fixed record width.
    #[error("short read: expected {expected} bytes, read {actual}")]
    ShortRead {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually read.
        actual: usize,
    },

    /// A record payload does not fit in one slot.
    #[error("payload of {length} bytes exceeds slot capacity of {max} bytes")]
    PayloadTooLarge {
        /// Length of the rejected payload.
        length: usize,
        /// Largest payload a slot can hold.
        max: usize,
    },

    /// A record payload contains a byte a slot cannot hold.
    #[error("payload byte {position} is NUL; slots are zero-terminated")]
    EmbeddedNul {
        /// Offset of the first NUL byte.
        position: usize,
    },

    /// The supplied configuration cannot produce a usable ring.
    #[error("invalid ring configuration: {0}")]
    InvalidConfig(String),
}

impl LogError {
    /// Returns `true` for errors in the storage I/O family.
    pub fn is_io(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::ShortWrite { .. } | Self::ShortRead { .. }
        )
    }

    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        Self::CorruptHeader {
            reason: reason.into(),
        }
    }
}

/// Convenience type alias for ring log results.
pub type LogResult<T> = Result<T, LogError>;
