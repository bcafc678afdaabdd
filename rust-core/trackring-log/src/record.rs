// SPDX-License-Identifier: PMPL-1.0-or-later
//
// TrackRing - Slot array
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The data location is a flat array of fixed-width slots. Slot `i` lives at
// byte offset `(i mod capacity) * SLOT_WIDTH`; a record is its payload
// followed by zero padding. Slots are never cleared: eviction is simply the
// next write landing on the oldest slot.

use std::io::{Seek, SeekFrom};

use tracing::warn;

use crate::error::{LogError, LogResult};
use crate::retry::{Pause, RetryPolicy};
use crate::storage::{read_up_to, write_once, AccessMode, Location, Storage};

/// Width of one slot in bytes.
pub const SLOT_WIDTH: usize = 64;

/// Longest payload a slot accepts; the last byte always stays zero.
pub const MAX_PAYLOAD: usize = SLOT_WIDTH - 1;

/// Outcome of reading one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotRead {
    /// All [`SLOT_WIDTH`] bytes were read.
    Complete(String),
    /// Fewer bytes came back. `partial` holds whatever text was recovered.
    Short {
        /// Bytes requested.
        expected: usize,
        /// Bytes actually read.
        actual: usize,
        /// Text decoded from the bytes that were read.
        partial: String,
    },
}

impl SlotRead {
    /// The payload of a complete read, or `None` for a short one.
    pub fn complete(self) -> Option<String> {
        match self {
            SlotRead::Complete(payload) => Some(payload),
            SlotRead::Short { .. } => None,
        }
    }

    /// The payload of a complete read, or [`LogError::ShortRead`].
    pub fn into_payload(self) -> LogResult<String> {
        match self {
            SlotRead::Complete(payload) => Ok(payload),
            SlotRead::Short {
                expected, actual, ..
            } => Err(LogError::ShortRead { expected, actual }),
        }
    }
}

/// Reads and writes fixed-width slots in [`Location::Data`].
#[derive(Debug, Clone)]
pub struct RecordStore {
    capacity: u32,
    retry: RetryPolicy,
}

impl RecordStore {
    /// Create a store over `capacity` slots, opening under `retry`.
    pub fn new(capacity: u32, retry: RetryPolicy) -> Self {
        Self { capacity, retry }
    }

    /// Number of slots.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Byte offset of the slot for `logical_index`.
    pub fn slot_offset(&self, logical_index: u64) -> u64 {
        (logical_index % u64::from(self.capacity)) * SLOT_WIDTH as u64
    }

    /// Make sure the data location can be created and written.
    pub fn prepare<S, P>(&self, storage: &S, pause: &P) -> LogResult<()>
    where
        S: Storage,
        P: Pause + ?Sized,
    {
        self.retry.run(pause, "open data for write", || {
            storage.open(Location::Data, AccessMode::Write)
        })?;
        Ok(())
    }

    /// Write `payload` into the slot for `slot_index`, zero-padding the rest.
    ///
    /// Payloads longer than [`MAX_PAYLOAD`] or containing a NUL byte are
    /// rejected before storage is opened.
    pub fn append<S, P>(
        &self,
        storage: &S,
        pause: &P,
        slot_index: u64,
        payload: &[u8],
    ) -> LogResult<()>
    where
        S: Storage,
        P: Pause + ?Sized,
    {
        if payload.len() > MAX_PAYLOAD {
            return Err(LogError::PayloadTooLarge {
                length: payload.len(),
                max: MAX_PAYLOAD,
            });
        }
        if let Some(position) = payload.iter().position(|&b| b == 0) {
            return Err(LogError::EmbeddedNul { position });
        }

        let mut handle = self.retry.run(pause, "open data for write", || {
            storage.open(Location::Data, AccessMode::Write)
        })?;
        handle.seek(SeekFrom::Start(self.slot_offset(slot_index)))?;

        let written = write_once(&mut handle, payload)?;
        if written != payload.len() {
            return Err(LogError::ShortWrite {
                expected: payload.len(),
                actual: written,
            });
        }

        let padding = [0u8; SLOT_WIDTH];
        let pad_len = SLOT_WIDTH - payload.len();
        let written = write_once(&mut handle, &padding[..pad_len])?;
        if written != pad_len {
            return Err(LogError::ShortWrite {
                expected: pad_len,
                actual: written,
            });
        }
        Ok(())
    }

    /// Read the slot for `slot_index`.
    ///
    /// A short read is not an error: it is returned as [`SlotRead::Short`]
    /// so a bulk scan can move on to the next slot.
    pub fn read_slot<S, P>(&self, storage: &S, pause: &P, slot_index: u64) -> LogResult<SlotRead>
    where
        S: Storage,
        P: Pause + ?Sized,
    {
        let mut handle = self.retry.run(pause, "open data for read", || {
            storage.open(Location::Data, AccessMode::Read)
        })?;
        let offset = self.slot_offset(slot_index);
        handle.seek(SeekFrom::Start(offset))?;

        let mut buf = [0u8; SLOT_WIDTH];
        let read = read_up_to(&mut handle, &mut buf)?;
        let text = terminated_text(&buf[..read]);

        if read != SLOT_WIDTH {
            warn!(
                slot = offset / SLOT_WIDTH as u64,
                expected = SLOT_WIDTH,
                actual = read,
                "Short read from ring slot"
            );
            return Ok(SlotRead::Short {
                expected: SLOT_WIDTH,
                actual: read,
                partial: text,
            });
        }
        Ok(SlotRead::Complete(text))
    }
}

/// Slot bytes up to the first zero, as text.
fn terminated_text(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
