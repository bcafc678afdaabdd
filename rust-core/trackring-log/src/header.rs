// SPDX-License-Identifier: PMPL-1.0-or-later
//
// TrackRing - Ring header
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The header is the authoritative record of where the ring starts, where it
// ends and how many records it holds. It is persisted as one fixed 64-byte
// record at offset 0 of the header location, so a save either lands whole
// or leaves the previous header in place.
//
// On-disk layout (all integers little-endian):
//   [4 bytes: magic (u32)]               -- HEADER_MAGIC
//   [4 bytes: version (u32)]             -- HEADER_VERSION
//   [4 bytes: capacity (u32)]            -- slot count the ring was built with
//   [4 bytes: head_index (u32)]          -- next slot to write
//   [4 bytes: tail_index (u32)]          -- oldest valid slot
//   [4 bytes: entry_count (u32)]         -- valid records, <= capacity
//   [8 bytes: total_entries_ever (u64)]  -- monotonic write counter
//   [8 bytes: last_timestamp (i64)]      -- Unix seconds of the latest write
//   [24 bytes: reserved]                 -- zero

use std::io::{Seek, SeekFrom};

use tracing::debug;

use crate::error::{LogError, LogResult};
use crate::retry::{Pause, RetryPolicy};
use crate::storage::{read_up_to, write_once, AccessMode, Location, Storage, StorageHandle};

/// Size of the persisted header in bytes.
pub const HEADER_SIZE: usize = 64;

/// Validity witness at the start of every header ("TRRK" on disk).
pub const HEADER_MAGIC: u32 = 0x4B52_5254;

/// Current header format version.
pub const HEADER_VERSION: u32 = 1;

const RESERVED_OFFSET: usize = 40;

/// In-memory copy of the ring metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// Slot count the ring was created with.
    pub capacity: u32,
    /// Next slot to write.
    pub head_index: u32,
    /// Oldest valid slot.
    pub tail_index: u32,
    /// Number of valid records.
    pub entry_count: u32,
    /// Records ever written, including evicted ones.
    pub total_entries_ever: u64,
    /// Unix seconds passed with the most recent write.
    pub last_timestamp: i64,
}

impl Header {
    /// An empty ring of `capacity` slots.
    pub fn empty(capacity: u32) -> Self {
        Self {
            capacity,
            head_index: 0,
            tail_index: 0,
            entry_count: 0,
            total_entries_ever: 0,
            last_timestamp: 0,
        }
    }

    /// Returns `true` when every slot holds a live record.
    pub fn is_full(&self) -> bool {
        self.entry_count == self.capacity
    }

    /// Returns `true` when no record is stored.
    pub fn is_empty(&self) -> bool {
        self.entry_count == 0
    }

    /// Account for one record written at `head_index`.
    ///
    /// Advances the head and, when the ring was already full, the tail too:
    /// the slot just overwritten was the oldest record. The write counter
    /// wraps to zero after `u64::MAX`.
    pub fn advance(&mut self, timestamp: i64) {
        self.head_index = (self.head_index + 1) % self.capacity;
        self.total_entries_ever = self.total_entries_ever.wrapping_add(1);
        self.last_timestamp = timestamp;

        if self.is_full() {
            self.tail_index = (self.tail_index + 1) % self.capacity;
        } else {
            self.entry_count += 1;
        }
    }

    /// Encode to the fixed on-disk layout.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&HEADER_MAGIC.to_le_bytes());
        buf[4..8].copy_from_slice(&HEADER_VERSION.to_le_bytes());
        buf[8..12].copy_from_slice(&self.capacity.to_le_bytes());
        buf[12..16].copy_from_slice(&self.head_index.to_le_bytes());
        buf[16..20].copy_from_slice(&self.tail_index.to_le_bytes());
        buf[20..24].copy_from_slice(&self.entry_count.to_le_bytes());
        buf[24..32].copy_from_slice(&self.total_entries_ever.to_le_bytes());
        buf[32..RESERVED_OFFSET].copy_from_slice(&self.last_timestamp.to_le_bytes());
        buf
    }

    /// Decode from the fixed on-disk layout.
    ///
    /// Only the magic and version are checked here; structural checks
    /// against a configured capacity live in [`Header::validate`].
    pub fn decode(buf: &[u8]) -> LogResult<Self> {
        if buf.len() != HEADER_SIZE {
            return Err(LogError::corrupt(format!(
                "header is {} bytes, expected {HEADER_SIZE}",
                buf.len()
            )));
        }

        let magic = le_u32(buf, 0);
        if magic != HEADER_MAGIC {
            return Err(LogError::corrupt(format!("bad magic {magic:#010x}")));
        }
        let version = le_u32(buf, 4);
        if version != HEADER_VERSION {
            return Err(LogError::corrupt(format!("unsupported version {version}")));
        }

        Ok(Self {
            capacity: le_u32(buf, 8),
            head_index: le_u32(buf, 12),
            tail_index: le_u32(buf, 16),
            entry_count: le_u32(buf, 20),
            total_entries_ever: le_u64(buf, 24),
            last_timestamp: le_u64(buf, 32) as i64,
        })
    }

    /// Check the ring invariants against the configured `capacity`.
    ///
    /// A header built for a different capacity, or with positions outside
    /// the slot array, cannot address slots safely.
    pub fn validate(&self, capacity: u32) -> LogResult<()> {
        if self.capacity != capacity {
            return Err(LogError::corrupt(format!(
                "header capacity {} does not match configured {capacity}",
                self.capacity
            )));
        }
        if self.head_index >= capacity || self.tail_index >= capacity {
            return Err(LogError::corrupt(format!(
                "head {} / tail {} outside {capacity} slots",
                self.head_index, self.tail_index
            )));
        }
        if self.entry_count > capacity {
            return Err(LogError::corrupt(format!(
                "entry count {} exceeds capacity {capacity}",
                self.entry_count
            )));
        }
        if (u64::from(self.tail_index) + u64::from(self.entry_count)) % u64::from(capacity)
            != u64::from(self.head_index)
        {
            return Err(LogError::corrupt(format!(
                "tail {} + count {} does not reach head {}",
                self.tail_index, self.entry_count, self.head_index
            )));
        }
        Ok(())
    }
}

fn le_u32(buf: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([buf[at], buf[at + 1], buf[at + 2], buf[at + 3]])
}

fn le_u64(buf: &[u8], at: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&buf[at..at + 8]);
    u64::from_le_bytes(bytes)
}

// ---------------------------------------------------------------------------
// HeaderStore
// ---------------------------------------------------------------------------

/// Loads and saves the header at offset 0 of [`Location::Header`].
#[derive(Debug, Clone)]
pub struct HeaderStore {
    retry: RetryPolicy,
}

impl HeaderStore {
    /// Create a store that opens the header location under `retry`.
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    /// Read and validate the persisted header.
    ///
    /// Fails with [`LogError::CorruptHeader`] when fewer than
    /// [`HEADER_SIZE`] bytes are present, the magic or version is wrong, or
    /// the header does not fit a ring of `capacity` slots.
    pub fn load<S, P>(&self, storage: &S, pause: &P, capacity: u32) -> LogResult<Header>
    where
        S: Storage,
        P: Pause + ?Sized,
    {
        let header = self.peek(storage, pause)?;
        header.validate(capacity)?;

        debug!(
            head = header.head_index,
            tail = header.tail_index,
            count = header.entry_count,
            "Loaded ring header"
        );
        Ok(header)
    }

    /// Read and decode the persisted header without checking it against a
    /// configured capacity. Used to size a ring from what is on disk.
    pub fn peek<S, P>(&self, storage: &S, pause: &P) -> LogResult<Header>
    where
        S: Storage,
        P: Pause + ?Sized,
    {
        let mut handle = self.retry.run(pause, "open header for read", || {
            storage.open(Location::Header, AccessMode::Read)
        })?;

        // One spare byte so an oversized header is caught as well.
        let mut buf = [0u8; HEADER_SIZE + 1];
        let read = read_up_to(&mut handle, &mut buf)?;
        Header::decode(&buf[..read])
    }

    /// Persist `header` at offset 0 and flush it before the handle closes.
    pub fn save<S, P>(&self, storage: &S, pause: &P, header: &Header) -> LogResult<()>
    where
        S: Storage,
        P: Pause + ?Sized,
    {
        let mut handle = self.retry.run(pause, "open header for write", || {
            storage.open(Location::Header, AccessMode::Write)
        })?;

        let bytes = header.encode();
        handle.seek(SeekFrom::Start(0))?;
        let written = write_once(&mut handle, &bytes)?;
        if written != HEADER_SIZE {
            return Err(LogError::ShortWrite {
                expected: HEADER_SIZE,
                actual: written,
            });
        }
        handle.sync()?;
        Ok(())
    }

    /// Remove any persisted header.
    pub fn discard<S: Storage>(&self, storage: &S) -> LogResult<()> {
        storage.remove(Location::Header)?;
        Ok(())
    }
}
