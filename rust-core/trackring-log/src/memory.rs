// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// In-memory storage driver for the ring log.
//
// Holds both locations as byte vectors behind an `Arc<Mutex<...>>`, so a
// clone kept by a test observes exactly what the ring wrote. Faults typical
// of removable media can be injected per location: transient open
// failures, write protection, and short reads or writes on the next open.

use std::collections::HashMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::storage::{AccessMode, Location, Storage, StorageHandle};

#[derive(Debug, Default)]
struct Faults {
    /// Remaining transient open failures per location.
    failing_opens: HashMap<Location, u32>,
    /// Locations that refuse `AccessMode::Write`.
    write_protected: HashMap<Location, bool>,
    /// Byte budget for the next handle's reads.
    short_read: HashMap<Location, usize>,
    /// Byte budget for the next handle's writes.
    short_write: HashMap<Location, usize>,
}

#[derive(Debug, Default)]
struct MemInner {
    files: HashMap<Location, Vec<u8>>,
    opens: HashMap<Location, usize>,
    syncs: usize,
    faults: Faults,
}

/// An in-memory storage driver with fault injection.
///
/// All data lives in process memory and is lost when the last clone is
/// dropped.
#[derive(Debug, Clone, Default)]
pub struct MemStorage {
    inner: Arc<Mutex<MemInner>>,
}

impl MemStorage {
    /// Create a new, empty in-memory driver.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MemInner> {
        lock(&self.inner)
    }

    /// Make the next `count` opens of `location` fail with a transient error.
    pub fn fail_next_opens(&self, location: Location, count: u32) {
        self.lock().faults.failing_opens.insert(location, count);
    }

    /// Refuse (or allow again) opening `location` for writing.
    pub fn set_write_protected(&self, location: Location, protected: bool) {
        self.lock()
            .faults
            .write_protected
            .insert(location, protected);
    }

    /// Limit the next handle opened on `location` to reading `limit` bytes.
    pub fn short_read_next(&self, location: Location, limit: usize) {
        self.lock().faults.short_read.insert(location, limit);
    }

    /// Limit the next handle opened on `location` to writing `limit` bytes.
    pub fn short_write_next(&self, location: Location, limit: usize) {
        self.lock().faults.short_write.insert(location, limit);
    }

    /// A copy of the bytes currently stored at `location`.
    pub fn contents(&self, location: Location) -> Option<Vec<u8>> {
        self.lock().files.get(&location).cloned()
    }

    /// Replace the bytes stored at `location`.
    pub fn set_contents(&self, location: Location, bytes: Vec<u8>) {
        self.lock().files.insert(location, bytes);
    }

    /// Cut `location` down to `len` bytes, as a torn write would.
    pub fn truncate(&self, location: Location, len: usize) {
        if let Some(bytes) = self.lock().files.get_mut(&location) {
            bytes.truncate(len);
        }
    }

    /// XOR the byte at `offset` of `location` with `mask`.
    pub fn corrupt(&self, location: Location, offset: usize, mask: u8) {
        if let Some(byte) = self
            .lock()
            .files
            .get_mut(&location)
            .and_then(|bytes| bytes.get_mut(offset))
        {
            *byte ^= mask;
        }
    }

    /// How many successful and failed open attempts `location` has seen.
    pub fn open_count(&self, location: Location) -> usize {
        self.lock().opens.get(&location).copied().unwrap_or(0)
    }

    /// Total open attempts across both locations.
    pub fn total_opens(&self) -> usize {
        self.lock().opens.values().sum()
    }

    /// Number of `sync` calls made through handles.
    pub fn sync_count(&self) -> usize {
        self.lock().syncs
    }
}

fn lock(inner: &Mutex<MemInner>) -> MutexGuard<'_, MemInner> {
    inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl Storage for MemStorage {
    type Handle = MemHandle;

    fn open(&self, location: Location, mode: AccessMode) -> io::Result<MemHandle> {
        let mut inner = self.lock();
        *inner.opens.entry(location).or_insert(0) += 1;

        if let Some(remaining) = inner.faults.failing_opens.get_mut(&location) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(io::Error::other(format!(
                    "simulated transient open failure on {location}"
                )));
            }
        }

        match mode {
            AccessMode::Read => {
                if !inner.files.contains_key(&location) {
                    return Err(io::Error::new(
                        io::ErrorKind::NotFound,
                        format!("{location} location does not exist"),
                    ));
                }
            }
            AccessMode::Write => {
                if inner
                    .faults
                    .write_protected
                    .get(&location)
                    .copied()
                    .unwrap_or(false)
                {
                    return Err(io::Error::new(
                        io::ErrorKind::PermissionDenied,
                        format!("{location} location is write protected"),
                    ));
                }
                inner.files.entry(location).or_default();
            }
        }

        let read_budget = inner.faults.short_read.remove(&location);
        let write_budget = inner.faults.short_write.remove(&location);

        Ok(MemHandle {
            inner: Arc::clone(&self.inner),
            location,
            mode,
            position: 0,
            read_budget,
            write_budget,
        })
    }

    fn exists(&self, location: Location) -> bool {
        self.lock().files.contains_key(&location)
    }

    fn remove(&self, location: Location) -> io::Result<()> {
        self.lock().files.remove(&location);
        Ok(())
    }

    fn name(&self) -> &str {
        "memory"
    }
}

/// A cursor into one location of a [`MemStorage`].
#[derive(Debug)]
pub struct MemHandle {
    inner: Arc<Mutex<MemInner>>,
    location: Location,
    mode: AccessMode,
    position: u64,
    read_budget: Option<usize>,
    write_budget: Option<usize>,
}

impl Read for MemHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let inner = lock(&self.inner);
        let bytes = inner
            .files
            .get(&self.location)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "location removed"))?;

        let start = usize::try_from(self.position).unwrap_or(usize::MAX);
        if start >= bytes.len() {
            return Ok(0);
        }

        let mut n = buf.len().min(bytes.len() - start);
        if let Some(budget) = self.read_budget.as_mut() {
            n = n.min(*budget);
            *budget -= n;
        }

        buf[..n].copy_from_slice(&bytes[start..start + n]);
        self.position += n as u64;
        Ok(n)
    }
}

impl Write for MemHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.mode == AccessMode::Read {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "handle opened read-only",
            ));
        }

        let mut n = buf.len();
        if let Some(budget) = self.write_budget.as_mut() {
            n = n.min(*budget);
            *budget -= n;
        }

        let mut inner = lock(&self.inner);
        let bytes = inner.files.entry(self.location).or_default();
        let start = usize::try_from(self.position)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "position overflow"))?;
        let end = start + n;
        if bytes.len() < end {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(&buf[..n]);
        self.position += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemHandle {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = lock(&self.inner)
            .files
            .get(&self.location)
            .map_or(0, |bytes| bytes.len() as i64);

        let target = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => u64::try_from(len + delta).ok(),
            SeekFrom::Current(delta) => u64::try_from(self.position as i64 + delta).ok(),
        };

        match target {
            Some(position) => {
                self.position = position;
                Ok(position)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek to a negative position",
            )),
        }
    }
}

impl StorageHandle for MemHandle {
    fn sync(&mut self) -> io::Result<()> {
        lock(&self.inner).syncs += 1;
        Ok(())
    }
}
