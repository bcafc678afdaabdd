// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Block storage abstraction for the ring log.
//
// The ring persists into exactly two locations: a fixed-size header and a
// flat array of fixed-width slots. A `Storage` implementation hands out one
// short-lived handle per open; the ring drops every handle before an
// operation returns so a small pool of driver handles is never exhausted.

use std::fmt;
use std::io::{self, Read, Seek, Write};

use serde::{Deserialize, Serialize};

/// One of the two storage locations the ring persists into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    /// The 64-byte ring header.
    Header,
    /// The slot array.
    Data,
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Location::Header => f.write_str("header"),
            Location::Data => f.write_str("data"),
        }
    }
}

/// How a location is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessMode {
    /// Read-only. Fails if the location does not exist.
    Read,
    /// Read-write, creating the location if absent. Never truncates.
    Write,
}

/// Controls how hard a header save pushes bytes to stable media.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Flush and then `fsync` the header after every save. Slowest, and
    /// the only mode where a returned save survives power loss.
    #[default]
    Fsync,
    /// Flush userspace buffers only; the OS decides when the media sees it.
    Flush,
}

/// An open storage handle. Dropping it releases the underlying resource.
pub trait StorageHandle: Read + Write + Seek {
    /// Push written bytes to stable media.
    fn sync(&mut self) -> io::Result<()> {
        self.flush()
    }
}

/// A pluggable block storage driver.
///
/// Implementations model removable media: `open` may fail transiently,
/// and reads or writes may transfer fewer bytes than requested. Callers
/// are expected to wrap `open` in a retry policy and to check every
/// transfer count.
pub trait Storage {
    /// The handle type returned by [`Storage::open`].
    type Handle: StorageHandle;

    /// Open `location` in the given mode.
    fn open(&self, location: Location, mode: AccessMode) -> io::Result<Self::Handle>;

    /// Returns `true` if `location` currently exists.
    fn exists(&self, location: Location) -> bool;

    /// Remove `location`. Removing a missing location is not an error.
    fn remove(&self, location: Location) -> io::Result<()>;

    /// A human-readable name for this driver, used in logging.
    fn name(&self) -> &str;
}

/// Write as much of `buf` as a single driver call accepts and report the
/// count. Unlike `write_all`, a short transfer is surfaced to the caller.
pub(crate) fn write_once<W: Write + ?Sized>(writer: &mut W, buf: &[u8]) -> io::Result<usize> {
    loop {
        match writer.write(buf) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}

/// Fill `buf` until it is full or the source reports end of data, returning
/// the number of bytes read. A result smaller than `buf.len()` is a short
/// read, left for the caller to classify.
pub(crate) fn read_up_to<R: Read + ?Sized>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_up_to_reports_short_read() {
        let mut source = Cursor::new(vec![7u8; 10]);
        let mut buf = [0u8; 64];
        let n = read_up_to(&mut source, &mut buf).unwrap();
        assert_eq!(n, 10);
        assert_eq!(&buf[..10], &[7u8; 10]);
    }

    #[test]
    fn test_read_up_to_fills_buffer() {
        let mut source = Cursor::new(vec![1u8; 100]);
        let mut buf = [0u8; 64];
        assert_eq!(read_up_to(&mut source, &mut buf).unwrap(), 64);
    }

    #[test]
    fn test_sync_mode_serde_names() {
        let json = serde_json::to_string(&SyncMode::Flush).unwrap();
        assert_eq!(json, "\"flush\"");
        let mode: SyncMode = serde_json::from_str("\"fsync\"").unwrap();
        assert_eq!(mode, SyncMode::Fsync);
    }

    #[test]
    fn test_location_display() {
        assert_eq!(Location::Header.to_string(), "header");
        assert_eq!(Location::Data.to_string(), "data");
    }
}
