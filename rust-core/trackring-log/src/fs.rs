// SPDX-License-Identifier: PMPL-1.0-or-later
//
// TrackRing - Filesystem storage driver
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Maps the two ring locations onto two files in one directory, by default
// `ring.hdr` and `ring.dat`. The data file is never pre-allocated; it grows
// as slots past its current end are first written.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::LogConfig;
use crate::storage::{AccessMode, Location, Storage, StorageHandle, SyncMode};

/// Default file name of the header location.
pub const DEFAULT_HEADER_FILE: &str = "ring.hdr";

/// Default file name of the data location.
pub const DEFAULT_DATA_FILE: &str = "ring.dat";

/// A [`File`] handle that honours the configured [`SyncMode`] on `sync`.
#[derive(Debug)]
pub struct FsHandle {
    file: File,
    sync_mode: SyncMode,
}

impl io::Read for FsHandle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.file, buf)
    }
}

impl io::Write for FsHandle {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::Write::write(&mut self.file, buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.file)
    }
}

impl io::Seek for FsHandle {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        io::Seek::seek(&mut self.file, pos)
    }
}

impl StorageHandle for FsHandle {
    fn sync(&mut self) -> io::Result<()> {
        io::Write::flush(&mut self.file)?;
        match self.sync_mode {
            SyncMode::Fsync => self.file.sync_all(),
            SyncMode::Flush => Ok(()),
        }
    }
}

/// Directory-backed storage driver.
#[derive(Debug, Clone)]
pub struct FsStorage {
    dir: PathBuf,
    header_path: PathBuf,
    data_path: PathBuf,
    sync_mode: SyncMode,
}

impl FsStorage {
    /// Use `dir` with the default file names and `fsync` on header saves.
    ///
    /// The directory is created if it does not exist.
    pub fn new(dir: impl AsRef<Path>) -> io::Result<Self> {
        Self::with_files(dir, DEFAULT_HEADER_FILE, DEFAULT_DATA_FILE, SyncMode::Fsync)
    }

    /// Use `dir` with the file names and sync mode from `config`.
    pub fn from_config(dir: impl AsRef<Path>, config: &LogConfig) -> io::Result<Self> {
        Self::with_files(dir, &config.header_file, &config.data_file, config.sync_mode)
    }

    /// Use `dir` with explicit file names.
    pub fn with_files(
        dir: impl AsRef<Path>,
        header_file: &str,
        data_file: &str,
        sync_mode: SyncMode,
    ) -> io::Result<Self> {
        let dir = dir.as_ref().to_path_buf();

        if !dir.exists() {
            fs::create_dir_all(&dir)?;
            info!(dir = %dir.display(), "Created ring directory");
        }

        Ok(Self {
            header_path: dir.join(header_file),
            data_path: dir.join(data_file),
            dir,
            sync_mode,
        })
    }

    /// The directory holding both ring files.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// The on-disk path of `location`.
    pub fn path(&self, location: Location) -> &Path {
        match location {
            Location::Header => &self.header_path,
            Location::Data => &self.data_path,
        }
    }
}

impl Storage for FsStorage {
    type Handle = FsHandle;

    fn open(&self, location: Location, mode: AccessMode) -> io::Result<FsHandle> {
        let path = self.path(location);
        let file = match mode {
            AccessMode::Read => File::open(path)?,
            AccessMode::Write => OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(path)?,
        };
        Ok(FsHandle {
            file,
            sync_mode: self.sync_mode,
        })
    }

    fn exists(&self, location: Location) -> bool {
        self.path(location).is_file()
    }

    fn remove(&self, location: Location) -> io::Result<()> {
        let path = self.path(location);
        match fs::remove_file(path) {
            Ok(()) => {
                debug!(path = %path.display(), "Removed ring file");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    fn name(&self) -> &str {
        "fs"
    }
}
