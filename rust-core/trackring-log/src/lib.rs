// SPDX-License-Identifier: PMPL-1.0-or-later
//
// TrackRing ring-buffer log crate
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Keeps the most recent window of GPS track records on block storage in a
// fixed-capacity ring. The newest record always overwrites the oldest once
// the ring is full, and a power cut at any instant leaves a ring that can
// be reopened without repair.
//
// # Architecture
//
// Storage is split into two locations behind the `Storage` trait:
//
// - the **header**: one 64-byte record holding head, tail, count, a
//   monotonic write counter and the last append timestamp;
// - the **data**: a flat array of 64-byte slots, one record per slot.
//
// Every append writes its slot first and the header second, so the header
// only ever describes slots that are fully written. Losing power between
// the two writes loses the newest record and nothing else.
//
// Range reads filter on the `DDMMYY,HHMMSS` prefix embedded in each record,
// not on the timestamp passed to `enqueue`.
//
// ## Usage
//
// ```no_run
// use trackring_log::{CircularLog, FsStorage, LogConfig};
//
// let config = LogConfig::default();
// let storage = FsStorage::from_config("/tmp/trackring", &config).unwrap();
// let mut log = CircularLog::new(storage, config).unwrap();
// log.begin().unwrap();
//
// log.enqueue("150424,120505,07700.1234E,5130.5678N,045.3", 1_713_182_705)
//     .unwrap();
//
// log.read_since(1_713_182_700, |record| println!("{record}")).unwrap();
// println!("{}", log.stats());
// ```

pub mod codec;
pub mod config;
pub mod error;
pub mod fs;
pub mod header;
pub mod log;
pub mod memory;
pub mod record;
pub mod retry;
pub mod storage;

// Re-export the primary public API for ergonomic imports.
pub use codec::{decode_timestamp, epoch_seconds, Fix, TrackRecord, SIGNAL_LOST};
pub use config::LogConfig;
pub use error::{LogError, LogResult};
pub use fs::{FsHandle, FsStorage, DEFAULT_DATA_FILE, DEFAULT_HEADER_FILE};
pub use header::{Header, HeaderStore, HEADER_MAGIC, HEADER_SIZE, HEADER_VERSION};
pub use log::{CircularLog, LogState, LogStats, ReadOutcome, Since};
pub use memory::{MemHandle, MemStorage};
pub use record::{RecordStore, SlotRead, MAX_PAYLOAD, SLOT_WIDTH};
pub use retry::{Pause, RecordedPauses, RetryPolicy, ThreadPause};
pub use storage::{AccessMode, Location, Storage, StorageHandle, SyncMode};
