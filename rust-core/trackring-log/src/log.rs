// SPDX-License-Identifier: PMPL-1.0-or-later
//
// TrackRing - Circular log
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `CircularLog` owns the in-memory header and drives the head/tail/eviction
// algorithm on top of `RecordStore` and `HeaderStore`.
//
// Every append writes the slot first and the header second. A crash in
// between leaves the persisted header one record behind the slot array:
// the newest record is lost on reboot, but the ring is never inconsistent,
// because only the header says which slots are live.

use std::fmt;
use std::iter::FusedIterator;

use tracing::{debug, error, info, warn};

use crate::codec::epoch_seconds;
use crate::config::LogConfig;
use crate::error::{LogError, LogResult};
use crate::header::{Header, HeaderStore};
use crate::record::{RecordStore, SlotRead};
use crate::retry::{Pause, ThreadPause};
use crate::storage::{Location, Storage};

// ---------------------------------------------------------------------------
// LogState / LogStats / ReadOutcome
// ---------------------------------------------------------------------------

/// Lifecycle of a [`CircularLog`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogState {
    /// `begin()` has not succeeded. Every operation short-circuits.
    Uninitialized,
    /// The header is loaded or freshly created; the ring is usable.
    Ready,
}

/// Read-only snapshot of the ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogStats {
    /// Lifecycle state when the snapshot was taken.
    pub state: LogState,
    /// Records currently retrievable.
    pub entry_count: u32,
    /// Slot count.
    pub capacity: u32,
    /// Unix seconds passed with the most recent append.
    pub last_timestamp: i64,
    /// Records ever appended, including evicted ones.
    pub total_entries_ever: u64,
    /// Next slot to write.
    pub head_index: u32,
    /// Oldest live slot.
    pub tail_index: u32,
}

impl fmt::Display for LogStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Ring log statistics:")?;
        writeln!(f, "  State: {:?}", self.state)?;
        writeln!(
            f,
            "  Entries: {} / {} ({:.1}%)",
            self.entry_count,
            self.capacity,
            f64::from(self.entry_count) / f64::from(self.capacity.max(1)) * 100.0
        )?;
        writeln!(f, "  Head: {}  Tail: {}", self.head_index, self.tail_index)?;
        writeln!(f, "  Total appended: {}", self.total_entries_ever)?;
        writeln!(f, "  Last timestamp: {}", self.last_timestamp)?;
        Ok(())
    }
}

/// Result of a range read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// Nothing matched: the ring is not ready, empty, or every record is
    /// older than the threshold.
    NoData,
    /// At least one record reached the sink.
    Delivered {
        /// Records handed to the sink.
        matched: usize,
        /// Slots passed over because of a short read or an undecodable
        /// timestamp.
        skipped: usize,
    },
}

impl ReadOutcome {
    /// Returns `true` if at least one record matched.
    pub fn matched(&self) -> bool {
        matches!(self, ReadOutcome::Delivered { .. })
    }
}

// ---------------------------------------------------------------------------
// CircularLog
// ---------------------------------------------------------------------------

/// A fixed-capacity ring of track records on block storage.
///
/// Single writer, synchronous: mutating operations take `&mut self`, reads
/// take `&self`, and each runs to completion before returning.
pub struct CircularLog<S, P = ThreadPause> {
    storage: S,
    pause: P,
    config: LogConfig,
    header_store: HeaderStore,
    records: RecordStore,
    header: Header,
    state: LogState,
}

impl<S: Storage> CircularLog<S, ThreadPause> {
    /// Build an uninitialized log over `storage`. Call
    /// [`CircularLog::begin`] before use.
    pub fn new(storage: S, config: LogConfig) -> LogResult<Self> {
        Self::with_pause(storage, config, ThreadPause)
    }
}

impl<S: Storage, P: Pause> CircularLog<S, P> {
    /// Build an uninitialized log that waits through `pause`.
    pub fn with_pause(storage: S, config: LogConfig, pause: P) -> LogResult<Self> {
        let capacity = config.validate()?;
        Ok(Self {
            header_store: HeaderStore::new(config.retry.clone()),
            records: RecordStore::new(capacity, config.retry.clone()),
            header: Header::empty(capacity),
            state: LogState::Uninitialized,
            storage,
            pause,
            config,
        })
    }

    /// Load the persisted header, or start an empty ring if it is missing
    /// or unusable.
    ///
    /// On failure the log stays [`LogState::Uninitialized`].
    pub fn begin(&mut self) -> LogResult<()> {
        let capacity = self.records.capacity();

        if self.storage.exists(Location::Header) {
            match self
                .header_store
                .load(&self.storage, &self.pause, capacity)
            {
                Ok(header) => {
                    self.header = header;
                    self.state = LogState::Ready;
                    info!(
                        storage = self.storage.name(),
                        entries = header.entry_count,
                        capacity,
                        total = header.total_entries_ever,
                        "Resumed ring log"
                    );
                    return Ok(());
                }
                Err(error) => {
                    warn!(error = %error, "Discarding unusable ring header, starting empty");
                }
            }
        } else {
            info!(storage = self.storage.name(), capacity, "No ring header, starting empty");
        }

        self.state = LogState::Uninitialized;
        self.header = Header::empty(capacity);
        match self.initialize_empty() {
            Ok(()) => {
                self.state = LogState::Ready;
                Ok(())
            }
            Err(error) => {
                error!(error = %error, "Ring log initialization failed");
                Err(error)
            }
        }
    }

    /// Load the persisted header without ever replacing it.
    ///
    /// Unlike [`CircularLog::begin`], a missing or unusable header is
    /// returned as an error and storage is left untouched. Meant for
    /// read-only inspection of a ring another process writes.
    pub fn open_existing(&mut self) -> LogResult<()> {
        let capacity = self.records.capacity();
        let header = self
            .header_store
            .load(&self.storage, &self.pause, capacity)?;
        self.header = header;
        self.state = LogState::Ready;
        info!(
            storage = self.storage.name(),
            entries = header.entry_count,
            capacity,
            "Opened existing ring log"
        );
        Ok(())
    }

    /// Append one record.
    ///
    /// Payloads longer than [`crate::MAX_PAYLOAD`] bytes or containing a NUL
    /// byte are rejected without touching the ring.
    ///
    /// `timestamp` only feeds [`LogStats::last_timestamp`]; range reads
    /// filter on the date and time embedded in `payload`. Returns the
    /// record's sequence number (1 for the first record ever appended).
    pub fn enqueue(&mut self, payload: &str, timestamp: i64) -> LogResult<u64> {
        self.ensure_ready()?;

        let slot = self.header.head_index;
        self.records
            .append(&self.storage, &self.pause, u64::from(slot), payload.as_bytes())?;

        let evicting = self.header.is_full();
        self.header.advance(timestamp);
        let sequence = self.header.total_entries_ever;

        if let Err(error) = self
            .header_store
            .save(&self.storage, &self.pause, &self.header)
        {
            warn!(
                error = %error,
                sequence,
                "Ring header save failed; record written but not yet durable"
            );
        }

        debug!(sequence, slot, evicting, "Appended ring record");
        Ok(sequence)
    }

    /// Lazily scan every live record whose embedded timestamp is at or
    /// after `threshold`, oldest first.
    ///
    /// The scan is restartable: calling `since` again with the same
    /// threshold replays the same records. A log that is not ready or is
    /// empty yields nothing without touching storage.
    pub fn since(&self, threshold: i64) -> Since<'_, S, P> {
        let remaining = match self.state {
            LogState::Ready => self.header.entry_count,
            LogState::Uninitialized => 0,
        };
        Since {
            log: self,
            threshold,
            next_slot: u64::from(self.header.tail_index),
            remaining,
            matched: 0,
            skipped: 0,
            failed: false,
        }
    }

    /// Deliver every live record at or after `threshold` to `sink`, oldest
    /// first.
    ///
    /// Returns [`ReadOutcome::NoData`] when the log is not ready, empty, or
    /// nothing qualifies. Hard I/O errors abort the scan; short reads and
    /// undecodable slots are skipped.
    pub fn read_since<F>(&self, threshold: i64, mut sink: F) -> LogResult<ReadOutcome>
    where
        F: FnMut(&str),
    {
        if self.state != LogState::Ready || self.header.is_empty() {
            debug!(state = ?self.state, "Range read on empty or uninitialized ring");
            return Ok(ReadOutcome::NoData);
        }

        let mut records = self.since(threshold);
        for record in records.by_ref() {
            sink(&record?);
        }

        let (matched, skipped) = (records.matched(), records.skipped());
        debug!(threshold, matched, skipped, "Range read finished");
        if matched == 0 {
            Ok(ReadOutcome::NoData)
        } else {
            Ok(ReadOutcome::Delivered { matched, skipped })
        }
    }

    /// Snapshot of the ring metadata. Never touches storage.
    pub fn stats(&self) -> LogStats {
        LogStats {
            state: self.state,
            entry_count: self.header.entry_count,
            capacity: self.header.capacity,
            last_timestamp: self.header.last_timestamp,
            total_entries_ever: self.header.total_entries_ever,
            head_index: self.header.head_index,
            tail_index: self.header.tail_index,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LogState {
        self.state
    }

    /// Returns `true` once `begin()` has succeeded.
    pub fn is_ready(&self) -> bool {
        self.state == LogState::Ready
    }

    /// The in-memory header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// The configuration the log was built with.
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// The underlying storage driver.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn ensure_ready(&self) -> LogResult<()> {
        match self.state {
            LogState::Ready => Ok(()),
            LogState::Uninitialized => Err(LogError::NotInitialized),
        }
    }

    fn initialize_empty(&mut self) -> LogResult<()> {
        self.header_store.discard(&self.storage)?;
        self.records.prepare(&self.storage, &self.pause)?;
        self.header_store
            .save(&self.storage, &self.pause, &self.header)?;
        info!(capacity = self.header.capacity, "Initialized empty ring log");
        Ok(())
    }
}

impl<S, P> fmt::Debug for CircularLog<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CircularLog")
            .field("state", &self.state)
            .field("header", &self.header)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Since
// ---------------------------------------------------------------------------

/// Lazy range read returned by [`CircularLog::since`].
///
/// Yields payloads oldest first. A hard I/O error is yielded once and ends
/// the scan. After every `read_batch_size` delivered records the scan
/// pauses for `read_pause_ms` so a slow consumer can drain.
pub struct Since<'a, S, P> {
    log: &'a CircularLog<S, P>,
    threshold: i64,
    next_slot: u64,
    remaining: u32,
    matched: usize,
    skipped: usize,
    failed: bool,
}

impl<S, P> Since<'_, S, P> {
    /// Records yielded so far.
    pub fn matched(&self) -> usize {
        self.matched
    }

    /// Slots passed over so far (short read or undecodable timestamp).
    pub fn skipped(&self) -> usize {
        self.skipped
    }
}

impl<S: Storage, P: Pause> Iterator for Since<'_, S, P> {
    type Item = LogResult<String>;

    fn next(&mut self) -> Option<Self::Item> {
        let log = self.log;
        while !self.failed && self.remaining > 0 {
            let slot = self.next_slot;
            self.next_slot += 1;
            self.remaining -= 1;

            let payload = match log.records.read_slot(&log.storage, &log.pause, slot) {
                Ok(SlotRead::Complete(payload)) => payload,
                Ok(SlotRead::Short { .. }) => {
                    self.skipped += 1;
                    continue;
                }
                Err(error) => {
                    self.failed = true;
                    return Some(Err(error));
                }
            };

            match epoch_seconds(&payload) {
                Some(ts) if ts >= self.threshold => {
                    let batch = log.config.read_batch_size;
                    if self.matched > 0 && self.matched % batch == 0 {
                        log.pause.pause(log.config.read_pause());
                    }
                    self.matched += 1;
                    return Some(Ok(payload));
                }
                Some(_) => {}
                None => {
                    warn!(slot, "Skipping ring record with undecodable timestamp");
                    self.skipped += 1;
                }
            }
        }
        None
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.failed {
            (0, Some(0))
        } else {
            (0, Some(self.remaining as usize))
        }
    }
}

impl<S: Storage, P: Pause> FusedIterator for Since<'_, S, P> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::HEADER_SIZE;
    use crate::memory::MemStorage;
    use crate::record::SLOT_WIDTH;
    use crate::retry::{RecordedPauses, RetryPolicy};
    use std::time::Duration;

    /// Helper: a record for second `s` after 2024-04-15 12:00:00.
    fn record(s: u32) -> (String, i64) {
        let payload = format!(
            "150424,12{:02}{:02},07700.1234E,5130.5678N,{:03}.0",
            s / 60,
            s % 60,
            s
        );
        let ts = 1_713_182_400 + i64::from(s);
        (payload, ts)
    }

    fn config(capacity: u32) -> LogConfig {
        LogConfig {
            retry: RetryPolicy::fixed(3, Duration::from_millis(1)),
            ..LogConfig::with_capacity(capacity)
        }
    }

    fn open(storage: &MemStorage, capacity: u32) -> CircularLog<MemStorage, RecordedPauses> {
        let mut log =
            CircularLog::with_pause(storage.clone(), config(capacity), RecordedPauses::new())
                .unwrap();
        log.begin().unwrap();
        log
    }

    fn collect(log: &CircularLog<MemStorage, RecordedPauses>, threshold: i64) -> Vec<String> {
        let mut out = Vec::new();
        log.read_since(threshold, |p| out.push(p.to_string())).unwrap();
        out
    }

    #[test]
    fn test_begin_on_blank_storage_creates_empty_ring() {
        let storage = MemStorage::new();
        let log = open(&storage, 5);

        assert!(log.is_ready());
        assert_eq!(log.stats().entry_count, 0);
        assert_eq!(log.stats().capacity, 5);
        assert_eq!(storage.contents(Location::Header).unwrap().len(), HEADER_SIZE);
        assert!(storage.exists(Location::Data));
    }

    #[test]
    fn test_operations_before_begin_short_circuit() {
        let storage = MemStorage::new();
        let mut log = CircularLog::with_pause(storage.clone(), config(5), RecordedPauses::new())
            .unwrap();

        let (payload, ts) = record(1);
        assert!(matches!(
            log.enqueue(&payload, ts),
            Err(LogError::NotInitialized)
        ));
        assert_eq!(log.read_since(0, |_| {}).unwrap(), ReadOutcome::NoData);
        assert_eq!(log.since(0).count(), 0);
        assert_eq!(log.stats().state, LogState::Uninitialized);
        assert_eq!(storage.total_opens(), 0);
    }

    #[test]
    fn test_failed_begin_stays_uninitialized() {
        let storage = MemStorage::new();
        storage.set_write_protected(Location::Data, true);

        let mut log = CircularLog::with_pause(storage.clone(), config(5), RecordedPauses::new())
            .unwrap();
        assert!(log.begin().is_err());
        assert_eq!(log.state(), LogState::Uninitialized);

        let opens = storage.total_opens();
        let (payload, ts) = record(1);
        assert!(matches!(
            log.enqueue(&payload, ts),
            Err(LogError::NotInitialized)
        ));
        assert_eq!(storage.total_opens(), opens);
    }

    #[test]
    fn test_failed_header_persist_stays_uninitialized() {
        let storage = MemStorage::new();
        storage.set_write_protected(Location::Header, true);

        let mut log = CircularLog::with_pause(storage, config(5), RecordedPauses::new()).unwrap();
        assert!(log.begin().is_err());
        assert!(!log.is_ready());
    }

    #[test]
    fn test_enqueue_and_read_back_in_order() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);

        let mut written = Vec::new();
        for s in 1..=3 {
            let (payload, ts) = record(s);
            assert_eq!(log.enqueue(&payload, ts).unwrap(), u64::from(s));
            written.push(payload);
        }

        assert_eq!(collect(&log, 0), written);
        let stats = log.stats();
        assert_eq!(stats.entry_count, 3);
        assert_eq!(stats.last_timestamp, record(3).1);
        assert_eq!(stats.head_index, 3);
        assert_eq!(stats.tail_index, 0);
    }

    #[test]
    fn test_wraparound_keeps_newest_five() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);

        let payloads: Vec<String> = (1..=7)
            .map(|s| {
                let (payload, ts) = record(s);
                log.enqueue(&payload, ts).unwrap();
                payload
            })
            .collect();

        assert_eq!(collect(&log, 0), payloads[2..].to_vec());
        let stats = log.stats();
        assert_eq!(stats.entry_count, 5);
        assert_eq!(stats.tail_index, 2);
        assert_eq!(stats.head_index, 2);
        assert_eq!(stats.total_entries_ever, 7);

        // T3 was the third write, so it sits in slot 2.
        let data = storage.contents(Location::Data).unwrap();
        let slot = &data[2 * SLOT_WIDTH..2 * SLOT_WIDTH + payloads[2].len()];
        assert_eq!(slot, payloads[2].as_bytes());
    }

    #[test]
    fn test_threshold_filters_older_records() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 10);
        for s in 1..=6 {
            let (payload, ts) = record(s);
            log.enqueue(&payload, ts).unwrap();
        }

        let newer = collect(&log, record(4).1);
        assert_eq!(newer, vec![record(4).0, record(5).0, record(6).0]);

        let outcome = log.read_since(record(6).1 + 1, |_| {}).unwrap();
        assert_eq!(outcome, ReadOutcome::NoData);
        assert!(!outcome.matched());
    }

    #[test]
    fn test_empty_ring_read_does_not_touch_storage() {
        let storage = MemStorage::new();
        let log = open(&storage, 5);
        let opens = storage.total_opens();

        assert_eq!(log.read_since(0, |_| {}).unwrap(), ReadOutcome::NoData);
        assert_eq!(storage.total_opens(), opens);
    }

    #[test]
    fn test_reads_are_repeatable() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 4);
        for s in 1..=6 {
            let (payload, ts) = record(s);
            log.enqueue(&payload, ts).unwrap();
        }

        let first: Vec<String> = log.since(record(3).1).map(Result::unwrap).collect();
        let second: Vec<String> = log.since(record(3).1).map(Result::unwrap).collect();
        assert_eq!(first, second);
        assert_eq!(first.len(), 4);
    }

    #[test]
    fn test_signal_lost_records_are_returned() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        log.enqueue("150424,120505,07700.1234E,5130.5678N,045.3", 1_713_182_705)
            .unwrap();
        log.enqueue("150424,120510,SL,SL,SL", 1_713_182_710).unwrap();

        let out = collect(&log, 1_713_182_706);
        assert_eq!(out, vec!["150424,120510,SL,SL,SL".to_string()]);
    }

    #[test]
    fn test_data_write_failure_leaves_header_untouched() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        let (payload, ts) = record(1);
        log.enqueue(&payload, ts).unwrap();
        let before = *log.header();
        let persisted = storage.contents(Location::Header);

        storage.short_write_next(Location::Data, 4);
        let (payload, ts) = record(2);
        assert!(log.enqueue(&payload, ts).is_err());

        assert_eq!(*log.header(), before);
        assert_eq!(storage.contents(Location::Header), persisted);
    }

    #[test]
    fn test_header_save_failure_is_absorbed() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        let (payload, ts) = record(1);
        log.enqueue(&payload, ts).unwrap();

        storage.set_write_protected(Location::Header, true);
        let (payload, ts) = record(2);
        assert_eq!(log.enqueue(&payload, ts).unwrap(), 2);
        assert_eq!(log.stats().entry_count, 2);
        assert_eq!(collect(&log, 0).len(), 2);

        // Rebooting on the stale header loses only the newest record.
        storage.set_write_protected(Location::Header, false);
        let rebooted = open(&storage, 5);
        assert_eq!(collect(&rebooted, 0), vec![record(1).0]);
    }

    #[test]
    fn test_resume_from_persisted_header() {
        let storage = MemStorage::new();
        {
            let mut log = open(&storage, 5);
            for s in 1..=6 {
                let (payload, ts) = record(s);
                log.enqueue(&payload, ts).unwrap();
            }
        }

        let mut log = open(&storage, 5);
        assert_eq!(log.stats().entry_count, 5);
        assert_eq!(log.stats().total_entries_ever, 6);

        let (payload, ts) = record(7);
        assert_eq!(log.enqueue(&payload, ts).unwrap(), 7);
        assert_eq!(collect(&log, 0).first(), Some(&record(3).0));
    }

    #[test]
    fn test_corrupt_header_resets_to_empty() {
        let storage = MemStorage::new();
        {
            let mut log = open(&storage, 5);
            let (payload, ts) = record(1);
            log.enqueue(&payload, ts).unwrap();
        }
        storage.corrupt(Location::Header, 0, 0xFF);

        let log = open(&storage, 5);
        assert!(log.is_ready());
        assert_eq!(log.stats().entry_count, 0);
        assert_eq!(log.read_since(0, |_| {}).unwrap(), ReadOutcome::NoData);
    }

    #[test]
    fn test_short_read_slot_is_skipped() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        for s in 1..=3 {
            let (payload, ts) = record(s);
            log.enqueue(&payload, ts).unwrap();
        }

        storage.short_read_next(Location::Data, 8);
        let mut out = Vec::new();
        let outcome = log.read_since(0, |p| out.push(p.to_string())).unwrap();

        assert_eq!(
            outcome,
            ReadOutcome::Delivered {
                matched: 2,
                skipped: 1
            }
        );
        assert_eq!(out, vec![record(2).0, record(3).0]);
    }

    #[test]
    fn test_undecodable_slot_is_skipped() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        log.enqueue("garbage", 0).unwrap();
        let (payload, ts) = record(1);
        log.enqueue(&payload, ts).unwrap();

        let mut out = Vec::new();
        let outcome = log.read_since(0, |p| out.push(p.to_string())).unwrap();
        assert_eq!(
            outcome,
            ReadOutcome::Delivered {
                matched: 1,
                skipped: 1
            }
        );
        assert_eq!(out, vec![payload]);
    }

    #[test]
    fn test_hard_read_error_aborts_scan() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        let (payload, ts) = record(1);
        log.enqueue(&payload, ts).unwrap();

        storage.fail_next_opens(Location::Data, 3);
        let err = log.read_since(0, |_| {}).unwrap_err();
        assert!(err.is_io());

        let mut scan = log.since(0);
        storage.fail_next_opens(Location::Data, 3);
        assert!(matches!(scan.next(), Some(Err(_))));
        assert!(scan.next().is_none());
    }

    #[test]
    fn test_cooperative_pause_between_batches() {
        let storage = MemStorage::new();
        let cfg = LogConfig {
            read_batch_size: 2,
            read_pause_ms: 7,
            ..config(10)
        };
        let mut log = CircularLog::with_pause(storage, cfg, RecordedPauses::new()).unwrap();
        log.begin().unwrap();
        for s in 1..=5 {
            let (payload, ts) = record(s);
            log.enqueue(&payload, ts).unwrap();
        }

        let delivered = log.since(0).count();
        assert_eq!(delivered, 5);
        assert_eq!(
            log.pause.recorded(),
            vec![Duration::from_millis(7), Duration::from_millis(7)]
        );
    }

    #[test]
    fn test_oversized_payload_rejected_without_mutation() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        let long = "x".repeat(SLOT_WIDTH);
        assert!(matches!(
            log.enqueue(&long, 1),
            Err(LogError::PayloadTooLarge { .. })
        ));
        assert_eq!(log.stats().entry_count, 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let cfg = LogConfig {
            sample_interval_secs: 0,
            ..LogConfig::default()
        };
        assert!(matches!(
            CircularLog::new(MemStorage::new(), cfg),
            Err(LogError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_since_size_hint_is_bounded_by_live_records() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        for s in 1..=3 {
            let (payload, ts) = record(s);
            log.enqueue(&payload, ts).unwrap();
        }

        let mut scan = log.since(0);
        assert_eq!(scan.size_hint(), (0, Some(3)));
        scan.next().unwrap().unwrap();
        assert_eq!(scan.size_hint(), (0, Some(2)));
        assert_eq!(scan.count(), 2);
    }

    #[test]
    fn test_enqueue_wraps_total_counter() {
        let storage = MemStorage::new();
        let store = HeaderStore::new(RetryPolicy::none());
        let header = Header {
            total_entries_ever: u64::MAX,
            ..Header::empty(5)
        };
        store
            .save(&storage, &RecordedPauses::new(), &header)
            .unwrap();

        let mut log = open(&storage, 5);
        let (payload, ts) = record(1);
        assert_eq!(log.enqueue(&payload, ts).unwrap(), 0);
        assert_eq!(collect(&log, 0), vec![payload]);
    }

    #[test]
    fn test_enqueue_rejects_embedded_nul() {
        let storage = MemStorage::new();
        let mut log = open(&storage, 5);
        assert!(matches!(
            log.enqueue("150424,120001\0,SL,SL,SL", 1),
            Err(LogError::EmbeddedNul { .. })
        ));
        assert_eq!(log.stats().entry_count, 0);
    }

    #[test]
    fn test_open_existing_keeps_mismatched_ring() {
        let storage = MemStorage::new();
        {
            let mut log = open(&storage, 5);
            for s in 1..=3 {
                let (payload, ts) = record(s);
                log.enqueue(&payload, ts).unwrap();
            }
        }
        let persisted = storage.contents(Location::Header);

        let mut other =
            CircularLog::with_pause(storage.clone(), config(8), RecordedPauses::new()).unwrap();
        assert!(matches!(
            other.open_existing(),
            Err(LogError::CorruptHeader { .. })
        ));
        assert!(!other.is_ready());
        assert_eq!(storage.contents(Location::Header), persisted);

        let log = open(&storage, 5);
        assert_eq!(collect(&log, 0).len(), 3);
    }

    #[test]
    fn test_open_existing_without_header_fails() {
        let storage = MemStorage::new();
        let mut log =
            CircularLog::with_pause(storage.clone(), config(5), RecordedPauses::new()).unwrap();
        assert!(log.open_existing().unwrap_err().is_io());
        assert!(!storage.exists(Location::Header));
        assert!(!storage.exists(Location::Data));
    }

    #[test]
    fn test_stats_display() {
        let storage = MemStorage::new();
        let log = open(&storage, 4);
        let text = log.stats().to_string();
        assert!(text.contains("0 / 4"));
        assert!(text.contains("Ready"));
    }
}
