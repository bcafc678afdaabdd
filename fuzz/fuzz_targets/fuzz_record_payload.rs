// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for record timestamp decoding and full record parsing

#![no_main]

use libfuzzer_sys::fuzz_target;
use trackring_log::{epoch_seconds, TrackRecord};

fuzz_target!(|data: &[u8]| {
    if let Ok(s) = std::str::from_utf8(data) {
        let ts = epoch_seconds(s);

        if let Some(record) = TrackRecord::parse(s) {
            assert_eq!(Some(record.epoch_seconds()), ts);
            let _ = record.to_payload();
        }
    }
});
