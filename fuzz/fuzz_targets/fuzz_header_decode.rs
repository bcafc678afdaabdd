// SPDX-License-Identifier: PMPL-1.0-or-later
// Fuzz target for ring header decoding and validation

#![no_main]

use libfuzzer_sys::fuzz_target;
use trackring_log::Header;

fuzz_target!(|data: &[u8]| {
    if let Ok(header) = Header::decode(data) {
        // Every field before the reserved tail must survive a re-encode.
        assert_eq!(&header.encode()[..40], &data[..40]);

        if header.capacity > 0 {
            let _ = header.validate(header.capacity);
        }
    }
});
