//! Fuzz target for VOC XML parsing.
//!
//! Arbitrary bytes go to the VOC reader, which must reject them without
//! panicking or hanging.

#![no_main]

use libfuzzer_sys::fuzz_target;
use boxlab::codec::voc::fuzz_parse_bytes;

fuzz_target!(|data: &[u8]| {
    // Cap input size to avoid excessive memory usage.
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let _ = fuzz_parse_bytes(data);
});
