//! Fuzz target for label format sniffing and line decoding.
//!
//! Each UTF-8 input is sniffed from its first line and decoded in full,
//! with and without an image size.

#![no_main]

use libfuzzer_sys::fuzz_target;
use boxlab::codec::sniff::fuzz_sniff_and_decode;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    fuzz_sniff_and_decode(text);
});
