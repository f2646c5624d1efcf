//! Fuzz target for single-line normalized-line parsing.
//!
//! Feeds arbitrary UTF-8 lines to the line parser, checking for panics,
//! crashes, or hangs.

#![no_main]

use boxreview::ir::io_lines::fuzz_parse_line;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(line) = std::str::from_utf8(data) else {
        return;
    };

    let _ = fuzz_parse_line(line);
});
