//! Fuzz target for precomputed detector output.

#![no_main]

use boxreview::mining::PrecomputedDetector;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }

    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };

    let _ = PrecomputedDetector::from_json_str(json);
});
