//! Fuzz target for descriptive annotation documents.

#![no_main]

use boxreview::ir::io_descriptive::from_yaml_str;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(yaml) = std::str::from_utf8(data) else {
        return;
    };

    let _ = from_yaml_str(yaml);
});
