//! Fuzz target for whole normalized-line files seeded into a store.
//!
//! Anything the lenient parser accepts must either seed a store or be
//! reported as a warning; seeding must never panic.

#![no_main]

use boxreview::ir::io_lines::parse_lines;
use boxreview::ir::LabelVocabulary;
use boxreview::store::BoxStore;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if data.len() > 1024 * 1024 {
        return;
    }

    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };

    let parsed = parse_lines(text, None);
    let mut store = BoxStore::new(640, 480);
    let _ = store.seed_from_persisted(&parsed, &LabelVocabulary::default());
});
