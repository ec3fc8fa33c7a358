//! Fuzz target for Archive::open_bytes with arbitrary byte input.
//!
//! This target exercises the archive parsing code with potentially malformed
//! or adversarial input. The goal is to find panics, hangs, or memory issues
//! in the container, replay, and extraction logic.
//!
//! Run with: cargo +nightly fuzz run archive_open
//!
//! The fuzzer will automatically discover and save interesting inputs that
//! trigger new code paths.

#![no_main]

use libfuzzer_sys::fuzz_target;
use zpaqrs::{Archive, ExtractOptions, MemorySink, Selector};

fuzz_target!(|data: &[u8]| {
    // We don't care about the result - we're looking for panics or hangs.
    let Ok(archive) = Archive::open_bytes(data) else {
        return;
    };

    if let Ok(entries) = archive.list(None) {
        for entry in &entries {
            let _ = entry.path.as_str();
            let _ = entry.name();
            let _ = entry.size;
            let _ = entry.mtime;
            let _ = entry.attributes;
        }
    }

    let mut sink = MemorySink::default();
    let _ = archive.extract(&Selector::All, &mut sink, &ExtractOptions::default(), None);
    let _ = archive.verify();
    let _ = archive.versions();
});
