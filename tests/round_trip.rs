//! Round-trip coverage for the one-shot `compress`/`decompress` API
//! across every supported method, plus container-level resync past a
//! damaged block.

use zpaqrs::checksum::{Checksum, Sha1};
use zpaqrs::codec::presets;
use zpaqrs::format::reader;
use zpaqrs::format::BLOCK_MAGIC;
use zpaqrs::{compress, decompress};

fn patterned_bytes(len: usize, seed: u8) -> Vec<u8> {
    (0..len)
        .map(|i| (i as u8).wrapping_mul(seed).wrapping_add(seed))
        .collect()
}

#[test]
fn literal_store_round_trips_and_matches_the_known_sha1_of_hello() {
    let mut container = Vec::new();
    compress(b"hello", &mut container, 0).unwrap();
    assert!(container.len() >= BLOCK_MAGIC.len() + 5);

    let mut out = Vec::new();
    decompress(&container, &mut out).unwrap();
    assert_eq!(out, b"hello");

    let digest = Sha1::compute(b"hello");
    let expected = [
        0xaa, 0xf4, 0xc6, 0x1d, 0xdc, 0xc5, 0xe8, 0xa2, 0xda, 0xbe, 0xde, 0x0f, 0x3b, 0x48, 0x2c,
        0xd9, 0xae, 0xa9, 0x43, 0x4d,
    ];
    assert_eq!(digest, expected);
}

#[test]
fn every_method_round_trips_patterned_data() {
    let data = patterned_bytes(8 * 1024, 37);
    for method in 0..=presets::MAX_METHOD {
        let mut container = Vec::new();
        compress(&data, &mut container, method).unwrap();

        let mut out = Vec::new();
        decompress(&container, &mut out).unwrap();
        assert_eq!(out, data, "method {method} did not round-trip");
    }
}

#[test]
fn every_method_round_trips_an_empty_input() {
    for method in 0..=presets::MAX_METHOD {
        let mut container = Vec::new();
        compress(&[], &mut container, method).unwrap();

        let mut out = Vec::new();
        decompress(&container, &mut out).unwrap();
        assert!(out.is_empty(), "method {method} did not round-trip empty input");
    }
}

#[test]
fn reader_resyncs_past_a_corrupted_block_trailer() {
    let mut first = Vec::new();
    compress(b"first segment payload", &mut first, 1).unwrap();

    let mut second = Vec::new();
    compress(b"second segment payload", &mut second, 1).unwrap();

    let mut combined = first.clone();
    // Garbage bytes that contain neither a valid trailer nor another
    // magic sequence, wedged between two otherwise well-formed blocks.
    combined.extend([0xDE, 0xAD, 0xBE, 0xEF, 0x00, 0x01, 0x02]);
    combined.extend(&second);

    let (blocks, skipped) = reader::read_all(&combined);
    assert_eq!(blocks.len(), 2);
    assert_eq!(skipped, 7);
}

#[test]
fn truncated_trailing_block_is_dropped_without_panicking() {
    let mut container = Vec::new();
    compress(b"will be truncated", &mut container, 1).unwrap();
    container.pop();

    let (blocks, _skipped) = reader::read_all(&container);
    assert!(blocks.is_empty());
}
