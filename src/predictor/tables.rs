//! Precomputed fixed-point stretch/squash tables.
//!
//! `squash` maps a stretched logit in `[-2047, 2047]` to a 12-bit
//! probability in `[0, 4095]`; `stretch` is built by inverting the
//! squash table so the two stay consistent with each other. Table
//! *construction* uses floating-point math once, behind a
//! [`OnceLock`]; nothing on the per-bit prediction path does.

use std::sync::OnceLock;

const TABLE_SIZE: usize = 4096;
/// Stretched logits are clamped to `[-STRETCH_RANGE, STRETCH_RANGE]`.
pub const STRETCH_RANGE: i32 = 2047;

fn squash_table() -> &'static [u16; TABLE_SIZE] {
    static TABLE: OnceLock<[u16; TABLE_SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let mut t = [0u16; TABLE_SIZE];
        for (i, slot) in t.iter_mut().enumerate() {
            let d = (i as i32 - 2048) as f64 / 256.0;
            let p = 1.0 / (1.0 + (-d).exp());
            *slot = ((p * 4095.0).round() as i32).clamp(1, 4094) as u16;
        }
        t
    })
}

fn stretch_table() -> &'static [i16; TABLE_SIZE] {
    static TABLE: OnceLock<[i16; TABLE_SIZE]> = OnceLock::new();
    TABLE.get_or_init(|| {
        let squash = squash_table();
        let mut t = [0i16; TABLE_SIZE];
        let mut p_lo = 0usize;
        for d in -STRETCH_RANGE..=STRETCH_RANGE {
            let p = squash[(d + 2048) as usize] as usize;
            for slot in t.iter_mut().take(p + 1).skip(p_lo) {
                *slot = d as i16;
            }
            p_lo = p + 1;
        }
        for slot in t.iter_mut().take(TABLE_SIZE).skip(p_lo) {
            *slot = STRETCH_RANGE as i16;
        }
        t
    })
}

/// Maps a stretched logit to a 12-bit probability.
pub fn squash(d: i32) -> u16 {
    let idx = (d.clamp(-STRETCH_RANGE, STRETCH_RANGE) + 2048) as usize;
    squash_table()[idx]
}

/// Maps a 12-bit probability to its stretched logit.
pub fn stretch(p: u16) -> i32 {
    stretch_table()[p.min(4095) as usize] as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn squash_midpoint_is_centered() {
        let p = squash(0);
        assert!((2000..=2096).contains(&p));
    }

    #[test]
    fn squash_and_stretch_round_trip_loosely() {
        for d in [-2000, -500, 0, 500, 2000] {
            let p = squash(d);
            let back = stretch(p);
            assert!((back - d).abs() <= 32, "d={d} p={p} back={back}");
        }
    }

    #[test]
    fn squash_is_monotonic_nondecreasing() {
        let mut prev = squash(-STRETCH_RANGE);
        for d in (-STRETCH_RANGE + 1)..=STRETCH_RANGE {
            let cur = squash(d);
            assert!(cur >= prev);
            prev = cur;
        }
    }

    #[test]
    fn extreme_logits_saturate_near_the_boundaries() {
        assert!(squash(-STRETCH_RANGE) <= 16);
        assert!(squash(STRETCH_RANGE) >= 4080);
    }
}
