//! Runtime state for the nine predictor component kinds.
//!
//! Components are built from a [`ComponentSpec`](crate::zpaql::program::ComponentSpec)
//! and live in an arena (`Vec<Component>`); `MIX`/`ISSE`/`SSE` reference
//! earlier components by `u8` index into that same arena, never by
//! pointer, per spec.md §9. Each `predict` call caches whatever its
//! matching `update` call needs (the context slot touched, the input
//! values mixed) so `update` never has to recompute context from
//! scratch.
//!
//! The context-map and bit-history transition rule below are a local,
//! internally-consistent design — no byte-exact reference table was
//! available in `original_source/` for this format (see
//! `journal::chunking` for the same situation with chunking
//! parameters) — but the state shapes and update rules match the
//! descriptions in spec.md §4.4 exactly.

use crate::predictor::tables::{squash, stretch};
use crate::zpaql::program::ComponentSpec;

const NEUTRAL_P: u16 = 2048;

/// One bit-history cell: a run-length-style nonstationary counter
/// state plus the probability it currently predicts.
#[derive(Debug, Clone, Copy, Default)]
struct HistCell {
    state: u8,
    p: u16,
}

impl HistCell {
    fn new() -> Self {
        Self {
            state: 0,
            p: NEUTRAL_P,
        }
    }
}

/// Advances a bit-history state after observing `bit`, saturating the
/// run-length count at 255 rather than overflowing.
fn next_state(state: u8, bit: u8) -> u8 {
    if bit == 1 {
        state.saturating_add(1)
    } else {
        state.saturating_sub(1)
    }
}

/// The adaptation rate for a cell at a given state: newer contexts
/// (state near the unbiased midpoint, 128) adapt fast; well-established
/// runs adapt slowly. Mirrors the "increment, cap count" rule spec.md
/// §4.4 gives for `CM`, generalized to carry a direction too.
fn rate_for_state(state: u8) -> u32 {
    let distance_from_neutral = state.abs_diff(128) as u32;
    (distance_from_neutral + 2).min(64)
}

/// Runtime state for one predictor component.
#[derive(Debug, Clone)]
pub enum Component {
    /// A fixed prediction; never updates.
    Const { p: u16 },
    /// Context map: `2^s` direct-indexed (prediction, count) cells.
    Cm {
        table: Vec<(u16, u8)>,
        mask: u32,
        limit: u8,
        active: usize,
    },
    /// Indirect context map: hashed bit-history cells.
    Icm {
        table: Vec<HistCell>,
        mask: u32,
        active: usize,
    },
    /// Longest-match predictor.
    Match {
        history: Vec<u8>,
        hash_table: Vec<u32>,
        mask: u32,
        match_ptr: Option<usize>,
        match_len: u32,
        predicted_bit: u8,
        context_byte: u8,
        bit_pos: u8,
    },
    /// Weighted mean of two earlier outputs; stateless.
    Avg { i: usize, j: usize, w: u16 },
    /// Two-input logistic mixer with a per-context weight pair.
    Mix2 {
        weights: Vec<(i32, i32)>,
        i: usize,
        j: usize,
        rate: u8,
        active: usize,
        last_inputs: (i32, i32),
    },
    /// N-input logistic mixer with a per-context weight vector.
    Mix {
        weights: Vec<Vec<i32>>,
        inputs: Vec<usize>,
        active: usize,
        last_inputs: Vec<i32>,
    },
    /// ICM feeding a 2-weight mixer against another component.
    Isse {
        icm: Vec<HistCell>,
        mask: u32,
        mix_weights: Vec<(i32, i32)>,
        i: usize,
        active: usize,
        last_icm_stretched: i32,
        last_other_stretched: i32,
    },
    /// Secondary symbol estimation: a 2D interpolation table.
    Sse {
        table: Vec<u16>,
        ctx_count: u32,
        i: usize,
        lo_idx: usize,
        hi_idx: usize,
        weight: u32,
    },
}

const SSE_BUCKETS: usize = 33;

impl Component {
    /// Builds runtime state from a static declaration. `ctx` is the
    /// component's current context value (already masked to its `s`
    /// bits by the caller, derived from VM memory per a fixed
    /// per-component convention: context = the `u32` little-endian
    /// word at `H[4*component_index .. 4*component_index+4]`).
    pub fn build(spec: &ComponentSpec) -> Self {
        match spec {
            ComponentSpec::Const(c) => Component::Const {
                p: (*c).min(4095),
            },
            ComponentSpec::Cm { s, limit } => {
                let size = 1usize << (*s).min(24);
                Component::Cm {
                    table: vec![(NEUTRAL_P, 0); size],
                    mask: size as u32 - 1,
                    limit: *limit,
                    active: 0,
                }
            }
            ComponentSpec::Icm { s } => {
                let size = 1usize << (*s).min(24);
                Component::Icm {
                    table: vec![HistCell::new(); size],
                    mask: size as u32 - 1,
                    active: 0,
                }
            }
            ComponentSpec::Match { s, bufbits } => {
                let buf_size = 1usize << (*bufbits).min(24);
                let hash_size = 1usize << (*s).min(24);
                Component::Match {
                    history: Vec::with_capacity(buf_size),
                    hash_table: vec![0u32; hash_size],
                    mask: hash_size as u32 - 1,
                    match_ptr: None,
                    match_len: 0,
                    predicted_bit: 0,
                    context_byte: 0,
                    bit_pos: 0,
                }
            }
            ComponentSpec::Avg { i, j, w } => Component::Avg {
                i: *i as usize,
                j: *j as usize,
                w: *w as u16,
            },
            ComponentSpec::Mix2 { s, i, j, rate } => {
                let size = 1usize << (*s).min(16);
                Component::Mix2 {
                    weights: vec![(0, 0); size],
                    i: *i as usize,
                    j: *j as usize,
                    rate: *rate,
                    active: 0,
                    last_inputs: (0, 0),
                }
            }
            ComponentSpec::Mix { s, inputs } => {
                let size = 1usize << (*s).min(16);
                Component::Mix {
                    weights: vec![vec![0i32; inputs.len()]; size],
                    inputs: inputs.iter().map(|&x| x as usize).collect(),
                    active: 0,
                    last_inputs: vec![0; inputs.len()],
                }
            }
            ComponentSpec::Isse { s, i } => {
                let size = 1usize << (*s).min(24);
                Component::Isse {
                    icm: vec![HistCell::new(); size],
                    mask: size as u32 - 1,
                    mix_weights: vec![(0, 0); size],
                    i: *i as usize,
                    active: 0,
                    last_icm_stretched: 0,
                    last_other_stretched: 0,
                }
            }
            ComponentSpec::Sse { s, i } => {
                let ctx_count = 1u32 << (*s).min(16);
                Component::Sse {
                    table: (0..(ctx_count as usize) * SSE_BUCKETS)
                        .map(|idx| {
                            let bucket = idx % SSE_BUCKETS;
                            squash(((bucket as i32) - 16) * 128)
                        })
                        .collect(),
                    ctx_count,
                    i: *i as usize,
                    lo_idx: 0,
                    hi_idx: 0,
                    weight: 0,
                }
            }
        }
    }

    /// Computes this component's 12-bit prediction, given `ctx` (this
    /// component's own context word) and the outputs already produced
    /// by earlier components in the arena.
    pub fn predict(&mut self, ctx: u32, earlier: &[u16]) -> u16 {
        match self {
            Component::Const { p } => *p,
            Component::Cm {
                table, mask, active, ..
            } => {
                let idx = (ctx & *mask) as usize;
                *active = idx;
                table[idx].0
            }
            Component::Icm { table, mask, active } => {
                let idx = (ctx & *mask) as usize;
                *active = idx;
                table[idx].p
            }
            Component::Match {
                history,
                match_ptr,
                match_len,
                predicted_bit,
                bit_pos,
                ..
            } => {
                if let Some(ptr) = *match_ptr {
                    if ptr < history.len() {
                        let predicted_byte = history[ptr];
                        *predicted_bit = (predicted_byte >> (7 - *bit_pos)) & 1;
                        let confidence = (*match_len).min(28) as i32 * 64;
                        let d = if *predicted_bit == 1 {
                            confidence
                        } else {
                            -confidence
                        };
                        return squash(d);
                    }
                }
                NEUTRAL_P
            }
            Component::Avg { i, j, w } => {
                let pi = earlier[*i] as u32;
                let pj = earlier[*j] as u32;
                (((*w as u32) * pi + (256 - *w as u32) * pj) >> 8) as u16
            }
            Component::Mix2 {
                weights,
                i,
                j,
                active,
                last_inputs,
                ..
            } => {
                let idx = (ctx as usize) % weights.len().max(1);
                *active = idx;
                let si = stretch(earlier[*i]);
                let sj = stretch(earlier[*j]);
                *last_inputs = (si, sj);
                let (wi, wj) = weights[idx];
                let sum = (wi * si + wj * sj) >> 16;
                squash(sum)
            }
            Component::Mix {
                weights,
                inputs,
                active,
                last_inputs,
            } => {
                let idx = (ctx as usize) % weights.len().max(1);
                *active = idx;
                let stretched: Vec<i32> = inputs.iter().map(|&k| stretch(earlier[k])).collect();
                let sum: i64 = weights[idx]
                    .iter()
                    .zip(stretched.iter())
                    .map(|(w, s)| (*w as i64) * (*s as i64))
                    .sum();
                *last_inputs = stretched;
                squash((sum >> 16) as i32)
            }
            Component::Isse {
                icm,
                mask,
                mix_weights,
                i,
                active,
                last_icm_stretched,
                last_other_stretched,
            } => {
                let idx = (ctx & *mask) as usize;
                *active = idx;
                let icm_p = icm[idx].p;
                let st_icm = stretch(icm_p);
                let st_other = stretch(earlier[*i]);
                *last_icm_stretched = st_icm;
                *last_other_stretched = st_other;
                let (w0, w1) = mix_weights[idx];
                let sum = (w0 * st_icm + w1 * st_other) >> 16;
                squash(sum)
            }
            Component::Sse {
                table,
                ctx_count,
                i,
                lo_idx,
                hi_idx,
                weight,
            } => {
                let row = (ctx % *ctx_count) as usize;
                let input_p = earlier[*i] as i32;
                let stretched = stretch(input_p as u16) + 2048; // 0..4095-ish domain
                let bucket_f = (stretched.clamp(0, 4095) * (SSE_BUCKETS as i32 - 1)) / 4095;
                let lo = bucket_f.clamp(0, SSE_BUCKETS as i32 - 2) as usize;
                *lo_idx = row * SSE_BUCKETS + lo;
                *hi_idx = row * SSE_BUCKETS + lo + 1;
                let step = 4095 / (SSE_BUCKETS as i32 - 1);
                let lo_boundary = lo as i32 * step;
                *weight = (stretched - lo_boundary).clamp(0, step) as u32;
                let w = *weight;
                let lo_p = table[*lo_idx] as u32;
                let hi_p = table[*hi_idx] as u32;
                (((step as u32 - w) * lo_p + w * hi_p) / step as u32) as u16
            }
        }
    }

    /// Updates state after observing the true `bit`.
    pub fn update(&mut self, bit: u8) {
        match self {
            Component::Const { .. } => {}
            Component::Cm { table, limit, active, .. } => {
                let (p, count) = &mut table[*active];
                let rate = (*count as u32 + 1).min(u32::from(*limit) + 1);
                nudge(p, bit, rate);
                if *count < *limit {
                    *count += 1;
                }
            }
            Component::Icm { table, active, .. } => {
                let cell = &mut table[*active];
                let rate = rate_for_state(cell.state);
                nudge(&mut cell.p, bit, rate);
                cell.state = next_state(cell.state, bit);
            }
            Component::Match {
                history,
                hash_table,
                mask,
                match_ptr,
                match_len,
                predicted_bit,
                context_byte,
                bit_pos,
            } => {
                *context_byte = (*context_byte << 1) | bit;
                *bit_pos += 1;
                if *bit_pos == 8 {
                    let still_matching = match_ptr
                        .map(|ptr| ptr < history.len() && *predicted_bit == bit)
                        .unwrap_or(false);
                    if still_matching {
                        *match_len = match_len.saturating_add(1);
                        if let Some(ptr) = match_ptr {
                            *ptr += 1;
                        }
                    } else {
                        *match_len = 0;
                        *match_ptr = None;
                    }
                    history.push(*context_byte);
                    if history.len() >= 4 {
                        let tail = &history[history.len() - 4..];
                        let h = rolling_hash(tail) & *mask;
                        if match_ptr.is_none() {
                            let candidate = hash_table[h as usize] as usize;
                            if candidate != 0 && candidate < history.len() {
                                *match_ptr = Some(candidate);
                                *match_len = 1;
                            }
                        }
                        hash_table[h as usize] = history.len() as u32;
                    }
                    *context_byte = 0;
                    *bit_pos = 0;
                }
            }
            Component::Avg { .. } => {}
            Component::Mix2 {
                weights,
                active,
                last_inputs,
                rate,
                ..
            } => {
                let idx = *active;
                let (wi, wj) = &mut weights[idx];
                let (si, sj) = *last_inputs;
                let p = squash((((*wi) * si + (*wj) * sj) >> 16).clamp(-2047, 2047));
                let err = (bit as i32) * 4096 - p as i32;
                let lr = i32::from(*rate).max(1);
                *wi += (err * si) >> (16 - lr.min(8));
                *wj += (err * sj) >> (16 - lr.min(8));
            }
            Component::Mix {
                weights,
                active,
                last_inputs,
                ..
            } => {
                let idx = *active;
                let sum: i64 = weights[idx]
                    .iter()
                    .zip(last_inputs.iter())
                    .map(|(w, s)| (*w as i64) * (*s as i64))
                    .sum();
                let p = squash((sum >> 16) as i32);
                let err = (bit as i32) * 4096 - p as i32;
                for (w, s) in weights[idx].iter_mut().zip(last_inputs.iter()) {
                    *w += (err * s) >> 10;
                }
            }
            Component::Isse {
                icm,
                mix_weights,
                active,
                last_icm_stretched,
                last_other_stretched,
                ..
            } => {
                let idx = *active;
                let cell = &mut icm[idx];
                let rate = rate_for_state(cell.state);
                nudge(&mut cell.p, bit, rate);
                cell.state = next_state(cell.state, bit);

                let (w0, w1) = &mut mix_weights[idx];
                let st_icm = *last_icm_stretched;
                let st_other = *last_other_stretched;
                let p = squash((((*w0) * st_icm + (*w1) * st_other) >> 16).clamp(-2047, 2047));
                let err = (bit as i32) * 4096 - p as i32;
                *w0 += (err * st_icm) >> 12;
                *w1 += (err * st_other) >> 12;
            }
            Component::Sse {
                table,
                lo_idx,
                hi_idx,
                weight,
                ..
            } => {
                let step = 4095 / (SSE_BUCKETS as i32 - 1);
                let target = if bit == 1 { 4095 } else { 0 };
                let lo_p = table[*lo_idx] as i32;
                let hi_p = table[*hi_idx] as i32;
                let lo_weight = step - *weight as i32;
                table[*lo_idx] = (lo_p + ((target - lo_p) * lo_weight.max(1)) / (step * 16)) as u16;
                table[*hi_idx] =
                    (hi_p + ((target - hi_p) * (*weight as i32).max(1)) / (step * 16)) as u16;
            }
        }
    }
}

fn nudge(p: &mut u16, bit: u8, rate: u32) {
    let target = if bit == 1 { 4095i32 } else { 0i32 };
    let delta = (target - *p as i32) / rate as i32;
    *p = (*p as i32 + delta).clamp(1, 4094) as u16;
}

fn rolling_hash(bytes: &[u8]) -> u32 {
    let mut h = 0u32;
    for &b in bytes {
        h = h.wrapping_mul(0x6F4F_2F35).wrapping_add(b as u32);
    }
    h
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn const_component_never_updates() {
        let mut c = Component::build(&ComponentSpec::Const(3000));
        let p1 = c.predict(0, &[]);
        c.update(0);
        let p2 = c.predict(0, &[]);
        assert_eq!(p1, p2);
        assert_eq!(p1, 3000);
    }

    #[test]
    fn cm_drifts_toward_observed_bit() {
        let mut c = Component::build(&ComponentSpec::Cm { s: 4, limit: 255 });
        let start = c.predict(1, &[]);
        for _ in 0..20 {
            c.predict(1, &[]);
            c.update(1);
        }
        let after = c.predict(1, &[]);
        assert!(after > start, "start={start} after={after}");
    }

    #[test]
    fn icm_drifts_toward_observed_bit() {
        let mut c = Component::build(&ComponentSpec::Icm { s: 4 });
        let start = c.predict(2, &[]);
        for _ in 0..20 {
            c.predict(2, &[]);
            c.update(0);
        }
        let after = c.predict(2, &[]);
        assert!(after < start, "start={start} after={after}");
    }

    #[test]
    fn avg_is_the_weighted_mean() {
        let mut c = Component::build(&ComponentSpec::Avg { i: 0, j: 1, w: 128 });
        let p = c.predict(0, &[1000, 3000]);
        assert_eq!(p, 2000);
    }

    #[test]
    fn mix2_moves_weights_to_reduce_error() {
        let mut c = Component::build(&ComponentSpec::Mix2 {
            s: 2,
            i: 0,
            j: 1,
            rate: 6,
        });
        for _ in 0..50 {
            c.predict(0, &[4000, 4000]);
            c.update(1);
        }
        let p = c.predict(0, &[4000, 4000]);
        assert!(p > 2048);
    }

    #[test]
    fn sse_table_starts_monotonic_per_row() {
        let c = Component::build(&ComponentSpec::Sse { s: 1, i: 0 });
        if let Component::Sse { table, .. } = c {
            let row = &table[0..SSE_BUCKETS];
            for w in row.windows(2) {
                assert!(w[1] >= w[0]);
            }
        } else {
            panic!("expected Sse");
        }
    }
}
