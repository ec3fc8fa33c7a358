//! Stream codec: binds the VM (C3), predictor (C4), and arithmetic
//! coder (C5) into whole-segment encode/decode.
//!
//! [`encode_segment`] and [`decode_segment`] implement spec.md §4.6's
//! data flow exactly: `hcomp` runs once per input byte to derive that
//! byte's context, then each of its 8 bits (MSB first) is coded in
//! turn against the predictor's running prediction; on decode, the
//! just-decoded byte is fed back into `hcomp` so encoder and decoder
//! see identical context streams.

pub mod presets;

use std::io::Cursor;

use crate::coder::{Decoder, Encoder};
use crate::error::Result;
use crate::predictor::Predictor;
use crate::safety::{InstructionBudget, ResourceLimits};
use crate::zpaql::program::Program;
use crate::zpaql::vm::Vm;

/// The bytecode and coded body produced by [`encode_segment`].
#[derive(Debug, Clone)]
pub struct EncodedSegment {
    /// Serialized `hcomp` program, empty for the store-only method.
    pub program_bytes: Vec<u8>,
    /// Optional `pcomp` program, run per decoded byte on the way out.
    pub pcomp_bytes: Option<Vec<u8>>,
    /// Arithmetic-coded body, or a verbatim copy for the store method.
    pub coded: Vec<u8>,
}

/// Store-only: no program, no coding, just a framed copy.
fn encode_store(data: &[u8]) -> EncodedSegment {
    EncodedSegment {
        program_bytes: Vec::new(),
        pcomp_bytes: None,
        coded: data.to_vec(),
    }
}

/// Encodes `data` under `method` (`0..=presets::MAX_METHOD`).
pub fn encode_segment(data: &[u8], method: u8, limits: &ResourceLimits) -> Result<EncodedSegment> {
    if method == presets::METHOD_STORE {
        return Ok(encode_store(data));
    }

    let program = presets::build(method)?;
    let mut vm = Vm::new(&program.header);
    let mut predictor = Predictor::new(&program.components);
    let mut encoder = Encoder::new(Vec::new());
    let mut scratch = Vec::new();

    for &byte in data {
        let mut budget = InstructionBudget::new(limits.max_instructions);
        vm.set_reg(1, byte as u32);
        scratch.clear();
        vm.run(&program.code, &mut budget, &mut scratch)?;

        let mut c0 = 1u32;
        for bit_index in 0..8 {
            let bit = (byte >> (7 - bit_index)) & 1;
            let p = predictor.predict(vm.h(), c0);
            encoder.encode_bit(bit, p)?;
            predictor.update(bit);
            c0 = (c0 << 1) | bit as u32;
        }
    }

    let coded = encoder.finish()?;
    Ok(EncodedSegment {
        program_bytes: program.write(),
        pcomp_bytes: None,
        coded,
    })
}

/// Decodes a segment previously produced by [`encode_segment`].
/// `output_len` is the number of plaintext bytes to reproduce (carried
/// by the segment framing, not by the coded body itself).
pub fn decode_segment(
    program_bytes: &[u8],
    coded: &[u8],
    output_len: usize,
    limits: &ResourceLimits,
) -> Result<Vec<u8>> {
    if program_bytes.is_empty() {
        return Ok(coded[..output_len.min(coded.len())].to_vec());
    }

    let (program, _) = Program::parse(program_bytes)?;
    let mut vm = Vm::new(&program.header);
    let mut predictor = Predictor::new(&program.components);
    let mut decoder = Decoder::new(Cursor::new(coded))?;
    let mut scratch = Vec::new();
    let mut out = Vec::with_capacity(output_len);

    for _ in 0..output_len {
        let mut c0 = 1u32;
        for _ in 0..8 {
            let p = predictor.predict(vm.h(), c0);
            let bit = decoder.decode_bit(p)?;
            predictor.update(bit);
            c0 = (c0 << 1) | bit as u32;
        }
        let byte = (c0 & 0xFF) as u8;
        out.push(byte);

        let mut budget = InstructionBudget::new(limits.max_instructions);
        vm.set_reg(1, byte as u32);
        scratch.clear();
        vm.run(&program.code, &mut budget, &mut scratch)?;
    }

    Ok(out)
}
