//! Parsing of `hcomp`/`pcomp` programs from block-header bytecode.
//!
//! A program is a header vector, a predictor component table, and an
//! opcode stream terminated by [`Opcode::End`]. This module only
//! parses the static shape; [`crate::predictor`] instantiates runtime
//! state from [`ComponentSpec`] and [`crate::zpaql::vm`] executes the
//! opcode stream.

use crate::error::{Error, Result};
use crate::zpaql::opcode::Opcode;

/// Memory-size/component-count header preceding a program's component
/// table, per spec.md §3 ("header vector {hh, hm, ph, pm, n}").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    /// `log2` size of `hcomp`'s byte memory `H`.
    pub hh: u8,
    /// `log2` size of `hcomp`'s byte memory `M`.
    pub hm: u8,
    /// `log2` size of `pcomp`'s byte memory `H` (`PH`).
    pub ph: u8,
    /// `log2` size of `pcomp`'s byte memory `M` (`PM`).
    pub pm: u8,
}

/// Upper bound on any header memory-size field (bit-width), per
/// spec.md §3's invariant "Memory sizes in a ZPAQL header are ≤ 32".
pub const MAX_MEMORY_LOG2: u8 = 32;

/// Upper bound on the predictor component count, per spec.md §3's
/// invariant "component counts ≤ 255".
pub const MAX_COMPONENTS: usize = 255;

impl Header {
    fn validate(&self) -> Result<()> {
        for (name, v) in [
            ("hh", self.hh),
            ("hm", self.hm),
            ("ph", self.ph),
            ("pm", self.pm),
        ] {
            if v > MAX_MEMORY_LOG2 {
                return Err(Error::bad_header(format!(
                    "{name}={v} exceeds max memory log2 of {MAX_MEMORY_LOG2}"
                )));
            }
        }
        Ok(())
    }

    /// Size in bytes of the `H` memory this header describes.
    pub fn h_size(&self) -> usize {
        1usize << self.hh
    }

    /// Size in bytes of the `M` memory this header describes.
    pub fn m_size(&self) -> usize {
        1usize << self.hm
    }
}

/// A predictor component's static declaration, as it appears in a
/// program's component table. Runtime state lives in
/// [`crate::predictor::component::Component`]; this only carries the
/// shape parameters needed to build one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComponentSpec {
    /// Fixed prediction `c` (already a 12-bit value, 0..4095).
    Const(u16),
    /// Context map: `2^s` contexts, count capped at `limit`.
    Cm { s: u8, limit: u8 },
    /// Indirect context map: `2^s` contexts via hashed bit history.
    Icm { s: u8 },
    /// Longest-match predictor over a `2^bufbits`-byte history.
    Match { s: u8, bufbits: u8 },
    /// Weighted average of two earlier components' outputs.
    Avg { i: u8, j: u8, w: u8 },
    /// Two-input logistic mixer over a `2^s`-context weight vector.
    Mix2 { s: u8, i: u8, j: u8, rate: u8 },
    /// N-input logistic mixer.
    Mix { s: u8, inputs: Vec<u8> },
    /// ICM feeding a 2-weight mixer against component `i`.
    Isse { s: u8, i: u8 },
    /// Secondary symbol estimation over component `i`'s output.
    Sse { s: u8, i: u8 },
}

const TAG_CONST: u8 = 0;
const TAG_CM: u8 = 1;
const TAG_ICM: u8 = 2;
const TAG_MATCH: u8 = 3;
const TAG_AVG: u8 = 4;
const TAG_MIX2: u8 = 5;
const TAG_MIX: u8 = 6;
const TAG_ISSE: u8 = 7;
const TAG_SSE: u8 = 8;

impl ComponentSpec {
    fn parse(bytes: &[u8], pos: &mut usize) -> Result<Self> {
        let byte = |pos: &mut usize| -> Result<u8> {
            let b = *bytes
                .get(*pos)
                .ok_or_else(|| Error::bad_header("truncated component descriptor"))?;
            *pos += 1;
            Ok(b)
        };
        let tag = byte(pos)?;
        match tag {
            TAG_CONST => {
                let lo = byte(pos)? as u16;
                let hi = byte(pos)? as u16;
                Ok(ComponentSpec::Const(lo | (hi << 8)))
            }
            TAG_CM => Ok(ComponentSpec::Cm {
                s: byte(pos)?,
                limit: byte(pos)?,
            }),
            TAG_ICM => Ok(ComponentSpec::Icm { s: byte(pos)? }),
            TAG_MATCH => Ok(ComponentSpec::Match {
                s: byte(pos)?,
                bufbits: byte(pos)?,
            }),
            TAG_AVG => Ok(ComponentSpec::Avg {
                i: byte(pos)?,
                j: byte(pos)?,
                w: byte(pos)?,
            }),
            TAG_MIX2 => Ok(ComponentSpec::Mix2 {
                s: byte(pos)?,
                i: byte(pos)?,
                j: byte(pos)?,
                rate: byte(pos)?,
            }),
            TAG_MIX => {
                let s = byte(pos)?;
                let count = byte(pos)? as usize;
                let mut inputs = Vec::with_capacity(count);
                for _ in 0..count {
                    inputs.push(byte(pos)?);
                }
                Ok(ComponentSpec::Mix { s, inputs })
            }
            TAG_ISSE => Ok(ComponentSpec::Isse {
                s: byte(pos)?,
                i: byte(pos)?,
            }),
            TAG_SSE => Ok(ComponentSpec::Sse {
                s: byte(pos)?,
                i: byte(pos)?,
            }),
            other => Err(Error::bad_header(format!(
                "unknown component tag {other}"
            ))),
        }
    }

    fn write(&self, out: &mut Vec<u8>) {
        match self {
            ComponentSpec::Const(c) => out.extend([TAG_CONST, (*c & 0xFF) as u8, (*c >> 8) as u8]),
            ComponentSpec::Cm { s, limit } => out.extend([TAG_CM, *s, *limit]),
            ComponentSpec::Icm { s } => out.extend([TAG_ICM, *s]),
            ComponentSpec::Match { s, bufbits } => out.extend([TAG_MATCH, *s, *bufbits]),
            ComponentSpec::Avg { i, j, w } => out.extend([TAG_AVG, *i, *j, *w]),
            ComponentSpec::Mix2 { s, i, j, rate } => out.extend([TAG_MIX2, *s, *i, *j, *rate]),
            ComponentSpec::Mix { s, inputs } => {
                out.push(TAG_MIX);
                out.push(*s);
                out.push(inputs.len() as u8);
                out.extend(inputs);
            }
            ComponentSpec::Isse { s, i } => out.extend([TAG_ISSE, *s, *i]),
            ComponentSpec::Sse { s, i } => out.extend([TAG_SSE, *s, *i]),
        }
    }
}

/// A fully-parsed `hcomp` or `pcomp` program: header, component table,
/// and the raw opcode stream (decoded lazily, instruction by
/// instruction, by [`crate::zpaql::vm::Vm`]).
#[derive(Debug, Clone)]
pub struct Program {
    /// Memory-size header.
    pub header: Header,
    /// Predictor component declarations, in arena order (later
    /// components may reference earlier ones by index only).
    pub components: Vec<ComponentSpec>,
    /// Raw opcode bytes, including the trailing [`Opcode::End`].
    pub code: Vec<u8>,
}

impl Program {
    /// Parses a program from `bytes`, returning it and the number of
    /// bytes consumed.
    pub fn parse(bytes: &[u8]) -> Result<(Self, usize)> {
        if bytes.len() < 5 {
            return Err(Error::Truncated {
                expected: 5 - bytes.len(),
                offset: 0,
            });
        }
        let header = Header {
            hh: bytes[0],
            hm: bytes[1],
            ph: bytes[2],
            pm: bytes[3],
        };
        header.validate()?;
        let n = bytes[4] as usize;
        if n > MAX_COMPONENTS {
            return Err(Error::bad_header(format!(
                "component count {n} exceeds max {MAX_COMPONENTS}"
            )));
        }

        let mut pos = 5;
        let mut components = Vec::with_capacity(n);
        for _ in 0..n {
            components.push(ComponentSpec::parse(bytes, &mut pos)?);
        }

        // Scan the opcode stream until End, validating as we go so a
        // malformed program is caught at parse time rather than mid-run.
        let code_start = pos;
        loop {
            let (op, len) = Opcode::decode(bytes, pos)?;
            pos += len;
            if op == Opcode::End {
                break;
            }
        }

        Ok((
            Program {
                header,
                components,
                code: bytes[code_start..pos].to_vec(),
            },
            pos,
        ))
    }

    /// Serializes this program back to its on-wire bytecode form.
    pub fn write(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend([
            self.header.hh,
            self.header.hm,
            self.header.ph,
            self.header.pm,
            self.components.len() as u8,
        ]);
        for c in &self.components {
            c.write(&mut out);
        }
        out.extend(&self.code);
        out
    }
}
