//! The ZPAQL bytecode virtual machine.
//!
//! A block's `hcomp` program (and optional `pcomp` program) are tiny
//! programs for a 32-register byte-addressed machine, executed once per
//! input byte to derive the predictor's current context. This module
//! splits that cleanly into the static shape ([`opcode`], [`program`])
//! and the runtime ([`vm`]).

pub mod opcode;
pub mod program;
pub mod vm;

pub use opcode::Opcode;
pub use program::{ComponentSpec, Header, Program};
pub use vm::Vm;
