//! Pseudo-assembly generation with greedy register allocation.

use crate::{ast::Ident, ir::Instr};

pub mod registers;
mod x86;

pub use registers::{RegisterMap, REGISTERS};

/// Translates three-address code to assembly lines. Labels and function
/// names start at column zero; instructions are indented.
pub fn convert(code: &[Instr]) -> Result<Vec<String>, Error> {
    x86::Generator::new(code).generate()
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("no free register for {name}; all of {} are live", .live.join(", "))]
    RegisterExhaustion { name: Ident, live: Vec<Ident> },
}
