use std::collections::{HashMap, HashSet};

use log::trace;

use crate::{ast::Ident, codegen::Error, ir::Instr};

pub type Register = &'static str;

/// General-purpose registers, in allocation order.
pub const REGISTERS: [Register; 4] = ["eax", "ebx", "ecx", "edx"];

pub const RETURN_REGISTER: Register = "eax";
/// Holds the dividend before a division and the quotient after it.
pub const DIVIDEND_REGISTER: Register = "eax";
pub const REMAINDER_REGISTER: Register = "edx";

/// Maps live variables to registers. There is no spilling: allocation fails
/// once every register holds a live variable.
#[derive(Debug, Default)]
pub struct RegisterMap {
    assigned: HashMap<Ident, Register>,
}

impl RegisterMap {
    pub fn new() -> RegisterMap {
        RegisterMap::default()
    }

    pub fn get(&self, name: &str) -> Option<Register> {
        self.assigned.get(name).copied()
    }

    /// Returns the register holding `name`, assigning the first free one if
    /// it has none yet.
    pub fn allocate(&mut self, name: &str) -> Result<Register, Error> {
        if let Some(register) = self.get(name) {
            return Ok(register);
        }
        let taken: HashSet<Register> = self.assigned.values().copied().collect();
        let Some(register) = REGISTERS.into_iter().find(|r| !taken.contains(r)) else {
            return Err(Error::RegisterExhaustion {
                name: name.into(),
                live: self.live(),
            });
        };
        trace!("{register} <- {name}");
        self.assigned.insert(name.into(), register);
        Ok(register)
    }

    /// Releases the register of `name`, if it has one.
    pub fn free(&mut self, name: &str) -> Option<Register> {
        let register = self.assigned.remove(name)?;
        trace!("{register} -> free ({name})");
        Some(register)
    }

    /// The name currently held in `register`.
    pub fn holder(&self, register: Register) -> Option<&str> {
        self.assigned
            .iter()
            .find_map(|(name, &r)| (r == register).then_some(&**name))
    }

    /// The first register holding no name, skipping `exclude`.
    pub fn find_free(&self, exclude: &[Register]) -> Option<Register> {
        REGISTERS
            .into_iter()
            .find(|&r| !exclude.contains(&r) && self.holder(r).is_none())
    }

    /// Rebinds `name` to `register`, which must be free.
    pub fn reassign(&mut self, name: &str, register: Register) {
        trace!("{register} <- {name} (moved)");
        self.assigned.insert(name.into(), register);
    }

    /// Exchanges the registers of two held names.
    pub fn swap(&mut self, a: &str, b: &str) {
        if let (Some(ra), Some(rb)) = (self.get(a), self.get(b)) {
            trace!("{ra} <-> {rb} ({a}, {b})");
            self.assigned.insert(a.into(), rb);
            self.assigned.insert(b.into(), ra);
        }
    }

    pub fn clear(&mut self) {
        self.assigned.clear();
    }

    /// Names currently holding a register, sorted.
    pub fn live(&self) -> Vec<Ident> {
        let mut names: Vec<Ident> = self.assigned.keys().cloned().collect();
        names.sort_unstable();
        names
    }
}

/// For each name, the index of the last instruction that references it.
///
/// A name last referenced inside a loop stays live until the loop's backward
/// jump if the next iteration may read it again: when it is referenced
/// before the loop, or read inside it before being written.
pub fn last_uses(code: &[Instr]) -> HashMap<&str, usize> {
    let mut first = HashMap::new();
    let mut last = HashMap::new();
    let mut written_first = HashSet::new();
    for (i, instr) in code.iter().enumerate() {
        let uses = instr.uses();
        if let Some(dest) = instr.dest() {
            if !first.contains_key(dest) && !uses.contains(&dest) {
                written_first.insert(dest);
            }
        }
        for name in instr.dest().into_iter().chain(uses) {
            first.entry(name).or_insert(i);
            last.insert(name, i);
        }
    }

    let labels: HashMap<&str, usize> = code
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| Some((instr.as_label()?, i)))
        .collect();
    let loops: Vec<(usize, usize)> = code
        .iter()
        .enumerate()
        .filter_map(|(i, instr)| {
            let header = *labels.get(instr.jump_target()?)?;
            (header < i).then_some((header, i))
        })
        .collect();

    let mut changed = true;
    while changed {
        changed = false;
        for (name, end) in &mut last {
            let start = first[name];
            let carried = |header| start < header || !written_first.contains(name);
            for &(header, back_jump) in &loops {
                if (header..back_jump).contains(&*end) && carried(header) {
                    *end = back_jump;
                    changed = true;
                }
            }
        }
    }
    last
}
