use std::{collections::HashMap, fmt, format_args as f};

use log::debug;

use crate::{
    ast::{BinaryOperator, Ident, Number},
    codegen::{
        registers::{
            last_uses, Register, RegisterMap, DIVIDEND_REGISTER, REMAINDER_REGISTER,
            RETURN_REGISTER,
        },
        Error,
    },
    ir::{Instr, Operand},
};

/// Size of a pushed argument, in bytes.
const SLOT_SIZE: usize = 4;

/// Registers overwritten by `div`.
const DIVISION_CLOBBERS: &[Register] = &[DIVIDEND_REGISTER, REMAINDER_REGISTER];

pub struct Generator<'code> {
    code: &'code [Instr],
    registers: RegisterMap,
    last_uses: HashMap<&'code str, usize>,
    /// Names whose register is released after each instruction.
    expiring: HashMap<usize, Vec<&'code str>>,
    lines: Vec<String>,
}

impl<'code> Generator<'code> {
    pub fn new(code: &'code [Instr]) -> Generator<'code> {
        let last_uses = last_uses(code);
        let mut expiring: HashMap<usize, Vec<&str>> = HashMap::new();
        for (&name, &i) in &last_uses {
            expiring.entry(i).or_default().push(name);
        }
        Generator {
            code,
            registers: RegisterMap::new(),
            last_uses,
            expiring,
            lines: Vec::with_capacity(code.len() * 2),
        }
    }

    pub fn generate(mut self) -> Result<Vec<String>, Error> {
        let code = self.code;
        for (i, instr) in code.iter().enumerate() {
            self.g_instr(i, instr)?;
            for name in self.expiring.get(&i).into_iter().flatten() {
                self.registers.free(name);
            }
        }
        debug!("generated {} assembly lines", self.lines.len());
        Ok(self.lines)
    }

    fn g_instr(&mut self, i: usize, instr: &'code Instr) -> Result<(), Error> {
        match instr {
            Instr::FunctionBegin(name) => {
                self.registers.clear();
                self.out_label(name);
            }
            Instr::FunctionEnd(_) => self.registers.clear(),
            Instr::Label(label) => self.out_label(label),
            Instr::Jump(target) => self.out(f!("jmp {target}")),
            Instr::CondJump { cond, target } => {
                let register = self.registers.allocate(cond)?;
                self.out(f!("cmp {register}, 0"));
                self.out(f!("jne {target}"));
            }
            Instr::Assign { dest, value } => self.g_assign(i, dest, value)?,
            Instr::Binary { dest, op, lhs, rhs } => match op {
                BinaryOperator::Div | BinaryOperator::Rem => {
                    self.g_division(i, dest, *op, lhs, rhs)?;
                }
                BinaryOperator::And | BinaryOperator::Or => self.g_logical(i, dest, *op, lhs, rhs)?,
                _ => self.g_binary(i, dest, *op, lhs, rhs)?,
            },
            Instr::Return(value) => {
                match value {
                    None | Some(Operand::Uninitialized) => {}
                    Some(value) => {
                        let value = self.source(value)?;
                        self.mov(RETURN_REGISTER, value);
                    }
                }
                self.out("ret");
            }
            Instr::Param(value) => {
                let value = self.source(value)?;
                self.out(f!("push {value}"));
            }
            Instr::Call {
                dest,
                function,
                argc,
            } => {
                self.evacuate(i, RETURN_REGISTER, dest, &[RETURN_REGISTER])?;
                self.out(f!("call {function}"));
                if *argc > 0 {
                    self.out(f!("add esp, {}", argc * SLOT_SIZE));
                }
                // The result stays where the call left it.
                if let Some(stale) = self.registers.holder(RETURN_REGISTER).map(Ident::from) {
                    self.registers.free(&stale);
                }
                self.registers.reassign(dest, RETURN_REGISTER);
            }
        }
        Ok(())
    }

    fn g_assign(&mut self, i: usize, dest: &str, value: &'code Operand) -> Result<(), Error> {
        if *value == Operand::Uninitialized {
            return Ok(());
        }
        let source = self.source(value)?;
        self.release_operand(i, dest, value);
        let register = self.registers.allocate(dest)?;
        self.mov(register, source);
        Ok(())
    }

    /// Comparisons and `+`, `-`, `*`.
    fn g_binary(
        &mut self,
        i: usize,
        dest: &str,
        op: BinaryOperator,
        lhs: &'code Operand,
        rhs: &'code Operand,
    ) -> Result<(), Error> {
        let left = self.source(lhs)?;
        let right = self.source(rhs)?;
        // The destination may reuse the left operand's register, never the
        // right one's: it is written before the right operand is read.
        self.release_operand(i, dest, lhs);
        let register = self.registers.allocate(dest)?;

        if let Some(set) = set_mnemonic(op) {
            let compared = match left {
                Source::Register(left) => left,
                Source::Immediate(_) => {
                    self.mov(register, left);
                    register
                }
            };
            self.out(f!("cmp {compared}, {right}"));
            self.out(f!("{set} {register}"));
            return Ok(());
        }

        let mnemonic = mnemonic(op);
        if right == Source::Register(register) && left != Source::Register(register) {
            // `x = y - x` and the like: the destination already holds the
            // right operand.
            if op.is_commutative() {
                self.out(f!("{mnemonic} {register}, {left}"));
            } else {
                self.out(f!("neg {register}"));
                self.out(f!("add {register}, {left}"));
            }
        } else {
            self.mov(register, left);
            self.out(f!("{mnemonic} {register}, {right}"));
        }
        Ok(())
    }

    /// `div` takes its dividend from eax and overwrites both eax and edx, so
    /// the divisor and every other live name are kept out of them. A live
    /// name with nowhere to go is pushed and popped around the division.
    fn g_division(
        &mut self,
        i: usize,
        dest: &str,
        op: BinaryOperator,
        lhs: &'code Operand,
        rhs: &'code Operand,
    ) -> Result<(), Error> {
        if let Some(name) = rhs.as_var() {
            let register = self.registers.allocate(name)?;
            if DIVISION_CLOBBERS.contains(&register) {
                self.relocate(name, register, DIVISION_CLOBBERS)?;
            }
        }
        let left_register = match lhs.as_var() {
            Some(name) => Some(self.registers.allocate(name)?),
            None => None,
        };

        let mut saved = Vec::new();
        if let Some(occupant) = self.registers.holder(DIVIDEND_REGISTER).map(Ident::from) {
            let occupant_lives = self.survives(i, &occupant, dest);
            match (lhs.as_var(), left_register) {
                (Some(name), Some(register))
                    if occupant_lives
                        && register != REMAINDER_REGISTER
                        && rhs.as_var() != Some(name)
                        && !self.survives(i, name, dest) =>
                {
                    self.out(f!("xchg {DIVIDEND_REGISTER}, {register}"));
                    self.registers.swap(name, &occupant);
                }
                _ => self.vacate(i, DIVIDEND_REGISTER, dest, &mut saved)?,
            }
        }
        self.vacate(i, REMAINDER_REGISTER, dest, &mut saved)?;

        let left = self.source(lhs)?;
        let right = self.source(rhs)?;
        self.mov(DIVIDEND_REGISTER, left);
        self.out(f!("mov {REMAINDER_REGISTER}, 0"));
        self.out(f!("div {right}"));

        let result = if op == BinaryOperator::Div {
            DIVIDEND_REGISTER
        } else {
            REMAINDER_REGISTER
        };
        self.release_operand(i, dest, lhs);
        // Saved registers still hold their names, so they are never picked.
        let register = match self.registers.get(dest) {
            Some(register) => register,
            None => {
                let preferred = self.registers.holder(result).is_none().then_some(result);
                let Some(register) = preferred.or_else(|| self.registers.find_free(&[])) else {
                    return Err(Error::RegisterExhaustion {
                        name: dest.into(),
                        live: self.registers.live(),
                    });
                };
                self.registers.reassign(dest, register);
                register
            }
        };
        self.mov(register, Source::Register(result));
        for register in saved.into_iter().rev() {
            self.out(f!("pop {register}"));
        }
        Ok(())
    }

    /// Clears `register` ahead of the division at `i`. A name still needed
    /// afterwards moves to a free register, or is pushed if there is none.
    fn vacate(
        &mut self,
        i: usize,
        register: Register,
        dest: &str,
        saved: &mut Vec<Register>,
    ) -> Result<(), Error> {
        let Some(name) = self.registers.holder(register).map(Ident::from) else {
            return Ok(());
        };
        if !self.survives(i, &name, dest) {
            return Ok(());
        }
        if self.registers.find_free(DIVISION_CLOBBERS).is_some() {
            self.relocate(&name, register, DIVISION_CLOBBERS)
        } else {
            self.out(f!("push {register}"));
            saved.push(register);
            Ok(())
        }
    }

    /// `&&` and `||` yield 0 or 1: both operands are normalized with
    /// `setne` before being combined.
    fn g_logical(
        &mut self,
        i: usize,
        dest: &str,
        op: BinaryOperator,
        lhs: &'code Operand,
        rhs: &'code Operand,
    ) -> Result<(), Error> {
        let left = self.source(lhs)?;
        let right = self.source(rhs)?;
        self.release_operand(i, dest, lhs);
        let register = self.registers.allocate(dest)?;

        let mut exclude = vec![register];
        if let Source::Register(left) = left {
            exclude.push(left);
        }
        let Some(scratch) = self.registers.find_free(&exclude) else {
            return Err(Error::RegisterExhaustion {
                name: dest.into(),
                live: self.registers.live(),
            });
        };

        // Right first: the destination may hold the right operand.
        self.normalize(scratch, right);
        self.normalize(register, left);
        self.out(f!("{} {register}, {scratch}", mnemonic(op)));
        Ok(())
    }

    /// Sets `target` to 1 if `value` is non-zero, and to 0 otherwise.
    fn normalize(&mut self, target: Register, value: Source) {
        match value {
            Source::Register(register) => {
                self.out(f!("cmp {register}, 0"));
                self.out(f!("setne {target}"));
            }
            Source::Immediate(operand) => {
                let truth = i64::from(is_truthy(operand));
                self.out(f!("mov {target}, {truth}"));
            }
        }
    }

    /// Resolves an operand to its register, or to an immediate.
    fn source(&mut self, operand: &'code Operand) -> Result<Source<'code>, Error> {
        match operand {
            Operand::Var(name) => self.registers.allocate(name).map(Source::Register),
            Operand::Number(_) | Operand::Str(_) | Operand::Uninitialized => {
                Ok(Source::Immediate(operand))
            }
        }
    }

    /// Whether `name` is read after the instruction at `i`. The old value of
    /// `dest` never is.
    fn survives(&self, i: usize, name: &str, dest: &str) -> bool {
        name != dest && self.last_uses.get(name).is_some_and(|&end| end > i)
    }

    /// Moves whatever `register` holds elsewhere if it is still needed after
    /// the instruction at `i`.
    fn evacuate(
        &mut self,
        i: usize,
        register: Register,
        dest: &str,
        clobbered: &[Register],
    ) -> Result<(), Error> {
        let Some(name) = self.registers.holder(register).map(Ident::from) else {
            return Ok(());
        };
        if self.survives(i, &name, dest) {
            self.relocate(&name, register, clobbered)?;
        }
        Ok(())
    }

    /// Copies `name` from `from` into a free register outside `clobbered`.
    fn relocate(&mut self, name: &str, from: Register, clobbered: &[Register]) -> Result<(), Error> {
        let Some(to) = self.registers.find_free(clobbered) else {
            return Err(Error::RegisterExhaustion {
                name: name.into(),
                live: self.registers.live(),
            });
        };
        self.out(f!("mov {to}, {from}"));
        self.registers.reassign(name, to);
        Ok(())
    }

    /// Frees the register of `name` right after its last use.
    fn release(&mut self, name: &str, i: usize) {
        if self.last_uses.get(name) == Some(&i) {
            self.registers.free(name);
        }
    }

    /// Frees an operand of the instruction at `i` before its destination is
    /// allocated, letting the destination take over the register.
    fn release_operand(&mut self, i: usize, dest: &str, operand: &Operand) {
        if let Some(name) = operand.as_var() {
            if name != dest {
                self.release(name, i);
            }
        }
    }

    fn mov(&mut self, register: Register, value: Source) {
        if value != Source::Register(register) {
            self.out(f!("mov {register}, {value}"));
        }
    }

    /// Prints an instruction line.
    fn out(&mut self, f: impl fmt::Display) {
        self.lines.push(format!("    {f}"));
    }

    /// Prints a label line.
    fn out_label(&mut self, label: &str) {
        self.lines.push(format!("{label}:"));
    }
}

#[derive(Copy, Clone, Debug, PartialEq)]
enum Source<'code> {
    Register(Register),
    Immediate(&'code Operand),
}

impl fmt::Display for Source<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Register(register) => f.write_str(register),
            Source::Immediate(operand) => write!(f, "{operand}"),
        }
    }
}

fn mnemonic(op: BinaryOperator) -> &'static str {
    match op {
        BinaryOperator::Add => "add",
        BinaryOperator::Sub => "sub",
        BinaryOperator::Mul => "imul",
        BinaryOperator::And => "and",
        BinaryOperator::Or => "or",
        _ => unreachable!("{op} has no two-operand form"),
    }
}

fn set_mnemonic(op: BinaryOperator) -> Option<&'static str> {
    let set = match op {
        BinaryOperator::Lt => "setl",
        BinaryOperator::Gt => "setg",
        BinaryOperator::Le => "setle",
        BinaryOperator::Ge => "setge",
        BinaryOperator::Eq => "sete",
        BinaryOperator::Ne => "setne",
        _ => return None,
    };
    Some(set)
}

fn is_truthy(operand: &Operand) -> bool {
    match operand {
        Operand::Number(Number::Int(int)) => *int != 0,
        Operand::Number(Number::Float(float)) => *float != 0.0,
        Operand::Str(_) => true,
        Operand::Var(_) | Operand::Uninitialized => false,
    }
}
