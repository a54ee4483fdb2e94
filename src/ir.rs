//! Three-address code.
//!
//! Every instruction has a one-line textual form, produced by `Display` and
//! read back by `FromStr`:
//!
//! ```text
//! main() BEGIN
//! x = 5
//! t1 = x + y
//! if t1 goto L1
//! goto L2
//! L1:
//! PARAM x
//! t2 = CALL f 1
//! RETURN t2
//! main() END
//! ```

use std::{fmt, str::FromStr};

use crate::ast::{BinaryOperator, Ident, Number};

/// Textual form of [`Operand::Uninitialized`]. Never a valid name.
const UNINITIALIZED: &str = "<uninitialized>";

#[derive(Clone, Debug, PartialEq)]
pub enum Operand {
    Number(Number),
    Var(Ident),
    Str(Box<str>),
    /// The value of a declaration without an initializer.
    Uninitialized,
}

impl Operand {
    pub fn var(name: &str) -> Operand {
        Operand::Var(name.into())
    }

    pub fn int(value: i64) -> Operand {
        Operand::Number(Number::Int(value))
    }

    pub fn as_number(&self) -> Option<Number> {
        match self {
            Operand::Number(number) => Some(*number),
            _ => None,
        }
    }

    pub fn as_var(&self) -> Option<&str> {
        match self {
            Operand::Var(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Number(number) => write!(f, "{number}"),
            Operand::Var(name) => f.write_str(name),
            Operand::Str(text) => write!(f, "\"{text}\""),
            Operand::Uninitialized => f.write_str(UNINITIALIZED),
        }
    }
}

impl FromStr for Operand {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Operand, ParseError> {
        let malformed = || ParseError::Malformed(s.into());
        if s == UNINITIALIZED {
            return Ok(Operand::Uninitialized);
        }
        if let Some(text) = s.strip_prefix('"') {
            let text = text.strip_suffix('"').ok_or_else(malformed)?;
            return Ok(Operand::Str(text.into()));
        }
        if let Ok(int) = s.parse::<i64>() {
            return Ok(Operand::int(int));
        }
        let digits = s.strip_prefix('-').unwrap_or(s);
        if digits.starts_with(|c: char| c.is_ascii_digit()) {
            return s
                .parse::<f64>()
                .map(|float| Operand::Number(Number::Float(float)))
                .map_err(|_| malformed());
        }
        if is_name(s) {
            Ok(Operand::var(s))
        } else {
            Err(malformed())
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum Instr {
    Assign {
        dest: Ident,
        value: Operand,
    },
    Binary {
        dest: Ident,
        op: BinaryOperator,
        lhs: Operand,
        rhs: Operand,
    },
    Label(Ident),
    Jump(Ident),
    /// Jumps to `target` if `cond` is non-zero.
    CondJump {
        cond: Ident,
        target: Ident,
    },
    Return(Option<Operand>),
    FunctionBegin(Ident),
    FunctionEnd(Ident),
    /// Pushes a call argument.
    Param(Operand),
    Call {
        dest: Ident,
        function: Ident,
        argc: usize,
    },
}

impl Instr {
    /// The variable this instruction writes, if any.
    pub fn dest(&self) -> Option<&str> {
        match self {
            Instr::Assign { dest, .. } | Instr::Binary { dest, .. } | Instr::Call { dest, .. } => {
                Some(dest)
            }
            _ => None,
        }
    }

    /// The variables this instruction reads, in operand order.
    pub fn uses(&self) -> Vec<&str> {
        match self {
            Instr::Assign { value, .. } => value.as_var().into_iter().collect(),
            Instr::Binary { lhs, rhs, .. } => lhs.as_var().into_iter().chain(rhs.as_var()).collect(),
            Instr::CondJump { cond, .. } => vec![&**cond],
            Instr::Return(Some(value)) | Instr::Param(value) => {
                value.as_var().into_iter().collect()
            }
            _ => Vec::new(),
        }
    }

    /// The label this instruction may transfer control to.
    pub fn jump_target(&self) -> Option<&str> {
        match self {
            Instr::Jump(target) | Instr::CondJump { target, .. } => Some(target),
            _ => None,
        }
    }

    pub fn as_label(&self) -> Option<&str> {
        match self {
            Instr::Label(label) => Some(label),
            _ => None,
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instr::Assign { dest, value } => write!(f, "{dest} = {value}"),
            Instr::Binary { dest, op, lhs, rhs } => write!(f, "{dest} = {lhs} {op} {rhs}"),
            Instr::Label(label) => write!(f, "{label}:"),
            Instr::Jump(target) => write!(f, "goto {target}"),
            Instr::CondJump { cond, target } => write!(f, "if {cond} goto {target}"),
            Instr::Return(Some(value)) => write!(f, "RETURN {value}"),
            Instr::Return(None) => f.write_str("RETURN"),
            Instr::FunctionBegin(name) => write!(f, "{name}() BEGIN"),
            Instr::FunctionEnd(name) => write!(f, "{name}() END"),
            Instr::Param(value) => write!(f, "PARAM {value}"),
            Instr::Call {
                dest,
                function,
                argc,
            } => write!(f, "{dest} = CALL {function} {argc}"),
        }
    }
}

impl FromStr for Instr {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Instr, ParseError> {
        let line = line.trim();
        let malformed = || ParseError::Malformed(line.into());

        if let Some(name) = line.strip_suffix("() BEGIN") {
            return name_of(name, line).map(Instr::FunctionBegin);
        }
        if let Some(name) = line.strip_suffix("() END") {
            return name_of(name, line).map(Instr::FunctionEnd);
        }
        if let Some((dest, rhs)) = line.split_once(" = ") {
            return parse_assignment(name_of(dest, line)?, rhs.trim(), line);
        }
        if line == "RETURN" {
            return Ok(Instr::Return(None));
        }
        if let Some(value) = line.strip_prefix("RETURN ") {
            return Ok(Instr::Return(Some(value.trim().parse()?)));
        }
        if let Some(value) = line.strip_prefix("PARAM ") {
            return Ok(Instr::Param(value.trim().parse()?));
        }
        if let Some(target) = line.strip_prefix("goto ") {
            return name_of(target, line).map(Instr::Jump);
        }
        if let Some(rest) = line.strip_prefix("if ") {
            let (cond, target) = rest.split_once(" goto ").ok_or_else(malformed)?;
            return Ok(Instr::CondJump {
                cond: name_of(cond, line)?,
                target: name_of(target, line)?,
            });
        }
        if let Some(label) = line.strip_suffix(':') {
            return name_of(label, line).map(Instr::Label);
        }
        Err(malformed())
    }
}

fn parse_assignment(dest: Ident, rhs: &str, line: &str) -> Result<Instr, ParseError> {
    let malformed = || ParseError::Malformed(line.into());

    if rhs.starts_with('"') {
        return Ok(Instr::Assign {
            dest,
            value: rhs.parse()?,
        });
    }
    if let Some(call) = rhs.strip_prefix("CALL ") {
        let mut parts = call.split_whitespace();
        let (Some(function), Some(argc), None) = (parts.next(), parts.next(), parts.next()) else {
            return Err(malformed());
        };
        return Ok(Instr::Call {
            dest,
            function: name_of(function, line)?,
            argc: argc.parse().map_err(|_| malformed())?,
        });
    }

    let parts: Vec<&str> = rhs.split_whitespace().collect();
    match parts[..] {
        [value] => Ok(Instr::Assign {
            dest,
            value: value.parse()?,
        }),
        [lhs, op, rhs] => {
            let op = BinaryOperator::from_symbol(op).ok_or_else(|| ParseError::UnsupportedOperator {
                op: op.into(),
                line: line.into(),
            })?;
            Ok(Instr::Binary {
                dest,
                op,
                lhs: lhs.parse()?,
                rhs: rhs.parse()?,
            })
        }
        _ => Err(malformed()),
    }
}

fn name_of(s: &str, line: &str) -> Result<Ident, ParseError> {
    let s = s.trim();
    if is_name(s) {
        Ok(s.into())
    } else {
        Err(ParseError::Malformed(line.into()))
    }
}

fn is_name(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("unsupported operator `{op}` in `{line}`")]
    UnsupportedOperator { op: Box<str>, line: Box<str> },
    #[error("malformed instruction `{0}`")]
    Malformed(Box<str>),
}

/// Renders each instruction on its own line.
pub fn listing(code: &[Instr]) -> Vec<String> {
    code.iter().map(ToString::to_string).collect()
}

/// Parses a textual listing, one instruction per line. Blank lines are
/// skipped.
pub fn parse_listing<S: AsRef<str>>(lines: &[S]) -> Result<Vec<Instr>, ParseError> {
    lines
        .iter()
        .map(AsRef::as_ref)
        .filter(|line| !line.trim().is_empty())
        .map(str::parse)
        .collect()
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_parse_every_form() {
        let lines = [
            "main() BEGIN",
            "x = <uninitialized>",
            "y = -3",
            "z = 2.5",
            "s = \"a = b\"",
            "t1 = x <= y",
            "if t1 goto L1",
            "goto L2",
            "L1:",
            "PARAM x",
            "t2 = CALL f 1",
            "RETURN t2",
            "L2:",
            "RETURN",
            "main() END",
        ];
        let code = parse_listing(&lines).unwrap();
        assert_eq!(
            &code[..6],
            [
                Instr::FunctionBegin("main".into()),
                Instr::Assign {
                    dest: "x".into(),
                    value: Operand::Uninitialized
                },
                Instr::Assign {
                    dest: "y".into(),
                    value: Operand::int(-3)
                },
                Instr::Assign {
                    dest: "z".into(),
                    value: Operand::Number(Number::Float(2.5))
                },
                Instr::Assign {
                    dest: "s".into(),
                    value: Operand::Str("a = b".into())
                },
                Instr::Binary {
                    dest: "t1".into(),
                    op: BinaryOperator::Le,
                    lhs: Operand::var("x"),
                    rhs: Operand::var("y"),
                },
            ]
        );
        assert_eq!(
            code[10],
            Instr::Call {
                dest: "t2".into(),
                function: "f".into(),
                argc: 1
            }
        );
        assert_eq!(listing(&code), lines);
    }

    #[test]
    fn test_whole_floats_keep_their_fraction() {
        let instr = Instr::Assign {
            dest: "x".into(),
            value: Operand::Number(Number::Float(3.0)),
        };
        assert_eq!(instr.to_string(), "x = 3.0");
        assert_eq!("x = 3.0".parse::<Instr>().unwrap(), instr);
    }

    #[test]
    fn test_unsupported_operator() {
        assert_eq!(
            "t1 = a ^ b".parse::<Instr>(),
            Err(ParseError::UnsupportedOperator {
                op: "^".into(),
                line: "t1 = a ^ b".into()
            })
        );
    }

    #[test]
    fn test_malformed() {
        for line in ["t1 = a +", "goto", "1x = 2", "if t1 L1", "t1 = CALL f"] {
            assert_eq!(
                line.parse::<Instr>(),
                Err(ParseError::Malformed(line.into())),
                "{line}"
            );
        }
    }

    #[test]
    fn test_uses_and_dest() {
        let instr: Instr = "t3 = t1 * 4".parse().unwrap();
        assert_eq!(instr.dest(), Some("t3"));
        assert_eq!(instr.uses(), ["t1"]);

        let instr: Instr = "if t3 goto L7".parse().unwrap();
        assert_eq!(instr.dest(), None);
        assert_eq!(instr.uses(), ["t3"]);
        assert_eq!(instr.jump_target(), Some("L7"));
    }

    #[test]
    fn test_sentinel_is_not_a_name() {
        let code = vec![
            Instr::Assign {
                dest: "UNINITIALIZED".into(),
                value: Operand::Uninitialized,
            },
            Instr::Assign {
                dest: "y".into(),
                value: Operand::var("UNINITIALIZED"),
            },
        ];
        let lines = listing(&code);
        assert_eq!(lines, ["UNINITIALIZED = <uninitialized>", "y = UNINITIALIZED"]);
        assert_eq!(parse_listing(&lines).unwrap(), code);
    }

    #[test]
    fn test_demo_listings_read_back() {
        use crate::{lexer, parser, tac};

        for src in [
            include_str!("../demos/factorial.c"),
            include_str!("../demos/loops.c"),
            include_str!("../demos/big.c"),
        ] {
            let tokens = lexer::tokenize(src).unwrap();
            let code = tac::generate(&parser::parse(&tokens).unwrap());
            assert_eq!(parse_listing(&listing(&code)).unwrap(), code);
        }
    }
}
