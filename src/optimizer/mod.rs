use log::debug;

use crate::ir::{self, Instr};

pub mod dce;
pub mod fold;
pub mod propagate;
pub mod tree;

/// Which IR passes to run. Enabled passes always run in field order.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct OptimizeOptions {
    pub fold_constants: bool,
    pub propagate_constants: bool,
    pub eliminate_dead_code: bool,
}

impl OptimizeOptions {
    pub const fn all() -> OptimizeOptions {
        OptimizeOptions {
            fold_constants: true,
            propagate_constants: true,
            eliminate_dead_code: true,
        }
    }

    pub const fn none() -> OptimizeOptions {
        OptimizeOptions {
            fold_constants: false,
            propagate_constants: false,
            eliminate_dead_code: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == OptimizeOptions::none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum EvalError {
    #[error("cannot evaluate `{line}`: unsupported operator `{op}`")]
    UnsupportedOperator { op: Box<str>, line: Box<str> },
    #[error("cannot evaluate `{0}`: not a valid instruction")]
    Malformed(Box<str>),
}

impl From<ir::ParseError> for EvalError {
    fn from(error: ir::ParseError) -> EvalError {
        match error {
            ir::ParseError::UnsupportedOperator { op, line } => {
                EvalError::UnsupportedOperator { op, line }
            }
            ir::ParseError::Malformed(line) => EvalError::Malformed(line),
        }
    }
}

pub fn optimize(code: &[Instr], options: OptimizeOptions) -> Vec<Instr> {
    let mut code = code.to_vec();
    if options.fold_constants {
        code = fold::fold_constants(&code);
        debug!("folded constants: {} instructions", code.len());
    }
    if options.propagate_constants {
        code = propagate::propagate_constants(&code);
        debug!("propagated constants: {} instructions", code.len());
    }
    if options.eliminate_dead_code {
        let before = code.len();
        code = dce::eliminate_dead_code(&code);
        debug!("eliminated {} dead instructions", before - code.len());
    }
    code
}

/// Optimizes a textual listing, one instruction per line.
pub fn optimize_text<S: AsRef<str>>(
    lines: &[S],
    options: OptimizeOptions,
) -> Result<Vec<Instr>, EvalError> {
    let code = ir::parse_listing(lines)?;
    Ok(optimize(&code, options))
}

#[cfg(test)]
pub(crate) mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[track_caller]
    pub(crate) fn instrs(lines: &[&str]) -> Vec<Instr> {
        ir::parse_listing(lines).unwrap()
    }

    #[test]
    fn test_fold_then_propagate() {
        let options = OptimizeOptions {
            fold_constants: true,
            propagate_constants: true,
            eliminate_dead_code: false,
        };
        let code = optimize_text(&["t1 = 2 + 3", "x = t1", "RETURN x"], options).unwrap();
        assert_eq!(ir::listing(&code), ["t1 = 5", "x = 5", "RETURN 5"]);
    }

    #[test]
    fn test_all_passes() {
        let code = optimize_text(
            &[
                "main() BEGIN",
                "x = 2",
                "y = 3",
                "t1 = x + y",
                "z = <uninitialized>",
                "RETURN t1",
                "main() END",
            ],
            OptimizeOptions::all(),
        )
        .unwrap();
        assert_eq!(ir::listing(&code), ["main() BEGIN", "RETURN 5", "main() END"]);
    }

    #[test]
    fn test_no_passes_is_identity() {
        let code = instrs(&["x = 1 + 2", "RETURN x"]);
        assert_eq!(optimize(&code, OptimizeOptions::none()), code);
        assert!(OptimizeOptions::default().is_empty());
    }

    #[test]
    fn test_unsupported_operator() {
        assert_eq!(
            optimize_text(&["t1 = 2 ** 3"], OptimizeOptions::all()),
            Err(EvalError::UnsupportedOperator {
                op: "**".into(),
                line: "t1 = 2 ** 3".into()
            })
        );
    }
}
