use std::fmt;

use log::debug;

/// The lexer takes the source input, mapping it into a sequence of tokens.
pub mod lexer;

/// The parser takes a sequence of tokens, mapping it into an AST while
/// resolving every name against a scoped symbol table.
pub mod parser;

/// The TAC generator lowers an AST into three-address code.
pub mod tac;

/// Passes over the three-address code, and a folding pass over the AST.
pub mod optimizer;

/// The code generator maps three-address code into pseudo-assembly.
pub mod codegen;

pub mod ast;
pub mod ir;
pub mod symbols;
pub mod token;

pub mod util {
    pub mod tree;
    #[cfg(test)]
    pub(crate) mod test_utils;
}

use crate::{
    ast::Program, ir::Instr, optimizer::OptimizeOptions, symbols::SymbolTable, token::Token,
};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    /// Fold constants in the AST before lowering.
    pub fold_ast: bool,
    pub optimize: OptimizeOptions,
    /// Generate assembly from the optimized code.
    pub codegen: bool,
}

/// The output of every stage of a compilation.
#[derive(Debug)]
pub struct Compilation {
    pub tokens: Vec<Token>,
    pub program: Program,
    /// All scopes, in the order they were exited.
    pub symbols: SymbolTable,
    pub tac: Vec<Instr>,
    /// Equal to `tac` when no optimization is enabled.
    pub optimized: Vec<Instr>,
    pub assembly: Option<Vec<String>>,
}

/// Runs the pipeline on one compilation unit, stopping at the first error.
pub fn compile(src: &str, options: &Options) -> Result<Compilation, Error> {
    let tokens = lexer::tokenize(src)?;
    debug!("lexed {} tokens", tokens.len());

    let (program, symbols) = parser::parse_with_symbols(&tokens)?;
    let program = if options.fold_ast {
        optimizer::tree::fold_program(&program)
    } else {
        program
    };

    let tac = tac::generate(&program);
    let optimized = optimizer::optimize(&tac, options.optimize);
    let assembly = if options.codegen {
        Some(codegen::convert(&optimized)?)
    } else {
        None
    };

    Ok(Compilation {
        tokens,
        program,
        symbols,
        tac,
        optimized,
        assembly,
    })
}

/// Runs the optimizer, then the code generator if enabled, on a textual
/// listing of three-address code. `fold_ast` has no effect here.
pub fn compile_listing<S: AsRef<str>>(
    lines: &[S],
    options: &Options,
) -> Result<(Vec<Instr>, Option<Vec<String>>), Error> {
    let optimized = optimizer::optimize_text(lines, options.optimize)?;
    let assembly = if options.codegen {
        Some(codegen::convert(&optimized)?)
    } else {
        None
    };
    Ok((optimized, assembly))
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("lexical error: {0}")]
    Lex(#[from] lexer::Error),
    #[error("syntax error: {0}")]
    Parse(parser::Error),
    #[error("name error: {0}")]
    Name(parser::Error),
    /// Only raised for textual input, see [`compile_listing`].
    #[error("evaluation error: {0}")]
    Eval(#[from] optimizer::EvalError),
    #[error("code generation error: {0}")]
    Codegen(#[from] codegen::Error),
}

impl From<parser::Error> for Error {
    fn from(error: parser::Error) -> Error {
        if error.is_name_error() {
            Error::Name(error)
        } else {
            Error::Parse(error)
        }
    }
}

impl Error {
    pub fn stage(&self) -> Stage {
        match self {
            Error::Lex(_) => Stage::Lexer,
            Error::Parse(_) | Error::Name(_) => Stage::Parser,
            Error::Eval(_) => Stage::Optimizer,
            Error::Codegen(_) => Stage::Codegen,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Stage {
    Lexer,
    Parser,
    Optimizer,
    Codegen,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Lexer => "lexer",
            Stage::Parser => "parser",
            Stage::Optimizer => "optimizer",
            Stage::Codegen => "code generator",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    static FACTORIAL: &str = include_str!("../demos/factorial.c");
    static LOOPS: &str = include_str!("../demos/loops.c");
    static BIG: &str = include_str!("../demos/big.c");

    fn all() -> Options {
        Options {
            fold_ast: false,
            optimize: OptimizeOptions::all(),
            codegen: true,
        }
    }

    #[test]
    fn test_sum_is_computed_into_returned_temporary() {
        let c = compile(
            "int main(){int x=2; int y=3; return x+y;}",
            &Options::default(),
        )
        .unwrap();
        assert_eq!(
            ir::listing(&c.tac),
            ["main() BEGIN", "x = 2", "y = 3", "t1 = x + y", "RETURN t1", "main() END"]
        );
        assert_eq!(c.optimized, c.tac);
        assert!(c.assembly.is_none());
    }

    #[test]
    fn test_fully_optimized_sum() {
        let c = compile("int main(){int x=2; int y=3; return x+y;}", &all()).unwrap();
        assert_eq!(
            ir::listing(&c.optimized),
            ["main() BEGIN", "RETURN 5", "main() END"]
        );
        assert_eq!(
            c.assembly.unwrap(),
            ["main:", "    mov eax, 5", "    ret"]
        );
    }

    #[test]
    fn test_demos_compile() {
        let optimized = Options {
            codegen: false,
            ..all()
        };
        for src in [FACTORIAL, LOOPS, BIG] {
            for options in [Options::default(), optimized] {
                let c = compile(src, &options).unwrap();
                assert!(!c.tac.is_empty());
                assert!(c.optimized.len() <= c.tac.len());
            }
        }
    }

    #[test]
    fn test_demos_generate_assembly() {
        for (src, entry) in [(FACTORIAL, "fact:"), (LOOPS, "sum_to:")] {
            let assembly = compile(src, &all()).unwrap().assembly.unwrap();
            assert_eq!(assembly[0], entry);
            assert!(assembly.iter().any(|line| line == "main:"));
            assert!(assembly
                .iter()
                .filter(|line| !line.ends_with(':'))
                .all(|line| line.starts_with("    ")));
        }
    }

    #[test]
    fn test_ast_folding_removes_dead_branch() {
        let options = Options {
            fold_ast: true,
            ..Options::default()
        };
        let c = compile("int x = 1; if (2 < 1) { x = 2; }", &options).unwrap();
        assert_eq!(ir::listing(&c.tac), ["x = 1"]);
    }

    #[test]
    fn test_error_stages() {
        let error = compile("int x = @;", &Options::default()).unwrap_err();
        assert_eq!(error.stage(), Stage::Lexer);

        let error = compile("int x = ;", &Options::default()).unwrap_err();
        assert!(matches!(error, Error::Parse(_)));
        assert_eq!(error.stage(), Stage::Parser);

        let error = compile("int x = y;", &Options::default()).unwrap_err();
        assert!(matches!(error, Error::Name(_)));
        assert_eq!(error.to_string(), "name error: 1:9: y is not declared");
    }

    #[test]
    fn test_listing_input() {
        let (optimized, assembly) =
            compile_listing(&["t1 = 2 + 3", "x = t1", "RETURN x"], &all()).unwrap();
        assert_eq!(ir::listing(&optimized), ["RETURN 5"]);
        assert_eq!(assembly.unwrap(), ["    mov eax, 5", "    ret"]);

        let error = compile_listing(&["t1 = a ^ b"], &all()).unwrap_err();
        assert!(matches!(error, Error::Eval(_)));
        assert_eq!(error.stage(), Stage::Optimizer);
        assert_eq!(
            error.to_string(),
            "evaluation error: cannot evaluate `t1 = a ^ b`: unsupported operator `^`"
        );
    }

    #[test]
    fn test_register_exhaustion_is_reported() {
        let src = "
            int main() {
                int a = 1; int b = 2; int c = 3; int d = 4; int e = 5;
                return a + b + c + d + e;
            }
        ";
        let options = Options {
            codegen: true,
            ..Options::default()
        };
        let error = compile(src, &options).unwrap_err();
        assert_eq!(error.stage(), Stage::Codegen);
    }
}
