use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use log::{debug, error};
use tacc::{
    ir,
    optimizer::OptimizeOptions,
    symbols::{ScopeKind, SymbolKind},
    token::Token,
    util::tree,
    Compilation, Options,
};

/// Compiles a small C-like language to three-address code and
/// pseudo-assembly.
#[derive(Parser, Debug)]
#[command(name = "tacc", version, about)]
struct Cli {
    /// Source files, compiled independently.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Print the token stream.
    #[arg(short = 'L', long)]
    list_tokens: bool,

    /// Print the syntax tree.
    #[arg(long)]
    ast: bool,

    /// Print every scope of the symbol table.
    #[arg(long)]
    symbols: bool,

    /// Print the three-address code before optimization.
    #[arg(long)]
    tac: bool,

    /// Fold constant instructions.
    #[arg(short, long)]
    fold: bool,

    /// Propagate constants.
    #[arg(short, long)]
    propagate: bool,

    /// Eliminate dead code.
    #[arg(short, long = "dead-code")]
    dead_code: bool,

    /// Enable every three-address code optimization.
    #[arg(short = 'O')]
    optimize: bool,

    /// Fold constants in the syntax tree before lowering.
    #[arg(long)]
    fold_ast: bool,

    /// Read the files as three-address code listings instead of source.
    #[arg(long)]
    from_tac: bool,

    /// Generate and print pseudo-assembly.
    #[arg(short = 'S', long)]
    asm: bool,

    /// Log each stage.
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn options(&self) -> Options {
        let optimize = if self.optimize {
            OptimizeOptions::all()
        } else {
            OptimizeOptions {
                fold_constants: self.fold,
                propagate_constants: self.propagate,
                eliminate_dead_code: self.dead_code,
            }
        };
        Options {
            fold_ast: self.fold_ast,
            optimize,
            codegen: self.asm,
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum RunError {
    #[error("file not found")]
    NotFound,
    #[error("cannot read file: {0}")]
    Unreadable(io::Error),
    #[error(transparent)]
    Compile(#[from] tacc::Error),
    #[error("cannot write output: {0}")]
    Output(#[from] io::Error),
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let options = cli.options();
    debug!("{options:?}");

    let mut failed = 0;
    for path in &cli.files {
        if let Err(e) = run(&cli, &options, path) {
            match &e {
                RunError::Compile(inner) => error!("{}: {} failed", path.display(), inner.stage()),
                _ => debug!("{}: {e:?}", path.display()),
            }
            eprintln!("{}: {e}", path.display());
            failed += 1;
        }
    }

    if failed == 0 {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn run(cli: &Cli, options: &Options, path: &Path) -> Result<(), RunError> {
    let src = read_source(path)?;
    let mut out = io::stdout().lock();
    if cli.files.len() > 1 {
        writeln!(out, "== {} ==", path.display())?;
    }
    if cli.from_tac {
        let lines: Vec<&str> = src.lines().collect();
        let (optimized, assembly) = tacc::compile_listing(&lines, options)?;
        print_listing(&mut out, "optimized", &optimized)?;
        return print_assembly(&mut out, assembly.as_deref());
    }

    let c = tacc::compile(&src, options)?;
    if cli.list_tokens {
        print_tokens(&mut out, &c.tokens)?;
    }
    if cli.ast {
        tree::print_program(&mut out, &c.program)?;
    }
    if cli.symbols {
        print_symbols(&mut out, &c)?;
    }
    if cli.tac {
        print_listing(&mut out, "three-address code", &c.tac)?;
    }
    if !options.optimize.is_empty() {
        print_listing(&mut out, "optimized", &c.optimized)?;
    } else if !cli.tac && !cli.asm {
        print_listing(&mut out, "three-address code", &c.tac)?;
    }
    print_assembly(&mut out, c.assembly.as_deref())
}

fn print_assembly(w: &mut impl Write, assembly: Option<&[String]>) -> Result<(), RunError> {
    if let Some(assembly) = assembly {
        writeln!(w, "; assembly")?;
        for line in assembly {
            writeln!(w, "{line}")?;
        }
    }
    Ok(())
}

fn read_source(path: &Path) -> Result<String, RunError> {
    fs::read_to_string(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => RunError::NotFound,
        _ => RunError::Unreadable(e),
    })
}

fn print_tokens(w: &mut impl Write, tokens: &[Token]) -> io::Result<()> {
    writeln!(w, "{:<20} {:<20} {:<6} {:<6}", "TOKEN", "TYPE", "LINE", "COLUMN")?;
    for token in tokens.iter().filter(|token| !token.is_eof()) {
        writeln!(
            w,
            "{:<20} {:<20} {:<6} {:<6}",
            token.text, token.kind, token.line, token.column
        )?;
    }
    Ok(())
}

fn print_symbols(w: &mut impl Write, c: &Compilation) -> io::Result<()> {
    for scope in c.symbols.all().rev() {
        match &scope.kind {
            ScopeKind::Global => writeln!(w, "scope {} (global)", scope.level)?,
            ScopeKind::Function(name) => writeln!(w, "scope {} (function {name})", scope.level)?,
            ScopeKind::Block => writeln!(w, "scope {} (block)", scope.level)?,
        }
        for symbol in scope.symbols() {
            let kind = match symbol.kind {
                SymbolKind::Variable => "variable",
                SymbolKind::Parameter => "parameter",
                SymbolKind::Function => "function",
            };
            writeln!(w, "  {} {} ({kind})", symbol.ty, symbol.name)?;
        }
    }
    Ok(())
}

fn print_listing(w: &mut impl Write, title: &str, code: &[ir::Instr]) -> io::Result<()> {
    writeln!(w, "; {title}")?;
    for line in ir::listing(code) {
        writeln!(w, "{line}")?;
    }
    Ok(())
}
