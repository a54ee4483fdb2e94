use std::io::Write;

use crate::ast::*;

const INDENT_WIDTH: usize = 2;

pub fn print_program_string(program: &Program) -> String {
    let mut buf = Vec::with_capacity(1024);
    print_program(&mut buf, program).unwrap();
    String::from_utf8(buf).unwrap()
}

pub fn print_program(w: &mut impl Write, program: &Program) -> std::io::Result<()> {
    for item in &program.items {
        match item {
            Item::Function(function) => print_function(w, 0, function)?,
            Item::Statement(stmt) => print_stmt(w, 0, stmt)?,
        }
    }
    Ok(())
}

fn print_function(w: &mut impl Write, i: usize, function: &Function) -> std::io::Result<()> {
    sp(w, i)?;
    write!(w, "function {} {}(", function.return_ty, function.name)?;
    for (idx, param) in function.params.iter().enumerate() {
        if idx > 0 {
            write!(w, ", ")?;
        }
        write!(w, "{} {}", param.ty, param.name)?;
    }
    writeln!(w, ")")?;
    print_block(w, i + 1, &function.body)
}

fn print_block(w: &mut impl Write, i: usize, block: &Block) -> std::io::Result<()> {
    for stmt in &block.stmts {
        print_stmt(w, i, stmt)?;
    }
    Ok(())
}

/// Prints a labelled child section, such as the `then` arm of an `if`.
fn print_section(w: &mut impl Write, i: usize, label: &str, block: &Block) -> std::io::Result<()> {
    sp(w, i)?;
    writeln!(w, "{label}")?;
    print_block(w, i + 1, block)
}

pub fn print_stmt(w: &mut impl Write, i: usize, stmt: &Stmt) -> std::io::Result<()> {
    sp(w, i)?;
    match stmt {
        Stmt::Declaration {
            ty,
            name,
            initializer,
        } => {
            writeln!(w, "declaration {ty} {name}")?;
            if let Some(initializer) = initializer {
                print_expr(w, i + 1, initializer)?;
            }
        }
        Stmt::Assignment { target, value } => {
            writeln!(w, "assignment {target}")?;
            print_expr(w, i + 1, value)?;
        }
        Stmt::If {
            condition,
            then_block,
            else_block,
        } => {
            writeln!(w, "if")?;
            print_expr(w, i + 1, condition)?;
            print_section(w, i + 1, "then", then_block)?;
            if let Some(else_block) = else_block {
                print_section(w, i + 1, "else", else_block)?;
            }
        }
        Stmt::While { condition, body } => {
            writeln!(w, "while")?;
            print_expr(w, i + 1, condition)?;
            print_section(w, i + 1, "body", body)?;
        }
        Stmt::For {
            init,
            condition,
            update,
            body,
        } => {
            writeln!(w, "for")?;
            if let Some(init) = init {
                sp(w, i + 1)?;
                writeln!(w, "init")?;
                print_stmt(w, i + 2, init)?;
            }
            if let Some(condition) = condition {
                sp(w, i + 1)?;
                writeln!(w, "condition")?;
                print_expr(w, i + 2, condition)?;
            }
            if let Some(update) = update {
                sp(w, i + 1)?;
                writeln!(w, "update")?;
                print_stmt(w, i + 2, update)?;
            }
            print_section(w, i + 1, "body", body)?;
        }
        Stmt::Return(value) => {
            writeln!(w, "return")?;
            if let Some(value) = value {
                print_expr(w, i + 1, value)?;
            }
        }
        Stmt::Expr(expr) => {
            writeln!(w, "expression")?;
            print_expr(w, i + 1, expr)?;
        }
        Stmt::Block(block) => {
            writeln!(w, "block")?;
            print_block(w, i + 1, block)?;
        }
    }
    Ok(())
}

pub fn print_expr(w: &mut impl Write, i: usize, expr: &Expr) -> std::io::Result<()> {
    sp(w, i)?;
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            writeln!(w, "binary {op}")?;
            print_expr(w, i + 1, lhs)?;
            print_expr(w, i + 1, rhs)?;
        }
        Expr::Unary {
            op,
            operand,
            postfix,
        } => {
            let position = match (op, postfix) {
                (UnaryOperator::Increment | UnaryOperator::Decrement, true) => "postfix",
                (UnaryOperator::Increment | UnaryOperator::Decrement, false) => "prefix",
                _ => "unary",
            };
            writeln!(w, "{position} {}", op.symbol())?;
            print_expr(w, i + 1, operand)?;
        }
        Expr::Call { name, args } => {
            writeln!(w, "call {name}")?;
            for arg in args {
                print_expr(w, i + 1, arg)?;
            }
        }
        Expr::Number(number) => writeln!(w, "number {number}")?,
        Expr::Variable(name) => writeln!(w, "variable {name}")?,
        Expr::String(val) => writeln!(w, "string {val:?}")?,
    }
    Ok(())
}

fn sp(w: &mut impl Write, i: usize) -> std::io::Result<()> {
    write!(w, "{:width$}", "", width = i * INDENT_WIDTH)
}
