//! Folding over the syntax tree, before lowering.
//!
//! Constant subexpressions are evaluated, and `if`/`while` statements with a
//! constant condition are replaced by the branch that would run.

use crate::{
    ast::{BinaryOperator, Block, Expr, Function, Item, Number, Program, Stmt, UnaryOperator},
    optimizer::fold::evaluate,
};

/// Returns a folded copy of the program.
pub fn fold_program(program: &Program) -> Program {
    let items = program
        .items
        .iter()
        .flat_map(|item| match item {
            Item::Function(function) => vec![Item::Function(fold_function(function))],
            Item::Statement(stmt) => fold_stmt(stmt).into_iter().map(Item::Statement).collect(),
        })
        .collect();
    Program { items }
}

fn fold_function(function: &Function) -> Function {
    Function {
        body: fold_block(&function.body),
        ..function.clone()
    }
}

fn fold_block(block: &Block) -> Block {
    Block {
        stmts: block.stmts.iter().flat_map(fold_stmt).collect(),
    }
}

/// Folds a statement into zero or more statements. A branch that is taken
/// unconditionally stays wrapped in a block, so its declarations remain
/// scoped.
fn fold_stmt(stmt: &Stmt) -> Vec<Stmt> {
    let folded = match stmt {
        Stmt::Declaration {
            ty,
            name,
            initializer,
        } => Stmt::Declaration {
            ty: *ty,
            name: name.clone(),
            initializer: initializer.as_ref().map(fold_expr),
        },
        Stmt::Assignment { target, value } => Stmt::Assignment {
            target: target.clone(),
            value: fold_expr(value),
        },
        Stmt::If {
            condition,
            then_block,
            else_block,
        } => {
            let condition = fold_expr(condition);
            match condition.as_number().map(Number::is_truthy) {
                Some(true) => Stmt::Block(fold_block(then_block)),
                Some(false) => match else_block {
                    Some(else_block) => Stmt::Block(fold_block(else_block)),
                    None => return Vec::new(),
                },
                None => Stmt::If {
                    condition,
                    then_block: fold_block(then_block),
                    else_block: else_block.as_ref().map(fold_block),
                },
            }
        }
        Stmt::While { condition, body } => {
            let condition = fold_expr(condition);
            if condition.as_number().is_some_and(|n| !n.is_truthy()) {
                return Vec::new();
            }
            Stmt::While {
                condition,
                body: fold_block(body),
            }
        }
        Stmt::For {
            init,
            condition,
            update,
            body,
        } => Stmt::For {
            init: init.as_deref().map(fold_single).map(Box::new),
            condition: condition.as_ref().map(fold_expr),
            update: update.as_deref().map(fold_single).map(Box::new),
            body: fold_block(body),
        },
        Stmt::Return(value) => Stmt::Return(value.as_ref().map(fold_expr)),
        Stmt::Expr(expr) => Stmt::Expr(fold_expr(expr)),
        Stmt::Block(block) => Stmt::Block(fold_block(block)),
    };
    vec![folded]
}

/// Folds the expressions of a `for` clause, which is never a control
/// statement.
fn fold_single(stmt: &Stmt) -> Stmt {
    match stmt {
        Stmt::Declaration { .. } | Stmt::Assignment { .. } | Stmt::Expr(_) => {
            fold_stmt(stmt).swap_remove(0)
        }
        _ => stmt.clone(),
    }
}

pub fn fold_expr(expr: &Expr) -> Expr {
    match expr {
        Expr::Binary { op, lhs, rhs } => {
            let lhs = fold_expr(lhs);
            let rhs = fold_expr(rhs);
            match (lhs.as_number(), rhs.as_number()) {
                (Some(l), Some(r)) => match evaluate(*op, l, r) {
                    Some(value) => Expr::Number(value),
                    None => Expr::binary(*op, lhs, rhs),
                },
                _ => Expr::binary(*op, lhs, rhs),
            }
        }
        Expr::Unary {
            op: op @ (UnaryOperator::Negate | UnaryOperator::Not),
            operand,
            postfix,
        } => {
            let operand = fold_expr(operand);
            let value = operand.as_number().and_then(|n| match op {
                UnaryOperator::Negate => evaluate(BinaryOperator::Sub, Number::Int(0), n),
                _ => evaluate(BinaryOperator::Eq, n, Number::Int(0)),
            });
            match value {
                Some(value) => Expr::Number(value),
                None => Expr::Unary {
                    op: *op,
                    operand: Box::new(operand),
                    postfix: *postfix,
                },
            }
        }
        Expr::Call { name, args } => Expr::Call {
            name: name.clone(),
            args: args.iter().map(fold_expr).collect(),
        },
        // `++`/`--` write their operand.
        Expr::Unary { .. } | Expr::Number(_) | Expr::Variable(_) | Expr::String(_) => {
            expr.clone()
        }
    }
}
