use log::debug;

use crate::{
    ast::{BinaryOperator, Block, Expr, Function, Ident, Item, Program, Stmt, UnaryOperator},
    ir::{Instr, Operand},
};

/// Lowers a program to three-address code.
///
/// Temporaries are named `t1, t2, ...` and labels `L1, L2, ...`, both counted
/// from one for each call.
pub fn generate(program: &Program) -> Vec<Instr> {
    Generator::new().generate(program)
}

#[derive(Default)]
pub struct Generator {
    temp_counter: u32,
    label_counter: u32,
    code: Vec<Instr>,
}

impl Generator {
    pub fn new() -> Generator {
        Generator::default()
    }

    pub fn generate(mut self, program: &Program) -> Vec<Instr> {
        for item in &program.items {
            match item {
                Item::Function(function) => self.g_function(function),
                Item::Statement(stmt) => self.g_stmt(stmt),
            }
        }
        debug!(
            "generated {} instructions ({} temporaries, {} labels)",
            self.code.len(),
            self.temp_counter,
            self.label_counter
        );
        self.code
    }

    fn new_temp(&mut self) -> Ident {
        self.temp_counter += 1;
        format!("t{}", self.temp_counter).into()
    }

    fn new_label(&mut self) -> Ident {
        self.label_counter += 1;
        format!("L{}", self.label_counter).into()
    }

    fn emit(&mut self, instr: Instr) {
        self.code.push(instr);
    }

    fn g_function(&mut self, function: &Function) {
        self.emit(Instr::FunctionBegin(function.name.clone()));
        self.g_block(&function.body);
        self.emit(Instr::FunctionEnd(function.name.clone()));
    }

    fn g_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.g_stmt(stmt);
        }
    }

    fn g_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Declaration {
                name, initializer, ..
            } => {
                let value = match initializer {
                    Some(initializer) => self.g_expr(initializer),
                    None => Operand::Uninitialized,
                };
                self.emit(Instr::Assign {
                    dest: name.clone(),
                    value,
                });
            }
            Stmt::Assignment { target, value } => {
                let value = self.g_expr(value);
                self.emit(Instr::Assign {
                    dest: target.clone(),
                    value,
                });
            }
            Stmt::If {
                condition,
                then_block,
                else_block,
            } => self.g_if(condition, then_block, else_block.as_ref()),
            Stmt::While { condition, body } => self.g_loop(Some(condition), None, body),
            Stmt::For {
                init,
                condition,
                update,
                body,
            } => {
                if let Some(init) = init {
                    self.g_stmt(init);
                }
                self.g_loop(condition.as_ref(), update.as_deref(), body);
            }
            Stmt::Return(value) => {
                let value = value.as_ref().map(|value| self.g_expr(value));
                self.emit(Instr::Return(value));
            }
            Stmt::Expr(expr) => {
                self.g_expr(expr);
            }
            Stmt::Block(block) => self.g_block(block),
        }
    }

    // if c goto L_true
    // goto L_false
    // L_true:
    //   then
    //   goto L_end        (only with an else arm)
    // L_false:
    //   else
    // L_end:
    fn g_if(&mut self, condition: &Expr, then_block: &Block, else_block: Option<&Block>) {
        let true_label = self.new_label();
        let false_label = self.new_label();
        let end_label = self.new_label();

        let cond = self.g_condition(condition);
        self.emit(Instr::CondJump {
            cond,
            target: true_label.clone(),
        });
        self.emit(Instr::Jump(false_label.clone()));
        self.emit(Instr::Label(true_label));
        self.g_block(then_block);

        if let Some(else_block) = else_block {
            self.emit(Instr::Jump(end_label.clone()));
            self.emit(Instr::Label(false_label));
            self.g_block(else_block);
        } else {
            self.emit(Instr::Label(false_label));
        }
        self.emit(Instr::Label(end_label));
    }

    // L_start:
    // if c goto L_body    (both jumps omitted without a condition)
    // goto L_end
    // L_body:
    //   body
    //   update
    //   goto L_start
    // L_end:
    fn g_loop(&mut self, condition: Option<&Expr>, update: Option<&Stmt>, body: &Block) {
        let start_label = self.new_label();
        let body_label = self.new_label();
        let end_label = self.new_label();

        self.emit(Instr::Label(start_label.clone()));
        if let Some(condition) = condition {
            let cond = self.g_condition(condition);
            self.emit(Instr::CondJump {
                cond,
                target: body_label.clone(),
            });
            self.emit(Instr::Jump(end_label.clone()));
        }
        self.emit(Instr::Label(body_label));
        self.g_block(body);
        if let Some(update) = update {
            self.g_stmt(update);
        }
        self.emit(Instr::Jump(start_label));
        self.emit(Instr::Label(end_label));
    }

    /// Evaluates a condition into a variable. Literal conditions are first
    /// copied into a temporary.
    fn g_condition(&mut self, condition: &Expr) -> Ident {
        match self.g_expr(condition) {
            Operand::Var(name) => name,
            value => {
                let temp = self.new_temp();
                self.emit(Instr::Assign {
                    dest: temp.clone(),
                    value,
                });
                temp
            }
        }
    }

    /// Emits the code computing `expr` and returns where its value lives.
    /// Literals and variables emit nothing.
    fn g_expr(&mut self, expr: &Expr) -> Operand {
        match expr {
            Expr::Number(number) => Operand::Number(*number),
            Expr::Variable(name) => Operand::Var(name.clone()),
            Expr::String(text) => {
                let temp = self.new_temp();
                self.emit(Instr::Assign {
                    dest: temp.clone(),
                    value: Operand::Str(text.clone()),
                });
                Operand::Var(temp)
            }
            Expr::Binary { op, lhs, rhs } => {
                let lhs = self.g_expr(lhs);
                let rhs = self.g_expr(rhs);
                self.g_binary(*op, lhs, rhs)
            }
            Expr::Unary {
                op: op @ (UnaryOperator::Increment | UnaryOperator::Decrement),
                operand,
                postfix,
            } => {
                let op = if *op == UnaryOperator::Increment {
                    BinaryOperator::Add
                } else {
                    BinaryOperator::Sub
                };
                self.g_step(op, operand, *postfix)
            }
            Expr::Unary {
                op: UnaryOperator::Negate,
                operand,
                ..
            } => {
                let value = self.g_expr(operand);
                self.g_binary(BinaryOperator::Sub, Operand::int(0), value)
            }
            Expr::Unary {
                op: UnaryOperator::Not,
                operand,
                ..
            } => {
                let value = self.g_expr(operand);
                self.g_binary(BinaryOperator::Eq, value, Operand::int(0))
            }
            Expr::Call { name, args } => {
                let args: Vec<Operand> = args.iter().map(|arg| self.g_expr(arg)).collect();
                let argc = args.len();
                for arg in args {
                    self.emit(Instr::Param(arg));
                }
                let temp = self.new_temp();
                self.emit(Instr::Call {
                    dest: temp.clone(),
                    function: name.clone(),
                    argc,
                });
                Operand::Var(temp)
            }
        }
    }

    fn g_binary(&mut self, op: BinaryOperator, lhs: Operand, rhs: Operand) -> Operand {
        let temp = self.new_temp();
        self.emit(Instr::Binary {
            dest: temp.clone(),
            op,
            lhs,
            rhs,
        });
        Operand::Var(temp)
    }

    /// Lowers `++`/`--`. The postfix forms evaluate to a copy of the value
    /// before the update.
    fn g_step(&mut self, op: BinaryOperator, operand: &Expr, postfix: bool) -> Operand {
        let Expr::Variable(name) = operand else {
            let value = self.g_expr(operand);
            return self.g_binary(op, value, Operand::int(1));
        };

        let old = if postfix {
            let temp = self.new_temp();
            self.emit(Instr::Assign {
                dest: temp.clone(),
                value: Operand::Var(name.clone()),
            });
            Some(temp)
        } else {
            None
        };
        self.emit(Instr::Binary {
            dest: name.clone(),
            op,
            lhs: Operand::Var(name.clone()),
            rhs: Operand::int(1),
        });
        Operand::Var(old.unwrap_or_else(|| name.clone()))
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test_utils::tree_tests;

    tree_tests!(
        use tac;

        fn test_simple_declarations() {
            let program = "int main() { int x = 2; int y = 3; return x + y; }";
            let tac_ok = "
                main() BEGIN
                x = 2
                y = 3
                t1 = x + y
                RETURN t1
                main() END
            ";
        }

        fn test_nested_expression_temporaries() {
            let program = "int a = 1; int b = (a + 2) * (a - 3) / 4;";
            let tac_ok = "
                a = 1
                t1 = a + 2
                t2 = a - 3
                t3 = t1 * t2
                t4 = t3 / 4
                b = t4
            ";
        }

        fn test_uninitialized_declaration() {
            let program = "int x; x = 4;";
            let tac_ok = "
                x = <uninitialized>
                x = 4
            ";
        }

        fn test_if_without_else() {
            let program = "int x = 1; if (x > 0) { x = 2; }";
            let tac_ok = "
                x = 1
                t1 = x > 0
                if t1 goto L1
                goto L2
                L1:
                x = 2
                L2:
                L3:
            ";
        }

        fn test_if_with_else() {
            let program = "int x = 1; if (x) { x = 2; } else { x = 3; }";
            let tac_ok = "
                x = 1
                if x goto L1
                goto L2
                L1:
                x = 2
                goto L3
                L2:
                x = 3
                L3:
            ";
        }

        fn test_literal_condition_uses_temporary() {
            let program = "while (1) { }";
            let tac_ok = "
                L1:
                t1 = 1
                if t1 goto L2
                goto L3
                L2:
                goto L1
                L3:
            ";
        }

        fn test_while_loop() {
            let program = "int i = 0; while (i < 10) { i = i + 1; }";
            let tac_ok = "
                i = 0
                L1:
                t1 = i < 10
                if t1 goto L2
                goto L3
                L2:
                t2 = i + 1
                i = t2
                goto L1
                L3:
            ";
        }

        fn test_for_loop_runs_update_before_jumping_back() {
            let program = "int s = 0; for (int i = 0; i < 3; i++) { s += i; }";
            let tac_ok = "
                s = 0
                i = 0
                L1:
                t1 = i < 3
                if t1 goto L2
                goto L3
                L2:
                t2 = s + i
                s = t2
                t3 = i
                i = i + 1
                goto L1
                L3:
            ";
        }

        fn test_for_loop_without_condition() {
            let program = "int i = 0; for (;; i++) { }";
            let tac_ok = "
                i = 0
                L1:
                L2:
                t1 = i
                i = i + 1
                goto L1
                L3:
            ";
        }

        fn test_prefix_and_postfix_values() {
            let program = "int i = 5; int a = i++; int b = --i;";
            let tac_ok = "
                i = 5
                t1 = i
                i = i + 1
                a = t1
                i = i - 1
                b = i
            ";
        }

        fn test_unary_operators() {
            let program = "int a = 3; int b = -a; int c = !a;";
            let tac_ok = "
                a = 3
                t1 = 0 - a
                b = t1
                t2 = a == 0
                c = t2
            ";
        }

        fn test_calls_and_strings() {
            let program = "
                int add(int a, int b) { return a + b; }
                int main() {
                    char s = \"hi\";
                    int r = add(1, add(2, 3));
                    return r;
                }
            ";
            let tac_ok = r#"
                add() BEGIN
                t1 = a + b
                RETURN t1
                add() END
                main() BEGIN
                t2 = "hi"
                s = t2
                PARAM 2
                PARAM 3
                t3 = CALL add 2
                PARAM 1
                PARAM t3
                t4 = CALL add 2
                r = t4
                RETURN r
                main() END
            "#;
        }

        fn test_void_return() {
            let program = "void f() { return; }";
            let tac_ok = "
                f() BEGIN
                RETURN
                f() END
            ";
        }
    );
}
