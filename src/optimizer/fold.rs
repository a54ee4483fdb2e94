use crate::{
    ast::{BinaryOperator, Number},
    ir::{Instr, Operand},
};

/// Evaluates `lhs op rhs` at compile time.
///
/// Integer operands use checked integer arithmetic, with division truncating
/// toward zero. Any float operand makes the operation real-valued.
/// Comparisons and logical operators yield `0` or `1`. Returns `None` when
/// the operation would fault or overflow at run time, in which case it must
/// be left for the program to perform.
pub fn evaluate(op: BinaryOperator, lhs: Number, rhs: Number) -> Option<Number> {
    match (lhs, rhs) {
        (Number::Int(lhs), Number::Int(rhs)) => evaluate_int(op, lhs, rhs).map(Number::Int),
        _ => evaluate_float(op, lhs.as_f64(), rhs.as_f64()),
    }
}

fn evaluate_int(op: BinaryOperator, lhs: i64, rhs: i64) -> Option<i64> {
    use BinaryOperator as B;
    let value = match op {
        B::Add => lhs.checked_add(rhs)?,
        B::Sub => lhs.checked_sub(rhs)?,
        B::Mul => lhs.checked_mul(rhs)?,
        B::Div => lhs.checked_div(rhs)?,
        B::Rem => lhs.checked_rem(rhs)?,
        B::Lt => i64::from(lhs < rhs),
        B::Gt => i64::from(lhs > rhs),
        B::Le => i64::from(lhs <= rhs),
        B::Ge => i64::from(lhs >= rhs),
        B::Eq => i64::from(lhs == rhs),
        B::Ne => i64::from(lhs != rhs),
        B::And => i64::from(lhs != 0 && rhs != 0),
        B::Or => i64::from(lhs != 0 || rhs != 0),
    };
    Some(value)
}

#[allow(clippy::float_cmp)]
fn evaluate_float(op: BinaryOperator, lhs: f64, rhs: f64) -> Option<Number> {
    use BinaryOperator as B;
    let truth = |value: bool| Some(Number::Int(i64::from(value)));
    let value = match op {
        B::Add => lhs + rhs,
        B::Sub => lhs - rhs,
        B::Mul => lhs * rhs,
        B::Div if rhs == 0.0 => return None,
        B::Div => lhs / rhs,
        B::Rem if rhs == 0.0 => return None,
        B::Rem => lhs % rhs,
        B::Lt => return truth(lhs < rhs),
        B::Gt => return truth(lhs > rhs),
        B::Le => return truth(lhs <= rhs),
        B::Ge => return truth(lhs >= rhs),
        B::Eq => return truth(lhs == rhs),
        B::Ne => return truth(lhs != rhs),
        B::And => return truth(lhs != 0.0 && rhs != 0.0),
        B::Or => return truth(lhs != 0.0 || rhs != 0.0),
    };
    value.is_finite().then_some(Number::Float(value))
}

/// Replaces every binary instruction whose operands are both numeric
/// literals with an assignment of the computed value.
pub fn fold_constants(code: &[Instr]) -> Vec<Instr> {
    code.iter().map(fold_instr).collect()
}

pub fn fold_instr(instr: &Instr) -> Instr {
    if let Instr::Binary { dest, op, lhs, rhs } = instr {
        if let Some(value) = fold_operands(*op, lhs, rhs) {
            return Instr::Assign {
                dest: dest.clone(),
                value: Operand::Number(value),
            };
        }
    }
    instr.clone()
}

pub(super) fn fold_operands(op: BinaryOperator, lhs: &Operand, rhs: &Operand) -> Option<Number> {
    evaluate(op, lhs.as_number()?, rhs.as_number()?)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ir, optimizer::tests::instrs};

    #[test]
    fn test_evaluate_integers() {
        use BinaryOperator as B;
        let cases = [
            (B::Add, 2, 3, Some(5)),
            (B::Sub, 2, 3, Some(-1)),
            (B::Mul, -4, 3, Some(-12)),
            (B::Div, 7, 2, Some(3)),
            (B::Div, -7, 2, Some(-3)),
            (B::Rem, -7, 2, Some(-1)),
            (B::Div, 1, 0, None),
            (B::Rem, 1, 0, None),
            (B::Div, i64::MIN, -1, None),
            (B::Add, i64::MAX, 1, None),
            (B::Lt, 1, 2, Some(1)),
            (B::Ge, 1, 2, Some(0)),
            (B::Eq, 4, 4, Some(1)),
            (B::Ne, 4, 4, Some(0)),
            (B::And, 3, 0, Some(0)),
            (B::Or, 3, 0, Some(1)),
        ];
        for (op, lhs, rhs, expected) in cases {
            assert_eq!(
                evaluate(op, Number::Int(lhs), Number::Int(rhs)),
                expected.map(Number::Int),
                "{lhs} {op} {rhs}"
            );
        }
    }

    #[test]
    fn test_evaluate_mixed_is_real() {
        assert_eq!(
            evaluate(BinaryOperator::Div, Number::Int(7), Number::Float(2.0)),
            Some(Number::Float(3.5))
        );
        assert_eq!(
            evaluate(BinaryOperator::Lt, Number::Float(1.5), Number::Int(2)),
            Some(Number::Int(1))
        );
        assert_eq!(
            evaluate(BinaryOperator::Div, Number::Float(1.0), Number::Float(0.0)),
            None
        );
    }

    #[test]
    fn test_fold_only_literal_operands() {
        let code = instrs(&["t1 = 2 + 3", "t2 = t1 * 4", "t3 = 10 / 0", "x = t2"]);
        assert_eq!(
            ir::listing(&fold_constants(&code)),
            ["t1 = 5", "t2 = t1 * 4", "t3 = 10 / 0", "x = t2"]
        );
    }

    #[test]
    fn test_fold_is_idempotent() {
        let code = instrs(&["t1 = 6 * 7", "t2 = 1.5 + 1", "t3 = 2 < 1", "if t3 goto L1"]);
        let once = fold_constants(&code);
        assert_eq!(ir::listing(&once), ["t1 = 42", "t2 = 2.5", "t3 = 0", "if t3 goto L1"]);
        assert_eq!(fold_constants(&once), once);
    }
}
