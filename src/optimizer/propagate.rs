use std::collections::{HashMap, HashSet};

use log::trace;

use crate::{
    ast::{Ident, Number},
    ir::{Instr, Operand},
    optimizer::fold::fold_operands,
};

/// Substitutes variables known to hold a constant, in a single forward pass.
///
/// A value is only known when it holds on every path reaching the
/// instruction. At each label, every variable assigned anywhere between the
/// label and its farthest jump source is forgotten. Inside a loop body,
/// reached again through a backward jump, assignments are not recorded at
/// all.
pub fn propagate_constants(code: &[Instr]) -> Vec<Instr> {
    let labels = LabelInfo::analyze(code);
    let mut constants: HashMap<Ident, Number> = HashMap::new();
    let mut open_loops: Vec<&str> = Vec::new();
    let mut out = Vec::with_capacity(code.len());

    for instr in code {
        let substitute = |operand: &Operand| match operand {
            Operand::Var(name) => constants
                .get(name)
                .map_or_else(|| operand.clone(), |value| Operand::Number(*value)),
            _ => operand.clone(),
        };

        let next = match instr {
            Instr::Assign { dest, value } => {
                let value = substitute(value);
                let known = value.as_number();
                record(&mut constants, dest, known, !open_loops.is_empty());
                Instr::Assign {
                    dest: dest.clone(),
                    value,
                }
            }
            Instr::Binary { dest, op, lhs, rhs } => {
                let (lhs, rhs) = (substitute(lhs), substitute(rhs));
                let folded = fold_operands(*op, &lhs, &rhs);
                record(&mut constants, dest, folded, !open_loops.is_empty());
                match folded {
                    Some(value) => Instr::Assign {
                        dest: dest.clone(),
                        value: Operand::Number(value),
                    },
                    None => Instr::Binary {
                        dest: dest.clone(),
                        op: *op,
                        lhs,
                        rhs,
                    },
                }
            }
            Instr::Return(Some(value)) => Instr::Return(Some(substitute(value))),
            Instr::Param(value) => Instr::Param(substitute(value)),
            Instr::Label(label) => {
                for name in labels.killed(label) {
                    constants.remove(name);
                }
                if labels.is_loop_header(label) {
                    trace!("entering loop at {label}");
                    open_loops.push(label);
                }
                instr.clone()
            }
            Instr::Jump(target) => {
                if open_loops.last() == Some(&&**target) {
                    trace!("leaving loop at {target}");
                    open_loops.pop();
                }
                instr.clone()
            }
            // A callee may write any global.
            Instr::Call { .. } | Instr::FunctionBegin(_) | Instr::FunctionEnd(_) => {
                constants.clear();
                instr.clone()
            }
            Instr::CondJump { .. } | Instr::Return(None) => instr.clone(),
        };
        out.push(next);
    }

    out
}

fn record(constants: &mut HashMap<Ident, Number>, dest: &Ident, value: Option<Number>, in_loop: bool) {
    match value {
        Some(value) if !in_loop => {
            constants.insert(dest.clone(), value);
        }
        _ => {
            constants.remove(dest);
        }
    }
}

/// Control-flow facts about each label.
struct LabelInfo<'code> {
    /// Variables assigned between the label and its farthest jump source.
    killed: HashMap<&'code str, HashSet<&'code str>>,
    /// Labels targeted by a jump placed after them.
    loop_headers: HashSet<&'code str>,
}

impl<'code> LabelInfo<'code> {
    fn analyze(code: &'code [Instr]) -> LabelInfo<'code> {
        let mut sources: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, instr) in code.iter().enumerate() {
            if let Some(target) = instr.jump_target() {
                sources.entry(target).or_default().push(i);
            }
        }

        let mut killed = HashMap::new();
        let mut loop_headers = HashSet::new();
        for (at, label) in code.iter().enumerate().filter_map(|(i, instr)| Some((i, instr.as_label()?))) {
            let Some(sources) = sources.get(label) else {
                continue;
            };
            let lo = sources.iter().copied().fold(at, usize::min);
            let hi = sources.iter().copied().fold(at, usize::max);
            if hi > at {
                loop_headers.insert(label);
            }
            let names: HashSet<&str> = code[lo..=hi].iter().filter_map(Instr::dest).collect();
            killed.insert(label, names);
        }

        LabelInfo {
            killed,
            loop_headers,
        }
    }

    fn killed(&self, label: &str) -> impl Iterator<Item = &'code str> + '_ {
        self.killed.get(label).into_iter().flatten().copied()
    }

    fn is_loop_header(&self, label: &str) -> bool {
        self.loop_headers.contains(label)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ir, optimizer::tests::instrs};

    fn propagated(lines: &[&str]) -> Vec<String> {
        ir::listing(&propagate_constants(&instrs(lines)))
    }

    #[test]
    fn test_straight_line() {
        assert_eq!(
            propagated(&["x = 4", "t1 = x * 2", "y = t1", "t2 = y + z", "RETURN t2"]),
            ["x = 4", "t1 = 8", "y = 8", "t2 = 8 + z", "RETURN t2"]
        );
    }

    #[test]
    fn test_reassignment_replaces_constant() {
        assert_eq!(
            propagated(&["x = 1", "x = y", "RETURN x"]),
            ["x = 1", "x = y", "RETURN x"]
        );
    }

    #[test]
    fn test_join_point_forgets_branch_assignments() {
        assert_eq!(
            propagated(&[
                "x = 1",
                "if c goto L1",
                "goto L2",
                "L1:",
                "x = 2",
                "L2:",
                "L3:",
                "RETURN x",
            ]),
            ["x = 1", "if c goto L1", "goto L2", "L1:", "x = 2", "L2:", "L3:", "RETURN x"]
        );
    }

    #[test]
    fn test_unrelated_constants_survive_branches() {
        assert_eq!(
            propagated(&["k = 3", "if c goto L1", "goto L2", "L1:", "x = 2", "L2:", "RETURN k"]),
            ["k = 3", "if c goto L1", "goto L2", "L1:", "x = 2", "L2:", "RETURN 3"]
        );
    }

    #[test]
    fn test_loop_variables_are_not_propagated() {
        let lines = [
            "x = 0",
            "L1:",
            "t1 = x < 10",
            "if t1 goto L2",
            "goto L3",
            "L2:",
            "t2 = x + 1",
            "x = t2",
            "goto L1",
            "L3:",
            "RETURN x",
        ];
        assert_eq!(propagated(&lines), lines);
    }

    #[test]
    fn test_loop_invariant_values_are_propagated() {
        assert_eq!(
            propagated(&[
                "n = 5",
                "i = 0",
                "L1:",
                "t1 = i < n",
                "if t1 goto L2",
                "goto L3",
                "L2:",
                "t2 = i + 1",
                "i = t2",
                "goto L1",
                "L3:",
            ]),
            [
                "n = 5",
                "i = 0",
                "L1:",
                "t1 = i < 5",
                "if t1 goto L2",
                "goto L3",
                "L2:",
                "t2 = i + 1",
                "i = t2",
                "goto L1",
                "L3:",
            ]
        );
    }

    #[test]
    fn test_call_forgets_constants() {
        assert_eq!(
            propagated(&["g = 1", "PARAM g", "t1 = CALL f 1", "RETURN g"]),
            ["g = 1", "PARAM 1", "t1 = CALL f 1", "RETURN g"]
        );
    }
}
