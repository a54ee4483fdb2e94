use std::collections::HashSet;

use log::trace;

use crate::ir::Instr;

/// Drops assignments whose results are never used.
///
/// Labels, jumps, returns, parameters and calls are always kept. An
/// assignment is kept if its destination or one of its operands is used
/// later, or if it feeds a jump condition, directly or through other
/// assignments. The backward scan is repeated until the set of used names
/// stops growing, so uses reached through a backward jump are accounted
/// for.
pub fn eliminate_dead_code(code: &[Instr]) -> Vec<Instr> {
    let conditions = condition_closure(code);
    let mut used = HashSet::new();
    let keep = loop {
        let before = used.len();
        let keep = scan(code, &conditions, &mut used);
        if used.len() == before {
            break keep;
        }
    };

    let mut out: Vec<Instr> = code
        .iter()
        .zip(&keep)
        .filter(|(_, keep)| **keep)
        .map(|(instr, _)| instr.clone())
        .collect();
    trace!("dropped {} dead instructions", code.len() - out.len());

    restore_labels(code, &mut out);
    move_trailing_labels(&mut out);
    out
}

/// Variables a jump condition depends on, transitively through assignments.
fn condition_closure(code: &[Instr]) -> HashSet<&str> {
    let mut names: HashSet<&str> = code
        .iter()
        .filter_map(|instr| match instr {
            Instr::CondJump { cond, .. } => Some(&**cond),
            _ => None,
        })
        .collect();
    loop {
        let before = names.len();
        for instr in code {
            if instr.dest().is_some_and(|dest| names.contains(dest)) {
                names.extend(instr.uses());
            }
        }
        if names.len() == before {
            break names;
        }
    }
}

/// One backward pass, returning which instructions to keep.
fn scan<'code>(
    code: &'code [Instr],
    conditions: &HashSet<&'code str>,
    used: &mut HashSet<&'code str>,
) -> Vec<bool> {
    let mut keep = vec![true; code.len()];
    for (i, instr) in code.iter().enumerate().rev() {
        match instr {
            Instr::Label(_) | Instr::Jump(_) => {}
            Instr::Assign { dest, .. } | Instr::Binary { dest, .. } => {
                let operands = instr.uses();
                let live = |name: &str| used.contains(name) || conditions.contains(name);
                if live(&**dest) || operands.iter().any(|&name| live(name)) {
                    used.insert(&**dest);
                    used.extend(operands);
                } else {
                    keep[i] = false;
                }
            }
            _ => used.extend(instr.uses()),
        }
    }
    keep
}

/// Reinserts jump targets that are missing from `out`, right before the
/// instruction that followed them in `original`.
fn restore_labels(original: &[Instr], out: &mut Vec<Instr>) {
    let targets: HashSet<&str> = out.iter().filter_map(Instr::jump_target).collect();
    let present: HashSet<&str> = out.iter().filter_map(Instr::as_label).collect();
    let missing: Vec<(usize, Instr)> = original
        .iter()
        .enumerate()
        .filter(|(_, instr)| {
            instr
                .as_label()
                .is_some_and(|label| targets.contains(label) && !present.contains(label))
        })
        .map(|(i, instr)| (i, instr.clone()))
        .collect();

    for (at, label) in missing {
        let anchor = original[at + 1..].iter().find(|instr| out.contains(instr));
        let position = anchor
            .and_then(|anchor| out.iter().position(|instr| instr == anchor))
            .unwrap_or(out.len());
        trace!("restoring {label} at {position}");
        out.insert(position, label);
    }
}

/// Moves labels that directly follow a function's end marker, and are only
/// jumped to from inside that function, back before the marker.
fn move_trailing_labels(out: &mut [Instr]) {
    let mut begin = 0;
    let mut i = 0;
    while i < out.len() {
        if matches!(out[i], Instr::FunctionBegin(_)) {
            begin = i;
        } else if matches!(out[i], Instr::FunctionEnd(_)) {
            let mut end = i;
            while let Some(label) = out.get(end + 1).and_then(Instr::as_label) {
                let inside = out[begin..end].iter().any(|instr| instr.jump_target() == Some(label));
                let outside = out[..begin]
                    .iter()
                    .chain(&out[end + 1..])
                    .any(|instr| instr.jump_target() == Some(label));
                if !inside || outside {
                    break;
                }
                out.swap(end, end + 1);
                end += 1;
            }
            i = end;
        }
        i += 1;
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{ir, optimizer::tests::instrs};

    fn eliminated(lines: &[&str]) -> Vec<String> {
        ir::listing(&eliminate_dead_code(&instrs(lines)))
    }

    #[test]
    fn test_drops_unused_assignments() {
        assert_eq!(
            eliminated(&["main() BEGIN", "a = 1", "b = 2", "t1 = b * 3", "RETURN t1", "main() END"]),
            ["main() BEGIN", "b = 2", "t1 = b * 3", "RETURN t1", "main() END"]
        );
    }

    #[test]
    fn test_drops_chains_of_dead_values() {
        assert_eq!(
            eliminated(&["x = <uninitialized>", "t1 = 4", "y = t1", "RETURN 0"]),
            ["RETURN 0"]
        );
    }

    #[test]
    fn test_keeps_condition_dependencies() {
        let lines = [
            "i = 0",
            "L1:",
            "t1 = i < 10",
            "if t1 goto L2",
            "goto L3",
            "L2:",
            "t2 = i + 1",
            "i = t2",
            "goto L1",
            "L3:",
        ];
        assert_eq!(eliminated(&lines), lines);
    }

    #[test]
    fn test_keeps_values_used_across_back_edge() {
        let lines = [
            "s = 0",
            "i = 0",
            "L1:",
            "t1 = i < 3",
            "if t1 goto L2",
            "goto L3",
            "L2:",
            "t2 = s + i",
            "s = t2",
            "t3 = i + 1",
            "i = t3",
            "goto L1",
            "L3:",
            "RETURN s",
        ];
        assert_eq!(eliminated(&lines), lines);
    }

    #[test]
    fn test_calls_are_kept() {
        assert_eq!(
            eliminated(&["PARAM 1", "t1 = CALL f 1", "RETURN"]),
            ["PARAM 1", "t1 = CALL f 1", "RETURN"]
        );
    }

    #[test]
    fn test_no_dangling_jumps() {
        let code = instrs(&[
            "f() BEGIN",
            "x = 1",
            "if c goto L1",
            "goto L2",
            "L1:",
            "y = 2",
            "L2:",
            "L3:",
            "RETURN",
            "f() END",
        ]);
        let out = eliminate_dead_code(&code);
        let labels: HashSet<&str> = out.iter().filter_map(Instr::as_label).collect();
        for target in out.iter().filter_map(Instr::jump_target) {
            assert!(labels.contains(target), "dangling jump to {target}");
        }
        assert_eq!(
            ir::listing(&out),
            ["f() BEGIN", "if c goto L1", "goto L2", "L1:", "L2:", "L3:", "RETURN", "f() END"]
        );
    }

    #[test]
    fn test_restore_missing_label() {
        let original = instrs(&["goto L1", "x = 1", "L1:", "RETURN x"]);
        let mut out = instrs(&["goto L1", "x = 1", "RETURN x"]);
        restore_labels(&original, &mut out);
        assert_eq!(ir::listing(&out), ["goto L1", "x = 1", "L1:", "RETURN x"]);
    }

    #[test]
    fn test_labels_after_end_move_back() {
        let mut out = instrs(&["f() BEGIN", "goto L1", "f() END", "L1:", "L9:", "goto L9"]);
        move_trailing_labels(&mut out);
        assert_eq!(
            ir::listing(&out),
            ["f() BEGIN", "goto L1", "L1:", "f() END", "L9:", "goto L9"]
        );
    }
}
