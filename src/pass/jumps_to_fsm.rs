use std::collections::HashMap;

use tracing::{debug, trace};

use crate::ir::instruction::Instruction;
use crate::ir::prototype::Opcode;
use crate::pass::{CompilerPass, PassError};

/// Replaces labels and jumps with a single state machine.
///
/// The stream is cut into runs: a run starts at each `label` and after each
/// control transfer (`jump`, `jumpIf`, `invoke`, `return`). Every run becomes
/// one `fsmCase`, numbered from 1 in stream order; its leading label and
/// trailing transfer are replaced by the matching `fsm*` dispatch instruction.
/// A run that ends without a transfer falls through to the next case, and the
/// last case falls through to `count + 1`, which leaves the machine.
///
/// A stream without any jumps or labels is returned unchanged.
#[derive(Debug, Default)]
pub struct JumpsToFsmPass;

impl JumpsToFsmPass {
    pub fn new() -> Self {
        Self
    }
}

fn split_runs(insns: &[Instruction]) -> Vec<&[Instruction]> {
    let mut runs = Vec::new();
    let mut start = 0;
    for i in 1..insns.len() {
        let after_transfer = insns[i - 1].opcode().is_control_transfer();
        if after_transfer || insns[i].is(Opcode::Label) {
            runs.push(&insns[start..i]);
            start = i;
        }
    }
    if start < insns.len() {
        runs.push(&insns[start..]);
    }
    runs
}

fn ends_in_transfer(run: &[Instruction]) -> bool {
    run.last().is_some_and(|i| i.opcode().is_control_transfer())
}

impl CompilerPass for JumpsToFsmPass {
    fn name(&self) -> &'static str {
        "jumps-to-fsm"
    }

    fn run(&self, insns: &[Instruction]) -> Result<Vec<Instruction>, PassError> {
        let runs = split_runs(insns);
        match runs.as_slice() {
            [] => return Ok(insns.to_vec()),
            [only] if !ends_in_transfer(only) => return Ok(insns.to_vec()),
            _ => {}
        }

        let mut cases = HashMap::new();
        for (i, run) in runs.iter().enumerate() {
            let label = run.first().filter(|f| f.is(Opcode::Label)).and_then(|f| f.arg(0));
            if let Some(label) = label {
                cases.insert(label, i as i32 + 1);
            }
        }
        let case_of = |insn: &Instruction| -> Result<i32, PassError> {
            let label = insn.arg(0).unwrap_or_default();
            cases.get(&label).copied().ok_or(PassError::UnknownLabel(label))
        };

        let count = runs.len() as i32;
        debug!(cases = count, labels = cases.len(), "building fsm");

        let mut out = Vec::with_capacity(insns.len() + 2 * runs.len() + 2);
        out.push(Instruction::fsm_begin(count));
        for (i, run) in runs.iter().enumerate() {
            let current = i as i32 + 1;
            let body = match run.first() {
                Some(first) if first.is(Opcode::Label) => &run[1..],
                _ => run,
            };
            let (body, transfer) = match body.split_last() {
                Some((last, rest)) if last.opcode().is_control_transfer() => (rest, Some(last)),
                _ => (body, None),
            };

            out.push(Instruction::simple(Opcode::FsmCase));
            out.extend(body.iter().cloned());

            let dispatch = match transfer.map(|t| (t.opcode(), t)) {
                Some((Opcode::Return, _)) => Instruction::simple(Opcode::FsmReturn),
                Some((Opcode::Jump, t)) => Instruction::fsm_jmp(case_of(t)?),
                Some((Opcode::Invoke, t)) => Instruction::fsm_call(case_of(t)?),
                Some((Opcode::JumpIf, t)) => {
                    let (mut on_true, mut on_false) = (case_of(t)?, current + 1);
                    // not, jumpIf[a] is jumpIf with the targets swapped
                    if out.last().is_some_and(|l| l.is(Opcode::Not)) {
                        out.pop();
                        std::mem::swap(&mut on_true, &mut on_false);
                    }
                    Instruction::fsm_if(on_true, on_false)
                }
                _ => Instruction::fsm_jmp(current + 1),
            };
            trace!(case = current, dispatch = %dispatch, "case");
            out.push(dispatch);
        }
        out.push(Instruction::simple(Opcode::FsmEnd));
        Ok(out)
    }
}
