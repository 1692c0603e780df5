use thiserror::Error;

use crate::ir::instruction::Instruction;
use crate::ir::prototype::Opcode;

#[derive(Debug, Error)]
#[error("stack-check error: {message}")]
pub struct StackCheckError {
    pub message: String,
}

impl StackCheckError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Returns (pops, pushes) for an instruction, or None if the effect depends
/// on a call target.
fn effect(insn: &Instruction) -> Option<(usize, usize)> {
    match insn.opcode() {
        // the counter floats above the stack; a case body starts below it
        Opcode::FsmCase => Some((1, 0)),
        Opcode::FsmCall => Some((0, 2)),
        _ => insn.prototype().stack_effect(),
    }
}

/// Check stack effects with a given initial stack height.
///
/// This is a linear scan that does not follow jumps, labels or fsm cases.
/// Returns the final height, or the height at the first instruction whose
/// effect is unknown.
pub fn check_with_initial(
    insns: &[Instruction],
    initial_height: usize,
) -> Result<usize, StackCheckError> {
    let mut h = initial_height;

    for (ip, insn) in insns.iter().enumerate() {
        match effect(insn) {
            Some((pops, pushes)) => {
                h = h.checked_sub(pops).ok_or_else(|| {
                    StackCheckError::new(format!(
                        "stack underflow at ip={}, insn={}, needed {} items",
                        ip, insn, pops
                    ))
                })?;
                h += pushes;
            }
            None => {
                // From here on the height is unknown.
                return Ok(h);
            }
        }
    }

    Ok(h)
}

/// Check stack effects starting from an empty stack.
pub fn check(insns: &[Instruction]) -> Result<usize, StackCheckError> {
    check_with_initial(insns, 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::parse_listing;

    #[test]
    fn test_simple_ops() {
        let insns = parse_listing("pushInt[1]; pushInt[2]; add[]").unwrap();
        assert_eq!(check(&insns).unwrap(), 1);
    }

    #[test]
    fn test_underflow() {
        let insns = parse_listing("add[]").unwrap();
        let result = check(&insns);
        assert!(result.unwrap_err().message.contains("underflow"));
    }

    #[test]
    fn test_builtin_print() {
        let insns = parse_listing("pushInt[72]; printChar[]; popInt[]").unwrap();
        assert_eq!(check(&insns).unwrap(), 0);
    }

    #[test]
    fn test_jump_if_pops_condition() {
        let insns = parse_listing("readChar[]; jumpIf[0]; label[0]").unwrap();
        assert_eq!(check(&insns).unwrap(), 0);

        let insns = parse_listing("jumpIf[0]").unwrap();
        assert!(check(&insns).is_err());
    }

    #[test]
    fn test_locals() {
        let insns = parse_listing("pushInt[5]; writeLocal[4,1]; readLocal[4,1]; dupInt[]").unwrap();
        assert_eq!(check(&insns).unwrap(), 2);
    }

    #[test]
    fn test_invoke_stops_analysis() {
        let insns = parse_listing("pushInt[1]; invoke[0]; add[]").unwrap();
        assert_eq!(check(&insns).unwrap(), 1);
    }

    #[test]
    fn test_fsm_skeleton() {
        let insns =
            parse_listing("fsmBegin[1]; fsmCase[]; readChar[]; fsmIf[1,2]; fsmEnd[]").unwrap();
        assert_eq!(check(&insns).unwrap(), 0);
    }
}
