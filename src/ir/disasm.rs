use std::collections::HashMap;

use crate::ir::instruction::Instruction;
use crate::ir::program::ProgramIr;
use crate::ir::prototype::Opcode;

/// Print disassembly of a front-end program (main plus function table)
pub fn print_program(program: &ProgramIr) {
    println!("=== IR PROGRAM ===\n");

    print_block("main", &program.main);
    for (id, body) in &program.functions {
        print_block(&format!("function #{}", id), body);
    }
}

/// Print a lowered instruction stream
pub fn print_lowered(insns: &[Instruction]) {
    println!("=== LOWERED IR ===\n");
    print_block("program", insns);
}

fn print_block(name: &str, insns: &[Instruction]) {
    println!("════════════════════════════════════════");
    println!(" {}", name);
    println!(" {} instructions", insns.len());
    println!("════════════════════════════════════════");
    print!("{}", disassemble_to_string(insns));
    println!();
}

// =============================================================================
// String output (for testing/logging)
// =============================================================================

/// Return disassembly as a String.
///
/// Labels open a marked section; inside an fsm every case is numbered and its
/// body indented, so `fsmJmp`/`fsmIf` targets can be read off directly.
pub fn disassemble_to_string(insns: &[Instruction]) -> String {
    let mut output = String::new();
    let mut case_numbers: Vec<i32> = Vec::new();

    for (ip, insn) in insns.iter().enumerate() {
        let depth = case_numbers.len();
        match insn.opcode() {
            Opcode::Label => {
                output.push_str("      ┌──────────────────────────────────\n");
                output.push_str(&format!("{:04} ► {}\n", ip, insn));
            }
            Opcode::FsmBegin => {
                output.push_str(&format!("{:04}   {}{}\n", ip, indent(depth), insn));
                case_numbers.push(0);
            }
            Opcode::FsmCase => {
                if let Some(case) = case_numbers.last_mut() {
                    *case += 1;
                    output.push_str(&format!(
                        "{:04}   {}{}  ; case {}\n",
                        ip,
                        indent(depth - 1),
                        insn,
                        case
                    ));
                } else {
                    output.push_str(&format!("{:04}   {}\n", ip, insn));
                }
            }
            Opcode::FsmEnd => {
                case_numbers.pop();
                output.push_str(&format!(
                    "{:04}   {}{}\n",
                    ip,
                    indent(depth.saturating_sub(1)),
                    insn
                ));
            }
            _ => {
                output.push_str(&format!("{:04}   {}{}\n", ip, indent(depth), insn));
            }
        }
    }

    output
}

fn indent(depth: usize) -> String {
    "  ".repeat(depth * 2)
}

// =============================================================================
// Statistics
// =============================================================================

/// Print instruction statistics
pub fn print_stats(insns: &[Instruction]) {
    println!("=== IR STATISTICS ===\n");
    println!("Instructions: {}", insns.len());
    println!();

    let mut counts: Vec<(&str, usize)> = count_opcodes(insns).into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    println!("Opcode frequency:");
    for (name, count) in counts.iter().take(10) {
        let pct = (*count as f64 / insns.len().max(1) as f64) * 100.0;
        println!("  {:<14} {:>4} ({:>5.1}%)", name, count, pct);
    }
}

fn count_opcodes(insns: &[Instruction]) -> HashMap<&'static str, usize> {
    let mut counts = HashMap::new();
    for insn in insns {
        *counts.entry(insn.opcode().name()).or_insert(0) += 1;
    }
    counts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::parse_listing;

    #[test]
    fn test_label_marker() {
        let insns = parse_listing("jump[0]; label[0]; nop[]").unwrap();
        let text = disassemble_to_string(&insns);
        assert!(text.contains("0001 ► label[0]"));
        assert!(text.contains("┌"));
    }

    #[test]
    fn test_fsm_cases_are_numbered() {
        let insns = parse_listing(
            "fsmBegin[2]; fsmCase[]; readChar[]; fsmIf[2,3]; fsmCase[]; nop[]; fsmJmp[3]; fsmEnd[]",
        )
        .unwrap();
        let text = disassemble_to_string(&insns);
        assert!(text.contains("fsmCase[]  ; case 1"));
        assert!(text.contains("fsmCase[]  ; case 2"));
        assert!(text.contains("0002       readChar[]"));
        assert!(text.contains("0007   fsmEnd[]"));
    }

    #[test]
    fn test_opcode_counts() {
        let insns = parse_listing("pushInt[1]; pushInt[2]; add[]").unwrap();
        let counts = count_opcodes(&insns);
        assert_eq!(counts.get("pushInt"), Some(&2));
        assert_eq!(counts.get("add"), Some(&1));
    }
}
