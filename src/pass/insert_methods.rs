use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::debug;

use crate::ir::instruction::Instruction;
use crate::ir::prototype::Opcode;
use crate::pass::{CompilerPass, PassError};

/// Appends the body of every reachable function to the main stream.
///
/// ```text
/// main ; jump[end] ; label[f1] ; f1 body ; label[f2] ; f2 body ; label[end]
/// ```
///
/// Functions are laid out in breadth-first order of discovery starting from
/// main, each at most once. `end_label` must be a label id not used anywhere
/// else; the driver takes it from [`ProgramIr::next_label`].
///
/// [`ProgramIr::next_label`]: crate::ir::program::ProgramIr
pub struct InsertMethodsPass<'a> {
    functions: &'a BTreeMap<i32, Vec<Instruction>>,
    end_label: i32,
}

impl<'a> InsertMethodsPass<'a> {
    pub fn new(functions: &'a BTreeMap<i32, Vec<Instruction>>, end_label: i32) -> Self {
        Self {
            functions,
            end_label,
        }
    }

    fn body(&self, id: i32) -> Result<&'a [Instruction], PassError> {
        self.functions
            .get(&id)
            .map(Vec::as_slice)
            .ok_or(PassError::UnknownFunction(id))
    }
}

/// Enqueues the targets of `invoke` not seen before.
fn discover(insns: &[Instruction], seen: &mut BTreeSet<i32>, queue: &mut VecDeque<i32>) {
    for insn in insns.iter().filter(|i| i.is(Opcode::Invoke)) {
        if let Some(id) = insn.arg(0) {
            if seen.insert(id) {
                queue.push_back(id);
            }
        }
    }
}

impl CompilerPass for InsertMethodsPass<'_> {
    fn name(&self) -> &'static str {
        "insert-methods"
    }

    fn run(&self, insns: &[Instruction]) -> Result<Vec<Instruction>, PassError> {
        let mut seen = BTreeSet::new();
        let mut queue = VecDeque::new();
        discover(insns, &mut seen, &mut queue);

        if queue.is_empty() {
            return Ok(insns.to_vec());
        }

        let mut out = insns.to_vec();
        out.push(Instruction::jump(self.end_label));

        while let Some(id) = queue.pop_front() {
            let body = self.body(id)?;
            debug!(function = id, instructions = body.len(), "inserting function");
            out.push(Instruction::label(id));
            out.extend(body.iter().cloned());
            discover(body, &mut seen, &mut queue);
        }

        out.push(Instruction::label(self.end_label));
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::instruction::listing_to_string;

    fn ret() -> Instruction {
        Instruction::simple(Opcode::Return)
    }

    fn assert_pass(
        functions: &[(i32, Vec<Instruction>)],
        end: i32,
        input: &[Instruction],
        expected: &[Instruction],
    ) {
        let table: BTreeMap<i32, Vec<Instruction>> = functions.iter().cloned().collect();
        let actual = InsertMethodsPass::new(&table, end).run(input).unwrap();
        assert_eq!(
            actual,
            expected,
            "\ninput    = {}\nexpected = {}\nactual   = {}",
            listing_to_string(input),
            listing_to_string(expected),
            listing_to_string(&actual)
        );
    }

    #[test]
    fn test_empty() {
        assert_pass(&[], 0, &[], &[]);
    }

    #[test]
    fn test_no_call() {
        assert_pass(&[], 0, &[Instruction::nop(777)], &[Instruction::nop(777)]);
    }

    #[test]
    fn test_call() {
        let f = vec![Instruction::nop(333), ret()];
        assert_pass(
            &[(0, f)],
            1,
            &[Instruction::nop(111), Instruction::invoke(0), Instruction::nop(222)],
            &[
                Instruction::nop(111),
                Instruction::invoke(0),
                Instruction::nop(222),
                Instruction::jump(1),
                Instruction::label(0),
                Instruction::nop(333),
                ret(),
                Instruction::label(1),
            ],
        );
    }

    #[test]
    fn test_recursive_call() {
        let f = vec![Instruction::nop(333), Instruction::invoke(0), Instruction::nop(444), ret()];
        assert_pass(
            &[(0, f)],
            1,
            &[Instruction::nop(111), Instruction::invoke(0), Instruction::nop(222)],
            &[
                Instruction::nop(111),
                Instruction::invoke(0),
                Instruction::nop(222),
                Instruction::jump(1),
                Instruction::label(0),
                Instruction::nop(333),
                Instruction::invoke(0),
                Instruction::nop(444),
                ret(),
                Instruction::label(1),
            ],
        );
    }

    #[test]
    fn test_indirect_call() {
        let f1 = vec![Instruction::nop(111), Instruction::invoke(1), Instruction::nop(222), ret()];
        let f2 = vec![Instruction::nop(333), ret()];
        assert_pass(
            &[(0, f1), (1, f2)],
            2,
            &[Instruction::nop(444), Instruction::invoke(0), Instruction::nop(555)],
            &[
                Instruction::nop(444),
                Instruction::invoke(0),
                Instruction::nop(555),
                Instruction::jump(2),
                Instruction::label(0),
                Instruction::nop(111),
                Instruction::invoke(1),
                Instruction::nop(222),
                ret(),
                Instruction::label(1),
                Instruction::nop(333),
                ret(),
                Instruction::label(2),
            ],
        );
    }

    #[test]
    fn test_indirect_recursion() {
        let f1 = vec![Instruction::nop(111), Instruction::invoke(1), Instruction::nop(222), ret()];
        let f2 = vec![Instruction::nop(333), Instruction::invoke(0), Instruction::nop(444), ret()];
        assert_pass(
            &[(0, f1), (1, f2)],
            2,
            &[Instruction::nop(555), Instruction::invoke(0), Instruction::nop(666)],
            &[
                Instruction::nop(555),
                Instruction::invoke(0),
                Instruction::nop(666),
                Instruction::jump(2),
                Instruction::label(0),
                Instruction::nop(111),
                Instruction::invoke(1),
                Instruction::nop(222),
                ret(),
                Instruction::label(1),
                Instruction::nop(333),
                Instruction::invoke(0),
                Instruction::nop(444),
                ret(),
                Instruction::label(2),
            ],
        );
    }

    #[test]
    fn test_each_function_inserted_once() {
        let f = vec![ret()];
        let g = vec![Instruction::nop(1), ret()];
        let table: BTreeMap<i32, Vec<Instruction>> = [(0, f), (1, g)].into_iter().collect();
        let main = [Instruction::invoke(0), Instruction::invoke(0), Instruction::invoke(0)];
        let out = InsertMethodsPass::new(&table, 2).run(&main).unwrap();

        let labels: Vec<i32> = out
            .iter()
            .filter(|i| i.is(Opcode::Label))
            .filter_map(|i| i.arg(0))
            .collect();
        assert_eq!(labels, vec![0, 2]);
        assert!(!out.contains(&Instruction::nop(1)));
        assert_eq!(out[3], Instruction::jump(2));
    }

    #[test]
    fn test_unknown_function() {
        let table = BTreeMap::new();
        let err = InsertMethodsPass::new(&table, 1)
            .run(&[Instruction::invoke(5)])
            .unwrap_err();
        assert_eq!(err, PassError::UnknownFunction(5));
    }
}
