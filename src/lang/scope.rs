//! Lexical scopes, variables, functions and the per-compilation global scope.
//!
//! Scopes live in an arena owned by [`GlobalScope`] and refer to their parent
//! by index. A variable's heap slot is its position in the concatenation of
//! the variables of every scope from the root down to the scope declaring it,
//! so addressing is purely lexical: every activation of a function shares the
//! same physical slots.

use std::collections::BTreeMap;

use thiserror::Error;
use tracing::trace;

use crate::ir::instruction::Instruction;
use crate::ir::prototype::Opcode;
use crate::lang::data_type::DataType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct VarId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FuncId(usize);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScopeError {
    #[error("variable '{0}' is already declared")]
    DuplicateVariable(String),

    #[error("function '{0}' is already declared with the same parameters")]
    DuplicateFunction(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub ty: DataType,
    pub scope: ScopeId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Function {
    pub name: String,
    pub params: Vec<DataType>,
    pub return_type: DataType,
    /// Label id, assigned on declaration. Builtins have none.
    pub id: Option<i32>,
    pub body: Vec<Instruction>,
    pub is_builtin: bool,
}

impl Function {
    fn builtin(name: &str, return_type: DataType, params: &[DataType], body: &[Opcode]) -> Self {
        Function {
            name: name.to_string(),
            params: params.to_vec(),
            return_type,
            id: None,
            body: body.iter().map(|op| Instruction::simple(*op)).collect(),
            is_builtin: true,
        }
    }

    fn builtin_binary(name: &str, body: &[Opcode]) -> Self {
        Self::builtin(name, DataType::Int, &[DataType::Int, DataType::Int], body)
    }

    pub fn user(name: impl Into<String>, params: Vec<DataType>, return_type: DataType) -> Self {
        Function {
            name: name.into(),
            params,
            return_type,
            id: None,
            body: Vec::new(),
            is_builtin: false,
        }
    }
}

#[derive(Debug, Default)]
struct Scope {
    parent: Option<ScopeId>,
    variables: Vec<VarId>,
    functions: Vec<FuncId>,
}

/// Per-compilation owner of every scope, variable and function.
#[derive(Debug)]
pub struct GlobalScope {
    scopes: Vec<Scope>,
    variables: Vec<Variable>,
    functions: Vec<Function>,
    functions_by_id: BTreeMap<i32, FuncId>,
    next_label_id: i32,
    return_address: VarId,
}

impl GlobalScope {
    /// Builds the root scope with the builtins and the return-address cell.
    pub fn generate() -> Self {
        let mut global = GlobalScope {
            scopes: vec![Scope::default()],
            variables: Vec::new(),
            functions: Vec::new(),
            functions_by_id: BTreeMap::new(),
            next_label_id: 0,
            return_address: VarId(0),
        };

        let root = global.root();
        let builtins = [
            Function::builtin("print", DataType::Void, &[DataType::Int], &[
                Opcode::PrintChar,
                Opcode::PopInt,
            ]),
            Function::builtin("read", DataType::Int, &[], &[Opcode::ReadChar]),
            Function::builtin("printNumber", DataType::Void, &[DataType::Int], &[
                Opcode::PrintInt,
                Opcode::PopInt,
            ]),
            Function::builtin_binary("==", &[Opcode::Sub, Opcode::Not]),
            Function::builtin_binary(">", &[Opcode::Greater]),
            Function::builtin_binary("+", &[Opcode::Add]),
            Function::builtin_binary("-", &[Opcode::Sub]),
            Function::builtin_binary("*", &[Opcode::Mul]),
            Function::builtin_binary("/", &[Opcode::Div]),
            Function::builtin_binary("=", &[]),
        ];
        for f in builtins {
            let id = FuncId(global.functions.len());
            global.functions.push(f);
            global.scopes[root.0].functions.push(id);
        }

        // readDigit() = readChar, pushInt '0', sub
        let read_digit = Function {
            body: vec![
                Instruction::simple(Opcode::ReadChar),
                Instruction::push_int(i32::from(b'0')),
                Instruction::simple(Opcode::Sub),
            ],
            ..Function::builtin("readDigit", DataType::Int, &[], &[])
        };
        let id = FuncId(global.functions.len());
        global.functions.push(read_digit);
        global.scopes[root.0].functions.push(id);

        let ret = VarId(global.variables.len());
        global.variables.push(Variable {
            name: "<return_address>".to_string(),
            ty: DataType::Fsm,
            scope: root,
        });
        global.scopes[root.0].variables.push(ret);
        global.return_address = ret;

        global
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn new_scope(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            ..Scope::default()
        });
        id
    }

    pub fn parent(&self, scope: ScopeId) -> Option<ScopeId> {
        self.scopes[scope.0].parent
    }

    pub fn next_label_id(&mut self) -> i32 {
        let id = self.next_label_id;
        self.next_label_id += 1;
        trace!(label = id, "allocated label");
        id
    }

    /// The first label id not handed out yet.
    pub fn peek_label_id(&self) -> i32 {
        self.next_label_id
    }

    pub fn return_address(&self) -> VarId {
        self.return_address
    }

    // ==========================================================================
    // Variables
    // ==========================================================================

    /// Declares a variable. Shadowing a visible variable is an error too.
    pub fn declare_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        ty: DataType,
    ) -> Result<VarId, ScopeError> {
        if self.find_variable(scope, name).is_some() {
            return Err(ScopeError::DuplicateVariable(name.to_string()));
        }
        let id = VarId(self.variables.len());
        self.variables.push(Variable {
            name: name.to_string(),
            ty,
            scope,
        });
        self.scopes[scope.0].variables.push(id);
        Ok(id)
    }

    pub fn find_variable(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        self.ancestors(scope).find_map(|s| {
            self.scopes[s.0]
                .variables
                .iter()
                .copied()
                .find(|v| self.variables[v.0].name == name)
        })
    }

    pub fn variable(&self, var: VarId) -> &Variable {
        &self.variables[var.0]
    }

    /// Variables visible from `scope`, root scope first, in declaration order.
    pub fn heap_variables(&self, scope: ScopeId) -> Vec<VarId> {
        let mut chain: Vec<ScopeId> = self.ancestors(scope).collect();
        chain.reverse();
        chain
            .into_iter()
            .flat_map(|s| self.scopes[s.0].variables.iter().copied())
            .collect()
    }

    /// Heap slot of `var`, or None if `var` is missing from its own scope.
    pub fn heap_index_of(&self, var: VarId) -> Option<usize> {
        let declaring = self.variables[var.0].scope;
        self.heap_variables(declaring).iter().position(|v| *v == var)
    }

    /// Types of slots `0..=heap_index_of(var)`, as carried by the locals
    /// instructions.
    pub fn heap_layout(&self, var: VarId) -> Option<Vec<DataType>> {
        let declaring = self.variables[var.0].scope;
        let visible = self.heap_variables(declaring);
        let index = visible.iter().position(|v| *v == var)?;
        Some(visible[..=index].iter().map(|v| self.variables[v.0].ty).collect())
    }

    // ==========================================================================
    // Functions
    // ==========================================================================

    /// Declares a user function and assigns its label id.
    pub fn declare_function(
        &mut self,
        scope: ScopeId,
        mut function: Function,
    ) -> Result<FuncId, ScopeError> {
        let clash = self.scopes[scope.0].functions.iter().any(|f| {
            let other = &self.functions[f.0];
            other.name == function.name && other.params == function.params
        });
        if clash {
            return Err(ScopeError::DuplicateFunction(function.name));
        }

        let label = self.next_label_id();
        function.id = Some(label);
        let id = FuncId(self.functions.len());
        self.functions.push(function);
        self.scopes[scope.0].functions.push(id);
        self.functions_by_id.insert(label, id);
        Ok(id)
    }

    /// Finds a function by name and argument types, innermost scope first.
    pub fn find_function(&self, scope: ScopeId, name: &str, args: &[DataType]) -> Option<FuncId> {
        self.ancestors(scope).find_map(|s| {
            self.scopes[s.0].functions.iter().copied().find(|f| {
                let function = &self.functions[f.0];
                function.name == name
                    && function.params.len() == args.len()
                    && args
                        .iter()
                        .zip(&function.params)
                        .all(|(arg, param)| arg.accepts_as(*param))
            })
        })
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.0]
    }

    pub fn function_by_label(&self, label: i32) -> Option<&Function> {
        self.functions_by_id.get(&label).map(|f| &self.functions[f.0])
    }

    fn ancestors(&self, scope: ScopeId) -> impl Iterator<Item = ScopeId> + '_ {
        std::iter::successors(Some(scope), |s| self.scopes[s.0].parent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_return_address_is_slot_zero() {
        let global = GlobalScope::generate();
        let ret = global.return_address();
        assert_eq!(global.heap_index_of(ret), Some(0));
        assert_eq!(global.heap_layout(ret), Some(vec![DataType::Fsm]));
    }

    #[test]
    fn test_heap_index_concatenates_root_first() {
        let mut global = GlobalScope::generate();
        let main = global.new_scope(global.root());
        let a = global.declare_variable(main, "a", DataType::Int).unwrap();
        let inner = global.new_scope(main);
        let b = global.declare_variable(inner, "b", DataType::Int).unwrap();
        let c = global.declare_variable(main, "c", DataType::Int).unwrap();

        assert_eq!(global.heap_index_of(a), Some(1));
        assert_eq!(global.heap_index_of(c), Some(2));
        // outer declarations come first, whenever they were made
        assert_eq!(global.heap_index_of(b), Some(3));
        assert_eq!(
            global.heap_layout(b),
            Some(vec![DataType::Fsm, DataType::Int, DataType::Int, DataType::Int])
        );
    }

    #[test]
    fn test_detached_variable_has_no_slot() {
        let mut global = GlobalScope::generate();
        let main = global.new_scope(global.root());
        let stray = VarId(global.variables.len());
        global.variables.push(Variable {
            name: "stray".to_string(),
            ty: DataType::Int,
            scope: main,
        });
        assert_eq!(global.heap_index_of(stray), None);
        assert_eq!(global.heap_layout(stray), None);
    }

    #[test]
    fn test_sibling_scopes_share_slots() {
        let mut global = GlobalScope::generate();
        let main = global.new_scope(global.root());
        let left = global.new_scope(main);
        let right = global.new_scope(main);
        let x = global.declare_variable(left, "x", DataType::Int).unwrap();
        let y = global.declare_variable(right, "y", DataType::Int).unwrap();
        assert_eq!(global.heap_index_of(x), global.heap_index_of(y));
    }

    #[test]
    fn test_duplicate_and_shadowing_rejected() {
        let mut global = GlobalScope::generate();
        let main = global.new_scope(global.root());
        global.declare_variable(main, "a", DataType::Int).unwrap();
        assert_eq!(
            global.declare_variable(main, "a", DataType::Int),
            Err(ScopeError::DuplicateVariable("a".to_string()))
        );
        let inner = global.new_scope(main);
        assert!(global.declare_variable(inner, "a", DataType::Int).is_err());
    }

    #[test]
    fn test_find_variable_walks_up() {
        let mut global = GlobalScope::generate();
        let main = global.new_scope(global.root());
        let a = global.declare_variable(main, "a", DataType::Int).unwrap();
        let inner = global.new_scope(main);
        assert_eq!(global.find_variable(inner, "a"), Some(a));
        assert_eq!(global.find_variable(main, "missing"), None);
    }

    #[test]
    fn test_function_labels_are_sequential() {
        let mut global = GlobalScope::generate();
        let main = global.new_scope(global.root());
        let f = global
            .declare_function(main, Function::user("f", vec![], DataType::Void))
            .unwrap();
        let g = global
            .declare_function(main, Function::user("g", vec![DataType::Int], DataType::Int))
            .unwrap();
        assert_eq!(global.function(f).id, Some(0));
        assert_eq!(global.function(g).id, Some(1));
        assert_eq!(global.next_label_id(), 2);
        assert_eq!(global.function_by_label(1).map(|f| f.name.as_str()), Some("g"));
    }

    #[test]
    fn test_find_function_by_signature() {
        let mut global = GlobalScope::generate();
        let main = global.new_scope(global.root());
        assert!(global.find_function(main, "print", &[DataType::Int]).is_some());
        assert!(global.find_function(main, "print", &[]).is_none());
        assert!(global.find_function(main, "+", &[DataType::Int, DataType::Int]).is_some());

        let f = global
            .declare_function(main, Function::user("f", vec![DataType::Int], DataType::Int))
            .unwrap();
        assert_eq!(global.find_function(main, "f", &[DataType::Int]), Some(f));
        assert!(
            global
                .declare_function(main, Function::user("f", vec![DataType::Int], DataType::Void))
                .is_err()
        );
    }

    #[test]
    fn test_builtin_bodies() {
        let global = GlobalScope::generate();
        let root = global.root();
        let eq = global
            .find_function(root, "==", &[DataType::Int, DataType::Int])
            .unwrap();
        assert!(global.function(eq).is_builtin);
        assert_eq!(
            global.function(eq).body,
            vec![Instruction::simple(Opcode::Sub), Instruction::simple(Opcode::Not)]
        );
        let digit = global.find_function(root, "readDigit", &[]).unwrap();
        assert_eq!(global.function(digit).body.len(), 3);
    }
}
