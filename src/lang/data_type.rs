use serde::{Deserialize, Serialize};

// =============================================================================
// DATA TYPES - value types known to the compiler
// =============================================================================

/// A value type.
///
/// Every type owns the tape macros needed to step over one value of that type
/// inside the heap region. Heap slots are packed one cell each, so these are
/// raw tape moves and the code writer emits them as they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DataType {
    Void,
    Int,
    LaxBool,
    Bool,
    Fsm,
    String,
}

impl DataType {
    /// All types, indexed by id.
    pub const ALL: [DataType; 6] = [
        DataType::Void,
        DataType::Int,
        DataType::LaxBool,
        DataType::Bool,
        DataType::Fsm,
        DataType::String,
    ];

    pub fn id(self) -> i32 {
        self as i32
    }

    pub fn from_id(id: i32) -> Option<DataType> {
        usize::try_from(id)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
    }

    pub fn name(self) -> &'static str {
        match self {
            DataType::Void => "void",
            DataType::Int => "int",
            DataType::LaxBool => "lbool",
            DataType::Bool => "bool",
            DataType::Fsm => "fsm",
            DataType::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<DataType> {
        Self::ALL.iter().copied().find(|t| t.name() == name)
    }

    /// Moves from this slot towards the next slot further away from the stack.
    pub fn move_left(self) -> Option<&'static str> {
        match self {
            DataType::Void => None,
            DataType::Int | DataType::LaxBool | DataType::Bool | DataType::Fsm => Some("<"),
            DataType::String => Some("<[<]<"),
        }
    }

    /// Inverse of [`DataType::move_left`].
    pub fn move_right(self) -> Option<&'static str> {
        match self {
            DataType::Void => None,
            DataType::Int | DataType::LaxBool | DataType::Bool | DataType::Fsm => Some(">"),
            DataType::String => Some(">>[>]"),
        }
    }

    /// Zeroes one value of this type in place.
    pub fn clear(self) -> Option<&'static str> {
        match self {
            DataType::Void => None,
            DataType::Int | DataType::LaxBool | DataType::Bool | DataType::Fsm => Some("[-]"),
            DataType::String => Some("[[-]<]"),
        }
    }

    /// A type can live in a heap slot only if the writer can walk over it.
    pub fn is_heap_storable(self) -> bool {
        self.move_left().is_some() && self.move_right().is_some()
    }

    /// Whether a value of type `self` may be consumed where `expected` is declared.
    ///
    /// Every single-cell type is accepted as a lax boolean.
    pub fn accepts_as(self, expected: DataType) -> bool {
        self == expected
            || (expected == DataType::LaxBool
                && matches!(self, DataType::Int | DataType::Bool | DataType::LaxBool))
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
