//! Definedness lattice
//!
//! Three states per value:
//! - Defined = statically known to be a present tensor
//! - Undefined = statically known to be absent
//! - Unknown (⊤) = could be either; the conservative answer

use crate::ir::{Graph, Type, ValueId};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Definedness {
    Defined,
    Undefined,
    Unknown,
}

impl Definedness {
    /// Join (least upper bound): equal states are kept, anything else is Unknown
    pub fn join(self, other: Definedness) -> Definedness {
        if self == other {
            self
        } else {
            Definedness::Unknown
        }
    }

    /// Seed a state from a static type. The undefined tensor is also a
    /// `Dynamic`, so it has to be checked first.
    pub fn of_type(ty: &Type) -> Definedness {
        if ty.is_subtype_of(&Type::UndefinedTensor) {
            Definedness::Undefined
        } else if ty.is_subtype_of(&Type::Dynamic) {
            Definedness::Defined
        } else {
            Definedness::Unknown
        }
    }

    pub fn is_resolved(self) -> bool {
        self != Definedness::Unknown
    }
}

impl fmt::Display for Definedness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Definedness::Defined => "defined",
            Definedness::Undefined => "undefined",
            Definedness::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Per-value definedness for a single pass run. Values without an entry
/// read as Unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateMap {
    states: HashMap<ValueId, Definedness>,
}

impl StateMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed every graph input from its declared type
    pub fn seed_from_inputs(graph: &Graph) -> Self {
        let mut map = Self::new();
        for &input in graph.inputs() {
            map.set(input, Definedness::of_type(graph.value(input).ty()));
        }
        map
    }

    pub fn get(&self, value: ValueId) -> Definedness {
        self.states.get(&value).copied().unwrap_or(Definedness::Unknown)
    }

    pub fn set(&mut self, value: ValueId, state: Definedness) {
        self.states.insert(value, state);
    }

    pub fn contains(&self, value: ValueId) -> bool {
        self.states.contains_key(&value)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// True if the join of the states of `values` is Undefined; vacuously
    /// true for no values
    pub fn all_undefined(&self, values: &[ValueId]) -> bool {
        values
            .iter()
            .map(|&v| self.get(v))
            .reduce(Definedness::join)
            .is_none_or(|joined| joined == Definedness::Undefined)
    }
}
