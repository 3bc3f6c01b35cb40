//! Static value types
//!
//! Only as much of a type system as definedness seeding needs: the generic
//! tensor type, refined tensors, the structurally-absent tensor, and the
//! scalar/container types that show up as graph inputs.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Element type of a refined tensor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    Float,
    Double,
    Half,
    Int,
    Long,
    Bool,
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ScalarType::Float => "Float",
            ScalarType::Double => "Double",
            ScalarType::Half => "Half",
            ScalarType::Int => "Int",
            ScalarType::Long => "Long",
            ScalarType::Bool => "Bool",
        };
        f.write_str(name)
    }
}

/// A tensor with (partially) known properties
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TensorType {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scalar: Option<ScalarType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sizes: Option<Vec<i64>>,
}

impl TensorType {
    pub fn new(scalar: ScalarType, sizes: Vec<i64>) -> Self {
        Self {
            scalar: Some(scalar),
            sizes: Some(sizes),
        }
    }
}

/// Static type of a value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Type {
    /// Any tensor; nothing else is known about it
    Dynamic,
    /// A tensor with known scalar type and/or sizes
    Tensor(TensorType),
    /// A tensor that is statically known to be absent
    UndefinedTensor,
    Int,
    Float,
    Bool,
    Str,
    NoneType,
    Optional(Box<Type>),
    List(Box<Type>),
    Tuple(Vec<Type>),
}

impl Type {
    /// Subtyping: reflexive, refined tensors and the undefined tensor sit
    /// below `Dynamic`, `Optional` admits its element and `None`, containers
    /// are covariant.
    pub fn is_subtype_of(&self, other: &Type) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Type::Tensor(_) | Type::UndefinedTensor, Type::Dynamic) => true,
            (Type::NoneType, Type::Optional(_)) => true,
            (Type::Optional(inner), Type::Optional(other_inner)) => inner.is_subtype_of(other_inner),
            (t, Type::Optional(inner)) => t.is_subtype_of(inner),
            (Type::List(e1), Type::List(e2)) => e1.is_subtype_of(e2),
            (Type::Tuple(ts1), Type::Tuple(ts2)) => {
                ts1.len() == ts2.len() && ts1.iter().zip(ts2).all(|(t1, t2)| t1.is_subtype_of(t2))
            }
            _ => false,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Dynamic => f.write_str("Dynamic"),
            Type::Tensor(t) => {
                match t.scalar {
                    Some(scalar) => write!(f, "{scalar}")?,
                    None => f.write_str("Tensor")?,
                }
                if let Some(sizes) = &t.sizes {
                    let dims: Vec<String> = sizes.iter().map(|d| d.to_string()).collect();
                    write!(f, "({})", dims.join(", "))?;
                }
                Ok(())
            }
            Type::UndefinedTensor => f.write_str("UndefinedTensor"),
            Type::Int => f.write_str("int"),
            Type::Float => f.write_str("float"),
            Type::Bool => f.write_str("bool"),
            Type::Str => f.write_str("str"),
            Type::NoneType => f.write_str("None"),
            Type::Optional(inner) => write!(f, "{inner}?"),
            Type::List(inner) => write!(f, "{inner}[]"),
            Type::Tuple(elems) => {
                let parts: Vec<String> = elems.iter().map(|t| t.to_string()).collect();
                write!(f, "({})", parts.join(", "))
            }
        }
    }
}
