//! Addressing modes and the checker's constant-folding value model.
//!
//! Every expression the checker evaluates resolves to an [`Operand`]:
//! a type plus an [`AddressingMode`] classifying what kind of thing it
//! denotes (a runtime value, an addressable variable, a compile-time
//! constant, a bare type) and, for constants, the folded
//! [`ExactValue`].

use std::hash::{Hash, Hasher};

use crate::ast::NodeId;
use crate::types::TypeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressingMode {
    Invalid,
    /// A non-addressable runtime value (e.g. the result of `a + b`).
    Value,
    /// An addressable runtime value (a declared variable, a dereferenced
    /// pointer, a field/index of another addressable value).
    Variable,
    /// A compile-time constant; `Operand::value` holds the folded value.
    Constant,
    /// The operand names a type, not a value (only legal where a type
    /// expression is expected, e.g. `type_match` case heads).
    Type,
}

impl AddressingMode {
    pub fn is_value_like(self) -> bool {
        matches!(self, AddressingMode::Value | AddressingMode::Variable)
    }
}

/// A folded compile-time constant.
#[derive(Debug, Clone)]
pub enum ExactValue {
    Invalid,
    Bool(bool),
    Integer(i128),
    Float(f64),
    String(String),
    /// An address-of-static-storage constant (e.g. a string literal's
    /// backing storage or a `&global` constant expression).
    Pointer(u64),
    /// A compound literal constant (`Point{1, 2}`), stored by pointing
    /// back at the `CompoundLit` node that produced it; the checker
    /// never needs to fold struct contents element-by-element to
    /// compare two compound constants, only to detect duplicate case
    /// values, where node identity is sufficient.
    Compound(NodeId),
}

impl PartialEq for ExactValue {
    fn eq(&self, other: &Self) -> bool {
        use ExactValue::*;
        match (self, other) {
            (Invalid, Invalid) => true,
            (Bool(a), Bool(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Pointer(a), Pointer(b)) => a == b,
            (Compound(a), Compound(b)) => a == b,
            _ => false,
        }
    }
}
impl Eq for ExactValue {}

impl Hash for ExactValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            ExactValue::Invalid => {}
            ExactValue::Bool(b) => b.hash(state),
            ExactValue::Integer(i) => i.hash(state),
            ExactValue::Float(f) => f.to_bits().hash(state),
            ExactValue::String(s) => s.hash(state),
            ExactValue::Pointer(p) => p.hash(state),
            ExactValue::Compound(n) => n.hash(state),
        }
    }
}

/// The checker's universal "what does this expression denote" result.
#[derive(Debug, Clone)]
pub struct Operand {
    pub mode: AddressingMode,
    pub ty: TypeId,
    pub value: ExactValue,
    pub expr: NodeId,
}

impl Operand {
    pub fn invalid(ty: TypeId, expr: NodeId) -> Self {
        Operand {
            mode: AddressingMode::Invalid,
            ty,
            value: ExactValue::Invalid,
            expr,
        }
    }

    pub fn is_invalid(&self) -> bool {
        self.mode == AddressingMode::Invalid
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn float_exact_values_hash_by_bit_pattern() {
        use std::collections::hash_map::DefaultHasher;
        let h = |v: &ExactValue| {
            let mut hasher = DefaultHasher::new();
            v.hash(&mut hasher);
            hasher.finish()
        };
        let a = ExactValue::Float(1.5);
        let b = ExactValue::Float(1.5);
        assert_eq!(h(&a), h(&b));
        assert_eq!(a, b);
    }

    #[test]
    fn integer_and_float_exact_values_never_equal() {
        assert_ne!(ExactValue::Integer(1), ExactValue::Float(1.0));
    }

    #[test]
    fn value_like_excludes_constant_and_type() {
        assert!(AddressingMode::Value.is_value_like());
        assert!(AddressingMode::Variable.is_value_like());
        assert!(!AddressingMode::Constant.is_value_like());
        assert!(!AddressingMode::Type.is_value_like());
    }
}
