//! Type system: representation, interning and the ~5%-budget type
//! utilities (base-type unwrap, pointer deref, classification
//! predicates, field lookup/offset/size/align).
//!
//! Types are interned into a [`TypeInterner`] and referenced by
//! [`TypeId`], following this workspace's design-notes guidance to
//! "implement with identity indices into a typed arena" rather than
//! `Rc`/`Weak` back-references. `Named` types compare nominally (two
//! separate `type Foo :: struct{}` declarations are distinct types
//! even if structurally identical); every other type kind compares
//! structurally, matching a structurally-typed language's rules for
//! pointers/arrays/slices/tuples/procs.

use std::collections::HashMap;

/// An interned type. Copy, so it can be carried around cheaply in
/// `Operand`s and AST type-and-value caches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(pub u32);

/// A field of a struct, tagged union, or raw union. Source-order index
/// is `field_index`; for unions this doubles as the discriminant of
/// the variant the field constitutes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub name: String,
    pub ty: TypeId,
    pub field_index: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicKind {
    Bool,
    I8,
    I16,
    I32,
    I64,
    Int,
    U8,
    U16,
    U32,
    U64,
    Uint,
    F32,
    F64,
    RawPtr,
    String,
    Any,
}

impl BasicKind {
    pub fn is_integer(self) -> bool {
        matches!(
            self,
            BasicKind::I8
                | BasicKind::I16
                | BasicKind::I32
                | BasicKind::I64
                | BasicKind::Int
                | BasicKind::U8
                | BasicKind::U16
                | BasicKind::U32
                | BasicKind::U64
                | BasicKind::Uint
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            BasicKind::U8 | BasicKind::U16 | BasicKind::U32 | BasicKind::U64 | BasicKind::Uint
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, BasicKind::F32 | BasicKind::F64)
    }

    /// Byte width, independent of any target profile (all basic kinds
    /// here are target-independent; `Int`/`Uint`/`RawPtr` are resolved
    /// to pointer width by the VM's `TargetSizes`, not here).
    pub fn fixed_size(self) -> Option<u32> {
        match self {
            BasicKind::Bool | BasicKind::I8 | BasicKind::U8 => Some(1),
            BasicKind::I16 | BasicKind::U16 => Some(2),
            BasicKind::I32 | BasicKind::U32 | BasicKind::F32 => Some(4),
            BasicKind::I64 | BasicKind::U64 | BasicKind::F64 => Some(8),
            BasicKind::Int | BasicKind::Uint | BasicKind::RawPtr => None,
            BasicKind::String => None,
            BasicKind::Any => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeKind {
    Basic(BasicKind),
    /// A declared ("named") type: `type Foo :: <base>`. Compares
    /// nominally by `TypeId`, never structurally against another
    /// `Named`, even when the underlying structure matches.
    Named { name: String, base: TypeId },
    Pointer(TypeId),
    Array { elem: TypeId, count: usize },
    Slice(TypeId),
    Struct { fields: Vec<Field> },
    /// A tagged union: `variants` are the member types, in source
    /// order; the live member is determined at runtime by a
    /// discriminant the VM tracks alongside the payload.
    Union { variants: Vec<Field> },
    RawUnion { fields: Vec<Field> },
    Proc {
        params: Vec<TypeId>,
        results: Vec<TypeId>,
        variadic: bool,
    },
    /// Multiple-return-value tuple; never user-writable, only produced
    /// by a procedure's result list during `check_multi_expr` fan-out.
    Tuple(Vec<TypeId>),
    Invalid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type {
    pub kind: TypeKind,
}

/// Owns every interned [`Type`] and hands out stable [`TypeId`]s.
///
/// Basic types are cached so `intern(Basic(Int))` always returns the
/// same id (needed for `are_types_identical` to treat two `int`
/// mentions as the same type), while every other `intern` call
/// allocates a fresh id — appropriate for `Named`, and harmless (if
/// slightly wasteful) for structural types since `are_types_identical`
/// compares those by structure, not by id.
#[derive(Debug, Default)]
pub struct TypeInterner {
    types: Vec<Type>,
    basic_cache: HashMap<BasicKind, TypeId>,
    invalid: Option<TypeId>,
}

impl TypeInterner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn intern(&mut self, kind: TypeKind) -> TypeId {
        if let TypeKind::Basic(b) = kind {
            if let Some(&id) = self.basic_cache.get(&b) {
                return id;
            }
            let id = self.push(Type { kind });
            self.basic_cache.insert(b, id);
            return id;
        }
        self.push(Type { kind })
    }

    fn push(&mut self, ty: Type) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(ty);
        id
    }

    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// The shared `invalid` type, interned once.
    pub fn invalid(&mut self) -> TypeId {
        if let Some(id) = self.invalid {
            return id;
        }
        let id = self.intern(TypeKind::Invalid);
        self.invalid = Some(id);
        id
    }

    pub fn bool_type(&mut self) -> TypeId {
        self.intern(TypeKind::Basic(BasicKind::Bool))
    }

    pub fn int_type(&mut self) -> TypeId {
        self.intern(TypeKind::Basic(BasicKind::Int))
    }

    pub fn string_type(&mut self) -> TypeId {
        self.intern(TypeKind::Basic(BasicKind::String))
    }

    pub fn any_type(&mut self) -> TypeId {
        self.intern(TypeKind::Basic(BasicKind::Any))
    }
}

/// Unwraps a chain of `Named` aliases down to the first structural
/// type. Mirrors `base_type`.
pub fn base_type(interner: &TypeInterner, mut id: TypeId) -> TypeId {
    loop {
        match &interner.get(id).kind {
            TypeKind::Named { base, .. } => id = *base,
            _ => return id,
        }
    }
}

/// If `id` (after unwrapping named aliases) is a pointer, returns the
/// pointee type; otherwise returns `id` unchanged. Mirrors
/// `type_deref`, which in the reference checker is a no-op on
/// non-pointers.
pub fn type_deref(interner: &TypeInterner, id: TypeId) -> TypeId {
    match &interner.get(base_type(interner, id)).kind {
        TypeKind::Pointer(inner) => *inner,
        _ => id,
    }
}

pub fn is_type_pointer(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Pointer(_)
    )
}

pub fn is_type_boolean(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Basic(BasicKind::Bool)
    )
}

pub fn is_type_integer(interner: &TypeInterner, id: TypeId) -> bool {
    match &interner.get(base_type(interner, id)).kind {
        TypeKind::Basic(b) => b.is_integer(),
        _ => false,
    }
}

pub fn is_type_float(interner: &TypeInterner, id: TypeId) -> bool {
    match &interner.get(base_type(interner, id)).kind {
        TypeKind::Basic(b) => b.is_float(),
        _ => false,
    }
}

pub fn is_type_numeric(interner: &TypeInterner, id: TypeId) -> bool {
    is_type_integer(interner, id) || is_type_float(interner, id)
}

pub fn is_type_string(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Basic(BasicKind::String)
    )
}

pub fn is_type_any(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Basic(BasicKind::Any)
    )
}

pub fn is_type_struct(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Struct { .. }
    )
}

pub fn is_type_union(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Union { .. }
    )
}

pub fn is_type_raw_union(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::RawUnion { .. }
    )
}

pub fn is_type_array(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Array { .. }
    )
}

pub fn is_type_slice(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(
        interner.get(base_type(interner, id)).kind,
        TypeKind::Slice(_)
    )
}

pub fn is_type_tuple(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(interner.get(base_type(interner, id)).kind, TypeKind::Tuple(_))
}

pub fn is_type_invalid(interner: &TypeInterner, id: TypeId) -> bool {
    matches!(interner.get(id).kind, TypeKind::Invalid)
}

/// The declared fields of a struct/union/raw_union (after unwrapping
/// `Named`), in source order. Empty for any other type kind.
pub fn fields_of(interner: &TypeInterner, id: TypeId) -> &[Field] {
    match &interner.get(base_type(interner, id)).kind {
        TypeKind::Struct { fields } => fields,
        TypeKind::Union { variants } => variants,
        TypeKind::RawUnion { fields } => fields,
        _ => &[],
    }
}

/// Find a field by name. Mirrors `lookup_field`.
pub fn lookup_field<'a>(interner: &'a TypeInterner, id: TypeId, name: &str) -> Option<&'a Field> {
    fields_of(interner, id).iter().find(|f| f.name == name)
}

/// Find a field by its source-order index.
pub fn field_in_src_order(interner: &TypeInterner, id: TypeId, index: usize) -> Option<&Field> {
    fields_of(interner, id).get(index)
}

/// Structural-or-nominal type identity. `Named` types are identical
/// only when they are literally the same `TypeId` (nominal typing);
/// every other kind is compared structurally, recursing through
/// `TypeId`s via the interner.
pub fn are_types_identical(interner: &TypeInterner, a: TypeId, b: TypeId) -> bool {
    if a == b {
        return true;
    }
    let ta = interner.get(a);
    let tb = interner.get(b);
    match (&ta.kind, &tb.kind) {
        (TypeKind::Named { .. }, _) | (_, TypeKind::Named { .. }) => false,
        (TypeKind::Basic(x), TypeKind::Basic(y)) => x == y,
        (TypeKind::Pointer(x), TypeKind::Pointer(y)) => are_types_identical(interner, *x, *y),
        (
            TypeKind::Array {
                elem: ex,
                count: cx,
            },
            TypeKind::Array {
                elem: ey,
                count: cy,
            },
        ) => cx == cy && are_types_identical(interner, *ex, *ey),
        (TypeKind::Slice(x), TypeKind::Slice(y)) => are_types_identical(interner, *x, *y),
        (TypeKind::Struct { fields: fx }, TypeKind::Struct { fields: fy }) => {
            fields_structurally_identical(interner, fx, fy)
        }
        (TypeKind::Union { variants: fx }, TypeKind::Union { variants: fy }) => {
            fields_structurally_identical(interner, fx, fy)
        }
        (TypeKind::RawUnion { fields: fx }, TypeKind::RawUnion { fields: fy }) => {
            fields_structurally_identical(interner, fx, fy)
        }
        (
            TypeKind::Proc {
                params: px,
                results: rx,
                variadic: vx,
            },
            TypeKind::Proc {
                params: py,
                results: ry,
                variadic: vy,
            },
        ) => {
            vx == vy
                && px.len() == py.len()
                && rx.len() == ry.len()
                && px
                    .iter()
                    .zip(py)
                    .all(|(x, y)| are_types_identical(interner, *x, *y))
                && rx
                    .iter()
                    .zip(ry)
                    .all(|(x, y)| are_types_identical(interner, *x, *y))
        }
        (TypeKind::Tuple(x), TypeKind::Tuple(y)) => {
            x.len() == y.len()
                && x.iter()
                    .zip(y)
                    .all(|(a, b)| are_types_identical(interner, *a, *b))
        }
        (TypeKind::Invalid, TypeKind::Invalid) => true,
        _ => false,
    }
}

fn fields_structurally_identical(interner: &TypeInterner, a: &[Field], b: &[Field]) -> bool {
    a.len() == b.len()
        && a.iter()
            .zip(b)
            .all(|(x, y)| x.name == y.name && are_types_identical(interner, x.ty, y.ty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_types_are_interned_once() {
        let mut i = TypeInterner::new();
        let a = i.intern(TypeKind::Basic(BasicKind::Int));
        let b = i.intern(TypeKind::Basic(BasicKind::Int));
        assert_eq!(a, b);
    }

    #[test]
    fn named_types_never_structurally_match() {
        let mut i = TypeInterner::new();
        let base = i.intern(TypeKind::Struct { fields: vec![] });
        let a = i.intern(TypeKind::Named {
            name: "Foo".into(),
            base,
        });
        let b = i.intern(TypeKind::Named {
            name: "Bar".into(),
            base,
        });
        assert!(!are_types_identical(&i, a, b));
        assert_eq!(base_type(&i, a), base_type(&i, b));
    }

    #[test]
    fn pointer_deref_unwraps_one_level() {
        let mut i = TypeInterner::new();
        let int = i.int_type();
        let ptr = i.intern(TypeKind::Pointer(int));
        assert_eq!(type_deref(&i, ptr), int);
        assert_eq!(type_deref(&i, int), int);
    }

    #[test]
    fn struct_field_lookup_by_name_and_order() {
        let mut i = TypeInterner::new();
        let int = i.int_type();
        let s = i.intern(TypeKind::Struct {
            fields: vec![
                Field {
                    name: "x".into(),
                    ty: int,
                    field_index: 0,
                },
                Field {
                    name: "y".into(),
                    ty: int,
                    field_index: 1,
                },
            ],
        });
        assert_eq!(lookup_field(&i, s, "y").unwrap().field_index, 1);
        assert_eq!(field_in_src_order(&i, s, 0).unwrap().name, "x");
        assert!(lookup_field(&i, s, "z").is_none());
    }

    #[test]
    fn structurally_equal_anonymous_structs_are_identical() {
        let mut i = TypeInterner::new();
        let int = i.int_type();
        let mk = |i: &mut TypeInterner| {
            i.intern(TypeKind::Struct {
                fields: vec![Field {
                    name: "x".into(),
                    ty: int,
                    field_index: 0,
                }],
            })
        };
        let a = mk(&mut i);
        let b = mk(&mut i);
        assert_ne!(a, b);
        assert!(are_types_identical(&i, a, b));
    }
}
