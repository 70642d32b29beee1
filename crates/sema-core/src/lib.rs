//! Shared data model for the statement checker and SSA virtual
//! machine: the AST, the type system, the entity/scope graph, the
//! addressing-mode value model, and the diagnostic sink.
//!
//! Every cyclic relationship the reference checker expresses with
//! back-pointers (`Entity <-> Scope`, `using_parent`, a record type's
//! node pointing back at the scope it declares) is instead expressed
//! here as identity indices (`EntityId`, `ScopeId`, `TypeId`,
//! `NodeId`) into flat arenas, avoiding `Rc<RefCell<_>>` cycles.

pub mod ast;
pub mod diagnostics;
pub mod entity;
pub mod flags;
pub mod operand;
pub mod pos;
pub mod scope;
pub mod types;

pub use ast::{
    unparen_expr, AssignOp, Ast, AstKind, AstNode, BinaryOp, BranchKind, CaseClauseData,
    FieldValueData, IncDecOp, LiteralData, NodeId, UsingTarget,
};
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use entity::{Entity, EntityArena, EntityFlags, EntityId, EntityKind};
pub use flags::{StmtFlags, StmtStateFlags};
pub use operand::{AddressingMode, ExactValue, Operand};
pub use pos::Pos;
pub use scope::{Scope, ScopeArena, ScopeId};
pub use types::{
    are_types_identical, base_type, field_in_src_order, fields_of, is_type_any, is_type_array,
    is_type_boolean, is_type_float, is_type_integer, is_type_invalid, is_type_numeric,
    is_type_pointer, is_type_raw_union, is_type_slice, is_type_string, is_type_struct,
    is_type_tuple, is_type_union, lookup_field, type_deref, BasicKind, Field, Type, TypeId,
    TypeInterner, TypeKind,
};
