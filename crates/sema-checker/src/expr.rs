//! A minimal expression checker: just enough to drive the statement
//! checker end to end (resolve identifiers/selectors, fold literal
//! constants, check binary expressions and assignment compatibility).
//! This is supporting infrastructure for the statement checker, not
//! a general expression-checking pass — it does not attempt overload
//! resolution, generic instantiation, or full call-argument matching.

use sema_core::{
    are_types_identical, base_type, is_type_boolean, is_type_numeric, is_type_pointer,
    is_type_string, lookup_field, type_deref, AddressingMode, AstKind, BinaryOp, EntityId,
    EntityKind, ExactValue, LiteralData, NodeId, Operand, TypeId, TypeKind,
};

use crate::context::CheckerContext;

/// Resolve `expr` to an [`Operand`], recursing through identifiers,
/// selectors, literals, binary expressions and compound literals.
/// Mirrors `check_expr`, restricted to the expression forms this
/// crate's AST can represent.
pub fn check_expr(ctx: &mut CheckerContext, expr: NodeId) -> Operand {
    let node = ctx.ast.get(expr);
    let pos = node.pos.clone();
    match &node.kind {
        AstKind::Ident(name) => check_ident(ctx, expr, name.clone(), pos),
        AstKind::BasicLit(lit) => check_basic_lit(ctx, expr, lit.clone()),
        AstKind::SelectorExpr { base, field } => {
            let base = *base;
            let field = field.clone();
            check_selector_expr(ctx, expr, base, &field)
        }
        AstKind::BinaryExpr { op, lhs, rhs } => {
            let (op, lhs, rhs) = (*op, *lhs, *rhs);
            check_binary_expr(ctx, expr, op, lhs, rhs)
        }
        AstKind::CallExpr { callee, args } => {
            let (callee, args) = (*callee, args.clone());
            check_call_expr(ctx, expr, callee, &args)
        }
        AstKind::CompoundLit { type_expr, .. } => {
            let ty = match type_expr {
                Some(t) => resolve_type_expr(ctx, *t),
                None => ctx.types.invalid(),
            };
            Operand {
                mode: AddressingMode::Value,
                ty,
                value: ExactValue::Compound(expr),
                expr,
            }
        }
        _ => {
            ctx.error(pos, "expression expected");
            Operand::invalid(ctx.types.invalid(), expr)
        }
    }
}

fn check_ident(ctx: &mut CheckerContext, expr: NodeId, name: String, pos: sema_core::Pos) -> Operand {
    if name == "_" {
        return Operand::invalid(ctx.types.invalid(), expr);
    }
    let Some(id) = ctx.lookup(&name) else {
        ctx.error(pos, format!("undeclared name: {name}"));
        return Operand::invalid(ctx.types.invalid(), expr);
    };
    ctx.entities.mark_used(id);
    entity_operand(ctx, id, expr)
}

pub fn entity_operand(ctx: &CheckerContext, id: EntityId, expr: NodeId) -> Operand {
    let e = ctx.entities.get(id);
    let mode = match e.kind {
        EntityKind::Variable => AddressingMode::Variable,
        EntityKind::Constant => AddressingMode::Constant,
        EntityKind::TypeName => AddressingMode::Type,
        EntityKind::Procedure | EntityKind::Builtin => AddressingMode::Value,
        EntityKind::ImplicitValue => AddressingMode::Value,
        EntityKind::Nil | EntityKind::ImportName | EntityKind::Invalid => AddressingMode::Invalid,
    };
    Operand {
        mode,
        ty: e.ty,
        value: ExactValue::Invalid,
        expr,
    }
}

fn check_basic_lit(ctx: &mut CheckerContext, expr: NodeId, lit: LiteralData) -> Operand {
    let (ty, value) = match lit {
        LiteralData::Integer(i) => (ctx.types.int_type(), ExactValue::Integer(i)),
        LiteralData::Float(f) => (
            ctx.types.intern(TypeKind::Basic(sema_core::BasicKind::F64)),
            ExactValue::Float(f),
        ),
        LiteralData::String(s) => (ctx.types.string_type(), ExactValue::String(s)),
        LiteralData::Bool(b) => (ctx.types.bool_type(), ExactValue::Bool(b)),
    };
    Operand {
        mode: AddressingMode::Constant,
        ty,
        value,
        expr,
    }
}

/// Resolve an entity referred to via a type-position expression
/// (identifiers only — this crate's AST has no generic/pointer type
/// expression forms beyond what `TypeDecl`/`VarDecl` already carry as
/// a resolved `TypeId` in a fuller pipeline; here callers that need a
/// real type from an arbitrary expression fall back to `invalid`).
fn resolve_type_expr(ctx: &mut CheckerContext, expr: NodeId) -> TypeId {
    if let AstKind::Ident(name) = &ctx.ast.get(expr).kind {
        let name = name.clone();
        if let Some(id) = ctx.lookup(&name) {
            let e = ctx.entities.get(id);
            if e.kind == EntityKind::TypeName {
                return e.ty;
            }
        }
    }
    ctx.types.invalid()
}

fn check_selector_expr(ctx: &mut CheckerContext, expr: NodeId, base: NodeId, field: &str) -> Operand {
    let base_op = check_expr(ctx, base);
    if base_op.is_invalid() {
        return Operand::invalid(ctx.types.invalid(), expr);
    }
    let deref_ty = type_deref(&ctx.types, base_op.ty);
    match lookup_field(&ctx.types, deref_ty, field) {
        Some(f) => {
            let ty = f.ty;
            Operand {
                mode: AddressingMode::Variable,
                ty,
                value: ExactValue::Invalid,
                expr,
            }
        }
        None => {
            let pos = ctx.ast.get(expr).pos.clone();
            ctx.error(pos, format!("`{field}` is not a field"));
            Operand::invalid(ctx.types.invalid(), expr)
        }
    }
}

/// `check_selector` as used by `UsingStmt`: resolve a selector
/// expression down to the entity it denotes, rather than just an
/// `Operand`. Returns `None` when the base does not resolve to a
/// known entity.
pub fn check_selector(ctx: &mut CheckerContext, expr: NodeId) -> Option<EntityId> {
    if let AstKind::Ident(name) = &ctx.ast.get(expr).kind {
        let name = name.clone();
        return ctx.lookup(&name);
    }
    None
}

fn check_call_expr(ctx: &mut CheckerContext, expr: NodeId, callee: NodeId, args: &[NodeId]) -> Operand {
    let callee_op = check_expr(ctx, callee);
    for &a in args {
        check_expr(ctx, a);
    }
    if callee_op.is_invalid() {
        return Operand::invalid(ctx.types.invalid(), expr);
    }
    let result_ty = match &ctx.types.get(base_type(&ctx.types, callee_op.ty)).kind {
        TypeKind::Proc { results, .. } => results.first().copied().unwrap_or_else(|| ctx.types.invalid()),
        _ => {
            let pos = ctx.ast.get(expr).pos.clone();
            ctx.error(pos, "cannot call a non-procedure value");
            ctx.types.invalid()
        }
    };
    Operand {
        mode: AddressingMode::Value,
        ty: result_ty,
        value: ExactValue::Invalid,
        expr,
    }
}

/// Check a binary expression, folding constants when both sides are
/// constant. Comparisons always yield `bool`.
pub fn check_binary_expr(ctx: &mut CheckerContext, expr: NodeId, op: BinaryOp, lhs: NodeId, rhs: NodeId) -> Operand {
    let x = check_expr(ctx, lhs);
    let y = check_expr(ctx, rhs);
    check_binary_op(ctx, expr, op, x, y)
}

/// The operand-level half of [`check_binary_expr`]: given two already
/// resolved operands, fold/typecheck the binary operation over them.
/// Factored out so callers that already hold the operands (the
/// compound-assignment desugaring in `check_assign_stmt`) don't have
/// to re-resolve the same expressions a second time.
pub fn check_binary_op(ctx: &mut CheckerContext, expr: NodeId, op: BinaryOp, x: Operand, y: Operand) -> Operand {
    if x.is_invalid() || y.is_invalid() {
        return Operand::invalid(ctx.types.invalid(), expr);
    }
    if op.is_comparison() {
        let mut z = x.clone();
        check_comparison(ctx, &mut z, &y, expr);
        return z;
    }
    let ty = if is_type_numeric(&ctx.types, x.ty) {
        x.ty
    } else if is_type_string(&ctx.types, x.ty) && matches!(op, BinaryOp::Add) {
        x.ty
    } else {
        let pos = ctx.ast.get(expr).pos.clone();
        ctx.error(pos, "invalid operand types for binary expression");
        return Operand::invalid(ctx.types.invalid(), expr);
    };
    let mode = if x.mode == AddressingMode::Constant && y.mode == AddressingMode::Constant {
        AddressingMode::Constant
    } else {
        AddressingMode::Value
    };
    let value = fold_binary_constant(op, &x.value, &y.value);
    Operand {
        mode,
        ty,
        value,
        expr,
    }
}

fn fold_binary_constant(op: BinaryOp, a: &ExactValue, b: &ExactValue) -> ExactValue {
    match (a, b) {
        (ExactValue::Integer(x), ExactValue::Integer(y)) => match op {
            BinaryOp::Add => ExactValue::Integer(x.wrapping_add(*y)),
            BinaryOp::Sub => ExactValue::Integer(x.wrapping_sub(*y)),
            BinaryOp::Mul => ExactValue::Integer(x.wrapping_mul(*y)),
            BinaryOp::Quo if *y != 0 => ExactValue::Integer(x / y),
            BinaryOp::Mod if *y != 0 => ExactValue::Integer(x % y),
            _ => ExactValue::Invalid,
        },
        (ExactValue::Float(x), ExactValue::Float(y)) => match op {
            BinaryOp::Add => ExactValue::Float(x + y),
            BinaryOp::Sub => ExactValue::Float(x - y),
            BinaryOp::Mul => ExactValue::Float(x * y),
            BinaryOp::Quo => ExactValue::Float(x / y),
            _ => ExactValue::Invalid,
        },
        (ExactValue::String(x), ExactValue::String(y)) if matches!(op, BinaryOp::Add) => {
            ExactValue::String(format!("{x}{y}"))
        }
        _ => ExactValue::Invalid,
    }
}

/// Compare `y` against `x`'s type, setting `z` to a `bool`-typed
/// result. `z` is allowed to alias `x` (the statement checker's match
/// duplicate-detection loop does exactly this). Mirrors
/// `check_comparison`.
pub fn check_comparison(ctx: &mut CheckerContext, z: &mut Operand, x: &Operand, expr: NodeId) {
    if !are_types_identical(&ctx.types, z.ty, x.ty)
        && !is_type_numeric(&ctx.types, z.ty)
        && !is_type_numeric(&ctx.types, x.ty)
    {
        let pos = ctx.ast.get(expr).pos.clone();
        ctx.error(pos, "mismatched types in comparison");
        *z = Operand::invalid(ctx.types.invalid(), expr);
        return;
    }
    let mode = if z.mode == AddressingMode::Constant && x.mode == AddressingMode::Constant {
        AddressingMode::Constant
    } else {
        AddressingMode::Value
    };
    z.mode = mode;
    z.ty = ctx.types.bool_type();
    z.value = ExactValue::Invalid;
}

/// Convert a constant operand to `target`'s type in place, when the
/// conversion is a widening numeric conversion or the operand is
/// already of a compatible type. Mirrors `convert_to_typed`'s role of
/// giving an untyped constant a concrete type before comparison/
/// assignment.
pub fn convert_to_typed(ctx: &mut CheckerContext, op: &mut Operand, target: TypeId) {
    if op.is_invalid() {
        return;
    }
    if are_types_identical(&ctx.types, op.ty, target) {
        return;
    }
    if is_type_numeric(&ctx.types, op.ty) && is_type_numeric(&ctx.types, target) {
        op.ty = target;
        return;
    }
    // Otherwise leave as-is; `check_assignment`/`check_comparison` will
    // diagnose the mismatch.
}

/// Check that `op` may be assigned into a location of type
/// `target_ty` (`None` for `_`). Mirrors `check_assignment`, which
/// takes the context description purely for its error message.
pub fn check_assignment(ctx: &mut CheckerContext, op: &mut Operand, target_ty: Option<TypeId>, context: &str) {
    if op.is_invalid() {
        return;
    }
    let Some(target_ty) = target_ty else {
        return;
    };
    if are_types_identical(&ctx.types, op.ty, target_ty) {
        return;
    }
    if is_type_numeric(&ctx.types, op.ty) && is_type_numeric(&ctx.types, target_ty) {
        op.ty = target_ty;
        return;
    }
    if is_type_pointer(&ctx.types, target_ty) && is_type_pointer(&ctx.types, op.ty) {
        return;
    }
    let pos = ctx.ast.get(op.expr).pos.clone();
    ctx.error(pos, format!("cannot use value as type in {context}"));
    *op = Operand::invalid(ctx.types.invalid(), op.expr);
}

/// Check that `op`'s type is usable as a boolean condition (`if`,
/// `for`, `when`).
pub fn check_condition(ctx: &mut CheckerContext, expr: NodeId, what: &str) -> Operand {
    let op = check_expr(ctx, expr);
    if op.is_invalid() {
        return op;
    }
    if !is_type_boolean(&ctx.types, op.ty) {
        let pos = ctx.ast.get(expr).pos.clone();
        ctx.error(pos, format!("non-boolean condition in {what} statement"));
    }
    op
}

/// Check that `op`'s type is a boolean usable as a `when` condition.
/// Unlike [`check_condition`], `when` additionally requires the
/// condition to fold to a compile-time constant, since only the
/// branch it selects is ever checked.
pub fn check_when_condition(ctx: &mut CheckerContext, expr: NodeId) -> Operand {
    let op = check_expr(ctx, expr);
    if op.is_invalid() {
        return op;
    }
    if !is_type_boolean(&ctx.types, op.ty) {
        let pos = ctx.ast.get(expr).pos.clone();
        ctx.error(pos, "non-boolean condition in when statement");
        return Operand::invalid(ctx.types.invalid(), expr);
    }
    if op.mode != AddressingMode::Constant {
        let pos = ctx.ast.get(expr).pos.clone();
        ctx.error(pos, "non-constant boolean `when` condition");
        return Operand::invalid(ctx.types.invalid(), expr);
    }
    op
}

/// `check_init_variables`: resolve each rhs expression and assign its
/// type to the matching entity. Used by `VarDecl`/`ConstDecl` and by
/// the implicit `x := y` short form inside `AssignStmt`.
pub fn check_init_variables(ctx: &mut CheckerContext, names: &[EntityId], values: &[NodeId]) {
    for (i, &id) in names.iter().enumerate() {
        let Some(&expr) = values.get(i) else { continue };
        let op = check_expr(ctx, expr);
        if !op.is_invalid() {
            ctx.entities.get_mut(id).ty = op.ty;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sema_core::{Ast, AstKind, BasicKind, Entity, EntityFlags, Pos, TypeKind};

    fn push_ident(ast: &mut Ast, name: &str) -> NodeId {
        ast.push(Pos::synthetic(), AstKind::Ident(name.into()))
    }

    #[test]
    fn undeclared_identifier_is_invalid_and_diagnosed() {
        let mut ast = Ast::new();
        let id = push_ident(&mut ast, "missing");
        let mut ctx = CheckerContext::new(&ast);
        let op = check_expr(&mut ctx, id);
        assert!(op.is_invalid());
        assert_eq!(ctx.diagnostics.len(), 1);
    }

    #[test]
    fn declared_variable_resolves_and_marks_used() {
        let mut ast = Ast::new();
        let id = push_ident(&mut ast, "x");
        let mut ctx = CheckerContext::new(&ast);
        let int = ctx.types.int_type();
        let ent = ctx.entities.insert(Entity {
            kind: EntityKind::Variable,
            scope: ctx.scope,
            pos: Pos::synthetic(),
            name: "x".into(),
            ty: int,
            flags: EntityFlags::NONE,
            field_index: None,
            using_parent: None,
            import_scope: None,
            node: None,
        });
        ctx.scopes.insert_entity(ctx.scope, "x", ent);
        let op = check_expr(&mut ctx, id);
        assert_eq!(op.mode, AddressingMode::Variable);
        assert!(ctx.entities.get(ent).is_used());
    }

    #[test]
    fn integer_literal_folds_to_constant() {
        let mut ast = Ast::new();
        let lit = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(42)));
        let mut ctx = CheckerContext::new(&ast);
        let op = check_expr(&mut ctx, lit);
        assert_eq!(op.mode, AddressingMode::Constant);
        assert_eq!(op.value, ExactValue::Integer(42));
    }

    #[test]
    fn mismatched_comparison_types_are_invalid() {
        let mut ast = Ast::new();
        let a = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::String("s".into())));
        let b = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Bool(true)));
        let cmp = ast.push(
            Pos::synthetic(),
            AstKind::BinaryExpr {
                op: BinaryOp::CmpEq,
                lhs: a,
                rhs: b,
            },
        );
        let mut ctx = CheckerContext::new(&ast);
        let op = check_expr(&mut ctx, cmp);
        assert!(op.is_invalid());
    }

    #[test]
    fn numeric_binary_expr_folds_and_types() {
        let mut ast = Ast::new();
        let a = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(2)));
        let b = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(3)));
        let add = ast.push(
            Pos::synthetic(),
            AstKind::BinaryExpr {
                op: BinaryOp::Add,
                lhs: a,
                rhs: b,
            },
        );
        let mut ctx = CheckerContext::new(&ast);
        let op = check_expr(&mut ctx, add);
        assert_eq!(op.value, ExactValue::Integer(5));
        assert!(matches!(ctx.types.get(op.ty).kind, TypeKind::Basic(BasicKind::Int)));
    }
}
