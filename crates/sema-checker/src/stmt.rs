//! The statement checker: scope-and-flow-sensitive traversal of every
//! statement kind, termination analysis, implicit-break detection,
//! and `using`-injection.

use std::collections::HashMap;

use sema_core::{
    are_types_identical, base_type, is_type_raw_union, is_type_struct, type_deref, AddressingMode,
    AssignOp, AstKind, BinaryOp, BranchKind, CaseClauseData, Entity, EntityFlags, EntityId,
    EntityKind, ExactValue, NodeId, Operand, Pos, StmtFlags, TypeId,
};

use crate::context::CheckerContext;
use crate::expr::{
    check_assignment, check_binary_op, check_comparison, check_condition, check_expr,
    check_init_variables, check_selector, check_when_condition, convert_to_typed, entity_operand,
};

/// Check a list of statements, opening no new scope of its own (the
/// caller opens one where the language requires it — `BlockStmt`,
/// `MatchStmt`'s case bodies, etc). The trailing statement inherits
/// `Stmt_FallthroughAllowed` from the incoming flags, mirroring
/// `check_stmt_list`'s "only the last statement may fall through"
/// rule.
pub fn check_stmt_list(ctx: &mut CheckerContext, stmts: &[NodeId], flags: StmtFlags) {
    if stmts.is_empty() {
        return;
    }
    check_scope_decls(ctx, stmts);

    let ft_ok = flags.contains(StmtFlags::FALLTHROUGH_ALLOWED);
    let base = flags & !StmtFlags::FALLTHROUGH_ALLOWED;

    for (i, &n) in stmts.iter().enumerate() {
        if matches!(ctx.ast.get(n).kind, AstKind::EmptyStmt) {
            continue;
        }
        let mut new_flags = base;
        if ft_ok && i + 1 == stmts.len() {
            new_flags = new_flags | StmtFlags::FALLTHROUGH_ALLOWED;
        }
        check_stmt(ctx, n, new_flags);
    }
}

/// First pass over a statement list: bind every declaration's name
/// into the current scope before any statement is checked, so mutual
/// forward references between sibling declarations resolve. Mirrors
/// `check_scope_decls`, restricted to the declaration kinds this
/// crate's grammar has.
fn check_scope_decls(ctx: &mut CheckerContext, stmts: &[NodeId]) {
    for &n in stmts {
        let node = ctx.ast.get(n);
        let pos = node.pos.clone();
        match &node.kind {
            AstKind::VarDecl { names, .. } => {
                let names = names.clone();
                declare_names(ctx, &names, EntityKind::Variable, pos, Some(n));
            }
            AstKind::ConstDecl { names, .. } => {
                let names = names.clone();
                declare_names(ctx, &names, EntityKind::Constant, pos, Some(n));
            }
            AstKind::TypeDecl { name, .. } => {
                let name = name.clone();
                declare_names(ctx, &[name], EntityKind::TypeName, pos, Some(n));
            }
            AstKind::ProcDecl { name, .. } => {
                let name = name.clone();
                declare_names(ctx, &[name], EntityKind::Procedure, pos, Some(n));
            }
            _ => {}
        }
    }
}

fn declare_names(
    ctx: &mut CheckerContext,
    names: &[String],
    kind: EntityKind,
    pos: Pos,
    node: Option<NodeId>,
) {
    for name in names {
        if name == "_" {
            continue;
        }
        let id = ctx.entities.insert(Entity {
            kind,
            scope: ctx.scope,
            pos: pos.clone(),
            name: name.clone(),
            ty: ctx.types.invalid(),
            flags: EntityFlags::NONE,
            field_index: None,
            using_parent: None,
            import_scope: None,
            node,
        });
        if let Some(prev) = ctx.scopes.insert_entity(ctx.scope, name, id) {
            let prev_pos = ctx.entities.get(prev).pos.clone();
            ctx.error(
                pos.clone(),
                format!("redeclaration of `{name}`\n\tprevious declaration at {prev_pos}"),
            );
        }
    }
}

/// Check one statement under `flags` (the `break`/`continue`/
/// `fallthrough` legality the statement inherits from its enclosing
/// context). Mirrors `check_stmt`'s per-kind dispatch; the
/// `bounds_check`/`no_bounds_check` save/restore around every
/// statement is handled here via [`sema_core::StmtStateFlags`].
pub fn check_stmt(ctx: &mut CheckerContext, node_id: NodeId, flags: StmtFlags) {
    let saved = ctx.stmt_state_flags;
    ctx.stmt_state_flags = saved.apply_override(ctx.ast.get(node_id).stmt_state_flags);

    check_stmt_internal(ctx, node_id, flags);

    ctx.stmt_state_flags = saved;
}

fn check_stmt_internal(ctx: &mut CheckerContext, node_id: NodeId, flags: StmtFlags) {
    let kind = ctx.ast.get(node_id).kind.clone();
    let pos = ctx.ast.get(node_id).pos.clone();
    match kind {
        AstKind::BadStmt | AstKind::BadDecl | AstKind::EmptyStmt => {}

        AstKind::ExprStmt(expr) => {
            check_expr(ctx, expr);
        }

        AstKind::TagStmt { stmt, .. } => {
            ctx.error(pos.clone(), "tag statements are not supported yet");
            check_stmt(ctx, stmt, flags)
        }

        AstKind::IncDecStmt { expr, .. } => {
            let op = check_expr(ctx, expr);
            if !op.is_invalid() && !sema_core::is_type_integer(&ctx.types, op.ty) && !sema_core::is_type_float(&ctx.types, op.ty) {
                ctx.error(pos, "invalid operand type for increment/decrement");
            }
        }

        AstKind::AssignStmt { op, lhs, rhs } => check_assign_stmt(ctx, pos, op, &lhs, &rhs),

        AstKind::BlockStmt { stmts } => {
            let parent = ctx.open_scope();
            check_stmt_list(ctx, &stmts, flags);
            ctx.close_scope(parent);
        }

        AstKind::IfStmt {
            init,
            cond,
            body,
            else_stmt,
        } => {
            let parent = ctx.open_scope();
            if let Some(init) = init {
                check_stmt(ctx, init, StmtFlags::NONE);
            }
            check_condition(ctx, cond, "if");
            check_stmt(ctx, body, flags & !StmtFlags::FALLTHROUGH_ALLOWED);
            if let Some(else_stmt) = else_stmt {
                check_else_stmt_kind(ctx, else_stmt, "if");
                check_stmt(ctx, else_stmt, flags & !StmtFlags::FALLTHROUGH_ALLOWED);
            }
            ctx.close_scope(parent);
        }

        AstKind::WhenStmt {
            cond,
            body,
            else_stmt,
        } => {
            let cond_op = check_when_condition(ctx, cond);
            let body_is_block = matches!(ctx.ast.get(body).kind, AstKind::BlockStmt { .. });
            if !body_is_block {
                ctx.error(pos.clone(), "invalid body for `when` statement");
            }
            if let Some(else_stmt) = else_stmt {
                check_else_stmt_kind(ctx, else_stmt, "when");
            }
            // `when` is distinct from `if`: only the branch selected by
            // the folded constant condition is actually checked.
            if cond_op.mode == AddressingMode::Constant {
                match cond_op.value {
                    ExactValue::Bool(true) if body_is_block => {
                        check_stmt(ctx, body, flags & !StmtFlags::FALLTHROUGH_ALLOWED);
                    }
                    ExactValue::Bool(false) => {
                        if let Some(else_stmt) = else_stmt {
                            check_stmt(ctx, else_stmt, flags & !StmtFlags::FALLTHROUGH_ALLOWED);
                        }
                    }
                    _ => {}
                }
            }
        }

        AstKind::ReturnStmt { results } => {
            let expected = ctx.curr_proc_results.clone();
            match expected {
                None => ctx.error(pos, "`return` outside of a procedure body"),
                Some(expected) => {
                    if results.len() != expected.len() {
                        ctx.error(
                            pos,
                            format!(
                                "wrong number of return values: expected {}, got {}",
                                expected.len(),
                                results.len()
                            ),
                        );
                    }
                    for (i, &r) in results.iter().enumerate() {
                        let mut op = check_expr(ctx, r);
                        if let Some(&target) = expected.get(i) {
                            check_assignment(ctx, &mut op, Some(target), "return statement");
                        }
                    }
                }
            }
        }

        AstKind::ForStmt {
            init,
            cond,
            post,
            body,
        } => {
            let parent = ctx.open_scope();
            if let Some(init) = init {
                check_stmt(ctx, init, StmtFlags::NONE);
            }
            if let Some(cond) = cond {
                check_condition(ctx, cond, "for");
            }
            if let Some(post) = post {
                check_stmt(ctx, post, StmtFlags::NONE);
            }
            let body_flags = StmtFlags::BREAK_ALLOWED | StmtFlags::CONTINUE_ALLOWED;
            check_stmt(ctx, body, body_flags);
            ctx.close_scope(parent);
        }

        AstKind::MatchStmt {
            init,
            tag,
            body,
            is_type_match,
        } => {
            if is_type_match {
                check_type_match_stmt(ctx, pos, init, tag, &body, flags);
            } else {
                check_match_stmt(ctx, pos, init, tag, &body, flags);
            }
        }

        AstKind::DeferStmt { stmt } => {
            if matches!(ctx.ast.get(stmt).kind, AstKind::ReturnStmt { .. }) {
                ctx.error(pos, "`defer` statement cannot be a `return` statement");
                return;
            }
            check_stmt(ctx, stmt, StmtFlags::NONE);
        }

        AstKind::BranchStmt { kind, .. } => match kind {
            BranchKind::Break => {
                if !flags.contains(StmtFlags::BREAK_ALLOWED) {
                    ctx.error(pos, "illegal use of `break` statement");
                }
            }
            BranchKind::Continue => {
                if !flags.contains(StmtFlags::CONTINUE_ALLOWED) {
                    ctx.error(pos, "illegal use of `continue` statement");
                }
            }
            BranchKind::Fallthrough => {
                if !flags.contains(StmtFlags::FALLTHROUGH_ALLOWED) {
                    ctx.error(
                        pos,
                        "illegal use of `fallthrough` statement, it must be the last statement in a case clause",
                    );
                }
            }
            BranchKind::Goto => {}
        },

        AstKind::UsingStmt { target, expr } => check_using_stmt(ctx, pos, target, expr),

        AstKind::PushAllocator { body, .. } | AstKind::PushContext { body, .. } => {
            check_stmt(ctx, body, flags & !StmtFlags::FALLTHROUGH_ALLOWED);
        }

        AstKind::VarDecl {
            names,
            type_expr,
            values,
            is_using,
        } => check_var_decl(ctx, &names, type_expr, &values, is_using),

        AstKind::ConstDecl { .. } => {
            // Like `TypeDecl`, a constant's value/type is resolved by
            // the (out-of-scope) earlier constant-evaluation pass;
            // nothing left to check here.
        }

        AstKind::TypeDecl { .. } => {
            // The entity's `ty` is left as `invalid` here; resolving
            // a type expression into a concrete `TypeId` belongs to
            // the (out-of-scope) type-expression elaborator that
            // built this crate's `TypeInterner` up front.
        }

        AstKind::ProcDecl {
            params,
            results,
            body,
            ..
        } => check_proc_decl(ctx, &params, &results, body),

        AstKind::Ident(_)
        | AstKind::SelectorExpr { .. }
        | AstKind::BasicLit(_)
        | AstKind::BinaryExpr { .. }
        | AstKind::CallExpr { .. }
        | AstKind::FieldValue(_)
        | AstKind::CompoundLit { .. } => {
            ctx.error(pos, "expression used as a statement");
        }
    }
}

fn check_proc_decl(
    ctx: &mut CheckerContext,
    params: &[NodeId],
    results: &[NodeId],
    body: Option<NodeId>,
) {
    let _ = params;
    let result_tys: Vec<TypeId> = results.iter().map(|_| ctx.types.invalid()).collect();
    let Some(body) = body else { return };
    let saved_results = ctx.curr_proc_results.take();
    ctx.curr_proc_results = Some(result_tys.clone());

    let parent = ctx.open_scope();
    ctx.scopes.get_mut(ctx.scope).is_proc_body = true;
    if let AstKind::BlockStmt { stmts } = ctx.ast.get(body).kind.clone() {
        check_stmt_list(ctx, &stmts, StmtFlags::NONE);
        if !result_tys.is_empty() && !check_is_terminating_list(ctx, &stmts) {
            let pos = ctx.ast.get(body).pos.clone();
            ctx.error(pos, "missing return statement at end of procedure");
        }
    } else {
        check_stmt(ctx, body, StmtFlags::NONE);
    }
    ctx.close_scope(parent);

    ctx.curr_proc_results = saved_results;
}

fn check_var_decl(
    ctx: &mut CheckerContext,
    names: &[String],
    type_expr: Option<NodeId>,
    values: &[NodeId],
    is_using: bool,
) {
    let ids: Vec<EntityId> = names.iter().filter_map(|n| ctx.lookup(n)).collect();

    let declared_ty = type_expr.map(|t| {
        let node = ctx.ast.get(t).clone();
        let _ = node;
        ctx.types.invalid()
    });

    if !values.is_empty() {
        check_init_variables(ctx, &ids, values);
        if let Some(ty) = declared_ty {
            for &id in &ids {
                let mut op = entity_operand(ctx, id, values.first().copied().unwrap_or(NodeId(0)));
                check_assignment(ctx, &mut op, Some(ty), "variable declaration");
            }
        }
    } else if let Some(ty) = declared_ty {
        for &id in &ids {
            ctx.entities.get_mut(id).ty = ty;
        }
    }

    if is_using {
        for &id in &ids {
            inject_using_variable(ctx, id, None);
        }
    }
}

/// Validate that an `else` branch is either another `if` (an
/// `else if` chain) or a plain block, diagnosing anything else (e.g. a
/// bare expression statement) rather than silently recursing into it.
fn check_else_stmt_kind(ctx: &mut CheckerContext, else_stmt: NodeId, what: &str) {
    if !matches!(
        ctx.ast.get(else_stmt).kind,
        AstKind::IfStmt { .. } | AstKind::BlockStmt { .. }
    ) {
        let pos = ctx.ast.get(else_stmt).pos.clone();
        ctx.error(pos, format!("invalid `else` statement in `{what}` statement"));
    }
}

/// `check_assignment_variable`: resolve the lvalue side of an
/// `AssignStmt`, allowing `_` unconditionally and diagnosing anything
/// that does not resolve to an addressable operand.
fn check_assignment_variable(ctx: &mut CheckerContext, lhs: NodeId) -> Option<TypeId> {
    if let AstKind::Ident(name) = &ctx.ast.get(lhs).kind {
        if name == "_" {
            return None;
        }
    }

    let e_used = if let AstKind::Ident(name) = ctx.ast.get(lhs).kind.clone() {
        ctx.lookup(&name)
            .filter(|id| ctx.entities.get(*id).kind == EntityKind::Variable)
            .map(|id| ctx.entities.get(id).is_used())
    } else {
        None
    };

    let op = check_expr(ctx, lhs);

    if let (AstKind::Ident(name), Some(used)) = (ctx.ast.get(lhs).kind.clone(), e_used) {
        if !used {
            if let Some(id) = ctx.lookup(&name) {
                // Assigning to a variable does not itself count as a
                // read use; restore the pre-assignment used-ness.
                if !used {
                    let e = ctx.entities.get_mut(id);
                    e.flags = sema_core::EntityFlags::NONE;
                }
            }
        }
    }

    if op.is_invalid() {
        return None;
    }
    if op.mode != AddressingMode::Variable {
        let pos = ctx.ast.get(lhs).pos.clone();
        ctx.error(pos, "cannot assign to this expression");
        return None;
    }
    Some(op.ty)
}

fn check_assign_stmt(ctx: &mut CheckerContext, pos: Pos, op: AssignOp, lhs: &[NodeId], rhs: &[NodeId]) {
    match op {
        AssignOp::Assign => {
            for (&l, &r) in lhs.iter().zip(rhs.iter()) {
                let target_ty = check_assignment_variable(ctx, l);
                let mut rop = check_expr(ctx, r);
                check_assignment(ctx, &mut rop, target_ty, "assignment");
            }
            if lhs.len() != rhs.len() {
                ctx.error(pos, "assignment count mismatch");
            }
        }
        AssignOp::Compound(bin_op) => {
            if lhs.len() != 1 || rhs.len() != 1 {
                ctx.error(pos, "compound assignment requires exactly one operand per side");
                return;
            }
            let target_ty = check_assignment_variable(ctx, lhs[0]);
            let lop = check_expr(ctx, lhs[0]);
            let rop = check_expr(ctx, rhs[0]);
            if lop.is_invalid() || rop.is_invalid() {
                return;
            }
            // `x += y` desugars to `x = x <op> y`: synthesize and
            // check the underlying binary expression, then assign its
            // result back to the lvalue, rather than the bare `x`.
            let mut folded = check_binary_op(ctx, lhs[0], bin_op, lop, rop);
            check_assignment(ctx, &mut folded, target_ty, "compound assignment");
        }
    }
}

fn inject_using_variable(ctx: &mut CheckerContext, var: EntityId, using_expr: Option<NodeId>) {
    let ty = ctx.entities.get(var).ty;
    let deref = type_deref(&ctx.types, ty);
    let base = base_type(&ctx.types, deref);
    if !is_type_struct(&ctx.types, base) && !is_type_raw_union(&ctx.types, base) {
        let pos = ctx.entities.get(var).pos.clone();
        ctx.error(
            pos,
            "`using` can only be applied to variables of type struct or raw_union",
        );
        return;
    }
    let fields = sema_core::fields_of(&ctx.types, base).to_vec();
    for (i, f) in fields.iter().enumerate() {
        let field_id = ctx.entities.insert(Entity {
            kind: EntityKind::Variable,
            scope: ctx.scope,
            pos: ctx.entities.get(var).pos.clone(),
            name: f.name.clone(),
            ty: f.ty,
            flags: EntityFlags::NONE,
            field_index: Some(i),
            using_parent: Some(var),
            import_scope: None,
            node: None,
        });
        if using_expr.is_some() {
            // `using_expr` is recorded for selector-origin `using`
            // only as provenance; field resolution does not depend
            // on it.
        }
        if let Some(found) = ctx.scopes.insert_entity(ctx.scope, &f.name, field_id) {
            let found_name = ctx.entities.get(found).name.clone();
            let pos = ctx.entities.get(var).pos.clone();
            ctx.error(
                pos,
                format!("namespace collision while `using`: {found_name}"),
            );
            return;
        }
    }
}

fn check_using_stmt(ctx: &mut CheckerContext, pos: Pos, target: sema_core::UsingTarget, expr: NodeId) {
    let _ = target;
    let entity = match ctx.ast.get(expr).kind.clone() {
        AstKind::Ident(name) => ctx.lookup(&name),
        AstKind::SelectorExpr { .. } => check_selector(ctx, expr),
        _ => None,
    };
    let Some(e) = entity else {
        ctx.error(pos, "`using` applied to an unknown entity");
        return;
    };
    match ctx.entities.get(e).kind {
        EntityKind::TypeName => {
            let ty = ctx.entities.get(e).ty;
            let base = base_type(&ctx.types, ty);
            if !is_type_struct(&ctx.types, base) {
                ctx.error(pos, "`using` applied to a type name requires a struct type");
                return;
            }
            let fields = sema_core::fields_of(&ctx.types, base).to_vec();
            for f in fields {
                let fid = ctx.entities.insert(Entity {
                    kind: EntityKind::Variable,
                    scope: ctx.scope,
                    pos: pos.clone(),
                    name: f.name.clone(),
                    ty: f.ty,
                    flags: EntityFlags::NONE,
                    field_index: Some(f.field_index),
                    using_parent: Some(e),
                    import_scope: None,
                    node: None,
                });
                if let Some(found) = ctx.scopes.insert_entity(ctx.scope, &f.name, fid) {
                    let found_name = ctx.entities.get(found).name.clone();
                    ctx.error(pos, format!("namespace collision while `using`: {found_name}"));
                    return;
                }
            }
        }
        EntityKind::Variable => inject_using_variable(ctx, e, Some(expr)),
        EntityKind::Constant => ctx.error(pos, "`using` cannot be applied to a constant"),
        EntityKind::Procedure | EntityKind::Builtin => {
            ctx.error(pos, "`using` cannot be applied to a procedure")
        }
        EntityKind::ImplicitValue => ctx.error(pos, "`using` cannot be applied to an implicit value"),
        EntityKind::Nil => ctx.error(pos, "`using` cannot be applied to `nil`"),
        EntityKind::Invalid => ctx.error(pos, "`using` cannot be applied to an invalid entity"),
        EntityKind::ImportName => ctx.error(pos, "`using` on imports is not supported in this crate"),
    }
}

/// Per-case-clause duplicate-value detection for a value `match`.
/// Keyed on the hash of the case's folded [`ExactValue`]; within a
/// hash bucket, entries are disambiguated by [`are_types_identical`]
/// so e.g. the integer `1` and a same-valued enum constant never
/// collide. Mirrors the `MapTypeAndToken` multimap in the reference
/// checker.
fn check_match_stmt(
    ctx: &mut CheckerContext,
    _pos: Pos,
    init: Option<NodeId>,
    tag: Option<NodeId>,
    body: &[CaseClauseData],
    flags: StmtFlags,
) {
    let mod_flags = flags | StmtFlags::BREAK_ALLOWED;
    let parent = ctx.open_scope();

    if let Some(init) = init {
        check_stmt(ctx, init, StmtFlags::NONE);
    }
    let x = match tag {
        Some(tag) => {
            let mut op = check_expr(ctx, tag);
            check_assignment(ctx, &mut op, None, "match expression");
            op
        }
        None => Operand {
            mode: AddressingMode::Constant,
            ty: ctx.types.bool_type(),
            value: ExactValue::Bool(true),
            expr: NodeId(0),
        },
    };

    let mut first_default: Option<Pos> = None;
    for clause in body.iter() {
        if clause.list.is_empty() {
            if let Some(first_pos) = &first_default {
                ctx.error(first_pos.clone(), "multiple `default` clauses");
            } else {
                first_default = Some(clause.pos.clone());
            }
        }
    }

    let mut seen: HashMap<u64, Vec<(TypeId, Pos)>> = HashMap::new();

    for (i, clause) in body.iter().enumerate() {
        for &expr in &clause.list {
            let mut y = check_expr(ctx, expr);
            if x.is_invalid() || y.is_invalid() {
                continue;
            }
            convert_to_typed(ctx, &mut y, x.ty);
            if y.is_invalid() {
                continue;
            }
            let mut z = y.clone();
            check_comparison(ctx, &mut z, &x, expr);
            if z.is_invalid() || y.mode != AddressingMode::Constant {
                continue;
            }
            if y.value == ExactValue::Invalid {
                continue;
            }
            let key = hash_exact_value(&y.value);
            let expr_pos = ctx.ast.get(expr).pos.clone();
            if let Some(bucket) = seen.get(&key) {
                if let Some((_, prev_pos)) = bucket.iter().find(|(t, _)| are_types_identical(&ctx.types, *t, y.ty)) {
                    ctx.error(
                        expr_pos,
                        format!("duplicate case\n\tprevious case at {prev_pos}"),
                    );
                    continue;
                }
            }
            seen.entry(key).or_default().push((y.ty, expr_pos));
        }

        let case_scope = ctx.open_scope();
        let mut ft_flags = mod_flags;
        if i + 1 < body.len() {
            ft_flags = ft_flags | StmtFlags::FALLTHROUGH_ALLOWED;
        }
        check_stmt_list(ctx, &clause.body, ft_flags);
        ctx.close_scope(case_scope);
    }

    ctx.close_scope(parent);
}

/// `TypeMatchStmt` duplicate detection is keyed on [`TypeId`] identity
/// (the type interner's own deduplication), not structural equality —
/// mirrors the reference checker's pointer-equality `MapBool` keyed by
/// the resolved `Type*`.
fn check_type_match_stmt(
    ctx: &mut CheckerContext,
    pos: Pos,
    init: Option<NodeId>,
    tag: Option<NodeId>,
    body: &[CaseClauseData],
    flags: StmtFlags,
) {
    let mod_flags = flags | StmtFlags::BREAK_ALLOWED;
    let parent = ctx.open_scope();

    if let Some(init) = init {
        check_stmt(ctx, init, StmtFlags::NONE);
    }
    let Some(tag) = tag else {
        ctx.error(pos.clone(), "type match requires a tag expression");
        ctx.close_scope(parent);
        return;
    };
    let x = check_expr(ctx, tag);

    let mut seen: std::collections::HashSet<TypeId> = std::collections::HashSet::new();
    let mut first_default: Option<Pos> = None;

    for (i, clause) in body.iter().enumerate() {
        if clause.list.is_empty() {
            if let Some(first_pos) = &first_default {
                ctx.error(first_pos.clone(), "multiple `default` clauses");
            } else {
                first_default = Some(clause.pos.clone());
            }
        }
        for &expr in &clause.list {
            let op = check_expr(ctx, expr);
            if op.mode != AddressingMode::Type {
                let p = ctx.ast.get(expr).pos.clone();
                ctx.error(p, "expected a type in type match case");
                continue;
            }
            if !seen.insert(op.ty) {
                let p = ctx.ast.get(expr).pos.clone();
                ctx.error(p, "duplicate type in type match");
            }
        }

        let case_scope = ctx.open_scope();
        if let AstKind::Ident(name) = ctx.ast.get(tag).kind.clone() {
            if clause.list.len() == 1 {
                let case_ty = check_expr(ctx, clause.list[0]).ty;
                let id = ctx.entities.insert(Entity {
                    kind: EntityKind::ImplicitValue,
                    scope: ctx.scope,
                    pos: pos.clone(),
                    name: name.clone(),
                    ty: case_ty,
                    flags: EntityFlags::NONE,
                    field_index: None,
                    using_parent: None,
                    import_scope: None,
                    node: None,
                });
                ctx.scopes.insert_entity(ctx.scope, &name, id);
            }
        }
        let _ = x.ty;
        let mut ft_flags = mod_flags;
        if i + 1 < body.len() {
            ft_flags = ft_flags | StmtFlags::FALLTHROUGH_ALLOWED;
        }
        check_stmt_list(ctx, &clause.body, ft_flags);
        ctx.close_scope(case_scope);
    }

    ctx.close_scope(parent);
}

fn hash_exact_value(v: &ExactValue) -> u64 {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};
    let mut h = DefaultHasher::new();
    v.hash(&mut h);
    h.finish()
}

/// `check_is_terminating`: does `node` unconditionally transfer
/// control away from the statement following it (a `return`, or an
/// `if`/`when`/`match`/`type_match` every branch of which terminates,
/// or a condition-less `for` with no reachable `break`)?
pub fn check_is_terminating(ctx: &CheckerContext, node: NodeId) -> bool {
    match &ctx.ast.get(node).kind {
        AstKind::ReturnStmt { .. } => true,
        AstKind::BlockStmt { stmts } => check_is_terminating_list(ctx, stmts),
        AstKind::ExprStmt(e) => check_is_terminating(ctx, *e),
        AstKind::IfStmt {
            body, else_stmt, ..
        } => match else_stmt {
            Some(else_stmt) => {
                check_is_terminating(ctx, *body) && check_is_terminating(ctx, *else_stmt)
            }
            None => false,
        },
        AstKind::WhenStmt {
            body, else_stmt, ..
        } => match else_stmt {
            Some(else_stmt) => {
                check_is_terminating(ctx, *body) && check_is_terminating(ctx, *else_stmt)
            }
            None => false,
        },
        AstKind::ForStmt { cond, body, .. } => cond.is_none() && !check_has_break(ctx, *body, true),
        AstKind::MatchStmt { body, .. } => match_terminates(ctx, body),
        AstKind::DeferStmt { .. } => false,
        AstKind::PushAllocator { body, .. } | AstKind::PushContext { body, .. } => {
            check_is_terminating(ctx, *body)
        }
        _ => false,
    }
}

fn match_terminates(ctx: &CheckerContext, body: &[CaseClauseData]) -> bool {
    let mut has_default = false;
    for clause in body {
        if clause.list.is_empty() {
            has_default = true;
        }
        if !check_is_terminating_list(ctx, &clause.body) || check_has_break_list(ctx, &clause.body, true) {
            return false;
        }
    }
    has_default
}

pub fn check_is_terminating_list(ctx: &CheckerContext, stmts: &[NodeId]) -> bool {
    for stmt in stmts.iter().rev() {
        if !matches!(ctx.ast.get(*stmt).kind, AstKind::EmptyStmt) {
            return check_is_terminating(ctx, *stmt);
        }
    }
    false
}

/// `check_has_break`: does `stmt` contain a `break` that would apply
/// to the statement's own enclosing loop/match (`implicit = true`) or
/// only a `break` that targets an outer construct it is nested inside
/// (`implicit = false`, used when the enclosing construct is itself
/// the thing being asked about)?
pub fn check_has_break(ctx: &CheckerContext, stmt: NodeId, implicit: bool) -> bool {
    match &ctx.ast.get(stmt).kind {
        AstKind::BranchStmt {
            kind: BranchKind::Break,
            ..
        } => implicit,
        AstKind::BlockStmt { stmts } => check_has_break_list(ctx, stmts, implicit),
        AstKind::IfStmt {
            body, else_stmt, ..
        } => {
            check_has_break(ctx, *body, implicit)
                || else_stmt.is_some_and(|e| check_has_break(ctx, e, implicit))
        }
        _ => false,
    }
}

pub fn check_has_break_list(ctx: &CheckerContext, stmts: &[NodeId], implicit: bool) -> bool {
    stmts.iter().any(|&s| check_has_break(ctx, s, implicit))
}
