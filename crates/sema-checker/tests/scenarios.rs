//! End-to-end scenarios over small hand-built statement trees,
//! exercising scoping, shadowing, termination analysis and
//! `using`-injection together rather than in isolation.

use sema_checker::{check_stmt, CheckerContext};
use sema_core::{
    AssignOp, Ast, AstKind, BinaryOp, BranchKind, CaseClauseData, Entity, EntityFlags, EntityKind,
    Field, LiteralData, Pos, StmtFlags, TypeKind, UsingTarget,
};

#[test]
fn nested_block_shadowing_does_not_leak_outer_redeclaration_error() {
    let mut ast = Ast::new();
    let inner_value = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(1)));
    let inner_decl = ast.push(
        Pos::synthetic(),
        AstKind::VarDecl {
            names: vec!["x".into()],
            type_expr: None,
            values: vec![inner_value],
            is_using: false,
        },
    );
    let inner_block = ast.push(Pos::synthetic(), AstKind::BlockStmt { stmts: vec![inner_decl] });
    let outer_value = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(2)));
    let outer_decl = ast.push(
        Pos::synthetic(),
        AstKind::VarDecl {
            names: vec!["x".into()],
            type_expr: None,
            values: vec![outer_value],
            is_using: false,
        },
    );
    let outer_block = ast.push(
        Pos::synthetic(),
        AstKind::BlockStmt {
            stmts: vec![outer_decl, inner_block],
        },
    );

    let mut ctx = CheckerContext::new(&ast);
    check_stmt(&mut ctx, outer_block, StmtFlags::NONE);
    assert!(
        ctx.diagnostics.is_empty(),
        "unexpected diagnostics: {:?}",
        ctx.diagnostics.messages()
    );
}

#[test]
fn fallthrough_only_legal_on_final_case_clause() {
    let mut ast = Ast::new();
    let tag = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(0)));
    let ft_illegal = ast.push(
        Pos::synthetic(),
        AstKind::BranchStmt {
            kind: BranchKind::Fallthrough,
            label: None,
        },
    );
    let ft_legal = ast.push(
        Pos::synthetic(),
        AstKind::BranchStmt {
            kind: BranchKind::Fallthrough,
            label: None,
        },
    );
    let case_a = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(1)));
    let case_b = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(2)));
    let match_stmt = ast.push(
        Pos::synthetic(),
        AstKind::MatchStmt {
            init: None,
            tag: Some(tag),
            body: vec![
                CaseClauseData {
                    pos: Pos::synthetic(),
                    list: vec![case_a],
                    body: vec![ft_illegal],
                },
                CaseClauseData {
                    pos: Pos::synthetic(),
                    list: vec![case_b],
                    body: vec![ft_legal],
                },
            ],
            is_type_match: false,
        },
    );

    let mut ctx = CheckerContext::new(&ast);
    check_stmt(&mut ctx, match_stmt, StmtFlags::NONE);

    let messages = ctx.diagnostics.messages();
    assert_eq!(messages.len(), 1, "expected exactly one diagnostic: {messages:?}");
    assert!(messages[0].contains("fallthrough"));
}

#[test]
fn using_a_struct_variable_injects_its_fields() {
    let mut ast = Ast::new();
    let p_ident = ast.push(Pos::synthetic(), AstKind::Ident("p".into()));
    let using_stmt = ast.push(
        Pos::synthetic(),
        AstKind::UsingStmt {
            target: UsingTarget::Variable,
            expr: p_ident,
        },
    );

    let mut ctx = CheckerContext::new(&ast);
    let int = ctx.types.int_type();
    let point = ctx.types.intern(TypeKind::Struct {
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
    let p = ctx.entities.insert(Entity {
        kind: EntityKind::Variable,
        scope: ctx.scope,
        pos: Pos::synthetic(),
        name: "p".into(),
        ty: point,
        flags: EntityFlags::NONE,
        field_index: None,
        using_parent: None,
        import_scope: None,
        node: None,
    });
    ctx.scopes.insert_entity(ctx.scope, "p", p);

    check_stmt(&mut ctx, using_stmt, StmtFlags::NONE);

    assert!(ctx.diagnostics.is_empty(), "{:?}", ctx.diagnostics.messages());
    assert!(ctx.lookup("x").is_some());
    assert!(ctx.lookup("y").is_some());
}

#[test]
fn compound_assignment_rejects_a_non_numeric_operand() {
    let mut ast = Ast::new();
    let init_value = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Bool(true)));
    let decl = ast.push(
        Pos::synthetic(),
        AstKind::VarDecl {
            names: vec!["flag".into()],
            type_expr: None,
            values: vec![init_value],
            is_using: false,
        },
    );
    let lhs = ast.push(Pos::synthetic(), AstKind::Ident("flag".into()));
    let rhs = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Bool(true)));
    let compound = ast.push(
        Pos::synthetic(),
        AstKind::AssignStmt {
            op: AssignOp::Compound(BinaryOp::Add),
            lhs: vec![lhs],
            rhs: vec![rhs],
        },
    );
    let block = ast.push(Pos::synthetic(), AstKind::BlockStmt { stmts: vec![decl, compound] });

    let mut ctx = CheckerContext::new(&ast);
    check_stmt(&mut ctx, block, StmtFlags::NONE);
    assert!(ctx
        .diagnostics
        .messages()
        .iter()
        .any(|m| m.contains("invalid operand types")));
}

#[test]
fn when_stmt_with_false_condition_checks_only_the_else_branch() {
    let mut ast = Ast::new();
    let cond = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Bool(false)));
    let undeclared = ast.push(Pos::synthetic(), AstKind::Ident("undeclared_in_then".into()));
    let then_bad = ast.push(Pos::synthetic(), AstKind::ExprStmt(undeclared));
    let else_ok = ast.push(Pos::synthetic(), AstKind::BlockStmt { stmts: vec![] });
    let then_blk = ast.push(Pos::synthetic(), AstKind::BlockStmt { stmts: vec![then_bad] });
    let when_stmt = ast.push(
        Pos::synthetic(),
        AstKind::WhenStmt {
            cond,
            body: then_blk,
            else_stmt: Some(else_ok),
        },
    );

    let mut ctx = CheckerContext::new(&ast);
    check_stmt(&mut ctx, when_stmt, StmtFlags::NONE);
    assert!(
        ctx.diagnostics.is_empty(),
        "the `then` branch must not be checked when the constant condition is false: {:?}",
        ctx.diagnostics.messages()
    );
}

#[test]
fn when_stmt_else_must_be_if_or_block() {
    let mut ast = Ast::new();
    let cond = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Bool(true)));
    let then_blk = ast.push(Pos::synthetic(), AstKind::BlockStmt { stmts: vec![] });
    let bad_else = ast.push(Pos::synthetic(), AstKind::EmptyStmt);
    let when_stmt = ast.push(
        Pos::synthetic(),
        AstKind::WhenStmt {
            cond,
            body: then_blk,
            else_stmt: Some(bad_else),
        },
    );

    let mut ctx = CheckerContext::new(&ast);
    check_stmt(&mut ctx, when_stmt, StmtFlags::NONE);
    assert!(ctx
        .diagnostics
        .messages()
        .iter()
        .any(|m| m.contains("invalid `else` statement")));
}

#[test]
fn bool_basic_type_is_recognized_in_condition() {
    let mut ast = Ast::new();
    let cond = ast.push(Pos::synthetic(), AstKind::BasicLit(LiteralData::Integer(1)));
    let body = ast.push(Pos::synthetic(), AstKind::BlockStmt { stmts: vec![] });
    let if_stmt = ast.push(
        Pos::synthetic(),
        AstKind::IfStmt {
            init: None,
            cond,
            body,
            else_stmt: None,
        },
    );
    let mut ctx = CheckerContext::new(&ast);
    check_stmt(&mut ctx, if_stmt, StmtFlags::NONE);
    assert!(ctx
        .diagnostics
        .messages()
        .iter()
        .any(|m| m.contains("non-boolean")));
}
