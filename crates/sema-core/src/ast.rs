//! The pre-built AST the checker walks.
//!
//! Nodes live in a flat arena indexed by [`NodeId`] rather than being
//! linked by `Box`/`Rc` child pointers, so a node can be referred to
//! from elsewhere (an `Entity::node`, an `ExactValue::Compound`) by a
//! plain, copyable id. There is no parser in this crate: trees are
//! constructed directly (by a caller's own parser, or by test code).

use crate::flags::StmtStateFlags;
use crate::pos::Pos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsingTarget {
    /// `using x` where `x` is a struct-typed variable: each field of
    /// `x` is injected into the enclosing scope.
    Variable,
    /// `using import_name`: the imported scope's exported names are
    /// injected into the enclosing scope.
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BranchKind {
    Break,
    Continue,
    Fallthrough,
    /// `goto label` — checked only for "label exists", never affects
    /// `StmtFlags`.
    Goto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IncDecOp {
    Inc,
    Dec,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignOp {
    /// `=`
    Assign,
    /// `+=`, `-=`, `*=`, ... ; desugars to `lhs = lhs <op> rhs` during
    /// checking.
    Compound(BinaryOp),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Quo,
    Mod,
    And,
    Or,
    Xor,
    Shl,
    Shr,
    CmpEq,
    CmpNe,
    CmpLt,
    CmpLe,
    CmpGt,
    CmpGe,
    LogicAnd,
    LogicOr,
}

impl BinaryOp {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOp::CmpEq
                | BinaryOp::CmpNe
                | BinaryOp::CmpLt
                | BinaryOp::CmpLe
                | BinaryOp::CmpGt
                | BinaryOp::CmpGe
        )
    }
}

/// A field-value pair inside a `CompoundLit` (`Point{x = 1, y = 2}`),
/// or a positional element when `name` is `None`.
#[derive(Debug, Clone)]
pub struct FieldValueData {
    pub name: Option<String>,
    pub value: NodeId,
}

#[derive(Debug, Clone)]
pub struct CaseClauseData {
    /// The clause's own position, so diagnostics that must cite a
    /// specific clause (e.g. a second `default`) can point at it
    /// instead of the enclosing `match`/`type_match` statement.
    pub pos: Pos,
    /// Case expressions/types (empty = the `default`/`else` clause).
    pub list: Vec<NodeId>,
    pub body: Vec<NodeId>,
}

/// What an AST node actually represents. Naming and shape follow the
/// node kinds enumerated for the statement checker and the expression
/// forms it must be able to look inside (identifiers, selectors,
/// literals, calls, compound literals, binary expressions) — there is
/// no `ParenExpr`, parenthesization having already been resolved by
/// the (out-of-scope) parser that built this tree.
#[derive(Debug, Clone)]
pub enum AstKind {
    BadStmt,
    BadDecl,
    EmptyStmt,
    ExprStmt(NodeId),
    TagStmt {
        tag: String,
        stmt: NodeId,
    },
    IncDecStmt {
        op: IncDecOp,
        expr: NodeId,
    },
    AssignStmt {
        op: AssignOp,
        lhs: Vec<NodeId>,
        rhs: Vec<NodeId>,
    },
    BlockStmt {
        stmts: Vec<NodeId>,
    },
    IfStmt {
        init: Option<NodeId>,
        cond: NodeId,
        body: NodeId,
        else_stmt: Option<NodeId>,
    },
    WhenStmt {
        cond: NodeId,
        body: NodeId,
        else_stmt: Option<NodeId>,
    },
    ReturnStmt {
        results: Vec<NodeId>,
    },
    ForStmt {
        init: Option<NodeId>,
        cond: Option<NodeId>,
        post: Option<NodeId>,
        body: NodeId,
    },
    MatchStmt {
        init: Option<NodeId>,
        tag: Option<NodeId>,
        body: Vec<CaseClauseData>,
        is_type_match: bool,
    },
    DeferStmt {
        stmt: NodeId,
    },
    BranchStmt {
        kind: BranchKind,
        label: Option<String>,
    },
    UsingStmt {
        target: UsingTarget,
        expr: NodeId,
    },
    PushAllocator {
        expr: NodeId,
        body: NodeId,
    },
    PushContext {
        expr: NodeId,
        body: NodeId,
    },
    VarDecl {
        names: Vec<String>,
        type_expr: Option<NodeId>,
        values: Vec<NodeId>,
        is_using: bool,
    },
    ConstDecl {
        names: Vec<String>,
        type_expr: Option<NodeId>,
        values: Vec<NodeId>,
    },
    TypeDecl {
        name: String,
        type_expr: NodeId,
    },
    ProcDecl {
        name: String,
        params: Vec<NodeId>,
        results: Vec<NodeId>,
        body: Option<NodeId>,
    },
    Ident(String),
    SelectorExpr {
        base: NodeId,
        field: String,
    },
    BasicLit(LiteralData),
    BinaryExpr {
        op: BinaryOp,
        lhs: NodeId,
        rhs: NodeId,
    },
    CallExpr {
        callee: NodeId,
        args: Vec<NodeId>,
    },
    FieldValue(FieldValueData),
    CompoundLit {
        type_expr: Option<NodeId>,
        elems: Vec<NodeId>,
    },
}

#[derive(Debug, Clone)]
pub enum LiteralData {
    Integer(i128),
    Float(f64),
    String(String),
    Bool(bool),
}

#[derive(Debug, Clone)]
pub struct AstNode {
    pub id: NodeId,
    pub pos: Pos,
    pub stmt_state_flags: StmtStateFlags,
    pub kind: AstKind,
}

/// Owns every node of one checked unit (a file, or a single test
/// fixture). Nodes are appended once and never removed; a
/// [`NodeId`] is valid for the lifetime of the `Ast` that produced it.
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, pos: Pos, kind: AstKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AstNode {
            id,
            pos,
            stmt_state_flags: StmtStateFlags::NONE,
            kind,
        });
        id
    }

    pub fn push_with_flags(
        &mut self,
        pos: Pos,
        kind: AstKind,
        stmt_state_flags: StmtStateFlags,
    ) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(AstNode {
            id,
            pos,
            stmt_state_flags,
            kind,
        });
        id
    }

    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }
}

/// Parenthesization is already resolved by the time a tree reaches
/// this crate, so unwrapping is the identity function. Kept as a
/// named function (rather than inlined at call sites) so callers read
/// the same as the reference checker's `unparen_expr` call sites.
pub fn unparen_expr(id: NodeId) -> NodeId {
    id
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_assigns_sequential_ids() {
        let mut ast = Ast::new();
        let a = ast.push(Pos::synthetic(), AstKind::EmptyStmt);
        let b = ast.push(Pos::synthetic(), AstKind::EmptyStmt);
        assert_eq!(a, NodeId(0));
        assert_eq!(b, NodeId(1));
    }

    #[test]
    fn unparen_is_identity() {
        let mut ast = Ast::new();
        let id = ast.push(Pos::synthetic(), AstKind::Ident("x".into()));
        assert_eq!(unparen_expr(id), id);
    }
}
