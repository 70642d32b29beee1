//! The checker's mutable state: type interner, scope/entity arenas,
//! diagnostic sink, and the flow-sensitive bits (current scope,
//! `stmt_state_flags`) that `check_stmt` pushes and pops as it
//! recurses.

use sema_core::{
    Ast, DiagnosticSink, EntityArena, EntityId, Pos, ScopeArena, ScopeId, StmtStateFlags,
    TypeInterner,
};

pub struct CheckerContext<'a> {
    pub ast: &'a Ast,
    pub types: TypeInterner,
    pub scopes: ScopeArena,
    pub entities: EntityArena,
    pub diagnostics: DiagnosticSink,
    pub scope: ScopeId,
    pub stmt_state_flags: StmtStateFlags,
    /// The procedure currently being checked, for `return` arity/type
    /// checks. `None` at file scope.
    pub curr_proc_results: Option<Vec<sema_core::TypeId>>,
}

impl<'a> CheckerContext<'a> {
    pub fn new(ast: &'a Ast) -> Self {
        let mut scopes = ScopeArena::new();
        let scope = scopes.open(None);
        CheckerContext {
            ast,
            types: TypeInterner::new(),
            scopes,
            entities: EntityArena::new(),
            diagnostics: DiagnosticSink::new(),
            scope,
            stmt_state_flags: StmtStateFlags::NONE,
            curr_proc_results: None,
        }
    }

    pub fn error(&mut self, pos: Pos, message: impl Into<String>) {
        self.diagnostics.error(pos, message);
    }

    /// Open a new scope nested under the current one, returning the
    /// new scope's id; caller is responsible for restoring
    /// `self.scope` afterwards (mirrors `check_open_scope` /
    /// `check_close_scope` being paired at every call site).
    pub fn open_scope(&mut self) -> ScopeId {
        let id = self.scopes.open(Some(self.scope));
        self.scope = id;
        id
    }

    pub fn close_scope(&mut self, parent: ScopeId) {
        self.scope = parent;
    }

    pub fn lookup(&self, name: &str) -> Option<EntityId> {
        self.scopes.lookup_entity(self.scope, name)
    }
}
