//! Lexical scopes.
//!
//! A [`Scope`] owns a name -> [`EntityId`] map plus a parent link,
//! stored in a [`ScopeArena`] and referenced by [`ScopeId`] rather
//! than `Rc<RefCell<Scope>>`, per this workspace's design-notes
//! guidance to sidestep the `Scope <-> Entity` reference cycle with
//! arena indices instead of reference counting.

use std::collections::HashMap;

use crate::entity::EntityId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ScopeId(pub u32);

#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    elements: HashMap<String, EntityId>,
    /// Declaration order, kept alongside the map so iteration (e.g.
    /// "unused variable" diagnostics) is deterministic.
    order: Vec<String>,
    pub is_proc_body: bool,
}

impl Scope {
    fn new(parent: Option<ScopeId>) -> Self {
        Scope {
            parent,
            elements: HashMap::new(),
            order: Vec::new(),
            is_proc_body: false,
        }
    }

    /// Insert `name -> id`, returning the entity previously bound to
    /// `name` in *this* scope (not an ancestor), if any. The caller
    /// decides whether a returned `Some` is a redeclaration error.
    pub fn insert(&mut self, name: &str, id: EntityId) -> Option<EntityId> {
        let prev = self.elements.insert(name.to_string(), id);
        if prev.is_none() {
            self.order.push(name.to_string());
        }
        prev
    }

    pub fn get_local(&self, name: &str) -> Option<EntityId> {
        self.elements.get(name).copied()
    }

    pub fn declared_names(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(|s| s.as_str())
    }
}

#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, parent: Option<ScopeId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(parent));
        id
    }

    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    pub fn insert_entity(&mut self, scope: ScopeId, name: &str, id: EntityId) -> Option<EntityId> {
        self.get_mut(scope).insert(name, id)
    }

    /// Walk `scope` and its ancestors looking for `name`. Mirrors
    /// `scope_lookup_entity`.
    pub fn lookup_entity(&self, scope: ScopeId, name: &str) -> Option<EntityId> {
        let mut cur = Some(scope);
        while let Some(id) = cur {
            let s = self.get(id);
            if let Some(e) = s.get_local(name) {
                return Some(e);
            }
            cur = s.parent;
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_walks_parent_chain() {
        let mut arena = ScopeArena::new();
        let outer = arena.open(None);
        let inner = arena.open(Some(outer));
        arena.insert_entity(outer, "x", EntityId(1));
        assert_eq!(arena.lookup_entity(inner, "x"), Some(EntityId(1)));
        assert_eq!(arena.lookup_entity(inner, "missing"), None);
    }

    #[test]
    fn inner_shadows_outer() {
        let mut arena = ScopeArena::new();
        let outer = arena.open(None);
        let inner = arena.open(Some(outer));
        arena.insert_entity(outer, "x", EntityId(1));
        arena.insert_entity(inner, "x", EntityId(2));
        assert_eq!(arena.lookup_entity(inner, "x"), Some(EntityId(2)));
        assert_eq!(arena.lookup_entity(outer, "x"), Some(EntityId(1)));
    }

    #[test]
    fn redeclaration_in_same_scope_returns_previous() {
        let mut arena = ScopeArena::new();
        let s = arena.open(None);
        arena.insert_entity(s, "x", EntityId(1));
        let prev = arena.insert_entity(s, "x", EntityId(2));
        assert_eq!(prev, Some(EntityId(1)));
    }
}
