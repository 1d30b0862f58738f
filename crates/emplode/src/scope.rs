//! Arena-indexed scopes (§3.4, Design Note 9).
//!
//! The original keeps raw back-pointers from a scope to its parent and
//! from every symbol to its owning scope. Here both become non-owning
//! indices into a single arena owned by the `SymbolTable` — there is no
//! way to construct a cycle because `ScopeId`/`SymbolId` are `Copy`
//! indices, not pointers, and nothing but the arena itself ever drops a
//! `Scope` or `Symbol`.

use indexmap::IndexMap;

use crate::symbol::SymbolId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// One nested namespace: an insertion-ordered name→symbol map (§3.4,
/// required for §6.3's "in insertion order" serialization rule) plus a
/// parent link used only for outward-scanning lookup (§4.2.3).
#[derive(Debug, Default)]
pub struct Scope {
    pub members: IndexMap<String, SymbolId>,
    pub parent: Option<ScopeId>,
}

impl Scope {
    pub fn new(parent: Option<ScopeId>) -> Self {
        Self {
            members: IndexMap::new(),
            parent,
        }
    }
}

/// Owns every `Scope` for one interpreter instance. Scopes are never
/// individually freed (only whole interpreters are torn down), so this
/// is a plain growable arena with no slot reuse — unlike the symbol
/// arena, which does reuse slots for temporaries.
#[derive(Debug, Default)]
pub struct ScopeArena {
    scopes: Vec<Scope>,
}

impl ScopeArena {
    pub fn new() -> Self {
        Self { scopes: Vec::new() }
    }

    pub fn alloc(&mut self, parent: Option<ScopeId>) -> ScopeId {
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
}
