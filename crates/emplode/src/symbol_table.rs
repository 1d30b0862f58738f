//! C3: nested scopes, outward-scan lookup, host-type registry,
//! event registry, stream registry — the root object every other
//! component borrows through.

use std::rc::Rc;

use crate::error::{EmplodeError, EmplodeResult, Site};
use crate::event::EventManager;
use crate::function::{FunctionValue, Overload, VARIADIC};
use crate::scope::{ScopeArena, ScopeId};
use crate::streams::StreamRegistry;
use crate::symbol::{PlaceholderObject, Symbol, SymbolArena, SymbolId, SymbolKind};
use crate::types::TypeRegistry;
use crate::value::Scalar;

pub struct SymbolTable {
    pub scopes: ScopeArena,
    pub symbols: SymbolArena,
    pub root: ScopeId,
    pub types: TypeRegistry,
    pub events: EventManager,
    pub streams: StreamRegistry,
}

impl SymbolTable {
    pub fn new() -> Self {
        let mut scopes = ScopeArena::new();
        let root = scopes.alloc(None);
        Self {
            scopes,
            symbols: SymbolArena::new(),
            root,
            types: TypeRegistry::new(),
            events: EventManager::new(),
            streams: StreamRegistry::new(),
        }
    }

    /// `LookupSymbol(name, scan_parents)` of §4.4: local lookup first,
    /// then outward through parents if `scan_parents` and not found.
    pub fn lookup_symbol(&self, scope: ScopeId, name: &str, scan_parents: bool) -> Option<SymbolId> {
        let body = self.scopes.get(scope);
        if let Some(&id) = body.members.get(name) {
            return Some(id);
        }
        if scan_parents {
            if let Some(parent) = body.parent {
                return self.lookup_symbol(parent, name, true);
            }
        }
        None
    }

    /// Name of the scope for diagnostics' "active scope" field. Scopes
    /// are anonymous in the arena itself; the name is whatever member
    /// name points back at this scope from its parent, or `"<root>"`.
    pub fn scope_name(&self, scope: ScopeId) -> String {
        if scope == self.root {
            return "<root>".to_string();
        }
        if let Some(parent) = self.scopes.get(scope).parent {
            let parent_body = self.scopes.get(parent);
            for (name, id) in &parent_body.members {
                if self.symbols.get(*id).scope_id() == Some(scope) {
                    return name.clone();
                }
            }
        }
        "<scope>".to_string()
    }

    pub fn site(&self, origin: &str, line: usize, scope: ScopeId) -> Site {
        Site::new(origin, line, self.scope_name(scope))
    }

    /// `AddVar`/`AddScope`/`AddObject(typeName, varName, parentScope)`
    /// of §4.4: place a newly constructed symbol in a scope, fail if
    /// the name already exists.
    fn declare(&mut self, scope: ScopeId, name: &str, symbol: Symbol) -> EmplodeResult<SymbolId> {
        if self.scopes.get(scope).members.contains_key(name) {
            return Err(EmplodeError::name(
                self.site("load", 0, scope),
                format!("cannot redeclare '{name}' in this scope"),
            ));
        }
        let id = self.symbols.alloc(symbol);
        self.scopes.get_mut(scope).members.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn add_var(
        &mut self,
        scope: ScopeId,
        name: &str,
        desc: &str,
        value: Scalar,
    ) -> EmplodeResult<SymbolId> {
        let mut symbol = Symbol::new(name, SymbolKind::Var(value), Some(scope));
        symbol.desc = desc.to_string();
        self.declare(scope, name, symbol)
    }

    pub fn add_scope(&mut self, scope: ScopeId, name: &str, desc: &str) -> EmplodeResult<(SymbolId, ScopeId)> {
        let child = self.scopes.alloc(Some(scope));
        let mut symbol = Symbol::new(name, SymbolKind::Scope(child), Some(scope));
        symbol.desc = desc.to_string();
        let id = self.declare(scope, name, symbol)?;
        Ok((id, child))
    }

    pub fn add_object(
        &mut self,
        scope: ScopeId,
        name: &str,
        desc: &str,
        type_name: &str,
        object: Box<dyn crate::symbol::EmplodeObject>,
        owned: bool,
    ) -> EmplodeResult<(SymbolId, ScopeId)> {
        let child = self.scopes.alloc(Some(scope));
        let mut symbol = Symbol::new(
            name,
            SymbolKind::Object {
                scope: child,
                object,
                type_name: type_name.to_string(),
                owned,
            },
            Some(scope),
        );
        symbol.desc = desc.to_string();
        let id = self.declare(scope, name, symbol)?;
        self.bind_member_functions(id, child, type_name)?;
        Ok((id, child))
    }

    /// Wires every `MemberFunctionInfo` registered on `type_name` into
    /// `child` as an ordinary `builtin` Function symbol, so calling
    /// `obj.method(args)` resolves through the usual dotted-name lookup
    /// and `Call` dispatch rather than a separate code path (§4.7). The
    /// call itself briefly swaps the object out of its own slot with a
    /// `PlaceholderObject` so it can hand the host closure `&mut dyn
    /// EmplodeObject` and `&mut SymbolTable` at once without aliasing
    /// the arena.
    fn bind_member_functions(&mut self, object_id: SymbolId, child: ScopeId, type_name: &str) -> EmplodeResult<()> {
        let Some(info) = self.types.get(type_name) else {
            return Ok(());
        };
        let member_fns: Vec<(String, String, crate::types::MemberFn)> = info
            .member_functions
            .values()
            .map(|m| (m.name.clone(), m.desc.clone(), m.call.clone()))
            .collect();

        for (name, desc, call) in member_fns {
            let wrapped = Overload {
                arity: VARIADIC,
                call: Rc::new(move |table, args| {
                    let mut object: Box<dyn crate::symbol::EmplodeObject> =
                        match &mut table.symbols.get_mut(object_id).kind {
                            SymbolKind::Object { object, .. } => {
                                std::mem::replace(object, Box::new(PlaceholderObject))
                            }
                            _ => unreachable!("member function bound to a non-object symbol"),
                        };
                    let result = call(object.as_mut(), table, args);
                    if let SymbolKind::Object { object: slot, .. } = &mut table.symbols.get_mut(object_id).kind {
                        *slot = object;
                    }
                    result
                }),
            };
            let mut symbol = Symbol::new(name.as_str(), SymbolKind::Function(FunctionValue::single(wrapped, false)), Some(child));
            symbol.desc = desc;
            symbol.builtin = true;
            self.declare(child, name.as_str(), symbol)?;
        }
        Ok(())
    }

    /// `MakeTempSymbol<T>(value)` of §4.4.
    pub fn make_temp_number(&mut self, n: f64) -> SymbolId {
        self.symbols.alloc(Symbol::temp(SymbolKind::Var(Scalar::Number(n))))
    }

    pub fn make_temp_string(&mut self, s: impl Into<String>) -> SymbolId {
        self.symbols.alloc(Symbol::temp(SymbolKind::Var(Scalar::Text(s.into()))))
    }

    pub fn make_temp_var(&mut self, v: Scalar) -> SymbolId {
        self.symbols.alloc(Symbol::temp(SymbolKind::Var(v)))
    }

    pub fn make_temp_error(&mut self, message: impl Into<String>) -> SymbolId {
        self.symbols.alloc(Symbol::temp(SymbolKind::Error(message.into())))
    }

    /// Release a temporary if it is one; adopting (non-temporary)
    /// symbols are left alone, matching "consumed or released" (§3.2).
    pub fn release_if_temporary(&mut self, id: SymbolId) {
        if self.symbols.get(id).temporary {
            self.symbols.release(id);
        }
    }

    /// The lhs's copy-value policy (§4.3 rule 3, §3.2's `CopyValue`):
    /// variant-specific, and the only thing `Assign` and event
    /// parameter binding ever call.
    pub fn copy_value(&mut self, lhs: SymbolId, rhs: SymbolId, site: &Site) -> EmplodeResult<()> {
        if self.symbols.get(lhs).is_function() {
            return self.copy_function(lhs, rhs, site);
        }
        if self.symbols.get(lhs).is_scope() {
            return self.copy_scope(lhs, rhs, site);
        }

        // Var / LinkedVar / LinkedFuns: copy double-or-string by the
        // rhs's own kind.
        let rhs_is_string = self.symbols.get(rhs).is_string() && !self.symbols.get(rhs).is_numeric();
        if rhs_is_string {
            let text = self.symbols.get(rhs).as_string();
            self.symbols.get_mut(lhs).set_string(text);
        } else {
            let n = self.symbols.get(rhs).as_double();
            self.symbols.get_mut(lhs).set_double(n);
        }
        Ok(())
    }

    fn copy_function(&mut self, lhs: SymbolId, rhs: SymbolId, site: &Site) -> EmplodeResult<()> {
        let overloads = match &self.symbols.get(rhs).kind {
            SymbolKind::Function(f) => f.clone(),
            _ => {
                return Err(EmplodeError::runtime(
                    site.clone(),
                    "cannot assign a non-function to a function".to_string(),
                ))
            }
        };
        if let SymbolKind::Function(existing) = &mut self.symbols.get_mut(lhs).kind {
            *existing = overloads;
        }
        Ok(())
    }

    /// Scope assignment creates no new members, ever: every name in
    /// `rhs` must already exist on `lhs`, or the whole copy fails
    /// (§3.2, the original's `Symbol_Scope::CopyValue`).
    fn copy_scope(&mut self, lhs: SymbolId, rhs: SymbolId, site: &Site) -> EmplodeResult<()> {
        let rhs_scope = self.symbols.get(rhs).scope_id().ok_or_else(|| {
            EmplodeError::runtime(site.clone(), "assigning a non-scope value to a scope".to_string())
        })?;
        let lhs_scope = self.symbols.get(lhs).scope_id().unwrap();

        let rhs_members: Vec<(String, SymbolId)> = self
            .scopes
            .get(rhs_scope)
            .members
            .iter()
            .map(|(k, v)| (k.clone(), *v))
            .collect();

        for (name, rhs_member) in rhs_members {
            if self.symbols.get(rhs_member).is_function() {
                continue; // functions are never copied into an existing scope
            }
            let lhs_member = *self
                .scopes
                .get(lhs_scope)
                .members
                .get(&name)
                .ok_or_else(|| {
                    EmplodeError::name(
                        site.clone(),
                        format!("target scope has no member '{name}' to assign into"),
                    )
                })?;
            self.copy_value(lhs_member, rhs_member, site)?;
        }

        // Object symbols additionally deep-copy the wrapped host object
        // via the type's registered copy function (§12, resolving the
        // original's `Symbol_Object` copy-constructor TODO).
        if let SymbolKind::Object { type_name, .. } = &self.symbols.get(lhs).kind {
            let type_name = type_name.clone();
            let copy_fn = self.types.get(&type_name).and_then(|t| t.copy.clone());
            match copy_fn {
                Some(copy_fn) => {
                    let copied = {
                        let SymbolKind::Object { object, .. } = &self.symbols.get(rhs).kind else {
                            return Err(EmplodeError::runtime(
                                site.clone(),
                                "assigning a non-object to an object".to_string(),
                            ));
                        };
                        copy_fn(object.as_ref())
                    };
                    if let SymbolKind::Object { object, .. } = &mut self.symbols.get_mut(lhs).kind {
                        *object = copied;
                    }
                }
                None => {
                    return Err(EmplodeError::runtime(
                        site.clone(),
                        format!("type '{type_name}' has no registered copy function"),
                    ))
                }
            }
        }
        Ok(())
    }
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}
