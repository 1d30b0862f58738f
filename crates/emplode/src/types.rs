//! Host type registry (§3.4, §4.7). Stands in for the original's
//! `TypeInfo`/`TypeInfo.hpp`.

use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::EmplodeResult;
use crate::symbol::{EmplodeObject, SymbolId};
use crate::symbol_table::SymbolTable;

pub type ConstructorFn = Rc<dyn Fn(&str) -> Box<dyn EmplodeObject>>;
/// Deep-copies a host object; `None` means the type never supports
/// being copied (§12: copying such an Object is then a `RuntimeError`
/// rather than the original's silent no-op).
pub type CopyFn = Rc<dyn Fn(&dyn EmplodeObject) -> Box<dyn EmplodeObject>>;
pub type MemberFn = Rc<dyn Fn(&mut dyn EmplodeObject, &mut SymbolTable, &[SymbolId]) -> EmplodeResult<SymbolId>>;

#[derive(Clone)]
pub struct MemberFunctionInfo {
    pub name: String,
    pub desc: String,
    pub call: MemberFn,
}

/// One entry in the host type registry: description, constructor,
/// copy function, default ownership, and member functions
/// (§4.7 "Register type").
#[derive(Clone)]
pub struct TypeInfo {
    pub name: String,
    pub desc: String,
    pub constructor: Option<ConstructorFn>,
    pub copy: Option<CopyFn>,
    pub owned_by_default: bool,
    pub member_functions: IndexMap<String, MemberFunctionInfo>,
}

impl TypeInfo {
    pub fn new(name: impl Into<String>, desc: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            desc: desc.into(),
            constructor: None,
            copy: None,
            owned_by_default: true,
            member_functions: IndexMap::new(),
        }
    }

    pub fn with_constructor(mut self, f: impl Fn(&str) -> Box<dyn EmplodeObject> + 'static) -> Self {
        self.constructor = Some(Rc::new(f));
        self
    }

    pub fn with_copy(mut self, f: impl Fn(&dyn EmplodeObject) -> Box<dyn EmplodeObject> + 'static) -> Self {
        self.copy = Some(Rc::new(f));
        self
    }

    pub fn add_member_function(
        &mut self,
        name: impl Into<String>,
        desc: impl Into<String>,
        call: impl Fn(&mut dyn EmplodeObject, &mut SymbolTable, &[SymbolId]) -> EmplodeResult<SymbolId> + 'static,
    ) {
        let name = name.into();
        self.member_functions.insert(
            name.clone(),
            MemberFunctionInfo {
                name,
                desc: desc.into(),
                call: Rc::new(call),
            },
        );
    }
}

#[derive(Default)]
pub struct TypeRegistry {
    by_name: IndexMap<String, TypeInfo>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, info: TypeInfo) {
        self.by_name.insert(info.name.clone(), info);
    }

    pub fn get(&self, name: &str) -> Option<&TypeInfo> {
        self.by_name.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }
}
