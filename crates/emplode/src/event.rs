//! Event manager (C6, §4.5). Signal/action registry; dispatch itself
//! (evaluating parameter lvalues and the action subtree) happens in
//! `eval.rs`/`interpreter.rs`, which are the only things that also know
//! how to run a `Node`.

use indexmap::IndexMap;

use crate::ast::Node;

/// One registered handler: captured parameter-target subtrees (each
/// must resolve to an lvalue, per §4.3 rule 5) and the unevaluated
/// action subtree.
#[derive(Clone)]
pub struct Action {
    pub signal_name: String,
    pub params: Vec<Node>,
    pub action: Node,
    pub def_line: usize,
}

/// A declared signal: its name, declared parameter count, and the
/// ordered list of actions registered against it (§3.4, §4.5).
pub struct Event {
    pub signal_name: String,
    pub num_params: usize,
    pub actions: Vec<Action>,
}

#[derive(Default)]
pub struct EventManager {
    events: IndexMap<String, Event>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_signal(&self, name: &str) -> bool {
        self.events.contains_key(name)
    }

    pub fn add_signal(&mut self, name: impl Into<String>, num_params: usize) -> Result<(), String> {
        let name = name.into();
        if self.events.contains_key(&name) {
            return Err(format!("signal '{name}' already declared"));
        }
        self.events.insert(
            name.clone(),
            Event {
                signal_name: name,
                num_params,
                actions: Vec::new(),
            },
        );
        Ok(())
    }

    pub fn add_action(&mut self, action: Action) -> Result<(), String> {
        match self.events.get_mut(&action.signal_name) {
            Some(event) => {
                event.actions.push(action);
                Ok(())
            }
            None => Err(format!("unknown signal '{}'", action.signal_name)),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Event> {
        self.events.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.values()
    }
}
