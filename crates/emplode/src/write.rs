//! Canonical serialization (§6.3). Re-emits a parseable source document
//! from the root scope, then the event registry.

use std::fmt::Write as _;

use crate::scope::ScopeId;
use crate::symbol::{Symbol, SymbolKind};
use crate::symbol_table::SymbolTable;
use crate::value::{format_number, quote_string};

const DESC_COLUMN: usize = 32;

pub fn write_program(table: &SymbolTable) -> String {
    let mut out = String::new();
    write_scope_members(table, table.root, 0, &mut out);
    write_events(table, &mut out);
    out
}

fn indent(out: &mut String, depth: usize) {
    for _ in 0..depth {
        out.push_str("    ");
    }
}

fn emit_desc(out: &mut String, line_start_len: usize, desc: &str) {
    if desc.is_empty() {
        out.push('\n');
        return;
    }
    let current = out.len() - line_start_len;
    let pad = DESC_COLUMN.saturating_sub(current).max(1);
    for _ in 0..pad {
        out.push(' ');
    }
    let _ = write!(out, "// {desc}\n");
}

fn write_scope_members(table: &SymbolTable, scope: ScopeId, depth: usize, out: &mut String) {
    for (name, &id) in &table.scopes.get(scope).members {
        let symbol = table.symbols.get(id);
        if symbol.builtin {
            continue;
        }
        write_symbol(table, name, symbol, depth, out);
    }
}

fn write_symbol(table: &SymbolTable, name: &str, symbol: &Symbol, depth: usize, out: &mut String) {
    match &symbol.kind {
        SymbolKind::Function(_) => {}
        SymbolKind::Var(value) => {
            let line_start = out.len();
            indent(out, depth);
            let literal = match value {
                crate::value::Scalar::Number(n) => format_number(*n),
                crate::value::Scalar::Text(s) => quote_string(s),
            };
            let _ = write!(out, "Var {name} = {literal};");
            emit_desc(out, line_start, &symbol.desc);
        }
        SymbolKind::LinkedVar(_) | SymbolKind::LinkedFuns(_) => {
            let line_start = out.len();
            indent(out, depth);
            let literal = if symbol.is_string() {
                quote_string(&symbol.as_string())
            } else {
                format_number(symbol.as_double())
            };
            let _ = write!(out, "Var {name} = {literal};");
            emit_desc(out, line_start, &symbol.desc);
        }
        SymbolKind::Scope(child) => {
            let line_start = out.len();
            indent(out, depth);
            let _ = write!(out, "Struct {name} {{");
            emit_desc(out, line_start, &symbol.desc);
            write_scope_members(table, *child, depth + 1, out);
            indent(out, depth);
            out.push_str("}\n");
        }
        SymbolKind::Object {
            scope: child,
            type_name,
            ..
        } => {
            let line_start = out.len();
            indent(out, depth);
            let _ = write!(out, "{type_name} {name} {{");
            emit_desc(out, line_start, &symbol.desc);
            write_scope_members(table, *child, depth + 1, out);
            indent(out, depth);
            out.push_str("}\n");
        }
        SymbolKind::Special(_) | SymbolKind::Error(_) => {}
    }
}

fn write_events(table: &SymbolTable, out: &mut String) {
    for event in table.events.iter() {
        for action in &event.actions {
            let params: Vec<String> = action
                .params
                .iter()
                .map(|p| render_param(table, p))
                .collect();
            let _ = write!(
                out,
                "@{}({}) {};\n",
                event.signal_name,
                params.join(", "),
                render_action(table, &action.action)
            );
        }
    }
}

fn render_param(table: &SymbolTable, node: &crate::ast::Node) -> String {
    match node {
        crate::ast::Node::Leaf {
            value: crate::ast::LeafRef::Named(id),
            ..
        } => table.symbols.get(*id).name.clone(),
        _ => "?".to_string(),
    }
}

/// Best-effort single-line rendering of an action subtree. The language
/// surface is small enough at the `Call`/`Assign` shapes used by event
/// actions that a full pretty-printer is unnecessary here.
fn render_action(table: &SymbolTable, node: &crate::ast::Node) -> String {
    use crate::ast::{LeafRef, Node};
    match node {
        Node::Leaf { value, .. } => {
            let id = match value {
                LeafRef::Literal(id) | LeafRef::Named(id) => *id,
            };
            let symbol = table.symbols.get(id);
            if symbol.name.is_empty() {
                symbol.as_string()
            } else {
                symbol.name.clone()
            }
        }
        Node::Call { callee, args, .. } => {
            let args: Vec<String> = args.iter().map(|a| render_action(table, a)).collect();
            format!("{}({})", render_action(table, callee), args.join(", "))
        }
        Node::Assign { lhs, rhs, .. } => {
            format!("{} = {}", render_action(table, lhs), render_action(table, rhs))
        }
        _ => String::new(),
    }
}
