//! The tree-walking evaluator (part of C5, §4.3). One recursive walk;
//! `Flow` is the Rust-side encoding of "every node's Evaluate returns
//! either null or a symbol pointer" (§4.3 rule 1) plus the BREAK/
//! CONTINUE/RETURN sentinels that must propagate unmodified (§4.3 rule
//! 2, and the `Return` sentinel SPEC_FULL.md §13 adds).

use crate::ast::{BinaryOpKind, LeafRef, Node, UnaryOpKind};
use crate::error::{EmplodeError, EmplodeResult, Site};
use crate::event::Action;
use crate::scope::ScopeId;
use crate::symbol::{SymbolId, SymbolKind};
use crate::symbol_table::SymbolTable;
use crate::value::Scalar;

/// Outcome of evaluating one node. `None` is the "otherwise returns
/// null" case (§3.3's Block/If/While rows); `Value` carries a symbol
/// the caller must release if it is temporary.
pub enum Flow {
    Value(SymbolId),
    Break,
    Continue,
    Return(Option<SymbolId>),
    None,
}

impl Flow {
    fn is_control(&self) -> bool {
        matches!(self, Flow::Break | Flow::Continue | Flow::Return(_))
    }
}

pub struct Evaluator<'a> {
    pub table: &'a mut SymbolTable,
    pub origin: String,
}

impl<'a> Evaluator<'a> {
    pub fn new(table: &'a mut SymbolTable, origin: impl Into<String>) -> Self {
        Self {
            table,
            origin: origin.into(),
        }
    }

    fn site(&self, line: usize, scope: ScopeId) -> Site {
        self.table.site(&self.origin, line, scope)
    }

    /// Evaluate an expression node that must not itself be a control
    /// statement (operands of operators, call arguments, conditions).
    /// Releases nothing; the caller decides.
    fn eval_expr(&mut self, node: &Node, scope: ScopeId) -> EmplodeResult<SymbolId> {
        match self.eval(node, scope)? {
            Flow::Value(id) => Ok(id),
            Flow::None => Err(EmplodeError::runtime(
                self.site(node.line(), scope),
                "expression produced no value".to_string(),
            )),
            _ => Err(EmplodeError::runtime(
                self.site(node.line(), scope),
                "break/continue/return cannot appear inside an expression".to_string(),
            )),
        }
    }

    pub fn eval(&mut self, node: &Node, scope: ScopeId) -> EmplodeResult<Flow> {
        match node {
            Node::Leaf { value, .. } => {
                let id = match value {
                    LeafRef::Literal(id) | LeafRef::Named(id) => *id,
                };
                Ok(Flow::Value(id))
            }

            Node::UnaryOp { line, op, operand } => {
                let operand_id = self.eval_expr(operand, scope)?;
                let x = self.table.symbols.get(operand_id).as_double();
                let result = match op {
                    UnaryOpKind::Neg => -x,
                    UnaryOpKind::Not => {
                        if x == 0.0 {
                            1.0
                        } else {
                            0.0
                        }
                    }
                };
                self.table.release_if_temporary(operand_id);
                let _ = line;
                Ok(Flow::Value(self.table.make_temp_number(result)))
            }

            Node::BinaryOp { line, op, left, right } => self.eval_binary_op(*line, *op, left, right, scope),

            Node::Assign { line, lhs, rhs } => {
                let lhs_id = match &**lhs {
                    Node::Leaf {
                        value: LeafRef::Named(id),
                        ..
                    } => *id,
                    _ => {
                        return Err(EmplodeError::parse(
                            self.site(*line, scope),
                            "left side of '=' must be a named symbol".to_string(),
                        ))
                    }
                };
                let rhs_id = self.eval_expr(rhs, scope)?;
                let site = self.site(*line, scope);
                self.table.copy_value(lhs_id, rhs_id, &site)?;
                self.table.release_if_temporary(rhs_id);
                Ok(Flow::Value(lhs_id))
            }

            Node::If {
                line,
                test,
                then_branch,
                else_branch,
            } => {
                let test_id = self.eval_expr(test, scope)?;
                let truthy = self.table.symbols.get(test_id).as_double() != 0.0;
                self.table.release_if_temporary(test_id);
                let _ = line;
                if truthy {
                    self.eval(then_branch, scope)
                } else if let Some(else_branch) = else_branch {
                    self.eval(else_branch, scope)
                } else {
                    Ok(Flow::None)
                }
            }

            Node::While { test, body, .. } => loop {
                let test_id = self.eval_expr(test, scope)?;
                let truthy = self.table.symbols.get(test_id).as_double() != 0.0;
                self.table.release_if_temporary(test_id);
                if !truthy {
                    return Ok(Flow::None);
                }
                match self.eval(body, scope)? {
                    Flow::Break => return Ok(Flow::None),
                    Flow::Continue | Flow::None => continue,
                    Flow::Return(v) => return Ok(Flow::Return(v)),
                    Flow::Value(id) => {
                        self.table.release_if_temporary(id);
                    }
                }
            },

            Node::Block {
                scope: block_scope,
                statements,
                ..
            } => {
                for stmt in statements {
                    match self.eval(stmt, *block_scope)? {
                        Flow::Value(id) => self.table.release_if_temporary(id),
                        flow if flow.is_control() => return Ok(flow),
                        Flow::None => {}
                    }
                }
                Ok(Flow::None)
            }

            Node::Call { line, callee, args } => self.eval_call(*line, callee, args, scope),

            Node::Event {
                line,
                signal,
                params,
                action,
            } => {
                if !self.table.events.has_signal(signal) {
                    return Err(EmplodeError::name(
                        self.site(*line, scope),
                        format!("unknown signal '{signal}'"),
                    ));
                }
                // §4.3 rule 5: parameter subtrees are evaluated now so
                // their *symbols* (lvalues) are captured by the Action;
                // the action subtree itself is stored unevaluated.
                let mut param_nodes = Vec::with_capacity(params.len());
                for p in params {
                    match &p {
                        Node::Leaf {
                            value: LeafRef::Named(_),
                            ..
                        } => param_nodes.push(p.clone()),
                        _ => {
                            return Err(EmplodeError::parse(
                                self.site(*line, scope),
                                "event parameter must be a declared lvalue".to_string(),
                            ))
                        }
                    }
                }
                let action = Action {
                    signal_name: signal.clone(),
                    params: param_nodes,
                    action: (**action).clone(),
                    def_line: *line,
                };
                self.table
                    .events
                    .add_action(action)
                    .map_err(|m| EmplodeError::name(self.site(*line, scope), m))?;
                Ok(Flow::None)
            }

            Node::Break { .. } => Ok(Flow::Break),
            Node::Continue { .. } => Ok(Flow::Continue),
            Node::Return { value, .. } => match value {
                Some(expr) => {
                    let id = self.eval_expr(expr, scope)?;
                    Ok(Flow::Return(Some(id)))
                }
                None => Ok(Flow::Return(None)),
            },
        }
    }

    fn eval_binary_op(
        &mut self,
        line: usize,
        op: BinaryOpKind,
        left: &Node,
        right: &Node,
        scope: ScopeId,
    ) -> EmplodeResult<Flow> {
        let left_id = self.eval_expr(left, scope)?;
        let right_id = self.eval_expr(right, scope)?;
        let site = self.site(line, scope);

        let left_is_string = {
            let s = self.table.symbols.get(left_id);
            s.is_string() && !s.is_numeric()
        };
        let right_is_string = {
            let s = self.table.symbols.get(right_id);
            s.is_string() && !s.is_numeric()
        };

        let result = match op {
            BinaryOpKind::Add if left_is_string || right_is_string => {
                let a = self.table.symbols.get(left_id).as_string();
                let b = self.table.symbols.get(right_id).as_string();
                Scalar::Text(a + &b)
            }
            BinaryOpKind::Add => Scalar::Number(
                self.table.symbols.get(left_id).as_double() + self.table.symbols.get(right_id).as_double(),
            ),
            BinaryOpKind::Mul if left_is_string && !right_is_string => {
                replicate(&self.table.symbols.get(left_id).as_string(), self.table.symbols.get(right_id).as_double())
            }
            BinaryOpKind::Mul if right_is_string && !left_is_string => {
                replicate(&self.table.symbols.get(right_id).as_string(), self.table.symbols.get(left_id).as_double())
            }
            BinaryOpKind::Mul if left_is_string && right_is_string => {
                return Err(EmplodeError::type_error(site, "cannot multiply two strings".to_string()))
            }
            BinaryOpKind::Mul => Scalar::Number(
                self.table.symbols.get(left_id).as_double() * self.table.symbols.get(right_id).as_double(),
            ),
            BinaryOpKind::Eq | BinaryOpKind::Ne => {
                // SPEC_FULL.md §13.3: mixed-kind equality coerces the
                // non-string operand to its string form.
                let equal = if left_is_string || right_is_string {
                    self.table.symbols.get(left_id).as_string() == self.table.symbols.get(right_id).as_string()
                } else {
                    self.table.symbols.get(left_id).as_double() == self.table.symbols.get(right_id).as_double()
                };
                Scalar::from_bool(if op == BinaryOpKind::Eq { equal } else { !equal })
            }
            BinaryOpKind::Lt | BinaryOpKind::Le | BinaryOpKind::Gt | BinaryOpKind::Ge => {
                if left_is_string != right_is_string {
                    return Err(EmplodeError::type_error(
                        site,
                        "relational operators require matching operand kinds".to_string(),
                    ));
                }
                let ord = if left_is_string {
                    self.table
                        .symbols
                        .get(left_id)
                        .as_string()
                        .cmp(&self.table.symbols.get(right_id).as_string())
                } else {
                    self.table
                        .symbols
                        .get(left_id)
                        .as_double()
                        .partial_cmp(&self.table.symbols.get(right_id).as_double())
                        .unwrap_or(std::cmp::Ordering::Equal)
                };
                use std::cmp::Ordering::*;
                let truth = match (op, ord) {
                    (BinaryOpKind::Lt, Less) => true,
                    (BinaryOpKind::Le, Less | Equal) => true,
                    (BinaryOpKind::Gt, Greater) => true,
                    (BinaryOpKind::Ge, Greater | Equal) => true,
                    _ => false,
                };
                Scalar::from_bool(truth)
            }
            BinaryOpKind::And => Scalar::from_bool(
                self.table.symbols.get(left_id).as_double() != 0.0 && self.table.symbols.get(right_id).as_double() != 0.0,
            ),
            BinaryOpKind::Or => Scalar::from_bool(
                self.table.symbols.get(left_id).as_double() != 0.0 || self.table.symbols.get(right_id).as_double() != 0.0,
            ),
            BinaryOpKind::Sub | BinaryOpKind::Div | BinaryOpKind::Mod | BinaryOpKind::Pow => {
                if left_is_string || right_is_string {
                    return Err(EmplodeError::type_error(
                        site,
                        "numeric operator applied to a string operand".to_string(),
                    ));
                }
                let a = self.table.symbols.get(left_id).as_double();
                let b = self.table.symbols.get(right_id).as_double();
                Scalar::Number(match op {
                    BinaryOpKind::Sub => a - b,
                    BinaryOpKind::Div => a / b,
                    BinaryOpKind::Mod => a % b,
                    BinaryOpKind::Pow => a.powf(b),
                    _ => unreachable!(),
                })
            }
        };

        self.table.release_if_temporary(left_id);
        self.table.release_if_temporary(right_id);
        Ok(Flow::Value(self.table.make_temp_var(result)))
    }

    fn eval_call(&mut self, line: usize, callee: &Node, args: &[Node], scope: ScopeId) -> EmplodeResult<Flow> {
        let callee_id = self.eval_expr(callee, scope)?;
        let site = self.site(line, scope);
        if !self.table.symbols.get(callee_id).is_function() {
            return Err(EmplodeError::type_error(site, "callee is not a function".to_string()));
        }

        let mut arg_ids = Vec::with_capacity(args.len());
        let mut arg_temporary = Vec::with_capacity(args.len());
        for a in args {
            let id = self.eval_expr(a, scope)?;
            arg_temporary.push(self.table.symbols.get(id).temporary);
            arg_ids.push(id);
        }

        let function = match &self.table.symbols.get(callee_id).kind {
            SymbolKind::Function(f) => f.clone(),
            _ => unreachable!(),
        };
        let result = function.call(self.table, &arg_ids, &site);

        for (id, was_temporary) in arg_ids.iter().zip(arg_temporary) {
            if was_temporary {
                self.table.release_if_temporary(*id);
            }
        }

        Ok(Flow::Value(result?))
    }

    /// Fire a signal: for each registered action, in registration
    /// order, require `args.len() >= params.len()`, copy each arg into
    /// its parameter lvalue, then evaluate the action and release any
    /// temporary result (§4.5 Trigger).
    pub fn trigger(&mut self, signal: &str, args: &[SymbolId]) -> EmplodeResult<()> {
        // Clone the action list out first: dispatching an action can
        // itself register new actions (e.g. via a nested `EXEC` call),
        // and we must not hold a borrow of the registry while running
        // arbitrary script through `self.eval`.
        let actions: Vec<Action> = match self.table.events.get(signal) {
            Some(event) => event.actions.clone(),
            None => {
                return Err(EmplodeError::name(
                    self.site(0, self.table.root),
                    format!("unknown signal '{signal}'"),
                ))
            }
        };

        for action in &actions {
            if args.len() < action.params.len() {
                return Err(EmplodeError::arity(
                    self.site(action.def_line, self.table.root),
                    format!(
                        "signal '{}' triggered with {} argument(s), action declared at line {} needs {}",
                        signal,
                        args.len(),
                        action.def_line,
                        action.params.len()
                    ),
                ));
            }
            for (param, arg) in action.params.iter().zip(args) {
                let param_id = match param {
                    Node::Leaf {
                        value: LeafRef::Named(id),
                        ..
                    } => *id,
                    _ => unreachable!("event params are always named leaves"),
                };
                let site = self.site(action.def_line, self.table.root);
                self.table.copy_value(param_id, *arg, &site)?;
            }
            match self.eval(&action.action, self.table.root)? {
                Flow::Value(id) => self.table.release_if_temporary(id),
                _ => {}
            }
        }
        Ok(())
    }
}

fn replicate(s: &str, times: f64) -> Scalar {
    let n = times.floor();
    if n <= 0.0 {
        return Scalar::Text(String::new());
    }
    Scalar::Text(s.repeat(n as usize))
}
