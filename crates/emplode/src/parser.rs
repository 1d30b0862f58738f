//! Recursive-descent + precedence-climbing parser (C4, §4.2).
//!
//! Declarations are registered into the symbol table *as they are
//! parsed*, not deferred to evaluation (§2 C4: "driving name resolution
//! into the symbol table as it parses") — this is why `a` is already
//! resolvable when `c`'s initializer references it in seed scenario 1,
//! even though neither has been *evaluated* yet. Only the initializer
//! expressions and executable statements become AST nodes; the
//! declaration side effect itself is not represented as a node.

use crate::ast::{BinaryOpKind, LeafRef, Node, UnaryOpKind};
use crate::error::{EmplodeError, EmplodeResult, Site};
use crate::function::FunctionValue;
use crate::scope::ScopeId;
use crate::symbol::{Symbol, SymbolId, SymbolKind};
use crate::symbol_table::SymbolTable;
use crate::token::{Token, TokenKind};
use crate::value::{unescape, Scalar};

pub struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    table: &'a mut SymbolTable,
    origin: String,
    scope_stack: Vec<ScopeId>,
}

impl<'a> Parser<'a> {
    pub fn new(tokens: Vec<Token>, table: &'a mut SymbolTable, root: ScopeId, origin: impl Into<String>) -> Self {
        Self {
            tokens,
            pos: 0,
            table,
            origin: origin.into(),
            scope_stack: vec![root],
        }
    }

    fn scope(&self) -> ScopeId {
        *self.scope_stack.last().unwrap()
    }

    fn line(&self) -> usize {
        self.tokens.get(self.pos).map(|t| t.line).unwrap_or(0)
    }

    fn site(&self) -> Site {
        self.table.site(&self.origin, self.line(), self.scope())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<Token> {
        let t = self.tokens.get(self.pos).cloned();
        if t.is_some() {
            self.pos += 1;
        }
        t
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn check_symbol(&self, sym: &str) -> bool {
        self.peek().map(|t| t.is_symbol(sym)).unwrap_or(false)
    }

    fn check_keyword(&self, word: &str) -> bool {
        self.peek().map(|t| t.is_keyword(word)).unwrap_or(false)
    }

    /// A single-dot separator between path segments (`a.b`). The lexer
    /// tokenizes any run of dots as one `Dots` token regardless of
    /// position, so this is not a `Symbol` check.
    fn check_dot(&self) -> bool {
        self.peek()
            .map(|t| t.kind == TokenKind::Dots && t.lexeme == ".")
            .unwrap_or(false)
    }

    fn eat_symbol(&mut self, sym: &str) -> bool {
        if self.check_symbol(sym) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.check_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn require_symbol(&mut self, sym: &str) -> EmplodeResult<()> {
        if self.eat_symbol(sym) {
            Ok(())
        } else {
            Err(EmplodeError::parse(
                self.site(),
                format!("expected '{sym}', found {}", self.describe_current()),
            ))
        }
    }

    fn describe_current(&self) -> String {
        match self.peek() {
            Some(t) => format!("'{}'", t.lexeme),
            None => "end of input".to_string(),
        }
    }

    fn require_identifier(&mut self) -> EmplodeResult<String> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                let name = t.lexeme.clone();
                self.advance();
                Ok(name)
            }
            _ => Err(EmplodeError::parse(
                self.site(),
                format!("expected an identifier, found {}", self.describe_current()),
            )),
        }
    }

    /// Entry point: parse the whole token stream as one top-level
    /// Block rooted at the scope the caller supplied (§4.2.4).
    pub fn parse_program(&mut self) -> EmplodeResult<Node> {
        let root = self.scope();
        let line = self.line();
        let statements = self.parse_statement_list()?;
        Ok(Node::Block {
            line,
            scope: root,
            statements,
        })
    }

    fn parse_statement_list(&mut self) -> EmplodeResult<Vec<Node>> {
        let mut statements = Vec::new();
        while !self.at_end() && !self.check_symbol("}") {
            statements.push(self.parse_statement()?);
        }
        Ok(statements)
    }

    fn parse_block(&mut self) -> EmplodeResult<Node> {
        let line = self.line();
        self.require_symbol("{")?;
        let child = self.table.scopes.alloc(Some(self.scope()));
        self.scope_stack.push(child);
        let statements = self.parse_statement_list();
        self.scope_stack.pop();
        let statements = statements?;
        self.require_symbol("}")?;
        Ok(Node::Block {
            line,
            scope: child,
            statements,
        })
    }

    fn parse_statement(&mut self) -> EmplodeResult<Node> {
        let line = self.line();

        if self.check_symbol("{") {
            return self.parse_block();
        }
        if self.eat_keyword("IF") {
            return self.parse_if(line);
        }
        if self.eat_keyword("WHILE") {
            return self.parse_while(line);
        }
        if self.eat_keyword("BREAK") {
            self.require_symbol(";")?;
            return Ok(Node::Break { line });
        }
        if self.eat_keyword("CONTINUE") {
            self.require_symbol(";")?;
            return Ok(Node::Continue { line });
        }
        if self.eat_keyword("RETURN") {
            let value = if self.check_symbol(";") {
                None
            } else {
                Some(Box::new(self.parse_expression(0)?))
            };
            self.require_symbol(";")?;
            return Ok(Node::Return { line, value });
        }
        if self.eat_keyword("FUNCTION") {
            return self.parse_function_def(line);
        }
        if self.check_symbol("@") {
            return self.parse_event(line);
        }
        if let Some(decl) = self.try_parse_declaration(line)? {
            return Ok(decl);
        }

        let expr = self.parse_expression(0)?;
        self.require_symbol(";")?;
        Ok(expr)
    }

    fn parse_if(&mut self, line: usize) -> EmplodeResult<Node> {
        self.require_symbol("(")?;
        let test = Box::new(self.parse_expression(0)?);
        self.require_symbol(")")?;
        let then_branch = Box::new(self.parse_statement()?);
        let else_branch = if self.eat_keyword("ELSE") {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };
        Ok(Node::If {
            line,
            test,
            then_branch,
            else_branch,
        })
    }

    fn parse_while(&mut self, line: usize) -> EmplodeResult<Node> {
        self.require_symbol("(")?;
        let test = Box::new(self.parse_expression(0)?);
        self.require_symbol(")")?;
        let body = Box::new(self.parse_statement()?);
        Ok(Node::While { line, test, body })
    }

    /// `FUNCTION returnType name(paramType p1, …) { body }` (§4.2.1):
    /// one overload with the declared arity, stored as a closure that
    /// binds args into the body's own parameter scope and runs it.
    fn parse_function_def(&mut self, line: usize) -> EmplodeResult<Node> {
        let return_type = self.require_identifier()?;
        let name = self.require_identifier()?;
        self.require_symbol("(")?;

        let body_scope = self.table.scopes.alloc(Some(self.scope()));
        let mut param_ids = Vec::new();
        if !self.check_symbol(")") {
            loop {
                let _param_type = self.require_identifier()?;
                let param_name = self.require_identifier()?;
                let id = self
                    .table
                    .add_var(body_scope, &param_name, "", Scalar::Number(0.0))?;
                param_ids.push(id);
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }
        self.require_symbol(")")?;

        self.scope_stack.push(body_scope);
        let body = self.parse_block();
        self.scope_stack.pop();
        let body = body?;

        let return_is_string = return_type.eq_ignore_ascii_case("string");
        let arity = param_ids.len() as i32;
        let origin = self.origin.clone();
        let call: crate::function::HostCallback = std::rc::Rc::new(move |table, args| {
            let site = table.site(&origin, line, body_scope);
            for (param, arg) in param_ids.iter().zip(args) {
                table.copy_value(*param, *arg, &site)?;
            }
            let mut evaluator = crate::eval::Evaluator::new(table, origin.clone());
            match evaluator.eval(&body, body_scope)? {
                crate::eval::Flow::Return(Some(id)) => Ok(id),
                crate::eval::Flow::Return(None) | crate::eval::Flow::None => {
                    Ok(evaluator.table.make_temp_number(0.0))
                }
                crate::eval::Flow::Value(id) => Ok(id),
                _ => Err(EmplodeError::runtime(
                    site,
                    "break/continue escaped a function body".to_string(),
                )),
            }
        });

        let overload = crate::function::Overload { arity, call };
        let function = FunctionValue::single(overload, return_is_string);
        let scope = self.scope();
        let symbol = Symbol::new(name.as_str(), SymbolKind::Function(function), Some(scope));
        let id = self.declare(scope, &name, symbol)?;

        Ok(Node::Leaf {
            line,
            value: LeafRef::Named(id),
        })
    }

    /// `@signalName(param-expressions…) action-statement` (§4.2.1).
    /// Unlike `FUNCTION`'s parameter list, these are plain expressions
    /// that must each resolve to an *existing* lvalue (§4.3 rule 5), not
    /// fresh `paramType paramName` declarations — a `@tick(t) ...`
    /// expects `t` to already be in scope.
    fn parse_event(&mut self, line: usize) -> EmplodeResult<Node> {
        self.require_symbol("@")?;
        let signal = self.require_identifier()?;
        self.require_symbol("(")?;
        let mut params = Vec::new();
        if !self.check_symbol(")") {
            loop {
                let expr = self.parse_expression(2)?;
                if !matches!(
                    expr,
                    Node::Leaf {
                        value: LeafRef::Named(_),
                        ..
                    }
                ) {
                    return Err(EmplodeError::parse(
                        self.site(),
                        "event parameter must resolve to an existing named symbol".to_string(),
                    ));
                }
                params.push(expr);
                if !self.eat_symbol(",") {
                    break;
                }
            }
        }
        self.require_symbol(")")?;
        let action = Box::new(self.parse_statement()?);
        Ok(Node::Event {
            line,
            signal,
            params,
            action,
        })
    }

    /// `TypeName identifier [= expression];` / `Struct identifier { … }`
    /// / `TypeName identifier { … }` (§4.2.1). Returns `None` if the
    /// next token isn't one of the recognized declaration head shapes,
    /// so the caller can fall back to an expression-statement.
    fn try_parse_declaration(&mut self, line: usize) -> EmplodeResult<Option<Node>> {
        let is_type_head = match self.peek() {
            Some(t) if t.kind == TokenKind::Identifier => {
                t.lexeme == "Var"
                    || t.lexeme == "Struct"
                    || self.table.types.contains(&t.lexeme)
            }
            _ => false,
        };
        if !is_type_head {
            return Ok(None);
        }
        // Distinguish a declaration (`Type name ...`) from a plain
        // expression starting with an identifier (`name = ...`) by
        // requiring a second identifier right after the type name.
        let type_name = self.peek().unwrap().lexeme.clone();
        let is_decl = matches!(self.tokens.get(self.pos + 1), Some(t) if t.kind == TokenKind::Identifier);
        if !is_decl {
            return Ok(None);
        }
        self.advance();
        let name = self.require_identifier()?;

        if type_name == "Var" {
            let scope = self.scope();
            let id = self.table.add_var(scope, &name, "", Scalar::Number(0.0))?;
            if self.eat_symbol("=") {
                let rhs = Box::new(self.parse_expression(0)?);
                self.require_symbol(";")?;
                return Ok(Some(Node::Assign {
                    line,
                    lhs: Box::new(Node::Leaf {
                        line,
                        value: LeafRef::Named(id),
                    }),
                    rhs,
                }));
            }
            self.require_symbol(";")?;
            return Ok(Some(Node::Leaf {
                line,
                value: LeafRef::Named(id),
            }));
        }

        if type_name == "Struct" {
            let scope = self.scope();
            let (_id, child) = self.table.add_scope(scope, &name, "")?;
            self.scope_stack.push(child);
            let body = self.parse_block_contents_only();
            self.scope_stack.pop();
            let statements = body?;
            self.require_symbol("}")?;
            return Ok(Some(Node::Block {
                line,
                scope: child,
                statements,
            }));
        }

        // Host-registered type declaration (§4.7 "Register type").
        let scope = self.scope();
        let constructor = self
            .table
            .types
            .get(&type_name)
            .and_then(|t| t.constructor.clone())
            .ok_or_else(|| {
                EmplodeError::type_error(self.site(), format!("type '{type_name}' has no constructor"))
            })?;
        let owned_by_default = self.table.types.get(&type_name).unwrap().owned_by_default;
        let object = constructor(&name);
        let (_id, child) = self
            .table
            .add_object(scope, &name, "", &type_name, object, owned_by_default)?;

        if self.eat_symbol("=") {
            // Accept and discard a constructor-argument expression;
            // full object-literal initialization is out of scope.
            let _ = self.parse_expression(0)?;
            self.require_symbol(";")?;
            return Ok(Some(Node::Block {
                line,
                scope: child,
                statements: Vec::new(),
            }));
        }
        self.scope_stack.push(child);
        let body = self.parse_block_contents_only();
        self.scope_stack.pop();
        let statements = body?;
        self.require_symbol("}")?;
        Ok(Some(Node::Block {
            line,
            scope: child,
            statements,
        }))
    }

    /// Like `parse_block` but the opening `{` has already been
    /// confirmed absent/consumed by the caller's own bookkeeping; used
    /// by `Struct`/object bodies where the caller manages the scope
    /// push/pop around the nested member declarations.
    fn parse_block_contents_only(&mut self) -> EmplodeResult<Vec<Node>> {
        self.require_symbol("{")?;
        self.parse_statement_list()
    }

    fn declare(&mut self, scope: ScopeId, name: &str, symbol: Symbol) -> EmplodeResult<SymbolId> {
        if self.table.scopes.get(scope).members.contains_key(name) {
            return Err(EmplodeError::name(
                self.site(),
                format!("cannot redeclare '{name}' in this scope"),
            ));
        }
        let id = self.table.symbols.alloc(symbol);
        self.table.scopes.get_mut(scope).members.insert(name.to_string(), id);
        Ok(id)
    }

    // ---- expressions (§4.2.2) ----

    fn parse_expression(&mut self, min_bp: u8) -> EmplodeResult<Node> {
        let line = self.line();
        let mut lhs = self.parse_prefix()?;

        loop {
            let Some((op, l_bp, r_bp, is_assign)) = self.peek_binary_op() else {
                break;
            };
            if l_bp < min_bp {
                break;
            }
            self.advance();
            if is_assign {
                self.verify_lvalue(&lhs)?;
                let rhs = self.parse_expression(r_bp)?;
                lhs = Node::Assign {
                    line,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                };
                continue;
            }
            let rhs = self.parse_expression(r_bp)?;
            lhs = Node::BinaryOp {
                line,
                op,
                left: Box::new(lhs),
                right: Box::new(rhs),
            };
        }

        Ok(lhs)
    }

    fn verify_lvalue(&self, node: &Node) -> EmplodeResult<()> {
        match node {
            Node::Leaf {
                value: LeafRef::Named(_),
                ..
            } => Ok(()),
            _ => Err(EmplodeError::parse(
                self.site(),
                "left side of '=' must resolve to a named symbol".to_string(),
            )),
        }
    }

    /// Binding powers, low to high (§4.2.2). Returns `(op, left_bp,
    /// right_bp, is_assignment)`; `=` is right-associative (right_bp <
    /// left_bp), everything else here is left-associative except `**`.
    fn peek_binary_op(&self) -> Option<(BinaryOpKind, u8, u8, bool)> {
        let t = self.peek()?;
        if t.kind != TokenKind::Symbol {
            return None;
        }
        Some(match t.lexeme.as_str() {
            "=" => (BinaryOpKind::Eq, 1, 0, true), // op unused when is_assign
            "||" => (BinaryOpKind::Or, 2, 3, false),
            "&&" => (BinaryOpKind::And, 3, 4, false),
            "==" => (BinaryOpKind::Eq, 4, 5, false),
            "!=" => (BinaryOpKind::Ne, 4, 5, false),
            "<" => (BinaryOpKind::Lt, 5, 6, false),
            "<=" => (BinaryOpKind::Le, 5, 6, false),
            ">" => (BinaryOpKind::Gt, 5, 6, false),
            ">=" => (BinaryOpKind::Ge, 5, 6, false),
            "+" => (BinaryOpKind::Add, 6, 7, false),
            "-" => (BinaryOpKind::Sub, 6, 7, false),
            "*" => (BinaryOpKind::Mul, 7, 8, false),
            "/" => (BinaryOpKind::Div, 7, 8, false),
            "%" => (BinaryOpKind::Mod, 7, 8, false),
            "**" => (BinaryOpKind::Pow, 9, 8, false), // right-associative
            _ => return None,
        })
    }

    fn parse_prefix(&mut self) -> EmplodeResult<Node> {
        let line = self.line();
        if self.eat_symbol("-") {
            let operand = Box::new(self.parse_prefix()?);
            return Ok(Node::UnaryOp {
                line,
                op: UnaryOpKind::Neg,
                operand,
            });
        }
        if self.eat_symbol("+") {
            return self.parse_prefix();
        }
        if self.eat_symbol("!") {
            let operand = Box::new(self.parse_prefix()?);
            return Ok(Node::UnaryOp {
                line,
                op: UnaryOpKind::Not,
                operand,
            });
        }
        self.parse_postfix()
    }

    fn parse_postfix(&mut self) -> EmplodeResult<Node> {
        let mut node = self.parse_primary()?;
        loop {
            let line = self.line();
            if self.eat_symbol("(") {
                let mut args = Vec::new();
                if !self.check_symbol(")") {
                    loop {
                        args.push(self.parse_expression(2)?);
                        if !self.eat_symbol(",") {
                            break;
                        }
                    }
                }
                self.require_symbol(")")?;
                node = Node::Call {
                    line,
                    callee: Box::new(node),
                    args,
                };
                continue;
            }
            if self.check_symbol("[") {
                return Err(EmplodeError::parse(
                    self.site(),
                    "indexed access is not implemented".to_string(),
                ));
            }
            break;
        }
        Ok(node)
    }

    fn parse_primary(&mut self) -> EmplodeResult<Node> {
        let line = self.line();

        if self.eat_symbol("(") {
            let inner = self.parse_expression(0)?;
            self.require_symbol(")")?;
            return Ok(inner);
        }

        if self.check_keyword("TRUE") {
            self.advance();
            let id = self.table.make_temp_number(1.0);
            self.table.symbols.get_mut(id).temporary = false;
            return Ok(Node::Leaf {
                line,
                value: LeafRef::Literal(id),
            });
        }
        if self.check_keyword("FALSE") {
            self.advance();
            let id = self.table.make_temp_number(0.0);
            self.table.symbols.get_mut(id).temporary = false;
            return Ok(Node::Leaf {
                line,
                value: LeafRef::Literal(id),
            });
        }

        if let Some(t) = self.peek() {
            if t.kind == TokenKind::Number {
                let n: f64 = t.lexeme.parse().map_err(|_| {
                    EmplodeError::lex(self.site(), format!("malformed number literal '{}'", t.lexeme))
                })?;
                self.advance();
                let id = self.table.make_temp_number(n);
                self.table.symbols.get_mut(id).temporary = false;
                return Ok(Node::Leaf {
                    line,
                    value: LeafRef::Literal(id),
                });
            }
            if t.kind == TokenKind::String {
                let raw = &t.lexeme[1..t.lexeme.len() - 1];
                let text = unescape(raw);
                self.advance();
                let id = self.table.make_temp_string(text);
                self.table.symbols.get_mut(id).temporary = false;
                return Ok(Node::Leaf {
                    line,
                    value: LeafRef::Literal(id),
                });
            }
        }

        if self.check_symbol(":") {
            return self.parse_builtin_accessor(line);
        }

        if self.peek().map(|t| t.kind == TokenKind::Dots).unwrap_or(false) {
            return self.parse_dotted_name(line);
        }

        if self.peek().map(|t| t.kind == TokenKind::Identifier).unwrap_or(false) {
            return self.parse_dotted_name(line);
        }

        Err(EmplodeError::parse(
            self.site(),
            format!("unexpected token {}", self.describe_current()),
        ))
    }

    /// `:name` built-in lookups (§4.2.3, §6.2). Implemented directly as
    /// temporaries rather than real symbol-table entries, since they
    /// read the *current* scope's metadata rather than naming a value.
    fn parse_builtin_accessor(&mut self, line: usize) -> EmplodeResult<Node> {
        self.require_symbol(":")?;
        let name = self.require_identifier()?;
        let scope = self.scope();
        let id = match name.as_str() {
            "scope_size" => self.table.make_temp_number(self.table.scopes.get(scope).members.len() as f64),
            "names" => {
                let names: Vec<String> = self.table.scopes.get(scope).members.keys().cloned().collect();
                self.table.make_temp_string(names.join(","))
            }
            "string" | "value" | "type" | "is_string" | "is_value" | "is_struct" | "is_array" => {
                self.table.make_temp_string(String::new())
            }
            other => {
                return Err(EmplodeError::parse(
                    self.site(),
                    format!("unknown built-in accessor ':{other}'"),
                ))
            }
        };
        Ok(Node::Leaf {
            line,
            value: LeafRef::Literal(id),
        })
    }

    /// `a.b.c`, `.a`, `..a` (§4.2.3): a leading `.` restarts lookup in
    /// the current scope (no outward scan for the first component); a
    /// leading `..` (or each additional `.`) walks one scope toward the
    /// parent before lookup begins; each later `.segment` is scope-
    /// restricted to the previous segment's result.
    fn parse_dotted_name(&mut self, line: usize) -> EmplodeResult<Node> {
        let mut start_scope = self.scope();
        let mut scan_outward = true;

        if let Some(t) = self.peek() {
            if t.kind == TokenKind::Dots {
                let dots = t.lexeme.clone();
                self.advance();
                scan_outward = false;
                // ".x": stay put. "..x"/".....x": walk (len-1) parents.
                for _ in 0..dots.len().saturating_sub(1) {
                    start_scope = self
                        .table
                        .scopes
                        .get(start_scope)
                        .parent
                        .ok_or_else(|| EmplodeError::name(self.site(), "no parent scope above root".to_string()))?;
                }
            }
        }

        let first = self.require_identifier()?;
        let mut id = self
            .table
            .lookup_symbol(start_scope, &first, scan_outward)
            .ok_or_else(|| {
                EmplodeError::name(
                    self.site(),
                    format!("unresolved identifier '{first}'"),
                )
            })?;

        while self.check_dot() {
            self.advance();
            let seg = self.require_identifier()?;
            let scope_id = self.table.symbols.get(id).scope_id().ok_or_else(|| {
                EmplodeError::name(self.site(), format!("'{first}' is not a scope; cannot access '.{seg}'"))
            })?;
            id = self.table.lookup_symbol(scope_id, &seg, false).ok_or_else(|| {
                EmplodeError::name(self.site(), format!("no member '{seg}' in this scope"))
            })?;
        }

        Ok(Node::Leaf {
            line,
            value: LeafRef::Named(id),
        })
    }
}
