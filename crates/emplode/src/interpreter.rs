//! C7: the host extension surface (§4.7). `Interpreter` owns the whole
//! `SymbolTable` and is the only thing a host ever touches directly.

use std::rc::Rc;

use crate::error::{EmplodeError, EmplodeResult, Site};
use crate::eval::{Evaluator, Flow};
use crate::function::{host_fn1, host_fn2, host_fn3, host_fn_variadic, HostCallback, Overload, VARIADIC};
use crate::lexer::lex;
use crate::parser::Parser;
use crate::scope::ScopeId;
use crate::symbol::{HostLink, HostLinkFns, Symbol, SymbolId, SymbolKind};
use crate::symbol_table::SymbolTable;
use crate::types::TypeInfo;
use crate::value::Scalar;
use crate::write::write_program;

pub struct Interpreter {
    table: SymbolTable,
}

impl Interpreter {
    pub fn new() -> Self {
        let mut table = SymbolTable::new();
        seed_standard_library(&mut table);
        Self { table }
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn root(&self) -> ScopeId {
        self.table.root
    }

    /// Register a host type (§4.7 "Register type").
    pub fn register_type(&mut self, info: TypeInfo) {
        self.table.types.register(info);
    }

    /// Register a free function overload into the root scope, inserting
    /// it as a new `Function` symbol or adding an overload to an
    /// existing one of the same name (§4.7 "Register free function").
    pub fn register_function(
        &mut self,
        name: &str,
        desc: &str,
        overload: Overload,
        return_is_string: bool,
    ) -> EmplodeResult<()> {
        let root = self.table.root;
        if let Some(&id) = self.table.scopes.get(root).members.get(name) {
            match &mut self.table.symbols.get_mut(id).kind {
                SymbolKind::Function(f) => {
                    f.overloads.push(overload);
                    return Ok(());
                }
                _ => {
                    return Err(EmplodeError::name(
                        Site::new("register_function", 0, "<root>"),
                        format!("'{name}' is already declared as a non-function"),
                    ))
                }
            }
        }
        let function = crate::function::FunctionValue::single(overload, return_is_string);
        let mut symbol = Symbol::new(name, SymbolKind::Function(function), Some(root));
        symbol.desc = desc.to_string();
        symbol.builtin = true;
        let id = self.table.symbols.alloc(symbol);
        self.table.scopes.get_mut(root).members.insert(name.to_string(), id);
        Ok(())
    }

    pub fn register_fn1(&mut self, name: &str, desc: &str, f: impl Fn(f64) -> f64 + 'static) -> EmplodeResult<()> {
        self.register_function(name, desc, host_fn1(f), false)
    }

    pub fn register_fn2(&mut self, name: &str, desc: &str, f: impl Fn(f64, f64) -> f64 + 'static) -> EmplodeResult<()> {
        self.register_function(name, desc, host_fn2(f), false)
    }

    pub fn register_fn3(
        &mut self,
        name: &str,
        desc: &str,
        f: impl Fn(f64, f64, f64) -> f64 + 'static,
    ) -> EmplodeResult<()> {
        self.register_function(name, desc, host_fn3(f), false)
    }

    pub fn register_fn0(&mut self, name: &str, desc: &str, f: impl Fn() -> f64 + 'static) -> EmplodeResult<()> {
        let call: HostCallback = Rc::new(move |table, _args| Ok(table.make_temp_number(f())));
        self.register_function(name, desc, Overload { arity: 0, call }, false)
    }

    pub fn register_fn4(
        &mut self,
        name: &str,
        desc: &str,
        f: impl Fn(f64, f64, f64, f64) -> f64 + 'static,
    ) -> EmplodeResult<()> {
        let call: HostCallback = Rc::new(move |table, args| {
            let a = table.symbols.get(args[0]).as_double();
            let b = table.symbols.get(args[1]).as_double();
            let c = table.symbols.get(args[2]).as_double();
            let d = table.symbols.get(args[3]).as_double();
            Ok(table.make_temp_number(f(a, b, c, d)))
        });
        self.register_function(name, desc, Overload { arity: 4, call }, false)
    }

    pub fn register_fn_variadic(
        &mut self,
        name: &str,
        desc: &str,
        return_is_string: bool,
        f: impl Fn(&mut SymbolTable, &[SymbolId]) -> EmplodeResult<Scalar> + 'static,
    ) -> EmplodeResult<()> {
        self.register_function(name, desc, host_fn_variadic(f), return_is_string)
    }

    /// Bind a host variable directly (§4.7 "Link variable").
    pub fn link_variable(
        &mut self,
        scope: ScopeId,
        name: &str,
        desc: &str,
        link: Box<dyn HostLink>,
    ) -> EmplodeResult<SymbolId> {
        let mut symbol = Symbol::new(name, SymbolKind::LinkedVar(link), Some(scope));
        symbol.desc = desc.to_string();
        self.declare(scope, name, symbol)
    }

    /// Bind a host getter/setter pair (§4.7 "Link getter/setter pair").
    pub fn link_functions(
        &mut self,
        scope: ScopeId,
        name: &str,
        desc: &str,
        get: Box<dyn Fn() -> Scalar>,
        set: Box<dyn FnMut(Scalar)>,
        numeric: bool,
    ) -> EmplodeResult<SymbolId> {
        let mut symbol = Symbol::new(
            name,
            SymbolKind::LinkedFuns(HostLinkFns { get, set, numeric }),
            Some(scope),
        );
        symbol.desc = desc.to_string();
        self.declare(scope, name, symbol)
    }

    fn declare(&mut self, scope: ScopeId, name: &str, symbol: Symbol) -> EmplodeResult<SymbolId> {
        if self.table.scopes.get(scope).members.contains_key(name) {
            return Err(EmplodeError::name(
                Site::new("link", 0, self.table.scope_name(scope)),
                format!("cannot redeclare '{name}' in this scope"),
            ));
        }
        let id = self.table.symbols.alloc(symbol);
        self.table.scopes.get_mut(scope).members.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn declare_signal(&mut self, name: &str, num_params: usize) -> EmplodeResult<()> {
        self.table
            .events
            .add_signal(name, num_params)
            .map_err(|m| EmplodeError::name(Site::new("declare_signal", 0, "<root>"), m))
    }

    /// Make a temporary numeric symbol a host can pass as a `trigger`
    /// argument (§4.7 "Trigger event").
    pub fn make_temp_number(&mut self, n: f64) -> SymbolId {
        self.table.make_temp_number(n)
    }

    /// Make a temporary string symbol a host can pass as a `trigger`
    /// argument (§4.7 "Trigger event").
    pub fn make_temp_string(&mut self, s: impl Into<String>) -> SymbolId {
        self.table.make_temp_string(s)
    }

    pub fn trigger(&mut self, signal: &str, args: &[SymbolId]) -> EmplodeResult<()> {
        let mut evaluator = Evaluator::new(&mut self.table, "trigger");
        evaluator.trigger(signal, args)
    }

    /// Parse and evaluate `source` in the root scope, returning nothing
    /// of interest beyond success/failure (§4.7 "Load / execute").
    pub fn load_statements(&mut self, source: &str, origin: &str) -> EmplodeResult<()> {
        let tokens = lex(source, origin)?;
        let root = self.table.root;
        let node = {
            let mut parser = Parser::new(tokens, &mut self.table, root, origin);
            parser.parse_program()?
        };
        let mut evaluator = Evaluator::new(&mut self.table, origin);
        match evaluator.eval(&node, root)? {
            Flow::Value(id) => {
                self.table.release_if_temporary(id);
            }
            _ => {}
        }
        Ok(())
    }

    /// Load a script file (§4.7 "Load / execute").
    pub fn load(&mut self, path: &str) -> EmplodeResult<()> {
        let source = std::fs::read_to_string(path).map_err(|e| {
            EmplodeError::runtime(Site::new(path, 0, "<root>"), format!("cannot read '{path}': {e}"))
        })?;
        self.load_statements(&source, path)
    }

    /// Evaluate a single expression and return its value as a double or
    /// string, per §4.7's single-expression `Execute` form.
    pub fn execute(&mut self, expression: &str) -> EmplodeResult<Scalar> {
        let tokens = lex(expression, "execute")?;
        let root = self.table.root;
        let node = {
            let mut parser = Parser::new(tokens, &mut self.table, root, "execute");
            parser.parse_program()?
        };
        let mut evaluator = Evaluator::new(&mut self.table, "execute");
        let result = match evaluator.eval(&node, root)? {
            Flow::Value(id) => {
                let symbol = self.table.symbols.get(id);
                let value = if symbol.is_string() && !symbol.is_numeric() {
                    Scalar::Text(symbol.as_string())
                } else {
                    Scalar::Number(symbol.as_double())
                };
                self.table.release_if_temporary(id);
                value
            }
            _ => Scalar::Number(0.0),
        };
        Ok(result)
    }

    /// Serialize the root scope and event registry (§4.7 "Write", §6.3).
    pub fn write(&self) -> String {
        write_program(&self.table)
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

/// Seed the standard free-function library exactly as `Emplode`'s own
/// constructor does (§12): `EXEC`, `PRINT`, the math builtins, and the
/// 3-argument `IF` free function.
fn seed_standard_library(table: &mut SymbolTable) {
    add_builtin(table, "EXEC", "Dynamically execute the string passed in.", exec_overload(), false);
    add_builtin(table, "PRINT", "Print out the provided variables.", print_overload(), false);

    add_builtin(table, "ABS", "Absolute Value", host_fn1(f64::abs), false);
    add_builtin(table, "EXP", "Exponentiation", host_fn1(f64::exp), false);
    // Despite the name, the original registers LOG2 as `std::log` (natural
    // log), not a true base-2 log; kept as-is rather than "fixed".
    add_builtin(table, "LOG2", "Log base-2", host_fn1(f64::ln), false);
    add_builtin(table, "LOG10", "Log base-10", host_fn1(f64::log10), false);
    add_builtin(table, "SQRT", "Square Root", host_fn1(f64::sqrt), false);
    add_builtin(table, "CBRT", "Cube Root", host_fn1(f64::cbrt), false);
    add_builtin(table, "SIN", "Sine", host_fn1(f64::sin), false);
    add_builtin(table, "COS", "Cosine", host_fn1(f64::cos), false);
    add_builtin(table, "TAN", "Tangent", host_fn1(f64::tan), false);
    add_builtin(table, "ASIN", "Arc Sine", host_fn1(f64::asin), false);
    add_builtin(table, "ACOS", "Arc Cosine", host_fn1(f64::acos), false);
    add_builtin(table, "ATAN", "Arc Tangent", host_fn1(f64::atan), false);
    add_builtin(table, "SINH", "Hyperbolic Sine", host_fn1(f64::sinh), false);
    add_builtin(table, "COSH", "Hyperbolic Cosine", host_fn1(f64::cosh), false);
    add_builtin(table, "TANH", "Hyperbolic Tangent", host_fn1(f64::tanh), false);
    add_builtin(table, "ASINH", "Hyperbolic Arc Sine", host_fn1(f64::asinh), false);
    add_builtin(table, "ACOSH", "Hyperbolic Arc Cosine", host_fn1(f64::acosh), false);
    add_builtin(table, "ATANH", "Hyperbolic Arc Tangent", host_fn1(f64::atanh), false);
    add_builtin(table, "CEIL", "Round UP", host_fn1(f64::ceil), false);
    add_builtin(table, "FLOOR", "Round DOWN", host_fn1(f64::floor), false);
    add_builtin(table, "ROUND", "Round to nearest", host_fn1(f64::round), false);
    add_builtin(table, "ISINF", "Test if Infinite", host_fn1(|x| if x.is_infinite() { 1.0 } else { 0.0 }), false);
    add_builtin(table, "ISNAN", "Test if Not-a-number", host_fn1(|x| if x.is_nan() { 1.0 } else { 0.0 }), false);

    add_builtin(table, "HYPOT", "Given sides, find hypotenuse", host_fn2(f64::hypot), false);
    // Matches the original's own `LOG(x, y) = pow(x, y)` (a carried-over
    // quirk, not a log at all); kept as-is rather than "fixed".
    add_builtin(table, "LOG", "Take log of arg1 with base arg2", host_fn2(f64::powf), false);
    add_builtin(table, "MIN", "Return lesser value", host_fn2(f64::min), false);
    add_builtin(table, "MAX", "Return greater value", host_fn2(f64::max), false);
    add_builtin(table, "POW", "Take arg1 to the arg2 power", host_fn2(f64::powf), false);

    add_builtin(
        table,
        "IF",
        "If arg1 is true (non-zero), return arg2, else arg3.",
        host_fn3(|x, y, z| if x != 0.0 { y } else { z }),
        false,
    );
    add_builtin(
        table,
        "CLAMP",
        "Restrict arg1 to the range [arg2, arg3]",
        host_fn3(|x, y, z| if x < y { y } else if x > z { z } else { x }),
        false,
    );
    add_builtin(
        table,
        "TO_SCALE",
        "Convert arg1 from range [0,1] to range [arg2, arg3]",
        host_fn3(|x, y, z| (z - y) * x + y),
        false,
    );
    add_builtin(
        table,
        "FROM_SCALE",
        "Convert arg1 from range [arg2, arg3] to range [0,1]",
        host_fn3(|x, y, z| (x - y) / (z - y)),
        false,
    );
}

fn add_builtin(table: &mut SymbolTable, name: &str, desc: &str, overload: Overload, return_is_string: bool) {
    let function = crate::function::FunctionValue::single(overload, return_is_string);
    let mut symbol = Symbol::new(name, SymbolKind::Function(function), Some(table.root));
    symbol.desc = desc.to_string();
    symbol.builtin = true;
    let id = table.symbols.alloc(symbol);
    table.scopes.get_mut(table.root).members.insert(name.to_string(), id);
}

fn exec_overload() -> Overload {
    Overload {
        arity: 1,
        call: Rc::new(|table, args| {
            let source = table.symbols.get(args[0]).as_string();
            let tokens = lex(&source, "EXEC")?;
            let root = table.root;
            let node = {
                let mut parser = Parser::new(tokens, &mut *table, root, "EXEC");
                parser.parse_program()?
            };
            let mut evaluator = Evaluator::new(&mut *table, "EXEC");
            match evaluator.eval(&node, root)? {
                Flow::Value(id) => Ok(id),
                _ => Ok(evaluator.table.make_temp_number(0.0)),
            }
        }),
    }
}

fn print_overload() -> Overload {
    Overload {
        arity: VARIADIC,
        call: Rc::new(|table, args| {
            for id in args {
                print!("{}", table.symbols.get(*id).as_string());
            }
            println!();
            Ok(table.make_temp_number(0.0))
        }),
    }
}
