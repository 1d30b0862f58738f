//! Function symbols: overload sets dispatched by arity (§3.2 Function,
//! §4.3 rule 4), and the arity-specific adapters Design Note "Function
//! wrapping" calls for in place of the original's templated adapters.

use std::rc::Rc;

use crate::error::{EmplodeError, EmplodeResult, Site};
use crate::symbol::SymbolId;
use crate::symbol_table::SymbolTable;
use crate::value::Scalar;

/// `-1` marks a variadic overload that accepts the raw argument vector
/// (§3.2: "arity ... or −1 meaning variadic").
pub const VARIADIC: i32 = -1;

pub type HostCallback = Rc<dyn Fn(&mut SymbolTable, &[SymbolId]) -> EmplodeResult<SymbolId>>;

#[derive(Clone)]
pub struct Overload {
    pub arity: i32,
    pub call: HostCallback,
}

/// A function symbol's overload set (§3.2: "All overloads of one
/// function share a single declared return type").
#[derive(Clone)]
pub struct FunctionValue {
    pub overloads: Vec<Overload>,
    pub return_is_string: bool,
}

impl std::fmt::Debug for FunctionValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionValue")
            .field("arities", &self.overloads.iter().map(|o| o.arity).collect::<Vec<_>>())
            .finish()
    }
}

impl FunctionValue {
    pub fn single(overload: Overload, return_is_string: bool) -> Self {
        Self {
            overloads: vec![overload],
            return_is_string,
        }
    }

    /// Select the overload whose declared arity equals `argc`, else the
    /// first variadic overload, per §4.3 rule 4.
    pub fn select(&self, argc: usize) -> Option<&Overload> {
        self.overloads
            .iter()
            .find(|o| o.arity == argc as i32)
            .or_else(|| self.overloads.iter().find(|o| o.arity == VARIADIC))
    }

    pub fn call(
        &self,
        table: &mut SymbolTable,
        args: &[SymbolId],
        site: &Site,
    ) -> EmplodeResult<SymbolId> {
        match self.select(args.len()) {
            Some(overload) => (overload.call)(table, args),
            None => {
                let arities: Vec<String> = self.overloads.iter().map(|o| o.arity.to_string()).collect();
                Err(EmplodeError::arity(
                    site.clone(),
                    format!(
                        "no overload accepts {} argument(s); available arities: [{}]",
                        args.len(),
                        arities.join(", ")
                    ),
                ))
            }
        }
    }
}

fn coerce_double(table: &SymbolTable, id: SymbolId, site: &Site) -> EmplodeResult<f64> {
    let sym = table.symbols.get(id);
    if sym.is_string() && !sym.is_numeric() {
        return Err(EmplodeError::type_error(
            site.clone(),
            format!("cannot coerce string argument '{}' to a number", sym.as_string()),
        ));
    }
    Ok(sym.as_double())
}

fn coerce_string(table: &SymbolTable, id: SymbolId) -> String {
    table.symbols.get(id).as_string()
}

/// Wrap a 1-argument `f64 -> f64` host function (e.g. `SIN`, `SQRT`)
/// into the uniform overload shape.
pub fn host_fn1(f: impl Fn(f64) -> f64 + 'static) -> Overload {
    let f = Rc::new(f);
    Overload {
        arity: 1,
        call: Rc::new(move |table, args| {
            let site = Site::new("builtin", 0, "");
            let x = coerce_double(table, args[0], &site)?;
            Ok(table.make_temp_number(f(x)))
        }),
    }
}

/// Wrap a 2-argument `(f64, f64) -> f64` host function (e.g. `POW`,
/// `HYPOT`, `MIN`, `MAX`).
pub fn host_fn2(f: impl Fn(f64, f64) -> f64 + 'static) -> Overload {
    let f = Rc::new(f);
    Overload {
        arity: 2,
        call: Rc::new(move |table, args| {
            let site = Site::new("builtin", 0, "");
            let x = coerce_double(table, args[0], &site)?;
            let y = coerce_double(table, args[1], &site)?;
            Ok(table.make_temp_number(f(x, y)))
        }),
    }
}

/// Wrap a 3-argument `(f64, f64, f64) -> f64` host function (e.g.
/// `CLAMP`, `TO_SCALE`).
pub fn host_fn3(f: impl Fn(f64, f64, f64) -> f64 + 'static) -> Overload {
    let f = Rc::new(f);
    Overload {
        arity: 3,
        call: Rc::new(move |table, args| {
            let site = Site::new("builtin", 0, "");
            let x = coerce_double(table, args[0], &site)?;
            let y = coerce_double(table, args[1], &site)?;
            let z = coerce_double(table, args[2], &site)?;
            Ok(table.make_temp_number(f(x, y, z)))
        }),
    }
}

/// Wrap a variadic host function over the raw argument vector
/// (e.g. `PRINT`, a host `sum(args...)`).
pub fn host_fn_variadic(
    f: impl Fn(&mut SymbolTable, &[SymbolId]) -> EmplodeResult<Scalar> + 'static,
) -> Overload {
    let f = Rc::new(f);
    Overload {
        arity: VARIADIC,
        call: Rc::new(move |table, args| {
            let value = f(table, args)?;
            Ok(table.make_temp_var(value))
        }),
    }
}

pub fn arg_as_string(table: &SymbolTable, args: &[SymbolId], index: usize) -> String {
    coerce_string(table, args[index])
}
