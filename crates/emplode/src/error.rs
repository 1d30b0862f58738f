//! Error taxonomy (§7). Hand-rolled enum + `Display`, in the style of the
//! teacher's `ParseError<'c>` (no `thiserror` — the teacher doesn't reach
//! for it either).

use std::fmt;

/// Where a diagnostic happened. Every error kind in §7 carries one of
/// these; `Display` renders all four fields per "User-visible failure".
#[derive(Debug, Clone)]
pub struct Site {
    pub origin: String,
    pub line: usize,
    pub scope: String,
}

impl Site {
    pub fn new(origin: impl Into<String>, line: usize, scope: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            line,
            scope: scope.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub enum EmplodeError {
    /// An unmatched character in the source.
    Lex { site: Site, message: String },
    /// Unexpected token, missing delimiter, reserved keyword used as an
    /// identifier, unresolved identifier, bad lvalue on the left of `=`.
    Parse { site: Site, message: String },
    /// Operator applied to incompatible operand kinds, or a call
    /// argument's coercion failed.
    Type { site: Site, message: String },
    /// Call or trigger with the wrong number of arguments.
    Arity { site: Site, message: String },
    /// Redeclaration, assignment into a nonexistent scope member, or
    /// reference to an unknown signal.
    Name { site: Site, message: String },
    /// Copy-value failure, or a null dereference on a scope path that
    /// resolved to null.
    Runtime { site: Site, message: String },
}

impl EmplodeError {
    fn site(&self) -> &Site {
        match self {
            Self::Lex { site, .. }
            | Self::Parse { site, .. }
            | Self::Type { site, .. }
            | Self::Arity { site, .. }
            | Self::Name { site, .. }
            | Self::Runtime { site, .. } => site,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Lex { .. } => "LexError",
            Self::Parse { .. } => "ParseError",
            Self::Type { .. } => "TypeError",
            Self::Arity { .. } => "ArityError",
            Self::Name { .. } => "NameError",
            Self::Runtime { .. } => "RuntimeError",
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::Lex { message, .. }
            | Self::Parse { message, .. }
            | Self::Type { message, .. }
            | Self::Arity { message, .. }
            | Self::Name { message, .. }
            | Self::Runtime { message, .. } => message,
        }
    }

    pub fn lex(site: Site, message: impl Into<String>) -> Self {
        Self::Lex {
            site,
            message: message.into(),
        }
    }
    pub fn parse(site: Site, message: impl Into<String>) -> Self {
        Self::Parse {
            site,
            message: message.into(),
        }
    }
    pub fn type_error(site: Site, message: impl Into<String>) -> Self {
        Self::Type {
            site,
            message: message.into(),
        }
    }
    pub fn arity(site: Site, message: impl Into<String>) -> Self {
        Self::Arity {
            site,
            message: message.into(),
        }
    }
    pub fn name(site: Site, message: impl Into<String>) -> Self {
        Self::Name {
            site,
            message: message.into(),
        }
    }
    pub fn runtime(site: Site, message: impl Into<String>) -> Self {
        Self::Runtime {
            site,
            message: message.into(),
        }
    }
}

impl fmt::Display for EmplodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let site = self.site();
        write!(
            f,
            "{}:{}: in scope '{}': {}: {}",
            site.origin,
            site.line,
            site.scope,
            self.kind_name(),
            self.message()
        )
    }
}

impl std::error::Error for EmplodeError {}

pub type EmplodeResult<T> = Result<T, EmplodeError>;
