//! Tagged intermediate representation of the generated program.
//!
//! [`Expr`] is a closed sum over every construct the lowering can produce.
//! The renderer matches on it exhaustively, so adding a variant forces the
//! generator to handle it.
//!
//! Variables are [`Symbol`]s. Placeholders for not-yet-lowered producers are
//! plain `Var`s naming the producer's value symbol; lowering later either
//! substitutes the producer's expression into the single placeholder or
//! binds the symbol in an enclosing `let`. Both operations respect lexical
//! scope: an occurrence shadowed by an inner binding of the same symbol is
//! not free and is left alone.

use tracegraph_core::ConstValue;

use crate::symbol::Symbol;

/// Evaluation discipline of a binding group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LetKind {
    /// `let`: bindings are independent of one another.
    Parallel,
    /// `let*`: each binding sees the ones before it.
    Sequential,
}

/// One `(symbol value)` pair of a binding group.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    pub symbol: Symbol,
    pub value: Expr,
}

impl Binding {
    pub fn new(symbol: Symbol, value: Expr) -> Self {
        Binding { symbol, value }
    }
}

/// One `(test action)` clause of a `cond`.
#[derive(Debug, Clone, PartialEq)]
pub struct Clause {
    pub test: Expr,
    pub action: Expr,
}

/// An expression of the target language.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(ConstValue),
    Var(Symbol),
    Call {
        name: String,
        args: Vec<Expr>,
    },
    Let {
        kind: LetKind,
        bindings: Vec<Binding>,
        body: Box<Expr>,
    },
    /// Sequential evaluation; the value is the last item's.
    Begin(Vec<Expr>),
    If {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Option<Box<Expr>>,
    },
    Cond(Vec<Clause>),
    /// Opens a tracing span. `parent` is the enclosing span's context, if any.
    StartSpan {
        name: String,
        parent: Option<Symbol>,
    },
    /// Closes the span whose context is `context`.
    EndSpan {
        context: Symbol,
    },
}

impl Expr {
    pub fn var(symbol: Symbol) -> Self {
        Expr::Var(symbol)
    }

    pub fn call(name: impl Into<String>, args: Vec<Expr>) -> Self {
        Expr::Call {
            name: name.into(),
            args,
        }
    }

    /// Returns `true` if `symbol` occurs free in this expression.
    pub fn mentions(&self, symbol: &Symbol) -> bool {
        self.count_free(symbol) > 0
    }

    /// Number of free occurrences of `symbol`.
    pub fn count_free(&self, symbol: &Symbol) -> usize {
        match self {
            Expr::Literal(_) => 0,
            Expr::Var(s) => usize::from(s == symbol),
            Expr::Call { args, .. } => args.iter().map(|a| a.count_free(symbol)).sum(),
            Expr::Begin(items) => items.iter().map(|e| e.count_free(symbol)).sum(),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                cond.count_free(symbol)
                    + then.count_free(symbol)
                    + otherwise.as_ref().map_or(0, |e| e.count_free(symbol))
            }
            Expr::Cond(clauses) => clauses
                .iter()
                .map(|c| c.test.count_free(symbol) + c.action.count_free(symbol))
                .sum(),
            Expr::StartSpan { parent, .. } => usize::from(parent.as_ref() == Some(symbol)),
            Expr::EndSpan { context } => usize::from(context == symbol),
            Expr::Let {
                kind,
                bindings,
                body,
            } => {
                let mut count = 0;
                let mut shadowed = false;
                for binding in bindings {
                    if !shadowed || *kind == LetKind::Parallel {
                        count += binding.value.count_free(symbol);
                    }
                    if binding.symbol == *symbol {
                        shadowed = true;
                    }
                }
                if !shadowed {
                    count += body.count_free(symbol);
                }
                count
            }
        }
    }

    /// Replaces every free occurrence of `symbol` with `replacement` and
    /// returns how many were replaced.
    pub fn substitute(&mut self, symbol: &Symbol, replacement: &Expr) -> usize {
        match self {
            Expr::Literal(_) | Expr::StartSpan { .. } | Expr::EndSpan { .. } => 0,
            Expr::Var(s) if *s == *symbol => {
                *self = replacement.clone();
                1
            }
            Expr::Var(_) => 0,
            Expr::Call { args, .. } => args
                .iter_mut()
                .map(|a| a.substitute(symbol, replacement))
                .sum(),
            Expr::Begin(items) => items
                .iter_mut()
                .map(|e| e.substitute(symbol, replacement))
                .sum(),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                cond.substitute(symbol, replacement)
                    + then.substitute(symbol, replacement)
                    + otherwise
                        .as_mut()
                        .map_or(0, |e| e.substitute(symbol, replacement))
            }
            Expr::Cond(clauses) => clauses
                .iter_mut()
                .map(|c| {
                    c.test.substitute(symbol, replacement) + c.action.substitute(symbol, replacement)
                })
                .sum(),
            Expr::Let {
                kind,
                bindings,
                body,
            } => {
                let mut count = 0;
                let mut shadowed = false;
                for binding in bindings.iter_mut() {
                    if !shadowed || *kind == LetKind::Parallel {
                        count += binding.value.substitute(symbol, replacement);
                    }
                    if binding.symbol == *symbol {
                        shadowed = true;
                    }
                }
                if !shadowed {
                    count += body.substitute(symbol, replacement);
                }
                count
            }
        }
    }

    /// Visits this expression and every sub-expression, parents first.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        match self {
            Expr::Literal(_) | Expr::Var(_) | Expr::StartSpan { .. } | Expr::EndSpan { .. } => {}
            Expr::Call { args, .. } => args.iter().for_each(|a| a.walk(visit)),
            Expr::Begin(items) => items.iter().for_each(|e| e.walk(visit)),
            Expr::If {
                cond,
                then,
                otherwise,
            } => {
                cond.walk(visit);
                then.walk(visit);
                if let Some(e) = otherwise {
                    e.walk(visit);
                }
            }
            Expr::Cond(clauses) => {
                for clause in clauses {
                    clause.test.walk(visit);
                    clause.action.walk(visit);
                }
            }
            Expr::Let { bindings, body, .. } => {
                for binding in bindings {
                    binding.value.walk(visit);
                }
                body.walk(visit);
            }
        }
    }
}
