//! Binding groups: sharing a value between several consumers.
//!
//! Lowering builds the program back to front, so a new binding is always
//! evaluated before everything already bound. [`bind`] unions it into the
//! value group at the head of the program when there is one, and upgrades
//! that group to `let*` as soon as any existing binding reads the new
//! symbol. The upgrade is one-way: a group that has to sequence keeps
//! sequencing.

use crate::ir::{Binding, Expr, LetKind};

/// Places `binding` in scope of `body`, merging with a head value group.
pub fn bind(body: Expr, binding: Binding) -> Expr {
    match body {
        Expr::Let {
            kind,
            mut bindings,
            body,
        } if is_value_group(&bindings) => {
            let referenced = bindings.iter().any(|b| b.value.mentions(&binding.symbol));
            let kind = if kind == LetKind::Sequential || referenced {
                LetKind::Sequential
            } else {
                LetKind::Parallel
            };
            bindings.insert(0, binding);
            Expr::Let {
                kind,
                bindings,
                body,
            }
        }
        other => Expr::Let {
            kind: LetKind::Parallel,
            bindings: vec![binding],
            body: Box::new(other),
        },
    }
}

/// The weakest discipline under which `bindings` evaluate correctly:
/// `let*` iff some binding reads a symbol bound earlier in the group.
pub fn minimal_kind(bindings: &[Binding]) -> LetKind {
    let sequential = bindings.iter().enumerate().any(|(i, later)| {
        bindings[..i]
            .iter()
            .any(|earlier| later.value.mentions(&earlier.symbol))
    });
    if sequential {
        LetKind::Sequential
    } else {
        LetKind::Parallel
    }
}

/// Value groups hold only shared node values. Span bookkeeping groups
/// (context and return symbols) order effects and are never merged into.
fn is_value_group(bindings: &[Binding]) -> bool {
    bindings.iter().all(|b| !b.symbol.is_span_bookkeeping())
}
