//! Control lowering for `if` and `cond` nodes.
//!
//! The branches and clause tests of a conditional are evaluated lazily, so
//! everything that only exists to feed one of them has to be lowered inside
//! it. [`carve_slots`] finds, for each slot of each conditional in a scope,
//! the *chain* of units exclusively feeding that slot. Values shared with
//! the rest of the scope stay outside and are referenced by symbol.

use std::collections::{BTreeMap, HashMap, HashSet};

use tracegraph_core::{Edge, Handle, NodeId};

use crate::error::CodegenError;
use crate::ir::{Clause, Expr};
use crate::scope::Scope;

/// The units lowered inside one conditional slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotChain {
    /// The conditional owning the slot.
    pub owner: NodeId,
    pub handle: Handle,
    /// The unit whose value fills the slot.
    pub source: NodeId,
    /// Every unit of the chain, `source` included, in document order.
    pub units: Vec<NodeId>,
}

/// Slot chains of the outermost conditionals of a scope.
#[derive(Debug, Default)]
pub struct Slots {
    chains: Vec<SlotChain>,
    owners: HashMap<NodeId, NodeId>,
}

impl Slots {
    pub fn chains(&self) -> &[SlotChain] {
        &self.chains
    }

    pub fn chain(&self, owner: NodeId, handle: Handle) -> Option<&SlotChain> {
        self.chains
            .iter()
            .find(|c| c.owner == owner && c.handle == handle)
    }

    /// The conditional whose slot `unit` is lowered into.
    pub fn owner_of(&self, unit: NodeId) -> Option<NodeId> {
        self.owners.get(&unit).copied()
    }
}

/// Finds the slot chains of `scope`.
///
/// A slot's source unit seeds a chain when every edge leaving it enters that
/// slot. The chain then grows by every unit whose edges all enter the chain.
/// The scope's `exit` never joins a chain. Chains of a conditional that is
/// itself inside another chain are dropped: the inner conditional is
/// lowered with its owner, and carves its own chains there.
pub fn carve_slots(scope: &Scope<'_>, exit: Option<NodeId>) -> Slots {
    let graph = scope.graph();
    let mut chains = Vec::new();

    for &owner in scope.units() {
        if !graph.node(owner).is_some_and(|n| n.is_conditional()) {
            continue;
        }
        for edge in graph.incoming(owner) {
            if !edge.target_handle.is_slot() {
                continue;
            }
            let Some(source) = scope.lift(edge.source) else {
                continue;
            };
            if source == owner || Some(source) == exit {
                continue;
            }
            let exclusive = {
                let out = scope.outgoing(source);
                !out.is_empty()
                    && out
                        .iter()
                        .all(|(e, _)| e.target == owner && e.target_handle == edge.target_handle)
            };
            if !exclusive {
                continue;
            }

            let mut members: HashSet<NodeId> = HashSet::from([source]);
            loop {
                let joined: Vec<NodeId> = scope
                    .units()
                    .iter()
                    .copied()
                    .filter(|&u| u != owner && Some(u) != exit && !members.contains(&u))
                    .filter(|&u| {
                        let out = scope.outgoing(u);
                        !out.is_empty()
                            && out
                                .iter()
                                .all(|(_, t)| t.is_some_and(|t| members.contains(&t)))
                    })
                    .collect();
                if joined.is_empty() {
                    break;
                }
                members.extend(joined);
            }

            let units = scope
                .units()
                .iter()
                .copied()
                .filter(|u| members.contains(u))
                .collect();
            chains.push(SlotChain {
                owner,
                handle: edge.target_handle,
                source,
                units,
            });
        }
    }

    let claimed: HashSet<NodeId> = chains
        .iter()
        .flat_map(|c| c.units.iter().copied())
        .collect();
    chains.retain(|c| !claimed.contains(&c.owner));

    let owners = chains
        .iter()
        .flat_map(|c| c.units.iter().map(move |&u| (u, c.owner)))
        .collect();
    Slots { chains, owners }
}

// ---------------------------------------------------------------------------
// Conditional expressions
// ---------------------------------------------------------------------------

/// Groups the incoming edges of a conditional by handle.
///
/// Flow edges only order the conditional and are skipped. A handle fed by
/// more than one edge is an error.
pub fn slot_edges<'g>(
    owner: NodeId,
    incoming: Vec<&'g Edge>,
) -> Result<BTreeMap<Handle, &'g Edge>, CodegenError> {
    let mut by_handle = BTreeMap::new();
    for edge in incoming {
        if !edge.kind.carries_value() {
            continue;
        }
        if by_handle.insert(edge.target_handle, edge).is_some() {
            return Err(CodegenError::InvalidGraph(format!(
                "handle {} of node {} is fed by more than one edge",
                edge.target_handle, owner
            )));
        }
    }
    Ok(by_handle)
}

/// Builds `(if cond then else)` from lowered slot expressions.
///
/// `cond` and `then` are required; a missing `else` leaves the
/// one-armed form.
pub fn lower_if(owner: NodeId, mut slots: BTreeMap<Handle, Expr>) -> Result<Expr, CodegenError> {
    let cond = slots.remove(&Handle::Cond).ok_or_else(|| {
        CodegenError::InvalidGraph(format!("if node {} has no cond input", owner))
    })?;
    let then = slots.remove(&Handle::Then).ok_or_else(|| {
        CodegenError::InvalidGraph(format!("if node {} has no then branch", owner))
    })?;
    let otherwise = slots.remove(&Handle::Else);
    if let Some(handle) = slots.keys().next() {
        return Err(CodegenError::InvalidGraph(format!(
            "if node {} has no input {}",
            owner, handle
        )));
    }
    Ok(Expr::If {
        cond: Box::new(cond),
        then: Box::new(then),
        otherwise: otherwise.map(Box::new),
    })
}

/// Builds `(cond (test action) ...)` with clauses in ascending index order.
///
/// Every `test-N` needs a matching `action-N` and vice versa.
pub fn lower_cond(owner: NodeId, slots: BTreeMap<Handle, Expr>) -> Result<Expr, CodegenError> {
    let mut clauses: BTreeMap<usize, (Option<Expr>, Option<Expr>)> = BTreeMap::new();
    for (handle, expr) in slots {
        match handle {
            Handle::Test(n) => clauses.entry(n).or_default().0 = Some(expr),
            Handle::Action(n) => clauses.entry(n).or_default().1 = Some(expr),
            other => {
                return Err(CodegenError::InvalidGraph(format!(
                    "cond node {} has no input {}",
                    owner, other
                )))
            }
        }
    }

    clauses
        .into_iter()
        .map(|(n, pair)| match pair {
            (Some(test), Some(action)) => Ok(Clause { test, action }),
            (Some(_), None) => Err(CodegenError::InvalidGraph(format!(
                "cond node {}: test-{} has no matching action-{}",
                owner, n, n
            ))),
            _ => Err(CodegenError::InvalidGraph(format!(
                "cond node {}: action-{} has no matching test-{}",
                owner, n, n
            ))),
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Expr::Cond)
}
