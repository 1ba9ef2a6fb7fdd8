//! Edge types and the handle-naming wire contract.
//!
//! Every [`Edge`] connects a named output handle of its source to a named
//! input handle of its target. Handle names are parsed into [`Handle`] at
//! load time, so positional indices are compared numerically (`arg-10`
//! sorts after `arg-9`).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::id::{EdgeId, NodeId};

/// Edge kinds in the authored graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EdgeKind {
    /// Carries a value from the producer's `value` handle to a consumer input.
    Data,
    /// Unconditional sequencing between side-effecting nodes.
    Flow,
    /// Attaches a clause body to a conditional's branch or action handle.
    Control,
}

impl EdgeKind {
    /// Returns `true` if the edge places the source's value into the target,
    /// i.e. the source is consumed at the target's handle.
    pub fn carries_value(self) -> bool {
        matches!(self, EdgeKind::Data | EdgeKind::Control)
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub id: EdgeId,
    pub source: NodeId,
    pub target: NodeId,
    #[serde(rename = "sourceHandle")]
    pub source_handle: Handle,
    #[serde(rename = "targetHandle")]
    pub target_handle: Handle,
    pub kind: EdgeKind,
}

impl Edge {
    /// A data edge from `source`'s value into `target` at `handle`.
    pub fn data(id: u32, source: NodeId, target: NodeId, handle: Handle) -> Self {
        Edge {
            id: EdgeId(id),
            source,
            target,
            source_handle: Handle::Value,
            target_handle: handle,
            kind: EdgeKind::Data,
        }
    }

    /// A flow edge: `source` runs before `target`.
    pub fn flow(id: u32, source: NodeId, target: NodeId) -> Self {
        Edge {
            id: EdgeId(id),
            source,
            target,
            source_handle: Handle::FlowOut,
            target_handle: Handle::FlowIn,
            kind: EdgeKind::Flow,
        }
    }

    /// A control edge attaching `source` as the body of `target`'s `handle`.
    pub fn control(id: u32, source: NodeId, target: NodeId, handle: Handle) -> Self {
        Edge {
            id: EdgeId(id),
            source,
            target,
            source_handle: Handle::Value,
            target_handle: handle,
            kind: EdgeKind::Control,
        }
    }

    /// Checks that the handles agree with the edge kind.
    ///
    /// Returns a human-readable reason on mismatch.
    pub fn check_handles(&self) -> Result<(), String> {
        match self.kind {
            EdgeKind::Flow => {
                if self.source_handle != Handle::FlowOut || self.target_handle != Handle::FlowIn {
                    return Err(format!(
                        "flow edge must connect flow-out to flow-in, got {} -> {}",
                        self.source_handle, self.target_handle
                    ));
                }
            }
            EdgeKind::Data => {
                if self.source_handle != Handle::Value {
                    return Err(format!(
                        "data edge must leave the value handle, got {}",
                        self.source_handle
                    ));
                }
                if !self.target_handle.is_input() {
                    return Err(format!(
                        "data edge cannot target handle {}",
                        self.target_handle
                    ));
                }
            }
            EdgeKind::Control => {
                if self.source_handle != Handle::Value {
                    return Err(format!(
                        "control edge must leave the value handle, got {}",
                        self.source_handle
                    ));
                }
                if !self.target_handle.is_clause_body() {
                    return Err(format!(
                        "control edge must target then/else/action-N, got {}",
                        self.target_handle
                    ));
                }
            }
        }
        Ok(())
    }
}

/// Named connection points on nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Handle {
    /// The single value output of a node.
    Value,
    /// Positional call argument.
    Arg(usize),
    /// Condition input of an `if`.
    Cond,
    Then,
    Else,
    /// Test of the N-th `cond` clause.
    Test(usize),
    /// Body of the N-th `cond` clause.
    Action(usize),
    FlowIn,
    FlowOut,
}

impl Handle {
    /// Handles that accept an incoming data edge.
    pub fn is_input(self) -> bool {
        !matches!(self, Handle::Value | Handle::FlowIn | Handle::FlowOut)
    }

    /// Conditional slots whose source is lowered as a lazily evaluated chain.
    pub fn is_slot(self) -> bool {
        matches!(
            self,
            Handle::Then | Handle::Else | Handle::Test(_) | Handle::Action(_)
        )
    }

    /// Handles a control edge may attach to.
    pub fn is_clause_body(self) -> bool {
        matches!(self, Handle::Then | Handle::Else | Handle::Action(_))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Handle::Value => write!(f, "value"),
            Handle::Arg(i) => write!(f, "arg-{}", i),
            Handle::Cond => write!(f, "cond"),
            Handle::Then => write!(f, "then"),
            Handle::Else => write!(f, "else"),
            Handle::Test(i) => write!(f, "test-{}", i),
            Handle::Action(i) => write!(f, "action-{}", i),
            Handle::FlowIn => write!(f, "flow-in"),
            Handle::FlowOut => write!(f, "flow-out"),
        }
    }
}

impl FromStr for Handle {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let indexed = |prefix: &str| -> Option<Result<usize, String>> {
            s.strip_prefix(prefix).map(|digits| {
                digits
                    .parse::<usize>()
                    .map_err(|_| format!("bad index in handle '{}'", s))
            })
        };

        match s {
            "value" => return Ok(Handle::Value),
            "cond" => return Ok(Handle::Cond),
            "then" => return Ok(Handle::Then),
            "else" => return Ok(Handle::Else),
            "flow-in" => return Ok(Handle::FlowIn),
            "flow-out" => return Ok(Handle::FlowOut),
            _ => {}
        }
        if let Some(index) = indexed("arg-") {
            return index.map(Handle::Arg);
        }
        if let Some(index) = indexed("test-") {
            return index.map(Handle::Test);
        }
        if let Some(index) = indexed("action-") {
            return index.map(Handle::Action);
        }
        Err(format!("unknown handle '{}'", s))
    }
}

impl TryFrom<String> for Handle {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Handle> for String {
    fn from(handle: Handle) -> Self {
        handle.to_string()
    }
}
