//! Graph definition model.
//!
//! A workflow is a fixed set of named `Node`s connected by `Edge`s, with an
//! entry node and optional per-node `LoopPolicy`s. Definitions are produced
//! once, validated on submission, and read-only afterwards.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::{Result, StepGraphError};

/// Iteration ceiling applied when a loop policy does not name one.
pub const DEFAULT_MAX_ITERATIONS: u32 = 100;

/// A named unit of work, bound to a handler by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique name within the graph.
    pub name: String,
    /// Handler name, resolved against the registry at execution time.
    pub handler: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl Node {
    pub fn new(name: impl Into<String>, handler: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            handler: handler.into(),
            description: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Comparison operator of a `Condition`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
}

impl Operator {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "eq",
            Operator::Ne => "ne",
            Operator::Gt => "gt",
            Operator::Lt => "lt",
            Operator::Gte => "gte",
            Operator::Lte => "lte",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A `state[field] <operator> value` test.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            operator,
            value: value.into(),
        }
    }
}

/// A directed transition, optionally guarded by a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source: String,
    pub target: String,
    /// Absent means the edge always matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl Edge {
    /// Create an unconditional edge.
    pub fn always(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            condition: None,
        }
    }

    /// Create an edge guarded by `condition`.
    pub fn when(
        source: impl Into<String>,
        target: impl Into<String>,
        condition: Condition,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            condition: Some(condition),
        }
    }
}

/// Bounds re-entry into the node it is attached to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopPolicy {
    /// The node re-runs while this holds.
    pub condition: Condition,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: u32,
}

fn default_max_iterations() -> u32 {
    DEFAULT_MAX_ITERATIONS
}

impl LoopPolicy {
    pub fn new(condition: Condition) -> Self {
        Self {
            condition,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

/// A complete workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub name: String,
    pub nodes: Vec<Node>,
    /// Declaration order is evaluation order.
    #[serde(default)]
    pub edges: Vec<Edge>,
    pub entry_node: String,
    /// Loop policies keyed by node name.
    #[serde(default, deserialize_with = "null_as_empty")]
    pub loops: BTreeMap<String, LoopPolicy>,
}

fn null_as_empty<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, LoopPolicy>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<BTreeMap<String, LoopPolicy>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GraphDefinition {
    pub fn new(name: impl Into<String>, entry_node: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            nodes: vec![],
            edges: vec![],
            entry_node: entry_node.into(),
            loops: BTreeMap::new(),
        }
    }

    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    pub fn with_edge(mut self, edge: Edge) -> Self {
        self.edges.push(edge);
        self
    }

    pub fn with_loop(mut self, node: impl Into<String>, policy: LoopPolicy) -> Self {
        self.loops.insert(node.into(), policy);
        self
    }

    /// Parse a definition from JSON.
    pub fn from_json(input: &str) -> Result<Self> {
        serde_json::from_str(input).map_err(|e| StepGraphError::Serialization(e.to_string()))
    }

    /// Look up a node by name.
    pub fn node(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    /// Edges leaving `name`, in declaration order.
    pub fn outgoing<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Edge> + 'a {
        self.edges.iter().filter(move |e| e.source == name)
    }

    pub fn loop_policy(&self, name: &str) -> Option<&LoopPolicy> {
        self.loops.get(name)
    }
}
