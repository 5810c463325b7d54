//! Question graph store
//!
//! An immutable directed graph of triage questions. Nodes carry the string
//! catalog key of their prompt, edges carry the catalog key of the answer that
//! leads along them. A node without outgoing edges is terminal.
//!
//! The graph is loaded once from a JSON definition, validated, and then only
//! read, so it can be shared behind an `Arc` without locking.

use compact_str::CompactString;
use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::collections::{HashMap, HashSet};
use std::fmt::{self, Display};
use std::path::Path;
use tracing::info;

use crate::category::{Handoff, RequestCategory};
use crate::error::{CoreError, Result};

/// Identifier of a node in the question graph
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(CompactString);

impl NodeId {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self(CompactString::new(id.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Borrow<str> for NodeId {
    fn borrow(&self) -> &str {
        self.as_str()
    }
}

impl From<&str> for NodeId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// String catalog key of a prompt or an answer label
pub type StringId = CompactString;

/// A question in the graph
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionNode {
    pub id: NodeId,
    pub prompt: Option<StringId>,
    pub multichoice: bool,
    /// Selectable answers of a multichoice node, in display order
    pub choices: Vec<StringId>,
    /// Kind of help requested when triage ends on this node
    pub category: Option<RequestCategory>,
    /// Room told about this ending instead of queueing a request
    pub handoff: Option<Handoff>,
}

/// An answer leading from one node to the next
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Edge {
    pub target: NodeId,
    pub answer: StringId,
}

/// On-disk form of the graph
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphDefinition {
    pub start: NodeId,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<EdgeDefinition>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: NodeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<StringId>,
    #[serde(default)]
    pub multichoice: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<StringId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<RequestCategory>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handoff: Option<Handoff>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub from: NodeId,
    pub to: NodeId,
    pub answer: StringId,
}

#[derive(Debug, Clone)]
pub struct QuestionGraph {
    start: NodeId,
    nodes: HashMap<NodeId, QuestionNode>,
    /// Declaration order, kept for stable iteration
    order: Vec<NodeId>,
    /// Outgoing edges per node, in declaration order
    edges: HashMap<NodeId, Vec<Edge>>,
}

impl QuestionGraph {
    /// Load and validate a graph definition from a JSON file
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| CoreError::graph_load_failed(path, e))?;
        let definition: GraphDefinition =
            serde_json::from_str(&content).map_err(|e| CoreError::graph_load_failed(path, e))?;

        let graph = Self::from_definition(definition)?;
        info!(
            path = %path.display(),
            nodes = graph.len(),
            start = %graph.start,
            "Loaded question graph"
        );
        Ok(graph)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let definition: GraphDefinition =
            serde_json::from_str(json).map_err(|e| CoreError::GraphLoadFailed {
                path: "<inline>".to_string(),
                cause: e.into(),
            })?;
        Self::from_definition(definition)
    }

    /// Build the graph, rejecting definitions the triage walker cannot run
    pub fn from_definition(definition: GraphDefinition) -> Result<Self> {
        let mut nodes = HashMap::with_capacity(definition.nodes.len());
        let mut order = Vec::with_capacity(definition.nodes.len());

        for node in definition.nodes {
            if nodes.contains_key(&node.id) {
                return Err(CoreError::invalid_graph(
                    node.id.as_str(),
                    "node declared twice",
                ));
            }
            order.push(node.id.clone());
            nodes.insert(
                node.id.clone(),
                QuestionNode {
                    id: node.id,
                    prompt: node.prompt,
                    multichoice: node.multichoice,
                    choices: node.choices,
                    category: node.category,
                    handoff: node.handoff,
                },
            );
        }

        let mut edges: HashMap<NodeId, Vec<Edge>> = HashMap::new();
        for edge in definition.edges {
            if !nodes.contains_key(&edge.from) {
                return Err(CoreError::invalid_graph(
                    edge.from.as_str(),
                    "edge starts at an undeclared node",
                ));
            }
            if !nodes.contains_key(&edge.to) {
                return Err(CoreError::invalid_graph(
                    edge.from.as_str(),
                    format!("edge leads to undeclared node '{}'", edge.to),
                ));
            }
            let outgoing = edges.entry(edge.from.clone()).or_default();
            if outgoing.iter().any(|e| e.answer == edge.answer) {
                return Err(CoreError::invalid_graph(
                    edge.from.as_str(),
                    format!("answer '{}' offered twice", edge.answer),
                ));
            }
            outgoing.push(Edge {
                target: edge.to,
                answer: edge.answer,
            });
        }

        let graph = Self {
            start: definition.start,
            nodes,
            order,
            edges,
        };
        graph.validate()?;
        Ok(graph)
    }

    fn validate(&self) -> Result<()> {
        if !self.nodes.contains_key(&self.start) {
            return Err(CoreError::invalid_graph(
                self.start.as_str(),
                "start node is not declared",
            ));
        }
        if self.is_terminal(self.start.as_str()) {
            return Err(CoreError::invalid_graph(
                self.start.as_str(),
                "start node has no answers",
            ));
        }

        for id in &self.order {
            let node = &self.nodes[id];
            let outgoing = self.outgoing_edges(id.as_str());

            if !outgoing.is_empty() && node.prompt.is_none() {
                return Err(CoreError::invalid_graph(
                    id.as_str(),
                    "question node has no prompt",
                ));
            }
            if !outgoing.is_empty() && node.category.is_some() {
                return Err(CoreError::invalid_graph(
                    id.as_str(),
                    "only terminal nodes may carry a category",
                ));
            }
            if !outgoing.is_empty() && node.handoff.is_some() {
                return Err(CoreError::invalid_graph(
                    id.as_str(),
                    "only terminal nodes may carry a handoff",
                ));
            }
            if node.category.is_some() && node.handoff.is_some() {
                return Err(CoreError::invalid_graph(
                    id.as_str(),
                    "a node cannot both queue a request and hand off",
                ));
            }

            if node.multichoice {
                if node.choices.is_empty() {
                    return Err(CoreError::invalid_graph(
                        id.as_str(),
                        "multichoice node has no choices",
                    ));
                }
                if outgoing.len() != 1 {
                    return Err(CoreError::invalid_graph(
                        id.as_str(),
                        format!(
                            "multichoice node needs exactly one outgoing edge, found {}",
                            outgoing.len()
                        ),
                    ));
                }
                let mut seen = HashSet::new();
                if let Some(duplicate) = node.choices.iter().find(|c| !seen.insert(*c)) {
                    return Err(CoreError::invalid_graph(
                        id.as_str(),
                        format!("choice '{}' listed twice", duplicate),
                    ));
                }
            } else if !node.choices.is_empty() {
                return Err(CoreError::invalid_graph(
                    id.as_str(),
                    "choices given on a node that is not multichoice",
                ));
            }
        }

        Ok(())
    }

    pub fn start(&self) -> &NodeId {
        &self.start
    }

    pub fn node(&self, id: &str) -> Option<&QuestionNode> {
        self.nodes.get(id)
    }

    /// Prompt of `id`, or `None` when the node is unknown or terminal
    pub fn next_prompt(&self, id: &str) -> Option<&StringId> {
        if self.is_terminal(id) {
            return None;
        }
        self.nodes.get(id).and_then(|node| node.prompt.as_ref())
    }

    pub fn is_multichoice(&self, id: &str) -> bool {
        self.nodes.get(id).is_some_and(|node| node.multichoice)
    }

    /// Outgoing edges in declaration order
    pub fn outgoing_edges(&self, id: &str) -> &[Edge] {
        self.edges.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn choices(&self, id: &str) -> &[StringId] {
        self.nodes
            .get(id)
            .map(|node| node.choices.as_slice())
            .unwrap_or(&[])
    }

    pub fn category(&self, id: &str) -> Option<RequestCategory> {
        self.nodes.get(id).and_then(|node| node.category)
    }

    pub fn handoff(&self, id: &str) -> Option<Handoff> {
        self.nodes.get(id).and_then(|node| node.handoff)
    }

    pub fn is_terminal(&self, id: &str) -> bool {
        self.outgoing_edges(id).is_empty()
    }

    /// Node ids in declaration order
    pub fn node_ids(&self) -> impl Iterator<Item = &NodeId> {
        self.order.iter()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &QuestionNode> {
        self.order.iter().map(|id| &self.nodes[id])
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SMALL: &str = r#"{
        "start": "a",
        "nodes": [
            {"id": "a", "prompt": "q_a"},
            {"id": "b", "prompt": "q_b", "multichoice": true, "choices": ["x", "y"]},
            {"id": "c", "category": "social"},
            {"id": "d", "category": "medical"}
        ],
        "edges": [
            {"from": "a", "to": "b", "answer": "yes"},
            {"from": "a", "to": "c", "answer": "no"},
            {"from": "b", "to": "d", "answer": "done"}
        ]
    }"#;

    #[test]
    fn test_queries() {
        let graph = QuestionGraph::from_json_str(SMALL).unwrap();
        assert_eq!(graph.start().as_str(), "a");
        assert_eq!(graph.next_prompt("a").map(|p| p.as_str()), Some("q_a"));
        assert_eq!(graph.next_prompt("c"), None);
        assert_eq!(graph.next_prompt("missing"), None);
        assert!(graph.is_multichoice("b"));
        assert!(!graph.is_multichoice("a"));
        assert_eq!(graph.category("d"), Some(RequestCategory::Medical));
        assert_eq!(graph.choices("b").len(), 2);
    }

    #[test]
    fn test_edge_order_is_stable() {
        let graph = QuestionGraph::from_json_str(SMALL).unwrap();
        let answers: Vec<_> = graph
            .outgoing_edges("a")
            .iter()
            .map(|e| (e.target.as_str(), e.answer.as_str()))
            .collect();
        assert_eq!(answers, vec![("b", "yes"), ("c", "no")]);
        let again: Vec<_> = graph
            .outgoing_edges("a")
            .iter()
            .map(|e| e.target.as_str())
            .collect();
        assert_eq!(again, vec!["b", "c"]);
    }

    #[test]
    fn test_rejects_unknown_edge_target() {
        let err = QuestionGraph::from_json_str(
            r#"{"start": "a", "nodes": [{"id": "a", "prompt": "q"}],
                "edges": [{"from": "a", "to": "zzz", "answer": "yes"}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::InvalidGraph { .. }));
        assert!(err.to_string().contains("zzz"));
    }

    #[test]
    fn test_rejects_terminal_start() {
        let err = QuestionGraph::from_json_str(r#"{"start": "a", "nodes": [{"id": "a"}]}"#)
            .unwrap_err();
        assert!(err.to_string().contains("start node has no answers"));
    }

    #[test]
    fn test_rejects_multichoice_with_two_edges() {
        let err = QuestionGraph::from_json_str(
            r#"{"start": "m", "nodes": [
                    {"id": "m", "prompt": "q", "multichoice": true, "choices": ["x"]},
                    {"id": "e1"}, {"id": "e2"}],
                "edges": [
                    {"from": "m", "to": "e1", "answer": "done"},
                    {"from": "m", "to": "e2", "answer": "other"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("exactly one outgoing edge"));
    }

    #[test]
    fn test_rejects_question_without_prompt() {
        let err = QuestionGraph::from_json_str(
            r#"{"start": "a", "nodes": [{"id": "a"}, {"id": "b"}],
                "edges": [{"from": "a", "to": "b", "answer": "yes"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("no prompt"));
    }

    #[test]
    fn test_handoff_endings() {
        let graph = QuestionGraph::from_json_str(
            r#"{"start": "a", "nodes": [
                    {"id": "a", "prompt": "q"},
                    {"id": "helper", "prompt": "t_helper", "handoff": "new_members"}],
                "edges": [{"from": "a", "to": "helper", "answer": "yes"}]}"#,
        )
        .unwrap();
        assert_eq!(graph.handoff("helper"), Some(Handoff::NewMembers));
        assert_eq!(graph.category("helper"), None);
        assert_eq!(graph.handoff("a"), None);

        let err = QuestionGraph::from_json_str(
            r#"{"start": "a", "nodes": [
                    {"id": "a", "prompt": "q", "handoff": "new_members"}, {"id": "b"}],
                "edges": [{"from": "a", "to": "b", "answer": "yes"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("only terminal nodes may carry a handoff"));

        let err = QuestionGraph::from_json_str(
            r#"{"start": "a", "nodes": [
                    {"id": "a", "prompt": "q"},
                    {"id": "b", "category": "medical", "handoff": "new_members"}],
                "edges": [{"from": "a", "to": "b", "answer": "yes"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot both queue a request and hand off"));
    }

    #[test]
    fn test_rejects_duplicate_answers() {
        let err = QuestionGraph::from_json_str(
            r#"{"start": "a", "nodes": [{"id": "a", "prompt": "q"}, {"id": "b"}, {"id": "c"}],
                "edges": [
                    {"from": "a", "to": "b", "answer": "yes"},
                    {"from": "a", "to": "c", "answer": "yes"}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("offered twice"));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("questions.json");
        std::fs::write(&path, SMALL).unwrap();

        let graph = QuestionGraph::load(&path).await.unwrap();
        assert_eq!(graph.len(), 4);

        let missing = QuestionGraph::load(&dir.path().join("nope.json"))
            .await
            .unwrap_err();
        assert!(matches!(missing, CoreError::GraphLoadFailed { .. }));
    }
}
