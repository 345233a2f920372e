//! The pipeline graph: the editor's node/edge document plus lookup helpers.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use gantry_types::{Edge, NodeConfig};

/// The JSON document the editor saves: a named graph of configured nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineDoc {
    pub name: String,
    pub nodes: Vec<PipelineNode>,
    pub edges: Vec<Edge>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineNode {
    pub id: String,
    #[serde(flatten)]
    pub config: NodeConfig,
}

/// Graph with adjacency built for traversal. Edges are sorted by source so
/// each node's outgoing edges form a contiguous slice.
#[derive(Debug, Clone)]
pub struct PipelineGraph {
    pub name: String,
    nodes: HashMap<String, PipelineNode>,
    edges: Vec<Edge>,
    adjacency: HashMap<String, (usize, usize)>,
}

impl PipelineGraph {
    pub fn from_doc(doc: PipelineDoc) -> Self {
        let mut nodes = HashMap::new();
        for node in doc.nodes {
            nodes.insert(node.id.clone(), node);
        }

        let mut edges = doc.edges;
        edges.sort_by(|a, b| a.source.cmp(&b.source));

        let mut adjacency: HashMap<String, (usize, usize)> = HashMap::new();
        let mut i = 0;
        while i < edges.len() {
            let start = i;
            let source = &edges[i].source;
            while i < edges.len() && edges[i].source == *source {
                i += 1;
            }
            adjacency.insert(source.clone(), (start, i - start));
        }

        PipelineGraph {
            name: doc.name,
            nodes,
            edges,
            adjacency,
        }
    }

    pub fn node(&self, id: &str) -> Option<&PipelineNode> {
        self.nodes.get(id)
    }

    pub fn all_nodes(&self) -> impl Iterator<Item = &PipelineNode> {
        self.nodes.values()
    }

    pub fn all_edges(&self) -> &[Edge] {
        &self.edges
    }

    pub fn outgoing_edges(&self, node_id: &str) -> &[Edge] {
        match self.adjacency.get(node_id) {
            Some(&(start, count)) => &self.edges[start..start + count],
            None => &[],
        }
    }

    pub fn incoming_edges(&self, node_id: &str) -> Vec<&Edge> {
        self.edges.iter().filter(|e| e.target == node_id).collect()
    }

    /// Whether a direct edge `source -> target` exists.
    pub fn has_edge(&self, source: &str, target: &str) -> bool {
        self.outgoing_edges(source).iter().any(|e| e.target == target)
    }

    /// All nodes matching a predicate on their configuration.
    pub fn nodes_where<'a>(
        &'a self,
        predicate: impl Fn(&NodeConfig) -> bool + 'a,
    ) -> impl Iterator<Item = &'a PipelineNode> {
        self.nodes.values().filter(move |n| predicate(&n.config))
    }

    pub fn data_loader(&self) -> Option<&PipelineNode> {
        self.nodes_where(|c| matches!(c, NodeConfig::DataLoader { .. })).next()
    }

    pub fn data_split(&self) -> Option<&PipelineNode> {
        self.nodes_where(|c| matches!(c, NodeConfig::DataSplit(_))).next()
    }

    /// The executable terminal node: a trainer or a script node.
    pub fn executable(&self) -> Option<&PipelineNode> {
        self.nodes_where(|c| matches!(c, NodeConfig::Trainer(_) | NodeConfig::Script { .. }))
            .next()
    }

    /// Whether `target_id` is reachable from `source_id` along edges.
    pub fn reachable(&self, source_id: &str, target_id: &str) -> bool {
        use std::collections::{HashSet, VecDeque};
        let mut visited = HashSet::new();
        let mut queue = VecDeque::new();
        visited.insert(source_id.to_string());
        queue.push_back(source_id.to_string());
        while let Some(current) = queue.pop_front() {
            if current == target_id {
                return true;
            }
            for edge in self.outgoing_edges(&current) {
                if visited.insert(edge.target.clone()) {
                    queue.push_back(edge.target.clone());
                }
            }
        }
        false
    }
}
