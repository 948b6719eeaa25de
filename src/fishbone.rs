//! Fishbone (Ishikawa) graph construction
//!
//! One issue node at the head, one node per category, one node per cause.
//! Edges point from cause to category and from category to issue, following
//! the direction in which a cause contributes to the effect.

use crate::collector::CategoryCauses;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub const ISSUE_NODE_ID: &str = "main";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Issue,
    Category,
    Cause,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FishboneNode {
    pub id: String,
    pub label: String,
    pub kind: NodeKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FishboneEdge {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FishboneGraph {
    pub nodes: Vec<FishboneNode>,
    pub edges: Vec<FishboneEdge>,
}

impl FishboneGraph {
    /// Build the graph for `issue` from ordered category branches.
    ///
    /// Ids are `main`, `cat_<category>` and `<category>_<cause>`. When an id is
    /// already taken it gets a `#2`, `#3`, ... suffix, so repeated labels never
    /// collapse into one node.
    pub fn build(issue: &str, branches: &[CategoryCauses]) -> Self {
        let mut ids = IdAllocator::default();
        let mut graph = FishboneGraph::default();

        let issue_id = ids.claim(ISSUE_NODE_ID);
        graph.push_node(issue_id.clone(), issue, NodeKind::Issue);

        for branch in branches {
            let category_id = ids.claim(&format!("cat_{}", branch.category));
            graph.push_node(category_id.clone(), &branch.category, NodeKind::Category);
            graph.push_edge(&category_id, &issue_id);

            for cause in &branch.causes {
                let cause_id = ids.claim(&format!("{}_{}", branch.category, cause));
                graph.push_node(cause_id.clone(), cause, NodeKind::Cause);
                graph.push_edge(&cause_id, &category_id);
            }
        }

        graph
    }

    fn push_node(&mut self, id: String, label: &str, kind: NodeKind) {
        self.nodes.push(FishboneNode {
            id,
            label: label.to_string(),
            kind,
        });
    }

    fn push_edge(&mut self, from: &str, to: &str) {
        self.edges.push(FishboneEdge {
            from: from.to_string(),
            to: to.to_string(),
        });
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn node(&self, id: &str) -> Option<&FishboneNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn issue(&self) -> Option<&FishboneNode> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Issue)
    }

    pub fn categories(&self) -> impl Iterator<Item = &FishboneNode> {
        self.nodes.iter().filter(|n| n.kind == NodeKind::Category)
    }

    /// Nodes with an edge into `id`.
    pub fn children_of(&self, id: &str) -> Vec<&FishboneNode> {
        self.edges
            .iter()
            .filter(|e| e.to == id)
            .filter_map(|e| self.node(&e.from))
            .collect()
    }

    pub fn has_edge(&self, from: &str, to: &str) -> bool {
        self.edges.iter().any(|e| e.from == from && e.to == to)
    }

    /// True when following edges from any node never revisits a node.
    pub fn is_acyclic(&self) -> bool {
        let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &self.edges {
            parents.entry(edge.from.as_str()).or_default().push(edge.to.as_str());
        }

        // 0 = unvisited, 1 = on stack, 2 = done
        let mut state: HashMap<&str, u8> = HashMap::new();
        for node in &self.nodes {
            if state.get(node.id.as_str()).copied().unwrap_or(0) != 0 {
                continue;
            }
            let mut stack: Vec<(&str, usize)> = vec![(node.id.as_str(), 0)];
            state.insert(node.id.as_str(), 1);
            while let Some((current, next)) = stack.pop() {
                let outgoing = parents.get(current).map(|v| v.as_slice()).unwrap_or(&[]);
                if next < outgoing.len() {
                    stack.push((current, next + 1));
                    let target = outgoing[next];
                    match state.get(target).copied().unwrap_or(0) {
                        1 => return false,
                        0 => {
                            state.insert(target, 1);
                            stack.push((target, 0));
                        }
                        _ => {}
                    }
                } else {
                    state.insert(current, 2);
                }
            }
        }
        true
    }
}

#[derive(Default)]
struct IdAllocator {
    taken: HashSet<String>,
}

impl IdAllocator {
    fn claim(&mut self, base: &str) -> String {
        if self.taken.insert(base.to_string()) {
            return base.to_string();
        }
        let mut n = 2;
        loop {
            let candidate = format!("{}#{}", base, n);
            if self.taken.insert(candidate.clone()) {
                return candidate;
            }
            n += 1;
        }
    }
}
