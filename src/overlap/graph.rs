//! Directed coverage graph of one dataset.

use super::handler::FileNode;
use crate::error::Result;
use crate::time::CfDate;
use petgraph::algo::astar;
use petgraph::graph::{DiGraph, NodeIndex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Vertex {
    Start,
    End,
    File(usize),
}

/// A file whose start lies before the end of the previous file on the path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialOverlap {
    /// Index of the overlapping file in the dataset
    pub node: usize,
    pub end_overlap: CfDate,
    pub cutting_date: CfDate,
    pub cutting_timestep: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathEntry {
    File(usize),
    Break,
}

/// Result of walking a dataset graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// A chain of files covers the whole period.
    Continuous {
        path: Vec<usize>,
        partial: Vec<PartialOverlap>,
        full: Vec<usize>,
    },
    /// No chain exists; files in name order with gaps marked.
    Broken { entries: Vec<PathEntry> },
}

impl Evaluation {
    pub const fn is_broken(&self) -> bool {
        matches!(self, Self::Broken { .. })
    }

    pub fn has_overlaps(&self) -> bool {
        match self {
            Self::Continuous { partial, full, .. } => !partial.is_empty() || !full.is_empty(),
            Self::Broken { .. } => false,
        }
    }
}

/// Files of one dataset, sorted by filename.
#[derive(Debug, Clone)]
pub struct Dataset {
    pub id: String,
    pub nodes: Vec<FileNode>,
    graph: DiGraph<Vertex, ()>,
    start: NodeIndex,
    end: NodeIndex,
}

impl Dataset {
    /// Build the graph. `first`/`last` (as `YYYYMMDDHHMMSS` integers) widen the
    /// `START`/`END` links to every file starting before or ending after them.
    pub fn new(id: String, mut nodes: Vec<FileNode>, first: Option<i64>, last: Option<i64>) -> Self {
        nodes.sort_by(|a, b| a.filename.cmp(&b.filename));
        let mut graph = DiGraph::with_capacity(nodes.len() + 2, nodes.len());
        let start = graph.add_node(Vertex::Start);
        let end = graph.add_node(Vertex::End);
        let files: Vec<NodeIndex> = (0..nodes.len())
            .map(|i| graph.add_node(Vertex::File(i)))
            .collect();

        for (i, node) in nodes.iter().enumerate() {
            for (j, other) in nodes.iter().enumerate() {
                if i != j && node.next.as_int() - other.start.as_int() >= 0 {
                    graph.add_edge(files[i], files[j], ());
                    tracing::debug!(dataset = %id, "Edge {} --> {}", node.filename, other.filename);
                }
            }
        }

        let earliest = nodes.iter().map(|n| n.start.as_int()).min();
        let latest = nodes.iter().map(|n| n.end.as_int()).max();
        for (i, node) in nodes.iter().enumerate() {
            let starts = match first {
                Some(first) => node.start.as_int() <= first,
                None => Some(node.start.as_int()) == earliest,
            };
            if starts {
                graph.add_edge(start, files[i], ());
            }
            let ends = match last {
                Some(last) => node.end.as_int() >= last,
                None => Some(node.end.as_int()) == latest,
            };
            if ends {
                graph.add_edge(files[i], end, ());
            }
        }
        Self { id, nodes, graph, start, end }
    }

    fn file_index(&self, vertex: NodeIndex) -> Option<usize> {
        match self.graph[vertex] {
            Vertex::File(i) => Some(i),
            Vertex::Start | Vertex::End => None,
        }
    }

    /// Fewest files linking `START` to `END`.
    pub fn shortest_path(&self) -> Option<Vec<usize>> {
        let (_, path) = astar(&self.graph, self.start, |v| v == self.end, |_| 1, |_| 0)?;
        Some(path.into_iter().filter_map(|v| self.file_index(v)).collect())
    }

    fn has_edge(&self, from: usize, to: usize) -> bool {
        // File vertices follow START and END.
        self.graph
            .find_edge(NodeIndex::new(from + 2), NodeIndex::new(to + 2))
            .is_some()
    }

    pub fn evaluate(&self) -> Result<Evaluation> {
        let Some(path) = self.shortest_path() else {
            return Ok(Evaluation::Broken {
                entries: self.broken_entries(),
            });
        };

        let mut partial = Vec::new();
        for pair in path.windows(2) {
            let (current, next) = (&self.nodes[pair[0]], &self.nodes[pair[1]]);
            if current.next.as_int() - next.start.as_int() > 0 {
                tracing::debug!(
                    dataset = %self.id,
                    "Partial overlap between {} and {}",
                    current.filename,
                    next.filename
                );
                partial.push(PartialOverlap {
                    node: pair[1],
                    end_overlap: current.end,
                    cutting_date: current.next,
                    cutting_timestep: next.cutting_timestep(&current.last_step)?,
                });
            }
        }
        let full = (0..self.nodes.len()).filter(|i| !path.contains(i)).collect();
        Ok(Evaluation::Continuous { path, partial, full })
    }

    /// Every file in name order, with a break after any file that has later files
    /// but no edge to one of them.
    fn broken_entries(&self) -> Vec<PathEntry> {
        let mut entries = Vec::with_capacity(self.nodes.len() * 2);
        for (i, node) in self.nodes.iter().enumerate() {
            entries.push(PathEntry::File(i));
            let forward: Vec<usize> = self
                .nodes
                .iter()
                .enumerate()
                .filter(|&(j, other)| j != i && node.next.as_int() - other.start.as_int() <= 0)
                .map(|(j, _)| j)
                .collect();
            if !forward.is_empty() && !forward.iter().any(|&j| self.has_edge(i, j)) {
                entries.push(PathEntry::Break);
            }
        }
        entries
    }
}
