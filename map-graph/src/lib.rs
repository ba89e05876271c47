use std::path::Path;

use anyhow::{bail, Context, Result};
use geo::{Coord, Line};

/// A road network as produced by map inference: nodes with planar coordinates, and straight
/// edges between pairs of them.
pub struct Graph {
    pub nodes: Vec<Coord>,
    pub edges: Vec<Edge>,
}

pub struct Edge {
    pub id: EdgeID,
    pub src: NodeID,
    pub dst: NodeID,
    /// Copied from the two endpoints when the edge is read
    pub segment: Line,
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct EdgeID(pub u32);
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct NodeID(pub u32);

impl Graph {
    /// Reads a `.graph` file. The format is one `x y` line per node, a blank line, then one
    /// `src dst` line per edge, where `src` and `dst` are 0-based indices into the node lines.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Graph> {
        let path = path.as_ref();
        let input = std::fs::read_to_string(path)
            .with_context(|| format!("read {}", path.display()))?;
        Graph::parse(&input).with_context(|| format!("parse {}", path.display()))
    }

    pub fn parse(input: &str) -> Result<Graph> {
        let mut graph = Graph {
            nodes: Vec::new(),
            edges: Vec::new(),
        };

        // The first blank line ends the node section, and a blank line after some edges ends
        // the edge section. Anything past that is ignored.
        let mut in_edges = false;
        for (idx, line) in input.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                if in_edges && !graph.edges.is_empty() {
                    break;
                }
                in_edges = true;
                continue;
            }

            let result = if in_edges {
                graph.parse_edge(line)
            } else {
                parse_node(line).map(|pt| graph.nodes.push(pt))
            };
            result.with_context(|| format!("line {}", idx + 1))?;
        }

        Ok(graph)
    }

    pub fn node(&self, id: NodeID) -> Coord {
        self.nodes[id.0 as usize]
    }

    pub fn edge(&self, id: EdgeID) -> &Edge {
        &self.edges[id.0 as usize]
    }

    fn parse_edge(&mut self, line: &str) -> Result<()> {
        let (src, dst) = split_pair(line)?;
        let src = self.parse_node_ref(src)?;
        let dst = self.parse_node_ref(dst)?;
        let segment = Line::new(self.node(src), self.node(dst));
        self.edges.push(Edge {
            id: EdgeID(self.edges.len() as u32),
            src,
            dst,
            segment,
        });
        Ok(())
    }

    fn parse_node_ref(&self, field: &str) -> Result<NodeID> {
        let idx: u32 = field
            .parse()
            .with_context(|| format!("bad node index {field:?}"))?;
        if idx as usize >= self.nodes.len() {
            bail!(
                "edge references node {idx}, but there are only {} nodes",
                self.nodes.len()
            );
        }
        Ok(NodeID(idx))
    }
}

fn parse_node(line: &str) -> Result<Coord> {
    let (x, y) = split_pair(line)?;
    Ok(Coord {
        x: x.parse().with_context(|| format!("bad x coordinate {x:?}"))?,
        y: y.parse().with_context(|| format!("bad y coordinate {y:?}"))?,
    })
}

fn split_pair(line: &str) -> Result<(&str, &str)> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    match fields.as_slice() {
        [a, b] => Ok((*a, *b)),
        _ => bail!("expected 2 fields, found {} in {line:?}", fields.len()),
    }
}
