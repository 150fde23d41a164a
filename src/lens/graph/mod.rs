//! ASN adjacency graph lens
//!
//! Builds an undirected ASN-to-ASN adjacency graph from RIPEstat
//! neighbour data, lays it out with a force-directed algorithm, and
//! renders it to SVG (with a Graphviz DOT export for external tooling).

use anyhow::Result;
use petgraph::dot::Dot;
use petgraph::graph::{NodeIndex, UnGraph};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::datasets::ripestat;
use crate::holders::{AsnNeighbor, HolderStore, NeighborKind};

// =============================================================================
// Types
// =============================================================================

/// Graph node: one autonomous system.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnNode {
    pub asn: u32,
    /// True when the ASN came from the analyzed input set rather than
    /// being discovered as a neighbour.
    pub seed: bool,
}

impl fmt::Display for AsnNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AS{}", self.asn)
    }
}

/// Graph edge: one BGP adjacency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AsnEdge {
    pub kind: NeighborKind,
    pub power: u32,
}

impl fmt::Display for AsnEdge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// Undirected ASN adjacency graph with an ASN-to-node index.
#[derive(Debug)]
pub struct AsnGraph {
    graph: UnGraph<AsnNode, AsnEdge>,
    index: HashMap<u32, NodeIndex>,
}

impl Default for AsnGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl AsnGraph {
    pub fn new() -> Self {
        Self {
            graph: UnGraph::new_undirected(),
            index: HashMap::new(),
        }
    }

    pub fn graph(&self) -> &UnGraph<AsnNode, AsnEdge> {
        &self.graph
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Add or look up the node for an ASN; a later seed sighting upgrades
    /// a node first discovered as a neighbour.
    pub fn ensure_node(&mut self, asn: u32, seed: bool) -> NodeIndex {
        match self.index.get(&asn) {
            Some(&index) => {
                if seed {
                    self.graph[index].seed = true;
                }
                index
            }
            None => {
                let index = self.graph.add_node(AsnNode { asn, seed });
                self.index.insert(asn, index);
                index
            }
        }
    }

    /// Add one adjacency; self-loops and duplicate pairs are dropped
    /// (first relation wins).
    pub fn add_adjacency(&mut self, asn: u32, neighbor: &AsnNeighbor) {
        if asn == neighbor.asn {
            return;
        }
        let a = self.ensure_node(asn, false);
        let b = self.ensure_node(neighbor.asn, false);
        if self.graph.find_edge(a, b).is_none() {
            self.graph.add_edge(
                a,
                b,
                AsnEdge {
                    kind: neighbor.kind,
                    power: neighbor.power,
                },
            );
        }
    }
}

// =============================================================================
// Args
// =============================================================================

/// Arguments for graph construction and layout.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphArgs {
    /// Keep only the strongest N neighbours per seed ASN
    pub max_neighbors_per_asn: Option<usize>,

    /// Force-directed layout iterations
    pub layout_iterations: usize,

    /// Seed for the layout's initial placement; fixed seed gives a
    /// reproducible image
    pub layout_seed: Option<u64>,
}

impl Default for GraphArgs {
    fn default() -> Self {
        Self {
            max_neighbors_per_asn: None,
            layout_iterations: 50,
            layout_seed: None,
        }
    }
}

impl GraphArgs {
    pub fn with_max_neighbors(mut self, max: Option<usize>) -> Self {
        self.max_neighbors_per_asn = max;
        self
    }

    pub fn with_layout_iterations(mut self, iterations: usize) -> Self {
        self.layout_iterations = iterations;
        self
    }

    pub fn with_layout_seed(mut self, seed: Option<u64>) -> Self {
        self.layout_seed = seed;
        self
    }
}

// =============================================================================
// Lens
// =============================================================================

const SVG_WIDTH: f32 = 1200.0;
const SVG_HEIGHT: f32 = 800.0;
const SVG_MARGIN: f32 = 60.0;

/// ASN adjacency graph lens.
#[derive(Debug, Default)]
pub struct GraphLens {}

impl GraphLens {
    pub fn new() -> Self {
        Self {}
    }

    /// Build the adjacency graph for a set of seed ASNs.
    ///
    /// Neighbour lists come from the local cache when fresh, otherwise
    /// from RIPEstat (with a sleep between remote calls). A failed fetch
    /// logs a warning and skips that ASN.
    pub fn build(
        &self,
        asns: &[u32],
        store: &HolderStore,
        args: &GraphArgs,
        sleep_ms: u64,
    ) -> AsnGraph {
        let mut graph = AsnGraph::new();
        let mut remote_calls: usize = 0;

        for &asn in asns {
            graph.ensure_node(asn, true);

            let cached = match store.get_neighbors(asn) {
                Ok(cached) => cached,
                Err(e) => {
                    warn!("neighbour cache read failed for AS{}: {}", asn, e);
                    None
                }
            };

            let mut neighbors = match cached {
                Some(neighbors) => neighbors,
                None => {
                    if remote_calls > 0 {
                        thread::sleep(Duration::from_millis(sleep_ms / 2));
                    }
                    remote_calls += 1;
                    info!("fetching BGP neighbours for AS{}", asn);
                    match ripestat::fetch_neighbors(asn) {
                        Ok(neighbors) => {
                            if let Err(e) = store.put_neighbors(asn, &neighbors) {
                                warn!("neighbour cache write failed for AS{}: {}", asn, e);
                            }
                            neighbors
                        }
                        Err(e) => {
                            warn!("neighbour fetch failed for AS{}: {}", asn, e);
                            continue;
                        }
                    }
                }
            };

            neighbors.sort_by(|a, b| b.power.cmp(&a.power).then(a.asn.cmp(&b.asn)));
            if let Some(max) = args.max_neighbors_per_asn {
                neighbors.truncate(max);
            }

            for neighbor in &neighbors {
                graph.add_adjacency(asn, neighbor);
            }
        }

        graph
    }

    /// Fruchterman-Reingold force-directed layout.
    ///
    /// Returns one position per node, indexed by node index, inside the
    /// unit square. Deterministic for a fixed `layout_seed`.
    pub fn layout(&self, graph: &AsnGraph, args: &GraphArgs) -> Vec<(f32, f32)> {
        let n = graph.node_count();
        if n == 0 {
            return vec![];
        }

        let mut rng = match args.layout_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut positions: Vec<(f32, f32)> = (0..n)
            .map(|_| (rng.gen_range(0.0..1.0), rng.gen_range(0.0..1.0)))
            .collect();
        if n == 1 {
            return vec![(0.5, 0.5)];
        }

        let k = (1.0 / n as f32).sqrt();
        let mut temperature = 0.1f32;
        let cooling = temperature / (args.layout_iterations as f32 + 1.0);

        for _ in 0..args.layout_iterations {
            let mut displacement = vec![(0.0f32, 0.0f32); n];

            // repulsion between every node pair
            for i in 0..n {
                for j in (i + 1)..n {
                    let (dx, dy) = delta(positions[i], positions[j]);
                    let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
                    let force = k * k / dist;
                    displacement[i].0 += dx / dist * force;
                    displacement[i].1 += dy / dist * force;
                    displacement[j].0 -= dx / dist * force;
                    displacement[j].1 -= dy / dist * force;
                }
            }

            // attraction along edges
            for edge in graph.graph().edge_indices() {
                if let Some((a, b)) = graph.graph().edge_endpoints(edge) {
                    let (i, j) = (a.index(), b.index());
                    let (dx, dy) = delta(positions[i], positions[j]);
                    let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
                    let force = dist * dist / k;
                    displacement[i].0 -= dx / dist * force;
                    displacement[i].1 -= dy / dist * force;
                    displacement[j].0 += dx / dist * force;
                    displacement[j].1 += dy / dist * force;
                }
            }

            for i in 0..n {
                let (dx, dy) = displacement[i];
                let dist = (dx * dx + dy * dy).sqrt().max(1e-6);
                let limited = dist.min(temperature);
                positions[i].0 = (positions[i].0 + dx / dist * limited).clamp(0.0, 1.0);
                positions[i].1 = (positions[i].1 + dy / dist * limited).clamp(0.0, 1.0);
            }

            temperature -= cooling;
        }

        positions
    }

    /// Render the graph to an SVG image.
    pub fn render_svg(
        &self,
        graph: &AsnGraph,
        positions: &[(f32, f32)],
        path: impl AsRef<Path>,
    ) -> Result<()> {
        let mut out = std::fs::File::create(path.as_ref())?;

        writeln!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = SVG_WIDTH,
            h = SVG_HEIGHT
        )?;
        writeln!(
            out,
            r#"  <text x="{}" y="30" text-anchor="middle" font-family="sans-serif" font-size="18">BGP ASN Connections</text>"#,
            SVG_WIDTH / 2.0
        )?;

        let scale = |(x, y): (f32, f32)| {
            (
                SVG_MARGIN + x * (SVG_WIDTH - 2.0 * SVG_MARGIN),
                SVG_MARGIN + y * (SVG_HEIGHT - 2.0 * SVG_MARGIN),
            )
        };

        for edge in graph.graph().edge_indices() {
            if let Some((a, b)) = graph.graph().edge_endpoints(edge) {
                let (x1, y1) = scale(positions[a.index()]);
                let (x2, y2) = scale(positions[b.index()]);
                writeln!(
                    out,
                    r##"  <line x1="{x1:.1}" y1="{y1:.1}" x2="{x2:.1}" y2="{y2:.1}" stroke="#999999" stroke-width="0.5" stroke-opacity="0.5"/>"##
                )?;
            }
        }

        for index in graph.graph().node_indices() {
            let node = &graph.graph()[index];
            let (x, y) = scale(positions[index.index()]);
            let fill = if node.seed { "steelblue" } else { "lightblue" };
            writeln!(
                out,
                r#"  <circle cx="{x:.1}" cy="{y:.1}" r="8" fill="{fill}" fill-opacity="0.7"/>"#
            )?;
            writeln!(
                out,
                r#"  <text x="{x:.1}" y="{y:.1}" dy="-10" text-anchor="middle" font-family="sans-serif" font-size="8">AS{}</text>"#,
                node.asn
            )?;
        }

        writeln!(out, "</svg>")?;
        info!(
            "rendered {} nodes and {} edges to {}",
            graph.node_count(),
            graph.edge_count(),
            path.as_ref().display()
        );
        Ok(())
    }

    /// Export the graph in Graphviz DOT format.
    pub fn to_dot(&self, graph: &AsnGraph) -> String {
        format!("{}", Dot::new(graph.graph()))
    }
}

fn delta(a: (f32, f32), b: (f32, f32)) -> (f32, f32) {
    (a.0 - b.0, a.1 - b.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded_store() -> HolderStore {
        let store = HolderStore::new(&None, 3600, 3600).unwrap();
        store
            .put_neighbors(
                3356,
                &[
                    AsnNeighbor {
                        asn: 1299,
                        kind: NeighborKind::Left,
                        power: 12,
                    },
                    AsnNeighbor {
                        asn: 174,
                        kind: NeighborKind::Right,
                        power: 3,
                    },
                    // self-loops occasionally show up in the API output
                    AsnNeighbor {
                        asn: 3356,
                        kind: NeighborKind::Uncertain,
                        power: 1,
                    },
                ],
            )
            .unwrap();
        store
            .put_neighbors(
                1299,
                &[AsnNeighbor {
                    asn: 3356,
                    kind: NeighborKind::Right,
                    power: 12,
                }],
            )
            .unwrap();
        store
    }

    #[test]
    fn test_build_from_cache() {
        let store = seeded_store();
        let lens = GraphLens::new();
        let graph = lens.build(&[3356, 1299], &store, &GraphArgs::default(), 0);

        // 3356, 1299, 174; the self-loop is dropped and the 3356-1299
        // pair is recorded once
        assert_eq!(graph.node_count(), 3);
        assert_eq!(graph.edge_count(), 2);
    }

    #[test]
    fn test_build_marks_seeds() {
        let store = seeded_store();
        let lens = GraphLens::new();
        let graph = lens.build(&[3356], &store, &GraphArgs::default(), 0);

        let seeds: Vec<u32> = graph
            .graph()
            .node_indices()
            .filter(|&i| graph.graph()[i].seed)
            .map(|i| graph.graph()[i].asn)
            .collect();
        assert_eq!(seeds, vec![3356]);
    }

    #[test]
    fn test_build_max_neighbors() {
        let store = seeded_store();
        let lens = GraphLens::new();
        let args = GraphArgs::default().with_max_neighbors(Some(1));
        let graph = lens.build(&[3356], &store, &args, 0);

        // only the strongest neighbour (1299, power 12) survives the cap
        assert_eq!(graph.node_count(), 2);
        assert_eq!(graph.edge_count(), 1);
    }

    #[test]
    fn test_layout_deterministic() {
        let store = seeded_store();
        let lens = GraphLens::new();
        let graph = lens.build(&[3356, 1299], &store, &GraphArgs::default(), 0);

        let args = GraphArgs::default().with_layout_seed(Some(42));
        let first = lens.layout(&graph, &args);
        let second = lens.layout(&graph, &args);
        assert_eq!(first, second);
        assert_eq!(first.len(), graph.node_count());
        for (x, y) in first {
            assert!((0.0..=1.0).contains(&x));
            assert!((0.0..=1.0).contains(&y));
        }
    }

    #[test]
    fn test_layout_empty_graph() {
        let lens = GraphLens::new();
        let graph = AsnGraph::new();
        assert!(lens.layout(&graph, &GraphArgs::default()).is_empty());
    }

    #[test]
    fn test_render_svg() {
        let store = seeded_store();
        let lens = GraphLens::new();
        let graph = lens.build(&[3356], &store, &GraphArgs::default(), 0);
        let positions = lens.layout(&graph, &GraphArgs::default().with_layout_seed(Some(1)));

        let file = tempfile::NamedTempFile::new().unwrap();
        lens.render_svg(&graph, &positions, file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.starts_with("<svg"));
        assert!(content.contains("AS3356"));
        assert!(content.contains("</svg>"));
    }

    #[test]
    fn test_render_svg_empty_graph() {
        let lens = GraphLens::new();
        let graph = AsnGraph::new();
        let file = tempfile::NamedTempFile::new().unwrap();
        lens.render_svg(&graph, &[], file.path()).unwrap();

        let content = std::fs::read_to_string(file.path()).unwrap();
        assert!(content.contains("</svg>"));
    }

    #[test]
    fn test_to_dot() {
        let store = seeded_store();
        let lens = GraphLens::new();
        let graph = lens.build(&[3356], &store, &GraphArgs::default(), 0);
        let dot = lens.to_dot(&graph);
        assert!(dot.contains("AS3356"));
        assert!(dot.contains("AS1299"));
    }
}
