use std::collections::HashMap;
use std::path::Path;

use osmpbf::{Element, ElementReader};
use petgraph::graph::{NodeIndex, UnGraph};
use tracing::info;

use crate::dataset::RoadNode;

#[derive(Debug, Clone, Copy)]
pub struct OsmNode {
    pub id: i64,
    pub lat: f64,
    pub lon: f64,
}

/// Drivable street network, one undirected edge per connected node pair.
pub struct RoadGraph {
    pub graph: UnGraph<OsmNode, ()>,
}

fn is_drivable(highway: &str) -> bool {
    let base = highway.strip_suffix("_link").unwrap_or(highway);
    matches!(
        base,
        "motorway"
            | "trunk"
            | "primary"
            | "secondary"
            | "tertiary"
            | "unclassified"
            | "residential"
            | "living_street"
            | "service"
    )
}

impl RoadGraph {
    pub fn from_pbf(path: &Path) -> anyhow::Result<Self> {
        info!(path = %path.display(), "parsing OSM PBF");

        let mut coords = HashMap::new();

        // PASS 1: Nodes
        let reader = ElementReader::from_path(path)?;
        reader.for_each(|element| match element {
            Element::Node(node) => {
                coords.insert(node.id(), (node.lat(), node.lon()));
            }
            Element::DenseNode(node) => {
                coords.insert(node.id(), (node.lat(), node.lon()));
            }
            _ => {}
        })?;

        info!(nodes = coords.len(), "loaded nodes, building streets");

        // PASS 2: Ways
        let mut ways = Vec::new();
        let reader_pass2 = ElementReader::from_path(path)?;
        reader_pass2.for_each(|element| {
            if let Element::Way(way) = element {
                let drivable = way
                    .tags()
                    .any(|(key, value)| key == "highway" && is_drivable(value));
                if drivable {
                    ways.push(way.refs().collect::<Vec<i64>>());
                }
            }
        })?;

        let graph = Self::from_ways(&coords, &ways);
        info!(
            nodes = graph.graph.node_count(),
            edges = graph.graph.edge_count(),
            "road graph built"
        );
        Ok(graph)
    }

    /// Builds the graph from way node lists. Refs without a known coordinate are skipped.
    pub fn from_ways(coords: &HashMap<i64, (f64, f64)>, ways: &[Vec<i64>]) -> Self {
        let mut graph = UnGraph::new_undirected();
        let mut osm_id_map: HashMap<i64, NodeIndex> = HashMap::new();

        for refs in ways {
            for window in refs.windows(2) {
                let (id_a, id_b) = (window[0], window[1]);
                if id_a == id_b {
                    continue;
                }
                if let (Some(&(lat_a, lon_a)), Some(&(lat_b, lon_b))) =
                    (coords.get(&id_a), coords.get(&id_b))
                {
                    let idx_a = *osm_id_map.entry(id_a).or_insert_with(|| {
                        graph.add_node(OsmNode {
                            id: id_a,
                            lat: lat_a,
                            lon: lon_a,
                        })
                    });
                    let idx_b = *osm_id_map.entry(id_b).or_insert_with(|| {
                        graph.add_node(OsmNode {
                            id: id_b,
                            lat: lat_b,
                            lon: lon_b,
                        })
                    });
                    graph.update_edge(idx_a, idx_b, ());
                }
            }
        }

        Self { graph }
    }

    /// Street count of a node: distinct neighbours.
    pub fn junction_complexity(&self, idx: NodeIndex) -> u32 {
        self.graph.neighbors(idx).count() as u32
    }

    /// Junctions and dead ends; mid-street shape points (degree 2) are dropped.
    pub fn road_nodes(&self) -> Vec<RoadNode> {
        self.graph
            .node_indices()
            .filter_map(|idx| {
                let complexity = self.junction_complexity(idx);
                if complexity == 2 {
                    return None;
                }
                let node = self.graph[idx];
                Some(RoadNode {
                    node_id: node.id,
                    lat: node.lat,
                    lon: node.lon,
                    junction_complexity: complexity,
                })
            })
            .collect()
    }
}
