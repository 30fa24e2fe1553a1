//! Flat tables: raw road nodes and the labelled training table.

use std::fs;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::blackspots::BlackspotIndex;
use crate::distance::Coordinate;
use crate::error::ConfigError;
use crate::labeler::{self, RiskLabel};

pub const DEFAULT_RAW_NODES_PATH: &str = "data/raw/bengaluru_nodes.csv";
pub const DEFAULT_TRAINING_TABLE_PATH: &str = "data/processed/training_data.csv";

/// Road network node as extracted from map data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoadNode {
    pub node_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub junction_complexity: u32,
}

/// One row of the training table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRecord {
    pub node_id: i64,
    pub lat: f64,
    pub lon: f64,
    pub junction_complexity: u32,
    #[serde(rename = "dist_to_blackspot_km")]
    pub distance_km: f64,
    pub nearest_blackspot_name: String,
    pub risk_label: RiskLabel,
}

impl TrainingRecord {
    pub fn from_node(node: &RoadNode, index: &BlackspotIndex) -> Self {
        let nearest = index.nearest(Coordinate::new(node.lat, node.lon));
        Self {
            node_id: node.node_id,
            lat: node.lat,
            lon: node.lon,
            junction_complexity: node.junction_complexity,
            distance_km: nearest.distance_km,
            nearest_blackspot_name: nearest.name.to_string(),
            risk_label: labeler::label(nearest.distance_km, node.junction_complexity),
        }
    }

    pub fn is_high_risk(&self) -> bool {
        self.risk_label == RiskLabel::High
    }
}

/// Labels every node, keeping input order.
pub fn build_training_table(nodes: &[RoadNode], index: &BlackspotIndex) -> Vec<TrainingRecord> {
    nodes
        .iter()
        .map(|n| TrainingRecord::from_node(n, index))
        .collect()
}

pub fn read_road_nodes(path: &Path) -> Result<Vec<RoadNode>, ConfigError> {
    read_table(path)
}

pub fn write_road_nodes(path: &Path, nodes: &[RoadNode]) -> Result<(), ConfigError> {
    write_table(path, nodes)
}

pub fn read_training_table(path: &Path) -> Result<Vec<TrainingRecord>, ConfigError> {
    read_table(path)
}

pub fn write_training_table(path: &Path, records: &[TrainingRecord]) -> Result<(), ConfigError> {
    write_table(path, records)
}

fn read_table<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, ConfigError> {
    let table_err = |source| ConfigError::Table {
        path: path.to_path_buf(),
        source,
    };
    let mut rdr = csv::Reader::from_path(path).map_err(table_err)?;
    rdr.deserialize()
        .collect::<Result<Vec<T>, _>>()
        .map_err(table_err)
}

fn write_table<T: Serialize>(path: &Path, rows: &[T]) -> Result<(), ConfigError> {
    let table_err = |source| ConfigError::Table {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(|e| table_err(e.into()))?;
    }
    let mut wtr = csv::Writer::from_path(path).map_err(table_err)?;
    for row in rows {
        wtr.serialize(row).map_err(table_err)?;
    }
    wtr.flush().map_err(|e| table_err(e.into()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(node_id: i64, lat: f64, lon: f64, junction_complexity: u32) -> RoadNode {
        RoadNode {
            node_id,
            lat,
            lon,
            junction_complexity,
        }
    }

    #[test]
    fn labels_nodes_in_order() {
        let index = BlackspotIndex::bengaluru();
        let nodes = vec![
            node(1, 12.9177, 77.6238, 3), // on Silk Board
            node(2, 12.9763, 77.5929, 3), // Cubbon Park
            node(3, 12.9763, 77.5929, 6), // same spot, six-way junction
        ];

        let table = build_training_table(&nodes, &index);

        let ids: Vec<_> = table.iter().map(|r| r.node_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(table[0].nearest_blackspot_name, "Silk Board Junction");
        assert_eq!(table[0].distance_km, 0.0);
        assert_eq!(
            table.iter().map(|r| r.risk_label.as_u8()).collect::<Vec<_>>(),
            vec![1, 0, 1]
        );
    }

    #[test]
    fn training_table_uses_published_column_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("processed").join("training_data.csv");
        let index = BlackspotIndex::bengaluru();
        let table = build_training_table(&[node(7, 12.9177, 77.6238, 4)], &index);

        write_training_table(&path, &table).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(
            text.lines().next().unwrap(),
            "node_id,lat,lon,junction_complexity,dist_to_blackspot_km,nearest_blackspot_name,risk_label"
        );
        assert_eq!(read_training_table(&path).unwrap(), table);
    }

    #[test]
    fn malformed_table_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodes.csv");
        fs::write(&path, "node_id,lat,lon,junction_complexity\n1,north,77.6,3\n").unwrap();

        let err = read_road_nodes(&path).unwrap_err();
        assert!(err.to_string().contains("nodes.csv"), "{err}");
    }

    #[test]
    fn rejects_labels_outside_zero_and_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_data.csv");
        fs::write(
            &path,
            "node_id,lat,lon,junction_complexity,dist_to_blackspot_km,nearest_blackspot_name,risk_label\n\
             1,12.9177,77.6238,3,0.0,Silk Board Junction,2\n",
        )
        .unwrap();

        let err = read_training_table(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Table { .. }), "{err}");
    }
}
