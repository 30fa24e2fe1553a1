//! High-risk points for map rendering.

use std::collections::HashMap;
use std::path::Path;

use h3o::{CellIndex, LatLng, Resolution};
use serde::Serialize;
use tracing::{info, warn};

use crate::dataset::{TrainingRecord, read_training_table};
use crate::error::ConfigError;

pub const DEFAULT_INTENSITY: f64 = 1.0;

/// Serialized as `[lat, lon, intensity]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(into = "[f64; 3]")]
pub struct HeatmapPoint {
    pub lat: f64,
    pub lon: f64,
    pub intensity: f64,
}

impl From<HeatmapPoint> for [f64; 3] {
    fn from(p: HeatmapPoint) -> Self {
        [p.lat, p.lon, p.intensity]
    }
}

/// High-risk rows only, in table order, each at [`DEFAULT_INTENSITY`].
pub fn aggregate(records: &[TrainingRecord]) -> Vec<HeatmapPoint> {
    records
        .iter()
        .filter(|r| r.is_high_risk())
        .map(|r| HeatmapPoint {
            lat: r.lat,
            lon: r.lon,
            intensity: DEFAULT_INTENSITY,
        })
        .collect()
}

/// Reads the training table at `path`. A missing table means the dataset
/// has not been built yet and yields an empty heatmap.
pub fn load_heatmap(path: &Path) -> Result<Vec<HeatmapPoint>, ConfigError> {
    if !path.exists() {
        warn!(path = %path.display(), "training table not found, heatmap will be empty");
        return Ok(Vec::new());
    }
    let points = aggregate(&read_training_table(path)?);
    info!(count = points.len(), "loaded high-risk points for heatmap");
    Ok(points)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HexBin {
    pub cell: String,
    pub lat: f64,
    pub lon: f64,
    pub count: usize,
    /// `count` relative to the busiest cell.
    pub intensity: f64,
}

/// Bins points into H3 cells. Cells keep the order in which they first appear.
pub fn aggregate_hex(points: &[HeatmapPoint], resolution: Resolution) -> Vec<HexBin> {
    let mut order: Vec<CellIndex> = Vec::new();
    let mut counts: HashMap<CellIndex, usize> = HashMap::new();

    for p in points {
        let Ok(ll) = LatLng::new(p.lat, p.lon) else {
            warn!(lat = p.lat, lon = p.lon, "skipping invalid heatmap point");
            continue;
        };
        let cell = ll.to_cell(resolution);
        let count = counts.entry(cell).or_insert_with(|| {
            order.push(cell);
            0
        });
        *count += 1;
    }

    let max = counts.values().copied().max().unwrap_or(1) as f64;
    order
        .into_iter()
        .map(|cell| {
            let center = LatLng::from(cell);
            let count = counts[&cell];
            HexBin {
                cell: cell.to_string(),
                lat: center.lat(),
                lon: center.lng(),
                count,
                intensity: count as f64 / max,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackspots::BlackspotIndex;
    use crate::dataset::{RoadNode, build_training_table, write_training_table};

    fn table() -> Vec<TrainingRecord> {
        let nodes = [
            (1, 12.9177, 77.6238, 3), // Silk Board
            (2, 12.9763, 77.5929, 3), // Cubbon Park
            (3, 12.9177, 77.6238, 2), // second node on Silk Board
            (4, 12.9763, 77.5929, 6), // six-way junction
        ]
        .map(|(node_id, lat, lon, junction_complexity)| RoadNode {
            node_id,
            lat,
            lon,
            junction_complexity,
        });
        build_training_table(&nodes, &BlackspotIndex::bengaluru())
    }

    #[test]
    fn keeps_high_risk_rows_in_order() {
        let points = aggregate(&table());
        let coords: Vec<_> = points.iter().map(|p| (p.lat, p.lon)).collect();
        assert_eq!(
            coords,
            vec![(12.9177, 77.6238), (12.9177, 77.6238), (12.9763, 77.5929)]
        );
        assert!(points.iter().all(|p| p.intensity == DEFAULT_INTENSITY));
    }

    #[test]
    fn empty_input_gives_empty_heatmap() {
        assert!(aggregate(&[]).is_empty());
    }

    #[test]
    fn missing_table_gives_empty_heatmap() {
        let dir = tempfile::tempdir().unwrap();
        let points = load_heatmap(&dir.path().join("training_data.csv")).unwrap();
        assert!(points.is_empty());
    }

    #[test]
    fn loads_from_table() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("training_data.csv");
        write_training_table(&path, &table()).unwrap();
        assert_eq!(load_heatmap(&path).unwrap().len(), 3);
    }

    #[test]
    fn serializes_as_triples() {
        let p = HeatmapPoint {
            lat: 12.5,
            lon: 77.5,
            intensity: 1.0,
        };
        assert_eq!(serde_json::to_string(&p).unwrap(), "[12.5,77.5,1.0]");
    }

    #[test]
    fn bins_points_sharing_a_cell() {
        let points = aggregate(&table());
        let bins = aggregate_hex(&points, Resolution::Nine);

        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].count, 2);
        assert_eq!(bins[0].intensity, 1.0);
        assert_eq!(bins[1].count, 1);
        assert_eq!(bins[1].intensity, 0.5);
        assert!((bins[0].lat - 12.9177).abs() < 0.01);
    }
}
