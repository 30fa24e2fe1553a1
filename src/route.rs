//! Flags the stretches of a route that pass close to high-risk points.

use geo::{HaversineLength, LineString};
use rstar::{AABB, RTree};
use serde::Serialize;

use crate::distance::{Coordinate, EARTH_RADIUS_KM, haversine_km};
use crate::error::ScoreError;
use crate::heatmap::HeatmapPoint;

pub const DEFAULT_AUDIT_RADIUS_KM: f64 = 0.3;

// relative slack on the search box for float rounding
const BOX_SLACK: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DangerSegment {
    /// `[lat, lon]` vertices.
    pub coordinates: Vec<[f64; 2]>,
    pub length_km: f64,
}

/// R-tree over high-risk points, keyed `[lon, lat]`.
pub struct RiskZones {
    tree: RTree<[f64; 2]>,
}

impl RiskZones {
    pub fn new(points: &[HeatmapPoint]) -> Self {
        let tree = RTree::bulk_load(points.iter().map(|p| [p.lon, p.lat]).collect());
        Self { tree }
    }

    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    /// True when some high-risk point lies within `radius_km` of `point`.
    pub fn is_risky(&self, point: Coordinate, radius_km: f64) -> bool {
        search_boxes(point, radius_km).into_iter().any(|b| {
            self.tree
                .locate_in_envelope(&b)
                .any(|&[lon, lat]| haversine_km(point, Coordinate::new(lat, lon)) <= radius_km)
        })
    }

    /// Splits `path` into maximal runs of risky vertices. Runs of a single
    /// vertex are not reported.
    pub fn audit(
        &self,
        path: &[Coordinate],
        radius_km: f64,
    ) -> Result<Vec<DangerSegment>, ScoreError> {
        if let Some(bad) = path.iter().find(|c| !c.is_valid()) {
            return Err(ScoreError::InvalidCoordinate {
                lat: bad.lat,
                lon: bad.lon,
            });
        }

        let mut segments = Vec::new();
        let mut current: Vec<Coordinate> = Vec::new();
        for &point in path {
            if self.is_risky(point, radius_km) {
                current.push(point);
            } else {
                flush(&mut current, &mut segments);
            }
        }
        flush(&mut current, &mut segments);
        Ok(segments)
    }
}

/// `[lon, lat]` boxes that together hold every point within `radius_km` of
/// `center`. A box crossing the antimeridian is split in two; one reaching a
/// pole spans all longitudes.
fn search_boxes(center: Coordinate, radius_km: f64) -> Vec<AABB<[f64; 2]>> {
    let angle = radius_km / EARTH_RADIUS_KM * (1.0 + BOX_SLACK);
    let dlat = angle.to_degrees();
    let lat_lo = center.lat - dlat;
    let lat_hi = center.lat + dlat;
    let full = |lo: f64, hi: f64| vec![AABB::from_corners([-180.0, lo], [180.0, hi])];

    if lat_lo <= -90.0 || lat_hi >= 90.0 {
        return full(lat_lo.max(-90.0), lat_hi.min(90.0));
    }

    // hav(d) >= cos(lat1) cos(lat2) hav(dlon), so bound dlon with the
    // smallest cosine inside the latitude band
    let cos_min = lat_lo.abs().max(lat_hi.abs()).to_radians().cos();
    let ratio = (angle / 2.0).sin() / cos_min;
    if ratio >= 1.0 {
        return full(lat_lo, lat_hi);
    }
    let dlon = (2.0 * ratio.asin()).to_degrees();
    if dlon >= 180.0 {
        return full(lat_lo, lat_hi);
    }

    let lon_lo = center.lon - dlon;
    let lon_hi = center.lon + dlon;
    let mut boxes = vec![AABB::from_corners([lon_lo, lat_lo], [lon_hi, lat_hi])];
    if lon_lo < -180.0 {
        boxes.push(AABB::from_corners([lon_lo + 360.0, lat_lo], [180.0, lat_hi]));
    }
    if lon_hi > 180.0 {
        boxes.push(AABB::from_corners([-180.0, lat_lo], [lon_hi - 360.0, lat_hi]));
    }
    boxes
}

fn flush(current: &mut Vec<Coordinate>, segments: &mut Vec<DangerSegment>) {
    let run = std::mem::take(current);
    if run.len() < 2 {
        return;
    }
    let line: LineString<f64> = run.iter().map(|c| (c.lon, c.lat)).collect();
    segments.push(DangerSegment {
        coordinates: run.iter().map(|c| [c.lat, c.lon]).collect(),
        length_km: line.haversine_length() / 1000.0,
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn zones() -> RiskZones {
        RiskZones::new(&[HeatmapPoint {
            lat: 12.9177,
            lon: 77.6238,
            intensity: 1.0,
        }])
    }

    #[test]
    fn finds_points_inside_radius() {
        let z = zones();
        // ~110 m north of Silk Board
        assert!(z.is_risky(Coordinate::new(12.9187, 77.6238), 0.3));
        // ~1.1 km north
        assert!(!z.is_risky(Coordinate::new(12.9277, 77.6238), 0.3));
    }

    #[test]
    fn empty_zones_are_never_risky() {
        let z = RiskZones::new(&[]);
        assert!(z.is_empty());
        assert!(!z.is_risky(Coordinate::new(12.9177, 77.6238), 5.0));
    }

    #[test]
    fn sees_across_the_antimeridian() {
        let z = RiskZones::new(&[HeatmapPoint {
            lat: 0.0,
            lon: 179.999,
            intensity: 1.0,
        }]);
        let across = Coordinate::new(0.0, -179.999);
        assert!(haversine_km(across, Coordinate::new(0.0, 179.999)) < 0.3);
        assert!(z.is_risky(across, 0.3));
        assert!(!z.is_risky(Coordinate::new(0.0, -179.99), 0.3));
    }

    #[test]
    fn sees_around_the_pole() {
        let z = RiskZones::new(&[HeatmapPoint {
            lat: 89.999,
            lon: 0.0,
            intensity: 1.0,
        }]);
        // a quarter turn of longitude away, about 160 m over the pole cap
        let query = Coordinate::new(89.999, 90.0);
        assert!(haversine_km(query, Coordinate::new(89.999, 0.0)) < 0.3);
        assert!(z.is_risky(query, 0.3));
    }

    #[test]
    fn sees_wide_longitudes_at_high_latitude() {
        // at 89.9 degrees a 0.3 km radius spans roughly 1.6 degrees of longitude
        let z = RiskZones::new(&[HeatmapPoint {
            lat: 89.9,
            lon: 1.0,
            intensity: 1.0,
        }]);
        let query = Coordinate::new(89.9, 0.0);
        assert!(haversine_km(query, Coordinate::new(89.9, 1.0)) < 0.3);
        assert!(z.is_risky(query, 0.3));
    }

    #[test]
    fn groups_consecutive_risky_vertices() {
        let z = zones();
        let path = [
            Coordinate::new(12.9000, 77.6238), // far
            Coordinate::new(12.9167, 77.6238), // near
            Coordinate::new(12.9177, 77.6238), // on
            Coordinate::new(12.9187, 77.6238), // near
            Coordinate::new(12.9400, 77.6238), // far
            Coordinate::new(12.9177, 77.6240), // near, alone
            Coordinate::new(12.9500, 77.6238), // far
        ];

        let segments = z.audit(&path, DEFAULT_AUDIT_RADIUS_KM).unwrap();

        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].coordinates.len(), 3);
        assert_eq!(segments[0].coordinates[0], [12.9167, 77.6238]);
        // two 0.001 degree latitude steps
        assert!((segments[0].length_km - 0.222).abs() < 0.005);
    }

    #[test]
    fn rejects_invalid_vertices() {
        let path = [Coordinate::new(12.9, 77.6), Coordinate::new(120.0, 77.6)];
        assert!(matches!(
            zones().audit(&path, DEFAULT_AUDIT_RADIUS_KM),
            Err(ScoreError::InvalidCoordinate { .. })
        ));
    }
}
