//! Known accident blackspots and nearest-blackspot lookup.

use std::path::Path;

use serde::Deserialize;
use tracing::info;

use crate::distance::{Coordinate, haversine_km};
use crate::error::ConfigError;

/// Bengaluru Traffic Police high-risk junctions, 2024-25 reports.
pub const BENGALURU_BLACKSPOTS: &[(&str, f64, f64)] = &[
    ("Silk Board Junction", 12.9177, 77.6238),
    ("Hebbal Flyover", 13.0359, 77.5970),
    ("KR Puram Tin Factory", 13.0120, 77.6778),
    ("Goraguntepalya", 13.0285, 77.5414),
    ("Electronic City Toll", 12.8399, 77.6770),
    ("Ibbalur Junction (ORR)", 12.9207, 77.6626),
    ("Marathahalli Bridge", 12.9569, 77.7011),
    ("Dairy Circle", 12.9363, 77.6058),
    ("Banashankari Signal", 12.9259, 77.5702),
    ("Summanahalli Junction", 13.0016, 77.5190),
    ("Koramangala Sony Signal", 12.9367, 77.6259),
    ("Nayandahalli Junction", 12.9409, 77.5265),
];

#[derive(Debug, Clone, PartialEq)]
pub struct Blackspot {
    pub name: String,
    pub coordinate: Coordinate,
}

#[derive(Deserialize)]
struct BlackspotRow {
    name: String,
    lat: f64,
    lon: f64,
}

/// Result of a nearest-blackspot query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Nearest<'a> {
    pub distance_km: f64,
    pub name: &'a str,
}

/// Immutable, non-empty set of blackspots.
#[derive(Debug, Clone)]
pub struct BlackspotIndex {
    spots: Vec<Blackspot>,
}

impl BlackspotIndex {
    pub fn new(spots: Vec<Blackspot>) -> Result<Self, ConfigError> {
        if spots.is_empty() {
            return Err(ConfigError::EmptyBlackspotTable);
        }
        if let Some(bad) = spots.iter().find(|s| !s.coordinate.is_valid()) {
            return Err(ConfigError::InvalidBlackspot {
                name: bad.name.clone(),
                lat: bad.coordinate.lat,
                lon: bad.coordinate.lon,
            });
        }
        Ok(Self { spots })
    }

    /// The built-in Bengaluru table.
    pub fn bengaluru() -> Self {
        let spots = BENGALURU_BLACKSPOTS
            .iter()
            .map(|&(name, lat, lon)| Blackspot {
                name: name.to_string(),
                coordinate: Coordinate::new(lat, lon),
            })
            .collect();
        Self { spots }
    }

    /// Loads a `name,lat,lon` table.
    pub fn from_csv(path: &Path) -> Result<Self, ConfigError> {
        let table_err = |source| ConfigError::Table {
            path: path.to_path_buf(),
            source,
        };
        let mut rdr = csv::Reader::from_path(path).map_err(table_err)?;
        let spots = rdr
            .deserialize::<BlackspotRow>()
            .map(|row| {
                row.map(|r| Blackspot {
                    name: r.name,
                    coordinate: Coordinate::new(r.lat, r.lon),
                })
            })
            .collect::<Result<Vec<_>, _>>()
            .map_err(table_err)?;
        let index = Self::new(spots)?;
        info!(path = %path.display(), count = index.len(), "loaded blackspot table");
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    pub fn spots(&self) -> &[Blackspot] {
        &self.spots
    }

    /// Linear scan; ties resolve to the earlier table entry.
    pub fn nearest(&self, point: Coordinate) -> Nearest<'_> {
        let mut best = Nearest {
            distance_km: f64::INFINITY,
            name: &self.spots[0].name,
        };
        for spot in &self.spots {
            let d = haversine_km(point, spot.coordinate);
            if d < best.distance_km {
                best = Nearest {
                    distance_km: d,
                    name: &spot.name,
                };
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn bengaluru_table_has_twelve_entries() {
        assert_eq!(BlackspotIndex::bengaluru().len(), 12);
    }

    #[test]
    fn point_on_silk_board() {
        let index = BlackspotIndex::bengaluru();
        let n = index.nearest(Coordinate::new(12.9177, 77.6238));
        assert_eq!(n.distance_km, 0.0);
        assert_eq!(n.name, "Silk Board Junction");
    }

    #[test]
    fn every_blackspot_is_its_own_nearest() {
        let index = BlackspotIndex::bengaluru();
        for spot in index.spots() {
            let n = index.nearest(spot.coordinate);
            assert_eq!(n.name, spot.name);
            assert_eq!(n.distance_km, 0.0);
        }
    }

    #[test]
    fn ties_go_to_first_entry() {
        let spot = |name: &str, lon: f64| Blackspot {
            name: name.into(),
            coordinate: Coordinate::new(0.0, lon),
        };
        let index = BlackspotIndex::new(vec![spot("west", -1.0), spot("east", 1.0)]).unwrap();
        let n = index.nearest(Coordinate::new(0.0, 0.0));
        assert_eq!(n.name, "west");
    }

    #[test]
    fn empty_table_is_rejected() {
        assert!(matches!(
            BlackspotIndex::new(Vec::new()),
            Err(ConfigError::EmptyBlackspotTable)
        ));
    }

    #[test]
    fn invalid_coordinate_is_rejected() {
        let spots = vec![Blackspot {
            name: "nowhere".into(),
            coordinate: Coordinate::new(95.0, 0.0),
        }];
        assert!(matches!(
            BlackspotIndex::new(spots),
            Err(ConfigError::InvalidBlackspot { .. })
        ));
    }

    #[test]
    fn loads_csv_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,lat,lon").unwrap();
        writeln!(file, "Town Hall,12.9634,77.5855").unwrap();
        file.flush().unwrap();

        let index = BlackspotIndex::from_csv(file.path()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.spots()[0].name, "Town Hall");
    }

    #[test]
    fn header_only_csv_is_empty_table() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "name,lat,lon").unwrap();
        file.flush().unwrap();

        assert!(matches!(
            BlackspotIndex::from_csv(file.path()),
            Err(ConfigError::EmptyBlackspotTable)
        ));
    }
}
