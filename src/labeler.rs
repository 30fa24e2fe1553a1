//! Ground-truth labelling for the training table.
//!
//! A node is high risk when it sits within 500 m of a known blackspot or is
//! a junction of five or more streets. Changing either threshold changes the
//! ground truth the classifier learns, so [`LABEL_RULE_VERSION`] must be bumped
//! with it; the model loader refuses artifacts stamped with another version.

use serde::{Deserialize, Serialize};

/// Version of the labelling rule. Stamped into model artifacts as the
/// `label_rule_version` attribute.
pub const LABEL_RULE_VERSION: u32 = 1;

pub const PROXIMITY_THRESHOLD_KM: f64 = 0.5;
pub const COMPLEX_JUNCTION_STREETS: u32 = 5;

/// Stored as `0` or `1` in the training table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RiskLabel {
    Low = 0,
    High = 1,
}

impl RiskLabel {
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RiskLabel {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RiskLabel::Low),
            1 => Ok(RiskLabel::High),
            other => Err(format!("risk label must be 0 or 1, got {other}")),
        }
    }
}

impl From<RiskLabel> for u8 {
    fn from(label: RiskLabel) -> Self {
        label.as_u8()
    }
}

pub fn label(distance_km: f64, junction_complexity: u32) -> RiskLabel {
    if distance_km <= PROXIMITY_THRESHOLD_KM || junction_complexity >= COMPLEX_JUNCTION_STREETS {
        RiskLabel::High
    } else {
        RiskLabel::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blackspots::BlackspotIndex;
    use crate::distance::Coordinate;

    #[test]
    fn boundary_distance_is_high_risk() {
        assert_eq!(label(0.5, 0), RiskLabel::High);
        assert_eq!(label(0.500_001, 0), RiskLabel::Low);
    }

    #[test]
    fn complex_junction_is_high_risk_anywhere() {
        assert_eq!(label(40.0, 5), RiskLabel::High);
        assert_eq!(label(40.0, 4), RiskLabel::Low);
    }

    #[test]
    fn only_zero_and_one_are_labels() {
        assert_eq!(RiskLabel::try_from(1), Ok(RiskLabel::High));
        assert_eq!(RiskLabel::try_from(0), Ok(RiskLabel::Low));
        assert!(RiskLabel::try_from(2).is_err());
    }

    #[test]
    fn far_simple_node_becomes_risky_on_the_blackspot() {
        let index = BlackspotIndex::bengaluru();
        // Cubbon Park, several km from every blackspot
        let far = index.nearest(Coordinate::new(12.9763, 77.5929));
        assert!(far.distance_km > PROXIMITY_THRESHOLD_KM);
        assert_eq!(label(far.distance_km, 3), RiskLabel::Low);

        let spot = index
            .spots()
            .iter()
            .find(|s| s.name == far.name)
            .unwrap();
        let on_spot = index.nearest(spot.coordinate);
        assert_eq!(on_spot.name, far.name);
        assert_eq!(on_spot.distance_km, 0.0);
        assert_eq!(label(on_spot.distance_km, 3), RiskLabel::High);
    }
}
