use serde::Serialize;

use crate::model::DetectionCollection;
use crate::severity::ConfidenceBand;

/// Default probability threshold of the dashboard filter.
pub const DEFAULT_PROBABILITY_FILTER: f64 = 0.5;

/// Rows shown in the ranked detection list.
pub const DETECTION_LIST_LIMIT: usize = 50;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DashboardStats {
    pub total: usize,
    pub high_confidence: usize,
    pub medium_confidence: usize,
    pub low_confidence: usize,
}

impl DashboardStats {
    /// Counts the detections passing `min_probability`, bucketed by
    /// confidence band.
    pub fn compute(collection: &DetectionCollection, min_probability: f64) -> Self {
        let mut stats = Self::default();
        for detection in collection.at_least(min_probability) {
            stats.total += 1;
            match ConfidenceBand::from_probability(detection.probability()) {
                Some(ConfidenceBand::High) => stats.high_confidence += 1,
                Some(ConfidenceBand::Medium) => stats.medium_confidence += 1,
                Some(ConfidenceBand::Low) => stats.low_confidence += 1,
                None => {}
            }
        }
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::{DashboardStats, DEFAULT_PROBABILITY_FILTER};
    use crate::model::{Detection, DetectionCollection};
    use pretty_assertions::assert_eq;

    #[test]
    fn buckets_follow_the_filter() {
        let c = DetectionCollection::new(
            [0.95, 0.91, 0.8, 0.7, 0.65, 0.5, 0.3]
                .into_iter()
                .map(|p| Detection::new(5.0, -2.0, p))
                .collect(),
        );
        assert_eq!(
            DashboardStats::compute(&c, DEFAULT_PROBABILITY_FILTER),
            DashboardStats {
                total: 6,
                high_confidence: 2,
                medium_confidence: 2,
                low_confidence: 2,
            }
        );
        // below-0.5 sites count toward the total but no bucket
        let loose = DashboardStats::compute(&c, 0.0);
        assert_eq!(loose.total, 7);
        assert_eq!(loose.low_confidence, 2);
    }
}
