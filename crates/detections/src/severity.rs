//! Probability bands used by alerting and by the dashboard.

use serde::{Serialize, Serializer};

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_probability(probability: f64) -> Self {
        if probability >= 0.95 {
            Severity::Critical
        } else if probability >= 0.85 {
            Severity::High
        } else if probability >= 0.70 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::High => "HIGH",
            Severity::Medium => "MEDIUM",
            Severity::Low => "LOW",
        }
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// The `severity` query parameter of the alerts API. Unrecognised values
/// select everything.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SeverityFilter {
    #[default]
    All,
    Critical,
    High,
    Medium,
}

impl SeverityFilter {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("critical") => SeverityFilter::Critical,
            Some("high") => SeverityFilter::High,
            Some("medium") => SeverityFilter::Medium,
            _ => SeverityFilter::All,
        }
    }

    pub fn min_probability(&self) -> Option<f64> {
        match self {
            SeverityFilter::All => None,
            SeverityFilter::Critical => Some(0.95),
            SeverityFilter::High => Some(0.85),
            SeverityFilter::Medium => Some(0.70),
        }
    }

    pub fn admits(&self, probability: f64) -> bool {
        self.min_probability().is_none_or(|min| probability >= min)
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum RecommendedAction {
    VerifyLicenseCompliance,
    ImmediateFieldVerification,
    PriorityInspection,
    RoutineInspection,
    MonitorAndReassess,
}

impl RecommendedAction {
    /// Licensed sites only need a compliance check; otherwise urgency follows
    /// the severity band.
    pub fn for_site(probability: f64, is_licensed: bool) -> Self {
        if is_licensed {
            return RecommendedAction::VerifyLicenseCompliance;
        }
        match Severity::from_probability(probability) {
            Severity::Critical => RecommendedAction::ImmediateFieldVerification,
            Severity::High => RecommendedAction::PriorityInspection,
            Severity::Medium => RecommendedAction::RoutineInspection,
            Severity::Low => RecommendedAction::MonitorAndReassess,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::VerifyLicenseCompliance => "VERIFY_LICENSE_COMPLIANCE",
            RecommendedAction::ImmediateFieldVerification => {
                "IMMEDIATE_FIELD_VERIFICATION_REQUIRED"
            }
            RecommendedAction::PriorityInspection => "PRIORITY_INSPECTION_WITHIN_48_HOURS",
            RecommendedAction::RoutineInspection => "SCHEDULE_ROUTINE_INSPECTION",
            RecommendedAction::MonitorAndReassess => "MONITOR_AND_REASSESS",
        }
    }
}

impl Serialize for RecommendedAction {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Dashboard confidence buckets (≥0.9, 0.7–0.9, 0.5–0.7).
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfidenceBand {
    High,
    Medium,
    Low,
}

impl ConfidenceBand {
    /// `None` below 0.5.
    pub fn from_probability(probability: f64) -> Option<Self> {
        if probability >= 0.9 {
            Some(ConfidenceBand::High)
        } else if probability >= 0.7 {
            Some(ConfidenceBand::Medium)
        } else if probability >= 0.5 {
            Some(ConfidenceBand::Low)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfidenceBand, RecommendedAction, Severity, SeverityFilter};

    #[test]
    fn severity_band_edges() {
        assert_eq!(Severity::from_probability(0.95), Severity::Critical);
        assert_eq!(Severity::from_probability(0.9499), Severity::High);
        assert_eq!(Severity::from_probability(0.85), Severity::High);
        assert_eq!(Severity::from_probability(0.70), Severity::Medium);
        assert_eq!(Severity::from_probability(0.69), Severity::Low);
        assert_eq!(serde_json::to_string(&Severity::High).unwrap(), "\"HIGH\"");
    }

    #[test]
    fn filter_parsing_defaults_to_all() {
        assert_eq!(SeverityFilter::parse(Some("critical")), SeverityFilter::Critical);
        assert_eq!(SeverityFilter::parse(Some("bogus")), SeverityFilter::All);
        assert_eq!(SeverityFilter::parse(None), SeverityFilter::All);
        assert!(SeverityFilter::All.admits(0.01));
        assert!(SeverityFilter::High.admits(0.85));
        assert!(!SeverityFilter::High.admits(0.84));
    }

    #[test]
    fn licensed_sites_get_compliance_checks() {
        assert_eq!(
            RecommendedAction::for_site(0.99, true),
            RecommendedAction::VerifyLicenseCompliance
        );
        assert_eq!(
            RecommendedAction::for_site(0.99, false).as_str(),
            "IMMEDIATE_FIELD_VERIFICATION_REQUIRED"
        );
        assert_eq!(
            RecommendedAction::for_site(0.86, false).as_str(),
            "PRIORITY_INSPECTION_WITHIN_48_HOURS"
        );
        assert_eq!(
            RecommendedAction::for_site(0.5, false).as_str(),
            "MONITOR_AND_REASSESS"
        );
    }

    #[test]
    fn dashboard_bands() {
        assert_eq!(ConfidenceBand::from_probability(0.9), Some(ConfidenceBand::High));
        assert_eq!(ConfidenceBand::from_probability(0.89), Some(ConfidenceBand::Medium));
        assert_eq!(ConfidenceBand::from_probability(0.5), Some(ConfidenceBand::Low));
        assert_eq!(ConfidenceBand::from_probability(0.49), None);
    }
}
