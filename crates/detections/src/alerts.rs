//! Alert reports for enforcement agencies.
//!
//! Three renderings of the same filtered site list: a JSON summary for the
//! dashboard, a CSV export, and the NAIMOS government report.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;

use crate::model::{Detection, DetectionCollection};
use crate::severity::{RecommendedAction, Severity, SeverityFilter};

pub const DEFAULT_PERIOD: &str = "weekly";

const CSV_HEADER: [&str; 9] = [
    "Site ID",
    "Latitude",
    "Longitude",
    "Confidence %",
    "Severity",
    "Region",
    "License Status",
    "Detection Date",
    "Recommended Action",
];

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Json,
    Csv,
    Naimos,
}

impl ReportFormat {
    /// Unrecognised formats fall back to JSON.
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("csv") => ReportFormat::Csv,
            Some("naimos") => ReportFormat::Naimos,
            _ => ReportFormat::Json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertQuery {
    pub period: String,
    pub format: ReportFormat,
    pub severity: SeverityFilter,
}

impl Default for AlertQuery {
    fn default() -> Self {
        Self {
            period: DEFAULT_PERIOD.to_string(),
            format: ReportFormat::Json,
            severity: SeverityFilter::All,
        }
    }
}

impl AlertQuery {
    pub fn parse(period: Option<&str>, format: Option<&str>, severity: Option<&str>) -> Self {
        Self {
            period: period
                .filter(|p| !p.is_empty())
                .unwrap_or(DEFAULT_PERIOD)
                .to_string(),
            format: ReportFormat::parse(format),
            severity: SeverityFilter::parse(severity),
        }
    }

    pub fn select<'a>(&self, collection: &'a DetectionCollection) -> Vec<&'a Detection> {
        collection
            .features
            .iter()
            .filter(|d| self.severity.admits(d.probability()))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertStats {
    pub period: String,
    pub new_detections: usize,
    pub high_risk_sites: usize,
    pub area_affected_ha: f64,
    /// Distinct regions in first-seen order.
    pub regions_affected: Vec<String>,
}

impl AlertStats {
    pub fn compute(period: &str, sites: &[&Detection]) -> Self {
        let mut regions: Vec<String> = Vec::new();
        for region in sites.iter().filter_map(|d| d.region()) {
            if !regions.iter().any(|r| r == region) {
                regions.push(region.to_string());
            }
        }
        Self {
            period: period.to_string(),
            new_detections: sites.iter().filter(|d| d.is_new()).count(),
            high_risk_sites: sites.iter().filter(|d| d.probability() >= 0.9).count(),
            area_affected_ha: sites.iter().map(|d| d.area_ha()).sum(),
            regions_affected: regions,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertItem {
    /// `[lon, lat]`
    pub coordinates: [f64; 2],
    pub confidence: f64,
    pub severity: Severity,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    pub is_new: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertReport {
    pub generated_at: String,
    pub period: String,
    pub stats: AlertStats,
    pub alerts: Vec<AlertItem>,
}

impl AlertReport {
    pub fn build(period: &str, sites: &[&Detection], now: DateTime<Utc>) -> Self {
        Self {
            generated_at: iso_timestamp(now),
            period: period.to_string(),
            stats: AlertStats::compute(period, sites),
            alerts: sites
                .iter()
                .map(|d| AlertItem {
                    coordinates: [d.properties.lon, d.properties.lat],
                    confidence: d.probability(),
                    severity: Severity::from_probability(d.probability()),
                    region: d.properties.region.clone(),
                    is_new: d.is_new(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SiteCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NaimosSite {
    pub site_id: String,
    pub coordinates: SiteCoordinates,
    pub confidence_score: i64,
    pub severity: Severity,
    pub region: String,
    pub estimated_area_ha: f64,
    pub license_status: &'static str,
    pub detection_date: String,
    pub recommended_action: RecommendedAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NaimosSummary {
    pub total_sites_detected: usize,
    pub new_sites_this_period: usize,
    pub critical_alerts: usize,
    pub estimated_area_hectares: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgencyContacts {
    pub minerals_commission: &'static str,
    pub environmental_protection: &'static str,
    pub forestry_commission: &'static str,
}

pub const AGENCY_CONTACTS: AgencyContacts = AgencyContacts {
    minerals_commission: "+233-302-778900",
    environmental_protection: "+233-302-664697",
    forestry_commission: "+233-302-221315",
};

/// Report shape consumed by NAIMOS (National Integrated Mining Operations
/// Monitoring System).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NaimosReport {
    pub report_type: &'static str,
    pub report_id: String,
    pub generated_at: String,
    pub reporting_period: String,
    pub summary: NaimosSummary,
    pub sites: Vec<NaimosSite>,
    pub agency_contacts: AgencyContacts,
}

impl NaimosReport {
    pub fn build(period: &str, sites: &[&Detection], now: DateTime<Utc>) -> Self {
        let stats = AlertStats::compute(period, sites);
        let generated_at = iso_timestamp(now);
        Self {
            report_type: "ILLEGAL_MINING_ALERT",
            report_id: format!("MWA-{}", now.timestamp_millis()),
            generated_at: generated_at.clone(),
            reporting_period: period.to_string(),
            summary: NaimosSummary {
                total_sites_detected: sites.len(),
                new_sites_this_period: stats.new_detections,
                critical_alerts: sites
                    .iter()
                    .filter(|d| Severity::from_probability(d.probability()) == Severity::Critical)
                    .count(),
                estimated_area_hectares: stats.area_affected_ha.round() as i64,
            },
            sites: sites
                .iter()
                .enumerate()
                .map(|(idx, d)| NaimosSite {
                    site_id: site_id(idx),
                    coordinates: SiteCoordinates {
                        latitude: d.properties.lat,
                        longitude: d.properties.lon,
                    },
                    confidence_score: confidence_pct(d.probability()),
                    severity: Severity::from_probability(d.probability()),
                    region: d.region().unwrap_or("Unknown").to_string(),
                    estimated_area_ha: d.area_ha(),
                    license_status: license_status(d),
                    detection_date: d
                        .detection_date()
                        .map(str::to_string)
                        .unwrap_or_else(|| generated_at.clone()),
                    recommended_action: RecommendedAction::for_site(
                        d.probability(),
                        d.is_licensed(),
                    ),
                })
                .collect(),
            agency_contacts: AGENCY_CONTACTS,
        }
    }
}

/// CSV export, one row per site. Missing detection dates become `now`'s date.
pub fn alerts_csv(sites: &[&Detection], now: DateTime<Utc>) -> String {
    let today = now.format("%Y-%m-%d").to_string();
    let mut lines = Vec::with_capacity(sites.len() + 1);
    lines.push(CSV_HEADER.join(","));
    for (idx, d) in sites.iter().enumerate() {
        let row = [
            site_id(idx),
            format!("{:.6}", d.properties.lat),
            format!("{:.6}", d.properties.lon),
            confidence_pct(d.probability()).to_string(),
            Severity::from_probability(d.probability()).label().to_string(),
            csv_field(d.region().unwrap_or("Unknown")),
            license_status(d).to_string(),
            csv_field(d.detection_date().unwrap_or(&today)),
            RecommendedAction::for_site(d.probability(), d.is_licensed())
                .as_str()
                .to_string(),
        ];
        lines.push(row.join(","));
    }
    lines.join("\n")
}

pub fn csv_filename(period: &str, now: DateTime<Utc>) -> String {
    format!("minewatch_alerts_{period}_{}.csv", now.timestamp_millis())
}

fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn site_id(idx: usize) -> String {
    format!("SITE-{:04}", idx + 1)
}

fn confidence_pct(probability: f64) -> i64 {
    (probability * 100.0).round() as i64
}

fn license_status(d: &Detection) -> &'static str {
    if d.is_licensed() { "LICENSED" } else { "UNLICENSED" }
}

pub fn iso_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}
