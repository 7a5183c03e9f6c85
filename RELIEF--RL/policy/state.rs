use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of state features produced by [`StateEncoder`].
pub const STATE_DIM: usize = 5;

/// Fixed-order state features, every component in `[0, 1]`.
pub type StateFeatures = [f64; STATE_DIM];

const SEVERITY_SCALE: f64 = 3.0;
const ALERT_SCALE: f64 = 10.0;
const DELAY_SCALE_HOURS: f64 = 24.0;
const RESOURCE_SCALE: f64 = 20.0;
const TYPE_SCALE: f64 = 5.0;

const POPULATION_SCALE: f64 = 100_000.0;
const SCENARIO_RESOURCE_SCALE: f64 = 10.0;
const ELAPSED_SCALE_HOURS: f64 = 24.0;

/// Ordinal disaster severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// 0
    Low,
    /// 1
    Medium,
    /// 2
    High,
    /// 3
    Critical,
}

impl Severity {
    /// All severities in ordinal order.
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Critical];

    /// Ordinal in `0..=3`.
    #[must_use]
    pub const fn ordinal(self) -> u32 {
        match self {
            Self::Low => 0,
            Self::Medium => 1,
            Self::High => 2,
            Self::Critical => 3,
        }
    }

    /// Inverse of [`Severity::ordinal`].
    #[must_use]
    pub const fn from_ordinal(value: u32) -> Option<Self> {
        match value {
            0 => Some(Self::Low),
            1 => Some(Self::Medium),
            2 => Some(Self::High),
            3 => Some(Self::Critical),
            _ => None,
        }
    }

    /// Parses a free-form label. Unrecognised labels map to [`Severity::Medium`].
    #[must_use]
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "low" => Self::Low,
            "high" => Self::High,
            "critical" => Self::Critical,
            _ => Self::Medium,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Kind of disaster. The declaration order is the encoding index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisasterType {
    /// Index 0, also the fallback for unknown labels.
    Earthquake,
    /// Index 1.
    Flood,
    /// Index 2.
    Fire,
    /// Index 3.
    Hurricane,
    /// Index 4.
    Tornado,
    /// Index 5.
    Tsunami,
}

impl DisasterType {
    /// All types in index order.
    pub const ALL: [Self; 6] = [
        Self::Earthquake,
        Self::Flood,
        Self::Fire,
        Self::Hurricane,
        Self::Tornado,
        Self::Tsunami,
    ];

    /// Encoding index in `0..=5`.
    #[must_use]
    pub const fn index(self) -> u32 {
        match self {
            Self::Earthquake => 0,
            Self::Flood => 1,
            Self::Fire => 2,
            Self::Hurricane => 3,
            Self::Tornado => 4,
            Self::Tsunami => 5,
        }
    }

    /// Parses a free-form label. Unrecognised labels map to [`DisasterType::Earthquake`].
    #[must_use]
    pub fn parse_lenient(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "flood" => Self::Flood,
            "fire" => Self::Fire,
            "hurricane" => Self::Hurricane,
            "tornado" => Self::Tornado,
            "tsunami" => Self::Tsunami,
            _ => Self::Earthquake,
        }
    }

    /// Lowercase label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Earthquake => "earthquake",
            Self::Flood => "flood",
            Self::Fire => "fire",
            Self::Hurricane => "hurricane",
            Self::Tornado => "tornado",
            Self::Tsunami => "tsunami",
        }
    }
}

impl fmt::Display for DisasterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Immutable snapshot of a disaster used by the learning agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisasterState {
    severity: Severity,
    num_alerts: u32,
    response_delay_hours: f64,
    available_resources: u32,
    disaster_type: DisasterType,
}

impl DisasterState {
    /// Builds a state. A negative or non-finite delay is stored as `0.0`.
    #[must_use]
    pub fn new(
        severity: Severity,
        num_alerts: u32,
        response_delay_hours: f64,
        available_resources: u32,
        disaster_type: DisasterType,
    ) -> Self {
        let response_delay_hours = if response_delay_hours.is_finite() {
            response_delay_hours.max(0.0)
        } else {
            0.0
        };
        Self {
            severity,
            num_alerts,
            response_delay_hours,
            available_resources,
            disaster_type,
        }
    }

    /// Severity.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        self.severity
    }

    /// Number of active alerts.
    #[must_use]
    pub const fn num_alerts(&self) -> u32 {
        self.num_alerts
    }

    /// Hours since the disaster was reported.
    #[must_use]
    pub const fn response_delay_hours(&self) -> f64 {
        self.response_delay_hours
    }

    /// Resource units on hand.
    #[must_use]
    pub const fn available_resources(&self) -> u32 {
        self.available_resources
    }

    /// Disaster type.
    #[must_use]
    pub const fn disaster_type(&self) -> DisasterType {
        self.disaster_type
    }

    /// Shorthand for [`StateEncoder::encode`].
    #[must_use]
    pub fn to_vector(&self) -> StateFeatures {
        StateEncoder::encode(self)
    }
}

impl fmt::Display for DisasterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "State(sev={}, alerts={}, delay={:.1}h, res={}, type={})",
            self.severity.ordinal(),
            self.num_alerts,
            self.response_delay_hours,
            self.available_resources,
            self.disaster_type
        )
    }
}

/// Incoming disaster report with free-form labels, as consumed by the priority optimizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioReport {
    /// Severity label (`low`, `medium`, `high`, `critical`).
    #[serde(default = "default_severity_label")]
    pub severity: String,
    /// Disaster type label.
    #[serde(default = "default_type_label")]
    pub disaster_type: String,
    /// People affected.
    #[serde(default = "default_population")]
    pub affected_population: u64,
    /// Resource units on hand.
    #[serde(default)]
    pub available_resources: u32,
    /// Hours elapsed since the report.
    #[serde(default)]
    pub time_elapsed_hours: f64,
}

fn default_severity_label() -> String {
    Severity::Medium.label().to_owned()
}

fn default_type_label() -> String {
    DisasterType::Earthquake.label().to_owned()
}

const fn default_population() -> u64 {
    1_000
}

impl ScenarioReport {
    /// Creates a report with zero elapsed time.
    #[must_use]
    pub fn new(
        severity: impl Into<String>,
        disaster_type: impl Into<String>,
        affected_population: u64,
        available_resources: u32,
    ) -> Self {
        Self {
            severity: severity.into(),
            disaster_type: disaster_type.into(),
            affected_population,
            available_resources,
            time_elapsed_hours: 0.0,
        }
    }

    /// Severity after lenient parsing.
    #[must_use]
    pub fn severity_level(&self) -> Severity {
        Severity::parse_lenient(&self.severity)
    }

    /// Disaster type after lenient parsing.
    #[must_use]
    pub fn kind(&self) -> DisasterType {
        DisasterType::parse_lenient(&self.disaster_type)
    }
}

/// Maps raw scenario attributes onto bounded feature vectors.
///
/// Both encodings divide by a fixed scale and cap at `1.0`. They differ in field order
/// because the learning agent and the priority optimizer were tuned against different
/// layouts.
#[derive(Debug, Clone, Copy, Default)]
pub struct StateEncoder;

impl StateEncoder {
    /// `[severity/3, alerts/10, delay/24, resources/20, type/5]`.
    #[must_use]
    pub fn encode(state: &DisasterState) -> StateFeatures {
        [
            f64::from(state.severity.ordinal()) / SEVERITY_SCALE,
            capped(f64::from(state.num_alerts), ALERT_SCALE),
            capped(state.response_delay_hours, DELAY_SCALE_HOURS),
            capped(f64::from(state.available_resources), RESOURCE_SCALE),
            f64::from(state.disaster_type.index()) / TYPE_SCALE,
        ]
    }

    /// `[severity/3, type/5, population/100000, resources/10, elapsed/24]`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn encode_scenario(report: &ScenarioReport) -> StateFeatures {
        let population = report.affected_population as f64;
        [
            f64::from(report.severity_level().ordinal()) / SEVERITY_SCALE,
            f64::from(report.kind().index()) / TYPE_SCALE,
            capped(population, POPULATION_SCALE),
            capped(f64::from(report.available_resources), SCENARIO_RESOURCE_SCALE),
            capped(report.time_elapsed_hours, ELAPSED_SCALE_HOURS),
        ]
    }
}

fn capped(value: f64, scale: f64) -> f64 {
    (value.max(0.0) / scale).min(1.0)
}
