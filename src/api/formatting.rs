//! Proximity output formatting and serialization
//!
//! Renders a [`ProximityState`] for display: a short summary line such as
//! "0.15 km from event", the staleness of the reading and the most recent
//! source error, as text, JSON or CSV.

use crate::core::{ProximityState, Staleness};
use crate::source::LocationError;
use serde::{Deserialize, Serialize};

/// Display-ready view of one proximity state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedProximity {
    /// One-line summary, e.g. "At event" or "0.15 km from event"
    pub summary: String,
    pub distance_km: Option<f64>,
    pub within_radius: Option<bool>,
    pub staleness: Staleness,
    pub last_updated_ms: Option<u64>,
    /// Most recent location source error, if any
    pub error: Option<String>,
}

/// Builds [`FormattedProximity`] values
#[derive(Debug, Clone)]
pub struct ProximityFormatter {
    /// Decimal places for kilometre distances
    precision: u8,
}

impl Default for ProximityFormatter {
    fn default() -> Self {
        Self { precision: 2 }
    }
}

impl ProximityFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_precision(mut self, precision: u8) -> Self {
        self.precision = precision;
        self
    }

    pub fn format(&self, state: &ProximityState) -> FormattedProximity {
        self.format_with_error(state, None)
    }

    pub fn format_with_error(
        &self,
        state: &ProximityState,
        error: Option<&LocationError>,
    ) -> FormattedProximity {
        FormattedProximity {
            summary: self.summary(state),
            distance_km: state
                .distance_m
                .map(|d| self.round_to_precision(d / 1000.0)),
            within_radius: state.within_radius,
            staleness: state.staleness,
            last_updated_ms: state.last_updated_ms,
            error: error.map(|e| e.to_string()),
        }
    }

    /// Summary line for a state
    pub fn summary(&self, state: &ProximityState) -> String {
        match (state.within_radius, state.distance_m) {
            (Some(true), _) => "At event".to_string(),
            (_, Some(distance_m)) => format!(
                "{:.*} km from event",
                self.precision as usize,
                distance_m / 1000.0
            ),
            _ => "Calculating distance...".to_string(),
        }
    }

    fn round_to_precision(&self, value: f64) -> f64 {
        let multiplier = 10_f64.powi(self.precision as i32);
        (value * multiplier).round() / multiplier
    }
}

fn staleness_label(staleness: Staleness) -> &'static str {
    match staleness {
        Staleness::Fresh => "fresh",
        Staleness::Stale => "stale",
        Staleness::Unknown => "unknown",
    }
}

/// Human-readable text formatter
#[derive(Debug, Clone, Default)]
pub struct TextFormatter {
    /// Single-line output
    pub compact: bool,
}

impl TextFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compact() -> Self {
        Self { compact: true }
    }

    pub fn format_text(&self, formatted: &FormattedProximity) -> String {
        let staleness = staleness_label(formatted.staleness);

        if self.compact {
            let mut line = format!("{} [{}]", formatted.summary, staleness);
            if let Some(error) = &formatted.error {
                line.push_str(&format!(" | error: {}", error));
            }
            return line;
        }

        let mut output = format!("{}\n", formatted.summary);
        if let Some(distance_km) = formatted.distance_km {
            output.push_str(&format!("  Distance:  {} km\n", distance_km));
        }
        if let Some(within) = formatted.within_radius {
            output.push_str(&format!("  Nearby:    {}\n", if within { "yes" } else { "no" }));
        }
        output.push_str(&format!("  Reading:   {}\n", staleness));
        if let Some(ms) = formatted.last_updated_ms {
            output.push_str(&format!("  Updated:   {} ms\n", ms));
        }
        if let Some(error) = &formatted.error {
            output.push_str(&format!("  Error:     {}\n", error));
        }
        output
    }
}

/// JSON formatter for structured output
#[derive(Debug, Clone, Default)]
pub struct JsonFormatter {
    pub pretty: bool,
}

impl JsonFormatter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pretty() -> Self {
        Self { pretty: true }
    }

    pub fn format_json(&self, formatted: &FormattedProximity) -> Result<String, serde_json::Error> {
        if self.pretty {
            serde_json::to_string_pretty(formatted)
        } else {
            serde_json::to_string(formatted)
        }
    }
}

/// CSV formatter for data logging
#[derive(Debug, Clone, Default)]
pub struct CsvFormatter;

impl CsvFormatter {
    pub fn new() -> Self {
        Self
    }

    pub fn header(&self) -> String {
        "last_updated_ms,distance_km,within_radius,staleness".to_string()
    }

    pub fn format_csv(&self, formatted: &FormattedProximity) -> String {
        let opt = |value: Option<String>| value.unwrap_or_default();
        format!(
            "{},{},{},{}",
            opt(formatted.last_updated_ms.map(|v| v.to_string())),
            opt(formatted.distance_km.map(|v| v.to_string())),
            opt(formatted.within_radius.map(|v| v.to_string())),
            staleness_label(formatted.staleness)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(distance_m: f64, within: bool, staleness: Staleness) -> ProximityState {
        ProximityState {
            distance_m: Some(distance_m),
            within_radius: Some(within),
            last_updated_ms: Some(1_000),
            staleness,
        }
    }

    #[test]
    fn test_summary_lines() {
        let formatter = ProximityFormatter::new();
        assert_eq!(
            formatter.summary(&ProximityState::initial()),
            "Calculating distance..."
        );
        assert_eq!(
            formatter.summary(&state(150.0, false, Staleness::Fresh)),
            "0.15 km from event"
        );
        assert_eq!(formatter.summary(&state(40.0, true, Staleness::Fresh)), "At event");
        assert_eq!(
            ProximityFormatter::new()
                .with_precision(1)
                .summary(&state(2_345.0, false, Staleness::Fresh)),
            "2.3 km from event"
        );
    }

    #[test]
    fn test_text_shows_staleness_and_error() {
        let formatted = ProximityFormatter::new().format_with_error(
            &state(150.0, false, Staleness::Stale),
            Some(&LocationError::Timeout { timeout_ms: 10_000 }),
        );
        assert_eq!(formatted.distance_km, Some(0.15));

        let line = TextFormatter::compact().format_text(&formatted);
        assert!(line.starts_with("0.15 km from event [stale]"));
        assert!(line.contains("error:"));

        let text = TextFormatter::new().format_text(&formatted);
        assert!(text.contains("Reading:   stale"));
        assert!(text.contains("Nearby:    no"));
    }

    #[test]
    fn test_json_output() {
        let formatted = ProximityFormatter::new().format(&state(40.0, true, Staleness::Fresh));
        let json = JsonFormatter::new().format_json(&formatted).unwrap();
        let parsed: FormattedProximity = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, formatted);
        assert!(json.contains("\"summary\":\"At event\""));
    }

    #[test]
    fn test_csv_row() {
        let csv = CsvFormatter::new();
        assert_eq!(csv.header().split(',').count(), 4);
        let row = csv.format_csv(&ProximityFormatter::new().format(&ProximityState::initial()));
        assert_eq!(row, ",,,unknown");
    }
}
