//! The atomic clinical observation record consumed by tokenization.

use serde::{Deserialize, Serialize};

/// Value attached to a clinical observation, either numeric (lab result) or
/// textual (categorical finding).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventValue {
    /// Numeric measurement, e.g. `123.45`.
    Numeric(f64),
    /// Categorical observation, e.g. `"YES"`.
    Text(String),
}

/// One timestamped clinical observation in a patient's timeline.
///
/// Only `code` is required; it uniquely identifies a concept in the source
/// coding system (e.g. `"LOINC/2236-8"`). Events are constructed when a
/// patient timeline is materialised and discarded after tokenization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Concept code in the source coding system.
    pub code: String,
    /// Observed value, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<EventValue>,
    /// Measurement unit, e.g. `"mg/dL"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Observation start timestamp (ISO-8601, passed through untouched).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<String>,
    /// Observation end timestamp (ISO-8601, passed through untouched).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<String>,
    /// Source table in the clinical data warehouse, e.g. `"measurement"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_table: Option<String>,
}

impl Event {
    /// Creates an event carrying only a code.
    #[must_use]
    pub fn new<S: Into<String>>(code: S) -> Self {
        Self {
            code: code.into(),
            value: None,
            unit: None,
            start: None,
            end: None,
            source_table: None,
        }
    }

    /// Attaches a numeric value.
    #[must_use]
    pub fn with_numeric(mut self, value: f64) -> Self {
        self.value = Some(EventValue::Numeric(value));
        self
    }

    /// Attaches a textual (categorical) value.
    #[must_use]
    pub fn with_text<S: Into<String>>(mut self, value: S) -> Self {
        self.value = Some(EventValue::Text(value.into()));
        self
    }

    /// Attaches a measurement unit.
    #[must_use]
    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Returns the numeric value if the event carries one.
    #[must_use]
    pub fn numeric_value(&self) -> Option<f64> {
        match self.value {
            Some(EventValue::Numeric(v)) => Some(v),
            _ => None,
        }
    }

    /// Returns the textual value if the event carries one.
    #[must_use]
    pub fn text_value(&self) -> Option<&str> {
        match &self.value {
            Some(EventValue::Text(s)) => Some(s.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_round_trips_through_json() {
        let event = Event::new("LOINC/2236-8")
            .with_numeric(-3.0)
            .with_unit("mg/dL");
        let json = serde_json::to_string(&event).expect("serialize event");
        let back: Event = serde_json::from_str(&json).expect("deserialize event");
        assert_eq!(back, event);
    }

    #[test]
    fn untagged_value_distinguishes_numeric_from_text() {
        let numeric: Event =
            serde_json::from_str(r#"{"code": "X", "value": 1.5}"#).expect("numeric");
        assert_eq!(numeric.numeric_value(), Some(1.5));
        let text: Event = serde_json::from_str(r#"{"code": "X", "value": "YES"}"#).expect("text");
        assert_eq!(text.text_value(), Some("YES"));
    }

    #[test]
    fn optional_fields_default_to_none() {
        let event: Event = serde_json::from_str(r#"{"code": "SNOMED/3950001"}"#).expect("minimal");
        assert_eq!(event, Event::new("SNOMED/3950001"));
    }
}
