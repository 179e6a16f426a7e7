use anyhow::Result;
use serde::Deserialize;
use tracing::debug;

use crate::models::route_distance;

/// Resolves the driving distance between two addresses, in kilometres.
///
/// The CLI implements this with reqwest against a Distance Matrix style
/// endpoint. Called synchronously; async callers should use the client's
/// own async method instead.
pub trait DistanceResolver: Send + Sync {
    fn resolve(&self, origin: &str, destination: &str) -> Result<f64>;
}

#[derive(Debug, Deserialize)]
pub struct DistanceMatrixResponse {
    pub status: String,
    #[serde(default)]
    pub rows: Vec<MatrixRow>,
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixRow {
    #[serde(default)]
    pub elements: Vec<MatrixElement>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixElement {
    pub status: String,
    pub distance: Option<MatrixDistance>,
}

#[derive(Debug, Deserialize)]
pub struct MatrixDistance {
    /// Metres.
    #[serde(alias = "value_meters")]
    pub value: f64,
    pub text: Option<String>,
}

/// Kilometres from the first element of the first row, or `None` unless
/// both the response and the element report `OK`.
#[must_use]
pub fn response_to_km(resp: &DistanceMatrixResponse) -> Option<f64> {
    if resp.status != "OK" {
        return None;
    }
    let element = resp.rows.first()?.elements.first()?;
    if element.status != "OK" {
        return None;
    }
    let meters = element.distance.as_ref()?.value;
    (meters.is_finite() && meters >= 0.0).then_some(meters / 1000.0)
}

/// Human readable reason for a response that [`response_to_km`] rejected.
#[must_use]
pub fn failure_reason(resp: &DistanceMatrixResponse) -> String {
    if resp.status != "OK" {
        return match &resp.error_message {
            Some(msg) => format!("{}: {msg}", resp.status),
            None => resp.status.clone(),
        };
    }
    match resp.rows.first().and_then(|r| r.elements.first()) {
        Some(element) if element.status != "OK" => element.status.clone(),
        Some(_) => "missing distance in response".to_string(),
        None => "empty response".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DistanceState {
    Idle,
    Loading,
    Resolved(f64),
    Failed(String),
}

/// Handle for one in-flight lookup. Only the most recently issued ticket may complete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTicket {
    generation: u64,
    origin: String,
    destination: String,
}

impl RouteTicket {
    #[must_use]
    pub fn origin(&self) -> &str {
        &self.origin
    }

    #[must_use]
    pub fn destination(&self) -> &str {
        &self.destination
    }
}

/// Tracks the distance for the address pair currently being edited,
/// discarding results from lookups that were superseded.
#[derive(Debug)]
pub struct RouteDistanceTracker {
    generation: u64,
    current: Option<(String, String)>,
    state: DistanceState,
}

impl Default for RouteDistanceTracker {
    fn default() -> Self {
        Self {
            generation: 0,
            current: None,
            state: DistanceState::Idle,
        }
    }
}

impl RouteDistanceTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin(&mut self, origin: &str, destination: &str) -> RouteTicket {
        self.generation += 1;
        let origin = origin.trim().to_string();
        let destination = destination.trim().to_string();
        self.current = Some((origin.clone(), destination.clone()));
        self.state = DistanceState::Loading;
        RouteTicket {
            generation: self.generation,
            origin,
            destination,
        }
    }

    /// Apply a lookup result. Returns `false` and changes nothing for a stale ticket.
    pub fn complete(
        &mut self,
        ticket: &RouteTicket,
        result: std::result::Result<f64, String>,
    ) -> bool {
        let same_pair = self
            .current
            .as_ref()
            .is_some_and(|(o, d)| *o == ticket.origin && *d == ticket.destination);
        if ticket.generation != self.generation || !same_pair {
            debug!(
                ticket = ticket.generation,
                latest = self.generation,
                "discarding stale distance result"
            );
            return false;
        }
        self.state = match result {
            Ok(km) => DistanceState::Resolved(km),
            Err(msg) => DistanceState::Failed(msg),
        };
        true
    }

    /// Forget the current pair; any outstanding ticket becomes stale.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.current = None;
        self.state = DistanceState::Idle;
    }

    #[must_use]
    pub fn state(&self) -> &DistanceState {
        &self.state
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.state == DistanceState::Loading
    }

    #[must_use]
    pub fn resolved_km(&self) -> Option<f64> {
        match self.state {
            DistanceState::Resolved(km) => Some(km),
            _ => None,
        }
    }

    /// Distance ready to be saved, only once the lookup has succeeded.
    #[must_use]
    pub fn final_distance(&self, roundtrip: bool) -> Option<f64> {
        self.resolved_km().map(|km| route_distance(km, roundtrip))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> DistanceMatrixResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_response_to_km() {
        let resp = parse(
            r#"{"status":"OK","rows":[{"elements":[{"status":"OK","distance":{"value":64250,"text":"64,3 km"}}]}]}"#,
        );
        assert!((response_to_km(&resp).unwrap() - 64.25).abs() < 1e-9);
    }

    #[test]
    fn test_response_to_km_accepts_value_meters() {
        let resp = parse(
            r#"{"status":"OK","rows":[{"elements":[{"status":"OK","distance":{"value_meters":1500}}]}]}"#,
        );
        assert!((response_to_km(&resp).unwrap() - 1.5).abs() < 1e-9);
    }

    #[test]
    fn test_response_to_km_failures() {
        let denied = parse(r#"{"status":"REQUEST_DENIED","error_message":"bad key"}"#);
        assert!(response_to_km(&denied).is_none());
        assert_eq!(failure_reason(&denied), "REQUEST_DENIED: bad key");

        let not_found = parse(r#"{"status":"OK","rows":[{"elements":[{"status":"NOT_FOUND"}]}]}"#);
        assert!(response_to_km(&not_found).is_none());
        assert_eq!(failure_reason(&not_found), "NOT_FOUND");

        let empty = parse(r#"{"status":"OK","rows":[]}"#);
        assert!(response_to_km(&empty).is_none());
        assert_eq!(failure_reason(&empty), "empty response");

        let no_distance = parse(r#"{"status":"OK","rows":[{"elements":[{"status":"OK"}]}]}"#);
        assert!(response_to_km(&no_distance).is_none());
    }

    #[test]
    fn test_tracker_resolves_latest() {
        let mut tracker = RouteDistanceTracker::new();
        assert_eq!(tracker.state(), &DistanceState::Idle);
        let ticket = tracker.begin("Göteborg", "Borås");
        assert!(tracker.is_loading());
        assert!(tracker.final_distance(false).is_none());

        assert!(tracker.complete(&ticket, Ok(32.14)));
        assert!((tracker.final_distance(false).unwrap() - 32.1).abs() < 1e-9);
        assert!((tracker.final_distance(true).unwrap() - 64.3).abs() < 1e-9);
    }

    #[test]
    fn test_tracker_discards_stale_result() {
        let mut tracker = RouteDistanceTracker::new();
        let old = tracker.begin("Göteborg", "Borås");
        let new = tracker.begin("Göteborg", "Alingsås");

        assert!(tracker.complete(&new, Ok(45.0)));
        assert!(!tracker.complete(&old, Ok(64.0)));
        assert_eq!(tracker.resolved_km(), Some(45.0));
    }

    #[test]
    fn test_tracker_stale_result_while_loading() {
        let mut tracker = RouteDistanceTracker::new();
        let old = tracker.begin("A-gatan", "B-gatan");
        let _new = tracker.begin("A-gatan", "C-gatan");
        assert!(!tracker.complete(&old, Ok(10.0)));
        assert!(tracker.is_loading());
    }

    #[test]
    fn test_tracker_failure_and_reset() {
        let mut tracker = RouteDistanceTracker::new();
        let ticket = tracker.begin("Nowhere", "Elsewhere");
        assert!(tracker.complete(&ticket, Err("NOT_FOUND".to_string())));
        assert_eq!(tracker.state(), &DistanceState::Failed("NOT_FOUND".to_string()));
        assert!(tracker.final_distance(true).is_none());

        tracker.reset();
        assert_eq!(tracker.state(), &DistanceState::Idle);
        assert!(!tracker.complete(&ticket, Ok(1.0)));
    }
}
