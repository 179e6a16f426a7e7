use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LogbookError, Result};

/// Reimbursement paid per kilometre, in currency units.
pub const RATE_PER_KM: f64 = 2.5;

pub const DEFAULT_VEHICLE_TYPE: &str = "Privat bil";

pub const MAX_TEXT_LEN: usize = 100;

// --- Vehicles ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub id: Uuid,
    pub license_plate: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub make: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub color: Option<String>,
    #[serde(default)]
    pub is_default: bool,
    pub created_at: DateTime<Utc>,
}

impl Vehicle {
    /// "Volvo V70" style label, empty when neither make nor model is known.
    #[must_use]
    pub fn description(&self) -> String {
        [self.make.as_deref(), self.model.as_deref()]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct NewVehicle {
    pub license_plate: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub color: Option<String>,
    pub is_default: bool,
}

#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateVehicle {
    pub license_plate: Option<String>,
    pub make: Option<Option<String>>,
    pub model: Option<Option<String>>,
    pub color: Option<Option<String>>,
}

// --- Odometer readings ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OdometerReading {
    pub id: Uuid,
    pub car_id: Uuid,
    /// Plate at the time the reading was taken. Not kept in sync with the registry.
    pub license_plate: String,
    pub date: NaiveDate,
    pub odometer: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOdometerReading {
    pub car_id: Uuid,
    pub license_plate: String,
    pub date: NaiveDate,
    pub odometer: u64,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Default)]
#[allow(clippy::option_option)]
pub struct UpdateOdometerReading {
    pub date: Option<NaiveDate>,
    pub odometer: Option<u64>,
    pub notes: Option<Option<String>>,
}

// --- Drive entries ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Category {
    #[default]
    #[serde(rename = "Tjänsteresa")]
    Business,
    #[serde(rename = "Övrigt")]
    Other,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::Business, Category::Other];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Category::Business => "Tjänsteresa",
            Category::Other => "Övrigt",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Category {
    type Err = LogbookError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tjänsteresa" | "tjansteresa" | "business" => Ok(Category::Business),
            "övrigt" | "ovrigt" | "other" => Ok(Category::Other),
            _ => Err(LogbookError::Validation(format!(
                "Invalid category '{s}'. Must be one of: Tjänsteresa, Övrigt"
            ))),
        }
    }
}

/// Where an entry's distance comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DistanceMode {
    #[default]
    Odometer,
    Route,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriveEntry {
    pub id: Uuid,
    pub date: NaiveDate,
    #[serde(default)]
    pub start_time: String,
    #[serde(default)]
    pub end_time: String,
    #[serde(default)]
    pub start_odometer: f64,
    #[serde(default)]
    pub end_odometer: f64,
    #[serde(default)]
    pub from_address: String,
    #[serde(default)]
    pub to_address: String,
    #[serde(default)]
    pub roundtrip: bool,
    pub purpose: String,
    pub vehicle_type: String,
    #[serde(default)]
    pub category: Category,
    /// Soft reference to a registry vehicle; never enforced.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub license_plate: Option<String>,
    #[serde(default)]
    pub distance_mode: DistanceMode,
    /// One-way kilometres from the distance lookup, kept so distance can be recomputed.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub resolved_km: Option<f64>,
    pub distance: f64,
    pub created_at: DateTime<Utc>,
}

impl DriveEntry {
    /// The mutable part of the entry, as it would be submitted again.
    #[must_use]
    pub fn input(&self) -> DriveEntryInput {
        DriveEntryInput {
            date: self.date,
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            start_odometer: self.start_odometer,
            end_odometer: self.end_odometer,
            from_address: self.from_address.clone(),
            to_address: self.to_address.clone(),
            roundtrip: self.roundtrip,
            purpose: self.purpose.clone(),
            vehicle_type: self.vehicle_type.clone(),
            category: self.category,
            license_plate: self.license_plate.clone(),
            distance_mode: self.distance_mode,
            resolved_km: self.resolved_km,
        }
    }

    /// Route text used for the "Ort" column and report line items.
    #[must_use]
    pub fn route_label(&self) -> String {
        match (self.from_address.is_empty(), self.to_address.is_empty()) {
            (true, true) => String::new(),
            (false, true) => self.from_address.clone(),
            (true, false) => self.to_address.clone(),
            (false, false) if self.roundtrip => format!(
                "{} - {} - {}",
                self.from_address, self.to_address, self.from_address
            ),
            (false, false) => format!("{} - {}", self.from_address, self.to_address),
        }
    }

    #[must_use]
    pub fn amount(&self) -> f64 {
        amount_for(self.distance)
    }
}

/// Everything a user supplies for an entry. `distance` is never part of it.
#[derive(Debug, Clone, PartialEq)]
pub struct DriveEntryInput {
    pub date: NaiveDate,
    pub start_time: String,
    pub end_time: String,
    pub start_odometer: f64,
    pub end_odometer: f64,
    pub from_address: String,
    pub to_address: String,
    pub roundtrip: bool,
    pub purpose: String,
    pub vehicle_type: String,
    pub category: Category,
    pub license_plate: Option<String>,
    pub distance_mode: DistanceMode,
    pub resolved_km: Option<f64>,
}

impl DriveEntryInput {
    #[must_use]
    pub fn odometer(date: NaiveDate, start_odometer: f64, end_odometer: f64) -> Self {
        Self {
            date,
            start_time: String::new(),
            end_time: String::new(),
            start_odometer,
            end_odometer,
            from_address: String::new(),
            to_address: String::new(),
            roundtrip: false,
            purpose: String::new(),
            vehicle_type: DEFAULT_VEHICLE_TYPE.to_string(),
            category: Category::default(),
            license_plate: None,
            distance_mode: DistanceMode::Odometer,
            resolved_km: None,
        }
    }

    #[must_use]
    pub fn route(
        date: NaiveDate,
        from_address: &str,
        to_address: &str,
        roundtrip: bool,
        resolved_km: Option<f64>,
    ) -> Self {
        Self {
            from_address: from_address.to_string(),
            to_address: to_address.to_string(),
            roundtrip,
            distance_mode: DistanceMode::Route,
            resolved_km,
            ..Self::odometer(date, 0.0, 0.0)
        }
    }

    #[must_use]
    pub fn with_purpose(mut self, purpose: &str) -> Self {
        self.purpose = purpose.to_string();
        self
    }

    /// Trim text fields, normalize the plate and check formats.
    pub fn normalized(mut self) -> Result<Self> {
        self.start_time = self.start_time.trim().to_string();
        self.end_time = self.end_time.trim().to_string();
        self.from_address = self.from_address.trim().to_string();
        self.to_address = self.to_address.trim().to_string();
        self.purpose = self.purpose.trim().to_string();
        self.vehicle_type = self.vehicle_type.trim().to_string();
        if self.vehicle_type.is_empty() {
            self.vehicle_type = DEFAULT_VEHICLE_TYPE.to_string();
        }
        self.license_plate = self
            .license_plate
            .as_deref()
            .map(normalize_plate)
            .filter(|p| !p.is_empty());

        let start = optional_time(&self.start_time, "start_time")?;
        let end = optional_time(&self.end_time, "end_time")?;
        if self.distance_mode == DistanceMode::Odometer {
            if let (Some(s), Some(e)) = (start, end) {
                if e <= s {
                    return Err(LogbookError::Validation(format!(
                        "end_time {} must be after start_time {}",
                        self.end_time, self.start_time
                    )));
                }
            }
        }

        if self.purpose.is_empty() {
            return Err(LogbookError::Validation("purpose is required".to_string()));
        }
        if self.purpose.chars().count() > MAX_TEXT_LEN {
            return Err(LogbookError::Validation(format!(
                "purpose must be at most {MAX_TEXT_LEN} characters"
            )));
        }
        if self.vehicle_type.chars().count() > MAX_TEXT_LEN {
            return Err(LogbookError::Validation(format!(
                "vehicle_type must be at most {MAX_TEXT_LEN} characters"
            )));
        }

        match self.distance_mode {
            DistanceMode::Odometer => {
                if self.start_odometer < 0.0 || self.end_odometer < 0.0 {
                    return Err(LogbookError::Validation(
                        "Odometer values must not be negative".to_string(),
                    ));
                }
            }
            DistanceMode::Route => {
                if self.from_address.is_empty() || self.to_address.is_empty() {
                    return Err(LogbookError::Validation(
                        "Route entries need both from_address and to_address".to_string(),
                    ));
                }
                if self.resolved_km.is_some_and(|km| !km.is_finite() || km < 0.0) {
                    return Err(LogbookError::Validation(
                        "Resolved distance must be a non-negative number".to_string(),
                    ));
                }
            }
        }

        Ok(self)
    }
}

// --- User profile ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    pub employee_id: String,
    pub department: String,
    pub account: String,
    pub company: String,
    #[serde(rename = "ref")]
    pub reference: String,
    pub purpose: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default_from_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub default_to_address: Option<String>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Ditt Namn".to_string(),
            email: "namn@example.com".to_string(),
            employee_id: "01".to_string(),
            department: "Avdelning".to_string(),
            account: "1234567890".to_string(),
            company: "Ditt Företag AB".to_string(),
            reference: "Ref123".to_string(),
            purpose: "Milersättning".to_string(),
            default_from_address: None,
            default_to_address: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateUserProfile {
    pub name: Option<String>,
    pub email: Option<String>,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub account: Option<String>,
    pub company: Option<String>,
    pub reference: Option<String>,
    pub purpose: Option<String>,
}

impl UserProfile {
    pub fn apply(&mut self, update: UpdateUserProfile) {
        let UpdateUserProfile {
            name,
            email,
            employee_id,
            department,
            account,
            company,
            reference,
            purpose,
        } = update;
        for (slot, value) in [
            (&mut self.name, name),
            (&mut self.email, email),
            (&mut self.employee_id, employee_id),
            (&mut self.department, department),
            (&mut self.account, account),
            (&mut self.company, company),
            (&mut self.reference, reference),
            (&mut self.purpose, purpose),
        ] {
            if let Some(v) = value {
                *slot = v;
            }
        }
    }
}

// --- Distance arithmetic ---

#[must_use]
pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// `end - start`, or 0 when the pair is reversed or not a number.
#[must_use]
pub fn odometer_distance(start: f64, end: f64) -> f64 {
    if !start.is_finite() || !end.is_finite() || end < start {
        return 0.0;
    }
    end - start
}

#[must_use]
pub fn route_distance(resolved_km: f64, roundtrip: bool) -> f64 {
    let factor = if roundtrip { 2.0 } else { 1.0 };
    round_to(resolved_km * factor, 1)
}

/// Distance for an entry input. An unresolved route yields 0, never a guess.
#[must_use]
pub fn compute_distance(input: &DriveEntryInput) -> f64 {
    match input.distance_mode {
        DistanceMode::Odometer => odometer_distance(input.start_odometer, input.end_odometer),
        DistanceMode::Route => input
            .resolved_km
            .map_or(0.0, |km| route_distance(km, input.roundtrip)),
    }
}

#[must_use]
pub fn amount_for(distance: f64) -> f64 {
    round_to(distance * RATE_PER_KM, 2)
}

// --- Validation ---

#[must_use]
pub fn normalize_plate(plate: &str) -> String {
    plate.trim().to_uppercase()
}

/// Normalize and check a plate: three letters, two digits, optional letter or digit.
pub fn validate_license_plate(plate: &str) -> Result<String> {
    let normalized = normalize_plate(plate);
    let chars: Vec<char> = normalized.chars().collect();
    let valid = (chars.len() == 5 || chars.len() == 6)
        && chars[..3].iter().all(char::is_ascii_alphabetic)
        && chars[3..5].iter().all(char::is_ascii_digit)
        && chars.get(5).is_none_or(char::is_ascii_alphanumeric);
    if valid {
        Ok(normalized)
    } else {
        Err(LogbookError::Validation(format!(
            "Invalid license plate '{}'. Expected e.g. ABC123 or ABC12D",
            plate.trim()
        )))
    }
}

pub fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
        LogbookError::Validation(format!("Invalid date '{s}'. Must be YYYY-MM-DD"))
    })
}

/// Parse a strict `HH:MM` time.
pub fn parse_time(s: &str) -> Result<NaiveTime> {
    let bytes = s.as_bytes();
    let shaped = bytes.len() == 5
        && bytes[2] == b':'
        && [0, 1, 3, 4].iter().all(|&i| bytes[i].is_ascii_digit());
    if !shaped {
        return Err(LogbookError::Validation(format!(
            "Invalid time '{s}'. Must be HH:MM"
        )));
    }
    NaiveTime::parse_from_str(s, "%H:%M")
        .map_err(|_| LogbookError::Validation(format!("Invalid time '{s}'. Must be HH:MM")))
}

fn optional_time(s: &str, field: &str) -> Result<Option<NaiveTime>> {
    if s.is_empty() {
        return Ok(None);
    }
    parse_time(s)
        .map(Some)
        .map_err(|e| LogbookError::Validation(format!("{field}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn odo() -> DriveEntryInput {
        DriveEntryInput::odometer(date(2024, 1, 1), 10.0, 20.0)
    }

    #[test]
    fn test_odometer_distance() {
        assert!((odometer_distance(1000.0, 1200.0) - 200.0).abs() < f64::EPSILON);
        assert!((odometer_distance(1000.0, 1000.0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_odometer_distance_clamps_reversed_and_nan() {
        assert_eq!(odometer_distance(1200.0, 1000.0), 0.0);
        assert_eq!(odometer_distance(f64::NAN, 1000.0), 0.0);
        assert_eq!(odometer_distance(10.0, f64::INFINITY), 0.0);
    }

    #[test]
    fn test_route_distance_rounding_and_roundtrip() {
        assert!((route_distance(12.34, false) - 12.3).abs() < 1e-9);
        assert!((route_distance(12.34, true) - 24.7).abs() < 1e-9);
        assert!((route_distance(0.05, false) - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_compute_distance_unresolved_route_is_zero() {
        let input = DriveEntryInput::route(date(2024, 3, 1), "Göteborg", "Borås", true, None);
        assert_eq!(compute_distance(&input), 0.0);
    }

    #[test]
    fn test_amount_for() {
        assert!((amount_for(10.1) - 25.25).abs() < 1e-9);
        assert!((amount_for(0.0) - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_validate_license_plate() {
        assert_eq!(validate_license_plate(" abc123 ").unwrap(), "ABC123");
        assert_eq!(validate_license_plate("ABC12D").unwrap(), "ABC12D");
        assert_eq!(validate_license_plate("abc12").unwrap(), "ABC12");
    }

    #[test]
    fn test_validate_license_plate_invalid() {
        assert!(validate_license_plate("AB1234").is_err());
        assert!(validate_license_plate("ABCD12").is_err());
        assert!(validate_license_plate("ABC1").is_err());
        assert!(validate_license_plate("ABC123X").is_err());
        assert!(validate_license_plate("").is_err());
        assert!(validate_license_plate("ÅBC123").is_err());
    }

    #[test]
    fn test_parse_time() {
        assert_eq!(
            parse_time("08:30").unwrap(),
            NaiveTime::from_hms_opt(8, 30, 0).unwrap()
        );
        assert!(parse_time("8:30").is_err());
        assert!(parse_time("24:00").is_err());
        assert!(parse_time("12:60").is_err());
        assert!(parse_time("noon").is_err());
    }

    #[test]
    fn test_parse_date() {
        assert_eq!(parse_date("2024-01-15").unwrap(), date(2024, 1, 15));
        assert!(parse_date("2024-13-01").is_err());
        assert!(parse_date("15/01/2024").is_err());
    }

    #[test]
    fn test_category_parse_and_serde() {
        assert_eq!("Tjänsteresa".parse::<Category>().unwrap(), Category::Business);
        assert_eq!("ovrigt".parse::<Category>().unwrap(), Category::Other);
        assert!("privat".parse::<Category>().is_err());
        assert_eq!(
            serde_json::to_string(&Category::Other).unwrap(),
            "\"Övrigt\""
        );
        assert_eq!(Category::default(), Category::Business);
    }

    #[test]
    fn test_normalized_rejects_bad_time_order() {
        let mut input = odo().with_purpose("Kundbesök");
        input.start_time = "10:00".to_string();
        input.end_time = "09:59".to_string();
        assert!(input.normalized().is_err());
    }

    #[test]
    fn test_normalized_route_needs_addresses() {
        let input = DriveEntryInput::route(date(2024, 1, 1), "  ", "Borås", false, Some(5.0))
            .with_purpose("Kundbesök");
        assert!(input.normalized().is_err());
    }

    #[test]
    fn test_normalized_requires_purpose() {
        let blank = odo().with_purpose("   ");
        let err = blank.normalized().unwrap_err();
        assert!(matches!(err, LogbookError::Validation(ref m) if m.contains("purpose")));

        let given = odo().with_purpose("Kundbesök");
        assert!(given.normalized().is_ok());
    }

    #[test]
    fn test_normalized_trims_and_uppercases() {
        let mut input = DriveEntryInput::odometer(date(2024, 1, 1), 10.0, 20.0);
        input.purpose = "  Kundbesök ".to_string();
        input.license_plate = Some(" abc123".to_string());
        input.vehicle_type = String::new();
        let input = input.normalized().unwrap();
        assert_eq!(input.purpose, "Kundbesök");
        assert_eq!(input.license_plate.as_deref(), Some("ABC123"));
        assert_eq!(input.vehicle_type, DEFAULT_VEHICLE_TYPE);
    }

    #[test]
    fn test_route_label() {
        let entry = DriveEntry {
            id: Uuid::new_v4(),
            date: date(2024, 1, 1),
            start_time: String::new(),
            end_time: String::new(),
            start_odometer: 0.0,
            end_odometer: 0.0,
            from_address: "Göteborg".to_string(),
            to_address: "Borås".to_string(),
            roundtrip: true,
            purpose: String::new(),
            vehicle_type: DEFAULT_VEHICLE_TYPE.to_string(),
            category: Category::Business,
            license_plate: None,
            distance_mode: DistanceMode::Route,
            resolved_km: Some(64.0),
            distance: 128.0,
            created_at: Utc::now(),
        };
        assert_eq!(entry.route_label(), "Göteborg - Borås - Göteborg");
        assert!((entry.amount() - 320.0).abs() < 1e-9);
    }

    #[test]
    fn test_profile_defaults_and_apply() {
        let mut profile = UserProfile::default();
        assert_eq!(profile.company, "Ditt Företag AB");
        profile.apply(UpdateUserProfile {
            name: Some("Anna Andersson".to_string()),
            ..UpdateUserProfile::default()
        });
        assert_eq!(profile.name, "Anna Andersson");
        assert_eq!(profile.email, "namn@example.com");

        let json = serde_json::to_value(&profile).unwrap();
        assert_eq!(json["ref"], "Ref123");
    }
}
