use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{DistanceMode, DriveEntry, DriveEntryInput, compute_distance};

/// Drive entries, most recently created first.
#[derive(Debug, Clone, Default)]
pub struct TripLedger {
    entries: Vec<DriveEntry>,
}

impl TripLedger {
    #[must_use]
    pub fn from_vec(mut entries: Vec<DriveEntry>) -> Self {
        entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { entries }
    }

    #[must_use]
    pub fn list(&self) -> &[DriveEntry] {
        &self.entries
    }

    #[must_use]
    pub fn get_by_id(&self, id: Uuid) -> Option<&DriveEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    /// Validate the input, derive its distance and store it.
    pub fn add_entry(&mut self, input: DriveEntryInput) -> Result<DriveEntry> {
        let input = input.normalized()?;
        let entry = build_entry(Uuid::new_v4(), input);
        self.entries.insert(0, entry.clone());
        self.entries.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(id = %entry.id, distance = entry.distance, "added drive entry");
        Ok(entry)
    }

    /// Replace the mutable fields of an entry and recompute its distance.
    ///
    /// The id and creation time are kept. Unknown ids yield `None`.
    pub fn update_entry(&mut self, id: Uuid, input: DriveEntryInput) -> Result<Option<DriveEntry>> {
        let input = input.normalized()?;
        let Some(slot) = self.entries.iter_mut().find(|e| e.id == id) else {
            return Ok(None);
        };
        let created_at = slot.created_at;
        let mut updated = build_entry(id, input);
        updated.created_at = created_at;
        *slot = updated.clone();
        debug!(%id, distance = updated.distance, "updated drive entry");
        Ok(Some(updated))
    }

    pub fn delete_entry(&mut self, id: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        before != self.entries.len()
    }

    /// Copy an entry onto `new_date` under a fresh id.
    pub fn duplicate_entry(
        &mut self,
        source_id: Uuid,
        new_date: NaiveDate,
    ) -> Result<Option<DriveEntry>> {
        let Some(source) = self.get_by_id(source_id) else {
            return Ok(None);
        };
        let mut input = source.input();
        input.date = new_date;
        self.add_entry(input).map(Some)
    }
}

fn build_entry(id: Uuid, input: DriveEntryInput) -> DriveEntry {
    let distance = compute_distance(&input);
    if input.distance_mode == DistanceMode::Odometer && input.end_odometer < input.start_odometer {
        warn!(
            start = input.start_odometer,
            end = input.end_odometer,
            "reversed odometer pair, distance set to 0"
        );
    }
    DriveEntry {
        id,
        date: input.date,
        start_time: input.start_time,
        end_time: input.end_time,
        start_odometer: input.start_odometer,
        end_odometer: input.end_odometer,
        from_address: input.from_address,
        to_address: input.to_address,
        roundtrip: input.roundtrip,
        purpose: input.purpose,
        vehicle_type: input.vehicle_type,
        category: input.category,
        license_plate: input.license_plate,
        distance_mode: input.distance_mode,
        resolved_km: input.resolved_km,
        distance,
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Category;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn odo(d: &str, start: f64, end: f64) -> DriveEntryInput {
        DriveEntryInput::odometer(date(d), start, end)
            .with_purpose("Kundbesök")
    }

    fn route(from: &str, to: &str, roundtrip: bool, km: f64) -> DriveEntryInput {
        DriveEntryInput::route(date("2024-02-01"), from, to, roundtrip, Some(km))
            .with_purpose("Leverans")
    }

    #[test]
    fn test_add_entry_computes_distance() {
        let mut ledger = TripLedger::default();
        let entry = ledger.add_entry(odo("2024-01-15", 1000.0, 1042.5)).unwrap();
        assert!((entry.distance - 42.5).abs() < 1e-9);
        assert!((entry.amount() - 106.25).abs() < 1e-9);
        assert_eq!(ledger.list().len(), 1);
    }

    #[test]
    fn test_add_entry_reversed_odometer_is_zero() {
        let mut ledger = TripLedger::default();
        let entry = ledger.add_entry(odo("2024-01-15", 1200.0, 1000.0)).unwrap();
        assert_eq!(entry.distance, 0.0);
    }

    #[test]
    fn test_add_route_entry() {
        let mut ledger = TripLedger::default();
        let entry = ledger
            .add_entry(route("Göteborg", "Borås", true, 32.14))
            .unwrap();
        assert!((entry.distance - 64.3).abs() < 1e-9);
        assert_eq!(entry.distance_mode, DistanceMode::Route);
    }

    #[test]
    fn test_add_entry_validation_leaves_ledger_unchanged() {
        let mut ledger = TripLedger::default();
        let mut input = odo("2024-01-15", 0.0, 10.0);
        input.purpose = "x".repeat(101);
        assert!(ledger.add_entry(input).is_err());
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_add_entry_without_purpose_is_rejected() {
        let mut ledger = TripLedger::default();
        let input = DriveEntryInput::odometer(date("2024-01-15"), 0.0, 10.0);
        let err = ledger.add_entry(input).unwrap_err();
        assert!(matches!(err, crate::error::LogbookError::Validation(_)));
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_list_newest_created_first() {
        let mut ledger = TripLedger::default();
        let a = ledger.add_entry(odo("2024-03-01", 0.0, 10.0)).unwrap();
        let b = ledger.add_entry(odo("2024-01-01", 0.0, 20.0)).unwrap();
        assert_eq!(ledger.list()[0].id, b.id);
        assert_eq!(ledger.list()[1].id, a.id);
    }

    #[test]
    fn test_update_entry_recomputes_and_keeps_identity() {
        let mut ledger = TripLedger::default();
        let entry = ledger.add_entry(odo("2024-01-15", 1000.0, 1010.0)).unwrap();
        let mut input = entry.input();
        input.end_odometer = 1100.0;
        input.category = Category::Other;
        let updated = ledger.update_entry(entry.id, input).unwrap().unwrap();
        assert_eq!(updated.id, entry.id);
        assert_eq!(updated.created_at, entry.created_at);
        assert!((updated.distance - 100.0).abs() < 1e-9);
        assert_eq!(ledger.get_by_id(entry.id).unwrap().category, Category::Other);
    }

    #[test]
    fn test_update_and_delete_unknown_are_noops() {
        let mut ledger = TripLedger::default();
        ledger.add_entry(odo("2024-01-15", 0.0, 5.0)).unwrap();
        let result = ledger
            .update_entry(Uuid::new_v4(), odo("2024-01-16", 0.0, 50.0))
            .unwrap();
        assert!(result.is_none());
        assert!(!ledger.delete_entry(Uuid::new_v4()));
        assert_eq!(ledger.list().len(), 1);
    }

    #[test]
    fn test_duplicate_entry() {
        let mut ledger = TripLedger::default();
        let source = ledger
            .add_entry(route("Göteborg", "Borås", false, 64.0))
            .unwrap();
        let copy = ledger
            .duplicate_entry(source.id, date("2024-02-08"))
            .unwrap()
            .unwrap();
        assert_ne!(copy.id, source.id);
        assert_eq!(copy.date, date("2024-02-08"));
        assert_eq!(copy.from_address, "Göteborg");
        assert!((copy.distance - source.distance).abs() < 1e-9);
        assert_eq!(ledger.list().len(), 2);
        assert_eq!(ledger.list()[0].id, copy.id);
    }

    #[test]
    fn test_duplicate_unknown_is_noop() {
        let mut ledger = TripLedger::default();
        assert!(
            ledger
                .duplicate_entry(Uuid::new_v4(), date("2024-02-08"))
                .unwrap()
                .is_none()
        );
        assert!(ledger.list().is_empty());
    }

    #[test]
    fn test_delete_entry() {
        let mut ledger = TripLedger::default();
        let entry = ledger.add_entry(odo("2024-01-15", 0.0, 5.0)).unwrap();
        assert!(ledger.delete_entry(entry.id));
        assert!(ledger.get_by_id(entry.id).is_none());
    }
}
