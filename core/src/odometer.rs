use std::cmp::Ordering;
use std::collections::BTreeMap;

use chrono::{NaiveDate, Utc};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{LogbookError, Result};
use crate::models::{NewOdometerReading, OdometerReading, UpdateOdometerReading};

/// Newest date first; within a date, the most recently created first.
fn newest_first(a: &OdometerReading, b: &OdometerReading) -> Ordering {
    b.date
        .cmp(&a.date)
        .then_with(|| b.created_at.cmp(&a.created_at))
}

/// Two chronologically adjacent readings for one car where the odometer went down.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OdometerAnomaly {
    pub car_id: Uuid,
    pub license_plate: String,
    pub earlier_id: Uuid,
    pub earlier_date: NaiveDate,
    pub earlier_odometer: u64,
    pub later_id: Uuid,
    pub later_date: NaiveDate,
    pub later_odometer: u64,
}

/// All odometer readings across the fleet, kept sorted newest first.
#[derive(Debug, Clone, Default)]
pub struct OdometerLedger {
    readings: Vec<OdometerReading>,
}

impl OdometerLedger {
    #[must_use]
    pub fn from_vec(mut readings: Vec<OdometerReading>) -> Self {
        readings.sort_by(newest_first);
        Self { readings }
    }

    #[must_use]
    pub fn all(&self) -> &[OdometerReading] {
        &self.readings
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.readings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    /// Insert a reading unless it would move the car's odometer backwards.
    ///
    /// Readings dated before the latest one are backfill and always accepted.
    pub fn add_reading(&mut self, data: NewOdometerReading) -> Result<OdometerReading> {
        if let Some(latest) = self.latest_for(data.car_id) {
            if data.date >= latest.date && data.odometer < latest.odometer {
                warn!(
                    car_id = %data.car_id,
                    attempted = data.odometer,
                    latest = latest.odometer,
                    "rejected odometer regression"
                );
                return Err(LogbookError::OdometerRegression {
                    attempted_odometer: data.odometer,
                    attempted_date: data.date,
                    latest_odometer: latest.odometer,
                    latest_date: latest.date,
                });
            }
        }

        let reading = OdometerReading {
            id: Uuid::new_v4(),
            car_id: data.car_id,
            license_plate: data.license_plate,
            date: data.date,
            odometer: data.odometer,
            notes: data.notes.filter(|n| !n.trim().is_empty()),
            created_at: Utc::now(),
        };
        self.readings.insert(0, reading.clone());
        self.readings.sort_by(newest_first);
        debug!(
            id = %reading.id,
            car_id = %reading.car_id,
            odometer = reading.odometer,
            "added odometer reading"
        );
        Ok(reading)
    }

    /// Patch a reading in place. Monotonicity is not re-checked here; see [`Self::anomalies`].
    pub fn update_reading(
        &mut self,
        id: Uuid,
        update: UpdateOdometerReading,
    ) -> Option<OdometerReading> {
        let reading = self.readings.iter_mut().find(|r| r.id == id)?;
        if let Some(date) = update.date {
            reading.date = date;
        }
        if let Some(odometer) = update.odometer {
            reading.odometer = odometer;
        }
        if let Some(notes) = update.notes {
            reading.notes = notes.filter(|n| !n.trim().is_empty());
        }
        let updated = reading.clone();
        self.readings.sort_by(newest_first);
        Some(updated)
    }

    pub fn delete_reading(&mut self, id: Uuid) -> bool {
        let before = self.readings.len();
        self.readings.retain(|r| r.id != id);
        before != self.readings.len()
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&OdometerReading> {
        self.readings.iter().find(|r| r.id == id)
    }

    #[must_use]
    pub fn latest_for(&self, car_id: Uuid) -> Option<&OdometerReading> {
        self.readings
            .iter()
            .filter(|r| r.car_id == car_id)
            .min_by(|a, b| newest_first(a, b))
    }

    #[must_use]
    pub fn readings_for(&self, car_id: Uuid) -> Vec<OdometerReading> {
        self.readings
            .iter()
            .filter(|r| r.car_id == car_id)
            .cloned()
            .collect()
    }

    /// Readings of every car whose date lies in `start..=end`, newest first.
    #[must_use]
    pub fn readings_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<OdometerReading> {
        self.readings
            .iter()
            .filter(|r| r.date >= start && r.date <= end)
            .cloned()
            .collect()
    }

    /// Scan each car's history oldest to newest and report every drop.
    #[must_use]
    pub fn anomalies(&self) -> Vec<OdometerAnomaly> {
        let mut by_car: BTreeMap<Uuid, Vec<&OdometerReading>> = BTreeMap::new();
        for reading in &self.readings {
            by_car.entry(reading.car_id).or_default().push(reading);
        }

        let mut found = Vec::new();
        for readings in by_car.values_mut() {
            readings.sort_by(|a, b| newest_first(b, a));
            for pair in readings.windows(2) {
                let (earlier, later) = (pair[0], pair[1]);
                if later.odometer < earlier.odometer {
                    found.push(OdometerAnomaly {
                        car_id: later.car_id,
                        license_plate: later.license_plate.clone(),
                        earlier_id: earlier.id,
                        earlier_date: earlier.date,
                        earlier_odometer: earlier.odometer,
                        later_id: later.id,
                        later_date: later.date,
                        later_odometer: later.odometer,
                    });
                }
            }
        }
        found.sort_by(|a, b| a.later_date.cmp(&b.later_date));
        found
    }
}

/// Kilometres driven between `view[index]` and the next older reading of the same car in `view`.
///
/// `view` is any newest-first slice, such as a per-car or date-filtered listing.
#[must_use]
pub fn distance_driven(view: &[OdometerReading], index: usize) -> Option<i64> {
    let reading = view.get(index)?;
    let previous = view
        .get(index + 1..)?
        .iter()
        .find(|r| r.car_id == reading.car_id)?;
    let current = i64::try_from(reading.odometer).ok()?;
    let older = i64::try_from(previous.odometer).ok()?;
    Some(current - older)
}
