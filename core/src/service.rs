use chrono::NaiveDate;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use uuid::Uuid;

use crate::distance::DistanceResolver;
use crate::error::{LogbookError, Result};
use crate::models::{
    DistanceMode, DriveEntry, DriveEntryInput, NewOdometerReading, NewVehicle, OdometerReading,
    UpdateOdometerReading, UpdateUserProfile, UpdateVehicle, UserProfile, Vehicle,
    compute_distance,
};
use crate::odometer::{OdometerAnomaly, OdometerLedger};
use crate::report::{self, PdfReport, PeriodTotal, ReportFilter, ReportSummary, VehicleTotal};
use crate::store::{StateStore, StoreKey};
use crate::trips::TripLedger;
use crate::vehicles::VehicleRegistry;

/// The logbook, fully loaded from its store.
///
/// Every mutation rewrites the affected document in the store before
/// returning. If that write fails the in-memory document is rolled back, so
/// memory never holds state the store did not receive. Unknown ids are
/// reported as `Ok(None)` / `Ok(false)`.
pub struct LogbookService<S: StateStore> {
    store: S,
    vehicles: VehicleRegistry,
    odometer: OdometerLedger,
    trips: TripLedger,
    profile: UserProfile,
}

/// In-memory copy of one document, taken before a mutation.
enum Snapshot {
    Vehicles(VehicleRegistry),
    Odometer(OdometerLedger),
    Trips(TripLedger),
    Profile(UserProfile),
}

impl Snapshot {
    fn key(&self) -> StoreKey {
        match self {
            Snapshot::Vehicles(_) => StoreKey::Vehicles,
            Snapshot::Odometer(_) => StoreKey::OdometerReadings,
            Snapshot::Trips(_) => StoreKey::DriveEntries,
            Snapshot::Profile(_) => StoreKey::UserProfile,
        }
    }
}

fn load_doc<S: StateStore, T: DeserializeOwned>(store: &S, key: StoreKey) -> Result<Option<T>> {
    match store.load(key)? {
        Some(json) => serde_json::from_str(&json)
            .map(Some)
            .map_err(|e| LogbookError::Serialization(format!("{key}: {e}"))),
        None => Ok(None),
    }
}

impl<S: StateStore> LogbookService<S> {
    /// Load all four documents. Missing documents start empty (profile: defaults).
    pub fn open(store: S) -> Result<Self> {
        let vehicles: Vec<Vehicle> = load_doc(&store, StoreKey::Vehicles)?.unwrap_or_default();
        let readings: Vec<OdometerReading> =
            load_doc(&store, StoreKey::OdometerReadings)?.unwrap_or_default();
        let entries: Vec<DriveEntry> =
            load_doc(&store, StoreKey::DriveEntries)?.unwrap_or_default();
        let profile: UserProfile = load_doc(&store, StoreKey::UserProfile)?.unwrap_or_default();
        info!(
            vehicles = vehicles.len(),
            readings = readings.len(),
            entries = entries.len(),
            "loaded logbook"
        );
        Ok(Self {
            store,
            vehicles: VehicleRegistry::from_vec(vehicles),
            odometer: OdometerLedger::from_vec(readings),
            trips: TripLedger::from_vec(entries),
            profile,
        })
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn save_doc<T: Serialize + ?Sized>(store: &mut S, key: StoreKey, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        store.save(key, &json)
    }

    fn snapshot(&self, key: StoreKey) -> Snapshot {
        match key {
            StoreKey::Vehicles => Snapshot::Vehicles(self.vehicles.clone()),
            StoreKey::OdometerReadings => Snapshot::Odometer(self.odometer.clone()),
            StoreKey::DriveEntries => Snapshot::Trips(self.trips.clone()),
            StoreKey::UserProfile => Snapshot::Profile(self.profile.clone()),
        }
    }

    fn restore(&mut self, before: Snapshot) {
        match before {
            Snapshot::Vehicles(v) => self.vehicles = v,
            Snapshot::Odometer(o) => self.odometer = o,
            Snapshot::Trips(t) => self.trips = t,
            Snapshot::Profile(p) => self.profile = p,
        }
    }

    /// Write the document `before` was taken from. On failure the document
    /// is put back the way `before` recorded it.
    fn commit(&mut self, before: Snapshot) -> Result<()> {
        let key = before.key();
        let written = match key {
            StoreKey::Vehicles => Self::save_doc(&mut self.store, key, self.vehicles.list()),
            StoreKey::OdometerReadings => {
                Self::save_doc(&mut self.store, key, self.odometer.all())
            }
            StoreKey::DriveEntries => Self::save_doc(&mut self.store, key, self.trips.list()),
            StoreKey::UserProfile => Self::save_doc(&mut self.store, key, &self.profile),
        };
        if let Err(err) = written {
            warn!(%key, error = %err, "store write failed, rolling back");
            self.restore(before);
            return Err(err);
        }
        Ok(())
    }

    // --- Vehicles ---

    #[must_use]
    pub fn list_vehicles(&self) -> &[Vehicle] {
        self.vehicles.list()
    }

    #[must_use]
    pub fn get_vehicle(&self, id: Uuid) -> Option<&Vehicle> {
        self.vehicles.get(id)
    }

    #[must_use]
    pub fn get_default_vehicle(&self) -> Option<&Vehicle> {
        self.vehicles.get_default()
    }

    #[must_use]
    pub fn find_vehicle_by_plate(&self, plate: &str) -> Option<&Vehicle> {
        self.vehicles.find_by_plate(plate)
    }

    pub fn add_vehicle(&mut self, data: NewVehicle) -> Result<Vehicle> {
        let before = self.snapshot(StoreKey::Vehicles);
        let vehicle = self.vehicles.add_vehicle(data)?;
        self.commit(before)?;
        Ok(vehicle)
    }

    pub fn update_vehicle(&mut self, id: Uuid, update: UpdateVehicle) -> Result<Option<Vehicle>> {
        let before = self.snapshot(StoreKey::Vehicles);
        let updated = self.vehicles.update_vehicle(id, update)?;
        if updated.is_some() {
            self.commit(before)?;
        }
        Ok(updated)
    }

    /// Readings and entry plates that point at the vehicle are left in place.
    pub fn delete_vehicle(&mut self, id: Uuid) -> Result<bool> {
        let before = self.snapshot(StoreKey::Vehicles);
        let deleted = self.vehicles.delete_vehicle(id);
        if deleted {
            self.commit(before)?;
        }
        Ok(deleted)
    }

    pub fn set_default_vehicle(&mut self, id: Uuid) -> Result<bool> {
        let before = self.snapshot(StoreKey::Vehicles);
        let found = self.vehicles.set_default(id);
        self.commit(before)?;
        Ok(found)
    }

    // --- Odometer readings ---

    #[must_use]
    pub fn list_readings(&self) -> &[OdometerReading] {
        self.odometer.all()
    }

    #[must_use]
    pub fn get_reading(&self, id: Uuid) -> Option<&OdometerReading> {
        self.odometer.get(id)
    }

    #[must_use]
    pub fn readings_for(&self, car_id: Uuid) -> Vec<OdometerReading> {
        self.odometer.readings_for(car_id)
    }

    #[must_use]
    pub fn readings_in_range(&self, start: NaiveDate, end: NaiveDate) -> Vec<OdometerReading> {
        self.odometer.readings_in_range(start, end)
    }

    #[must_use]
    pub fn latest_reading_for(&self, car_id: Uuid) -> Option<&OdometerReading> {
        self.odometer.latest_for(car_id)
    }

    /// Record a reading for a registered vehicle, snapshotting its current plate.
    pub fn add_reading(
        &mut self,
        car_id: Uuid,
        date: NaiveDate,
        odometer: u64,
        notes: Option<String>,
    ) -> Result<OdometerReading> {
        let vehicle = self
            .vehicles
            .get(car_id)
            .ok_or_else(|| LogbookError::Validation(format!("No vehicle with id {car_id}")))?;
        let license_plate = vehicle.license_plate.clone();
        let before = self.snapshot(StoreKey::OdometerReadings);
        let reading = self.odometer.add_reading(NewOdometerReading {
            car_id,
            license_plate,
            date,
            odometer,
            notes,
        })?;
        self.commit(before)?;
        Ok(reading)
    }

    pub fn update_reading(
        &mut self,
        id: Uuid,
        update: UpdateOdometerReading,
    ) -> Result<Option<OdometerReading>> {
        let before = self.snapshot(StoreKey::OdometerReadings);
        let updated = self.odometer.update_reading(id, update);
        if updated.is_some() {
            self.commit(before)?;
        }
        Ok(updated)
    }

    pub fn delete_reading(&mut self, id: Uuid) -> Result<bool> {
        let before = self.snapshot(StoreKey::OdometerReadings);
        let deleted = self.odometer.delete_reading(id);
        if deleted {
            self.commit(before)?;
        }
        Ok(deleted)
    }

    #[must_use]
    pub fn odometer_anomalies(&self) -> Vec<OdometerAnomaly> {
        self.odometer.anomalies()
    }

    // --- Drive entries ---

    #[must_use]
    pub fn list_entries(&self) -> &[DriveEntry] {
        self.trips.list()
    }

    #[must_use]
    pub fn get_entry(&self, id: Uuid) -> Option<&DriveEntry> {
        self.trips.get_by_id(id)
    }

    /// Route entries need a resolved, positive distance before they can be stored.
    fn check_route_distance(input: &DriveEntryInput) -> Result<()> {
        if input.distance_mode == DistanceMode::Route && compute_distance(input) <= 0.0 {
            return Err(LogbookError::Validation(
                "Route distance must be greater than 0 km".to_string(),
            ));
        }
        Ok(())
    }

    /// Failures are logged; the entry itself is already stored.
    fn remember_route(&mut self, entry: &DriveEntry) {
        if entry.distance_mode != DistanceMode::Route {
            return;
        }
        if let Err(err) = self.set_default_addresses(&entry.from_address, &entry.to_address) {
            warn!(id = %entry.id, error = %err, "could not remember route addresses");
        }
    }

    pub fn add_entry(&mut self, input: DriveEntryInput) -> Result<DriveEntry> {
        let input = input.normalized()?;
        Self::check_route_distance(&input)?;
        let before = self.snapshot(StoreKey::DriveEntries);
        let entry = self.trips.add_entry(input)?;
        self.commit(before)?;
        self.remember_route(&entry);
        Ok(entry)
    }

    /// Look up the route distance for a route-mode input.
    ///
    /// Odometer-mode inputs are returned unchanged. A failed lookup is an
    /// error; no distance is guessed. Each call owns its lookup from start
    /// to finish, so there is no earlier lookup it could be superseded by.
    /// Overlapping lookups for an address pair being edited go through
    /// [`crate::distance::RouteDistanceTracker`].
    pub fn resolve_route(
        &self,
        input: DriveEntryInput,
        resolver: &dyn DistanceResolver,
    ) -> Result<DriveEntryInput> {
        let mut input = input.normalized()?;
        if input.distance_mode != DistanceMode::Route {
            return Ok(input);
        }

        match resolver.resolve(&input.from_address, &input.to_address) {
            Ok(km) => {
                input.resolved_km = Some(km);
                Ok(input)
            }
            Err(err) => {
                let msg = format!("{err:#}");
                warn!(
                    origin = %input.from_address,
                    destination = %input.to_address,
                    error = %msg,
                    "distance lookup failed"
                );
                Err(LogbookError::DistanceResolution(msg))
            }
        }
    }

    /// Resolve the route distance, then store the entry. Nothing is written if the lookup fails.
    pub fn resolve_and_add_entry(
        &mut self,
        input: DriveEntryInput,
        resolver: &dyn DistanceResolver,
    ) -> Result<DriveEntry> {
        let input = self.resolve_route(input, resolver)?;
        self.add_entry(input)
    }

    pub fn update_entry(&mut self, id: Uuid, input: DriveEntryInput) -> Result<Option<DriveEntry>> {
        let input = input.normalized()?;
        Self::check_route_distance(&input)?;
        let before = self.snapshot(StoreKey::DriveEntries);
        let updated = self.trips.update_entry(id, input)?;
        if let Some(entry) = &updated {
            self.commit(before)?;
            self.remember_route(entry);
        }
        Ok(updated)
    }

    pub fn resolve_and_update_entry(
        &mut self,
        id: Uuid,
        input: DriveEntryInput,
        resolver: &dyn DistanceResolver,
    ) -> Result<Option<DriveEntry>> {
        if self.trips.get_by_id(id).is_none() {
            return Ok(None);
        }
        let input = self.resolve_route(input, resolver)?;
        self.update_entry(id, input)
    }

    pub fn delete_entry(&mut self, id: Uuid) -> Result<bool> {
        let before = self.snapshot(StoreKey::DriveEntries);
        let deleted = self.trips.delete_entry(id);
        if deleted {
            self.commit(before)?;
        }
        Ok(deleted)
    }

    pub fn duplicate_entry(
        &mut self,
        source_id: Uuid,
        new_date: NaiveDate,
    ) -> Result<Option<DriveEntry>> {
        let before = self.snapshot(StoreKey::DriveEntries);
        let copy = self.trips.duplicate_entry(source_id, new_date)?;
        if copy.is_some() {
            self.commit(before)?;
        }
        Ok(copy)
    }

    // --- Profile ---

    #[must_use]
    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn save_profile(&mut self, profile: UserProfile) -> Result<()> {
        let before = self.snapshot(StoreKey::UserProfile);
        self.profile = profile;
        self.commit(before)
    }

    pub fn update_profile(&mut self, update: UpdateUserProfile) -> Result<UserProfile> {
        let before = self.snapshot(StoreKey::UserProfile);
        self.profile.apply(update);
        self.commit(before)?;
        Ok(self.profile.clone())
    }

    pub fn set_default_addresses(&mut self, from: &str, to: &str) -> Result<()> {
        let clean = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        let before = self.snapshot(StoreKey::UserProfile);
        self.profile.default_from_address = clean(from);
        self.profile.default_to_address = clean(to);
        self.commit(before)
    }

    // --- Reports ---

    #[must_use]
    pub fn filtered_entries(&self, filter: &ReportFilter) -> Vec<&DriveEntry> {
        filter.apply(self.trips.list())
    }

    #[must_use]
    pub fn report_summary(&self, filter: &ReportFilter) -> ReportSummary {
        report::summarize(&self.filtered_entries(filter))
    }

    #[must_use]
    pub fn monthly_totals(&self, filter: &ReportFilter) -> Vec<PeriodTotal> {
        report::monthly_totals(&self.filtered_entries(filter))
    }

    #[must_use]
    pub fn yearly_totals(&self, filter: &ReportFilter) -> Vec<PeriodTotal> {
        report::yearly_totals(&self.filtered_entries(filter))
    }

    #[must_use]
    pub fn vehicle_totals(&self, filter: &ReportFilter) -> Vec<VehicleTotal> {
        report::vehicle_totals(&self.filtered_entries(filter), self.vehicles.list())
    }

    pub fn export_csv(&self, filter: &ReportFilter) -> Result<String> {
        report::generate_csv(&self.filtered_entries(filter))
    }

    #[must_use]
    pub fn pdf_report(&self, filter: &ReportFilter, generated_on: NaiveDate) -> PdfReport {
        report::build_pdf_report(
            &self.profile,
            &self.filtered_entries(filter),
            filter,
            generated_on,
        )
    }
}
