use chrono::Utc;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{NewVehicle, UpdateVehicle, Vehicle, normalize_plate, validate_license_plate};

/// The set of registered vehicles, newest first. At most one is the default.
#[derive(Debug, Clone, Default)]
pub struct VehicleRegistry {
    vehicles: Vec<Vehicle>,
}

impl VehicleRegistry {
    #[must_use]
    pub fn from_vec(mut vehicles: Vec<Vehicle>) -> Self {
        vehicles.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Self { vehicles }
    }

    #[must_use]
    pub fn list(&self) -> &[Vehicle] {
        &self.vehicles
    }

    pub fn add_vehicle(&mut self, data: NewVehicle) -> Result<Vehicle> {
        let license_plate = validate_license_plate(&data.license_plate)?;
        let vehicle = Vehicle {
            id: Uuid::new_v4(),
            license_plate,
            make: clean(data.make),
            model: clean(data.model),
            color: clean(data.color),
            is_default: false,
            created_at: Utc::now(),
        };
        self.vehicles.insert(0, vehicle.clone());
        self.vehicles
            .sort_by(|a, b| b.created_at.cmp(&a.created_at));
        debug!(id = %vehicle.id, plate = %vehicle.license_plate, "added vehicle");

        if data.is_default {
            self.set_default(vehicle.id);
            return Ok(self.get(vehicle.id).cloned().unwrap_or(vehicle));
        }
        Ok(vehicle)
    }

    /// Merge the given fields. Unknown ids are ignored and yield `None`.
    pub fn update_vehicle(&mut self, id: Uuid, update: UpdateVehicle) -> Result<Option<Vehicle>> {
        let Some(vehicle) = self.vehicles.iter_mut().find(|v| v.id == id) else {
            return Ok(None);
        };
        let plate = update
            .license_plate
            .as_deref()
            .map(validate_license_plate)
            .transpose()?;
        if let Some(plate) = plate {
            vehicle.license_plate = plate;
        }
        if let Some(make) = update.make {
            vehicle.make = clean(make);
        }
        if let Some(model) = update.model {
            vehicle.model = clean(model);
        }
        if let Some(color) = update.color {
            vehicle.color = clean(color);
        }
        debug!(%id, "updated vehicle");
        Ok(Some(vehicle.clone()))
    }

    pub fn delete_vehicle(&mut self, id: Uuid) -> bool {
        let before = self.vehicles.len();
        self.vehicles.retain(|v| v.id != id);
        before != self.vehicles.len()
    }

    /// Mark `id` as the default and clear every other vehicle in the same pass.
    ///
    /// An unknown id still clears all defaults, leaving none.
    pub fn set_default(&mut self, id: Uuid) -> bool {
        let mut found = false;
        for vehicle in &mut self.vehicles {
            vehicle.is_default = vehicle.id == id;
            found |= vehicle.is_default;
        }
        if !found {
            warn!(%id, "set_default on unknown vehicle cleared all defaults");
        }
        found
    }

    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.id == id)
    }

    #[must_use]
    pub fn get_default(&self) -> Option<&Vehicle> {
        self.vehicles.iter().find(|v| v.is_default)
    }

    #[must_use]
    pub fn find_by_plate(&self, plate: &str) -> Option<&Vehicle> {
        let normalized = normalize_plate(plate);
        self.vehicles.iter().find(|v| v.license_plate == normalized)
    }
}

fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
