use anyhow::{Context, Result};

use korjournal_core::models::{NewVehicle, UpdateVehicle};

use super::Logbook;
use super::helpers::{print_vehicle_table, resolve_vehicle};

/// Empty string clears an optional field.
fn optional_field(value: Option<String>) -> Option<Option<String>> {
    value.map(|v| Some(v).filter(|s| !s.trim().is_empty()))
}

pub(crate) fn cmd_vehicle_add(
    svc: &mut Logbook,
    plate: &str,
    make: Option<String>,
    model: Option<String>,
    color: Option<String>,
    is_default: bool,
    json: bool,
) -> Result<()> {
    let vehicle = svc.add_vehicle(NewVehicle {
        license_plate: plate.to_string(),
        make,
        model,
        color,
        is_default,
    })?;

    if json {
        println!("{}", serde_json::to_string_pretty(&vehicle)?);
    } else {
        let desc = vehicle.description();
        let suffix = if vehicle.is_default { " (default)" } else { "" };
        if desc.is_empty() {
            println!("Added {}{suffix}", vehicle.license_plate);
        } else {
            println!("Added {} {desc}{suffix}", vehicle.license_plate);
        }
    }
    Ok(())
}

pub(crate) fn cmd_vehicle_list(svc: &Logbook, json: bool) -> Result<()> {
    let vehicles = svc.list_vehicles();
    if json {
        println!("{}", serde_json::to_string_pretty(vehicles)?);
    } else if vehicles.is_empty() {
        eprintln!("No vehicles yet. Use `korjournal vehicle add <PLATE>` to register one.");
    } else {
        print_vehicle_table(vehicles);
    }
    Ok(())
}

pub(crate) fn cmd_vehicle_show(svc: &Logbook, plate: &str, json: bool) -> Result<()> {
    let vehicle = resolve_vehicle(svc, Some(plate))?;
    let latest = svc.latest_reading_for(vehicle.id);

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "vehicle": vehicle,
                "latest_reading": latest,
            }))?
        );
        return Ok(());
    }

    print_vehicle_table(std::slice::from_ref(vehicle));
    match latest {
        Some(r) => println!(
            "Latest reading: {} km on {}",
            r.odometer,
            r.date.format("%Y-%m-%d")
        ),
        None => println!("No odometer readings"),
    }
    Ok(())
}

pub(crate) fn cmd_vehicle_update(
    svc: &mut Logbook,
    plate: &str,
    new_plate: Option<String>,
    make: Option<String>,
    model: Option<String>,
    color: Option<String>,
    json: bool,
) -> Result<()> {
    let id = resolve_vehicle(svc, Some(plate))?.id;
    let vehicle = svc
        .update_vehicle(
            id,
            UpdateVehicle {
                license_plate: new_plate,
                make: optional_field(make),
                model: optional_field(model),
                color: optional_field(color),
            },
        )?
        .context("Vehicle disappeared during update")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&vehicle)?);
    } else {
        println!("Updated {}", vehicle.license_plate);
    }
    Ok(())
}

pub(crate) fn cmd_vehicle_delete(svc: &mut Logbook, plate: &str, json: bool) -> Result<()> {
    let vehicle = resolve_vehicle(svc, Some(plate))?;
    let (id, plate) = (vehicle.id, vehicle.license_plate.clone());
    svc.delete_vehicle(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": id, "license_plate": plate }));
    } else {
        println!("Deleted {plate}. Its odometer readings are kept.");
    }
    Ok(())
}

pub(crate) fn cmd_vehicle_default(svc: &mut Logbook, plate: &str, json: bool) -> Result<()> {
    let id = resolve_vehicle(svc, Some(plate))?.id;
    svc.set_default_vehicle(id)?;
    let vehicle = svc.get_vehicle(id).context("Vehicle disappeared")?;

    if json {
        println!("{}", serde_json::to_string_pretty(vehicle)?);
    } else {
        println!("{} is now the default vehicle", vehicle.license_plate);
    }
    Ok(())
}
