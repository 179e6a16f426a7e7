use anyhow::{Context, Result, bail};
use clap::Args;
use tracing::debug;
use uuid::Uuid;

use korjournal_core::models::{DistanceMode, DriveEntry, DriveEntryInput};
use korjournal_core::report::ReportFilter;

use crate::distance::DistanceClient;

use super::Logbook;
use super::helpers::{parse_date, parse_optional_date, print_entry_table, resolve_id, short_id};

/// Trip fields shared by `trip add` and `trip update`.
#[derive(Debug, Default, Args)]
pub(crate) struct TripArgs {
    /// Date (YYYY-MM-DD, today, yesterday)
    #[arg(long, short)]
    pub date: Option<String>,
    /// Odometer at departure, km
    #[arg(long)]
    pub start_odometer: Option<f64>,
    /// Odometer on arrival, km
    #[arg(long)]
    pub end_odometer: Option<f64>,
    /// Departure time (HH:MM)
    #[arg(long)]
    pub start_time: Option<String>,
    /// Arrival time (HH:MM)
    #[arg(long)]
    pub end_time: Option<String>,
    /// Departure address; defaults to the last one used
    #[arg(long)]
    pub from: Option<String>,
    /// Destination address; defaults to the last one used
    #[arg(long)]
    pub to: Option<String>,
    /// Count the route twice
    #[arg(long)]
    pub roundtrip: bool,
    /// One-way distance in km, skipping the lookup
    #[arg(long)]
    pub km: Option<f64>,
    /// Purpose of the trip
    #[arg(long, short)]
    pub purpose: Option<String>,
    /// Tjänsteresa or Övrigt
    #[arg(long, short)]
    pub category: Option<String>,
    /// License plate; defaults to the default vehicle
    #[arg(long)]
    pub car: Option<String>,
    /// Vehicle type label
    #[arg(long)]
    pub vehicle_type: Option<String>,
}

fn print_entry(entry: &DriveEntry, verb: &str) {
    println!(
        "{verb} trip {} on {}: {:.1} km, {:.2} kr",
        short_id(entry.id),
        entry.date.format("%Y-%m-%d"),
        entry.distance,
        entry.amount()
    );
    let route = entry.route_label();
    if !route.is_empty() {
        println!("  Route: {route}");
    }
    if !entry.purpose.is_empty() {
        println!("  Purpose: {}", entry.purpose);
    }
}

fn find_entry(svc: &Logbook, query: &str) -> Result<Uuid> {
    let ids: Vec<Uuid> = svc.list_entries().iter().map(|e| e.id).collect();
    resolve_id(ids, query, "trip")
}

/// Build the input for a new trip. Odometer values select odometer mode,
/// otherwise the trip is a route between two addresses. Without `--purpose`
/// the profile's purpose is used.
fn new_input(svc: &Logbook, args: TripArgs) -> Result<DriveEntryInput> {
    let date = parse_date(args.date)?;
    let profile = svc.profile();
    let mut input = match (args.start_odometer, args.end_odometer) {
        (Some(start), Some(end)) => DriveEntryInput::odometer(date, start, end),
        (Some(_), None) | (None, Some(_)) => {
            bail!("Give both --start-odometer and --end-odometer")
        }
        (None, None) => {
            let from = args
                .from
                .or_else(|| profile.default_from_address.clone())
                .context("Give odometer values, or --from and --to for a route trip")?;
            let to = args
                .to
                .or_else(|| profile.default_to_address.clone())
                .context("Missing --to for the route trip")?;
            DriveEntryInput::route(date, &from, &to, args.roundtrip, args.km)
        }
    };

    input.start_time = args.start_time.unwrap_or_default();
    input.end_time = args.end_time.unwrap_or_default();
    input.purpose = args.purpose.unwrap_or_else(|| profile.purpose.clone());
    if let Some(vt) = args.vehicle_type {
        input.vehicle_type = vt;
    }
    if let Some(c) = args.category {
        input.category = c.parse()?;
    }
    input.license_plate = args
        .car
        .or_else(|| svc.get_default_vehicle().map(|v| v.license_plate.clone()));
    Ok(input)
}

pub(crate) fn cmd_trip_add(
    svc: &mut Logbook,
    client: &DistanceClient,
    args: TripArgs,
    json: bool,
) -> Result<()> {
    let input = new_input(svc, args)?;
    let needs_lookup = input.distance_mode == DistanceMode::Route && input.resolved_km.is_none();

    let entry = if needs_lookup {
        debug!(from = %input.from_address, to = %input.to_address, "looking up route distance");
        tokio::task::block_in_place(|| svc.resolve_and_add_entry(input, client))?
    } else {
        svc.add_entry(input)?
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry(&entry, "Logged");
    }
    Ok(())
}

pub(crate) fn cmd_trip_list(svc: &Logbook, filter: &ReportFilter, json: bool) -> Result<()> {
    let entries = svc.filtered_entries(filter);

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
    } else if entries.is_empty() {
        eprintln!("No trips found");
    } else {
        print_entry_table(&entries);
    }
    Ok(())
}

pub(crate) fn cmd_trip_show(svc: &Logbook, id: &str, json: bool) -> Result<()> {
    let id = find_entry(svc, id)?;
    let entry = svc.get_entry(id).context("Trip not found")?;

    if json {
        println!("{}", serde_json::to_string_pretty(entry)?);
        return Ok(());
    }

    println!("Trip {}", entry.id);
    println!("  Date:      {}", entry.date.format("%Y-%m-%d"));
    if !entry.start_time.is_empty() || !entry.end_time.is_empty() {
        println!("  Time:      {}-{}", entry.start_time, entry.end_time);
    }
    match entry.distance_mode {
        DistanceMode::Odometer => println!(
            "  Odometer:  {} - {}",
            entry.start_odometer, entry.end_odometer
        ),
        DistanceMode::Route => {
            println!("  Route:     {}", entry.route_label());
            if let Some(km) = entry.resolved_km {
                println!("  One way:   {km:.1} km");
            }
        }
    }
    println!("  Distance:  {:.1} km", entry.distance);
    println!("  Amount:    {:.2} kr", entry.amount());
    println!("  Category:  {}", entry.category);
    println!("  Purpose:   {}", entry.purpose);
    println!("  Vehicle:   {}", entry.vehicle_type);
    if let Some(ref plate) = entry.license_plate {
        println!("  Plate:     {plate}");
    }
    Ok(())
}

pub(crate) fn cmd_trip_delete(svc: &mut Logbook, id: &str, json: bool) -> Result<()> {
    let id = find_entry(svc, id)?;
    let deleted = svc.delete_entry(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "id": id }));
    } else if deleted {
        println!("Deleted trip {}", short_id(id));
    } else {
        eprintln!("No trip with id {id}");
    }
    Ok(())
}

pub(crate) fn cmd_trip_duplicate(
    svc: &mut Logbook,
    id: &str,
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let id = find_entry(svc, id)?;
    let date = parse_date(date)?;
    let copy = svc.duplicate_entry(id, date)?.context("Trip not found")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&copy)?);
    } else {
        print_entry(&copy, "Copied to");
    }
    Ok(())
}

/// Overlay the given fields on an existing trip. Changing an address of a
/// route trip looks the distance up again unless `--km` is given.
pub(crate) fn cmd_trip_update(
    svc: &mut Logbook,
    client: &DistanceClient,
    id: &str,
    args: TripArgs,
    json: bool,
) -> Result<()> {
    let id = find_entry(svc, id)?;
    let mut input = svc.get_entry(id).context("Trip not found")?.input();

    if let Some(date) = parse_optional_date(args.date.as_deref())? {
        input.date = date;
    }
    if let Some(start) = args.start_odometer {
        input.start_odometer = start;
    }
    if let Some(end) = args.end_odometer {
        input.end_odometer = end;
    }
    if let Some(t) = args.start_time {
        input.start_time = t;
    }
    if let Some(t) = args.end_time {
        input.end_time = t;
    }
    let address_changed = args.from.is_some() || args.to.is_some();
    if let Some(from) = args.from {
        input.from_address = from;
    }
    if let Some(to) = args.to {
        input.to_address = to;
    }
    if args.roundtrip {
        input.roundtrip = true;
    }
    if let Some(p) = args.purpose {
        input.purpose = p;
    }
    if let Some(c) = args.category {
        input.category = c.parse()?;
    }
    if let Some(plate) = args.car {
        input.license_plate = Some(plate);
    }
    if let Some(vt) = args.vehicle_type {
        input.vehicle_type = vt;
    }
    if args.km.is_some() {
        input.resolved_km = args.km;
    } else if address_changed {
        input.resolved_km = None;
    }

    let needs_lookup = input.distance_mode == DistanceMode::Route && input.resolved_km.is_none();
    let updated = if needs_lookup {
        tokio::task::block_in_place(|| svc.resolve_and_update_entry(id, input, client))?
    } else {
        svc.update_entry(id, input)?
    };
    let updated = updated.context("Trip not found")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&updated)?);
    } else {
        print_entry(&updated, "Updated");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use korjournal_core::LogbookService;
    use korjournal_core::models::{Category, NewVehicle};
    use korjournal_core::store::SqliteStore;

    fn logbook() -> Logbook {
        LogbookService::open(SqliteStore::open_in_memory().unwrap()).unwrap()
    }

    #[test]
    fn test_new_input_odometer_mode() {
        let svc = logbook();
        let args = TripArgs {
            date: Some("2024-03-01".to_string()),
            start_odometer: Some(1000.0),
            end_odometer: Some(1042.0),
            purpose: Some("Kundmöte".to_string()),
            category: Some("övrigt".to_string()),
            ..TripArgs::default()
        };
        let input = new_input(&svc, args).unwrap();
        assert_eq!(input.distance_mode, DistanceMode::Odometer);
        assert_eq!(input.end_odometer, 1042.0);
        assert_eq!(input.category, Category::Other);
        assert_eq!(input.license_plate, None);
    }

    #[test]
    fn test_new_input_falls_back_to_profile_purpose() {
        let svc = logbook();
        let args = TripArgs {
            start_odometer: Some(10.0),
            end_odometer: Some(20.0),
            ..TripArgs::default()
        };
        let input = new_input(&svc, args).unwrap();
        assert_eq!(input.purpose, "Milersättning");
    }

    #[test]
    fn test_new_input_requires_both_odometer_values() {
        let svc = logbook();
        let args = TripArgs {
            start_odometer: Some(1000.0),
            ..TripArgs::default()
        };
        assert!(new_input(&svc, args).is_err());
    }

    #[test]
    fn test_new_input_route_uses_remembered_addresses() {
        let mut svc = logbook();
        svc.set_default_addresses("Göteborg", "Borås").unwrap();
        let input = new_input(&svc, TripArgs::default()).unwrap();
        assert_eq!(input.distance_mode, DistanceMode::Route);
        assert_eq!(input.from_address, "Göteborg");
        assert_eq!(input.to_address, "Borås");
        assert_eq!(input.resolved_km, None);
    }

    #[test]
    fn test_new_input_route_without_addresses_fails() {
        let svc = logbook();
        assert!(new_input(&svc, TripArgs::default()).is_err());
    }

    #[test]
    fn test_new_input_defaults_to_default_vehicle() {
        let mut svc = logbook();
        svc.add_vehicle(NewVehicle {
            license_plate: "abc123".to_string(),
            is_default: true,
            ..NewVehicle::default()
        })
        .unwrap();
        let args = TripArgs {
            start_odometer: Some(10.0),
            end_odometer: Some(20.0),
            ..TripArgs::default()
        };
        let input = new_input(&svc, args).unwrap();
        assert_eq!(input.license_plate.as_deref(), Some("ABC123"));
    }
}
