use anyhow::Result;
use tabled::{Table, Tabled, settings::Style};

use super::Logbook;
use super::helpers::{
    parse_date, parse_optional_date, print_reading_table, resolve_id, resolve_vehicle,
};

pub(crate) fn cmd_odometer_add(
    svc: &mut Logbook,
    value: u64,
    car: Option<&str>,
    date: Option<String>,
    notes: Option<String>,
    json: bool,
) -> Result<()> {
    let car_id = resolve_vehicle(svc, car)?.id;
    let date = parse_date(date)?;
    let previous = svc.latest_reading_for(car_id).map(|r| r.odometer);

    let reading = svc.add_reading(car_id, date, value, notes)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&reading)?);
    } else {
        println!(
            "Logged {} km for {} on {}",
            reading.odometer,
            reading.license_plate,
            reading.date.format("%Y-%m-%d")
        );
        if let Some(prev) = previous.filter(|p| *p <= reading.odometer) {
            println!("  +{} km since last reading", reading.odometer - prev);
        }
        if let Some(ref n) = reading.notes {
            println!("  Notes: {n}");
        }
    }
    Ok(())
}

pub(crate) fn cmd_odometer_list(
    svc: &Logbook,
    car: Option<&str>,
    from: Option<&str>,
    to: Option<&str>,
    json: bool,
) -> Result<()> {
    let from = parse_optional_date(from)?;
    let to = parse_optional_date(to)?;

    let mut readings = match car {
        Some(plate) => svc.readings_for(resolve_vehicle(svc, Some(plate))?.id),
        None => svc.list_readings().to_vec(),
    };
    readings.retain(|r| from.is_none_or(|f| r.date >= f) && to.is_none_or(|t| r.date <= t));

    if json {
        println!("{}", serde_json::to_string_pretty(&readings)?);
    } else if readings.is_empty() {
        eprintln!("No odometer readings found");
    } else {
        print_reading_table(&readings);
    }
    Ok(())
}

pub(crate) fn cmd_odometer_delete(svc: &mut Logbook, id: &str, json: bool) -> Result<()> {
    let ids: Vec<_> = svc.list_readings().iter().map(|r| r.id).collect();
    let id = resolve_id(ids, id, "reading")?;
    let deleted = svc.delete_reading(id)?;

    if json {
        println!("{}", serde_json::json!({ "deleted": deleted, "id": id }));
    } else if deleted {
        println!("Deleted reading {id}");
    } else {
        eprintln!("No reading with id {id}");
    }
    Ok(())
}

/// Report readings where the odometer went backwards between adjacent dates.
pub(crate) fn cmd_odometer_check(svc: &Logbook, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct AnomalyRow {
        #[tabled(rename = "Plate")]
        plate: String,
        #[tabled(rename = "Earlier")]
        earlier: String,
        #[tabled(rename = "Later")]
        later: String,
        #[tabled(rename = "Drop (km)")]
        drop: u64,
    }

    let anomalies = svc.odometer_anomalies();
    if json {
        println!("{}", serde_json::to_string_pretty(&anomalies)?);
        return Ok(());
    }
    if anomalies.is_empty() {
        println!("All odometer readings are consistent");
        return Ok(());
    }

    let rows: Vec<AnomalyRow> = anomalies
        .iter()
        .map(|a| AnomalyRow {
            plate: a.license_plate.clone(),
            earlier: format!("{} km on {}", a.earlier_odometer, a.earlier_date),
            later: format!("{} km on {}", a.later_odometer, a.later_date),
            drop: a.earlier_odometer.saturating_sub(a.later_odometer),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));
    eprintln!("{} inconsistent pair(s) found", anomalies.len());
    Ok(())
}
