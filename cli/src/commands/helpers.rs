use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use korjournal_core::models::{Category, DriveEntry, OdometerReading, Vehicle};
use korjournal_core::odometer::distance_driven;
use korjournal_core::report::ReportFilter;

use super::Logbook;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => parse_date_str(&s),
    }
}

pub(crate) fn parse_date_str(s: &str) -> Result<NaiveDate> {
    match s.trim() {
        "today" => Ok(Local::now().date_naive()),
        "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
        "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
        other => NaiveDate::parse_from_str(other, "%Y-%m-%d").with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

pub(crate) fn parse_optional_date(s: Option<&str>) -> Result<Option<NaiveDate>> {
    s.map(parse_date_str).transpose()
}

pub(crate) fn build_filter(
    from: Option<&str>,
    to: Option<&str>,
    car: Option<String>,
    category: Option<&str>,
) -> Result<ReportFilter> {
    let filter = ReportFilter {
        from: parse_optional_date(from)?,
        to: parse_optional_date(to)?,
        license_plate: car,
        category: category.map(str::parse::<Category>).transpose()?,
    };
    if let (Some(from), Some(to)) = (filter.from, filter.to) {
        if from > to {
            bail!("--from {from} is after --to {to}");
        }
    }
    Ok(filter)
}

/// Find a vehicle by plate, or fall back to the default vehicle.
pub(crate) fn resolve_vehicle<'a>(svc: &'a Logbook, plate: Option<&str>) -> Result<&'a Vehicle> {
    match plate {
        Some(p) => svc
            .find_vehicle_by_plate(p)
            .with_context(|| format!("No vehicle with plate '{}'", p.trim().to_uppercase())),
        None => svc.get_default_vehicle().context(
            "No default vehicle. Pass --car <PLATE> or run `korjournal vehicle default <PLATE>`",
        ),
    }
}

/// Match a full id or a unique prefix of one.
pub(crate) fn resolve_id<I>(ids: I, query: &str, what: &str) -> Result<Uuid>
where
    I: IntoIterator<Item = Uuid>,
{
    let query = query.trim().to_lowercase();
    if let Ok(id) = Uuid::parse_str(&query) {
        return Ok(id);
    }
    if query.len() < 4 {
        bail!("'{query}' is too short; give at least 4 characters of the {what} id");
    }
    let matches: Vec<Uuid> = ids
        .into_iter()
        .filter(|id| id.to_string().starts_with(&query))
        .collect();
    match matches.as_slice() {
        [id] => Ok(*id),
        [] => bail!("No {what} with id '{query}'"),
        _ => bail!("Id '{query}' matches {} {what}s; use more characters", matches.len()),
    }
}

pub(crate) fn short_id(id: Uuid) -> String {
    id.to_string()[..8].to_string()
}

pub(crate) fn print_vehicle_table(vehicles: &[Vehicle]) {
    #[derive(Tabled)]
    struct VehicleRow {
        #[tabled(rename = "Plate")]
        plate: String,
        #[tabled(rename = "Vehicle")]
        description: String,
        #[tabled(rename = "Color")]
        color: String,
        #[tabled(rename = "Default")]
        default: String,
        #[tabled(rename = "Added")]
        added: String,
    }

    let rows: Vec<VehicleRow> = vehicles
        .iter()
        .map(|v| VehicleRow {
            plate: v.license_plate.clone(),
            description: v.description(),
            color: v.color.clone().unwrap_or_default(),
            default: if v.is_default { "*".to_string() } else { String::new() },
            added: v.created_at.format("%Y-%m-%d").to_string(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_reading_table(readings: &[OdometerReading]) {
    #[derive(Tabled)]
    struct ReadingRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Plate")]
        plate: String,
        #[tabled(rename = "Odometer (km)")]
        odometer: u64,
        #[tabled(rename = "Driven (km)")]
        driven: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let rows: Vec<ReadingRow> = readings
        .iter()
        .enumerate()
        .map(|(i, r)| ReadingRow {
            id: short_id(r.id),
            date: r.date.format("%Y-%m-%d").to_string(),
            plate: r.license_plate.clone(),
            odometer: r.odometer,
            driven: distance_driven(readings, i).map_or("-".into(), |d| format!("{d:+}")),
            notes: truncate(r.notes.as_deref().unwrap_or_default(), 30),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_entry_table(entries: &[&DriveEntry]) {
    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Route")]
        route: String,
        #[tabled(rename = "Category")]
        category: String,
        #[tabled(rename = "Purpose")]
        purpose: String,
        #[tabled(rename = "Km")]
        distance: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .map(|e| EntryRow {
            id: short_id(e.id),
            date: e.date.format("%Y-%m-%d").to_string(),
            time: if e.start_time.is_empty() && e.end_time.is_empty() {
                String::new()
            } else {
                format!("{}-{}", e.start_time, e.end_time)
            },
            route: truncate(&e.route_label(), 40),
            category: e.category.to_string(),
            purpose: truncate(&e.purpose, 30),
            distance: format!("{:.1}", e.distance),
            amount: format!("{:.2}", e.amount()),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(6..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_forms() {
        let today = Local::now().date_naive();
        let day = chrono::Duration::days(1);
        assert_eq!(parse_date(None).unwrap(), today);
        for (input, expected) in [
            ("today", today),
            (" yesterday ", today - day),
            ("tomorrow", today + day),
            ("2024-02-29", NaiveDate::from_ymd_opt(2024, 2, 29).unwrap()),
        ] {
            assert_eq!(parse_date_str(input).unwrap(), expected, "{input}");
        }
    }

    #[test]
    fn test_parse_date_rejects_garbage() {
        assert!(parse_date(Some("2023-02-29".to_string())).is_err());
        assert!(parse_date_str("15/01/2024").is_err());
        assert_eq!(parse_optional_date(None).unwrap(), None);
    }

    #[test]
    fn test_build_filter() {
        let filter =
            build_filter(Some("2024-01-01"), Some("2024-01-31"), None, Some("övrigt")).unwrap();
        assert_eq!(filter.from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(filter.category, Some(Category::Other));
        assert!(build_filter(Some("2024-02-01"), Some("2024-01-01"), None, None).is_err());
        assert!(build_filter(None, None, None, Some("privat")).is_err());
    }

    #[test]
    fn test_resolve_id_prefix() {
        let a = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("a1b2ffff-0000-4000-8000-000000000002").unwrap();
        assert_eq!(resolve_id([a, b], "a1b2c3", "trip").unwrap(), a);
        assert_eq!(resolve_id([a, b], &b.to_string(), "trip").unwrap(), b);
        assert!(resolve_id([a, b], "a1b2", "trip").is_err());
        assert!(resolve_id([a, b], "ffff0000", "trip").is_err());
        assert!(resolve_id([a, b], "a1", "trip").is_err());
    }

    #[test]
    fn test_short_id() {
        let id = Uuid::parse_str("a1b2c3d4-0000-4000-8000-000000000001").unwrap();
        assert_eq!(short_id(id), "a1b2c3d4");
    }

    #[test]
    fn test_truncate_utf8() {
        assert_eq!(truncate("Göteborg", 10), "Göteborg");
        assert_eq!(truncate("Storgatan 12, Göteborg", 10), "Storgat...");
    }

    #[test]
    fn test_no_neg_zero() {
        assert!(no_neg_zero(-0.0).is_sign_positive());
        assert!(no_neg_zero(-2.5).is_sign_negative());
    }
}
