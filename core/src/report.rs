//! Read-only aggregation over drive entries: totals, per-category and
//! per-period breakdowns, the CSV export and the PDF report payload.
//!
//! Distances are summed raw, then rounded to one decimal. Amounts are always
//! computed from the rounded distance so every figure matches to the cent.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{LogbookError, Result};
use crate::models::{
    Category, DriveEntry, RATE_PER_KM, UserProfile, Vehicle, amount_for, normalize_plate, round_to,
};

pub const CSV_HEADER: [&str; 8] = [
    "Datum",
    "Starttid",
    "Sluttid",
    "Start mätarställning",
    "Stop mätarställning",
    "Sträcka",
    "Syfte",
    "Ort",
];

const BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportFilter {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub license_plate: Option<String>,
    pub category: Option<Category>,
}

impl ReportFilter {
    #[must_use]
    pub fn matches(&self, entry: &DriveEntry) -> bool {
        if self.from.is_some_and(|from| entry.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| entry.date > to) {
            return false;
        }
        if self.category.is_some_and(|c| entry.category != c) {
            return false;
        }
        if let Some(plate) = &self.license_plate {
            let wanted = normalize_plate(plate);
            if entry.license_plate.as_deref() != Some(wanted.as_str()) {
                return false;
            }
        }
        true
    }

    #[must_use]
    pub fn apply<'a>(&self, entries: &'a [DriveEntry]) -> Vec<&'a DriveEntry> {
        entries.iter().filter(|e| self.matches(e)).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryTotal {
    pub category: Category,
    pub entries: usize,
    pub distance: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct OdometerRange {
    pub min_start: f64,
    pub max_end: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodTotal {
    /// `YYYY-MM` for months, `YYYY` for years.
    pub period: String,
    pub entries: usize,
    pub distance: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleTotal {
    pub license_plate: Option<String>,
    /// Make and model from the registry, when the plate is still registered.
    pub description: Option<String>,
    pub entries: usize,
    pub distance: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportSummary {
    pub entry_count: usize,
    pub total_distance: f64,
    pub total_amount: f64,
    pub rate_per_km: f64,
    pub by_category: Vec<CategoryTotal>,
    pub odometer_range: OdometerRange,
}

/// One row of the PDF line-item table, in export column order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineItem {
    pub date: NaiveDate,
    pub route: String,
    pub category: Category,
    pub purpose: String,
    pub distance: f64,
    pub amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfReport {
    pub title: String,
    pub generated_on: NaiveDate,
    pub filter: ReportFilter,
    pub profile: UserProfile,
    pub items: Vec<LineItem>,
    pub summary: ReportSummary,
}

fn rounded_distance<'a>(entries: impl IntoIterator<Item = &'a DriveEntry>) -> (usize, f64) {
    let (count, sum) = entries
        .into_iter()
        .fold((0, 0.0), |(n, sum), e| (n + 1, sum + e.distance));
    (count, round_to(sum, 1))
}

#[must_use]
pub fn category_totals(entries: &[&DriveEntry]) -> Vec<CategoryTotal> {
    Category::ALL
        .iter()
        .map(|&category| {
            let (count, distance) =
                rounded_distance(entries.iter().copied().filter(|e| e.category == category));
            CategoryTotal {
                category,
                entries: count,
                distance,
                amount: amount_for(distance),
            }
        })
        .collect()
}

/// `min(start_odometer)` and `max(end_odometer)` over the entries, 0/0 when empty.
#[must_use]
pub fn odometer_range(entries: &[&DriveEntry]) -> OdometerRange {
    if entries.is_empty() {
        return OdometerRange::default();
    }
    let min_start = entries
        .iter()
        .map(|e| e.start_odometer)
        .fold(f64::INFINITY, f64::min);
    let max_end = entries
        .iter()
        .map(|e| e.end_odometer)
        .fold(f64::NEG_INFINITY, f64::max);
    OdometerRange { min_start, max_end }
}

#[must_use]
pub fn summarize(entries: &[&DriveEntry]) -> ReportSummary {
    let (entry_count, total_distance) = rounded_distance(entries.iter().copied());
    ReportSummary {
        entry_count,
        total_distance,
        total_amount: amount_for(total_distance),
        rate_per_km: RATE_PER_KM,
        by_category: category_totals(entries),
        odometer_range: odometer_range(entries),
    }
}

fn period_totals(entries: &[&DriveEntry], format: &str) -> Vec<PeriodTotal> {
    let mut groups: BTreeMap<String, Vec<&DriveEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.date.format(format).to_string())
            .or_default()
            .push(entry);
    }
    groups
        .into_iter()
        .map(|(period, group)| {
            let (count, distance) = rounded_distance(group);
            PeriodTotal {
                period,
                entries: count,
                distance,
                amount: amount_for(distance),
            }
        })
        .collect()
}

#[must_use]
pub fn monthly_totals(entries: &[&DriveEntry]) -> Vec<PeriodTotal> {
    period_totals(entries, "%Y-%m")
}

#[must_use]
pub fn yearly_totals(entries: &[&DriveEntry]) -> Vec<PeriodTotal> {
    period_totals(entries, "%Y")
}

/// Totals per licence plate. Entries without a plate form the `None` group, listed first.
#[must_use]
pub fn vehicle_totals(entries: &[&DriveEntry], vehicles: &[Vehicle]) -> Vec<VehicleTotal> {
    let mut groups: BTreeMap<Option<String>, Vec<&DriveEntry>> = BTreeMap::new();
    for entry in entries {
        groups
            .entry(entry.license_plate.clone())
            .or_default()
            .push(entry);
    }
    groups
        .into_iter()
        .map(|(license_plate, group)| {
            let (count, distance) = rounded_distance(group);
            let description = license_plate
                .as_deref()
                .and_then(|plate| vehicles.iter().find(|v| v.license_plate == plate))
                .map(Vehicle::description)
                .filter(|d| !d.is_empty());
            VehicleTotal {
                license_plate,
                description,
                entries: count,
                distance,
                amount: amount_for(distance),
            }
        })
        .collect()
}

#[must_use]
pub fn line_items(entries: &[&DriveEntry]) -> Vec<LineItem> {
    entries
        .iter()
        .map(|e| LineItem {
            date: e.date,
            route: e.route_label(),
            category: e.category,
            purpose: e.purpose.clone(),
            distance: e.distance,
            amount: e.amount(),
        })
        .collect()
}

/// Fields are written unquoted, so anything that would split a field or a
/// line is flattened.
fn csv_text(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            ';' => ',',
            '\r' | '\n' => ' ',
            other => other,
        })
        .collect()
}

/// Semicolon-separated export with a UTF-8 BOM, one header row and one row per entry.
///
/// Nothing is quoted: `N` entries always give `N + 1` lines.
pub fn generate_csv(entries: &[&DriveEntry]) -> Result<String> {
    let mut buf = Vec::new();
    {
        let mut writer = csv::WriterBuilder::new()
            .delimiter(b';')
            .terminator(csv::Terminator::Any(b'\n'))
            .quote_style(csv::QuoteStyle::Never)
            .from_writer(&mut buf);
        writer.write_record(CSV_HEADER)?;
        for e in entries {
            writer.write_record([
                e.date.format("%Y-%m-%d").to_string(),
                csv_text(&e.start_time),
                csv_text(&e.end_time),
                e.start_odometer.to_string(),
                e.end_odometer.to_string(),
                e.distance.to_string(),
                csv_text(&e.purpose),
                csv_text(&e.route_label()),
            ])?;
        }
        writer
            .flush()
            .map_err(|e| LogbookError::Export(e.to_string()))?;
    }
    let body = String::from_utf8(buf).map_err(|e| LogbookError::Export(e.to_string()))?;
    Ok(format!("{BOM}{body}"))
}

#[must_use]
pub fn csv_filename(date: NaiveDate) -> String {
    format!("korjournal_{}.csv", date.format("%Y-%m-%d"))
}

#[must_use]
pub fn pdf_filename(date: NaiveDate) -> String {
    format!("korjournal_{}.pdf", date.format("%Y-%m-%d"))
}

#[must_use]
pub fn build_pdf_report(
    profile: &UserProfile,
    entries: &[&DriveEntry],
    filter: &ReportFilter,
    generated_on: NaiveDate,
) -> PdfReport {
    PdfReport {
        title: format!("Körjournal {}", profile.company),
        generated_on,
        filter: filter.clone(),
        profile: profile.clone(),
        items: line_items(entries),
        summary: summarize(entries),
    }
}
