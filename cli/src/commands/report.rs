use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use korjournal_core::report::{PeriodTotal, ReportFilter};

use super::Logbook;
use super::helpers::no_neg_zero;

#[derive(Tabled)]
struct TotalRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Trips")]
    entries: usize,
    #[tabled(rename = "Km")]
    distance: String,
    #[tabled(rename = "Amount (kr)")]
    amount: String,
}

impl TotalRow {
    fn new(group: String, entries: usize, distance: f64, amount: f64) -> Self {
        Self {
            group,
            entries,
            distance: format!("{:.1}", no_neg_zero(distance)),
            amount: format!("{:.2}", no_neg_zero(amount)),
        }
    }
}

fn print_totals(title: &str, rows: &[TotalRow]) {
    if rows.is_empty() {
        return;
    }
    println!("\n{title}");
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

fn period_rows(totals: Vec<PeriodTotal>) -> Vec<TotalRow> {
    totals
        .into_iter()
        .map(|t| TotalRow::new(t.period, t.entries, t.distance, t.amount))
        .collect()
}

/// Totals for the filtered trips, overall and grouped by category, month, year and vehicle.
pub(crate) fn cmd_report(svc: &Logbook, filter: &ReportFilter, json: bool) -> Result<()> {
    let summary = svc.report_summary(filter);
    let monthly = svc.monthly_totals(filter);
    let yearly = svc.yearly_totals(filter);
    let vehicles = svc.vehicle_totals(filter);

    if json {
        let out = serde_json::json!({
            "filter": filter,
            "summary": summary,
            "monthly": monthly,
            "yearly": yearly,
            "vehicles": vehicles,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if summary.entry_count == 0 {
        eprintln!("No trips match the filter");
        return Ok(());
    }

    println!(
        "{} trips, {:.1} km, {:.2} kr at {:.2} kr/km",
        summary.entry_count,
        no_neg_zero(summary.total_distance),
        no_neg_zero(summary.total_amount),
        summary.rate_per_km
    );
    println!(
        "Odometer range: {:.0} - {:.0}",
        summary.odometer_range.min_start, summary.odometer_range.max_end
    );

    let by_category: Vec<TotalRow> = summary
        .by_category
        .iter()
        .map(|c| TotalRow::new(c.category.to_string(), c.entries, c.distance, c.amount))
        .collect();
    print_totals("By category", &by_category);
    print_totals("By month", &period_rows(monthly));
    print_totals("By year", &period_rows(yearly));

    let by_vehicle: Vec<TotalRow> = vehicles
        .into_iter()
        .map(|v| {
            let group = match (v.license_plate, v.description) {
                (Some(plate), Some(desc)) if !desc.is_empty() => format!("{plate} ({desc})"),
                (Some(plate), _) => plate,
                (None, _) => "(no vehicle)".to_string(),
            };
            TotalRow::new(group, v.entries, v.distance, v.amount)
        })
        .collect();
    print_totals("By vehicle", &by_vehicle);
    Ok(())
}
