use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use tracing::info;

use korjournal_core::report::{ReportFilter, csv_filename, pdf_filename};

use crate::pdf;

use super::Logbook;

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    info!(path = %path.display(), bytes = bytes.len(), "export written");
    Ok(())
}

pub(crate) fn cmd_export_csv(
    svc: &Logbook,
    filter: &ReportFilter,
    output: Option<PathBuf>,
) -> Result<()> {
    let count = svc.filtered_entries(filter).len();
    let csv = svc.export_csv(filter)?;

    if output.as_deref().is_some_and(|p| p.as_os_str() == "-") {
        print!("{csv}");
        return Ok(());
    }

    let path = output.unwrap_or_else(|| PathBuf::from(csv_filename(Local::now().date_naive())));
    write_output(&path, csv.as_bytes())?;
    eprintln!("Exported {count} trips to {}", path.display());
    Ok(())
}

pub(crate) fn cmd_export_pdf(
    svc: &Logbook,
    filter: &ReportFilter,
    output: Option<PathBuf>,
) -> Result<()> {
    let today = Local::now().date_naive();
    let report = svc.pdf_report(filter, today);
    let bytes = pdf::render(&report)?;

    let path = output.unwrap_or_else(|| PathBuf::from(pdf_filename(today)));
    write_output(&path, &bytes)?;
    eprintln!(
        "Exported {} trips ({:.1} km, {:.2} kr) to {}",
        report.summary.entry_count,
        report.summary.total_distance,
        report.summary.total_amount,
        path.display()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use korjournal_core::LogbookService;
    use korjournal_core::models::DriveEntryInput;
    use korjournal_core::store::SqliteStore;

    #[test]
    fn test_export_csv_to_file() {
        let mut svc: Logbook =
            LogbookService::open(SqliteStore::open_in_memory().unwrap()).unwrap();
        let date = chrono::NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        let input = DriveEntryInput::odometer(date, 1000.0, 1012.5)
            .with_purpose("Kundbesök");
        svc.add_entry(input).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.csv");
        cmd_export_csv(&svc, &ReportFilter::default(), Some(path.clone())).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with('\u{feff}'));
        assert!(written.contains("2024-01-05"));
    }

    #[test]
    fn test_export_pdf_to_file() {
        let svc: Logbook = LogbookService::open(SqliteStore::open_in_memory().unwrap()).unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        cmd_export_pdf(&svc, &ReportFilter::default(), Some(path.clone())).unwrap();

        let written = std::fs::read(&path).unwrap();
        assert!(written.starts_with(b"%PDF"));
    }
}
