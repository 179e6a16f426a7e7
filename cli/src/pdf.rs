use anyhow::{Result, anyhow};
use printpdf::{
    BuiltinFont, IndirectFontRef, Line, Mm, PdfDocument, PdfDocumentReference, PdfLayerReference,
    Point,
};

use korjournal_core::report::PdfReport;

// A4 landscape
const PAGE_W: f32 = 297.0;
const PAGE_H: f32 = 210.0;
const MARGIN: f32 = 15.0;
const ROW_H: f32 = 6.0;
const BOTTOM: f32 = 25.0;

const X_DATE: f32 = MARGIN;
const X_ROUTE: f32 = 42.0;
const X_CATEGORY: f32 = 140.0;
const X_PURPOSE: f32 = 172.0;
const X_DISTANCE: f32 = 245.0;
const X_AMOUNT: f32 = 265.0;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
}

fn text(layer: &PdfLayerReference, font: &IndirectFontRef, s: &str, size: f32, x: f32, y: f32) {
    layer.use_text(s, size, Mm(x), Mm(y), font);
}

fn rule(layer: &PdfLayerReference, y: f32) {
    layer.add_line(Line {
        points: vec![
            (Point::new(Mm(MARGIN), Mm(y)), false),
            (Point::new(Mm(PAGE_W - MARGIN), Mm(y)), false),
        ],
        is_closed: false,
    });
}

fn clip(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{cut}...")
    }
}

fn money(v: f64) -> String {
    format!("{v:.2} kr")
}

fn table_header(layer: &PdfLayerReference, fonts: &Fonts, y: f32) -> f32 {
    for (x, label) in [
        (X_DATE, "Datum"),
        (X_ROUTE, "Resväg"),
        (X_CATEGORY, "Kategori"),
        (X_PURPOSE, "Syfte"),
        (X_DISTANCE, "Km"),
        (X_AMOUNT, "Belopp"),
    ] {
        text(layer, &fonts.bold, label, 10.0, x, y);
    }
    rule(layer, y - 2.5);
    y - ROW_H - 2.0
}

fn new_page(doc: &PdfDocumentReference, fonts: &Fonts, page_no: usize) -> (PdfLayerReference, f32) {
    let (page, layer) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Layer {page_no}"));
    let layer = doc.get_page(page).get_layer(layer);
    let y = PAGE_H - MARGIN;
    text(&layer, &fonts.regular, &format!("Sida {page_no}"), 9.0, PAGE_W - MARGIN - 15.0, y);
    let y = table_header(&layer, fonts, y - ROW_H);
    (layer, y)
}

/// Render the report on A4 landscape pages, continuing the table on new pages as needed.
pub fn render(report: &PdfReport) -> Result<Vec<u8>> {
    let (doc, page1, layer1) = PdfDocument::new(
        report.title.as_str(),
        Mm(PAGE_W),
        Mm(PAGE_H),
        "Layer 1",
    );
    let fonts = Fonts {
        regular: doc
            .add_builtin_font(BuiltinFont::Helvetica)
            .map_err(|e| anyhow!("Failed to load font: {e}"))?,
        bold: doc
            .add_builtin_font(BuiltinFont::HelveticaBold)
            .map_err(|e| anyhow!("Failed to load font: {e}"))?,
    };
    let mut layer = doc.get_page(page1).get_layer(layer1);
    let mut page_no = 1;

    // Header block
    let profile = &report.profile;
    let mut y = PAGE_H - MARGIN;
    text(&layer, &fonts.bold, &report.title, 16.0, MARGIN, y);
    text(
        &layer,
        &fonts.regular,
        &format!("Skapad {}", report.generated_on.format("%Y-%m-%d")),
        9.0,
        PAGE_W - MARGIN - 40.0,
        y,
    );
    y -= 8.0;
    let left = [
        format!("Namn: {}", profile.name),
        format!("E-post: {}", profile.email),
        format!("Anställningsnr: {}", profile.employee_id),
        format!("Avdelning: {}", profile.department),
    ];
    let right = [
        format!("Företag: {}", profile.company),
        format!("Konto: {}", profile.account),
        format!("Referens: {}", profile.reference),
        format!("Ändamål: {}", profile.purpose),
    ];
    for (l, r) in left.iter().zip(right.iter()) {
        text(&layer, &fonts.regular, l, 10.0, MARGIN, y);
        text(&layer, &fonts.regular, r, 10.0, 150.0, y);
        y -= 5.0;
    }
    let period = match (report.filter.from, report.filter.to) {
        (Some(from), Some(to)) => Some(format!("Period: {from} - {to}")),
        (Some(from), None) => Some(format!("Period: från {from}")),
        (None, Some(to)) => Some(format!("Period: till {to}")),
        (None, None) => None,
    };
    if let Some(period) = period {
        text(&layer, &fonts.regular, &period, 10.0, MARGIN, y);
        y -= 5.0;
    }
    rule(&layer, y);
    y -= 8.0;

    // Line items
    y = table_header(&layer, &fonts, y);
    for item in &report.items {
        if y < BOTTOM {
            page_no += 1;
            (layer, y) = new_page(&doc, &fonts, page_no);
        }
        text(&layer, &fonts.regular, &item.date.format("%Y-%m-%d").to_string(), 9.0, X_DATE, y);
        text(&layer, &fonts.regular, &clip(&item.route, 55), 9.0, X_ROUTE, y);
        text(&layer, &fonts.regular, item.category.label(), 9.0, X_CATEGORY, y);
        text(&layer, &fonts.regular, &clip(&item.purpose, 40), 9.0, X_PURPOSE, y);
        text(&layer, &fonts.regular, &format!("{:.1}", item.distance), 9.0, X_DISTANCE, y);
        text(&layer, &fonts.regular, &money(item.amount), 9.0, X_AMOUNT, y);
        y -= ROW_H;
    }

    // Summary block needs roughly six rows plus one per category
    let summary = &report.summary;
    #[allow(clippy::cast_precision_loss)]
    let needed = ROW_H * (6.0 + summary.by_category.len() as f32);
    if y - needed < BOTTOM {
        page_no += 1;
        let (page, layer_idx) = doc.add_page(Mm(PAGE_W), Mm(PAGE_H), format!("Layer {page_no}"));
        layer = doc.get_page(page).get_layer(layer_idx);
        y = PAGE_H - MARGIN;
    } else {
        rule(&layer, y + 2.0);
        y -= 4.0;
    }

    text(&layer, &fonts.bold, "Sammanställning", 12.0, MARGIN, y);
    y -= ROW_H + 1.0;
    text(
        &layer,
        &fonts.regular,
        &format!(
            "Antal resor: {}   Total sträcka: {:.1} km   Totalt belopp: {}   ({:.2} kr/km)",
            summary.entry_count,
            summary.total_distance,
            money(summary.total_amount),
            summary.rate_per_km
        ),
        10.0,
        MARGIN,
        y,
    );
    y -= ROW_H;
    for category in &summary.by_category {
        text(
            &layer,
            &fonts.regular,
            &format!(
                "{}: {} resor, {:.1} km, {}",
                category.category,
                category.entries,
                category.distance,
                money(category.amount)
            ),
            10.0,
            MARGIN + 5.0,
            y,
        );
        y -= ROW_H;
    }
    text(
        &layer,
        &fonts.regular,
        &format!(
            "Mätarställning: {:.0} - {:.0}",
            summary.odometer_range.min_start, summary.odometer_range.max_end
        ),
        10.0,
        MARGIN,
        y,
    );

    let mut writer = std::io::BufWriter::new(Vec::<u8>::new());
    doc.save(&mut writer)
        .map_err(|e| anyhow!("Failed to write PDF: {e}"))?;
    writer
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush PDF: {e}"))
}
