// Report export (CSV / XLSX)

use std::path::Path;

use rust_xlsxwriter::{Format, Workbook};
use tuition_recon::dashboard::RecordView;

use crate::ReadError;

pub const REPORT_HEADERS: [&str; 11] = [
    "unit",
    "student",
    "guardian",
    "grade",
    "due_date",
    "billed",
    "minimum",
    "diff_abs",
    "diff_percent",
    "date_error",
    "value_error",
];

/// Error column text: empty when clean, `open` when unresolved,
/// `resolved` when a resolution covers it.
fn error_label(raised: bool, unresolved: bool) -> &'static str {
    match (raised, unresolved) {
        (false, _) => "",
        (true, true) => "open",
        (true, false) => "resolved",
    }
}

/// Write the report, choosing the format by extension (`.xlsx` or CSV).
pub fn write_report(path: &Path, rows: &[RecordView]) -> Result<(), ReadError> {
    let is_xlsx = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("xlsx"));

    if is_xlsx {
        write_xlsx(path, rows)
    } else {
        write_csv(path, rows)
    }?;

    log::info!("Wrote {} report rows to {}", rows.len(), path.display());
    Ok(())
}

pub fn write_csv(path: &Path, rows: &[RecordView]) -> Result<(), ReadError> {
    let mut writer = csv::Writer::from_path(path).map_err(|e| ReadError::Export(e.to_string()))?;
    writer
        .write_record(REPORT_HEADERS)
        .map_err(|e| ReadError::Export(e.to_string()))?;

    for row in rows {
        let r = &row.record;
        let billed = format!("{:.2}", r.billed);
        let minimum = format!("{:.2}", r.minimum);
        let diff_abs = format!("{:.2}", r.diff_abs);
        let diff_percent = format!("{:.1}", r.diff_percent);
        writer
            .write_record([
                r.unit_id.as_str(),
                r.student_name.as_str(),
                r.guardian_name.as_str(),
                r.grade.as_str(),
                row.due_date_display.as_str(),
                billed.as_str(),
                minimum.as_str(),
                diff_abs.as_str(),
                diff_percent.as_str(),
                error_label(row.date_error, row.date_unresolved),
                error_label(row.value_error, row.value_unresolved),
            ])
            .map_err(|e| ReadError::Export(e.to_string()))?;
    }

    writer.flush()?;
    Ok(())
}

pub fn write_xlsx(path: &Path, rows: &[RecordView]) -> Result<(), ReadError> {
    let export_err = |e: rust_xlsxwriter::XlsxError| ReadError::Export(e.to_string());

    let mut workbook = Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.set_name("Report").map_err(export_err)?;

    let bold = Format::new().set_bold();
    let money = Format::new().set_num_format("#,##0.00");

    for (col, header) in REPORT_HEADERS.iter().enumerate() {
        sheet
            .write_string_with_format(0, col as u16, *header, &bold)
            .map_err(export_err)?;
    }

    for (i, row) in rows.iter().enumerate() {
        let r = &row.record;
        let line = (i + 1) as u32;
        sheet.write_string(line, 0, &r.unit_id).map_err(export_err)?;
        sheet.write_string(line, 1, &r.student_name).map_err(export_err)?;
        sheet.write_string(line, 2, &r.guardian_name).map_err(export_err)?;
        sheet.write_string(line, 3, &r.grade).map_err(export_err)?;
        sheet.write_string(line, 4, &row.due_date_display).map_err(export_err)?;
        sheet.write_number_with_format(line, 5, r.billed, &money).map_err(export_err)?;
        sheet.write_number_with_format(line, 6, r.minimum, &money).map_err(export_err)?;
        sheet.write_number_with_format(line, 7, r.diff_abs, &money).map_err(export_err)?;
        sheet.write_number(line, 8, r.diff_percent).map_err(export_err)?;
        sheet
            .write_string(line, 9, error_label(row.date_error, row.date_unresolved))
            .map_err(export_err)?;
        sheet
            .write_string(line, 10, error_label(row.value_error, row.value_unresolved))
            .map_err(export_err)?;
    }

    workbook.save(path).map_err(export_err)?;
    Ok(())
}
