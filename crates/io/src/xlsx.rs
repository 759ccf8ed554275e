// Excel load (first worksheet) and report workbook export

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use rust_xlsxwriter::{Format, Workbook, Worksheet};

use hcrecon_recon::model::CellValue;
use hcrecon_recon::report::Grid;

/// Day zero of the 1900 date system, as Excel counts it (includes the 1900 leap bug offset).
fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Convert an Excel serial to a native value. Whole serials are dates.
fn serial_to_cell(serial: f64) -> CellValue {
    let Some(epoch) = excel_epoch() else {
        return CellValue::Number(serial);
    };
    let millis = (serial * 86_400_000.0).round() as i64;
    match Duration::try_milliseconds(millis).and_then(|d| epoch.checked_add_signed(d)) {
        Some(dt) if serial.fract().abs() < 1e-9 => CellValue::Date(dt.date()),
        Some(dt) => CellValue::DateTime(dt),
        None => CellValue::Number(serial),
    }
}

fn date_to_serial(date: NaiveDate) -> f64 {
    excel_epoch()
        .map(|epoch| (date - epoch.date()).num_days() as f64)
        .unwrap_or(0.0)
}

fn datetime_to_serial(dt: NaiveDateTime) -> f64 {
    excel_epoch()
        .map(|epoch| (dt - epoch).num_milliseconds() as f64 / 86_400_000.0)
        .unwrap_or(0.0)
}

fn iso_to_cell(s: &str) -> CellValue {
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return CellValue::DateTime(dt);
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return CellValue::Date(d);
    }
    CellValue::Text(s.to_string())
}

fn data_to_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.trim().is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.into()),
        Data::Error(e) => CellValue::Text(format!("#{e:?}")),
        Data::DateTime(dt) => serial_to_cell(dt.as_f64()),
        Data::DateTimeIso(s) => iso_to_cell(s),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

/// Load the first worksheet of an Excel or ODS file as a grid.
pub fn read_grid(path: &Path) -> Result<Vec<Vec<CellValue>>, String> {
    let mut workbook: Sheets<_> =
        open_workbook_auto(path).map_err(|e| format!("Failed to open Excel file: {e}"))?;

    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| "Excel file contains no sheets".to_string())?;
    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| format!("Failed to read sheet '{sheet_name}': {e}"))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(data_to_cell).collect())
        .collect())
}

// ---------------------------------------------------------------------------
// Export
// ---------------------------------------------------------------------------

struct Formats {
    bold: Format,
    date: Format,
    datetime: Format,
}

impl Formats {
    fn new() -> Self {
        Self {
            bold: Format::new().set_bold(),
            date: Format::new().set_num_format("dd/mm/yyyy"),
            datetime: Format::new().set_num_format("dd/mm/yyyy hh:mm:ss"),
        }
    }
}

fn write_cell(worksheet: &mut Worksheet, row: u32, col: u16, cell: &CellValue, formats: &Formats) -> Result<(), String> {
    let written = match cell {
        CellValue::Empty => return Ok(()),
        CellValue::Number(n) if n.is_nan() => return Ok(()),
        CellValue::Text(s) => worksheet.write_string(row, col, s),
        CellValue::Number(n) => worksheet.write_number(row, col, *n),
        CellValue::Date(d) => worksheet.write_number_with_format(row, col, date_to_serial(*d), &formats.date),
        CellValue::DateTime(dt) => {
            worksheet.write_number_with_format(row, col, datetime_to_serial(*dt), &formats.datetime)
        }
    };
    written
        .map(|_| ())
        .map_err(|e| format!("Failed to write cell ({row}, {col}): {e}"))
}

fn write_sheet(worksheet: &mut Worksheet, grid: &Grid, formats: &Formats) -> Result<(), String> {
    for (col, header) in grid.headers.iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &formats.bold)
            .map_err(|e| format!("Failed to write header: {e}"))?;
    }
    for (row_idx, row) in grid.rows.iter().enumerate() {
        let row32 = (row_idx + 1) as u32;
        for (col, cell) in row.iter().enumerate() {
            write_cell(worksheet, row32, col as u16, cell, formats)?;
        }
    }
    Ok(())
}

/// Write a table sheet plus a `summary` sheet to a new workbook.
pub fn write_report(table_name: &str, table: &Grid, summary: &Grid, path: &Path) -> Result<(), String> {
    let mut workbook = Workbook::new();
    let formats = Formats::new();

    let worksheet = workbook
        .add_worksheet()
        .set_name(table_name)
        .map_err(|e| format!("Failed to create sheet '{table_name}': {e}"))?;
    write_sheet(worksheet, table, &formats)?;

    let worksheet = workbook
        .add_worksheet()
        .set_name("summary")
        .map_err(|e| format!("Failed to create sheet 'summary': {e}"))?;
    write_sheet(worksheet, summary, &formats)?;

    workbook
        .save(path)
        .map_err(|e| format!("Failed to save XLSX file: {e}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn serials_convert_to_native_dates() {
        assert_eq!(
            serial_to_cell(45352.0),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        let CellValue::DateTime(dt) = serial_to_cell(45352.5) else {
            panic!("expected date-time");
        };
        assert_eq!(dt.to_string(), "2024-03-01 12:00:00");
        assert_eq!(date_to_serial(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()), 45352.0);
    }

    #[test]
    fn iso_strings_parse() {
        assert_eq!(
            iso_to_cell("2024-03-01"),
            CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap())
        );
        assert!(matches!(iso_to_cell("2024-03-01T08:30:00"), CellValue::DateTime(_)));
        assert_eq!(iso_to_cell("PT1H"), CellValue::Text("PT1H".into()));
    }

    #[test]
    fn report_round_trip_through_calamine() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("owed.xlsx");
        let table = Grid {
            headers: vec!["identifier".into(), "name".into(), "amount".into(), "date".into()],
            rows: vec![vec![
                CellValue::Text("123".into()),
                CellValue::Text("PEREZ".into()),
                CellValue::Number(9528.62),
                CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
            ]],
        };
        let summary = Grid {
            headers: vec!["metric".into(), "value".into()],
            rows: vec![vec![CellValue::Text("records".into()), CellValue::Number(1.0)]],
        };
        write_report("control_owed", &table, &summary, &path).unwrap();

        let grid = read_grid(&path).unwrap();
        assert_eq!(grid[0][0], CellValue::Text("identifier".into()));
        assert_eq!(grid[1][1], CellValue::Text("PEREZ".into()));
        assert_eq!(grid[1][2], CellValue::Number(9528.62));
        assert_eq!(grid[1][3], CellValue::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()));

        let workbook: Sheets<_> = open_workbook_auto(&path).unwrap();
        assert_eq!(workbook.sheet_names(), vec!["control_owed", "summary"]);
    }
}
