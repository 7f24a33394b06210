// Excel/ODS import via calamine

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use tuition_recon::CellValue;

use crate::{Grid, ReadError};

/// Rows past this are dropped with a warning.
pub const MAX_ROWS: usize = 200_000;

/// Read the first worksheet into a grid anchored at A1.
///
/// Dates come back as 1900-epoch serial numbers, matching what a raw
/// spreadsheet export hands to the transformer.
pub fn read_first_sheet(path: &Path) -> Result<Grid, ReadError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ReadError::Workbook(e.to_string()))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names.first().ok_or(ReadError::NoSheets)?;
    if sheet_names.len() > 1 {
        log::debug!(
            "Workbook has {} sheets; reading '{}' only",
            sheet_names.len(),
            first
        );
    }

    let range = workbook
        .worksheet_range(first)
        .map_err(|e| ReadError::Workbook(format!("sheet '{}': {}", first, e)))?;

    let (height, width) = range.get_size();
    if height == 0 || width == 0 {
        return Ok(Grid::new());
    }

    // Range start offset (data may not begin at A1)
    let (start_row, start_col) = range.start().unwrap_or((0, 0));
    let start_row = start_row as usize;
    let start_col = start_col as usize;

    let mut grid: Grid = vec![Vec::new(); start_row];

    for (row_idx, row) in range.rows().enumerate() {
        if start_row + row_idx >= MAX_ROWS {
            log::warn!(
                "Sheet '{}' truncated at {} rows ({} present)",
                first,
                MAX_ROWS,
                start_row + height
            );
            break;
        }

        let mut cells = vec![CellValue::Empty; start_col];
        cells.extend(row.iter().map(cell_value));
        while matches!(cells.last(), Some(CellValue::Empty)) {
            cells.pop();
        }
        grid.push(cells);
    }

    Ok(grid)
}

fn cell_value(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) if s.is_empty() => CellValue::Empty,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Bool(*b),
        Data::Error(e) => CellValue::Text(format!("#{:?}", e)),
        Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook;

    #[test]
    fn reads_first_sheet_with_types() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("billing.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 2, "Nome do aluno").unwrap();
        sheet.write_string(0, 11, "Data de vencimento").unwrap();
        sheet.write_string(1, 2, "Ana Silva").unwrap();
        sheet.write_number(1, 11, 45358.0).unwrap();
        sheet.write_number(1, 14, 2000.0).unwrap();
        sheet.write_string(1, 16, "R$ 1.500,00").unwrap();
        sheet.write_boolean(2, 2, true).unwrap();
        let other = workbook.add_worksheet();
        other.write_string(0, 0, "ignored").unwrap();
        workbook.save(&path).unwrap();

        let grid = read_first_sheet(&path).unwrap();
        assert_eq!(grid.len(), 3);
        assert_eq!(grid[0][2], CellValue::text("Nome do aluno"));
        assert_eq!(grid[0][0], CellValue::Empty);
        assert_eq!(grid[1][11], CellValue::Number(45358.0));
        assert_eq!(grid[1][14], CellValue::Number(2000.0));
        assert_eq!(grid[1][16], CellValue::text("R$ 1.500,00"));
        assert_eq!(grid[2][2], CellValue::Bool(true));
        assert_eq!(grid[2].len(), 3);
    }

    #[test]
    fn data_not_at_a1_is_anchored() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("offset.xlsx");

        let mut workbook = Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(2, 3, "x").unwrap();
        workbook.save(&path).unwrap();

        let grid = read_first_sheet(&path).unwrap();
        assert_eq!(grid.len(), 3);
        assert!(grid[0].is_empty());
        assert_eq!(grid[2][3], CellValue::text("x"));
    }

    #[test]
    fn garbage_file_is_workbook_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.xlsx");
        std::fs::write(&path, b"not a zip").unwrap();

        assert!(matches!(read_first_sheet(&path), Err(ReadError::Workbook(_))));
    }
}
