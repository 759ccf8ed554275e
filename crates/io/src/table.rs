// Raw cell grids -> record sets (header detection, blank-row cleanup)

use hcrecon_recon::model::{CellValue, TabularRecordSet};

/// Rows after the first non-blank one that may still hold the real header.
const HEADER_LOOKAHEAD: usize = 4;

fn filled(row: &[CellValue]) -> usize {
    row.iter().filter(|c| !c.is_blank()).count()
}

/// Index of the header row.
///
/// Report exports often start with a title line or two. When the first
/// non-blank row has two or fewer filled cells, the first of the next four
/// rows with more filled cells is taken instead.
pub fn detect_header(grid: &[Vec<CellValue>]) -> Option<usize> {
    let first = grid.iter().position(|row| filled(row) > 0)?;
    if filled(&grid[first]) > 2 {
        return Some(first);
    }
    let wider = (first + 1..grid.len().min(first + 1 + HEADER_LOOKAHEAD))
        .find(|&i| filled(&grid[i]) > 2);
    Some(wider.unwrap_or(first))
}

/// Trimmed labels; blanks become `Col_<index>`, repeats get a `.N` suffix.
fn header_labels(header: &[CellValue], width: usize) -> Vec<String> {
    let mut labels: Vec<String> = Vec::with_capacity(width);
    for i in 0..width {
        let label = header
            .get(i)
            .map(|c| c.to_string().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| format!("Col_{i}"));
        let mut unique = label.clone();
        let mut n = 1;
        while labels.contains(&unique) {
            unique = format!("{label}.{n}");
            n += 1;
        }
        labels.push(unique);
    }
    labels
}

/// Build a record set from a loaded grid. Fully blank rows are dropped.
pub fn record_set_from_grid(label: &str, grid: Vec<Vec<CellValue>>) -> Result<TabularRecordSet, String> {
    let header_idx = detect_header(&grid).ok_or_else(|| "file is empty".to_string())?;
    let width = grid[header_idx..].iter().map(Vec::len).max().unwrap_or(0);
    let columns = header_labels(&grid[header_idx], width);

    let rows: Vec<Vec<CellValue>> = grid
        .into_iter()
        .skip(header_idx + 1)
        .filter(|row| filled(row) > 0)
        .collect();
    if rows.is_empty() {
        return Err("no data rows under the header".into());
    }

    log::debug!(
        "{label}: header at row {}, {} column(s), {} row(s)",
        header_idx + 1,
        columns.len(),
        rows.len()
    );
    Ok(TabularRecordSet::new(label, columns, rows))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<CellValue> {
        cells
            .iter()
            .map(|s| {
                if s.is_empty() {
                    CellValue::Empty
                } else {
                    CellValue::Text(s.to_string())
                }
            })
            .collect()
    }

    #[test]
    fn header_is_first_non_blank_row() {
        let grid = vec![row(&["", ""]), row(&["HC", "Paciente", "Fecha"]), row(&["1", "A", ""])];
        assert_eq!(detect_header(&grid), Some(1));
    }

    #[test]
    fn title_lines_are_skipped() {
        let grid = vec![
            row(&["Liquidacion marzo"]),
            row(&["Hospital", "Central"]),
            row(&["HC", "Paciente", "Fecha", "Monto"]),
            row(&["1", "A", "01/03/2024", "10"]),
        ];
        assert_eq!(detect_header(&grid), Some(2));
    }

    #[test]
    fn narrow_file_keeps_first_row() {
        let grid = vec![row(&["HC", "Paciente"]), row(&["1", "A"])];
        assert_eq!(detect_header(&grid), Some(0));
    }

    #[test]
    fn labels_trimmed_blank_and_repeated() {
        let grid = vec![
            row(&[" HC ", "", "Fecha", "Fecha"]),
            row(&["1", "x", "01/01/2024", "02/01/2024", "extra"]),
            row(&["", "", "", ""]),
        ];
        let set = record_set_from_grid("a.csv", grid).unwrap();
        assert_eq!(*set.columns, vec!["HC", "Col_1", "Fecha", "Fecha.1", "Col_4"]);
        assert_eq!(set.rows.len(), 1);
        assert_eq!(set.rows[0].get("Col_4"), Some(&CellValue::Text("extra".into())));
    }

    #[test]
    fn empty_inputs_fail() {
        assert!(record_set_from_grid("a.csv", vec![]).is_err());
        assert!(record_set_from_grid("a.csv", vec![row(&["HC", "Paciente", "Fecha"])]).is_err());
    }
}
