use std::collections::HashSet;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader};
use csv::ReaderBuilder;
use tracing::{debug, info};

use super::table::{Column, Table};
use crate::error::{PipelineError, Result};

/// Cell spellings treated as missing in text sources.
const MISSING_MARKERS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "null", "NULL", "None", "#N/A",
];

static MISSING_CELL: Cell = Cell::Missing;

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Missing,
    Number(f64),
    Text(String),
}

/// Load a dataset into a [`Table`]. Dispatch by extension.
///
/// Supported formats:
/// * `.xlsx`, `.xlsm`, `.xlsb`, `.xls`, `.ods`: first worksheet, first row is the header
/// * `.csv`: comma separated with a header row
///
/// A column is numeric when every non-missing cell holds a number; any other
/// cell kind (text, booleans, dates) makes the whole column text.
pub fn load_table(path: &Path) -> Result<Table> {
    if !path.is_file() {
        return Err(PipelineError::load(path, "file not found"));
    }

    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    info!("Loading data from {}", path.display());

    let table = match ext.as_str() {
        "csv" => load_csv(path)?,
        "xlsx" | "xlsm" | "xlsb" | "xls" | "ods" => load_workbook(path)?,
        other => {
            return Err(PipelineError::load(
                path,
                format!("unsupported file extension '.{other}'"),
            ))
        }
    };

    info!(
        "Loaded {} rows x {} columns ({} numeric)",
        table.height(),
        table.width(),
        table.columns().iter().filter(|c| c.data.is_numeric()).count()
    );

    Ok(table)
}

fn load_csv(path: &Path) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|e| PipelineError::load(path, e))?;

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| PipelineError::load(path, format!("unable to read CSV header: {e}")))?
        .iter()
        .map(|h| h.to_string())
        .collect();

    let mut rows = Vec::new();
    for (row_idx, record) in reader.records().enumerate() {
        let record = record.map_err(|e| {
            PipelineError::load(path, format!("failed to parse CSV row {}: {e}", row_idx + 2))
        })?;
        rows.push(record.iter().map(parse_text_cell).collect());
    }

    build_table(path, headers, rows)
}

fn load_workbook(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| PipelineError::load(path, e))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| PipelineError::load(path, "workbook contains no worksheets"))?
        .map_err(|e| PipelineError::load(path, e))?;

    let mut sheet_rows = range.rows();
    let headers: Vec<String> = match sheet_rows.next() {
        Some(header) => header.iter().map(|cell| cell.to_string()).collect(),
        None => Vec::new(),
    };

    let rows = sheet_rows
        .map(|row| row.iter().map(workbook_cell).collect())
        .collect();

    build_table(path, headers, rows)
}

fn parse_text_cell(raw: &str) -> Cell {
    let trimmed = raw.trim();
    if MISSING_MARKERS.contains(&trimmed) {
        return Cell::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(value) => Cell::Number(value),
        Err(_) => Cell::Text(trimmed.to_string()),
    }
}

fn workbook_cell(cell: &Data) -> Cell {
    match cell {
        Data::Empty | Data::Error(_) => Cell::Missing,
        Data::Int(value) => Cell::Number(*value as f64),
        Data::Float(value) if value.is_nan() => Cell::Missing,
        Data::Float(value) => Cell::Number(*value),
        Data::String(text) if text.trim().is_empty() => Cell::Missing,
        other => Cell::Text(other.to_string()),
    }
}

fn build_table(path: &Path, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Result<Table> {
    if headers.is_empty() {
        return Err(PipelineError::load(path, "dataset has no header row"));
    }

    let names = header_names(path, headers)?;
    let mut columns = Vec::with_capacity(names.len());

    for (j, name) in names.into_iter().enumerate() {
        let cells: Vec<&Cell> = rows
            .iter()
            .map(|row| row.get(j).unwrap_or(&MISSING_CELL))
            .collect();

        let numeric = cells.iter().all(|c| !matches!(c, Cell::Text(_)));
        let column = if numeric {
            Column::numeric(
                name,
                cells
                    .iter()
                    .map(|c| match c {
                        Cell::Number(value) => Some(*value),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            Column::text(
                name,
                cells
                    .iter()
                    .map(|c| match c {
                        Cell::Missing => None,
                        Cell::Number(value) => Some(value.to_string()),
                        Cell::Text(text) => Some(text.clone()),
                    })
                    .collect(),
            )
        };

        debug!(
            "column '{}' typed as {}",
            column.name,
            if numeric { "numeric" } else { "text" }
        );
        columns.push(column);
    }

    Table::new(columns).map_err(|e| PipelineError::load(path, e))
}

/// Trim header names and label blank ones the way spreadsheet tools do.
fn header_names(path: &Path, headers: Vec<String>) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut names = Vec::with_capacity(headers.len());

    for (idx, raw) in headers.into_iter().enumerate() {
        let trimmed = raw.trim();
        let name = if trimmed.is_empty() {
            format!("Unnamed: {idx}")
        } else {
            trimmed.to_string()
        };

        if !seen.insert(name.clone()) {
            return Err(PipelineError::load(
                path,
                format!("duplicate column name '{name}' in header"),
            ));
        }
        names.push(name);
    }

    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::Builder;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = Builder::new()
            .suffix(".csv")
            .tempfile()
            .expect("temp file");
        file.write_all(contents.as_bytes()).expect("write csv");
        file.flush().expect("flush csv");
        file
    }

    #[test]
    fn infers_numeric_and_text_columns() {
        let file = write_csv("pce,steps,solvent\n26.0,1,DMF\n,2,DMSO\n10.5,1,\n");
        let table = load_table(file.path()).expect("load csv");

        assert_eq!(table.height(), 3);
        assert_eq!(
            table.numeric("pce"),
            Some(&[Some(26.0), None, Some(10.5)][..])
        );
        assert_eq!(table.numeric("steps"), Some(&[Some(1.0), Some(2.0), Some(1.0)][..]));
        assert!(table.numeric("solvent").is_none());
        assert!(table.contains("solvent"));
    }

    #[test]
    fn one_text_cell_makes_the_column_text() {
        let file = write_csv("value\n1.0\nunknown\n3.0\n");
        let table = load_table(file.path()).expect("load csv");
        assert!(table.numeric("value").is_none());
    }

    #[test]
    fn missing_file_is_a_load_error() {
        let err = load_table(Path::new("definitely/not/here.xlsx")).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn unsupported_extension_is_a_load_error() {
        let file = Builder::new().suffix(".txt").tempfile().expect("temp file");
        let err = load_table(file.path()).unwrap_err();
        assert!(err.to_string().contains("unsupported file extension '.txt'"));
    }

    #[test]
    fn ragged_rows_are_rejected() {
        let file = write_csv("a,b\n1,2\n3\n");
        let err = load_table(file.path()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("failed to parse CSV row 3"));
    }

    #[test]
    fn duplicate_headers_are_rejected() {
        let file = write_csv("a,a\n1,2\n");
        let err = load_table(file.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate column name 'a'"));
    }

    #[test]
    fn blank_headers_get_placeholder_names() {
        let file = write_csv("a,\n1,2\n");
        let table = load_table(file.path()).expect("load csv");
        assert_eq!(table.column_names(), vec!["a", "Unnamed: 1"]);
    }

    #[test]
    fn workbook_cells_map_to_numbers_text_or_missing() {
        assert_eq!(workbook_cell(&Data::Int(3)), Cell::Number(3.0));
        assert_eq!(workbook_cell(&Data::Float(18.25)), Cell::Number(18.25));
        assert_eq!(workbook_cell(&Data::Float(f64::NAN)), Cell::Missing);
        assert_eq!(workbook_cell(&Data::Empty), Cell::Missing);
        assert_eq!(workbook_cell(&Data::String("  ".into())), Cell::Missing);
        assert_eq!(
            workbook_cell(&Data::Error(calamine::CellErrorType::Div0)),
            Cell::Missing
        );
        assert_eq!(
            workbook_cell(&Data::String("DMF".into())),
            Cell::Text("DMF".into())
        );
        assert_eq!(workbook_cell(&Data::Bool(true)), Cell::Text("true".into()));
    }

    fn write_xlsx(rows: &[&[Option<XlsxValue>]]) -> tempfile::NamedTempFile {
        let file = Builder::new()
            .suffix(".xlsx")
            .tempfile()
            .expect("temp file");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let (r, c) = (r as u32, c as u16);
                match value {
                    Some(XlsxValue::Num(v)) => sheet.write_number(r, c, *v).map(|_| ()),
                    Some(XlsxValue::Str(s)) => sheet.write_string(r, c, *s).map(|_| ()),
                    Some(XlsxValue::Bool(b)) => sheet.write_boolean(r, c, *b).map(|_| ()),
                    None => Ok(()),
                }
                .expect("write cell");
            }
        }
        workbook.save(file.path()).expect("save workbook");
        file
    }

    enum XlsxValue {
        Num(f64),
        Str(&'static str),
        Bool(bool),
    }

    #[test]
    fn reads_the_first_worksheet() {
        use XlsxValue::{Bool, Num, Str};
        let file = write_xlsx(&[
            &[Some(Str("pce")), None, Some(Str("solvent")), Some(Str("annealed"))],
            &[Some(Num(26.0)), Some(Num(1.0)), Some(Str("DMF")), Some(Bool(true))],
            &[None, Some(Num(2.5)), None, Some(Bool(false))],
            &[Some(Num(10.5)), Some(Num(3.0)), Some(Str("DMSO")), None],
        ]);

        let table = load_table(file.path()).expect("load workbook");

        assert_eq!(
            table.column_names(),
            vec!["pce", "Unnamed: 1", "solvent", "annealed"]
        );
        assert_eq!(table.height(), 3);
        assert_eq!(
            table.numeric("pce"),
            Some(&[Some(26.0), None, Some(10.5)][..])
        );
        assert_eq!(
            table.numeric("Unnamed: 1"),
            Some(&[Some(1.0), Some(2.5), Some(3.0)][..])
        );
        assert!(table.numeric("solvent").is_none());
        assert!(table.numeric("annealed").is_none());
        assert!(table.contains("annealed"));
    }

    #[test]
    fn empty_worksheet_has_no_header() {
        let file = write_xlsx(&[]);
        let err = load_table(file.path()).unwrap_err();
        assert!(err.is_fatal());
        assert!(err.to_string().contains("dataset has no header row"));
    }
}
