//! CSV loading.
//!
//! Known numeric columns are coerced to `f64`; cells that fail to parse become
//! `NaN` and are filled later by the cleaner. Unknown columns are numeric when
//! every non-empty cell parses, categorical otherwise.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use super::frame::{Column, Frame};
use super::schema::{is_categorical_field, is_numeric_field, NON_FEATURE_COLUMNS, TARGET_COLUMN};
use crate::error::{Error, Result};

/// Load a CSV file with a header row.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Frame> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::artifact(path, e))?;
    let frame = read_csv(file)?;
    tracing::info!(
        path = %path.display(),
        rows = frame.n_rows(),
        columns = frame.n_cols(),
        "loaded dataset"
    );
    Ok(frame)
}

/// Read CSV data with a header row from any reader.
pub fn read_csv<R: Read>(reader: R) -> Result<Frame> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    let mut cells: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record?;
        for (i, column) in cells.iter_mut().enumerate() {
            column.push(record.get(i).unwrap_or_default().to_string());
        }
    }

    let mut columns = Vec::with_capacity(headers.len());
    for (name, raw) in headers.into_iter().zip(cells) {
        let column = if is_categorical_field(&name) {
            categorical_column(raw)
        } else if is_forced_numeric(&name) || raw.iter().all(|c| is_blank(c) || parse(c).is_some())
        {
            let (column, coerced) = numeric_column(&raw);
            if coerced > 0 {
                tracing::warn!(column = %name, coerced, "non-numeric values coerced to NaN");
            }
            column
        } else {
            categorical_column(raw)
        };
        columns.push((name, column));
    }

    Frame::from_columns(columns)
}

fn is_forced_numeric(name: &str) -> bool {
    is_numeric_field(name) || name == TARGET_COLUMN || NON_FEATURE_COLUMNS.contains(&name)
}

fn is_blank(cell: &str) -> bool {
    cell.is_empty() || cell.eq_ignore_ascii_case("nan") || cell.eq_ignore_ascii_case("null")
}

fn parse(cell: &str) -> Option<f64> {
    cell.parse::<f64>().ok()
}

fn numeric_column(raw: &[String]) -> (Column, usize) {
    let mut coerced = 0;
    let values = raw
        .iter()
        .map(|cell| {
            if is_blank(cell) {
                return f64::NAN;
            }
            parse(cell).unwrap_or_else(|| {
                coerced += 1;
                f64::NAN
            })
        })
        .collect();
    (Column::Numeric(values), coerced)
}

fn categorical_column(raw: Vec<String>) -> Column {
    Column::Categorical(
        raw.into_iter()
            .map(|cell| if is_blank(&cell) { None } else { Some(cell) })
            .collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_csv_types_and_missing() {
        let data = "\
total_area,gas,price,note
65.5,Yes,7000000,a
,No,abc,b
40,,5000000,c
";
        let frame = read_csv(data.as_bytes()).unwrap();
        assert_eq!(frame.n_rows(), 3);

        let area = frame.numeric("total_area").unwrap();
        assert_eq!(area[0], 65.5);
        assert!(area[1].is_nan());

        let price = frame.numeric("price").unwrap();
        assert!(price[1].is_nan());

        let gas = frame.categorical("gas").unwrap();
        assert_eq!(gas[2], None);

        assert!(frame.categorical("note").is_some());
    }

    #[test]
    fn test_unknown_numeric_column_inferred() {
        let data = "Unnamed: 0,extra\n0,1.5\n1,2.5\n";
        let frame = read_csv(data.as_bytes()).unwrap();
        assert!(frame.numeric("extra").is_some());
        assert!(frame.numeric("Unnamed: 0").is_some());
    }

    #[test]
    fn test_load_missing_file_is_artifact_error() {
        let result = load_csv("/definitely/not/here.csv");
        assert!(matches!(result, Err(Error::Artifact { .. })));
    }
}
