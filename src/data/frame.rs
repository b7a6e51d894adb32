//! Columnar table of named numeric and categorical columns.
//!
//! A [`Frame`] is the unit every preprocessing stage consumes and produces.
//! Stages build new frames; they never mutate the caller's frame in place.

use std::hash::{Hash, Hasher};

use crate::error::{Error, Result};

// =============================================================================
// Column
// =============================================================================

/// One column of a [`Frame`]. Missing numerics are `NaN`, missing categoricals `None`.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Numeric(Vec<f64>),
    Categorical(Vec<Option<String>>),
}

impl Column {
    pub fn len(&self) -> usize {
        match self {
            Column::Numeric(v) => v.len(),
            Column::Categorical(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Column::Numeric(_))
    }

    pub fn as_numeric(&self) -> Option<&[f64]> {
        match self {
            Column::Numeric(v) => Some(v),
            Column::Categorical(_) => None,
        }
    }

    pub fn as_categorical(&self) -> Option<&[Option<String>]> {
        match self {
            Column::Categorical(v) => Some(v),
            Column::Numeric(_) => None,
        }
    }

    pub fn missing_count(&self) -> usize {
        match self {
            Column::Numeric(v) => v.iter().filter(|x| x.is_nan()).count(),
            Column::Categorical(v) => v.iter().filter(|x| x.is_none()).count(),
        }
    }

    /// Gather the given rows into a new column.
    pub fn take(&self, rows: &[usize]) -> Column {
        match self {
            Column::Numeric(v) => Column::Numeric(rows.iter().map(|&r| v[r]).collect()),
            Column::Categorical(v) => {
                Column::Categorical(rows.iter().map(|&r| v[r].clone()).collect())
            }
        }
    }

    fn cell_key(&self, row: usize) -> CellKey<'_> {
        match self {
            // Normalize NaN payloads so all missing values compare equal.
            Column::Numeric(v) if v[row].is_nan() => CellKey::Number(f64::NAN.to_bits()),
            Column::Numeric(v) => CellKey::Number((v[row] + 0.0).to_bits()),
            Column::Categorical(v) => CellKey::Text(v[row].as_deref()),
        }
    }
}

/// Hashable view of one cell, used for duplicate-row detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CellKey<'a> {
    Number(u64),
    Text(Option<&'a str>),
}

impl Hash for CellKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            CellKey::Number(bits) => {
                0u8.hash(state);
                bits.hash(state);
            }
            CellKey::Text(s) => {
                1u8.hash(state);
                s.hash(state);
            }
        }
    }
}

// =============================================================================
// Frame
// =============================================================================

/// A table of equally long, uniquely named columns.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frame {
    names: Vec<String>,
    columns: Vec<Column>,
    n_rows: usize,
}

impl Frame {
    /// Build a frame, checking that names are unique and lengths agree.
    pub fn from_columns(columns: Vec<(String, Column)>) -> Result<Self> {
        let mut frame = Frame::default();
        for (name, column) in columns {
            if frame.has_column(&name) {
                return Err(Error::schema(format!("duplicate column '{name}'")));
            }
            frame.push(name, column)?;
        }
        Ok(frame)
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.position(name).map(|i| &self.columns[i])
    }

    pub fn numeric(&self, name: &str) -> Option<&[f64]> {
        self.column(name).and_then(Column::as_numeric)
    }

    pub fn categorical(&self, name: &str) -> Option<&[Option<String>]> {
        self.column(name).and_then(Column::as_categorical)
    }

    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.names.iter().map(String::as_str).zip(self.columns.iter())
    }

    /// Return a frame with `name` set to `column`, replacing an existing
    /// column of that name in place or appending a new one.
    pub fn with_column(mut self, name: impl Into<String>, column: Column) -> Result<Self> {
        let name = name.into();
        self.check_len(&name, &column)?;
        match self.position(&name) {
            Some(i) => self.columns[i] = column,
            None => {
                if self.columns.is_empty() {
                    self.n_rows = column.len();
                }
                self.names.push(name);
                self.columns.push(column);
            }
        }
        Ok(self)
    }

    /// In-place variant of [`with_column`](Self::with_column) for columns the
    /// crate derives from this frame, whose length is known to match.
    pub(crate) fn set_column(&mut self, name: &str, column: Column) {
        debug_assert!(self.columns.is_empty() || column.len() == self.n_rows);
        match self.position(name) {
            Some(i) => self.columns[i] = column,
            None => {
                if self.columns.is_empty() {
                    self.n_rows = column.len();
                }
                self.names.push(name.to_string());
                self.columns.push(column);
            }
        }
    }

    /// Frame without the listed columns. Absent names are ignored.
    pub fn without_columns(&self, drop: &[&str]) -> Frame {
        let mut out = Frame {
            n_rows: self.n_rows,
            ..Frame::default()
        };
        for (name, column) in self.columns() {
            if !drop.contains(&name) {
                out.names.push(name.to_string());
                out.columns.push(column.clone());
            }
        }
        out
    }

    /// Frame containing only the given rows, in the given order.
    pub fn take_rows(&self, rows: &[usize]) -> Frame {
        Frame {
            names: self.names.clone(),
            columns: self.columns.iter().map(|c| c.take(rows)).collect(),
            n_rows: rows.len(),
        }
    }

    /// Hashable key covering every cell of `row`.
    pub fn row_key(&self, row: usize) -> Vec<CellKey<'_>> {
        self.columns.iter().map(|c| c.cell_key(row)).collect()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    fn push(&mut self, name: String, column: Column) -> Result<()> {
        self.check_len(&name, &column)?;
        if self.columns.is_empty() {
            self.n_rows = column.len();
        }
        self.names.push(name);
        self.columns.push(column);
        Ok(())
    }

    fn check_len(&self, name: &str, column: &Column) -> Result<()> {
        if !self.columns.is_empty() && column.len() != self.n_rows {
            return Err(Error::schema(format!(
                "column '{name}' has {} rows, frame has {}",
                column.len(),
                self.n_rows
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Frame {
        Frame::from_columns(vec![
            ("a".into(), Column::Numeric(vec![1.0, 2.0, f64::NAN])),
            (
                "b".into(),
                Column::Categorical(vec![Some("x".into()), None, Some("y".into())]),
            ),
        ])
        .unwrap()
    }

    #[test]
    fn test_from_columns_rejects_length_mismatch() {
        let result = Frame::from_columns(vec![
            ("a".into(), Column::Numeric(vec![1.0])),
            ("b".into(), Column::Numeric(vec![1.0, 2.0])),
        ]);
        assert!(matches!(result, Err(Error::Schema(_))));
    }

    #[test]
    fn test_from_columns_rejects_duplicate_names() {
        let result = Frame::from_columns(vec![
            ("a".into(), Column::Numeric(vec![1.0])),
            ("a".into(), Column::Numeric(vec![2.0])),
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_column_overwrites_in_place() {
        let frame = sample()
            .with_column("a", Column::Numeric(vec![9.0, 9.0, 9.0]))
            .unwrap();
        assert_eq!(frame.names(), &["a".to_string(), "b".to_string()]);
        assert_eq!(frame.numeric("a"), Some(&[9.0, 9.0, 9.0][..]));
    }

    #[test]
    fn test_missing_count() {
        let frame = sample();
        assert_eq!(frame.column("a").unwrap().missing_count(), 1);
        assert_eq!(frame.column("b").unwrap().missing_count(), 1);
    }

    #[test]
    fn test_take_rows_and_drop() {
        let frame = sample().take_rows(&[2, 0]);
        assert_eq!(frame.n_rows(), 2);
        assert_eq!(frame.categorical("b").unwrap()[0].as_deref(), Some("y"));

        let dropped = frame.without_columns(&["a", "missing"]);
        assert_eq!(dropped.n_cols(), 1);
        assert_eq!(dropped.n_rows(), 2);
    }

    #[test]
    fn test_row_keys_treat_nan_as_equal() {
        let frame = Frame::from_columns(vec![(
            "a".into(),
            Column::Numeric(vec![f64::NAN, -f64::NAN, 0.0, -0.0]),
        )])
        .unwrap();
        assert_eq!(frame.row_key(0), frame.row_key(1));
        assert_eq!(frame.row_key(2), frame.row_key(3));
    }
}
