use std::collections::HashSet;

use crate::error::{PipelineError, Result};

/// Cell storage for a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Numeric(values) => values.len(),
            ColumnData::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, ColumnData::Numeric(_))
    }

    fn filter(&self, mask: &[bool]) -> Self {
        match self {
            ColumnData::Numeric(values) => ColumnData::Numeric(masked(values, mask)),
            ColumnData::Text(values) => ColumnData::Text(masked(values, mask)),
        }
    }

    fn take(&self, indices: &[usize]) -> Self {
        match self {
            ColumnData::Numeric(values) => {
                ColumnData::Numeric(indices.iter().map(|&i| values[i]).collect())
            }
            ColumnData::Text(values) => {
                ColumnData::Text(indices.iter().map(|&i| values[i].clone()).collect())
            }
        }
    }
}

fn masked<T: Clone>(values: &[T], mask: &[bool]) -> Vec<T> {
    values
        .iter()
        .zip(mask)
        .filter(|(_, keep)| **keep)
        .map(|(value, _)| value.clone())
        .collect()
}

/// A named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

impl Column {
    pub fn numeric(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Numeric(values),
        }
    }

    pub fn text(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self {
            name: name.into(),
            data: ColumnData::Text(values),
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_numeric(&self) -> Option<&[Option<f64>]> {
        match &self.data {
            ColumnData::Numeric(values) => Some(values),
            ColumnData::Text(_) => None,
        }
    }
}

/// Column-oriented table whose columns always share one row count.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<Column>,
    rows: usize,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self> {
        let rows = columns.first().map(Column::len).unwrap_or(0);

        let mut seen = HashSet::new();
        for column in &columns {
            if !seen.insert(column.name.as_str()) {
                return Err(PipelineError::Schema(format!(
                    "column '{}' appears more than once",
                    column.name
                )));
            }
            if column.len() != rows {
                return Err(PipelineError::Schema(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.len(),
                    rows
                )));
            }
        }

        Ok(Self { columns, rows })
    }

    pub fn height(&self) -> usize {
        self.rows
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    /// Numeric cells of `name`, or `None` when the column is absent or text.
    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        self.column(name).and_then(Column::as_numeric)
    }

    /// Keep only the rows whose mask entry is `true`, in place.
    pub fn retain_rows(&mut self, mask: &[bool]) {
        assert_eq!(mask.len(), self.rows, "row mask length mismatch");
        for column in &mut self.columns {
            column.data = column.data.filter(mask);
        }
        self.rows = mask.iter().filter(|keep| **keep).count();
    }

    /// Owned copy holding only the rows whose mask entry is `true`.
    pub fn filter_rows(&self, mask: &[bool]) -> Table {
        let mut copy = self.clone();
        copy.retain_rows(mask);
        copy
    }

    /// Owned copy holding the given rows, in the given order.
    pub fn take_rows(&self, indices: &[usize]) -> Table {
        Table {
            columns: self
                .columns
                .iter()
                .map(|c| Column {
                    name: c.name.clone(),
                    data: c.data.take(indices),
                })
                .collect(),
            rows: indices.len(),
        }
    }

    /// Remove every listed column that exists; returns the names removed.
    pub fn drop_columns(&mut self, names: &[&str]) -> Vec<String> {
        self.retain_columns(|column| !names.contains(&column.name.as_str()))
    }

    /// Keep only the listed columns that exist; returns the names removed.
    pub fn select_columns(&mut self, names: &[&str]) -> Vec<String> {
        self.retain_columns(|column| names.contains(&column.name.as_str()))
    }

    fn retain_columns<F>(&mut self, mut keep: F) -> Vec<String>
    where
        F: FnMut(&Column) -> bool,
    {
        let mut removed = Vec::new();
        self.columns.retain(|column| {
            let retained = keep(column);
            if !retained {
                removed.push(column.name.clone());
            }
            retained
        });
        removed
    }

    /// Replace missing cells of every numeric column with `value`.
    /// Returns the number of cells filled.
    pub fn fill_missing_numeric(&mut self, value: f64) -> usize {
        let mut filled = 0;
        for column in &mut self.columns {
            if let ColumnData::Numeric(values) = &mut column.data {
                for cell in values.iter_mut().filter(|cell| cell.is_none()) {
                    *cell = Some(value);
                    filled += 1;
                }
            }
        }
        filled
    }
}
