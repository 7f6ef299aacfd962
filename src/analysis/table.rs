//! Labelled result tables (horizon x bucket)

use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1, Axis};
use std::fmt;
use std::path::Path;

/// Matrix of statistics with a numeric row index and named columns
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    pub title: String,
    pub index_name: String,
    pub index: Vec<usize>,
    pub columns: Vec<String>,
    pub values: Array2<f64>,
}

impl Table {
    /// Create a table filled with `NaN`
    pub fn new(
        title: impl Into<String>,
        index_name: impl Into<String>,
        index: Vec<usize>,
        columns: Vec<String>,
    ) -> Self {
        let values = Array2::from_elem((index.len(), columns.len()), f64::NAN);
        Self {
            title: title.into(),
            index_name: index_name.into(),
            index,
            columns,
            values,
        }
    }

    pub fn nrows(&self) -> usize {
        self.index.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Column by name
    pub fn column(&self, name: &str) -> Option<ArrayView1<'_, f64>> {
        self.column_index(name)
            .map(|j| self.values.index_axis(Axis(1), j))
    }

    /// Cell by row key and column name
    pub fn get(&self, key: usize, column: &str) -> Option<f64> {
        let i = self.index.iter().position(|k| *k == key)?;
        let j = self.column_index(column)?;
        Some(self.values[[i, j]])
    }

    /// Fill a whole column
    pub fn set_column(&mut self, j: usize, values: &[f64]) -> Result<()> {
        if values.len() != self.nrows() || j >= self.ncols() {
            return Err(Error::ShapeMismatch {
                expected: (self.nrows(), self.ncols()),
                got: (values.len(), j + 1),
            });
        }
        for (i, v) in values.iter().enumerate() {
            self.values[[i, j]] = *v;
        }
        Ok(())
    }

    /// Write as CSV with a header row
    pub fn write_csv<W: std::io::Write>(&self, writer: W) -> Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        let mut header = vec![self.index_name.clone()];
        header.extend(self.columns.iter().cloned());
        wtr.write_record(&header)?;
        for (i, key) in self.index.iter().enumerate() {
            let mut record = vec![key.to_string()];
            record.extend(self.values.row(i).iter().map(|v| v.to_string()));
            wtr.write_record(&record)?;
        }
        wtr.flush()?;
        Ok(())
    }

    /// Save as a CSV file
    pub fn save_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        self.write_csv(file)
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .columns
            .iter()
            .map(|c| c.len())
            .max()
            .unwrap_or(0)
            .max(9);
        writeln!(f, "{}", self.title)?;
        write!(f, "{:>8}", self.index_name)?;
        for c in &self.columns {
            write!(f, " {:>width$}", c, width = width)?;
        }
        writeln!(f)?;
        for (i, key) in self.index.iter().enumerate() {
            write!(f, "{:>8}", key)?;
            for v in self.values.row(i) {
                write!(f, " {:>width$.4}", v, width = width)?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
