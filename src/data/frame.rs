//! Feature frames recorded from the order book
//!
//! A frame is a plain whitespace-separated text table with one row per
//! sampling instant and the fixed columns `t x c1 c2 b a`:
//!
//! | column | meaning                                         |
//! |--------|-------------------------------------------------|
//! | `t`    | sample time in seconds                          |
//! | `x`    | size-weighted mid price                         |
//! | `c1`   | displayed size at the best bid                  |
//! | `c2`   | displayed size at the best offer                |
//! | `b`    | age in seconds of the front order at best bid   |
//! | `a`    | age in seconds of the front order at best offer |

use crate::error::{Error, Result};
use std::fmt::Write as _;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

/// Column names in file order
pub const COLUMNS: [&str; 6] = ["t", "x", "c1", "c2", "b", "a"];

/// One sampled row
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureRow {
    pub t: f64,
    pub x: f64,
    pub c1: f64,
    pub c2: f64,
    pub b: f64,
    pub a: f64,
}

impl FeatureRow {
    fn from_values(values: [f64; 6]) -> Self {
        let [t, x, c1, c2, b, a] = values;
        Self { t, x, c1, c2, b, a }
    }

    fn values(&self) -> [f64; 6] {
        [self.t, self.x, self.c1, self.c2, self.b, self.a]
    }

    /// Age on the best offer minus age on the best bid
    pub fn age_difference(&self) -> f64 {
        self.a - self.b
    }
}

/// Table of feature rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFrame {
    rows: Vec<FeatureRow>,
}

impl FeatureFrame {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<FeatureRow>) -> Self {
        Self { rows }
    }

    pub fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    /// Copy one column out by name
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let idx = COLUMNS
            .iter()
            .position(|c| *c == name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown column '{}'", name)))?;
        Ok(self.rows.iter().map(|r| r.values()[idx]).collect())
    }

    /// Weighted mid column
    pub fn mid(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.x).collect()
    }

    /// `a - b` for every row
    pub fn age_difference(&self) -> Vec<f64> {
        self.rows.iter().map(FeatureRow::age_difference).collect()
    }

    /// Parse frame text
    pub fn parse(text: &str) -> Result<Self> {
        Self::read(text.as_bytes())
    }

    /// Read a frame from any reader
    pub fn read<R: std::io::Read>(reader: R) -> Result<Self> {
        let mut rows = Vec::new();
        for (i, line) in BufReader::new(reader).lines().enumerate() {
            let line = line?;
            let content = line.split('#').next().unwrap_or("").trim();
            if content.is_empty() {
                continue;
            }
            let fields: Vec<&str> = content.split_whitespace().collect();
            if fields.len() != COLUMNS.len() {
                return Err(Error::parse(
                    i + 1,
                    format!("expected {} columns, found {}", COLUMNS.len(), fields.len()),
                ));
            }
            let mut values = [0.0; 6];
            for (slot, field) in values.iter_mut().zip(&fields) {
                *slot = parse_number(field).ok_or_else(|| {
                    Error::parse(i + 1, format!("cannot parse '{}' as a number", field))
                })?;
            }
            rows.push(FeatureRow::from_values(values));
        }
        Ok(Self { rows })
    }

    /// Load a frame from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path.as_ref())?;
        let frame = Self::read(file)?;
        if frame.is_empty() {
            return Err(Error::InsufficientData(format!(
                "no rows in {}",
                path.as_ref().display()
            )));
        }
        Ok(frame)
    }

    /// Write the frame as text
    pub fn write<W: Write>(&self, mut writer: W) -> Result<()> {
        writeln!(writer, "# {}", COLUMNS.join(" "))?;
        let mut line = String::new();
        for row in &self.rows {
            line.clear();
            for (i, v) in row.values().iter().enumerate() {
                if i > 0 {
                    line.push(' ');
                }
                // Infallible for String
                let _ = write!(line, "{}", format_number(*v));
            }
            writeln!(writer, "{}", line)?;
        }
        Ok(())
    }

    /// Save the frame to a file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let mut writer = std::io::BufWriter::new(file);
        self.write(&mut writer)?;
        writer.flush()?;
        Ok(())
    }
}

fn parse_number(field: &str) -> Option<f64> {
    match field.to_ascii_lowercase().as_str() {
        "nan" => Some(f64::NAN),
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}

fn format_number(v: f64) -> String {
    if v.is_nan() {
        "nan".to_string()
    } else {
        format!("{}", v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
# t x c1 c2 b a
0 100.5 3 4 1.0 2.5
1 100.75 3 2 2.0 0.5

2 nan 0 0 nan nan
";

    #[test]
    fn test_parse_sample() {
        let frame = FeatureFrame::parse(SAMPLE).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.mid()[1], 100.75);
        assert_eq!(frame.age_difference()[0], 1.5);
        assert!(frame.rows()[2].x.is_nan());
    }

    #[test]
    fn test_wrong_column_count() {
        let err = FeatureFrame::parse("1 2 3\n").unwrap_err();
        match err {
            Error::Parse { line, .. } => assert_eq!(line, 1),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_bad_number_reports_line() {
        let err = FeatureFrame::parse("0 1 2 3 4 5\n0 1 2 x 4 5\n").unwrap_err();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_column_lookup() {
        let frame = FeatureFrame::parse(SAMPLE).unwrap();
        assert_eq!(frame.column("c2").unwrap(), vec![4.0, 2.0, 0.0]);
        assert!(frame.column("volume").is_err());
    }

    #[test]
    fn test_write_then_read_keeps_nan() {
        let frame = FeatureFrame::parse(SAMPLE).unwrap();
        let mut buf = Vec::new();
        frame.write(&mut buf).unwrap();
        let back = FeatureFrame::read(buf.as_slice()).unwrap();
        assert_eq!(back.len(), 3);
        assert_eq!(back.rows()[0], frame.rows()[0]);
        assert!(back.rows()[2].b.is_nan());
    }

    #[test]
    fn test_load_empty_file_is_insufficient() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");
        std::fs::write(&path, "# nothing here\n").unwrap();
        assert!(matches!(
            FeatureFrame::load(&path),
            Err(Error::InsufficientData(_))
        ));
    }
}
