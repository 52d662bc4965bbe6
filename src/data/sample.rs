//! # Sample Metadata Table
//!
//! The ordered list of cohort samples with their structured attributes,
//! backed by the `.spl` text table. The row order defines the sample index:
//! sample `i` owns haplotype columns `2i` and `2i+1` of the genotype matrix.

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::error::{RegattaError, Result};

/// A typed sample attribute value
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f64),
    Str(String),
}

impl AttrValue {
    /// Type a raw attribute string: integer, then float, then string
    pub fn parse(raw: &str) -> Self {
        if let Ok(v) = raw.parse::<i64>() {
            Self::Int(v)
        } else if let Ok(v) = raw.parse::<f64>() {
            Self::Float(v)
        } else {
            Self::Str(raw.to_string())
        }
    }

    /// Numeric view, if this value is numeric
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Str(_) => None,
        }
    }

    /// String view, if this value is a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s.as_str()),
            _ => None,
        }
    }
}

impl std::fmt::Display for AttrValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Str(s) => write!(f, "{}", s),
        }
    }
}

/// One sample row: a unique name plus key-value attributes
#[derive(Clone, Debug, PartialEq)]
pub struct SampleRow {
    pub name: String,
    pub attrs: Vec<(String, AttrValue)>,
}

impl SampleRow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attrs: Vec::new(),
        }
    }

    /// Look up an attribute by key
    pub fn attr(&self, key: &str) -> Option<&AttrValue> {
        self.attrs.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn push_attr(&mut self, key: impl Into<String>, value: AttrValue) {
        self.attrs.push((key.into(), value));
    }
}

/// The ordered, name-indexed sample table of one store
#[derive(Clone, Debug, Default)]
pub struct SampleTable {
    rows: Vec<SampleRow>,
    index: HashMap<String, usize>,
}

impl SampleTable {
    /// Build from rows; duplicate names are rejected
    pub fn from_rows(rows: Vec<SampleRow>) -> Result<Self> {
        let mut index = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            if index.insert(row.name.clone(), i).is_some() {
                return Err(RegattaError::parse(
                    i + 1,
                    format!("duplicate sample name '{}'", row.name),
                ));
            }
        }
        Ok(Self { rows, index })
    }

    /// Load a `.spl` text table: one sample per line, name first, then
    /// TAB-separated `key=value` attributes. `#` lines and blanks skipped.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let mut rows = Vec::new();
        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim_end();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split('\t');
            let name = fields.next().unwrap_or("");
            if name.is_empty() {
                return Err(RegattaError::parse(lineno + 1, "empty sample name"));
            }
            let mut row = SampleRow::new(name);
            for field in fields {
                if field.is_empty() {
                    continue;
                }
                let (key, raw) = field.split_once('=').ok_or_else(|| {
                    RegattaError::parse(
                        lineno + 1,
                        format!("attribute '{}' is not key=value", field),
                    )
                })?;
                row.push_attr(key, AttrValue::parse(raw));
            }
            rows.push(row);
        }
        Self::from_rows(rows)
    }

    /// Write the table back out in `.spl` form (the write half of the codec,
    /// used when assembling stores)
    pub fn save(&self, path: &Path) -> Result<()> {
        use std::io::Write;
        let mut out = std::io::BufWriter::new(File::create(path)?);
        for row in &self.rows {
            write!(out, "{}", row.name)?;
            for (key, value) in &row.attrs {
                write!(out, "\t{}={}", key, value)?;
            }
            writeln!(out)?;
        }
        out.flush()?;
        Ok(())
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sample row by index
    pub fn get(&self, idx: usize) -> Option<&SampleRow> {
        self.rows.get(idx)
    }

    /// All rows in sample order
    pub fn rows(&self) -> &[SampleRow] {
        &self.rows
    }

    /// Sample index by name
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attr_typing() {
        assert_eq!(AttrValue::parse("3"), AttrValue::Int(3));
        assert_eq!(AttrValue::parse("3.5"), AttrValue::Float(3.5));
        assert_eq!(AttrValue::parse("CEU"), AttrValue::Str("CEU".into()));
    }

    #[test]
    fn test_from_rows_rejects_duplicates() {
        let rows = vec![SampleRow::new("A"), SampleRow::new("A")];
        assert!(SampleTable::from_rows(rows).is_err());
    }

    #[test]
    fn test_load_and_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.spl");
        std::fs::write(
            &path,
            "# cohort samples\nNA001\tpop=CEU\tage=41\nNA002\tpop=YRI\tage=33.5\n",
        )
        .unwrap();

        let table = SampleTable::load(&path).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.position("NA002"), Some(1));
        let row = table.get(0).unwrap();
        assert_eq!(row.attr("pop"), Some(&AttrValue::Str("CEU".into())));
        assert_eq!(row.attr("age"), Some(&AttrValue::Int(41)));
        assert_eq!(
            table.get(1).unwrap().attr("age"),
            Some(&AttrValue::Float(33.5))
        );
    }

    #[test]
    fn test_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cohort.spl");
        let mut row = SampleRow::new("S1");
        row.push_attr("pop", AttrValue::Str("GBR".into()));
        let table = SampleTable::from_rows(vec![row, SampleRow::new("S2")]).unwrap();
        table.save(&path).unwrap();

        let back = SampleTable::load(&path).unwrap();
        assert_eq!(back.rows(), table.rows());
    }
}
