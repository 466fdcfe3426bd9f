//! Column-ordered tables keyed by a row index.
//!
//! A [`Table`] is the labeled shape the builder works in: the gene and cell
//! metadata handed over at ingestion, and the three embedding tables. Column
//! order is significant because it becomes the field order of the structured
//! arrays written to the file.

use scopeloom_core::{LoomError, Result, Summarizable};

use crate::single_cell::ColumnData;

/// A row index plus an ordered list of named, equally long columns.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    index: Vec<String>,
    columns: Vec<(String, ColumnData)>,
}

impl Table {
    /// An empty table over the given row index.
    pub fn new(index: Vec<String>) -> Self {
        Self {
            index,
            columns: Vec::new(),
        }
    }

    /// Build a table from columns in order. Later duplicates replace earlier ones.
    pub fn from_columns(index: Vec<String>, columns: Vec<(String, ColumnData)>) -> Result<Self> {
        let mut table = Self::new(index);
        for (name, data) in columns {
            table.set_column(&name, data)?;
        }
        Ok(table)
    }

    /// Number of rows.
    pub fn n_rows(&self) -> usize {
        self.index.len()
    }

    /// Number of columns.
    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    /// Row labels.
    pub fn index(&self) -> &[String] {
        &self.index
    }

    /// Column names in order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> + '_ {
        self.columns.iter().map(|(name, _)| name.as_str())
    }

    /// Columns in order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &ColumnData)> + '_ {
        self.columns.iter().map(|(name, data)| (name.as_str(), data))
    }

    /// Look up a column by name.
    pub fn get(&self, name: &str) -> Option<&ColumnData> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, data)| data)
    }

    /// Assign a column. An existing column keeps its position; a new one is appended.
    pub fn set_column(&mut self, name: &str, data: ColumnData) -> Result<()> {
        if data.len() != self.n_rows() {
            return Err(LoomError::InvalidInput(format!(
                "column '{}' length ({}) does not match table length ({})",
                name,
                data.len(),
                self.n_rows()
            )));
        }
        match self.columns.iter_mut().find(|(n, _)| n == name) {
            Some(slot) => slot.1 = data,
            None => self.columns.push((name.to_string(), data)),
        }
        Ok(())
    }
}

impl Summarizable for Table {
    fn summary(&self) -> String {
        format!("Table: {} rows \u{00d7} {} columns", self.n_rows(), self.n_cols())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cells() -> Vec<String> {
        vec!["c1".into(), "c2".into()]
    }

    #[test]
    fn set_column_appends_then_replaces_in_place() {
        let mut t = Table::new(cells());
        t.set_column("b", ColumnData::Numeric(vec![1.0, 2.0])).unwrap();
        t.set_column("a", ColumnData::Numeric(vec![3.0, 4.0])).unwrap();
        t.set_column("b", ColumnData::Numeric(vec![5.0, 6.0])).unwrap();

        assert_eq!(t.column_names().collect::<Vec<_>>(), ["b", "a"]);
        assert_eq!(t.get("b"), Some(&ColumnData::Numeric(vec![5.0, 6.0])));
    }

    #[test]
    fn length_mismatch_rejected() {
        let mut t = Table::new(cells());
        let err = t.set_column("x", ColumnData::Numeric(vec![1.0])).unwrap_err();
        assert!(matches!(err, LoomError::InvalidInput(_)));
        assert_eq!(t.n_cols(), 0);
    }

    #[test]
    fn from_columns_keeps_order() {
        let t = Table::from_columns(
            cells(),
            vec![
                ("n".into(), ColumnData::Integers(vec![1, 2])),
                ("s".into(), ColumnData::Strings(vec!["x".into(), "y".into()])),
            ],
        )
        .unwrap();
        assert_eq!(t.summary(), "Table: 2 rows \u{00d7} 2 columns");
        assert_eq!(t.column_names().collect::<Vec<_>>(), ["n", "s"]);
        assert_eq!(t.get("n"), Some(&ColumnData::Integers(vec![1, 2])));
    }
}
