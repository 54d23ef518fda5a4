//! Row/column-labeled numeric tables stored as CSV.
//!
//! The first header cell names the index column; every other header cell
//! labels a column. Each record starts with its row label followed by one
//! number per column.

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use tracing::debug;

use crate::{Result, SignetError};

#[derive(Debug, Clone, PartialEq)]
pub struct LabeledTable {
    pub row_labels: Vec<String>,
    pub column_labels: Vec<String>,
    pub values: Vec<Vec<f32>>,
}

impl LabeledTable {
    /// Build a table, checking that every row has one value per column label.
    pub fn new(
        row_labels: Vec<String>,
        column_labels: Vec<String>,
        values: Vec<Vec<f32>>,
    ) -> Result<Self> {
        if row_labels.len() != values.len() {
            return Err(SignetError::shape("table rows", row_labels.len(), values.len()));
        }
        if let Some((i, row)) = values
            .iter()
            .enumerate()
            .find(|(_, row)| row.len() != column_labels.len())
        {
            return Err(SignetError::shape(
                format!("table row {i}"),
                column_labels.len(),
                row.len(),
            ));
        }
        Ok(Self {
            row_labels,
            column_labels,
            values,
        })
    }

    /// Read a labeled CSV table.
    pub fn read_csv(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let shown = path.display().to_string();
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)?;

        let column_labels: Vec<String> = reader
            .headers()?
            .iter()
            .skip(1)
            .map(str::to_string)
            .collect();

        let mut row_labels = Vec::new();
        let mut values = Vec::new();
        for record in reader.records() {
            let record = record?;
            let line = record.position().map(|p| p.line()).unwrap_or_default();
            let mut fields = record.iter();
            let label = fields.next().unwrap_or_default().to_string();

            let row = fields
                .map(|field| {
                    field.parse::<f32>().map_err(|e| SignetError::Parse {
                        path: shown.clone(),
                        line,
                        reason: format!("'{field}': {e}"),
                    })
                })
                .collect::<Result<Vec<f32>>>()?;

            row_labels.push(label);
            values.push(row);
        }

        debug!(path = %shown, rows = values.len(), cols = column_labels.len(), "read table");
        Self::new(row_labels, column_labels, values)
    }

    /// Write the table as CSV; `index_name` becomes the first header cell.
    pub fn write_csv(&self, path: impl AsRef<Path>, index_name: &str) -> Result<()> {
        let mut writer = csv::Writer::from_path(path.as_ref())?;

        writer.write_record(
            std::iter::once(index_name).chain(self.column_labels.iter().map(String::as_str)),
        )?;
        for (label, row) in self.row_labels.iter().zip(&self.values) {
            let mut record = Vec::with_capacity(row.len() + 1);
            record.push(label.clone());
            record.extend(row.iter().map(|v| v.to_string()));
            writer.write_record(&record)?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Build a table from a (rows, cols) tensor. Rows are numbered when no labels are given.
    pub fn from_tensor(
        tensor: &Tensor,
        row_labels: Option<Vec<String>>,
        column_labels: Vec<String>,
    ) -> Result<Self> {
        let values = tensor.to_dtype(DType::F32)?.to_vec2::<f32>()?;
        let row_labels =
            row_labels.unwrap_or_else(|| (0..values.len()).map(|i| i.to_string()).collect());
        Self::new(row_labels, column_labels, values)
    }

    /// Convert the values to a (rows, cols) f32 tensor.
    pub fn to_tensor(&self, device: &Device) -> Result<Tensor> {
        let flat: Vec<f32> = self.values.iter().flatten().copied().collect();
        Ok(Tensor::from_vec(flat, (self.nrows(), self.ncols()), device)?)
    }

    pub fn nrows(&self) -> usize {
        self.values.len()
    }

    pub fn ncols(&self) -> usize {
        self.column_labels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> LabeledTable {
        LabeledTable::new(
            vec!["s1".into(), "s2".into()],
            vec!["SBS1".into(), "SBS5".into(), "SBS40".into()],
            vec![vec![0.5, 0.25, 0.25], vec![0.0, 1.0, 0.0]],
        )
        .unwrap()
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("weights.csv");

        let table = sample();
        table.write_csv(&path, "sample").unwrap();
        let read = LabeledTable::read_csv(&path).unwrap();

        assert_eq!(read, table);
    }

    #[test]
    fn test_parse_error_reports_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.csv");
        std::fs::write(&path, "id,a,b\nr1,1.0,2.0\nr2,1.0,oops\n").unwrap();

        match LabeledTable::read_csv(&path) {
            Err(SignetError::Parse {
                path: shown,
                line,
                reason,
            }) => {
                assert_eq!(shown, path.display().to_string());
                assert_eq!(line, 3);
                assert!(reason.contains("oops"));
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = LabeledTable::new(
            vec!["a".into()],
            vec!["x".into(), "y".into()],
            vec![vec![1.0]],
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_tensor_conversion() {
        let table = sample();
        let t = table.to_tensor(&Device::Cpu).unwrap();
        assert_eq!(t.dims(), &[2, 3]);

        let back = LabeledTable::from_tensor(&t, None, table.column_labels.clone()).unwrap();
        assert_eq!(back.values, table.values);
        assert_eq!(back.row_labels, vec!["0".to_string(), "1".to_string()]);
    }
}
