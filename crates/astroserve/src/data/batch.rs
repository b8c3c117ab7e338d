//! Validated feature batches bound to a [`FeatureSchema`].
//!
//! Validation runs in two passes over the whole input so that shape problems are
//! always reported before type problems:
//!
//! 1. shape: the input is a non-empty list of rows, each with exactly N values;
//! 2. type: every value is a finite number.

use std::sync::Arc;

use ndarray::{Array2, ArrayView1, ArrayView2};
use serde_json::Value;

use crate::error::BatchError;
use crate::schema::FeatureSchema;

/// Rectangular `[n_rows, N]` matrix whose columns follow the schema order.
#[derive(Debug, Clone)]
pub struct FeatureBatch {
    values: Array2<f64>,
    schema: Arc<FeatureSchema>,
}

impl FeatureBatch {
    /// Validate raw JSON (`[[f, f, ...], ...]`) against the schema.
    pub fn parse(data: &Value, schema: &Arc<FeatureSchema>) -> Result<Self, BatchError> {
        let rows = data.as_array().ok_or(BatchError::NotATable)?;
        let expected = schema.len();
        let table = check_shape(rows.iter().map(|r| r.as_array().map(Vec::as_slice)), expected)?;

        let mut values = Array2::zeros((table.len(), expected));
        for (row, cells) in table.iter().enumerate() {
            for (column, cell) in cells.iter().enumerate() {
                let number = numeric_cell(cell).ok_or_else(|| BatchError::NonNumeric {
                    row,
                    column,
                    found: cell.to_string(),
                })?;
                values[[row, column]] = number;
            }
        }

        Ok(Self {
            values,
            schema: Arc::clone(schema),
        })
    }

    /// Validate already-typed rows against the schema.
    pub fn from_rows<R: AsRef<[f64]>>(
        rows: &[R],
        schema: &Arc<FeatureSchema>,
    ) -> Result<Self, BatchError> {
        let expected = schema.len();
        let table = check_shape(rows.iter().map(|r| Some(r.as_ref())), expected)?;

        let mut values = Array2::zeros((table.len(), expected));
        for (row, cells) in table.iter().enumerate() {
            for (column, &cell) in cells.iter().enumerate() {
                if !cell.is_finite() {
                    return Err(BatchError::NonFinite { row, column });
                }
                values[[row, column]] = cell;
            }
        }

        Ok(Self {
            values,
            schema: Arc::clone(schema),
        })
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.values.nrows()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.values.ncols()
    }

    /// Sample-major view `[n_rows, n_features]`.
    #[inline]
    pub fn values(&self) -> ArrayView2<'_, f64> {
        self.values.view()
    }

    /// One sample.
    #[inline]
    pub fn row(&self, idx: usize) -> ArrayView1<'_, f64> {
        self.values.row(idx)
    }

    /// One sample in single precision, as tree backends consume it.
    pub fn row_f32(&self, idx: usize) -> Vec<f32> {
        self.values.row(idx).iter().map(|&v| v as f32).collect()
    }

    #[inline]
    pub fn schema(&self) -> &Arc<FeatureSchema> {
        &self.schema
    }

    /// Column names, in order.
    #[inline]
    pub fn feature_names(&self) -> &[String] {
        self.schema.names()
    }
}

fn check_shape<'a, T: 'a, I>(rows: I, expected: usize) -> Result<Vec<&'a [T]>, BatchError>
where
    I: Iterator<Item = Option<&'a [T]>>,
{
    let mut table = Vec::new();
    for (row, cells) in rows.enumerate() {
        let cells = cells.ok_or(BatchError::RowNotArray { row })?;
        if cells.len() != expected {
            return Err(BatchError::RowLength {
                row,
                expected,
                actual: cells.len(),
            });
        }
        table.push(cells);
    }
    if table.is_empty() {
        return Err(BatchError::Empty);
    }
    Ok(table)
}

fn numeric_cell(cell: &Value) -> Option<f64> {
    match cell {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    fn schema() -> Arc<FeatureSchema> {
        Arc::new(FeatureSchema::new(["a", "b", "c"]).unwrap())
    }

    #[test]
    fn parses_integers_and_floats() {
        let batch = FeatureBatch::parse(&json!([[1, 2.5, -3], [0.0, 0, 1e3]]), &schema()).unwrap();
        assert_eq!(batch.n_rows(), 2);
        assert_eq!(batch.n_features(), 3);
        assert_eq!(batch.row(0).to_vec(), vec![1.0, 2.5, -3.0]);
        assert_eq!(batch.row_f32(1), vec![0.0, 0.0, 1000.0]);
        assert_eq!(batch.feature_names(), ["a", "b", "c"]);
    }

    #[rstest]
    #[case::not_a_list(json!({"a": 1}), BatchError::NotATable)]
    #[case::empty(json!([]), BatchError::Empty)]
    #[case::flat(json!([1.0, 2.0, 3.0]), BatchError::RowNotArray { row: 0 })]
    #[case::short(json!([[1.0, 2.0]]), BatchError::RowLength { row: 0, expected: 3, actual: 2 })]
    #[case::long(json!([[1, 2, 3], [1, 2, 3, 4]]), BatchError::RowLength { row: 1, expected: 3, actual: 4 })]
    #[case::string(json!([[1, "2", 3]]), BatchError::NonNumeric { row: 0, column: 1, found: "\"2\"".into() })]
    #[case::null(json!([[1, 2, 3], [1, 2, null]]), BatchError::NonNumeric { row: 1, column: 2, found: "null".into() })]
    #[case::boolean(json!([[true, 2, 3]]), BatchError::NonNumeric { row: 0, column: 0, found: "true".into() })]
    fn rejects_malformed_input(#[case] data: Value, #[case] expected: BatchError) {
        assert_eq!(FeatureBatch::parse(&data, &schema()).unwrap_err(), expected);
    }

    #[test]
    fn shape_errors_win_over_type_errors() {
        // Row 0 has a bad value, row 1 has a bad length: shape is checked first.
        let data = json!([[1, "x", 3], [1, 2]]);
        assert_eq!(
            FeatureBatch::parse(&data, &schema()).unwrap_err(),
            BatchError::RowLength {
                row: 1,
                expected: 3,
                actual: 2
            }
        );
    }

    #[test]
    fn typed_rows_reject_non_finite() {
        let rows = vec![vec![1.0, 2.0, 3.0], vec![1.0, f64::NAN, 3.0]];
        assert_eq!(
            FeatureBatch::from_rows(&rows, &schema()).unwrap_err(),
            BatchError::NonFinite { row: 1, column: 1 }
        );
        let rows = vec![vec![1.0, 2.0]];
        assert!(matches!(
            FeatureBatch::from_rows(&rows, &schema()),
            Err(BatchError::RowLength { .. })
        ));
    }
}
