//! Feature-major input container for boosted models.
//!
//! Boosted backends consume a dedicated container rather than the request batch
//! itself: values are converted to `f32`, transposed to `[n_features, n_rows]`
//! and tagged with the feature names they were bound to. Models check those names
//! against their own before predicting.

use ndarray::{Array2, ArrayView1, ArrayView2};

use super::FeatureBatch;

/// Feature-major `f32` matrix with named columns.
#[derive(Debug, Clone)]
pub struct BoostMatrix {
    /// Shape `[n_features, n_rows]`.
    features: Array2<f32>,
    feature_names: Vec<String>,
}

impl BoostMatrix {
    /// Build from a validated batch, keeping the schema's column binding.
    pub fn from_batch(batch: &FeatureBatch) -> Self {
        let features = batch.values().t().mapv(|v| v as f32);
        Self {
            features,
            feature_names: batch.feature_names().to_vec(),
        }
    }

    #[inline]
    pub fn n_rows(&self) -> usize {
        self.features.ncols()
    }

    #[inline]
    pub fn n_features(&self) -> usize {
        self.features.nrows()
    }

    #[inline]
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// All values, feature-major.
    #[inline]
    pub fn view(&self) -> ArrayView2<'_, f32> {
        self.features.view()
    }

    /// Values of one feature across all rows (contiguous).
    #[inline]
    pub fn feature(&self, idx: usize) -> ArrayView1<'_, f32> {
        self.features.row(idx)
    }

    /// One sample (strided view across features).
    #[inline]
    pub fn sample(&self, row: usize) -> ArrayView1<'_, f32> {
        self.features.column(row)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::schema::FeatureSchema;

    #[test]
    fn transposes_and_keeps_names() {
        let schema = Arc::new(FeatureSchema::new(["x", "y"]).unwrap());
        let batch = FeatureBatch::from_rows(&[[1.0, 2.0], [3.0, 4.0], [5.0, 6.0]], &schema).unwrap();
        let matrix = BoostMatrix::from_batch(&batch);

        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.n_features(), 2);
        assert_eq!(matrix.feature(1).to_vec(), vec![2.0, 4.0, 6.0]);
        assert_eq!(matrix.sample(2).to_vec(), vec![5.0, 6.0]);
        assert_eq!(matrix.feature_names(), ["x", "y"]);
    }
}
