//! Linear model data structure.

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};

/// Linear model (weights + bias).
///
/// Weights are stored as an `Array2<f64>` with shape `[n_features + 1, n_groups]`:
///
/// ```text
/// weights[[feature, group]] → coefficient
/// weights[[n_features, group]] → bias (last row)
/// ```
///
/// This layout enables a single matrix product for prediction:
/// `output = features · weights[:-1, :] + weights[-1, :]`
#[derive(Debug, Clone, PartialEq)]
pub struct LinearModel {
    weights: Array2<f64>,
}

impl LinearModel {
    /// Create a linear model from an ndarray with the bias in the last row.
    ///
    /// # Panics
    ///
    /// Panics if the array has no rows.
    pub fn from_array(weights: Array2<f64>) -> Self {
        assert!(
            weights.nrows() >= 1,
            "weights must have at least 1 row (bias)"
        );
        Self { weights }
    }

    /// Binary model from coefficients and a single intercept.
    pub fn binary(coefficients: &[f64], intercept: f64) -> Self {
        let n_features = coefficients.len();
        let mut weights = Array2::zeros((n_features + 1, 1));
        for (idx, &c) in coefficients.iter().enumerate() {
            weights[[idx, 0]] = c;
        }
        weights[[n_features, 0]] = intercept;
        Self { weights }
    }

    /// Number of input features.
    #[inline]
    pub fn n_features(&self) -> usize {
        self.weights.nrows() - 1
    }

    /// Number of output groups.
    #[inline]
    pub fn n_groups(&self) -> usize {
        self.weights.ncols()
    }

    #[inline]
    pub fn weight(&self, feature: usize, group: usize) -> f64 {
        self.weights[[feature, group]]
    }

    #[inline]
    pub fn bias(&self, group: usize) -> f64 {
        self.weights[[self.n_features(), group]]
    }

    #[inline]
    pub fn biases(&self) -> ArrayView1<'_, f64> {
        self.weights.row(self.n_features())
    }

    /// Weight matrix without the bias row, shape `[n_features, n_groups]`.
    #[inline]
    pub fn weight_matrix(&self) -> ArrayView2<'_, f64> {
        self.weights.slice(s![..self.n_features(), ..])
    }

    /// Margins for sample-major data `[n_rows, n_features]`.
    ///
    /// Returns shape `[n_rows, n_groups]`.
    pub fn predict_margins(&self, samples: ArrayView2<'_, f64>) -> Array2<f64> {
        let mut out = samples.dot(&self.weight_matrix());
        out += &self.biases();
        out
    }

    /// Margins for a single group on feature-major data `[n_features, n_rows]`.
    pub fn predict_group_feature_major(
        &self,
        features: ArrayView2<'_, f32>,
        group: usize,
    ) -> Array1<f64> {
        let n_rows = features.ncols();
        let mut out = Array1::from_elem(n_rows, self.bias(group));
        for (feature, column) in features.outer_iter().enumerate() {
            let w = self.weight(feature, group);
            out.zip_mut_with(&column, |acc, &x| *acc += w * f64::from(x));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn layout_accessors() {
        let model = LinearModel::from_array(array![[0.1, 0.2], [0.3, 0.4], [0.5, 0.6]]);
        assert_eq!(model.n_features(), 2);
        assert_eq!(model.n_groups(), 2);
        assert_eq!(model.weight(1, 0), 0.3);
        assert_eq!(model.bias(1), 0.6);
    }

    #[test]
    fn sample_major_and_feature_major_agree() {
        let model = LinearModel::binary(&[1.0, -2.0], 0.5);
        let samples = array![[1.0, 1.0], [2.0, 0.5]];
        let margins = model.predict_margins(samples.view());
        assert_eq!(margins, array![[-0.5], [1.5]]);

        let feature_major = array![[1.0f32, 2.0], [1.0, 0.5]];
        let fm = model.predict_group_feature_major(feature_major.view(), 0);
        assert_eq!(fm, array![-0.5, 1.5]);
    }
}
