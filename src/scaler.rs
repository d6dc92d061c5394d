//! Zero-mean, unit-variance feature scaling

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Features whose spread collapses below this are passed through unscaled.
const MIN_SPREAD: f64 = 1e-12;

/// Per-feature centering and scaling parameters.
///
/// Fitted once on the training table and frozen; transforming later data
/// never re-fits. Population statistics are used, so a single-row table
/// fits with zero variance and the spread guard takes over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
}

impl StandardScaler {
    /// Learn mean and spread per feature column.
    ///
    /// An empty matrix is an input-data error.
    pub fn fit(data: &Array2<f64>) -> Result<Self> {
        let mean = data.mean_axis(Axis(0)).ok_or_else(|| {
            Error::InputData("cannot fit a scaler on an empty feature table".to_string())
        })?;

        let n = data.nrows() as f64;
        let variance = data
            .axis_iter(Axis(0))
            .fold(Array1::zeros(mean.len()), |acc, row| {
                let centered = &row - &mean;
                acc + &centered * &centered
            })
            / n;
        let scale = variance.mapv(|v: f64| {
            let std = v.sqrt();
            if std < MIN_SPREAD {
                1.0
            } else {
                std
            }
        });

        Ok(Self { mean, scale })
    }

    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Scale a full table with the fitted parameters.
    pub fn transform(&self, data: &Array2<f64>) -> Array2<f64> {
        (data - &self.mean) / &self.scale
    }

    /// Scale one feature row with the fitted parameters.
    pub fn transform_row(&self, row: &Array1<f64>) -> Array1<f64> {
        (row - &self.mean) / &self.scale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn centers_and_scales_columns() {
        let data = array![[1.0, 10.0], [3.0, 30.0], [5.0, 50.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        let scaled = scaler.transform(&data);

        for col in 0..2 {
            let column = scaled.column(col);
            let mean: f64 = column.sum() / column.len() as f64;
            let var: f64 = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>()
                / column.len() as f64;
            assert_abs_diff_eq!(mean, 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(var, 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn single_row_transform_matches_table_transform() {
        let data = array![[5.0, 100.0, 2.0], [30.0, 1000.0, 9.0], [10.0, 500.0, 4.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        let table = scaler.transform(&data);
        let row = scaler.transform_row(&data.row(1).to_owned());

        for (a, b) in table.row(1).iter().zip(row.iter()) {
            assert_abs_diff_eq!(a, b, epsilon = 1e-12);
        }
    }

    #[test]
    fn constant_feature_passes_through() {
        let data = array![[4.0, 1.0], [4.0, 2.0], [4.0, 3.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        let scaled = scaler.transform(&data);

        // centered but not divided by a vanishing spread
        for v in scaled.column(0) {
            assert_abs_diff_eq!(*v, 0.0, epsilon = 1e-12);
        }
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn parameters_are_frozen_after_fit() {
        let train = array![[0.0, 0.0], [10.0, 10.0]];
        let scaler = StandardScaler::fit(&train).unwrap();

        // data from a shifted distribution uses the training parameters
        let other = array![[100.0, 100.0]];
        let scaled = scaler.transform(&other);
        assert_abs_diff_eq!(scaled[[0, 0]], 19.0, epsilon = 1e-12);
    }

    #[test]
    fn empty_table_is_rejected() {
        let data = Array2::<f64>::zeros((0, 3));
        assert!(StandardScaler::fit(&data).is_err());
    }

    #[test]
    fn survives_serde_round_trip() {
        let data = array![[1.0, 2.0], [3.0, 4.0]];
        let scaler = StandardScaler::fit(&data).unwrap();
        let json = serde_json::to_string(&scaler).unwrap();
        let back: StandardScaler = serde_json::from_str(&json).unwrap();
        assert_eq!(scaler, back);
    }
}
