//! Cluster-count selection via the elbow heuristic

use linfa::prelude::*;
use linfa::Dataset;
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::{Error, Result};
use crate::model::{self, TrainConfig};
use crate::rfm::RfmVector;
use crate::scaler::StandardScaler;

/// Within-cluster sum-of-squares for every candidate count in 1..=max_k.
///
/// Each candidate fits a fresh scaler and a fresh seeded assigner, so the
/// curve is reproducible for a fixed table and config. Index 0 holds the
/// inertia for k = 1. The curve is advisory: it supports a human reading
/// off the elbow, nothing here picks a count automatically.
pub fn inertia_curve(table: &[RfmVector], max_k: usize, config: &TrainConfig) -> Result<Vec<f64>> {
    if max_k == 0 {
        return Err(Error::Config(
            "maximum candidate cluster count must be at least 1".to_string(),
        ));
    }
    if table.len() < 2 {
        return Err(Error::InputData(format!(
            "need at least 2 feature rows to chart an inertia curve, got {}",
            table.len()
        )));
    }

    let raw = model::feature_matrix(table);
    let distinct = model::distinct_rows(&raw);
    if distinct < max_k {
        return Err(Error::Config(format!(
            "maximum candidate count {max_k} exceeds the {distinct} distinct feature rows available"
        )));
    }

    let mut curve = Vec::with_capacity(max_k);
    for k in 1..=max_k {
        let scaler = StandardScaler::fit(&raw)?;
        let scaled = scaler.transform(&raw);

        let dataset = Dataset::new(scaled.clone(), Array1::<usize>::zeros(table.len()));
        let fitted = KMeans::params_with(k, ChaCha8Rng::seed_from_u64(config.seed), L2Dist)
            .max_n_iterations(config.max_iterations)
            .n_runs(config.restarts)
            .tolerance(config.tolerance)
            .init_method(KMeansInit::KMeansPlusPlus)
            .fit(&dataset)
            .map_err(|e| Error::Config(format!("k-means fitting failed at k = {k}: {e}")))?;

        let labels: Vec<usize> = scaled
            .outer_iter()
            .map(|row| model::nearest_centroid(fitted.centroids(), &row.to_owned()))
            .collect();

        let wcss = model::inertia(&scaled, &labels, fitted.centroids());
        debug!(k, inertia = wcss, "fitted elbow candidate");
        curve.push(wcss);
    }

    Ok(curve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    fn table() -> Vec<RfmVector> {
        vec![
            RfmVector { customer_id: 1, recency: 5, frequency: 20, monetary: 5_000.0 },
            RfmVector { customer_id: 2, recency: 8, frequency: 18, monetary: 4_500.0 },
            RfmVector { customer_id: 3, recency: 300, frequency: 1, monetary: 50.0 },
            RfmVector { customer_id: 4, recency: 280, frequency: 2, monetary: 80.0 },
            RfmVector { customer_id: 5, recency: 40, frequency: 6, monetary: 900.0 },
            RfmVector { customer_id: 6, recency: 55, frequency: 5, monetary: 750.0 },
        ]
    }

    #[test]
    fn curve_has_one_entry_per_candidate() {
        let curve = inertia_curve(&table(), 4, &TrainConfig::default()).unwrap();
        assert_eq!(curve.len(), 4);
        assert!(curve.iter().all(|wcss| wcss.is_finite() && *wcss >= 0.0));
    }

    #[test]
    fn inertia_never_increases_with_k() {
        let curve = inertia_curve(&table(), 4, &TrainConfig::default()).unwrap();
        for window in curve.windows(2) {
            assert!(
                window[1] <= window[0] + 1e-9,
                "inertia went up from {} to {}",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn curve_is_deterministic() {
        let config = TrainConfig::default();
        let first = inertia_curve(&table(), 3, &config).unwrap();
        let second = inertia_curve(&table(), 3, &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_max_k_is_a_config_error() {
        let err = inertia_curve(&table(), 0, &TrainConfig::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Config);
    }

    #[test]
    fn single_row_table_is_an_input_error() {
        let one = vec![table().remove(0)];
        let err = inertia_curve(&one, 2, &TrainConfig::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::InputData);
    }

    #[test]
    fn max_k_beyond_distinct_rows_is_a_config_error() {
        let err = inertia_curve(&table(), 7, &TrainConfig::default()).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Config);
    }
}
