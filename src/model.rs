//! Segmentation model: K-Means training and label assignment

use std::collections::BTreeSet;

use linfa::prelude::*;
use linfa::Dataset;
use linfa_clustering::{KMeans, KMeansInit};
use linfa_nn::distance::L2Dist;
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};
use crate::rfm::RfmVector;
use crate::scaler::StandardScaler;

/// Number of RFM features; every centroid and scaler in this crate is
/// three-dimensional.
pub const N_FEATURES: usize = 3;

/// Training knobs for the cluster assigner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainConfig {
    /// Iteration cap per restart.
    pub max_iterations: u64,
    /// Convergence tolerance on centroid movement.
    pub tolerance: f64,
    /// Independent seeded initializations; the best-inertia run wins.
    pub restarts: usize,
    /// Seed for the k-means++ initialization.
    pub seed: u64,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            max_iterations: 300,
            tolerance: 1e-4,
            restarts: 10,
            seed: 42,
        }
    }
}

/// A fitted (scaler, centroids, k) triple.
///
/// Produced only by [`train`], so an untrained model cannot be observed.
/// The three parts always travel together; a handle rebuilt from storage
/// must pass [`ModelHandle::validate`] before use. The value is immutable,
/// which makes concurrent assignment from shared references safe, and
/// retraining yields a fresh handle instead of mutating this one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelHandle {
    scaler: StandardScaler,
    centroids: Array2<f64>,
    k: usize,
}

/// One customer's features together with the segment label assigned to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    pub features: RfmVector,
    pub label: usize,
}

/// Fit-time summary, for reporting only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainDiagnostics {
    /// Within-cluster sum of squared distances in scaled space.
    pub inertia: f64,
    /// Customers per label, indexed by label.
    pub cluster_sizes: Vec<usize>,
    /// Silhouette coefficient over a bounded sample of the training rows.
    pub silhouette: f64,
    /// Per-cluster averages of the raw features, indexed by label.
    pub profiles: Vec<ClusterProfile>,
}

/// Mean raw RFM values of the customers assigned to one cluster.
///
/// These are the numbers an operator reads to decide what each segment
/// means; the crate itself attaches no meaning to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClusterProfile {
    pub label: usize,
    pub count: usize,
    pub avg_recency: f64,
    pub avg_frequency: f64,
    pub avg_monetary: f64,
}

/// Everything `train` produces: the reusable handle, the per-customer label
/// table (reporting only, not model state) and the fit diagnostics.
#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub model: ModelHandle,
    pub assignments: Vec<ClusterAssignment>,
    pub diagnostics: TrainDiagnostics,
}

impl ModelHandle {
    pub fn k(&self) -> usize {
        self.k
    }

    /// Centroid matrix in scaled feature space, one row per label.
    pub fn centroids(&self) -> &Array2<f64> {
        &self.centroids
    }

    /// Check that the parts of the handle belong together.
    ///
    /// Fails with a model-state error when the centroid count disagrees
    /// with k, the feature dimensions disagree, or a parameter is not
    /// finite. Meant for handles rebuilt from storage; handles returned by
    /// [`train`] satisfy this by construction.
    pub fn validate(&self) -> Result<()> {
        if self.k == 0 || self.centroids.nrows() != self.k {
            return Err(Error::ModelState(format!(
                "centroid count {} does not match cluster count {}",
                self.centroids.nrows(),
                self.k
            )));
        }
        if self.centroids.ncols() != N_FEATURES || self.scaler.n_features() != N_FEATURES {
            return Err(Error::ModelState(format!(
                "expected {N_FEATURES} features, scaler has {} and centroids have {}",
                self.scaler.n_features(),
                self.centroids.ncols()
            )));
        }
        if self.centroids.iter().any(|v| !v.is_finite()) {
            return Err(Error::ModelState(
                "centroid matrix contains non-finite values".to_string(),
            ));
        }
        Ok(())
    }

    /// Project raw features into the scaled space of this model.
    pub fn scale(&self, features: [f64; N_FEATURES]) -> Array1<f64> {
        self.scaler.transform_row(&Array1::from(features.to_vec()))
    }

    /// Assign a label to raw [recency, frequency, monetary] values.
    ///
    /// This is the single assignment path: the training table, bulk
    /// scoring and single-customer inference all go through it, so scaled
    /// feature treatment cannot drift between fit time and serving time.
    pub fn assign_features(&self, features: [f64; N_FEATURES]) -> usize {
        nearest_centroid(&self.centroids, &self.scale(features))
    }

    /// Assign a label to one customer's feature vector.
    pub fn assign(&self, vector: &RfmVector) -> usize {
        self.assign_features(vector.features())
    }

    /// Assign labels to a whole feature table.
    pub fn assign_many(&self, table: &[RfmVector]) -> Vec<ClusterAssignment> {
        table
            .iter()
            .map(|vector| ClusterAssignment {
                features: vector.clone(),
                label: self.assign(vector),
            })
            .collect()
    }
}

/// Fit a scaler and a K-Means assigner on a full customer feature table.
///
/// The scaler is fitted once on the raw table, the assigner on the scaled
/// table with k-means++ initialization from a fixed seed, keeping the best
/// of `config.restarts` runs. Tables with fewer distinct rows than `k` are
/// rejected before any fitting work begins.
pub fn train(table: &[RfmVector], k: usize, config: &TrainConfig) -> Result<TrainOutcome> {
    if k == 0 {
        return Err(Error::Config("cluster count must be at least 1".to_string()));
    }
    if table.is_empty() {
        return Err(Error::InputData(
            "cannot train on an empty feature table".to_string(),
        ));
    }

    let raw = feature_matrix(table);
    let distinct = distinct_rows(&raw);
    if distinct < k {
        return Err(Error::Config(format!(
            "cluster count {k} exceeds the {distinct} distinct feature rows available"
        )));
    }

    let scaler = StandardScaler::fit(&raw)?;
    let scaled = scaler.transform(&raw);

    let dataset = Dataset::new(scaled.clone(), Array1::<usize>::zeros(table.len()));
    let fitted = KMeans::params_with(k, ChaCha8Rng::seed_from_u64(config.seed), L2Dist)
        .max_n_iterations(config.max_iterations)
        .n_runs(config.restarts)
        .tolerance(config.tolerance)
        .init_method(KMeansInit::KMeansPlusPlus)
        .fit(&dataset)
        .map_err(|e| Error::Config(format!("k-means fitting failed: {e}")))?;

    let model = ModelHandle {
        scaler,
        centroids: fitted.centroids().clone(),
        k,
    };

    let assignments = model.assign_many(table);
    let labels: Vec<usize> = assignments.iter().map(|a| a.label).collect();

    let profiles = cluster_profiles(&assignments, k);
    let diagnostics = TrainDiagnostics {
        inertia: inertia(&scaled, &labels, &model.centroids),
        cluster_sizes: profiles.iter().map(|p| p.count).collect(),
        silhouette: silhouette_sample(&scaled, &labels, k, SILHOUETTE_SAMPLE_CAP),
        profiles,
    };

    info!(
        customers = table.len(),
        k,
        inertia = diagnostics.inertia,
        "trained segmentation model"
    );

    Ok(TrainOutcome {
        model,
        assignments,
        diagnostics,
    })
}

/// Per-cluster counts and raw-feature means over the training assignments.
fn cluster_profiles(assignments: &[ClusterAssignment], k: usize) -> Vec<ClusterProfile> {
    let mut profiles: Vec<ClusterProfile> = (0..k)
        .map(|label| ClusterProfile {
            label,
            count: 0,
            avg_recency: 0.0,
            avg_frequency: 0.0,
            avg_monetary: 0.0,
        })
        .collect();

    for assignment in assignments {
        let profile = &mut profiles[assignment.label];
        profile.count += 1;
        profile.avg_recency += assignment.features.recency as f64;
        profile.avg_frequency += assignment.features.frequency as f64;
        profile.avg_monetary += assignment.features.monetary;
    }
    for profile in &mut profiles {
        if profile.count > 0 {
            let n = profile.count as f64;
            profile.avg_recency /= n;
            profile.avg_frequency /= n;
            profile.avg_monetary /= n;
        }
    }

    profiles
}

/// Stack feature vectors into an (n, 3) matrix.
pub(crate) fn feature_matrix(table: &[RfmVector]) -> Array2<f64> {
    let mut data = Vec::with_capacity(table.len() * N_FEATURES);
    for vector in table {
        data.extend_from_slice(&vector.features());
    }
    Array2::from_shape_vec((table.len(), N_FEATURES), data)
        .expect("row-major feature buffer matches matrix shape")
}

/// Count distinct rows by exact bit pattern. Scaling is affine and
/// injective per feature, so distinct raw rows stay distinct after it.
pub(crate) fn distinct_rows(matrix: &Array2<f64>) -> usize {
    matrix
        .outer_iter()
        .map(|row| row.iter().map(|v| v.to_bits()).collect::<Vec<u64>>())
        .collect::<BTreeSet<_>>()
        .len()
}

/// Index of the closest centroid under squared Euclidean distance.
pub(crate) fn nearest_centroid(centroids: &Array2<f64>, point: &Array1<f64>) -> usize {
    let mut best = 0;
    let mut best_distance = f64::INFINITY;
    for (label, centroid) in centroids.outer_iter().enumerate() {
        let distance: f64 = point
            .iter()
            .zip(centroid.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum();
        if distance < best_distance {
            best_distance = distance;
            best = label;
        }
    }
    best
}

/// Within-cluster sum of squared distances to the assigned centroids.
pub(crate) fn inertia(scaled: &Array2<f64>, labels: &[usize], centroids: &Array2<f64>) -> f64 {
    scaled
        .outer_iter()
        .zip(labels)
        .map(|(point, &label)| {
            point
                .iter()
                .zip(centroids.row(label).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
        })
        .sum()
}

const SILHOUETTE_SAMPLE_CAP: usize = 100;

/// Mean silhouette coefficient over the first `cap` rows.
///
/// Quadratic in the sample size, hence the cap. Points alone in their
/// cluster within the sample score 0.
fn silhouette_sample(scaled: &Array2<f64>, labels: &[usize], k: usize, cap: usize) -> f64 {
    let n = scaled.nrows().min(cap);
    if n < 2 {
        return 0.0;
    }

    let mut total = 0.0;
    for i in 0..n {
        let own_label = labels[i];
        let mut same = Vec::new();
        let mut others: Vec<Vec<f64>> = vec![Vec::new(); k];

        for j in 0..n {
            if i == j {
                continue;
            }
            let distance: f64 = scaled
                .row(i)
                .iter()
                .zip(scaled.row(j).iter())
                .map(|(a, b)| (a - b).powi(2))
                .sum::<f64>()
                .sqrt();
            if labels[j] == own_label {
                same.push(distance);
            } else {
                others[labels[j]].push(distance);
            }
        }

        let a = if same.is_empty() {
            0.0
        } else {
            same.iter().sum::<f64>() / same.len() as f64
        };
        let b = others
            .iter()
            .filter(|d| !d.is_empty())
            .map(|d| d.iter().sum::<f64>() / d.len() as f64)
            .fold(f64::INFINITY, f64::min);

        total += if b.is_infinite() || (a == 0.0 && b == 0.0) {
            0.0
        } else {
            (b - a) / a.max(b)
        };
    }

    total / n as f64
}
