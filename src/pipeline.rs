//! End-to-end operations over raw transaction batches
//!
//! These functions tie the cleaning, aggregation and model stages together
//! for the serving layer: training a model generation from a transaction
//! log, charting the elbow curve, and scoring a single customer either from
//! their transactions or from manually entered RFM values.

use tracing::info;

use crate::clean::{clean, TransactionRecord};
use crate::elbow::inertia_curve;
use crate::error::{Error, Result};
use crate::model::{train, ClusterAssignment, ModelHandle, TrainConfig, TrainOutcome};
use crate::rfm::{aggregate, FeatureBounds, RfmVector, SnapshotPolicy};

/// Train a segmentation model straight from a raw transaction log.
///
/// Cleans the batch, resolves the snapshot policy, aggregates RFM features
/// per customer and fits the model. Batches with no valid transactions
/// after cleaning are an input-data error.
pub fn train_from_transactions(
    records: &[TransactionRecord],
    k: usize,
    policy: SnapshotPolicy,
    config: &TrainConfig,
) -> Result<TrainOutcome> {
    let table = features_from_transactions(records, policy)?;
    info!(
        records = records.len(),
        customers = table.len(),
        k,
        "training from transaction batch"
    );
    train(&table, k, config)
}

/// Chart the inertia curve for candidate cluster counts 1..=max_k from a
/// raw transaction log.
pub fn inertia_curve_from_transactions(
    records: &[TransactionRecord],
    max_k: usize,
    policy: SnapshotPolicy,
    config: &TrainConfig,
) -> Result<Vec<f64>> {
    let table = features_from_transactions(records, policy)?;
    inertia_curve(&table, max_k, config)
}

/// Score one customer from their raw transactions.
///
/// The batch must belong to a single customer: zero valid rows after
/// cleaning and multiple distinct customer ids are both caller-input
/// errors, reported rather than resolved by picking one. Returns the
/// computed features together with the assigned label so the caller never
/// recomputes them.
pub fn assign_one(
    records: &[TransactionRecord],
    model: &ModelHandle,
    policy: SnapshotPolicy,
) -> Result<ClusterAssignment> {
    let table = features_from_transactions(records, policy)?;
    if table.len() > 1 {
        let ids: Vec<String> = table.iter().map(|v| v.customer_id.to_string()).collect();
        return Err(Error::InputData(format!(
            "expected transactions for one customer, found {}: {}",
            table.len(),
            ids.join(", ")
        )));
    }
    let features = table.into_iter().next().ok_or_else(|| {
        Error::InputData("no valid transactions left after cleaning".to_string())
    })?;
    let label = model.assign(&features);
    Ok(ClusterAssignment { features, label })
}

/// Score a precomputed feature table against a fitted model.
pub fn assign_many(table: &[RfmVector], model: &ModelHandle) -> Vec<ClusterAssignment> {
    model.assign_many(table)
}

/// Score manually entered RFM values after checking them against
/// caller-declared bounds.
///
/// Out-of-range fields are rejected with the full violation list before
/// any scaling happens; values are never clamped into range.
pub fn assign_manual(
    recency: f64,
    frequency: f64,
    monetary: f64,
    bounds: &FeatureBounds,
    model: &ModelHandle,
) -> Result<usize> {
    bounds.validate(recency, frequency, monetary)?;
    Ok(model.assign_features([recency, frequency, monetary]))
}

/// Shared clean-then-aggregate stage.
fn features_from_transactions(
    records: &[TransactionRecord],
    policy: SnapshotPolicy,
) -> Result<Vec<RfmVector>> {
    let cleaned = clean(records);
    if cleaned.is_empty() {
        return Err(Error::InputData(
            "no valid transactions left after cleaning".to_string(),
        ));
    }
    let snapshot = policy.resolve(&cleaned)?;
    aggregate(&cleaned, snapshot)
}
