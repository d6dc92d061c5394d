//! rfmkit: customer segmentation from retail transaction logs
//!
//! This library cleans raw transaction records, reduces them to RFM
//! (Recency, Frequency, Monetary) features per customer, fits a K-Means
//! segmentation model over the feature table and scores customers against
//! the fitted model. Model persistence is exposed as an opaque store; the
//! meaning of each segment label belongs to the consumer.

pub mod clean;
pub mod elbow;
pub mod error;
pub mod model;
pub mod pipeline;
pub mod rfm;
pub mod scaler;
pub mod source;
pub mod store;
pub mod viz;

// Re-export public items for easier access
pub use clean::{clean, CleanedTransaction, TransactionRecord};
pub use elbow::inertia_curve;
pub use error::{BoundsViolation, Error, ErrorClass, Result};
pub use model::{
    train, ClusterAssignment, ClusterProfile, ModelHandle, TrainConfig, TrainDiagnostics,
    TrainOutcome,
};
pub use pipeline::{
    assign_many, assign_manual, assign_one, inertia_curve_from_transactions,
    train_from_transactions,
};
pub use rfm::{aggregate, FeatureBounds, RfmVector, SnapshotPolicy};
pub use scaler::StandardScaler;
pub use source::{read_transactions, read_transactions_from_path};
pub use store::{open_json_store, JsonModelStore, ModelStore};
pub use viz::{render_cluster_scatter, render_elbow_curve};
