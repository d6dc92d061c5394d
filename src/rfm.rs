//! RFM feature aggregation and the manual-entry validation boundary

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::clean::CleanedTransaction;
use crate::error::{BoundsViolation, Error, Result};

/// Recency, frequency and monetary value for one customer.
///
/// Derived once per aggregation run against a fixed snapshot date and
/// immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RfmVector {
    pub customer_id: i64,
    /// Whole days since the customer's latest purchase, relative to the
    /// snapshot date. Never negative.
    pub recency: i64,
    /// Count of distinct invoices, not line items. At least 1.
    pub frequency: u64,
    /// Sum of line values across all of the customer's transactions.
    pub monetary: f64,
}

impl RfmVector {
    /// The vector as a feature row in [recency, frequency, monetary] order.
    pub fn features(&self) -> [f64; 3] {
        [self.recency as f64, self.frequency as f64, self.monetary]
    }
}

/// How the reference instant for recency is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotPolicy {
    /// One day after the latest invoice timestamp in the batch.
    DeriveFromBatch,
    /// A caller-supplied instant, reused across a model generation.
    Explicit(DateTime<Utc>),
}

impl SnapshotPolicy {
    /// Resolve the policy against a batch of cleaned transactions.
    ///
    /// Deriving from an empty batch is an input-data error since there is
    /// no timestamp to anchor on.
    pub fn resolve(&self, transactions: &[CleanedTransaction]) -> Result<DateTime<Utc>> {
        match self {
            SnapshotPolicy::Explicit(snapshot) => Ok(*snapshot),
            SnapshotPolicy::DeriveFromBatch => {
                let latest = transactions
                    .iter()
                    .map(|tx| tx.invoice_date)
                    .max()
                    .ok_or_else(|| {
                        Error::InputData(
                            "cannot derive a snapshot date from an empty batch".to_string(),
                        )
                    })?;
                Ok(latest + Duration::days(1))
            }
        }
    }
}

/// Reduce cleaned transactions, grouped per customer, to RFM vectors.
///
/// Recency is measured in whole days; sub-day precision is truncated, so
/// same-day purchases tie at the same recency. An empty input is an
/// input-data error, and a snapshot earlier than a customer's latest
/// purchase is a configuration error rather than a negative recency.
/// Output rows are ordered by customer id.
pub fn aggregate(
    transactions: &[CleanedTransaction],
    snapshot: DateTime<Utc>,
) -> Result<Vec<RfmVector>> {
    if transactions.is_empty() {
        return Err(Error::InputData(
            "no transactions to aggregate".to_string(),
        ));
    }

    struct Group {
        latest: DateTime<Utc>,
        invoices: BTreeSet<String>,
        monetary: f64,
    }

    let mut groups: BTreeMap<i64, Group> = BTreeMap::new();
    for tx in transactions {
        groups
            .entry(tx.customer_id)
            .and_modify(|group| {
                group.latest = group.latest.max(tx.invoice_date);
                group.invoices.insert(tx.invoice_no.clone());
                group.monetary += tx.line_value;
            })
            .or_insert_with(|| Group {
                latest: tx.invoice_date,
                invoices: BTreeSet::from([tx.invoice_no.clone()]),
                monetary: tx.line_value,
            });
    }

    let mut table = Vec::with_capacity(groups.len());
    for (customer_id, group) in groups {
        let recency = (snapshot - group.latest).num_days();
        if recency < 0 {
            return Err(Error::Config(format!(
                "snapshot date {snapshot} precedes the latest purchase {} of customer {customer_id}",
                group.latest
            )));
        }
        table.push(RfmVector {
            customer_id,
            recency,
            frequency: group.invoices.len() as u64,
            monetary: group.monetary,
        });
    }

    debug!(customers = table.len(), %snapshot, "aggregated RFM table");
    Ok(table)
}

/// Caller-declared inclusive bounds for manually entered RFM values.
///
/// Checked before any scaling; out-of-range fields are reported as a list,
/// never clamped. Defaults match the entry form of the serving layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureBounds {
    pub recency: (f64, f64),
    pub frequency: (f64, f64),
    pub monetary: (f64, f64),
}

impl Default for FeatureBounds {
    fn default() -> Self {
        Self {
            recency: (0.0, 365.0),
            frequency: (1.0, 300.0),
            monetary: (0.01, 300_000.0),
        }
    }
}

impl FeatureBounds {
    /// Check one manual entry, collecting every violated field.
    pub fn validate(&self, recency: f64, frequency: f64, monetary: f64) -> Result<()> {
        let mut violations = Vec::new();
        for (field, value, (min, max)) in [
            ("recency", recency, self.recency),
            ("frequency", frequency, self.frequency),
            ("monetary", monetary, self.monetary),
        ] {
            // NaN fails the range check as well
            if !(min..=max).contains(&value) {
                violations.push(BoundsViolation {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::OutOfBounds(violations))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorClass;

    fn tx(customer: i64, invoice: &str, date: &str, line_value: f64) -> CleanedTransaction {
        CleanedTransaction {
            invoice_no: invoice.to_string(),
            stock_code: "22633".to_string(),
            quantity: 1,
            invoice_date: date.parse().unwrap(),
            unit_price: line_value,
            customer_id: customer,
            country: "United Kingdom".to_string(),
            line_value,
        }
    }

    #[test]
    fn frequency_counts_distinct_invoices() {
        let transactions = vec![
            tx(17850, "536365", "2011-12-01T08:26:00Z", 10.0),
            tx(17850, "536365", "2011-12-01T08:26:00Z", 5.0),
            tx(17850, "536366", "2011-12-03T09:00:00Z", 7.5),
        ];
        let snapshot = "2011-12-09T00:00:00Z".parse().unwrap();
        let table = aggregate(&transactions, snapshot).unwrap();

        assert_eq!(table.len(), 1);
        assert_eq!(table[0].frequency, 2);
        assert!((table[0].monetary - 22.5).abs() < 1e-9);
    }

    #[test]
    fn recency_shifts_with_snapshot() {
        let transactions = vec![tx(17850, "536365", "2011-12-01T08:26:00Z", 10.0)];
        let near: DateTime<Utc> = "2011-12-02T08:26:00Z".parse().unwrap();

        let base = aggregate(&transactions, near).unwrap()[0].recency;
        let shifted = aggregate(&transactions, near + Duration::days(30)).unwrap()[0].recency;
        assert_eq!(shifted, base + 30);
    }

    #[test]
    fn derived_snapshot_is_latest_plus_one_day() {
        let transactions = vec![
            tx(17850, "536365", "2011-12-01T08:26:00Z", 10.0),
            tx(17850, "536366", "2011-12-05T10:15:00Z", 4.0),
        ];
        let snapshot = SnapshotPolicy::DeriveFromBatch
            .resolve(&transactions)
            .unwrap();
        assert_eq!(
            snapshot,
            "2011-12-06T10:15:00Z".parse::<DateTime<Utc>>().unwrap()
        );
        assert_eq!(aggregate(&transactions, snapshot).unwrap()[0].recency, 1);
    }

    #[test]
    fn explicit_policy_ignores_batch() {
        let when: DateTime<Utc> = "2012-01-01T00:00:00Z".parse().unwrap();
        assert_eq!(SnapshotPolicy::Explicit(when).resolve(&[]).unwrap(), when);
    }

    #[test]
    fn empty_batch_cannot_derive_snapshot() {
        let err = SnapshotPolicy::DeriveFromBatch.resolve(&[]).unwrap_err();
        assert_eq!(err.class(), ErrorClass::InputData);
    }

    #[test]
    fn empty_input_is_an_error_not_an_empty_table() {
        let snapshot = "2011-12-09T00:00:00Z".parse().unwrap();
        let err = aggregate(&[], snapshot).unwrap_err();
        assert_eq!(err.class(), ErrorClass::InputData);
    }

    #[test]
    fn snapshot_before_data_is_a_config_error() {
        let transactions = vec![tx(17850, "536365", "2011-12-01T08:26:00Z", 10.0)];
        let snapshot = "2011-11-01T00:00:00Z".parse().unwrap();
        let err = aggregate(&transactions, snapshot).unwrap_err();
        assert_eq!(err.class(), ErrorClass::Config);
    }

    #[test]
    fn groups_multiple_customers() {
        let transactions = vec![
            tx(17850, "536365", "2011-12-01T08:26:00Z", 10.0),
            tx(13047, "536367", "2011-12-02T08:34:00Z", 22.0),
        ];
        let snapshot = "2011-12-09T00:00:00Z".parse().unwrap();
        let table = aggregate(&transactions, snapshot).unwrap();

        assert_eq!(table.len(), 2);
        // ordered by customer id
        assert_eq!(table[0].customer_id, 13047);
        assert_eq!(table[1].customer_id, 17850);
    }

    #[test]
    fn bounds_collect_every_violation() {
        let bounds = FeatureBounds::default();
        assert!(bounds.validate(30.0, 10.0, 500.0).is_ok());

        let err = bounds.validate(400.0, 0.0, 500.0).unwrap_err();
        match err {
            Error::OutOfBounds(violations) => {
                let fields: Vec<_> = violations.iter().map(|v| v.field).collect();
                assert_eq!(fields, vec!["recency", "frequency"]);
            }
            other => panic!("expected OutOfBounds, got {other:?}"),
        }
    }

    #[test]
    fn bounds_reject_non_finite_values() {
        let bounds = FeatureBounds::default();
        assert!(bounds.validate(f64::NAN, 10.0, 500.0).is_err());
    }
}
