//! Transaction records and the cleaning filter

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker character embedded in the invoice number of cancelled orders.
pub const CANCELLATION_MARKER: char = 'C';

/// One raw line item as it arrives from the transaction source.
///
/// The timestamp stays textual and the customer id stays optional text here;
/// both are parsed during cleaning so that one malformed value drops one
/// record instead of failing the whole batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    #[serde(rename = "InvoiceNo")]
    pub invoice_no: String,
    #[serde(rename = "StockCode")]
    pub stock_code: String,
    #[serde(rename = "Description", default)]
    pub description: String,
    #[serde(rename = "Quantity")]
    pub quantity: i64,
    #[serde(rename = "InvoiceDate")]
    pub invoice_date: String,
    #[serde(rename = "UnitPrice")]
    pub unit_price: f64,
    #[serde(rename = "CustomerID", default)]
    pub customer_id: Option<String>,
    #[serde(rename = "Country", default)]
    pub country: String,
}

/// A validated line item with its derived line value.
///
/// Invariants: quantity > 0, unit price > 0, the invoice is not cancelled,
/// and the customer id has been coerced to an integer key.
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedTransaction {
    pub invoice_no: String,
    pub stock_code: String,
    pub quantity: i64,
    pub invoice_date: DateTime<Utc>,
    pub unit_price: f64,
    pub customer_id: i64,
    pub country: String,
    /// quantity * unit price
    pub line_value: f64,
}

/// Filter raw records down to the valid subset and derive line values.
///
/// Drops, per record: cancelled invoices, missing or non-integer customer
/// ids, non-positive quantities or unit prices, and timestamps that fail to
/// parse. An empty input yields an empty output. The function is pure; it
/// only logs a kept/dropped summary.
pub fn clean(records: &[TransactionRecord]) -> Vec<CleanedTransaction> {
    let mut kept = Vec::with_capacity(records.len());

    for record in records {
        if record.invoice_no.contains(CANCELLATION_MARKER) {
            continue;
        }
        if record.quantity <= 0 || record.unit_price <= 0.0 {
            continue;
        }
        let customer_id = match record.customer_id.as_deref().and_then(coerce_customer_id) {
            Some(id) => id,
            None => continue,
        };
        let invoice_date = match parse_timestamp(&record.invoice_date) {
            Some(ts) => ts,
            None => continue,
        };

        kept.push(CleanedTransaction {
            invoice_no: record.invoice_no.clone(),
            stock_code: record.stock_code.clone(),
            quantity: record.quantity,
            invoice_date,
            unit_price: record.unit_price,
            customer_id,
            country: record.country.clone(),
            line_value: record.quantity as f64 * record.unit_price,
        });
    }

    debug!(
        total = records.len(),
        kept = kept.len(),
        dropped = records.len() - kept.len(),
        "cleaned transaction batch"
    );

    kept
}

/// Coerce a customer id to an integer key.
///
/// Accepts plain integers and float text with a zero fraction ("17850.0"),
/// which is how ids come back out of spreadsheet exports.
fn coerce_customer_id(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(id) = trimmed.parse::<i64>() {
        return Some(id);
    }
    match trimmed.parse::<f64>() {
        Ok(value) if value.fract() == 0.0 && value.is_finite() => Some(value as i64),
        _ => None,
    }
}

const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%m/%d/%Y %H:%M"];

/// Parse an invoice timestamp, trying RFC 3339 first and then the naive
/// layouts the retail exports use. Naive timestamps are taken as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(ts.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(naive.and_utc());
        }
    }
    None
}
