//! Reading raw transaction batches from CSV
//!
//! Expects the retail export header row: InvoiceNo, StockCode, Description,
//! Quantity, InvoiceDate, UnitPrice, CustomerID, Country.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use tracing::warn;

use crate::clean::TransactionRecord;
use crate::error::Result;

/// Read transaction records from any CSV reader.
///
/// Rows that fail to deserialize (a non-numeric quantity, a missing column)
/// are skipped with a warning rather than failing the batch, matching the
/// per-record drop policy of the cleaning stage. Structural errors from the
/// reader itself still propagate.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<TransactionRecord>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = Vec::new();
    let mut skipped = 0usize;
    for row in csv_reader.deserialize::<TransactionRecord>() {
        match row {
            Ok(record) => records.push(record),
            Err(e) => {
                skipped += 1;
                warn!(error = %e, "skipping malformed transaction row");
            }
        }
    }
    if skipped > 0 {
        warn!(skipped, kept = records.len(), "transaction rows dropped at ingestion");
    }
    Ok(records)
}

/// Read transaction records from a CSV file on disk.
pub fn read_transactions_from_path<P: AsRef<Path>>(path: P) -> Result<Vec<TransactionRecord>> {
    let file = File::open(path.as_ref())?;
    read_transactions(BufReader::new(file))
}
