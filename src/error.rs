//! Error types shared across the crate

use thiserror::Error;

/// Coarse failure class, so callers can tell bad data apart from bad
/// configuration, broken model state, or storage trouble without matching
/// on every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// The caller's data is malformed, empty, or inconsistent.
    InputData,
    /// The requested parameters cannot be fitted (rejected before any work).
    Config,
    /// A fitted model is being used wrongly or is internally inconsistent.
    ModelState,
    /// Persistence or rendering resources failed.
    Store,
}

/// One out-of-range feature reported by manual entry validation.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundsViolation {
    pub field: &'static str,
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

impl std::fmt::Display for BoundsViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} = {} outside [{}, {}]",
            self.field, self.value, self.min, self.max
        )
    }
}

fn join_violations(violations: &[BoundsViolation]) -> String {
    violations
        .iter()
        .map(BoundsViolation::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("input data: {0}")]
    InputData(String),

    #[error("out-of-bounds features: {}", join_violations(.0))]
    OutOfBounds(Vec<BoundsViolation>),

    #[error("configuration: {0}")]
    Config(String),

    #[error("model state: {0}")]
    ModelState(String),

    #[error("transaction source: {0}")]
    Source(#[from] csv::Error),

    #[error("model store i/o: {0}")]
    StoreIo(#[from] std::io::Error),

    #[error("model store encoding: {0}")]
    StoreEncoding(#[from] serde_json::Error),

    #[error("rendering: {0}")]
    Render(String),
}

impl Error {
    pub fn class(&self) -> ErrorClass {
        match self {
            Error::InputData(_) | Error::OutOfBounds(_) | Error::Source(_) => {
                ErrorClass::InputData
            }
            Error::Config(_) => ErrorClass::Config,
            Error::ModelState(_) => ErrorClass::ModelState,
            Error::StoreIo(_) | Error::StoreEncoding(_) | Error::Render(_) => ErrorClass::Store,
        }
    }
}

/// Common result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classes_are_distinguishable() {
        assert_eq!(
            Error::InputData("empty batch".into()).class(),
            ErrorClass::InputData
        );
        assert_eq!(Error::Config("k = 0".into()).class(), ErrorClass::Config);
        assert_eq!(
            Error::ModelState("centroid count mismatch".into()).class(),
            ErrorClass::ModelState
        );
        assert_eq!(
            Error::StoreIo(std::io::Error::new(std::io::ErrorKind::NotFound, "gone")).class(),
            ErrorClass::Store
        );
    }

    #[test]
    fn bounds_violations_render_field_list() {
        let err = Error::OutOfBounds(vec![
            BoundsViolation {
                field: "recency",
                value: 400.0,
                min: 0.0,
                max: 365.0,
            },
            BoundsViolation {
                field: "frequency",
                value: 0.0,
                min: 1.0,
                max: 300.0,
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("recency = 400"));
        assert!(text.contains("frequency = 0"));
    }
}
