//! Error types for line decoding and aggregation.
//!
//! `ParseError` is recoverable: the aggregator drops the offending line.
//! `TelemetryError` means the configuration and the data disagree and is
//! returned to the caller.

/// Failure to decode one CSV line against a `RecordLayout`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    ArityMismatch { expected: usize, found: usize },
    NumericParse { index: usize, field: String },
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ArityMismatch { expected, found } => {
                write!(f, "Arity mismatch: expected {} fields, found {}", expected, found)
            }
            Self::NumericParse { index, field } => {
                write!(f, "Field {} is not a finite number: {:?}", index, field)
            }
        }
    }
}

impl std::error::Error for ParseError {}

/// Hard errors surfaced by histograms, windows and the aggregator.
#[derive(Debug, Clone, PartialEq)]
pub enum TelemetryError {
    UnknownSeries(String),
    OutOfDomainValue { value: f64, min: f64, max: f64 },
    InvalidConfig(String),
    ConfigUnreadable { path: String, reason: String },
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownSeries(name) => write!(f, "Unknown series: {}", name),
            Self::OutOfDomainValue { value, min, max } => {
                write!(f, "Value {} outside histogram domain [{}, {}]", value, min, max)
            }
            Self::InvalidConfig(e) => write!(f, "Invalid config: {}", e),
            Self::ConfigUnreadable { path, reason } => {
                write!(f, "Cannot read config {}: {}", path, reason)
            }
        }
    }
}

impl std::error::Error for TelemetryError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_names_field() {
        let err = ParseError::NumericParse {
            index: 3,
            field: "abc".to_string(),
        };
        assert_eq!(err.to_string(), "Field 3 is not a finite number: \"abc\"");
    }

    #[test]
    fn test_domain_error_display() {
        let err = TelemetryError::OutOfDomainValue {
            value: -1.0,
            min: 0.0,
            max: 255.0,
        };
        assert!(err.to_string().contains("[0, 255]"));
    }
}
