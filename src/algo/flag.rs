use serde::{Deserialize, Serialize};

/// Threshold the sensor firmware's CUSUM output is checked against.
pub const DEFAULT_CUSUM_THRESHOLD: f64 = 2.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedValue {
    pub value: f64,
    pub is_anomalous: bool,
}

/// Stateless threshold check for drift statistics.
pub struct AnomalyFlagger;

impl AnomalyFlagger {
    pub fn flag(value: f64, threshold: f64) -> AnnotatedValue {
        AnnotatedValue {
            value,
            is_anomalous: value.abs() > threshold,
        }
    }

    pub fn flag_all(values: &[f64], threshold: f64) -> Vec<AnnotatedValue> {
        values.iter().map(|&v| Self::flag(v, threshold)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag() {
        assert!(AnomalyFlagger::flag(3.0, 2.0).is_anomalous);
        assert!(!AnomalyFlagger::flag(-1.0, 2.0).is_anomalous);
        assert!(AnomalyFlagger::flag(-2.5, 2.0).is_anomalous);
        // strictly greater
        assert!(!AnomalyFlagger::flag(2.0, 2.0).is_anomalous);
    }

    #[test]
    fn test_threshold_is_caller_supplied() {
        assert!(!AnomalyFlagger::flag(3.0, 5.0).is_anomalous);
        assert!(AnomalyFlagger::flag(0.2, 0.1).is_anomalous);
    }

    #[test]
    fn test_flag_all_keeps_values() {
        let flagged = AnomalyFlagger::flag_all(&[0.5, 4.0, -3.0], DEFAULT_CUSUM_THRESHOLD);
        let marks: Vec<bool> = flagged.iter().map(|a| a.is_anomalous).collect();
        assert_eq!(marks, vec![false, true, true]);
        assert_eq!(flagged[1].value, 4.0);
    }
}
