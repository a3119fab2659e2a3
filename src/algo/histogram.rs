use crate::config::HistogramSpec;
use crate::error::TelemetryError;
use serde::{Deserialize, Serialize};

/// Upper bound on buckets per histogram.
pub const MAX_BUCKETS: usize = 10_000;

/// `[lower, upper)` interval with its hit count. The last bucket of a
/// histogram is closed at `domain_max`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bucket {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
}

impl Bucket {
    pub fn midpoint(&self) -> f64 {
        (self.lower + self.upper) / 2.0
    }
}

/// Result of a single `observe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BucketUpdate {
    pub index: usize,
    /// Count after the increment (before any reset).
    pub count: u32,
    /// The increment hit the saturation limit and all buckets were zeroed.
    pub reset: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinSnapshot {
    pub midpoint: f64,
    pub count: u32,
}

/// Fixed-width counting histogram over a bounded domain.
///
/// Values at or above `domain_max` clamp into the last bucket. Values below
/// `domain_min` (and non-finite values) are rejected. When any bucket reaches
/// `saturation_limit` the whole histogram is zeroed in the same call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RangeHistogram {
    buckets: Vec<Bucket>,
    domain_min: f64,
    domain_max: f64,
    bucket_width: f64,
    saturation_limit: u32,
    total_resets: u64,
}

impl RangeHistogram {
    pub fn new(
        domain_min: f64,
        domain_max: f64,
        bucket_width: f64,
        saturation_limit: u32,
    ) -> Result<Self, TelemetryError> {
        if !domain_min.is_finite() || !domain_max.is_finite() || domain_max <= domain_min {
            return Err(TelemetryError::InvalidConfig(format!(
                "histogram domain [{}, {}] is empty",
                domain_min, domain_max
            )));
        }
        if !bucket_width.is_finite() || bucket_width <= 0.0 {
            return Err(TelemetryError::InvalidConfig(format!(
                "bucket width must be positive, got {}",
                bucket_width
            )));
        }
        if saturation_limit == 0 {
            return Err(TelemetryError::InvalidConfig(
                "saturation limit must be at least 1".to_string(),
            ));
        }

        let num_buckets = ((domain_max - domain_min) / bucket_width).ceil();
        if !num_buckets.is_finite() || num_buckets > MAX_BUCKETS as f64 {
            return Err(TelemetryError::InvalidConfig(format!(
                "histogram [{}, {}] with width {} exceeds {} buckets",
                domain_min, domain_max, bucket_width, MAX_BUCKETS
            )));
        }
        let num_buckets = num_buckets as usize;
        let buckets: Vec<Bucket> = (0..num_buckets)
            .map(|i| {
                let lower = domain_min + i as f64 * bucket_width;
                let upper = (domain_min + (i + 1) as f64 * bucket_width).min(domain_max);
                Bucket {
                    lower,
                    upper,
                    count: 0,
                }
            })
            .filter(|b| b.lower < domain_max)
            .collect();

        Ok(Self {
            buckets,
            domain_min,
            domain_max,
            bucket_width,
            saturation_limit,
            total_resets: 0,
        })
    }

    pub fn from_spec(spec: &HistogramSpec) -> Result<Self, TelemetryError> {
        Self::new(
            spec.domain_min,
            spec.domain_max,
            spec.bucket_width,
            spec.saturation_limit,
        )
    }

    pub fn bucket_index(&self, value: f64) -> Result<usize, TelemetryError> {
        if !value.is_finite() || value < self.domain_min {
            return Err(TelemetryError::OutOfDomainValue {
                value,
                min: self.domain_min,
                max: self.domain_max,
            });
        }
        let last = self.buckets.len() - 1;
        if value >= self.domain_max {
            return Ok(last);
        }
        let idx = ((value - self.domain_min) / self.bucket_width).floor() as usize;
        Ok(idx.min(last))
    }

    pub fn accepts(&self, value: f64) -> bool {
        self.bucket_index(value).is_ok()
    }

    pub fn observe(&mut self, value: f64) -> Result<BucketUpdate, TelemetryError> {
        let index = self.bucket_index(value)?;
        let bucket = &mut self.buckets[index];
        bucket.count += 1;
        let count = bucket.count;

        let reset = count >= self.saturation_limit;
        if reset {
            self.reset();
            self.total_resets += 1;
        }

        Ok(BucketUpdate {
            index,
            count,
            reset,
        })
    }

    pub fn reset(&mut self) {
        for b in &mut self.buckets {
            b.count = 0;
        }
    }

    /// Full redraw data, in bucket order.
    pub fn snapshot(&self) -> Vec<BinSnapshot> {
        self.buckets
            .iter()
            .map(|b| BinSnapshot {
                midpoint: b.midpoint(),
                count: b.count,
            })
            .collect()
    }

    pub fn buckets(&self) -> &[Bucket] {
        &self.buckets
    }

    pub fn total_count(&self) -> u64 {
        self.buckets.iter().map(|b| b.count as u64).sum()
    }

    pub fn total_resets(&self) -> u64 {
        self.total_resets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn color() -> RangeHistogram {
        RangeHistogram::from_spec(&HistogramSpec::color()).unwrap()
    }

    #[test]
    fn test_color_buckets_partition_domain() {
        let hist = color();
        let buckets = hist.buckets();
        assert_eq!(buckets.len(), 13);
        assert_eq!(buckets[0].lower, 0.0);
        assert_eq!(buckets[12].lower, 240.0);
        assert_eq!(buckets[12].upper, 255.0);
        for pair in buckets.windows(2) {
            assert_eq!(pair[0].upper, pair[1].lower);
        }
    }

    #[test]
    fn test_light_buckets() {
        let hist = RangeHistogram::from_spec(&HistogramSpec::light()).unwrap();
        let buckets = hist.buckets();
        assert_eq!(buckets.len(), 11);
        assert_eq!(buckets[10].lower, 1000.0);
        assert_eq!(buckets[10].upper, 1024.0);
    }

    #[test]
    fn test_observe_hits_single_bucket() {
        let mut hist = color();
        let update = hist.observe(25.0).unwrap();
        assert_eq!(update.index, 1);
        assert!(!update.reset);

        let counts: Vec<u32> = hist.snapshot().iter().map(|b| b.count).collect();
        let mut expected = vec![0; 13];
        expected[1] = 1;
        assert_eq!(counts, expected);
    }

    #[test]
    fn test_half_open_boundaries() {
        let hist = color();
        assert_eq!(hist.bucket_index(0.0).unwrap(), 0);
        assert_eq!(hist.bucket_index(19.99).unwrap(), 0);
        assert_eq!(hist.bucket_index(20.0).unwrap(), 1);
        assert_eq!(hist.bucket_index(254.9).unwrap(), 12);
    }

    #[test]
    fn test_above_domain_clamps_to_last_bucket() {
        let hist = color();
        assert_eq!(hist.bucket_index(255.0).unwrap(), 12);
        assert_eq!(hist.bucket_index(4000.0).unwrap(), 12);
    }

    #[test]
    fn test_below_domain_rejected() {
        let mut hist = color();
        assert!(matches!(
            hist.observe(-0.5),
            Err(TelemetryError::OutOfDomainValue { .. })
        ));
        assert!(!hist.accepts(f64::NAN));
        assert_eq!(hist.total_count(), 0);
    }

    #[test]
    fn test_saturation_resets_everything_once() {
        let mut hist = color();
        hist.observe(200.0).unwrap();
        hist.observe(5.0).unwrap();

        let mut resets = 0;
        for _ in 0..100 {
            if hist.observe(30.0).unwrap().reset {
                resets += 1;
            }
        }

        assert_eq!(resets, 1);
        assert_eq!(hist.total_resets(), 1);
        assert_eq!(hist.total_count(), 0);
    }

    #[test]
    fn test_saturating_update_reports_limit() {
        let mut hist = RangeHistogram::new(0.0, 10.0, 5.0, 3).unwrap();
        hist.observe(1.0).unwrap();
        hist.observe(1.0).unwrap();
        let update = hist.observe(1.0).unwrap();
        assert_eq!(update.count, 3);
        assert!(update.reset);
        assert!(hist.snapshot().iter().all(|b| b.count == 0));
    }

    #[test]
    fn test_snapshot_midpoints() {
        let hist = color();
        let snap = hist.snapshot();
        assert_eq!(snap[0].midpoint, 10.0);
        assert_eq!(snap[12].midpoint, 247.5);
    }

    #[test]
    fn test_invalid_construction() {
        assert!(RangeHistogram::new(10.0, 10.0, 1.0, 100).is_err());
        assert!(RangeHistogram::new(0.0, 10.0, 0.0, 100).is_err());
        assert!(RangeHistogram::new(0.0, 10.0, 1.0, 0).is_err());
        assert!(matches!(
            RangeHistogram::new(0.0, 1e300, 1.0, 100),
            Err(TelemetryError::InvalidConfig(_))
        ));
        assert!(RangeHistogram::new(0.0, f64::MAX, f64::MIN_POSITIVE, 100).is_err());
        assert_eq!(
            RangeHistogram::new(0.0, MAX_BUCKETS as f64, 1.0, 100)
                .unwrap()
                .buckets()
                .len(),
            MAX_BUCKETS
        );
    }
}
