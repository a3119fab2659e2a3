use serde::{Deserialize, Serialize};

/// Two-sided tabular CUSUM as computed on the sensor side.
///
/// `update` returns the dominant side as a signed statistic: positive for
/// upward drift, negative for downward. Both sides restart from zero once
/// the statistic exceeds `decision_interval`.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Cusum {
    target: f64,
    slack: f64,
    decision_interval: f64,
    c_pos: f64,
    c_neg: f64,
}

impl Cusum {
    pub fn new(target: f64, slack: f64, decision_interval: f64) -> Self {
        Self {
            target,
            slack,
            decision_interval,
            c_pos: 0.0,
            c_neg: 0.0,
        }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        let deviation = sample - self.target;

        self.c_pos = (self.c_pos + deviation - self.slack).max(0.0);
        self.c_neg = (self.c_neg - deviation - self.slack).max(0.0);

        let statistic = if self.c_pos >= self.c_neg {
            self.c_pos
        } else {
            -self.c_neg
        };

        if statistic.abs() > self.decision_interval {
            self.c_pos = 0.0;
            self.c_neg = 0.0;
        }

        statistic
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accumulates_upward_shift() {
        let mut cusum = Cusum::new(0.0, 0.5, 10.0);
        let mut last = 0.0;
        for _ in 0..4 {
            last = cusum.update(2.0);
        }
        assert_eq!(last, 6.0);
    }

    #[test]
    fn test_downward_shift_is_negative() {
        let mut cusum = Cusum::new(0.0, 0.5, 10.0);
        cusum.update(-2.0);
        assert_eq!(cusum.update(-2.0), -3.0);
    }

    #[test]
    fn test_restarts_after_decision_interval() {
        let mut cusum = Cusum::new(0.0, 0.5, 4.0);
        assert_eq!(cusum.update(5.5), 5.0);
        assert_eq!(cusum.update(0.0), 0.0);
    }
}
