use serde::{Deserialize, Serialize};

/// Exponentially weighted mean and variance, parameterised by half-life in samples.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct Ewma {
    alpha: f64,
    mean: f64,
    variance: f64,
    initialized: bool,
}

impl Ewma {
    pub fn new(half_life: f64) -> Self {
        let alpha = 1.0 - (-std::f64::consts::LN_2 / half_life.max(f64::EPSILON)).exp();
        Self {
            alpha,
            mean: 0.0,
            variance: 0.0,
            initialized: false,
        }
    }

    pub fn update(&mut self, sample: f64) -> f64 {
        if !self.initialized {
            self.mean = sample;
            self.variance = 0.0;
            self.initialized = true;
        } else {
            let diff = sample - self.mean;
            self.mean += self.alpha * diff;
            self.variance = (1.0 - self.alpha) * (self.variance + self.alpha * diff * diff);
        }
        self.mean
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    pub fn std_dev(&self) -> f64 {
        self.variance.sqrt()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }
}
