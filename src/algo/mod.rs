pub mod cusum;
pub mod ewma;
pub mod flag;
pub mod histogram;
pub mod window;

// Re-exports for convenience
pub use cusum::Cusum;
pub use ewma::Ewma;
pub use flag::{AnnotatedValue, AnomalyFlagger, DEFAULT_CUSUM_THRESHOLD};
pub use histogram::{BinSnapshot, Bucket, BucketUpdate, RangeHistogram};
pub use window::{DEFAULT_WINDOW_CAPACITY, SlidingWindow, WindowedSeries};
