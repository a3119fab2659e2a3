//! Windowed aggregation of colour/light sensor telemetry.
//!
//! Lines arrive from an external source (serial port, file, pipe) and are fed
//! one at a time into a [`TelemetryAggregator`], which keeps per-channel range
//! histograms, sliding windows of the z-score and CUSUM series, and flags CUSUM
//! values above a threshold. Output is a stream of [`AggregatorEvent`]s; thread
//! affinity of whoever draws them is the caller's concern.

pub mod algo;
pub mod color;
pub mod config;
pub mod engine;
pub mod error;
pub mod ffi;
pub mod protocol;
pub mod simulation;
pub mod worker;

pub use color::ResultingColor;
pub use config::{AggregatorConfig, HistogramSpec};
pub use engine::{
    AggregatorEvent, AggregatorState, AggregatorStats, EventSink, SampleReport, SeriesKind,
    TelemetryAggregator,
};
pub use error::{ParseError, TelemetryError};
pub use protocol::{Channel, ProtocolVariant, Sample, Summary};
pub use worker::{AggregatorWorker, forward_lines};
