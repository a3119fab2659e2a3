//! Windowed telemetry aggregator.
//!
//! Consumes one line at a time and alternates between two states:
//! `AwaitingSample` until `cycle_length` samples were accepted, then
//! `AwaitingSummary` for the single summary record that closes the cycle.
//! Lines that fail to parse are dropped without advancing either state or
//! the reading count.

use crate::algo::{AnnotatedValue, AnomalyFlagger, BinSnapshot, RangeHistogram, SlidingWindow};
use crate::color::ResultingColor;
use crate::config::AggregatorConfig;
use crate::error::{ParseError, TelemetryError};
use crate::protocol::{
    Channel, ChannelValues, ProtocolVariant, RecordLayout, Sample, Summary, parse_record,
};
use serde::Serialize;
use tracing::{debug, info, warn};

// --- Series naming ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesKind {
    ZScore,
    FilteredZScore,
    Cusum,
}

impl SeriesKind {
    pub fn suffix(self) -> &'static str {
        match self {
            SeriesKind::ZScore => "z",
            SeriesKind::FilteredZScore => "z_wf",
            SeriesKind::Cusum => "cusum",
        }
    }

    pub fn series_name(self, channel: Channel) -> String {
        format!("{}.{}", channel.name(), self.suffix())
    }

    /// Windowed series carried by a protocol variant, in registration order.
    pub fn for_variant(variant: ProtocolVariant) -> &'static [SeriesKind] {
        match variant {
            ProtocolVariant::Basic => &[SeriesKind::ZScore, SeriesKind::Cusum],
            ProtocolVariant::Filtered => &[
                SeriesKind::ZScore,
                SeriesKind::FilteredZScore,
                SeriesKind::Cusum,
            ],
        }
    }

    fn values(self, sample: &Sample) -> Option<ChannelValues> {
        match self {
            SeriesKind::ZScore => Some(sample.z_scores),
            SeriesKind::FilteredZScore => sample.filtered_z_scores,
            SeriesKind::Cusum => Some(sample.cusum),
        }
    }
}

// --- Output types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregatorState {
    AwaitingSample,
    AwaitingSummary,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistogramSnapshot {
    pub channel: Channel,
    pub bins: Vec<BinSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesSnapshot {
    pub series: String,
    pub values: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesFlag {
    pub series: String,
    pub channel: Channel,
    #[serde(flatten)]
    pub value: AnnotatedValue,
}

/// Everything a presentation layer needs to redraw after one sample.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SampleReport {
    /// 1-based position within the current cycle.
    pub reading: usize,
    pub sample: Sample,
    pub histograms: Vec<HistogramSnapshot>,
    pub windows: Vec<SeriesSnapshot>,
    pub anomaly_flags: Vec<SeriesFlag>,
    pub color: ResultingColor,
}

impl SampleReport {
    pub fn anomalies(&self) -> impl Iterator<Item = &SeriesFlag> {
        self.anomaly_flags.iter().filter(|f| f.value.is_anomalous)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum AggregatorEvent {
    SampleProcessed(SampleReport),
    HistogramReset { channel: Channel },
    SummaryReady(Summary),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AggregatorStats {
    pub lines_received: u64,
    pub samples_accepted: u64,
    pub summaries_accepted: u64,
    pub lines_dropped: u64,
    pub histogram_resets: u64,
    pub anomalies_flagged: u64,
    pub cycles_completed: u64,
}

/// Receiver of aggregator output, called synchronously in emission order.
pub trait EventSink {
    fn emit(&mut self, event: AggregatorEvent);
}

impl EventSink for Vec<AggregatorEvent> {
    fn emit(&mut self, event: AggregatorEvent) {
        self.push(event);
    }
}

impl EventSink for crossbeam_channel::Sender<AggregatorEvent> {
    fn emit(&mut self, event: AggregatorEvent) {
        if self.send(event).is_err() {
            debug!("Event receiver gone; event discarded.");
        }
    }
}

// --- Aggregator ---

pub struct TelemetryAggregator {
    config: AggregatorConfig,
    sample_layout: RecordLayout,
    summary_layout: RecordLayout,
    histograms: Vec<(Channel, RangeHistogram)>,
    windows: SlidingWindow,
    state: AggregatorState,
    reading_count: usize,
    stats: AggregatorStats,
}

impl TelemetryAggregator {
    pub fn new(variant: ProtocolVariant) -> Result<Self, TelemetryError> {
        Self::with_config(AggregatorConfig::for_variant(variant))
    }

    pub fn with_config(config: AggregatorConfig) -> Result<Self, TelemetryError> {
        config.validate()?;

        let histograms = Channel::ALL
            .into_iter()
            .map(|c| RangeHistogram::from_spec(&config.histogram_spec(c)).map(|h| (c, h)))
            .collect::<Result<Vec<_>, _>>()?;

        let series_names = SeriesKind::for_variant(config.variant)
            .iter()
            .flat_map(|kind| Channel::ALL.into_iter().map(move |c| kind.series_name(c)));
        let windows = SlidingWindow::with_series(config.window_capacity, series_names);

        Ok(Self {
            sample_layout: config.variant.sample_layout(),
            summary_layout: config.variant.summary_layout(),
            config,
            histograms,
            windows,
            state: AggregatorState::AwaitingSample,
            reading_count: 0,
            stats: AggregatorStats::default(),
        })
    }

    pub fn ingest_line(&mut self, line: &str) -> Result<Vec<AggregatorEvent>, TelemetryError> {
        let mut events = Vec::new();
        self.ingest_line_into(line, &mut events)?;
        Ok(events)
    }

    pub fn ingest_line_into<S: EventSink + ?Sized>(
        &mut self,
        line: &str,
        sink: &mut S,
    ) -> Result<(), TelemetryError> {
        self.stats.lines_received += 1;
        let variant = self.config.variant;
        match self.state {
            AggregatorState::AwaitingSample => {
                match parse_record(line, &self.sample_layout)
                    .and_then(|record| Sample::from_record(&record, variant))
                {
                    Ok(sample) => self.process_sample(sample, sink),
                    Err(e) => {
                        self.drop_line(&e);
                        Ok(())
                    }
                }
            }
            AggregatorState::AwaitingSummary => {
                match parse_record(line, &self.summary_layout)
                    .and_then(|record| Summary::from_record(&record, variant))
                {
                    Ok(summary) => self.complete_cycle(summary, sink),
                    Err(e) => self.drop_line(&e),
                }
                Ok(())
            }
        }
    }

    fn process_sample<S: EventSink + ?Sized>(
        &mut self,
        sample: Sample,
        sink: &mut S,
    ) -> Result<(), TelemetryError> {
        // Reject before touching any state so a sample applies wholesale or not at all.
        for (channel, hist) in &self.histograms {
            if let Err(e) = hist.bucket_index(sample.channels.get(*channel)) {
                warn!(
                    channel = %channel,
                    error = %e,
                    "Sample rejected: value outside histogram domain."
                );
                return Err(e);
            }
        }

        for (channel, hist) in &mut self.histograms {
            let update = hist.observe(sample.channels.get(*channel))?;
            if update.reset {
                self.stats.histogram_resets += 1;
                info!(
                    channel = %channel,
                    bucket = update.index,
                    "Histogram saturated; counts reset."
                );
                sink.emit(AggregatorEvent::HistogramReset { channel: *channel });
            }
        }

        let threshold = self.config.cusum_threshold;
        let mut anomaly_flags = Vec::with_capacity(Channel::ALL.len());
        for &kind in SeriesKind::for_variant(self.config.variant) {
            let Some(values) = kind.values(&sample) else {
                continue;
            };
            for (channel, value) in values.iter() {
                let series = kind.series_name(channel);
                self.windows.push(&series, value)?;
                if kind == SeriesKind::Cusum {
                    let annotated = AnomalyFlagger::flag(value, threshold);
                    if annotated.is_anomalous {
                        self.stats.anomalies_flagged += 1;
                        debug!(series = %series, value, threshold, "CUSUM above threshold.");
                    }
                    anomaly_flags.push(SeriesFlag {
                        series,
                        channel,
                        value: annotated,
                    });
                }
            }
        }

        self.reading_count += 1;
        self.stats.samples_accepted += 1;

        let report = SampleReport {
            reading: self.reading_count,
            histograms: self.histogram_snapshots(),
            windows: self.window_snapshots(),
            anomaly_flags,
            color: ResultingColor::from_channels(&sample.channels),
            sample,
        };
        sink.emit(AggregatorEvent::SampleProcessed(report));

        if self.reading_count >= self.config.cycle_length {
            self.state = AggregatorState::AwaitingSummary;
            debug!(readings = self.reading_count, "Cycle full; awaiting summary.");
        }
        Ok(())
    }

    fn complete_cycle<S: EventSink + ?Sized>(&mut self, summary: Summary, sink: &mut S) {
        self.reading_count = 0;
        self.state = AggregatorState::AwaitingSample;
        self.stats.summaries_accepted += 1;
        self.stats.cycles_completed += 1;
        info!(cycle = self.stats.cycles_completed, summary = %summary, "Cycle complete.");
        sink.emit(AggregatorEvent::SummaryReady(summary));
    }

    fn drop_line(&mut self, error: &ParseError) {
        self.stats.lines_dropped += 1;
        debug!(state = ?self.state, error = %error, "Malformed line dropped.");
    }

    /// Back to `AwaitingSample` with empty histograms and windows.
    /// Lifetime statistics are kept.
    pub fn reset(&mut self) {
        for (_, hist) in &mut self.histograms {
            hist.reset();
        }
        self.windows.clear();
        self.reading_count = 0;
        self.state = AggregatorState::AwaitingSample;
    }

    pub fn histogram_snapshots(&self) -> Vec<HistogramSnapshot> {
        self.histograms
            .iter()
            .map(|(channel, hist)| HistogramSnapshot {
                channel: *channel,
                bins: hist.snapshot(),
            })
            .collect()
    }

    pub fn window_snapshots(&self) -> Vec<SeriesSnapshot> {
        self.windows
            .iter()
            .map(|s| SeriesSnapshot {
                series: s.name().to_string(),
                values: s.values().iter().copied().collect(),
            })
            .collect()
    }

    pub fn window_snapshot(&self, series: &str) -> Result<Vec<f64>, TelemetryError> {
        self.windows.snapshot(series)
    }

    /// CUSUM window of `channel` with every point re-flagged, for marker redraws.
    pub fn annotated_window(
        &self,
        channel: Channel,
    ) -> Result<Vec<AnnotatedValue>, TelemetryError> {
        let values = self.windows.snapshot(&SeriesKind::Cusum.series_name(channel))?;
        Ok(AnomalyFlagger::flag_all(&values, self.config.cusum_threshold))
    }

    pub fn histogram(&self, channel: Channel) -> Option<&RangeHistogram> {
        self.histograms
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, h)| h)
    }

    pub fn state(&self) -> AggregatorState {
        self.state
    }

    pub fn reading_count(&self) -> usize {
        self.reading_count
    }

    pub fn stats(&self) -> &AggregatorStats {
        &self.stats
    }

    pub fn config(&self) -> &AggregatorConfig {
        &self.config
    }

    pub fn variant(&self) -> ProtocolVariant {
        self.config.variant
    }
}
