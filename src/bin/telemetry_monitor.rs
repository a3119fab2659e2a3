//! telemetry-monitor - aggregate sensor telemetry lines from a file or stdin
//!
//! Usage:
//!   telemetry-monitor watch --input capture.csv --format pretty
//!   telemetry-monitor simulate --cycles 20 --variant basic \
//!       | telemetry-monitor watch --variant basic
//!   telemetry-monitor watch --config telemetry.json

use clap::{Parser, Subcommand, ValueEnum};
use crossbeam_channel::bounded;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use telemetry_core::simulation::{SensorSimulator, SimulatorConfig};
use telemetry_core::{
    AggregatorConfig, AggregatorEvent, AggregatorWorker, ProtocolVariant, TelemetryAggregator,
    forward_lines,
};
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "telemetry-monitor")]
#[command(about = "Windowed histogram, z-score and CUSUM aggregation of sensor telemetry")]
struct Cli {
    /// Log at DEBUG level (dropped lines, flagged points)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Aggregate lines and print events
    Watch {
        /// Input file; "-" or omitted reads stdin
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// JSON config file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Protocol variant (overrides the config file)
        #[arg(long)]
        variant: Option<VariantArg>,

        /// Output format
        #[arg(short, long, default_value = "json")]
        format: OutputFormat,
    },

    /// Emit synthetic sensor lines on stdout
    Simulate {
        /// Number of cycles (samples + summary)
        #[arg(short, long, default_value = "10")]
        cycles: usize,

        #[arg(long, default_value = "filtered")]
        variant: VariantArg,

        #[arg(long)]
        seed: Option<u64>,

        /// Probability a sample carries a spike
        #[arg(long, default_value = "0.05")]
        anomaly_rate: f64,

        /// Probability a sample line is truncated
        #[arg(long, default_value = "0.0")]
        malformed_rate: f64,
    },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum VariantArg {
    Basic,
    Filtered,
}

impl From<VariantArg> for ProtocolVariant {
    fn from(v: VariantArg) -> Self {
        match v {
            VariantArg::Basic => ProtocolVariant::Basic,
            VariantArg::Filtered => ProtocolVariant::Filtered,
        }
    }
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Watch {
            input,
            config,
            variant,
            format,
        } => watch(input, config, variant, format),
        Commands::Simulate {
            cycles,
            variant,
            seed,
            anomaly_rate,
            malformed_rate,
        } => simulate(
            cycles,
            SimulatorConfig {
                variant: variant.into(),
                anomaly_rate,
                malformed_rate,
                seed,
                ..SimulatorConfig::default()
            },
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "telemetry-monitor failed");
            ExitCode::FAILURE
        }
    }
}

fn watch(
    input: Option<PathBuf>,
    config_path: Option<PathBuf>,
    variant: Option<VariantArg>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match &config_path {
        Some(path) => AggregatorConfig::from_file(path)?,
        None => AggregatorConfig::default(),
    };
    if let Some(v) = variant {
        config.variant = v.into();
    }
    let aggregator = TelemetryAggregator::with_config(config)?;

    let reader: Box<dyn BufRead + Send> = match input {
        Some(path) if path.as_os_str() != "-" => {
            info!(path = %path.display(), "Reading telemetry from file.");
            Box::new(BufReader::new(std::fs::File::open(path)?))
        }
        _ => {
            info!("Reading telemetry from stdin.");
            Box::new(BufReader::new(std::io::stdin()))
        }
    };

    let (line_tx, line_rx) = bounded::<String>(1024);
    let (event_tx, event_rx) = bounded::<AggregatorEvent>(1024);

    let worker = AggregatorWorker::spawn(aggregator, line_rx, event_tx)?;
    let source = thread::Builder::new()
        .name("telemetry-source".into())
        .spawn(move || forward_lines(reader, &line_tx))?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for event in event_rx.iter() {
        match format {
            OutputFormat::Json => {
                let line = serde_json::json!({
                    "received_at": chrono::Local::now().to_rfc3339(),
                    "event": event,
                });
                writeln!(out, "{}", line)?;
            }
            OutputFormat::Pretty => writeln!(out, "{}", pretty(&event))?,
        }
    }
    out.flush()?;

    // The event stream ends when the worker exits. On a hard error the source
    // may still be blocked on input, so it is only joined after a clean stop.
    let stats = worker.join().map_err(|_| "aggregator thread panicked")??;
    let forwarded = source
        .join()
        .map_err(|_| "line source thread panicked")??;
    info!(
        lines = forwarded,
        samples = stats.samples_accepted,
        cycles = stats.cycles_completed,
        dropped = stats.lines_dropped,
        resets = stats.histogram_resets,
        anomalies = stats.anomalies_flagged,
        "Input exhausted."
    );
    Ok(())
}

fn pretty(event: &AggregatorEvent) -> String {
    let ts = chrono::Local::now().format("%H:%M:%S%.3f");
    match event {
        AggregatorEvent::SampleProcessed(report) => {
            let flagged: Vec<String> = report
                .anomalies()
                .map(|f| format!("{}={:.3}", f.series, f.value.value))
                .collect();
            let s = &report.sample.channels;
            format!(
                "{} #{:<2} r={:<4} g={:<4} b={:<4} light={:<5} color={} {}",
                ts,
                report.reading,
                s.red,
                s.green,
                s.blue,
                s.light,
                report.color,
                if flagged.is_empty() {
                    String::new()
                } else {
                    format!("CUSUM! {}", flagged.join(" "))
                }
            )
        }
        AggregatorEvent::HistogramReset { channel } => {
            format!("{} histogram reset: {}", ts, channel)
        }
        AggregatorEvent::SummaryReady(summary) => format!("{} summary: {}", ts, summary),
    }
}

fn simulate(cycles: usize, config: SimulatorConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut sim = SensorSimulator::new(config);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    for _ in 0..cycles {
        for line in sim.next_cycle() {
            writeln!(out, "{}", line)?;
        }
    }
    out.flush()?;
    Ok(())
}
