//! Synthetic sensor that speaks the line protocol.
//!
//! Produces the same statistics the firmware computes: z-scores against a
//! slow EWMA baseline, with-filter z-scores from a fast EWMA of the raw
//! reading, and a two-sided CUSUM over the z-score.

use crate::algo::{Cusum, Ewma};
use crate::config::{DEFAULT_CYCLE_LENGTH, HistogramSpec};
use crate::protocol::{Channel, ProtocolVariant};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub variant: ProtocolVariant,
    pub cycle_length: usize,
    /// Probability that a sample carries a spike on one channel.
    pub anomaly_rate: f64,
    /// Probability that a sample line is emitted with its last field missing.
    pub malformed_rate: f64,
    pub seed: Option<u64>,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            variant: ProtocolVariant::default(),
            cycle_length: DEFAULT_CYCLE_LENGTH,
            anomaly_rate: 0.05,
            malformed_rate: 0.0,
            seed: None,
        }
    }
}

struct ChannelModel {
    channel: Channel,
    level: f64,
    noise: f64,
    max: f64,
    baseline: Ewma,
    filter: Ewma,
    cusum: Cusum,
}

impl ChannelModel {
    fn new(channel: Channel, level: f64, noise: f64, max: f64) -> Self {
        Self {
            channel,
            level,
            noise,
            max,
            baseline: Ewma::new(20.0),
            filter: Ewma::new(2.0),
            cusum: Cusum::new(0.0, 0.5, 5.0),
        }
    }

    /// Returns (raw, z, z_wf, cusum).
    fn step(&mut self, rng: &mut StdRng, spike: bool) -> (f64, f64, f64, f64) {
        let n: f64 = rng.sample(StandardNormal);
        let mut raw = self.level + n * self.noise;
        if spike {
            raw += 6.0 * self.noise;
        }
        let raw = raw.round().clamp(0.0, self.max);

        let filtered = self.filter.update(raw);
        let (z, z_wf) = if self.baseline.is_initialized() {
            let sd = self.baseline.std_dev().max(1.0);
            let mean = self.baseline.mean();
            ((raw - mean) / sd, (filtered - mean) / sd)
        } else {
            (0.0, 0.0)
        };
        self.baseline.update(raw);
        let cusum = self.cusum.update(z);

        (raw, z, z_wf, cusum)
    }
}

pub struct SensorSimulator {
    config: SimulatorConfig,
    rng: StdRng,
    models: Vec<ChannelModel>,
}

impl SensorSimulator {
    pub fn new(config: SimulatorConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let color_max = HistogramSpec::color().domain_max;
        let light_max = HistogramSpec::light().domain_max;
        let models = vec![
            ChannelModel::new(Channel::Red, 180.0, 6.0, color_max),
            ChannelModel::new(Channel::Green, 120.0, 6.0, color_max),
            ChannelModel::new(Channel::Blue, 60.0, 6.0, color_max),
            ChannelModel::new(Channel::Light, 600.0, 25.0, light_max),
        ];
        Self { config, rng, models }
    }

    /// `cycle_length` sample lines followed by one summary line.
    pub fn next_cycle(&mut self) -> Vec<String> {
        let mut lines: Vec<String> = (0..self.config.cycle_length)
            .map(|_| self.sample_line())
            .collect();
        lines.push(self.summary_line());
        lines
    }

    pub fn sample_line(&mut self) -> String {
        let spike_channel = if self.rng.random_bool(self.config.anomaly_rate.clamp(0.0, 1.0)) {
            Some(self.rng.random_range(0..self.models.len()))
        } else {
            None
        };

        let mut raw = Vec::with_capacity(4);
        let mut z = Vec::with_capacity(4);
        let mut z_wf = Vec::with_capacity(4);
        let mut cusum = Vec::with_capacity(4);
        for (i, model) in self.models.iter_mut().enumerate() {
            let (r, zs, zw, c) = model.step(&mut self.rng, spike_channel == Some(i));
            raw.push(format!("{:.0}", r));
            z.push(format!("{:.3}", zs));
            z_wf.push(format!("{:.3}", zw));
            cusum.push(format!("{:.3}", c));
        }
        if let Some(i) = spike_channel {
            tracing::debug!(channel = %self.models[i].channel, "Injected spike.");
        }

        let mut fields = raw;
        fields.extend(z);
        if self.config.variant.has_filtered_block() {
            fields.extend(z_wf);
        }
        fields.extend(cusum);

        if self.rng.random_bool(self.config.malformed_rate.clamp(0.0, 1.0)) {
            fields.pop();
        }
        fields.join(",")
    }

    pub fn summary_line(&mut self) -> String {
        let memory: i64 = self.rng.random_range(2800..3200);
        let n: f64 = self.rng.sample(StandardNormal);
        let exec_org = 850.0 + n * 40.0;
        match self.config.variant {
            ProtocolVariant::Basic => format!("{:.2},{}", exec_org, memory),
            ProtocolVariant::Filtered => {
                let m: f64 = self.rng.sample(StandardNormal);
                let exec_wf = 920.0 + m * 50.0;
                let exec_total = (exec_org + exec_wf) * self.config.cycle_length as f64 / 1000.0;
                format!("{:.2},{:.2},{:.3},{}", exec_org, exec_wf, exec_total, memory)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Sample, Summary};

    fn seeded(variant: ProtocolVariant) -> SensorSimulator {
        SensorSimulator::new(SimulatorConfig {
            variant,
            seed: Some(7),
            ..SimulatorConfig::default()
        })
    }

    #[test]
    fn test_cycle_shape() {
        for variant in [ProtocolVariant::Basic, ProtocolVariant::Filtered] {
            let mut sim = seeded(variant);
            let lines = sim.next_cycle();
            assert_eq!(lines.len(), 11);
            for line in &lines[..10] {
                let sample = Sample::parse(line, variant).unwrap();
                assert!(sample.channels.red >= 0.0 && sample.channels.red <= 255.0);
                assert!(sample.channels.light <= 1024.0);
            }
            assert!(Summary::parse(&lines[10], variant).is_ok());
        }
    }

    #[test]
    fn test_seed_is_deterministic() {
        let a = seeded(ProtocolVariant::Filtered).next_cycle();
        let b = seeded(ProtocolVariant::Filtered).next_cycle();
        assert_eq!(a, b);
    }

    #[test]
    fn test_malformed_lines_lose_a_field() {
        let mut sim = SensorSimulator::new(SimulatorConfig {
            variant: ProtocolVariant::Basic,
            malformed_rate: 1.0,
            seed: Some(1),
            ..SimulatorConfig::default()
        });
        let line = sim.sample_line();
        assert_eq!(line.split(',').count(), 11);
    }

    #[test]
    fn test_spikes_drive_cusum() {
        let mut sim = SensorSimulator::new(SimulatorConfig {
            variant: ProtocolVariant::Basic,
            anomaly_rate: 1.0,
            seed: Some(3),
            ..SimulatorConfig::default()
        });
        let peak = (0..50)
            .map(|_| Sample::parse(&sim.sample_line(), ProtocolVariant::Basic).unwrap())
            .flat_map(|s| s.cusum.iter().map(|(_, v)| v.abs()).collect::<Vec<_>>())
            .fold(0.0_f64, f64::max);
        assert!(peak > 2.0, "spikes should push CUSUM past the default threshold");
    }
}
