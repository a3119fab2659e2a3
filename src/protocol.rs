//! Sensor line protocol: one CSV record per line.
//!
//! A cycle is `cycle_length` sample records followed by one summary record.
//! Two shapes exist on the wire:
//! - `Basic`: 12-field samples, 2-field summaries
//! - `Filtered`: 16-field samples (adds with-filter z-scores), 4-field summaries

use crate::error::ParseError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Red,
    Green,
    Blue,
    Light,
}

impl Channel {
    pub const ALL: [Channel; 4] = [Channel::Red, Channel::Green, Channel::Blue, Channel::Light];

    pub fn name(self) -> &'static str {
        match self {
            Channel::Red => "red",
            Channel::Green => "green",
            Channel::Blue => "blue",
            Channel::Light => "light",
        }
    }
}

impl std::fmt::Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// One value per channel.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ChannelValues {
    pub red: f64,
    pub green: f64,
    pub blue: f64,
    pub light: f64,
}

impl ChannelValues {
    pub fn get(&self, channel: Channel) -> f64 {
        match channel {
            Channel::Red => self.red,
            Channel::Green => self.green,
            Channel::Blue => self.blue,
            Channel::Light => self.light,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Channel, f64)> + '_ {
        Channel::ALL.into_iter().map(move |c| (c, self.get(c)))
    }

    /// `values` holds exactly one field per channel, in `Channel::ALL` order.
    fn from_fields(values: &[FieldValue]) -> Self {
        Self {
            red: values[0].as_f64(),
            green: values[1].as_f64(),
            blue: values[2].as_f64(),
            light: values[3].as_f64(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProtocolVariant {
    Basic,
    #[default]
    Filtered,
}

impl ProtocolVariant {
    pub fn sample_layout(self) -> RecordLayout {
        let mut fields: Vec<(String, FieldKind)> = Channel::ALL
            .iter()
            .map(|c| (c.name().to_string(), FieldKind::Float))
            .collect();
        let blocks: &[&str] = match self {
            ProtocolVariant::Basic => &["z", "cusum"],
            ProtocolVariant::Filtered => &["z", "z_wf", "cusum"],
        };
        for block in blocks {
            for c in Channel::ALL {
                fields.push((format!("{}_{}", c.name(), block), FieldKind::Float));
            }
        }
        RecordLayout::new(fields)
    }

    pub fn summary_layout(self) -> RecordLayout {
        match self {
            ProtocolVariant::Basic => RecordLayout::new([
                ("exec_time", FieldKind::Float),
                ("memory_usage", FieldKind::Integer),
            ]),
            ProtocolVariant::Filtered => RecordLayout::new([
                ("exec_org", FieldKind::Float),
                ("exec_wf", FieldKind::Float),
                ("exec_total", FieldKind::Float),
                ("memory_usage", FieldKind::Integer),
            ]),
        }
    }

    pub fn has_filtered_block(self) -> bool {
        matches!(self, ProtocolVariant::Filtered)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Float,
    Integer,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
}

/// Ordered field layout a line must match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordLayout {
    fields: Vec<FieldSpec>,
}

impl RecordLayout {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = (S, FieldKind)>,
        S: Into<String>,
    {
        Self {
            fields: fields
                .into_iter()
                .map(|(name, kind)| FieldSpec {
                    name: name.into(),
                    kind,
                })
                .collect(),
        }
    }

    pub fn arity(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
}

impl FieldValue {
    pub fn as_f64(&self) -> f64 {
        match *self {
            FieldValue::Float(v) => v,
            FieldValue::Integer(v) => v as f64,
        }
    }

    pub fn as_i64(&self) -> i64 {
        match *self {
            FieldValue::Float(v) => v as i64,
            FieldValue::Integer(v) => v,
        }
    }
}

/// Decoded line, values in layout order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub values: Vec<FieldValue>,
}

impl Record {
    fn expect_arity(&self, expected: usize) -> Result<(), ParseError> {
        if self.values.len() == expected {
            Ok(())
        } else {
            Err(ParseError::ArityMismatch {
                expected,
                found: self.values.len(),
            })
        }
    }
}

/// Decode one line against `layout`. All-or-nothing: any bad field rejects
/// the whole line.
pub fn parse_record(line: &str, layout: &RecordLayout) -> Result<Record, ParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let raw_fields: Vec<&str> = line.split(',').collect();

    if raw_fields.len() != layout.arity() {
        return Err(ParseError::ArityMismatch {
            expected: layout.arity(),
            found: raw_fields.len(),
        });
    }

    let mut values = Vec::with_capacity(raw_fields.len());
    for (index, (raw, spec)) in raw_fields.iter().zip(layout.fields()).enumerate() {
        let raw = raw.trim();
        let value = match spec.kind {
            FieldKind::Float => raw
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(FieldValue::Float),
            FieldKind::Integer => raw.parse::<i64>().ok().map(FieldValue::Integer),
        };
        let value = value.ok_or_else(|| ParseError::NumericParse {
            index,
            field: raw.to_string(),
        })?;
        values.push(value);
    }

    Ok(Record { values })
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub channels: ChannelValues,
    pub z_scores: ChannelValues,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filtered_z_scores: Option<ChannelValues>,
    pub cusum: ChannelValues,
}

impl Sample {
    /// Build from a record decoded with `variant.sample_layout()`.
    pub fn from_record(record: &Record, variant: ProtocolVariant) -> Result<Self, ParseError> {
        record.expect_arity(variant.sample_layout().arity())?;
        let v = &record.values;
        let block = |n: usize| ChannelValues::from_fields(&v[n * 4..n * 4 + 4]);
        Ok(match variant {
            ProtocolVariant::Basic => Self {
                channels: block(0),
                z_scores: block(1),
                filtered_z_scores: None,
                cusum: block(2),
            },
            ProtocolVariant::Filtered => Self {
                channels: block(0),
                z_scores: block(1),
                filtered_z_scores: Some(block(2)),
                cusum: block(3),
            },
        })
    }

    pub fn parse(line: &str, variant: ProtocolVariant) -> Result<Self, ParseError> {
        let record = parse_record(line, &variant.sample_layout())?;
        Self::from_record(&record, variant)
    }
}

/// Timing and memory report closing each cycle.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Summary {
    Basic {
        exec_time: f64,
        memory_usage: i64,
    },
    Filtered {
        exec_org: f64,
        exec_wf: f64,
        exec_total: f64,
        memory_usage: i64,
    },
}

impl Summary {
    /// Build from a record decoded with `variant.summary_layout()`.
    pub fn from_record(record: &Record, variant: ProtocolVariant) -> Result<Self, ParseError> {
        record.expect_arity(variant.summary_layout().arity())?;
        let f = |i: usize| record.values[i].as_f64();
        let n = |i: usize| record.values[i].as_i64();
        Ok(match variant {
            ProtocolVariant::Basic => Summary::Basic {
                exec_time: f(0),
                memory_usage: n(1),
            },
            ProtocolVariant::Filtered => Summary::Filtered {
                exec_org: f(0),
                exec_wf: f(1),
                exec_total: f(2),
                memory_usage: n(3),
            },
        })
    }

    pub fn parse(line: &str, variant: ProtocolVariant) -> Result<Self, ParseError> {
        let record = parse_record(line, &variant.summary_layout())?;
        Self::from_record(&record, variant)
    }

    pub fn memory_usage(&self) -> i64 {
        match *self {
            Summary::Basic { memory_usage, .. } | Summary::Filtered { memory_usage, .. } => {
                memory_usage
            }
        }
    }
}

impl std::fmt::Display for Summary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Summary::Basic {
                exec_time,
                memory_usage,
            } => write!(f, "exec {} μs, memory {} bytes", exec_time, memory_usage),
            Summary::Filtered {
                exec_org,
                exec_wf,
                exec_total,
                memory_usage,
            } => write!(
                f,
                "exec org {} μs, wf {} μs, total {} ms, memory {} bytes",
                exec_org, exec_wf, exec_total, memory_usage
            ),
        }
    }
}
