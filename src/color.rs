use crate::protocol::ChannelValues;
use serde::{Deserialize, Serialize};

/// Displayable RGB triple derived from a sample's colour channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultingColor {
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl ResultingColor {
    pub fn from_channels(channels: &ChannelValues) -> Self {
        Self {
            red: component(channels.red),
            green: component(channels.green),
            blue: component(channels.blue),
        }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02X}{:02X}{:02X}", self.red, self.green, self.blue)
    }
}

impl std::fmt::Display for ResultingColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_hex())
    }
}

// Truncate toward zero, then clamp. NaN becomes 0.
fn component(value: f64) -> u8 {
    if value.is_nan() {
        return 0;
    }
    value.trunc().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamps_each_component() {
        let channels = ChannelValues {
            red: 300.0,
            green: -12.0,
            blue: 127.9,
            light: 900.0,
        };
        let color = ResultingColor::from_channels(&channels);
        assert_eq!(
            color,
            ResultingColor {
                red: 255,
                green: 0,
                blue: 127
            }
        );
        assert_eq!(color.to_hex(), "#FF007F");
    }

    #[test]
    fn test_nan_is_black() {
        let channels = ChannelValues {
            red: f64::NAN,
            ..Default::default()
        };
        assert_eq!(ResultingColor::from_channels(&channels).to_string(), "#000000");
    }
}
