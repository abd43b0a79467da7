use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer};

/// Color palette for the run report
#[derive(Debug, Clone, Deserialize)]
pub struct Theme {
    #[serde(default = "default_success", deserialize_with = "deserialize_color")]
    pub success: String,

    #[serde(default = "default_failure", deserialize_with = "deserialize_color")]
    pub failure: String,

    #[serde(default = "default_planned", deserialize_with = "deserialize_color")]
    pub planned: String,

    #[serde(default = "default_path", deserialize_with = "deserialize_color")]
    pub path: String,

    #[serde(default = "default_summary", deserialize_with = "deserialize_color")]
    pub summary: String,
}

/// Deserialize a color from either hex string (#RRGGBB) or RGB array [r, g, b]
fn deserialize_color<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum ColorValue {
        Hex(String),
        Rgb([u8; 3]),
    }

    match ColorValue::deserialize(deserializer)? {
        ColorValue::Hex(hex) => {
            let hex = hex.trim_start_matches('#');
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(D::Error::custom(format!("Invalid hex color: {}", hex)));
            }

            let channel = |range: std::ops::Range<usize>| {
                u8::from_str_radix(&hex[range], 16)
                    .map_err(|_| D::Error::custom(format!("Invalid hex color: {}", hex)))
            };

            Ok(rgb_to_ansi(channel(0..2)?, channel(2..4)?, channel(4..6)?))
        }
        ColorValue::Rgb([r, g, b]) => Ok(rgb_to_ansi(r, g, b)),
    }
}

/// Convert RGB values to ANSI escape code
fn rgb_to_ansi(r: u8, g: u8, b: u8) -> String {
    format!("\x1b[38;2;{};{};{}m", r, g, b)
}

fn default_success() -> String {
    "\x1b[38;2;169;182;101m".to_string() // #a9b665
}

fn default_failure() -> String {
    "\x1b[38;2;234;105;98m".to_string() // #ea6962
}

fn default_planned() -> String {
    "\x1b[38;2;125;174;163m".to_string() // #7daea3
}

fn default_path() -> String {
    "\x1b[38;2;221;199;161m".to_string() // #ddc7a1
}

fn default_summary() -> String {
    "\x1b[38;2;216;166;87m".to_string() // #d8a657
}

impl Default for Theme {
    fn default() -> Self {
        Theme {
            success: default_success(),
            failure: default_failure(),
            planned: default_planned(),
            path: default_path(),
            summary: default_summary(),
        }
    }
}

impl Theme {
    /// Parse a theme from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse theme JSON")
    }
}
