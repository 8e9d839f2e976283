//! Colors for choropleth bins and LISA clusters.

use serde::{Deserialize, Serialize};

pub type Rgba = [u8; 4];

/// Choropleth ramp. Index 0 is the "no observed cases" bin; the rest run from
/// pale yellow to deep red.
pub const COLOR_SCALE: [[u8; 3]; 10] = [
    [240, 240, 240],
    [255, 255, 204],
    [255, 237, 160],
    [254, 217, 118],
    [254, 178, 76],
    [253, 141, 60],
    [252, 78, 42],
    [227, 26, 28],
    [189, 0, 38],
    [128, 0, 38],
];

/// Fill for zero-valued features and non-significant clusters.
pub const BLANK: Rgba = [255, 255, 255, 200];

/// Color for a choropleth bin; bins past the ramp reuse its darkest entry.
pub fn bin_color(bin: usize) -> Rgba {
    if bin == 0 {
        return BLANK;
    }
    let [r, g, b] = COLOR_SCALE[bin.min(COLOR_SCALE.len() - 1)];
    [r, g, b, 255]
}

/// Cluster codes reported by a local Moran test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LisaCluster {
    NotSignificant,
    HighHigh,
    LowLow,
    HighLow,
    LowHigh,
    Undefined,
    Isolated,
}

impl LisaCluster {
    /// Codes outside 0..=6 are treated as `Undefined`.
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => LisaCluster::NotSignificant,
            1 => LisaCluster::HighHigh,
            2 => LisaCluster::LowLow,
            3 => LisaCluster::HighLow,
            4 => LisaCluster::LowHigh,
            6 => LisaCluster::Isolated,
            _ => LisaCluster::Undefined,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LisaCluster::NotSignificant => "Not significant",
            LisaCluster::HighHigh => "High-High",
            LisaCluster::LowLow => "Low-Low",
            LisaCluster::HighLow => "High-Low",
            LisaCluster::LowHigh => "Low-High",
            LisaCluster::Undefined => "Undefined",
            LisaCluster::Isolated => "Isolated",
        }
    }

    pub fn color(self) -> Rgba {
        match self {
            LisaCluster::NotSignificant => BLANK,
            LisaCluster::HighHigh => [0xFF, 0x00, 0x00, 255],
            LisaCluster::LowLow => [0x00, 0x00, 0xFF, 255],
            LisaCluster::HighLow => [0xa7, 0xad, 0xf9, 255],
            LisaCluster::LowHigh => [0xf4, 0xad, 0xa8, 255],
            LisaCluster::Undefined => [0x46, 0x46, 0x46, 255],
            LisaCluster::Isolated => [0x99, 0x99, 0x99, 255],
        }
    }
}
