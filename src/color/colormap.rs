use std::{fmt, str::FromStr};

use crate::foundation::{
    core::Rgba8,
    error::{ReelError, ReelResult},
};

/// Named palettes. Each palette is a piecewise-linear ramp through the listed anchors.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Palette {
    #[default]
    Gray,
    Viridis,
    Plasma,
    Magma,
    Coolwarm,
    Twilight,
}

const GRAY: &[[u8; 3]] = &[[0, 0, 0], [255, 255, 255]];

const VIRIDIS: &[[u8; 3]] = &[
    [0x44, 0x01, 0x54],
    [0x48, 0x24, 0x75],
    [0x41, 0x44, 0x87],
    [0x35, 0x5f, 0x8d],
    [0x2a, 0x78, 0x8e],
    [0x21, 0x91, 0x8c],
    [0x22, 0xa8, 0x84],
    [0x44, 0xbf, 0x70],
    [0x7a, 0xd1, 0x51],
    [0xbd, 0xdf, 0x26],
    [0xfd, 0xe7, 0x25],
];

const PLASMA: &[[u8; 3]] = &[
    [0x0d, 0x08, 0x87],
    [0x4c, 0x02, 0xa1],
    [0x7e, 0x03, 0xa8],
    [0xa9, 0x23, 0x95],
    [0xcc, 0x47, 0x78],
    [0xe5, 0x6b, 0x5d],
    [0xf8, 0x95, 0x40],
    [0xfd, 0xc4, 0x27],
    [0xf0, 0xf9, 0x21],
];

const MAGMA: &[[u8; 3]] = &[
    [0x00, 0x00, 0x04],
    [0x1c, 0x10, 0x44],
    [0x4f, 0x12, 0x7b],
    [0x81, 0x25, 0x81],
    [0xb5, 0x36, 0x7a],
    [0xe5, 0x50, 0x64],
    [0xfb, 0x87, 0x61],
    [0xfe, 0xc2, 0x87],
    [0xfc, 0xfd, 0xbf],
];

const COOLWARM: &[[u8; 3]] = &[
    [0x3b, 0x4c, 0xc0],
    [0x62, 0x82, 0xea],
    [0x8d, 0xb0, 0xfe],
    [0xb8, 0xd0, 0xf9],
    [0xdd, 0xdd, 0xdd],
    [0xf5, 0xc4, 0xac],
    [0xf4, 0x9a, 0x7b],
    [0xde, 0x60, 0x4d],
    [0xb4, 0x04, 0x26],
];

// Cyclic: both ends share the same color.
const TWILIGHT: &[[u8; 3]] = &[
    [0xe2, 0xd9, 0xe2],
    [0xa5, 0xbf, 0xd0],
    [0x6a, 0x8d, 0xc4],
    [0x5d, 0x52, 0xa8],
    [0x2f, 0x14, 0x36],
    [0x7f, 0x2c, 0x4b],
    [0xb6, 0x5a, 0x4f],
    [0xd5, 0xa1, 0x8e],
    [0xe2, 0xd9, 0xe2],
];

impl Palette {
    fn anchors(self) -> &'static [[u8; 3]] {
        match self {
            Palette::Gray => GRAY,
            Palette::Viridis => VIRIDIS,
            Palette::Plasma => PLASMA,
            Palette::Magma => MAGMA,
            Palette::Coolwarm => COOLWARM,
            Palette::Twilight => TWILIGHT,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Palette::Gray => "gray",
            Palette::Viridis => "viridis",
            Palette::Plasma => "plasma",
            Palette::Magma => "magma",
            Palette::Coolwarm => "coolwarm",
            Palette::Twilight => "twilight",
        }
    }
}

/// A palette plus orientation, parsed from names like `viridis` or `coolwarm_r`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Colormap {
    pub palette: Palette,
    pub reversed: bool,
}

impl Colormap {
    pub const GRAY: Self = Self {
        palette: Palette::Gray,
        reversed: false,
    };

    /// Color for a normalized value in `[0, 1]` (clamped).
    pub fn sample(self, t: f64) -> Rgba8 {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let t = if self.reversed { 1.0 - t } else { t };

        let anchors = self.palette.anchors();
        let segments = (anchors.len() - 1) as f64;
        let pos = t * segments;
        let i = (pos.floor() as usize).min(anchors.len() - 2);
        let frac = pos - i as f64;

        let lerp = |a: u8, b: u8| -> u8 {
            (f64::from(a) + (f64::from(b) - f64::from(a)) * frac)
                .round()
                .clamp(0.0, 255.0) as u8
        };
        let (a, b) = (anchors[i], anchors[i + 1]);
        Rgba8::opaque(lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2]))
    }
}

impl fmt::Display for Colormap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.palette.name())?;
        if self.reversed {
            f.write_str("_r")?;
        }
        Ok(())
    }
}

impl FromStr for Colormap {
    type Err = ReelError;

    fn from_str(s: &str) -> ReelResult<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let (base, reversed) = match lower.strip_suffix("_r") {
            Some(base) => (base, true),
            None => (lower.as_str(), false),
        };
        let palette = match base {
            "gray" | "grey" => Palette::Gray,
            "viridis" => Palette::Viridis,
            "plasma" => Palette::Plasma,
            "magma" => Palette::Magma,
            "coolwarm" => Palette::Coolwarm,
            "twilight" => Palette::Twilight,
            _ => {
                return Err(ReelError::validation(format!(
                    "unknown colormap '{s}' (expected gray, viridis, plasma, magma, coolwarm or twilight, optionally with _r)"
                )));
            }
        };
        Ok(Self { palette, reversed })
    }
}

impl TryFrom<String> for Colormap {
    type Error = ReelError;

    fn try_from(value: String) -> ReelResult<Self> {
        value.parse()
    }
}

impl From<Colormap> for String {
    fn from(value: Colormap) -> Self {
        value.to_string()
    }
}

/// Intensity bounds shared by every frame of a movie.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    pub min: f64,
    pub max: f64,
}

impl ColorScale {
    pub fn new(min: f64, max: f64) -> ReelResult<Self> {
        if !min.is_finite() || !max.is_finite() || min > max {
            return Err(ReelError::validation(format!(
                "invalid color scale bounds [{min}, {max}]"
            )));
        }
        Ok(Self { min, max })
    }

    /// NaN-ignoring min/max over all samples.
    pub fn from_samples(samples: &[f64]) -> ReelResult<Self> {
        let (min, max) = samples
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            return Err(ReelError::data(
                "image sequence contains no finite samples to scale colors by",
            ));
        }
        Ok(Self { min, max })
    }

    /// Map `v` to `[0, 1]`. A flat scale maps everything to 0. NaN stays NaN.
    pub fn normalize(self, v: f64) -> f64 {
        if v.is_nan() {
            return f64::NAN;
        }
        let span = self.max - self.min;
        if span <= 0.0 {
            return 0.0;
        }
        ((v - self.min) / span).clamp(0.0, 1.0)
    }
}
