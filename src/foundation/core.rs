use std::str::FromStr;

use crate::foundation::error::{ReelError, ReelResult};

pub use kurbo::{Affine, BezPath, Point, Rect, Vec2};

/// Position of a frame in the output timeline (0-based).
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    pub width: u32,
    pub height: u32,
}

/// Straight (non-premultiplied) RGBA8 color.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgba8 {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba8 {
    pub const BLACK: Self = Self::opaque(0, 0, 0);
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub fn to_premul(self) -> [u8; 4] {
        fn premul(c: u8, a: u8) -> u8 {
            let c = u16::from(c);
            let a = u16::from(a);
            (((c * a) + 127) / 255) as u8
        }
        [
            premul(self.r, self.a),
            premul(self.g, self.a),
            premul(self.b, self.a),
            self.a,
        ]
    }

    /// `#rrggbb` or `#rrggbbaa` when not fully opaque.
    pub fn to_hex(self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }
}

impl FromStr for Rgba8 {
    type Err = ReelError;

    /// Accepts single-letter plot colors (`k`, `w`, `r`, ...), a few common names and
    /// `#rgb` / `#rrggbb` / `#rrggbbaa` hex notation.
    fn from_str(s: &str) -> ReelResult<Self> {
        let s = s.trim();
        let named = match s.to_ascii_lowercase().as_str() {
            "k" | "black" => Some(Self::BLACK),
            "w" | "white" => Some(Self::WHITE),
            "r" | "red" => Some(Self::opaque(255, 0, 0)),
            "g" | "green" => Some(Self::opaque(0, 128, 0)),
            "b" | "blue" => Some(Self::opaque(0, 0, 255)),
            "c" | "cyan" => Some(Self::opaque(0, 191, 191)),
            "m" | "magenta" => Some(Self::opaque(191, 0, 191)),
            "y" | "yellow" => Some(Self::opaque(191, 191, 0)),
            "gray" | "grey" => Some(Self::opaque(128, 128, 128)),
            "orange" => Some(Self::opaque(255, 165, 0)),
            _ => None,
        };
        if let Some(c) = named {
            return Ok(c);
        }

        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ReelError::validation(format!("unknown color '{s}'")))?;
        let digits = hex
            .chars()
            .map(|c| {
                c.to_digit(16)
                    .map(|d| d as u8)
                    .ok_or_else(|| ReelError::validation(format!("invalid hex color '{s}'")))
            })
            .collect::<ReelResult<Vec<u8>>>()?;

        match digits.as_slice() {
            [r, g, b] => Ok(Self::opaque(r * 17, g * 17, b * 17)),
            [r1, r0, g1, g0, b1, b0] => Ok(Self::opaque(r1 * 16 + r0, g1 * 16 + g0, b1 * 16 + b0)),
            [r1, r0, g1, g0, b1, b0, a1, a0] => Ok(Self {
                r: r1 * 16 + r0,
                g: g1 * 16 + g0,
                b: b1 * 16 + b0,
                a: a1 * 16 + a0,
            }),
            _ => Err(ReelError::validation(format!(
                "hex color '{s}' must have 3, 6 or 8 digits"
            ))),
        }
    }
}

impl TryFrom<String> for Rgba8 {
    type Error = ReelError;

    fn try_from(value: String) -> ReelResult<Self> {
        value.parse()
    }
}

impl From<Rgba8> for String {
    fn from(value: Rgba8) -> Self {
        value.to_hex()
    }
}
