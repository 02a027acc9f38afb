use std::sync::Arc;

use crate::foundation::core::{BezPath, Canvas, Point, Rgba8};

/// Backend-agnostic description of one composited frame.
///
/// Ops are drawn in order over a canvas cleared to `background`; text labels go on top of
/// everything else.
#[derive(Clone, Debug)]
pub struct FramePlan {
    pub canvas: Canvas,
    pub background: Rgba8,
    pub ops: Vec<DrawOp>,
}

impl FramePlan {
    pub fn text_labels(&self) -> impl Iterator<Item = &TextLabel> {
        self.ops.iter().filter_map(|op| match op {
            DrawOp::Text(label) => Some(label),
            _ => None,
        })
    }
}

#[derive(Clone, Debug)]
pub enum DrawOp {
    /// Pre-colored pixel block placed with its top-left corner at `origin` (canvas pixels).
    Raster { image: Arc<RasterImage>, origin: Point },
    FillPath {
        path: BezPath,
        color: Rgba8,
        opacity: f32,
    },
    Text(TextLabel),
}

/// Premultiplied RGBA8 pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterImage {
    pub width: u32,
    pub height: u32,
    pub rgba8_premul: Vec<u8>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_svg(self) -> &'static str {
        match self {
            TextAnchor::Start => "start",
            TextAnchor::Middle => "middle",
            TextAnchor::End => "end",
        }
    }
}

/// A single line of text; `position` is the baseline anchor point in canvas pixels.
#[derive(Clone, Debug, PartialEq)]
pub struct TextLabel {
    pub text: String,
    pub position: Point,
    pub size_px: f64,
    pub anchor: TextAnchor,
    /// Rotation around `position`, degrees, counter-clockwise on screen.
    pub rotation_deg: f64,
    pub color: Rgba8,
}
