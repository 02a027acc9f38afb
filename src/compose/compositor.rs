use std::sync::Arc;

use crate::{
    color::colormap::{ColorScale, Colormap},
    compose::plan::{DrawOp, FramePlan, RasterImage, TextAnchor, TextLabel},
    data::model::{FieldSlice, Raster},
    foundation::{
        core::{BezPath, Canvas, Point, Rect, Rgba8, Vec2},
        error::{ReelError, ReelResult},
    },
};

/// Largest canvas side the CPU rasterizer accepts.
pub const MAX_CANVAS_SIDE: u32 = u16::MAX as u32;

/// Roughly this many arrows span the shorter grid side.
const ARROWS_ACROSS: usize = 50;

/// Shaft width as a fraction of the plot width; head sizes are multiples of it.
const ARROW_WIDTH_FRACTION: f64 = 0.005;
const ARROW_HEAD_WIDTH: f64 = 3.0;
const ARROW_HEAD_LENGTH: f64 = 5.0;

/// How arrow lengths relate to vector magnitudes.
#[derive(Clone, Copy, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArrowScale {
    /// The largest vector of the whole movie spans one sub-sampling stride.
    Auto,
    /// Grid cells per unit of vector magnitude.
    Fixed(f64),
}

impl ArrowScale {
    /// Cells per unit magnitude for a field whose largest magnitude is `max_magnitude`.
    pub fn resolve(self, max_magnitude: f64, stride: usize) -> f64 {
        match self {
            ArrowScale::Fixed(s) => s,
            ArrowScale::Auto => {
                if max_magnitude > 0.0 && max_magnitude.is_finite() {
                    stride as f64 / max_magnitude
                } else {
                    0.0
                }
            }
        }
    }
}

/// Presentation parameters that do not depend on the data.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ComposeStyle {
    /// Length in pixels of the longer plot side.
    pub plot_size_px: u32,
    /// Pixels per inch, used to convert marker sizes given in points.
    pub dpi: f64,
    pub font_size_px: f64,
    pub background: Rgba8,
    pub axes_color: Rgba8,
    pub arrow_color: Rgba8,
    pub arrow_scale: ArrowScale,
    pub marker_opacity: f32,
    pub colorbar: bool,
}

impl Default for ComposeStyle {
    fn default() -> Self {
        Self {
            plot_size_px: 480,
            dpi: 100.0,
            font_size_px: 14.0,
            background: Rgba8::WHITE,
            axes_color: Rgba8::BLACK,
            arrow_color: Rgba8::BLACK,
            arrow_scale: ArrowScale::Auto,
            marker_opacity: 0.6,
            colorbar: true,
        }
    }
}

/// Movie-wide values computed once and shared by every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovieScales {
    pub colormap: Colormap,
    pub color_scale: ColorScale,
    pub spatial_scale_mm: f64,
    pub marker_color: Rgba8,
    /// Resolved grid cells per unit vector magnitude.
    pub arrow_cells_per_unit: f64,
}

/// Everything that changes from one frame to the next.
#[derive(Clone, Copy, Debug)]
pub struct FrameScene<'a> {
    pub raster: Raster<'a>,
    pub field: Option<FieldSlice<'a>>,
    pub events: Option<&'a [(i64, i64)]>,
    pub time_s: f64,
}

/// Pixel geometry of a frame. Data row 0 sits at the bottom of the plot.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlotLayout {
    pub canvas: Canvas,
    pub plot: Rect,
    pub colorbar: Option<Rect>,
    pub dim_x: usize,
    pub dim_y: usize,
}

impl PlotLayout {
    pub fn new(dim_x: usize, dim_y: usize, style: &ComposeStyle) -> ReelResult<Self> {
        if dim_x == 0 || dim_y == 0 {
            return Err(ReelError::validation("plot grid must be non-empty"));
        }
        if style.plot_size_px == 0 || !style.font_size_px.is_finite() || style.font_size_px < 0.0
        {
            return Err(ReelError::validation(
                "plot_size_px must be > 0 and font_size_px must be finite and >= 0",
            ));
        }

        let cell = f64::from(style.plot_size_px) / dim_x.max(dim_y) as f64;
        let plot_w = (dim_y as f64 * cell).round().max(1.0);
        let plot_h = (dim_x as f64 * cell).round().max(1.0);

        let font = style.font_size_px;
        let left = (font * 2.5).ceil().max(4.0);
        let top = font.ceil().max(4.0);
        let bottom = (font * 2.5).ceil().max(4.0);
        let right = (font * 0.5).ceil().max(4.0);

        let plot = Rect::new(left, top, left + plot_w, top + plot_h);
        let (colorbar, width) = if style.colorbar {
            let bar_w = (plot_w.max(plot_h) * 0.05).round().max(8.0);
            let ticks_w = (font * 4.5).ceil();
            let bar = Rect::new(plot.x1, plot.y0, plot.x1 + bar_w, plot.y1);
            (Some(bar), bar.x1 + ticks_w + right)
        } else {
            (None, plot.x1 + right)
        };
        let height = plot.y1 + bottom;

        if width > f64::from(MAX_CANVAS_SIDE) || height > f64::from(MAX_CANVAS_SIDE) {
            return Err(ReelError::validation(format!(
                "canvas too large: {width}x{height} (max {MAX_CANVAS_SIDE}x{MAX_CANVAS_SIDE})"
            )));
        }

        Ok(Self {
            canvas: Canvas {
                width: width as u32,
                height: height as u32,
            },
            plot,
            colorbar,
            dim_x,
            dim_y,
        })
    }

    pub fn cell_width(&self) -> f64 {
        self.plot.width() / self.dim_y as f64
    }

    pub fn cell_height(&self) -> f64 {
        self.plot.height() / self.dim_x as f64
    }

    /// Canvas position of the center of grid cell `(x, y)` (row `x`, column `y`).
    pub fn cell_center(&self, x: usize, y: usize) -> Point {
        Point::new(
            self.plot.x0 + (y as f64 + 0.5) * self.cell_width(),
            self.plot.y1 - (x as f64 + 0.5) * self.cell_height(),
        )
    }
}

/// Sub-sampling stride for arrows: `floor(min(dim_x, dim_y) / 50) + 1`.
pub fn arrow_stride(dim_x: usize, dim_y: usize) -> usize {
    dim_x.min(dim_y) / ARROWS_ACROSS + 1
}

/// Marker size in points: `50 / max(dim_x, dim_y)`.
pub fn marker_size_pt(dim_x: usize, dim_y: usize) -> f64 {
    50.0 / dim_x.max(dim_y).max(1) as f64
}

/// Builds [`FramePlan`]s for one movie. Layout and colorbar are fixed at construction.
#[derive(Clone, Debug)]
pub struct FrameCompositor {
    style: ComposeStyle,
    scales: MovieScales,
    layout: PlotLayout,
    colorbar: Option<Arc<RasterImage>>,
}

impl FrameCompositor {
    pub fn new(
        dim_x: usize,
        dim_y: usize,
        scales: MovieScales,
        style: ComposeStyle,
    ) -> ReelResult<Self> {
        let layout = PlotLayout::new(dim_x, dim_y, &style)?;
        let colorbar = layout
            .colorbar
            .map(|rect| Arc::new(colorbar_image(rect, scales.colormap)));
        Ok(Self {
            style,
            scales,
            layout,
            colorbar,
        })
    }

    pub fn layout(&self) -> &PlotLayout {
        &self.layout
    }

    pub fn scales(&self) -> &MovieScales {
        &self.scales
    }

    pub fn compose(&self, scene: &FrameScene<'_>) -> ReelResult<FramePlan> {
        let raster = scene.raster;
        if raster.dim_x != self.layout.dim_x || raster.dim_y != self.layout.dim_y {
            return Err(ReelError::validation(format!(
                "raster is {}x{} but the compositor was built for {}x{}",
                raster.dim_x, raster.dim_y, self.layout.dim_x, self.layout.dim_y
            )));
        }

        let mut ops = Vec::new();
        ops.push(DrawOp::Raster {
            image: Arc::new(self.raster_image(raster)),
            origin: Point::new(self.layout.plot.x0, self.layout.plot.y0),
        });

        if let Some(field) = scene.field {
            if field.dim_x != raster.dim_x || field.dim_y != raster.dim_y {
                return Err(ReelError::validation(
                    "vector field slice does not match raster shape",
                ));
            }
            self.push_arrows(&mut ops, field);
        }

        if let Some(events) = scene.events
            && !events.is_empty()
        {
            self.push_markers(&mut ops, events);
        }

        self.push_axes(&mut ops, scene.time_s);

        Ok(FramePlan {
            canvas: self.layout.canvas,
            background: self.style.background,
            ops,
        })
    }

    fn raster_image(&self, raster: Raster<'_>) -> RasterImage {
        let (dim_x, dim_y) = (raster.dim_x, raster.dim_y);
        let nan_color = self.style.background.to_premul();
        let cell_colors: Vec<[u8; 4]> = raster
            .samples
            .iter()
            .map(|&v| {
                let t = self.scales.color_scale.normalize(v);
                if t.is_nan() {
                    nan_color
                } else {
                    self.scales.colormap.sample(t).to_premul()
                }
            })
            .collect();

        let width = self.layout.plot.width() as u32;
        let height = self.layout.plot.height() as u32;
        let (cell_w, cell_h) = (self.layout.cell_width(), self.layout.cell_height());

        let columns: Vec<usize> = (0..width)
            .map(|px| (((f64::from(px) + 0.5) / cell_w) as usize).min(dim_y - 1))
            .collect();

        let mut rgba8_premul = Vec::with_capacity(width as usize * height as usize * 4);
        for py in 0..height {
            let from_top = (((f64::from(py) + 0.5) / cell_h) as usize).min(dim_x - 1);
            let x = dim_x - 1 - from_top;
            for &y in &columns {
                rgba8_premul.extend_from_slice(&cell_colors[x * dim_y + y]);
            }
        }

        RasterImage {
            width,
            height,
            rgba8_premul,
        }
    }

    fn push_arrows(&self, ops: &mut Vec<DrawOp>, field: FieldSlice<'_>) {
        let scale = self.scales.arrow_cells_per_unit;
        if scale <= 0.0 || !scale.is_finite() {
            return;
        }

        let stride = arrow_stride(field.dim_x, field.dim_y);
        let shaft = (self.layout.plot.width() * ARROW_WIDTH_FRACTION).max(1.0);
        let (cell_w, cell_h) = (self.layout.cell_width(), self.layout.cell_height());

        let mut path = BezPath::new();
        for x in (0..field.dim_x).step_by(stride) {
            for y in (0..field.dim_y).step_by(stride) {
                let v = field.get(x, y);
                if !v.re.is_finite() || !v.im.is_finite() {
                    continue;
                }
                // Imaginary part points up, screen y points down.
                let delta = Vec2::new(v.re * scale * cell_w, -v.im * scale * cell_h);
                append_arrow(&mut path, self.layout.cell_center(x, y), delta, shaft);
            }
        }

        if !path.elements().is_empty() {
            ops.push(DrawOp::FillPath {
                path,
                color: self.style.arrow_color,
                opacity: 1.0,
            });
        }
    }

    fn push_markers(&self, ops: &mut Vec<DrawOp>, events: &[(i64, i64)]) {
        let (dim_x, dim_y) = (self.layout.dim_x, self.layout.dim_y);
        let size_px = (marker_size_pt(dim_x, dim_y) * self.style.dpi / 72.0).max(1.0);
        let half = size_px / 2.0;

        let base = self.scales.marker_color;
        let alpha = (f32::from(base.a) * self.style.marker_opacity.clamp(0.0, 1.0)).round() as u8;
        let color = Rgba8 { a: alpha, ..base };

        for &(x, y) in events {
            let (Ok(x), Ok(y)) = (usize::try_from(x), usize::try_from(y)) else {
                continue;
            };
            if x >= dim_x || y >= dim_y {
                continue;
            }
            let c = self.layout.cell_center(x, y);
            let mut path = BezPath::new();
            path.move_to((c.x, c.y - half));
            path.line_to((c.x + half, c.y));
            path.line_to((c.x, c.y + half));
            path.line_to((c.x - half, c.y));
            path.close_path();
            // Separate paths so overlapping markers darken each other.
            ops.push(DrawOp::FillPath {
                path,
                color,
                opacity: 1.0,
            });
        }
    }

    fn push_axes(&self, ops: &mut Vec<DrawOp>, time_s: f64) {
        let plot = self.layout.plot;
        let font = self.style.font_size_px;
        let ink = self.style.axes_color;

        ops.push(DrawOp::FillPath {
            path: frame_path(plot, 1.0),
            color: ink,
            opacity: 1.0,
        });

        if let (Some(rect), Some(image)) = (self.layout.colorbar, &self.colorbar) {
            ops.push(DrawOp::Raster {
                image: Arc::clone(image),
                origin: Point::new(rect.x0, rect.y0),
            });
            ops.push(DrawOp::FillPath {
                path: frame_path(rect, 1.0),
                color: ink,
                opacity: 1.0,
            });

            let scale = self.scales.color_scale;
            let ticks = [
                (scale.max, rect.y0),
                ((scale.min + scale.max) / 2.0, (rect.y0 + rect.y1) / 2.0),
                (scale.min, rect.y1),
            ];
            let mut tick_marks = BezPath::new();
            for (value, y) in ticks {
                append_rect(
                    &mut tick_marks,
                    Rect::new(rect.x1, y - 0.5, rect.x1 + 3.0, y + 0.5),
                );
                ops.push(DrawOp::Text(TextLabel {
                    text: format_tick(value),
                    position: Point::new(rect.x1 + 5.0, y + font * 0.35),
                    size_px: font,
                    anchor: TextAnchor::Start,
                    rotation_deg: 0.0,
                    color: ink,
                }));
            }
            ops.push(DrawOp::FillPath {
                path: tick_marks,
                color: ink,
                opacity: 1.0,
            });
        }

        ops.push(DrawOp::Text(TextLabel {
            text: format!("pixel size: {:.2} mm", self.scales.spatial_scale_mm),
            position: Point::new(plot.x0 - font * 0.5, (plot.y0 + plot.y1) / 2.0),
            size_px: font,
            anchor: TextAnchor::Middle,
            rotation_deg: 90.0,
            color: ink,
        }));
        ops.push(DrawOp::Text(TextLabel {
            text: format!("{time_s:.3} s"),
            position: Point::new((plot.x0 + plot.x1) / 2.0, plot.y1 + font * 1.5),
            size_px: font,
            anchor: TextAnchor::Middle,
            rotation_deg: 0.0,
            color: ink,
        }));
    }
}

/// Colorbar gradient, maximum at the top.
fn colorbar_image(rect: Rect, colormap: Colormap) -> RasterImage {
    let width = rect.width() as u32;
    let height = rect.height() as u32;
    let mut rgba8_premul = Vec::with_capacity(width as usize * height as usize * 4);
    for py in 0..height {
        let t = 1.0 - (f64::from(py) + 0.5) / f64::from(height.max(1));
        let px = colormap.sample(t).to_premul();
        for _ in 0..width {
            rgba8_premul.extend_from_slice(&px);
        }
    }
    RasterImage {
        width,
        height,
        rgba8_premul,
    }
}

/// Short tick text: fixed point for ordinary magnitudes, scientific otherwise.
pub fn format_tick(v: f64) -> String {
    let a = v.abs();
    if v != 0.0 && !(1e-3..1e4).contains(&a) {
        return format!("{v:.2e}");
    }
    let s = format!("{v:.3}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

/// Arrow polygon from `tail` along `delta`: a shaft of width `shaft` plus a triangular head.
/// Zero-length arrows add nothing.
fn append_arrow(path: &mut BezPath, tail: Point, delta: Vec2, shaft: f64) {
    let len = delta.hypot();
    if len < 1e-9 || !len.is_finite() {
        return;
    }
    let dir = delta / len;
    let normal = Vec2::new(-dir.y, dir.x);

    let full_head = shaft * ARROW_HEAD_LENGTH;
    let shrink = (len / full_head).min(1.0);
    let head_len = full_head * shrink;
    let head_half = shaft * ARROW_HEAD_WIDTH / 2.0 * shrink;
    let shaft_half = (shaft / 2.0).min(head_half);

    let neck = tail + dir * (len - head_len);
    let tip = tail + delta;

    path.move_to(tail + normal * shaft_half);
    path.line_to(neck + normal * shaft_half);
    path.line_to(neck + normal * head_half);
    path.line_to(tip);
    path.line_to(neck - normal * head_half);
    path.line_to(neck - normal * shaft_half);
    path.line_to(tail - normal * shaft_half);
    path.close_path();
}

fn append_rect(path: &mut BezPath, r: Rect) {
    path.move_to((r.x0, r.y0));
    path.line_to((r.x1, r.y0));
    path.line_to((r.x1, r.y1));
    path.line_to((r.x0, r.y1));
    path.close_path();
}

/// Outline of `r` drawn outside it, `width` pixels thick.
fn frame_path(r: Rect, width: f64) -> BezPath {
    let mut path = BezPath::new();
    append_rect(&mut path, Rect::new(r.x0 - width, r.y0 - width, r.x1 + width, r.y0));
    append_rect(&mut path, Rect::new(r.x0 - width, r.y1, r.x1 + width, r.y1 + width));
    append_rect(&mut path, Rect::new(r.x0 - width, r.y0, r.x0, r.y1));
    append_rect(&mut path, Rect::new(r.x1, r.y0, r.x1 + width, r.y1));
    path
}
