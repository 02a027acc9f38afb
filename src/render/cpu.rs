use std::sync::Arc;

use crate::{
    compose::plan::{DrawOp, FramePlan, RasterImage},
    foundation::{
        core::{Affine, BezPath, Point, Rgba8},
        error::{ReelError, ReelResult},
    },
    render::{
        backend::{FrameRGBA, RenderBackend, RenderSettings, canvas_side_u16},
        text::{FontBook, rasterize_labels},
    },
};

/// Software backend built on `vello_cpu`.
pub struct CpuBackend {
    settings: RenderSettings,
}

impl CpuBackend {
    pub fn new(settings: RenderSettings) -> Self {
        Self { settings }
    }

    fn fonts(&mut self) -> &FontBook {
        self.settings
            .fonts
            .get_or_insert_with(|| FontBook::load(&self.settings.font_dirs))
    }
}

impl RenderBackend for CpuBackend {
    #[tracing::instrument(level = "trace", skip_all, fields(ops = plan.ops.len()))]
    fn render_plan(&mut self, plan: &FramePlan) -> ReelResult<FrameRGBA> {
        let width = canvas_side_u16(plan.canvas.width, "canvas width")?;
        let height = canvas_side_u16(plan.canvas.height, "canvas height")?;

        let mut ctx = vello_cpu::RenderContext::new(width, height);
        ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
        ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);
        set_color(&mut ctx, plan.background);
        ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
            0.0,
            0.0,
            f64::from(width),
            f64::from(height),
        ));

        for op in &plan.ops {
            draw_op(&mut ctx, op)?;
        }

        if plan.text_labels().next().is_some() {
            let layer = rasterize_labels(plan.canvas, plan.text_labels(), self.fonts())?;
            draw_raster(&mut ctx, &layer, Point::ORIGIN)?;
        }

        ctx.flush();
        let mut pixmap = vello_cpu::Pixmap::new(width, height);
        ctx.render_to_pixmap(&mut pixmap);

        Ok(FrameRGBA {
            width: plan.canvas.width,
            height: plan.canvas.height,
            data: pixmap.data_as_u8_slice().to_vec(),
            premultiplied: true,
        })
    }

    fn worker_render_settings(&self) -> Option<RenderSettings> {
        Some(self.settings.clone())
    }
}

fn set_color(ctx: &mut vello_cpu::RenderContext, c: Rgba8) {
    ctx.set_paint(vello_cpu::peniko::Color::from_rgba8(c.r, c.g, c.b, c.a));
}

fn draw_op(ctx: &mut vello_cpu::RenderContext, op: &DrawOp) -> ReelResult<()> {
    ctx.set_paint_transform(vello_cpu::kurbo::Affine::IDENTITY);

    match op {
        DrawOp::Raster { image, origin } => draw_raster(ctx, image, *origin),
        DrawOp::FillPath {
            path,
            color,
            opacity,
        } => {
            ctx.set_transform(vello_cpu::kurbo::Affine::IDENTITY);
            set_color(ctx, *color);
            if *opacity < 1.0 {
                ctx.push_opacity_layer(*opacity);
            }
            ctx.fill_path(&bezpath_to_cpu(path));
            if *opacity < 1.0 {
                ctx.pop_layer();
            }
            Ok(())
        }
        // Labels are rasterized together once every other op is down.
        DrawOp::Text(_) => Ok(()),
    }
}

fn draw_raster(
    ctx: &mut vello_cpu::RenderContext,
    image: &RasterImage,
    origin: Point,
) -> ReelResult<()> {
    let pixmap = image_premul_bytes_to_pixmap(&image.rgba8_premul, image.width, image.height)?;
    let paint = vello_cpu::Image {
        image: vello_cpu::ImageSource::Pixmap(Arc::new(pixmap)),
        sampler: vello_cpu::peniko::ImageSampler::default(),
    };

    ctx.set_transform(affine_to_cpu(Affine::translate(origin.to_vec2())));
    ctx.set_paint(paint);
    ctx.fill_rect(&vello_cpu::kurbo::Rect::new(
        0.0,
        0.0,
        f64::from(image.width),
        f64::from(image.height),
    ));
    Ok(())
}

fn affine_to_cpu(a: Affine) -> vello_cpu::kurbo::Affine {
    vello_cpu::kurbo::Affine::new(a.as_coeffs())
}

fn point_to_cpu(p: Point) -> vello_cpu::kurbo::Point {
    vello_cpu::kurbo::Point::new(p.x, p.y)
}

fn bezpath_to_cpu(path: &BezPath) -> vello_cpu::kurbo::BezPath {
    use kurbo::PathEl;

    let mut out = vello_cpu::kurbo::BezPath::new();
    for &el in path.elements() {
        match el {
            PathEl::MoveTo(p) => out.move_to(point_to_cpu(p)),
            PathEl::LineTo(p) => out.line_to(point_to_cpu(p)),
            PathEl::QuadTo(p1, p2) => out.quad_to(point_to_cpu(p1), point_to_cpu(p2)),
            PathEl::CurveTo(p1, p2, p3) => {
                out.curve_to(point_to_cpu(p1), point_to_cpu(p2), point_to_cpu(p3));
            }
            PathEl::ClosePath => out.close_path(),
        }
    }
    out
}

fn image_premul_bytes_to_pixmap(
    rgba8_premul: &[u8],
    width: u32,
    height: u32,
) -> ReelResult<vello_cpu::Pixmap> {
    let w = canvas_side_u16(width, "raster width")?;
    let h = canvas_side_u16(height, "raster height")?;
    if rgba8_premul.len() != width as usize * height as usize * 4 {
        return Err(ReelError::render(format!(
            "raster byte length {} does not match {width}x{height}",
            rgba8_premul.len()
        )));
    }

    let mut may_have_opacities = false;
    let pixels: Vec<_> = rgba8_premul
        .chunks_exact(4)
        .map(|px| {
            may_have_opacities |= px[3] != 255;
            vello_cpu::peniko::color::PremulRgba8 {
                r: px[0],
                g: px[1],
                b: px[2],
                a: px[3],
            }
        })
        .collect();

    Ok(vello_cpu::Pixmap::from_parts_with_opacity(
        pixels,
        w,
        h,
        may_have_opacities,
    ))
}
