use std::path::PathBuf;

use crate::{
    compose::plan::FramePlan,
    foundation::error::{ReelError, ReelResult},
    render::text::FontBook,
};

/// One rendered frame as RGBA8 pixels, row-major, top row first.
#[derive(Clone, Debug)]
pub struct FrameRGBA {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Pixel at `(x, y)` in canvas coordinates.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.data
            .get(i..i + 4)
            .map(|px| [px[0], px[1], px[2], px[3]])
    }
}

pub trait RenderBackend {
    fn render_plan(&mut self, plan: &FramePlan) -> ReelResult<FrameRGBA>;

    /// Settings that let a pool of identical backends render frames in parallel.
    fn worker_render_settings(&self) -> Option<RenderSettings> {
        None
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum BackendKind {
    #[default]
    Cpu,
}

#[derive(Clone, Debug, Default)]
pub struct RenderSettings {
    /// Extra directories scanned for label fonts, on top of system fonts.
    pub font_dirs: Vec<PathBuf>,
    /// Preloaded fonts. Loaded lazily from `font_dirs` when absent.
    pub fonts: Option<FontBook>,
}

pub fn create_backend(
    kind: BackendKind,
    settings: &RenderSettings,
) -> ReelResult<Box<dyn RenderBackend>> {
    match kind {
        BackendKind::Cpu => Ok(Box::new(crate::render::cpu::CpuBackend::new(
            settings.clone(),
        ))),
    }
}

pub(crate) fn canvas_side_u16(side: u32, what: &str) -> ReelResult<u16> {
    side.try_into()
        .map_err(|_| ReelError::render(format!("{what} {side} exceeds u16")))
}
