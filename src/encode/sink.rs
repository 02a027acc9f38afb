use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::{
    foundation::{
        core::FrameIndex,
        error::{ReelError, ReelResult},
    },
    render::backend::FrameRGBA,
};

/// Configuration provided to a [`FrameSink`] before the first frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SinkConfig {
    pub width: u32,
    pub height: u32,
    /// Number of frames the sink will receive.
    pub frame_count: u64,
}

/// Sink contract for consuming rendered frames in timeline order.
///
/// `push_frame` is called in strictly increasing `FrameIndex` order.
pub trait FrameSink: Send {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()>;
    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()>;
    fn end(&mut self) -> ReelResult<()>;
}

/// In-memory sink for tests and debugging.
#[derive(Debug, Default)]
pub struct InMemorySink {
    cfg: Option<SinkConfig>,
    frames: Vec<(FrameIndex, FrameRGBA)>,
    finished: bool,
}

impl InMemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn config(&self) -> Option<&SinkConfig> {
        self.cfg.as_ref()
    }

    pub fn frames(&self) -> &[(FrameIndex, FrameRGBA)] {
        &self.frames
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

impl FrameSink for InMemorySink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        self.cfg = Some(cfg);
        self.frames.clear();
        self.finished = false;
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        self.frames.push((idx, frame.clone()));
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        self.finished = true;
        Ok(())
    }
}

/// `{name}_{index:05}.{extension}`
pub fn frame_file_name(name: &str, idx: FrameIndex, extension: &str) -> String {
    format!("{name}_{:05}.{extension}", idx.0)
}

/// Writes one still image per frame into a folder through the `image` crate.
#[derive(Debug)]
pub struct ImageSequenceSink {
    folder: PathBuf,
    name: String,
    extension: String,
    format: image::ImageFormat,
    cfg: Option<SinkConfig>,
    last_idx: Option<FrameIndex>,
    written: Vec<PathBuf>,
}

impl ImageSequenceSink {
    /// The file format is picked from `extension` (`png`, `jpg`, `bmp`, `tif`, ...).
    pub fn new(
        folder: impl Into<PathBuf>,
        name: impl Into<String>,
        extension: &str,
    ) -> ReelResult<Self> {
        let extension = extension.trim_start_matches('.').to_string();
        let format = image::ImageFormat::from_extension(&extension)
            .filter(|f| f.writing_enabled())
            .ok_or_else(|| {
                ReelError::validation(format!("unsupported frame format '{extension}'"))
            })?;
        let name = name.into();
        if name.is_empty() {
            return Err(ReelError::validation("frame name must be non-empty"));
        }
        Ok(Self {
            folder: folder.into(),
            name,
            extension,
            format,
            cfg: None,
            last_idx: None,
            written: Vec::new(),
        })
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    pub fn frame_path(&self, idx: FrameIndex) -> PathBuf {
        self.folder
            .join(frame_file_name(&self.name, idx, &self.extension))
    }

    /// Paths written so far, in push order.
    pub fn written(&self) -> &[PathBuf] {
        &self.written
    }

    fn has_alpha(&self) -> bool {
        !matches!(
            self.format,
            image::ImageFormat::Jpeg | image::ImageFormat::Pnm
        )
    }
}

impl FrameSink for ImageSequenceSink {
    fn begin(&mut self, cfg: SinkConfig) -> ReelResult<()> {
        if cfg.width == 0 || cfg.height == 0 {
            return Err(ReelError::validation(
                "image sequence sink width/height must be non-zero",
            ));
        }
        std::fs::create_dir_all(&self.folder).with_context(|| {
            format!("failed to create frame folder '{}'", self.folder.display())
        })?;
        self.cfg = Some(cfg);
        self.last_idx = None;
        self.written.clear();
        Ok(())
    }

    fn push_frame(&mut self, idx: FrameIndex, frame: &FrameRGBA) -> ReelResult<()> {
        let cfg = self
            .cfg
            .as_ref()
            .ok_or_else(|| ReelError::encode("image sequence sink not started"))?;
        if let Some(last) = self.last_idx
            && idx.0 <= last.0
        {
            return Err(ReelError::encode(
                "image sequence sink received out-of-order frame index",
            ));
        }
        if frame.width != cfg.width || frame.height != cfg.height {
            return Err(ReelError::validation(format!(
                "frame size mismatch: got {}x{}, expected {}x{}",
                frame.width, frame.height, cfg.width, cfg.height
            )));
        }

        let mut data = frame.data.clone();
        if frame.premultiplied {
            unpremultiply_in_place(&mut data);
        }
        let rgba = image::RgbaImage::from_raw(frame.width, frame.height, data)
            .ok_or_else(|| ReelError::encode("frame.data size mismatch with width*height*4"))?;
        let img = if self.has_alpha() {
            image::DynamicImage::ImageRgba8(rgba)
        } else {
            image::DynamicImage::ImageRgb8(image::DynamicImage::ImageRgba8(rgba).to_rgb8())
        };

        let path = self.frame_path(idx);
        img.save_with_format(&path, self.format)
            .map_err(|e| ReelError::encode(format!("failed to write '{}': {e}", path.display())))?;
        tracing::debug!(path = %path.display(), "wrote frame");

        self.last_idx = Some(idx);
        self.written.push(path);
        Ok(())
    }

    fn end(&mut self) -> ReelResult<()> {
        self.cfg = None;
        Ok(())
    }
}

fn unpremultiply_in_place(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 0 || a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * 255 + a / 2) / a).min(255) as u8;
        }
    }
}
