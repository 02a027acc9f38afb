use std::path::{Path, PathBuf};

use rayon::prelude::*;

use crate::{
    color::colormap::{ColorScale, Colormap},
    compose::{
        compositor::{ComposeStyle, FrameCompositor, FrameScene, MovieScales, arrow_stride},
        plan::FramePlan,
    },
    data::{
        load::{DEFAULT_VECTOR_FIELD, extract_vector_field, find_event_set},
        model::{ImageSequence, Recording, VectorField},
    },
    encode::sink::{FrameSink, ImageSequenceSink, SinkConfig},
    events::binner::{FrameBuckets, bin_events},
    foundation::{
        core::{FrameIndex, Rgba8},
        error::{ReelError, ReelResult},
    },
    render::{
        backend::{FrameRGBA, RenderBackend, RenderSettings},
        cpu::CpuBackend,
        text::FontBook,
    },
    timeline::resample::{FrameTimeline, resample},
};

/// Where frame files go: `{folder}/{name}_{index:05}.{format}`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub folder: PathBuf,
    pub name: String,
    pub format: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            folder: PathBuf::from("frames"),
            name: "frame".to_string(),
            format: "png".to_string(),
        }
    }
}

/// Everything that controls how a recording becomes a movie.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MovieConfig {
    /// Output frame rate in Hz; `None` keeps every source frame.
    pub frame_rate: Option<f64>,
    pub colormap: Colormap,
    /// Event set drawn as markers; `None` disables markers.
    pub event: Option<String>,
    pub marker_color: Rgba8,
    /// Vector field drawn as arrows when present in the recording.
    pub vector_field: String,
    pub style: ComposeStyle,
    pub output: OutputConfig,
    pub threading: RenderThreading,
}

impl Default for MovieConfig {
    fn default() -> Self {
        Self {
            frame_rate: None,
            colormap: Colormap::GRAY,
            event: None,
            marker_color: Rgba8::BLACK,
            vector_field: DEFAULT_VECTOR_FIELD.to_string(),
            style: ComposeStyle::default(),
            output: OutputConfig::default(),
            threading: RenderThreading::default(),
        }
    }
}

impl MovieConfig {
    pub fn from_json_file(path: &Path) -> ReelResult<Self> {
        use anyhow::Context as _;

        let bytes = std::fs::read(path)
            .with_context(|| format!("read movie config '{}'", path.display()))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| ReelError::serde(format!("parse movie config '{}': {e}", path.display())))
    }
}

#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RenderThreading {
    pub parallel: bool,
    pub chunk_size: usize,
    pub threads: Option<usize>,
}

impl Default for RenderThreading {
    fn default() -> Self {
        Self {
            parallel: false,
            chunk_size: 64,
            threads: None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub frames_total: u64,
    pub frames_rendered: u64,
    /// Events that fell into the window of a rendered frame.
    pub events_shown: u64,
}

/// Read-only state shared by every frame of one movie.
///
/// Building it performs all validation, so rendering can only fail on I/O or rasterization.
#[derive(Debug)]
pub struct PreparedMovie<'a> {
    recording: &'a Recording,
    base: &'a ImageSequence,
    field: Option<&'a VectorField>,
    timeline: FrameTimeline,
    buckets: FrameBuckets,
    markers: bool,
    compositor: FrameCompositor,
}

impl<'a> PreparedMovie<'a> {
    #[tracing::instrument(skip_all, fields(frame_rate = ?config.frame_rate, event = ?config.event))]
    pub fn prepare(recording: &'a Recording, config: &MovieConfig) -> ReelResult<Self> {
        recording.validate()?;
        let base = recording.base_sequence()?;
        let color_scale = ColorScale::from_samples(&base.data)?;

        let timeline = resample(
            recording.t_start_s(),
            recording.t_stop_s(),
            base.dim_t(),
            config.frame_rate,
        )?;

        let field = extract_vector_field(&recording.vector_fields, &config.vector_field);
        if let Some(field) = field {
            field.validate_against(base)?;
        }

        // Buckets are per source frame; duplicated frames after upsampling share one.
        let (buckets, markers) = match config.event.as_deref() {
            Some(kind) => {
                if let Some(set) = find_event_set(&recording.events, kind) {
                    set.validate()?;
                }
                match bin_events(&recording.events, &recording.times, kind) {
                    Some(buckets) => (buckets, true),
                    None => (FrameBuckets::empty(base.dim_t()), false),
                }
            }
            None => (FrameBuckets::empty(base.dim_t()), false),
        };

        let stride = arrow_stride(base.dim_x(), base.dim_y());
        let arrow_cells_per_unit = field
            .map(|f| config.style.arrow_scale.resolve(f.max_magnitude(), stride))
            .unwrap_or(0.0);

        let scales = MovieScales {
            colormap: config.colormap,
            color_scale,
            spatial_scale_mm: recording.spatial_scale_mm(),
            marker_color: config.marker_color,
            arrow_cells_per_unit,
        };
        let compositor =
            FrameCompositor::new(base.dim_x(), base.dim_y(), scales, config.style.clone())?;

        tracing::info!(
            source_frames = base.dim_t(),
            frames = timeline.len(),
            arrows = field.is_some(),
            markers,
            vmin = color_scale.min,
            vmax = color_scale.max,
            "prepared movie"
        );

        Ok(Self {
            recording,
            base,
            field,
            timeline,
            buckets,
            markers,
            compositor,
        })
    }

    /// Number of output frames.
    pub fn len(&self) -> usize {
        self.timeline.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timeline.is_empty()
    }

    pub fn timeline(&self) -> &FrameTimeline {
        &self.timeline
    }

    /// Event buckets indexed by source frame.
    pub fn buckets(&self) -> &FrameBuckets {
        &self.buckets
    }

    pub fn compositor(&self) -> &FrameCompositor {
        &self.compositor
    }

    pub fn has_arrows(&self) -> bool {
        self.field.is_some()
    }

    pub fn has_markers(&self) -> bool {
        self.markers
    }

    pub fn compose_frame(&self, position: usize) -> ReelResult<FramePlan> {
        let src = self.timeline.source_index(position).ok_or_else(|| {
            ReelError::validation(format!(
                "frame position {position} is outside the {}-frame timeline",
                self.timeline.len()
            ))
        })?;

        let raster = self.base.frame(src)?;
        let field = self.field.map(|f| f.frame(src)).transpose()?;
        let events = self.markers.then(|| self.buckets.get(src));
        let time_s = self
            .recording
            .time_unit
            .to_seconds(self.recording.times[src]);

        self.compositor.compose(&FrameScene {
            raster,
            field,
            events,
            time_s,
        })
    }

    fn events_at(&self, position: usize) -> u64 {
        match self.timeline.source_index(position) {
            Some(src) if self.markers => self.buckets.get(src).len() as u64,
            _ => 0,
        }
    }
}

/// Render every timeline position in order into `sink`.
#[tracing::instrument(skip_all, fields(frames = prepared.len(), parallel = threading.parallel))]
pub fn render_movie(
    prepared: &PreparedMovie<'_>,
    backend: &mut dyn RenderBackend,
    sink: &mut dyn FrameSink,
    threading: &RenderThreading,
) -> ReelResult<RenderStats> {
    let canvas = prepared.compositor.layout().canvas;
    sink.begin(SinkConfig {
        width: canvas.width,
        height: canvas.height,
        frame_count: prepared.len() as u64,
    })?;

    let mut stats = RenderStats::default();
    let total = prepared.len();

    if !threading.parallel {
        for position in 0..total {
            let plan = prepared.compose_frame(position)?;
            let frame = backend.render_plan(&plan)?;
            push(sink, prepared, position, &frame, &mut stats)?;
        }
    } else {
        let mut worker_settings = backend.worker_render_settings().ok_or_else(|| {
            ReelError::render("parallel render requires backend worker settings support")
        })?;
        if worker_settings.fonts.is_none() {
            worker_settings.fonts = Some(FontBook::load(&worker_settings.font_dirs));
        }
        let pool = build_thread_pool(threading.threads)?;
        let chunk_size = threading.chunk_size.max(1);

        let mut chunk_start = 0;
        while chunk_start < total {
            let chunk_end = (chunk_start + chunk_size).min(total);
            let frames =
                render_chunk_parallel_cpu(prepared, chunk_start..chunk_end, &worker_settings, &pool);
            for (offset, frame) in frames.into_iter().enumerate() {
                push(sink, prepared, chunk_start + offset, &frame?, &mut stats)?;
            }
            chunk_start = chunk_end;
        }
    }

    sink.end()?;
    tracing::info!(
        frames = stats.frames_rendered,
        events = stats.events_shown,
        "rendered movie"
    );
    Ok(stats)
}

fn push(
    sink: &mut dyn FrameSink,
    prepared: &PreparedMovie<'_>,
    position: usize,
    frame: &FrameRGBA,
    stats: &mut RenderStats,
) -> ReelResult<()> {
    sink.push_frame(FrameIndex(position as u64), frame)?;
    stats.frames_total += 1;
    stats.frames_rendered += 1;
    stats.events_shown += prepared.events_at(position);
    tracing::debug!(position, "frame done");
    Ok(())
}

fn render_chunk_parallel_cpu(
    prepared: &PreparedMovie<'_>,
    positions: std::ops::Range<usize>,
    settings: &RenderSettings,
    pool: &rayon::ThreadPool,
) -> Vec<ReelResult<FrameRGBA>> {
    pool.install(|| {
        positions
            .into_par_iter()
            .map_init(
                || CpuBackend::new(settings.clone()),
                |worker_backend, position| -> ReelResult<FrameRGBA> {
                    let plan = prepared.compose_frame(position)?;
                    worker_backend.render_plan(&plan)
                },
            )
            .collect()
    })
}

fn build_thread_pool(threads: Option<usize>) -> ReelResult<rayon::ThreadPool> {
    if let Some(n) = threads
        && n == 0
    {
        return Err(ReelError::validation(
            "render threading 'threads' must be >= 1 when set",
        ));
    }

    let mut builder = rayon::ThreadPoolBuilder::new();
    if let Some(n) = threads {
        builder = builder.num_threads(n);
    }
    builder
        .build()
        .map_err(|e| ReelError::render(format!("failed to build rayon thread pool: {e}")))
}

/// Prepare, render and write every frame of `recording` as configured.
pub fn render_to_folder(
    recording: &Recording,
    config: &MovieConfig,
    settings: &RenderSettings,
) -> ReelResult<(RenderStats, Vec<PathBuf>)> {
    let prepared = PreparedMovie::prepare(recording, config)?;
    let mut sink = ImageSequenceSink::new(
        &config.output.folder,
        config.output.name.clone(),
        &config.output.format,
    )?;
    let mut backend = crate::render::backend::create_backend(
        crate::render::backend::BackendKind::Cpu,
        settings,
    )?;
    let stats = render_movie(&prepared, backend.as_mut(), &mut sink, &config.threading)?;
    Ok((stats, sink.written().to_vec()))
}
