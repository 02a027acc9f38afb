//! Wavereel renders the frames of a movie from a neural-imaging recording.
//!
//! A recording holds an image sequence (one raster per timestamp), optional derived vector fields
//! (optical flow) and optional timestamped events on the same grid. Wavereel turns it into one
//! still image per output frame: the color-mapped raster, flow arrows on a sub-sampled grid, and
//! diamond markers for the events that happened since the previous frame.
//!
//! # Pipeline overview
//!
//! 1. **Load**: JSON → [`Recording`] (validated)
//! 2. **Prepare**: `Recording + MovieConfig -> PreparedMovie` (global color scale, resampled
//!    [`FrameTimeline`], per-source-frame event [`FrameBuckets`], arrow scale)
//! 3. **Compose**: `PreparedMovie + position -> FramePlan` (backend-agnostic draw ops)
//! 4. **Render**: `FramePlan -> FrameRGBA` ([`CpuBackend`])
//! 5. **Write**: [`FrameSink`] (`{folder}/{name}_{index:05}.{format}` through [`ImageSequenceSink`])
//!
//! Everything movie-wide is computed once in [`PreparedMovie::prepare`]; frames are independent
//! afterwards and can be rendered in parallel ([`RenderThreading`]).
#![forbid(unsafe_code)]

mod color;
mod compose;
mod data;
mod encode;
mod events;
mod foundation;
mod pipeline;
mod render;
mod timeline;

pub use color::colormap::{ColorScale, Colormap, Palette};
pub use compose::compositor::{
    ArrowScale, ComposeStyle, FrameCompositor, FrameScene, MAX_CANVAS_SIDE, MovieScales,
    PlotLayout, arrow_stride, format_tick, marker_size_pt,
};
pub use compose::plan::{DrawOp, FramePlan, RasterImage, TextAnchor, TextLabel};
pub use data::load::{
    DEFAULT_VECTOR_FIELD, extract_vector_field, find_event_set, load_recording, parse_recording,
};
pub use data::model::{
    EventSet, FieldSlice, ImageSequence, LengthUnit, Raster, Recording, TimeUnit, VectorField,
};
pub use encode::sink::{FrameSink, ImageSequenceSink, InMemorySink, SinkConfig, frame_file_name};
pub use events::binner::{FrameBuckets, TimedEvent, bin_events, bin_sorted, sorted_events};
pub use foundation::core::{Affine, BezPath, Canvas, FrameIndex, Point, Rect, Rgba8, Vec2};
pub use foundation::error::{ReelError, ReelResult};
pub use pipeline::driver::{
    MovieConfig, OutputConfig, PreparedMovie, RenderStats, RenderThreading, render_movie,
    render_to_folder,
};
pub use render::backend::{BackendKind, FrameRGBA, RenderBackend, RenderSettings, create_backend};
pub use render::cpu::CpuBackend;
pub use render::text::{FontBook, labels_svg, rasterize_labels};
pub use timeline::resample::{FrameTimeline, MAX_OUTPUT_FRAMES, resample};

pub use num_complex::Complex64;
