use std::path::PathBuf;

use anyhow::Context as _;
use clap::Parser;

/// Render movie frames from an imaging recording.
#[derive(Parser, Debug)]
#[command(name = "wavereel", version)]
struct Cli {
    /// Input recording JSON.
    #[arg(long)]
    data: PathBuf,

    /// Folder the frame images are written to.
    #[arg(long, alias = "frame_folder")]
    frame_folder: Option<PathBuf>,

    /// File name stem; frames are `{name}_{index:05}.{format}`.
    #[arg(long, alias = "frame_name")]
    frame_name: Option<String>,

    /// Image format / file extension (png, jpg, bmp, tif, ...).
    #[arg(long, alias = "frame_format")]
    frame_format: Option<String>,

    /// Output frame rate in Hz, or `None` to keep every recorded frame.
    #[arg(long, alias = "frame_rate")]
    frame_rate: Option<String>,

    /// Colormap name, optionally reversed with `_r` (e.g. `viridis_r`).
    #[arg(long)]
    colormap: Option<String>,

    /// Event set drawn as markers, or `None`.
    #[arg(long)]
    event: Option<String>,

    /// Marker color (`k`, `r`, `white`, `#ff8800`, ...).
    #[arg(long)]
    markercolor: Option<String>,

    /// Vector field drawn as arrows when present.
    #[arg(long, alias = "vector_field")]
    vector_field: Option<String>,

    /// JSON movie config used as the base for every other flag.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Enable frame-level parallelism.
    #[arg(long, default_value_t = false)]
    parallel: bool,

    /// Override rayon worker threads (parallel mode only).
    #[arg(long)]
    threads: Option<usize>,

    /// Render chunk size (parallel mode only).
    #[arg(long, alias = "chunk_size")]
    chunk_size: Option<usize>,

    /// Extra directory with `.ttf`/`.otf` fonts for labels. Repeatable.
    #[arg(long = "font-dir", alias = "font_dir")]
    font_dirs: Vec<PathBuf>,
}

fn none_or<T>(raw: &str, parse: impl FnOnce(&str) -> anyhow::Result<T>) -> anyhow::Result<Option<T>> {
    if raw.trim() == "None" {
        Ok(None)
    } else {
        parse(raw).map(Some)
    }
}

fn movie_config(cli: &Cli) -> anyhow::Result<wavereel::MovieConfig> {
    let mut cfg = match &cli.config {
        Some(path) => wavereel::MovieConfig::from_json_file(path)?,
        None => wavereel::MovieConfig::default(),
    };

    if let Some(folder) = &cli.frame_folder {
        cfg.output.folder = folder.clone();
    }
    if let Some(name) = &cli.frame_name {
        cfg.output.name = name.clone();
    }
    if let Some(format) = &cli.frame_format {
        cfg.output.format = format.clone();
    }
    if let Some(raw) = &cli.frame_rate {
        cfg.frame_rate = none_or(raw, |s| {
            s.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid --frame-rate '{s}'"))
        })?;
    }
    if let Some(name) = &cli.colormap {
        cfg.colormap = name.parse()?;
    }
    if let Some(raw) = &cli.event {
        cfg.event = none_or(raw, |s| Ok(s.to_string()))?;
    }
    if let Some(color) = &cli.markercolor {
        cfg.marker_color = color.parse()?;
    }
    if let Some(name) = &cli.vector_field {
        cfg.vector_field = name.clone();
    }
    if cli.parallel {
        cfg.threading.parallel = true;
    }
    if let Some(n) = cli.threads {
        cfg.threading.threads = Some(n);
    }
    if let Some(n) = cli.chunk_size {
        cfg.threading.chunk_size = n;
    }
    Ok(cfg)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cfg = movie_config(&cli)?;
    let recording = wavereel::load_recording(&cli.data)?;
    let settings = wavereel::RenderSettings {
        font_dirs: cli.font_dirs.clone(),
        fonts: None,
    };

    let (stats, written) = wavereel::render_to_folder(&recording, &cfg, &settings)
        .with_context(|| format!("render frames from '{}'", cli.data.display()))?;

    eprintln!(
        "wrote {} frames to {}",
        stats.frames_rendered,
        cfg.output.folder.display()
    );
    if let Some(last) = written.last() {
        tracing::debug!(last = %last.display(), "last frame");
    }
    Ok(())
}
