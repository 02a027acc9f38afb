use std::path::PathBuf;

use wavereel::{
    Complex64, ComposeStyle, CpuBackend, DrawOp, EventSet, FrameIndex, FramePlan, InMemorySink,
    MovieConfig, OutputConfig, PreparedMovie, Recording, ReelError, RenderSettings,
    RenderThreading, Rgba8, VectorField, parse_recording, render_movie, render_to_folder,
};

const FOUR_FRAMES: &str = r#"{
    "t_start": 0.0,
    "t_stop": 4.0,
    "time_unit": "s",
    "spatial_scale": 0.05,
    "spatial_unit": "mm",
    "times": [0.0, 1.0, 2.0, 3.0],
    "image_sequences": [{
        "name": "signal",
        "shape": [4, 2, 2],
        "data": [0, 1, 2, 3,  1, 2, 3, 4,  2, 3, 4, null,  3, 4, 5, 6]
    }],
    "vector_fields": [{
        "name": "optical_flow",
        "shape": [4, 2, 2],
        "data": [[1,0],[0,1],[1,1],[0,0], [1,0],[0,1],[1,1],[0,0],
                 [1,0],[0,1],[1,1],[0,0], [1,0],[0,1],[1,1],[0,0]]
    }],
    "events": [{
        "name": "transitions",
        "times": [1.5, 0.5],
        "x_coords": [1, 0],
        "y_coords": [1, 0]
    }]
}"#;

const MARKER: Rgba8 = Rgba8::opaque(255, 0, 0);

fn four_frames() -> Recording {
    parse_recording(FOUR_FRAMES.as_bytes()).unwrap()
}

fn small_config() -> MovieConfig {
    MovieConfig {
        marker_color: MARKER,
        style: ComposeStyle {
            plot_size_px: 64,
            ..ComposeStyle::default()
        },
        ..MovieConfig::default()
    }
}

fn marker_count(plan: &FramePlan) -> usize {
    let translucent = Rgba8 { a: 153, ..MARKER };
    plan.ops
        .iter()
        .filter(|op| matches!(op, DrawOp::FillPath { color, .. } if *color == translucent))
        .count()
}

fn out_dir(tag: &str) -> PathBuf {
    let dir = PathBuf::from("target").join("pipeline_scenarios").join(tag);
    let _ = std::fs::remove_dir_all(&dir);
    dir
}

#[test]
fn four_frame_scenario_buckets_events_per_window() {
    let rec = four_frames();
    let cfg = MovieConfig {
        event: Some("transitions".to_string()),
        ..small_config()
    };
    let movie = PreparedMovie::prepare(&rec, &cfg).unwrap();

    assert_eq!(movie.timeline().indices(), &[0, 1, 2, 3]);
    let buckets: Vec<Vec<(i64, i64)>> = movie.buckets().iter().map(<[_]>::to_vec).collect();
    assert_eq!(buckets, vec![vec![], vec![(0, 0)], vec![(1, 1)], vec![]]);

    assert_eq!(markers_per_position(&movie), vec![0, 1, 1, 0]);
}

fn markers_per_position(movie: &PreparedMovie<'_>) -> Vec<usize> {
    (0..movie.len())
        .map(|p| marker_count(&movie.compose_frame(p).unwrap()))
        .collect()
}

#[test]
fn upsampled_duplicates_share_their_source_bucket() {
    let rec = four_frames();
    let cfg = MovieConfig {
        // 4 s at 2 Hz -> 8 frames, each source frame twice.
        frame_rate: Some(2.0),
        event: Some("transitions".to_string()),
        ..small_config()
    };
    let movie = PreparedMovie::prepare(&rec, &cfg).unwrap();
    assert_eq!(movie.timeline().indices(), &[0, 0, 1, 1, 2, 2, 3, 3]);
    assert_eq!(movie.buckets().len(), 4);

    for pair in movie.timeline().indices().chunks(2) {
        assert_eq!(pair[0], pair[1]);
    }
    let plans: Vec<FramePlan> = (0..movie.len())
        .map(|p| movie.compose_frame(p).unwrap())
        .collect();
    for pair in plans.chunks(2) {
        assert_eq!(marker_count(&pair[0]), marker_count(&pair[1]));
    }
    assert_eq!(markers_per_position(&movie), vec![0, 0, 1, 1, 1, 1, 0, 0]);

    let mut backend = CpuBackend::new(RenderSettings::default());
    let mut sink = InMemorySink::new();
    let stats = render_movie(&movie, &mut backend, &mut sink, &RenderThreading::default()).unwrap();
    assert_eq!(stats.frames_rendered, 8);
    assert_eq!(stats.events_shown, 4);
}

#[test]
fn downsampled_frames_show_only_their_source_bucket() {
    let rec = four_frames();
    let cfg = MovieConfig {
        // 4 s at 0.75 Hz -> source frames 0, 2, 3.
        frame_rate: Some(0.75),
        event: Some("transitions".to_string()),
        ..small_config()
    };
    let movie = PreparedMovie::prepare(&rec, &cfg).unwrap();
    assert_eq!(movie.timeline().indices(), &[0, 2, 3]);

    // Source frame 1 is skipped, so its event is not carried onto frame 2.
    assert_eq!(movie.buckets().get(2), &[(1, 1)]);
    assert_eq!(markers_per_position(&movie), vec![0, 1, 0]);

    // Every event still belongs to exactly one source frame.
    assert_eq!(movie.buckets().total_events(), 2);
}

#[test]
fn unused_overlays_do_not_fail_preparation() {
    let mut rec = four_frames();
    rec.vector_fields.push(
        VectorField::new("phase_gradient", [1, 3, 3], vec![Complex64::new(0.0, 1.0); 9]).unwrap(),
    );
    rec.events.push(EventSet {
        name: "ragged".to_string(),
        times: vec![0.5, 1.5],
        x_coords: vec![0],
        y_coords: vec![0, 1],
    });

    let cfg = MovieConfig {
        event: Some("transitions".to_string()),
        ..small_config()
    };
    let movie = PreparedMovie::prepare(&rec, &cfg).unwrap();
    assert!(movie.has_arrows());
    assert!(movie.has_markers());

    let wrong_field = MovieConfig {
        vector_field: "phase_gradient".to_string(),
        ..small_config()
    };
    let err = PreparedMovie::prepare(&rec, &wrong_field).unwrap_err();
    assert!(matches!(err, ReelError::Data(_)));

    let ragged = MovieConfig {
        event: Some("ragged".to_string()),
        ..small_config()
    };
    let err = PreparedMovie::prepare(&rec, &ragged).unwrap_err();
    assert!(matches!(err, ReelError::Data(_)));
}

#[test]
fn missing_event_kind_still_renders_every_frame() {
    let rec = four_frames();
    let cfg = MovieConfig {
        event: Some("waves".to_string()),
        ..small_config()
    };
    let movie = PreparedMovie::prepare(&rec, &cfg).unwrap();
    assert!(!movie.has_markers());
    assert!(movie.buckets().iter().all(<[_]>::is_empty));

    let mut backend = CpuBackend::new(RenderSettings::default());
    let mut sink = InMemorySink::new();
    let stats = render_movie(&movie, &mut backend, &mut sink, &RenderThreading::default()).unwrap();
    assert_eq!(stats.frames_rendered, 4);
    assert_eq!(stats.events_shown, 0);
    assert!(sink.is_finished());
}

#[test]
fn global_color_scale_ignores_frame_order() {
    let rec = four_frames();
    let movie = PreparedMovie::prepare(&rec, &small_config()).unwrap();
    let scale = movie.compositor().scales().color_scale;
    assert_eq!((scale.min, scale.max), (0.0, 6.0));

    let mut reversed = rec.clone();
    let seq = &mut reversed.image_sequences[0];
    let frame_len = seq.dim_x() * seq.dim_y();
    let frames: Vec<Vec<f64>> = seq.data.chunks(frame_len).rev().map(<[_]>::to_vec).collect();
    seq.data = frames.concat();
    let movie = PreparedMovie::prepare(&reversed, &small_config()).unwrap();
    assert_eq!(movie.compositor().scales().color_scale, scale);
}

#[test]
fn resampled_movie_writes_named_frames() {
    let rec = four_frames();
    let dir = out_dir("naming");
    let cfg = MovieConfig {
        // 4 s at 0.75 Hz -> 3 frames.
        frame_rate: Some(0.75),
        output: OutputConfig {
            folder: dir.clone(),
            name: "wave".to_string(),
            format: "png".to_string(),
        },
        ..small_config()
    };

    let (stats, written) = render_to_folder(&rec, &cfg, &RenderSettings::default()).unwrap();
    assert_eq!(stats.frames_rendered, 3);
    let names: Vec<String> = written
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(
        names,
        vec!["wave_00000.png", "wave_00001.png", "wave_00002.png"]
    );
    for path in &written {
        assert!(path.is_file(), "{}", path.display());
    }

    let first = image::open(&written[0]).unwrap();
    assert!(first.width() > 64 && first.height() > 64);
}

#[test]
fn parallel_render_matches_sequential() {
    let rec = four_frames();
    let cfg = MovieConfig {
        event: Some("transitions".to_string()),
        ..small_config()
    };
    let movie = PreparedMovie::prepare(&rec, &cfg).unwrap();

    let mut seq_sink = InMemorySink::new();
    let mut backend = CpuBackend::new(RenderSettings::default());
    render_movie(&movie, &mut backend, &mut seq_sink, &RenderThreading::default()).unwrap();

    let mut par_sink = InMemorySink::new();
    let threading = RenderThreading {
        parallel: true,
        chunk_size: 3,
        threads: Some(2),
    };
    let stats = render_movie(&movie, &mut backend, &mut par_sink, &threading).unwrap();
    assert_eq!(stats.frames_rendered, 4);
    assert_eq!(stats.events_shown, 2);

    let seq_idx: Vec<FrameIndex> = seq_sink.frames().iter().map(|(i, _)| *i).collect();
    let par_idx: Vec<FrameIndex> = par_sink.frames().iter().map(|(i, _)| *i).collect();
    assert_eq!(seq_idx, par_idx);
    for ((_, a), (_, b)) in seq_sink.frames().iter().zip(par_sink.frames()) {
        assert_eq!(a.data, b.data);
    }
}

#[test]
fn unsupported_output_format_fails_before_rendering() {
    let rec = four_frames();
    let dir = out_dir("bad_format");
    let cfg = MovieConfig {
        output: OutputConfig {
            folder: dir.clone(),
            name: "wave".to_string(),
            format: "mp4".to_string(),
        },
        ..small_config()
    };
    let err = render_to_folder(&rec, &cfg, &RenderSettings::default()).unwrap_err();
    assert!(matches!(err, ReelError::Validation(_)));
    assert!(!dir.exists());
}
