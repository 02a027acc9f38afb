use wavereel::{
    BackendKind, ComposeStyle, FrameRGBA, MovieConfig, PreparedMovie, RenderSettings, Rgba8,
    create_backend, labels_svg, parse_recording,
};

const GRID: &str = r#"{
    "t_start": 0.0,
    "t_stop": 2.0,
    "spatial_scale": 0.5,
    "times": [0.0, 1.0],
    "image_sequences": [{
        "name": "signal",
        "shape": [2, 2, 2],
        "data": [0, 1, 2, 3,  4, 5, 6, null]
    }]
}"#;

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

fn digest_u64(bytes: &[u8]) -> u64 {
    let mut state = 0x9E37_79B9_7F4A_7C15u64;
    for chunk in bytes.chunks(8) {
        let mut v = 0u64;
        for (i, &b) in chunk.iter().enumerate() {
            v |= (b as u64) << (i * 8);
        }
        state = mix64(state ^ v);
    }
    state
}

fn config() -> MovieConfig {
    MovieConfig {
        vector_field: "absent".to_string(),
        style: ComposeStyle {
            plot_size_px: 64,
            ..ComposeStyle::default()
        },
        ..MovieConfig::default()
    }
}

fn assert_close(got: [u8; 4], want: [u8; 4]) {
    let ok = got.iter().zip(want).all(|(a, b)| a.abs_diff(b) <= 2);
    assert!(ok, "got {got:?}, want {want:?}");
}

fn pixel_at_cell(movie: &PreparedMovie<'_>, frame: &FrameRGBA, x: usize, y: usize) -> [u8; 4] {
    let c = movie.compositor().layout().cell_center(x, y);
    frame.pixel(c.x as u32, c.y as u32).unwrap()
}

#[test]
fn cpu_render_is_deterministic() {
    let rec = parse_recording(GRID.as_bytes()).unwrap();
    let movie = PreparedMovie::prepare(&rec, &config()).unwrap();
    let plan = movie.compose_frame(0).unwrap();

    let mut a = create_backend(BackendKind::Cpu, &RenderSettings::default()).unwrap();
    let mut b = create_backend(BackendKind::Cpu, &RenderSettings::default()).unwrap();
    let fa = a.render_plan(&plan).unwrap();
    let fb = b.render_plan(&plan).unwrap();

    assert!(fa.premultiplied);
    assert_eq!(fa.data.len(), (fa.width * fa.height * 4) as usize);
    assert_eq!(digest_u64(&fa.data), digest_u64(&fb.data));
}

#[test]
fn raster_rows_grow_upwards_on_a_shared_scale() {
    let rec = parse_recording(GRID.as_bytes()).unwrap();
    let movie = PreparedMovie::prepare(&rec, &config()).unwrap();
    let mut backend = create_backend(BackendKind::Cpu, &RenderSettings::default()).unwrap();

    let f0 = backend.render_plan(&movie.compose_frame(0).unwrap()).unwrap();
    // Global scale is [0, 6]: sample 0 is black, sample 3 is mid gray.
    assert_close(pixel_at_cell(&movie, &f0, 0, 0), [0, 0, 0, 255]);
    assert_close(pixel_at_cell(&movie, &f0, 1, 1), [128, 128, 128, 255]);

    let c00 = movie.compositor().layout().cell_center(0, 0);
    let c10 = movie.compositor().layout().cell_center(1, 0);
    assert!(c10.y < c00.y, "row 1 must be drawn above row 0");

    let f1 = backend.render_plan(&movie.compose_frame(1).unwrap()).unwrap();
    assert_close(pixel_at_cell(&movie, &f1, 1, 0), [255, 255, 255, 255]);
    // NaN sample shows the background.
    let bg = Rgba8::WHITE;
    assert_close(pixel_at_cell(&movie, &f1, 1, 1), [bg.r, bg.g, bg.b, bg.a]);
}

fn count_text_nodes(group: &usvg::Group) -> usize {
    let mut n = 0usize;
    for child in group.children() {
        match child {
            usvg::Node::Group(g) => n += count_text_nodes(g.as_ref()),
            usvg::Node::Text(_) => n += 1,
            usvg::Node::Path(_) | usvg::Node::Image(_) => {}
        }
    }
    n
}

#[test]
fn frame_labels_form_a_valid_svg() {
    let rec = parse_recording(GRID.as_bytes()).unwrap();
    let movie = PreparedMovie::prepare(&rec, &config()).unwrap();
    let plan = movie.compose_frame(1).unwrap();

    let texts: Vec<&str> = plan.text_labels().map(|l| l.text.as_str()).collect();
    assert!(texts.contains(&"pixel size: 0.50 mm"));
    assert!(texts.contains(&"1.000 s"));

    let svg = labels_svg(plan.canvas, plan.text_labels());
    let opts = usvg::Options::default();
    let tree = usvg::Tree::from_str(&svg, &opts).unwrap();
    assert_eq!(tree.size().width(), plan.canvas.width as f32);
    // Text nodes survive parsing only when a font is found; never more than the labels.
    assert!(count_text_nodes(tree.root()) <= texts.len());
}
