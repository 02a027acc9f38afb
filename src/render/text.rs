use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    compose::plan::{RasterImage, TextLabel},
    foundation::{
        core::Canvas,
        error::{ReelError, ReelResult},
    },
};

/// Shared font database used to shape axis labels.
#[derive(Clone)]
pub struct FontBook(Arc<usvg::fontdb::Database>);

impl FontBook {
    /// System fonts plus every `.ttf`/`.otf`/`.ttc` file directly inside `extra_dirs`.
    pub fn load(extra_dirs: &[PathBuf]) -> Self {
        let mut db = usvg::fontdb::Database::new();
        db.load_system_fonts();
        for dir in extra_dirs {
            load_fonts_from_dir(&mut db, dir);
        }
        tracing::debug!(faces = db.len(), "loaded label fonts");
        Self(Arc::new(db))
    }

    /// No fonts at all; labels are skipped silently.
    pub fn empty() -> Self {
        Self(Arc::new(usvg::fontdb::Database::new()))
    }

    pub fn face_count(&self) -> usize {
        self.0.len()
    }
}

impl fmt::Debug for FontBook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FontBook")
            .field("faces", &self.face_count())
            .finish()
    }
}

fn load_fonts_from_dir(db: &mut usvg::fontdb::Database, dir: &Path) {
    let Ok(rd) = std::fs::read_dir(dir) else {
        tracing::warn!(dir = %dir.display(), "font directory is not readable");
        return;
    };

    for entry in rd.flatten() {
        let path = entry.path();
        let Some(ext) = path.extension().and_then(|s| s.to_str()) else {
            continue;
        };
        let ext = ext.to_ascii_lowercase();
        if path.is_file() && matches!(ext.as_str(), "ttf" | "otf" | "ttc") {
            if let Err(e) = db.load_font_file(&path) {
                tracing::warn!(path = %path.display(), error = %e, "failed to load font file");
            }
        }
    }
}

/// Lay all labels out as one SVG document the size of the canvas.
pub fn labels_svg<'a>(canvas: Canvas, labels: impl IntoIterator<Item = &'a TextLabel>) -> String {
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
        w = canvas.width,
        h = canvas.height
    );
    for label in labels {
        let (x, y) = (label.position.x, label.position.y);
        let c = label.color;
        svg.push_str(&format!(
            r##"<text x="{x}" y="{y}" font-family="sans-serif" font-size="{size}" fill="#{r:02x}{g:02x}{b:02x}" fill-opacity="{a}" text-anchor="{anchor}""##,
            size = label.size_px,
            r = c.r,
            g = c.g,
            b = c.b,
            a = f64::from(c.a) / 255.0,
            anchor = label.anchor.as_svg(),
        ));
        if label.rotation_deg != 0.0 {
            svg.push_str(&format!(
                r#" transform="rotate({} {x} {y})""#,
                -label.rotation_deg
            ));
        }
        svg.push('>');
        push_escaped(&mut svg, &label.text);
        svg.push_str("</text>");
    }
    svg.push_str("</svg>");
    svg
}

fn push_escaped(out: &mut String, text: &str) {
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
}

/// Rasterize labels into a canvas-sized premultiplied layer.
pub fn rasterize_labels<'a>(
    canvas: Canvas,
    labels: impl IntoIterator<Item = &'a TextLabel>,
    fonts: &FontBook,
) -> ReelResult<RasterImage> {
    let svg = labels_svg(canvas, labels);
    let opts = usvg::Options {
        fontdb: Arc::clone(&fonts.0),
        font_resolver: make_font_resolver(),
        ..Default::default()
    };
    let tree = usvg::Tree::from_str(&svg, &opts)
        .map_err(|e| ReelError::render(format!("parse label svg: {e}")))?;

    let mut pixmap = resvg::tiny_skia::Pixmap::new(canvas.width, canvas.height)
        .ok_or_else(|| ReelError::render("failed to allocate label pixmap"))?;
    resvg::render(
        &tree,
        resvg::tiny_skia::Transform::default(),
        &mut pixmap.as_mut(),
    );

    Ok(RasterImage {
        width: canvas.width,
        height: canvas.height,
        rgba8_premul: pixmap.data().to_vec(),
    })
}

/// Generic families first, then any face at all, so labels render on minimal systems.
fn make_font_resolver() -> usvg::FontResolver<'static> {
    use usvg::FontResolver;

    FontResolver {
        select_font: Box::new(|font, fontdb| {
            let mut families = Vec::<usvg::fontdb::Family<'_>>::new();
            for family in font.families() {
                families.push(match family {
                    usvg::FontFamily::Serif => usvg::fontdb::Family::Serif,
                    usvg::FontFamily::SansSerif => usvg::fontdb::Family::SansSerif,
                    usvg::FontFamily::Cursive => usvg::fontdb::Family::Cursive,
                    usvg::FontFamily::Fantasy => usvg::fontdb::Family::Fantasy,
                    usvg::FontFamily::Monospace => usvg::fontdb::Family::Monospace,
                    usvg::FontFamily::Named(s) => usvg::fontdb::Family::Name(s),
                });
            }
            families.push(usvg::fontdb::Family::SansSerif);
            families.push(usvg::fontdb::Family::Serif);

            let query = usvg::fontdb::Query {
                families: &families,
                weight: usvg::fontdb::Weight(font.weight()),
                stretch: usvg::fontdb::Stretch::Normal,
                style: usvg::fontdb::Style::Normal,
            };

            if let Some(id) = fontdb.query(&query) {
                return Some(id);
            }
            fontdb.faces().next().map(|f| f.id)
        }),
        select_fallback: FontResolver::default_fallback_selector(),
    }
}
