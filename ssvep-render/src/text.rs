//! Glyph rasterization for the on-screen overlays.

use ab_glyph::{Font, FontVec, Glyph, PxScale, ScaleFont, point};
use ssvep_core::{DisplayError, Result};
use std::path::Path;
use tiny_skia::{Color, Pixmap, PixmapPaint, PremultipliedColorU8, Transform};
use tracing::{info, warn};

const FALLBACK_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu-sans-fonts/DejaVuSans.ttf",
    "/Library/Fonts/DejaVuSans.ttf",
    "C:\\Windows\\Fonts\\DejaVuSans.ttf",
];

pub fn load_font_from(path: &Path) -> Result<FontVec> {
    let bytes = std::fs::read(path).map_err(|e| {
        DisplayError::RenderResource(format!("cannot read font {}: {e}", path.display()))
    })?;
    FontVec::try_from_vec(bytes).map_err(|e| {
        DisplayError::RenderResource(format!("invalid font {}: {e}", path.display()))
    })
}

/// Loads `preferred`, then the usual DejaVu locations. `None` means overlays
/// are drawn without text.
pub fn load_font(preferred: Option<&Path>) -> Option<FontVec> {
    let candidates = preferred
        .into_iter()
        .chain(FALLBACK_FONTS.iter().map(Path::new));
    for path in candidates {
        match load_font_from(path) {
            Ok(font) => {
                info!(path = %path.display(), "loaded overlay font");
                return Some(font);
            }
            Err(e) if Some(path) == preferred => warn!(error = %e, "configured font unusable"),
            Err(_) => {}
        }
    }
    warn!("no usable font found, text overlays disabled");
    None
}

/// Renders one line of text into a tight, transparent, premultiplied pixmap.
/// Returns `None` for text without visible glyphs.
pub fn render_text_pixmap<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Color,
) -> Option<Pixmap> {
    let scale = PxScale::from(font_size);
    let sf = font.as_scaled(scale);

    // layout with baseline at ascent
    let mut pen_x = 0.0f32;
    let mut glyphs = Vec::<Glyph>::new();
    for ch in text.chars() {
        if ch == '\t' {
            pen_x += sf.h_advance(font.glyph_id(' ')) * 4.0;
            continue;
        }
        let id = font.glyph_id(ch);
        if let Some(prev) = glyphs.last() {
            pen_x += sf.kern(prev.id, id);
        }
        glyphs.push(Glyph {
            id,
            scale,
            position: point(pen_x, sf.ascent()),
        });
        pen_x += sf.h_advance(id);
    }

    let outlines: Vec<_> = glyphs
        .into_iter()
        .filter_map(|g| font.outline_glyph(g))
        .collect();
    if outlines.is_empty() {
        return None;
    }

    let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
    let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for out in &outlines {
        let b = out.px_bounds();
        min_x = min_x.min(b.min.x);
        min_y = min_y.min(b.min.y);
        max_x = max_x.max(b.max.x);
        max_y = max_y.max(b.max.y);
    }

    let w = (max_x.ceil() - min_x.floor()).max(1.0) as u32;
    let h = (max_y.ceil() - min_y.floor()).max(1.0) as u32;
    let mut pm = Pixmap::new(w, h)?;
    let stride = w as usize;
    let dst = pm.pixels_mut();

    let cu = color.to_color_u8();
    for out in &outlines {
        let b = out.px_bounds();
        out.draw(|x, y, cov| {
            if cov <= f32::EPSILON {
                return;
            }
            let ix = (x as f32 + b.min.x - min_x).floor() as i32;
            let iy = (y as f32 + b.min.y - min_y).floor() as i32;
            if ix < 0 || iy < 0 || ix >= w as i32 || iy >= h as i32 {
                return;
            }
            let i = iy as usize * stride + ix as usize;

            let a = (cov * cu.alpha() as f32 / 255.0).clamp(0.0, 1.0);
            let sa = (a * 255.0) as u8;
            let bg = dst[i];
            let inv = 1.0 - a;
            // source over, premultiplied
            let mix = |s: u8, d: u8| (s as f32 * a + d as f32 * inv).min(255.0) as u8;
            let out_a = sa.saturating_add((bg.alpha() as f32 * inv) as u8);
            let r = mix(cu.red(), bg.red()).min(out_a);
            let g = mix(cu.green(), bg.green()).min(out_a);
            let bl = mix(cu.blue(), bg.blue()).min(out_a);
            if let Some(px) = PremultipliedColorU8::from_rgba(r, g, bl, out_a) {
                dst[i] = px;
            }
        });
    }
    Some(pm)
}

/// Renders `text` line by line, left aligned, into one pixmap.
pub fn render_text_block<F: Font>(
    text: &str,
    font_size: f32,
    font: &F,
    color: Color,
) -> Option<Pixmap> {
    let line_height = (font_size * 1.3).ceil() as u32;
    let lines: Vec<Option<Pixmap>> = text
        .lines()
        .map(|line| render_text_pixmap(line, font_size, font, color))
        .collect();
    let width = lines.iter().flatten().map(Pixmap::width).max()?;
    let height = line_height * (lines.len() as u32 - 1)
        + lines.last().and_then(|l| l.as_ref()).map_or(line_height, Pixmap::height);

    let mut block = Pixmap::new(width, height)?;
    for (i, line) in lines.iter().enumerate() {
        if let Some(pm) = line {
            block.draw_pixmap(
                0,
                (i as u32 * line_height) as i32,
                pm.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
        }
    }
    Some(block)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_font_is_render_resource_error() {
        let err = load_font_from(Path::new("/nonexistent/font.ttf")).unwrap_err();
        assert!(matches!(err, DisplayError::RenderResource(_)));
    }

    #[test]
    fn test_garbage_font_rejected() {
        let path = std::env::temp_dir().join("ssvep-render-not-a-font.ttf");
        std::fs::write(&path, b"definitely not a font").unwrap();
        assert!(load_font_from(&path).is_err());
        let _ = std::fs::remove_file(&path);
    }
}
