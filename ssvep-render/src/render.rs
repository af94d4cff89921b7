use crate::text::{render_text_block, render_text_pixmap};
use ab_glyph::FontVec;
use bytemuck::{cast_slice, cast_slice_mut};
use ssvep_core::{BackgroundImage, DisplayError, PatchShape, Result};
use ssvep_engine::{Frame, RunConfig};
use ssvep_timing::{HighPrecisionTimer, Timer};
use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tiny_skia::{
    Color, FillRule, FilterQuality, IntSize, Paint, PathBuilder, Pixmap, PixmapPaint, Rect,
    Transform,
};

const TEXT_CACHE_LIMIT: usize = 64;
const OSD_SIZE: f32 = 18.0;
const PROMPT_SIZE: f32 = 32.0;
const PROFILE_SIZE: f32 = 22.0;
const MARKER_SIZE: f32 = 10.0;

#[derive(Debug, Clone, Copy, Default)]
pub struct FrameStats {
    pub clear: Duration,
    pub draw: Duration,
    pub copy: Duration,
    pub total: Duration,
    pub patches: usize,
}

/// Background of the active run, already scaled to the window
struct Stage {
    run_id: u64,
    pixmap: Pixmap,
}

struct TextCache {
    size_px: f32,
    map: HashMap<String, Arc<Pixmap>>,
}

impl TextCache {
    fn new(size_px: f32) -> Self {
        Self {
            size_px,
            map: HashMap::new(),
        }
    }

    fn get_or_render(&mut self, font: &FontVec, text: &str) -> Option<Arc<Pixmap>> {
        if let Some(p) = self.map.get(text) {
            return Some(Arc::clone(p));
        }
        if self.map.len() >= TEXT_CACHE_LIMIT {
            self.map.clear();
        }
        let pm = Arc::new(render_text_block(
            text,
            self.size_px,
            font,
            Color::from_rgba8(255, 255, 255, 255),
        )?);
        self.map.insert(text.to_string(), Arc::clone(&pm));
        Some(pm)
    }
}

pub struct SkiaRenderer {
    width: u32,
    height: u32,
    font: Option<FontVec>,
    prompt_cache: TextCache,
    profile_cache: TextCache,
    canvas: Pixmap,
    stage: Option<Stage>,
    clear_buffer: Vec<u8>,
    component_timers: HashMap<&'static str, RefCell<HighPrecisionTimer>>,
}

fn blank_pixmap(width: u32, height: u32) -> Result<Pixmap> {
    let mut pm = Pixmap::new(width, height).ok_or_else(|| {
        DisplayError::RenderResource(format!("cannot allocate a {width}x{height} canvas"))
    })?;
    pm.fill(Color::BLACK);
    Ok(pm)
}

fn opaque_black(width: u32, height: u32) -> Vec<u8> {
    [0u8, 0, 0, 255]
        .into_iter()
        .cycle()
        .take((width * height * 4) as usize)
        .collect()
}

impl SkiaRenderer {
    pub fn new(width: u32, height: u32, font: Option<FontVec>) -> Result<Self> {
        Ok(Self {
            width,
            height,
            font,
            prompt_cache: TextCache::new(PROMPT_SIZE),
            profile_cache: TextCache::new(PROFILE_SIZE),
            canvas: blank_pixmap(width, height)?,
            stage: None,
            clear_buffer: opaque_black(width, height),
            component_timers: ["clear", "draw", "copy"]
                .iter()
                .map(|&k| (k, RefCell::new(HighPrecisionTimer::new())))
                .collect(),
        })
    }

    pub fn resize(&mut self, new_width: u32, new_height: u32) -> Result<()> {
        self.canvas = blank_pixmap(new_width, new_height)?;
        self.width = new_width;
        self.height = new_height;
        self.clear_buffer = opaque_black(new_width, new_height);
        // the stage is rebuilt at the new size on the next stimulus frame
        self.stage = None;
        Ok(())
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Rasterizes `frame` and copies it into the RGBA8 `frame_buffer`.
    pub fn render_frame<T: Timer<Timestamp = u64>>(
        &mut self,
        frame: &Frame<'_>,
        frame_buffer: &mut [u8],
        timer: &mut T,
    ) -> Result<FrameStats> {
        if frame_buffer.len() != self.clear_buffer.len() {
            return Err(DisplayError::RenderResource(format!(
                "frame buffer holds {} bytes, canvas needs {}",
                frame_buffer.len(),
                self.clear_buffer.len()
            )));
        }

        let t_clear = {
            let t = timer.now();
            self.clear(frame)?;
            timer.elapsed(t)
        };

        let (t_draw, patches) = {
            let t = timer.now();
            let patches = match frame {
                Frame::Idle {
                    prompt, profile, ..
                } => {
                    self.draw_idle(prompt, profile);
                    0
                }
                Frame::Stimulus { run, fills, .. } => self.draw_patches(run, fills),
            };
            self.draw_osd(frame.osd());
            self.draw_marker(frame.marker());
            (timer.elapsed(t), patches)
        };

        let t_copy = {
            let t = timer.now();
            frame_buffer.copy_from_slice(self.canvas.data());
            timer.elapsed(t)
        };

        let total = t_clear + t_draw + t_copy;
        for (key, d) in [("clear", t_clear), ("draw", t_draw), ("copy", t_copy)] {
            if let Some(cell) = self.component_timers.get(key) {
                cell.borrow_mut().record_frame(d);
            }
        }
        timer.record_frame(total);

        Ok(FrameStats {
            clear: t_clear,
            draw: t_draw,
            copy: t_copy,
            total,
            patches,
        })
    }

    /// Mean time per render step over the recent window, in milliseconds
    pub fn component_report(&self) -> Vec<(&'static str, f64)> {
        let mut report: Vec<_> = self
            .component_timers
            .iter()
            .map(|(k, t)| (*k, t.borrow().calibration_stats().average_frame_time_ns / 1e6))
            .collect();
        report.sort_by(|a, b| a.0.cmp(b.0));
        report
    }

    fn clear(&mut self, frame: &Frame<'_>) -> Result<()> {
        let Frame::Stimulus { run_id, run, .. } = frame else {
            self.canvas.data_mut().copy_from_slice(&self.clear_buffer);
            return Ok(());
        };
        if self.stage.as_ref().map(|s| s.run_id) != Some(*run_id) {
            self.stage = Some(Stage {
                run_id: *run_id,
                pixmap: self.build_stage(run)?,
            });
        }
        if let Some(stage) = &self.stage {
            self.canvas.data_mut().copy_from_slice(stage.pixmap.data());
        }
        Ok(())
    }

    fn build_stage(&self, run: &RunConfig) -> Result<Pixmap> {
        let mut stage = blank_pixmap(self.width, self.height)?;
        let Some(bg) = &run.background else {
            return Ok(stage);
        };
        let Some(image) = background_pixmap(bg) else {
            tracing::warn!(
                width = bg.width,
                height = bg.height,
                bytes = bg.rgba.len(),
                "background image does not match its size, ignored"
            );
            return Ok(stage);
        };
        let (sx, sy) = self.scale(run);
        stage.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &PixmapPaint {
                quality: FilterQuality::Bilinear,
                ..PixmapPaint::default()
            },
            Transform::from_scale(
                sx * run.resolution.0 as f32 / bg.width as f32,
                sy * run.resolution.1 as f32 / bg.height as f32,
            ),
            None,
        );
        Ok(stage)
    }

    /// Run resolution to window scale
    fn scale(&self, run: &RunConfig) -> (f32, f32) {
        (
            self.width as f32 / run.resolution.0 as f32,
            self.height as f32 / run.resolution.1 as f32,
        )
    }

    fn draw_patches(&mut self, run: &RunConfig, fills: &[f32]) -> usize {
        let (sx, sy) = self.scale(run);
        let mut paint = Paint::default();
        paint.anti_alias = false;
        let mut drawn = 0;

        for (patch, fill) in run.layout.patches().iter().zip(fills) {
            let (l, t, r, b) = patch.bounds();
            let Some(rect) = Rect::from_ltrb(
                l as f32 * sx,
                t as f32 * sy,
                r as f32 * sx,
                b as f32 * sy,
            ) else {
                continue;
            };
            let gray = (fill.clamp(0.0, 1.0) * 255.0).round() as u8;
            paint.set_color_rgba8(gray, gray, gray, 255);

            match run.shape {
                PatchShape::Rectangle => {
                    self.canvas
                        .fill_rect(rect, &paint, Transform::identity(), None);
                }
                PatchShape::Ellipse => {
                    if let Some(path) = PathBuilder::from_oval(rect) {
                        self.canvas.fill_path(
                            &path,
                            &paint,
                            FillRule::Winding,
                            Transform::identity(),
                            None,
                        );
                    }
                }
            }
            drawn += 1;
        }
        drawn
    }

    fn draw_idle(&mut self, prompt: &str, profile: &str) {
        let Some(font) = &self.font else {
            return;
        };
        let prompt_pm = self.prompt_cache.get_or_render(font, prompt);
        let profile_pm = self.profile_cache.get_or_render(font, profile);
        let (cx, cy) = (self.width as i32 / 2, self.height as i32 / 2);

        if let Some(pm) = prompt_pm {
            self.blit(&pm, cx - pm.width() as i32 / 2, cy - pm.height() as i32 / 2);
        }
        if let Some(pm) = profile_pm {
            let x = (self.width as f32 * 0.05) as i32;
            self.blit(&pm, x, cy - pm.height() as i32 / 2);
        }
    }

    fn draw_osd(&mut self, osd: &str) {
        let Some(font) = &self.font else {
            return;
        };
        let white = Color::from_rgba8(255, 255, 255, 255);
        if let Some(pm) = render_text_pixmap(osd, OSD_SIZE, font, white) {
            self.blit(&pm, 10, 10);
        }
    }

    fn draw_marker(&mut self, rgb: [u8; 3]) {
        let mut paint = Paint::default();
        paint.anti_alias = false;
        paint.set_color_rgba8(rgb[0], rgb[1], rgb[2], 255);
        let x = self.width as f32 - MARKER_SIZE * 2.0;
        if let Some(rect) = Rect::from_xywh(x, MARKER_SIZE, MARKER_SIZE, MARKER_SIZE) {
            self.canvas
                .fill_rect(rect, &paint, Transform::identity(), None);
        }
    }

    /// Source-over blit of a premultiplied pixmap with its top-left at `(x, y)`.
    fn blit(&mut self, pm: &Pixmap, x: i32, y: i32) {
        let (w, h) = (pm.width() as i32, pm.height() as i32);
        let (cw, ch) = (self.width as i32, self.height as i32);
        if x + w <= 0 || y + h <= 0 || x >= cw || y >= ch {
            return;
        }

        let dst_x = x.max(0) as usize;
        let dst_y = y.max(0) as usize;
        let src_x = (-x).max(0) as usize;
        let src_y = (-y).max(0) as usize;
        let copy_w = (w as usize - src_x).min(cw as usize - dst_x);
        let copy_h = (h as usize - src_y).min(ch as usize - dst_y);

        let aligned = pm.data().as_ptr().align_offset(4) == 0
            && self.canvas.data().as_ptr().align_offset(4) == 0;
        if !aligned {
            self.canvas.draw_pixmap(
                x,
                y,
                pm.as_ref(),
                &PixmapPaint::default(),
                Transform::identity(),
                None,
            );
            return;
        }

        let src_u32: &[u32] = cast_slice(pm.data());
        let dst_u32: &mut [u32] = cast_slice_mut(self.canvas.data_mut());
        let src_stride = pm.width() as usize;
        let dst_stride = self.width as usize;

        for row in 0..copy_h {
            let src_row = (src_y + row) * src_stride + src_x;
            let dst_row = (dst_y + row) * dst_stride + dst_x;
            for i in 0..copy_w {
                let s = src_u32[src_row + i];
                let sa = s >> 24;
                if sa == 0 {
                    continue;
                }
                if sa == 255 {
                    dst_u32[dst_row + i] = s;
                    continue;
                }
                let d = dst_u32[dst_row + i];
                let inv = 255 - sa;
                let over = |shift: u32| -> u32 {
                    let sc = (s >> shift) & 0xFF;
                    let dc = (d >> shift) & 0xFF;
                    (sc + (dc * inv + 127) / 255).min(255) << shift
                };
                dst_u32[dst_row + i] = over(0) | over(8) | over(16) | over(24);
            }
        }
    }
}

/// Premultiplies a straight-alpha RGBA8 image into a pixmap
fn background_pixmap(bg: &BackgroundImage) -> Option<Pixmap> {
    let size = IntSize::from_wh(bg.width, bg.height)?;
    if bg.rgba.len() != (bg.width * bg.height * 4) as usize {
        return None;
    }
    let mut data = bg.rgba.clone();
    for px in data.chunks_exact_mut(4) {
        let a = px[3] as u32;
        if a < 255 {
            for c in &mut px[..3] {
                *c = ((*c as u32 * a + 127) / 255) as u8;
            }
        }
    }
    Pixmap::from_vec(data, size)
}
