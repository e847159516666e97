//! Modal crop/blur editor for a single photo.
//!
//! The editor is a tagged state machine: `Closed` or `Open` with one
//! session. A session holds the decoded source at native resolution, plus an
//! optional crop rectangle and blur regions, both converted to source pixels
//! as soon as their gesture completes, so canvas resizes cannot remap them.
//! Preview recomposition is debounced; the saved output is always composed
//! from the native-resolution source.

use crate::constants::{
    BLUR_SIGMA_DEFAULT, BLUR_SIGMA_MAX, BLUR_SIGMA_MIN, BLUR_WASH_KEEP, EDIT_OUTPUT_JPEG_QUALITY,
    PREVIEW_DEBOUNCE, PREVIEW_TEXTURE_MAX_EDGE,
};
use crate::validate::{decode_oriented, encode_jpeg};
use eframe::egui::{self, Color32, Pos2, Rect, Sense, Vec2};
use image::{DynamicImage, RgbaImage};
use std::time::Instant;
use uuid::Uuid;

/// Axis-aligned rectangle in source-pixel space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SourceRect {
    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Scales a display-space rectangle into source pixels, clamped to the
/// source bounds. Returns None for degenerate rectangles.
pub fn source_rect_from_display(
    rect: Rect,
    display_size: Vec2,
    source_w: u32,
    source_h: u32,
) -> Option<SourceRect> {
    if display_size.x <= 0.0 || display_size.y <= 0.0 {
        return None;
    }
    let sx = source_w as f32 / display_size.x;
    let sy = source_h as f32 / display_size.y;
    let x0 = (rect.min.x * sx).floor().clamp(0.0, source_w as f32) as u32;
    let y0 = (rect.min.y * sy).floor().clamp(0.0, source_h as f32) as u32;
    let x1 = (rect.max.x * sx).ceil().clamp(0.0, source_w as f32) as u32;
    let y1 = (rect.max.y * sy).ceil().clamp(0.0, source_h as f32) as u32;
    let out = SourceRect {
        x: x0,
        y: y0,
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
    };
    (!out.is_empty()).then_some(out)
}

/// Blurs each region of `img` in place. `wash_keep` < 256 additionally
/// darkens the region so it stays visible in the preview; pass 256 for the
/// saved output.
pub fn blur_regions(img: &mut RgbaImage, regions: &[SourceRect], sigma: f32, wash_keep: u16) {
    let (w, h) = img.dimensions();
    for region in regions {
        let x = region.x.min(w);
        let y = region.y.min(h);
        let rw = region.width.min(w - x);
        let rh = region.height.min(h - y);
        if rw == 0 || rh == 0 {
            continue;
        }
        let sub = image::imageops::crop_imm(img, x, y, rw, rh).to_image();
        let mut blurred = image::imageops::fast_blur(&sub, sigma);
        if wash_keep < 256 {
            for pixel in blurred.pixels_mut() {
                for channel in &mut pixel.0[..3] {
                    *channel = ((*channel as u16 * wash_keep) / 256) as u8;
                }
            }
        }
        image::imageops::replace(img, &blurred, x as i64, y as i64);
    }
}

/// Composes the final raster: native-resolution source, then the crop
/// extract, then every blur region shifted into the cropped coordinate
/// origin. Regions falling outside the crop are clipped away.
pub fn render_output(
    source: &DynamicImage,
    crop: Option<SourceRect>,
    regions: &[SourceRect],
    sigma: f32,
) -> RgbaImage {
    let mut base = source.to_rgba8();
    let mut regions: Vec<SourceRect> = regions.to_vec();

    if let Some(crop) = crop {
        let (w, h) = base.dimensions();
        let x = crop.x.min(w);
        let y = crop.y.min(h);
        let cw = crop.width.min(w - x);
        let ch = crop.height.min(h - y);
        if cw > 0 && ch > 0 {
            base = image::imageops::crop_imm(&base, x, y, cw, ch).to_image();
            regions = regions
                .iter()
                .filter_map(|r| shift_into_crop(*r, x, y, cw, ch))
                .collect();
        }
    }

    blur_regions(&mut base, &regions, sigma, 256);
    base
}

fn shift_into_crop(r: SourceRect, cx: u32, cy: u32, cw: u32, ch: u32) -> Option<SourceRect> {
    let x0 = r.x.max(cx);
    let y0 = r.y.max(cy);
    let x1 = (r.x + r.width).min(cx + cw);
    let y1 = (r.y + r.height).min(cy + ch);
    if x1 <= x0 || y1 <= y0 {
        return None;
    }
    Some(SourceRect {
        x: x0 - cx,
        y: y0 - cy,
        width: x1 - x0,
        height: y1 - y0,
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EditorMode {
    Crop,
    Blur,
}

/// The edit session's result, handed back to the tray.
pub enum EditorOutcome {
    Saved { photo_id: Uuid, bytes: Vec<u8> },
    Cancelled,
}

pub struct EditSession {
    photo_id: Uuid,
    source: DynamicImage,
    mode: EditorMode,
    /// Completed crop rectangle, source pixels.
    crop: Option<SourceRect>,
    regions: Vec<SourceRect>,
    sigma: f32,
    /// In-progress pointer gesture, display space.
    gesture_from: Option<Pos2>,
    gesture_to: Option<Pos2>,
    preview: Option<egui::TextureHandle>,
    dirty_at: Option<Instant>,
    display_size: Vec2,
}

/// Closed, or open on exactly one photo. All buffers live inside the
/// session, so closing the editor releases everything at once.
#[derive(Default)]
pub enum Editor {
    #[default]
    Closed,
    Open(EditSession),
}

impl Editor {
    pub fn is_open(&self) -> bool {
        matches!(self, Editor::Open(_))
    }

    /// Opens a session on the given photo bytes. On decode failure the
    /// editor stays closed and the error is returned for a notice.
    pub fn open(&mut self, photo_id: Uuid, bytes: &[u8]) -> Result<(), String> {
        let source = decode_oriented(bytes)?;
        *self = Editor::Open(EditSession {
            photo_id,
            source,
            mode: EditorMode::Crop,
            crop: None,
            regions: Vec::new(),
            sigma: BLUR_SIGMA_DEFAULT,
            gesture_from: None,
            gesture_to: None,
            preview: None,
            dirty_at: Some(Instant::now()),
            display_size: Vec2::ZERO,
        });
        Ok(())
    }

    /// Drops the session and everything in it.
    pub fn close(&mut self) {
        *self = Editor::Closed;
    }

    /// Shows the editor window. Returns an outcome when the session ended
    /// this frame; the caller routes it to the tray.
    pub fn show(&mut self, ctx: &egui::Context) -> Option<EditorOutcome> {
        let Editor::Open(session) = self else {
            return None;
        };

        let mut keep_open = true;
        let mut outcome = None;

        egui::Window::new("Edit photo")
            .collapsible(false)
            .resizable(true)
            .default_width(720.0)
            .open(&mut keep_open)
            .show(ctx, |ui| {
                outcome = session.show_contents(ui, ctx);
            });

        if outcome.is_none() && !keep_open {
            outcome = Some(EditorOutcome::Cancelled);
        }
        if outcome.is_some() {
            self.close();
        }
        outcome
    }
}

impl EditSession {
    fn show_contents(&mut self, ui: &mut egui::Ui, ctx: &egui::Context) -> Option<EditorOutcome> {
        let mut outcome = None;

        ui.horizontal(|ui| {
            ui.selectable_value(&mut self.mode, EditorMode::Crop, "Crop");
            ui.selectable_value(&mut self.mode, EditorMode::Blur, "Blur");
            ui.separator();

            let slider = ui.add(
                egui::Slider::new(&mut self.sigma, BLUR_SIGMA_MIN..=BLUR_SIGMA_MAX)
                    .text("intensity"),
            );
            if slider.changed() {
                self.mark_dirty();
            }

            ui.add_enabled_ui(!self.regions.is_empty(), |ui| {
                if ui.button("Undo blur").clicked() {
                    self.regions.pop();
                    self.mark_dirty();
                }
            });
            if self.crop.is_some() && ui.button("Clear crop").clicked() {
                self.crop = None;
            }

            ui.separator();
            if ui.button("Save").clicked() {
                match self.save() {
                    Ok(bytes) => {
                        outcome = Some(EditorOutcome::Saved {
                            photo_id: self.photo_id,
                            bytes,
                        });
                    }
                    // Keep the session open so the user can retry.
                    Err(err) => log::error!("editor save failed: {err}"),
                }
            }
            if ui.button("Cancel").clicked() {
                outcome = Some(EditorOutcome::Cancelled);
            }
        });
        ui.separator();

        self.refresh_preview(ctx);
        self.show_canvas(ui);
        outcome
    }

    fn mark_dirty(&mut self) {
        self.dirty_at = Some(Instant::now());
    }

    /// Recomposites the preview once the debounce window has passed. The
    /// composite runs at native resolution; only the uploaded texture is
    /// downscaled.
    fn refresh_preview(&mut self, ctx: &egui::Context) {
        let Some(dirty_at) = self.dirty_at else {
            return;
        };
        let elapsed = dirty_at.elapsed();
        if elapsed < PREVIEW_DEBOUNCE {
            ctx.request_repaint_after(PREVIEW_DEBOUNCE - elapsed);
            return;
        }
        self.dirty_at = None;

        let mut composite = self.source.to_rgba8();
        blur_regions(&mut composite, &self.regions, self.sigma, BLUR_WASH_KEEP);

        let texture_image = DynamicImage::ImageRgba8(composite)
            .thumbnail(PREVIEW_TEXTURE_MAX_EDGE, PREVIEW_TEXTURE_MAX_EDGE)
            .to_rgba8();
        let size = [texture_image.width() as usize, texture_image.height() as usize];
        let color = egui::ColorImage::from_rgba_unmultiplied(size, &texture_image);
        match self.preview.as_mut() {
            Some(texture) => texture.set(color, egui::TextureOptions::LINEAR),
            None => {
                self.preview = Some(ctx.load_texture(
                    format!("edit-preview-{}", self.photo_id),
                    color,
                    egui::TextureOptions::LINEAR,
                ));
            }
        }
    }

    fn show_canvas(&mut self, ui: &mut egui::Ui) {
        let source_size = Vec2::new(self.source.width() as f32, self.source.height() as f32);
        let avail = ui.available_size().max(Vec2::new(64.0, 64.0));
        let scale = (avail.x / source_size.x)
            .min(avail.y / source_size.y)
            .min(1.0);
        self.display_size = source_size * scale;

        let (rect, response) = ui.allocate_exact_size(self.display_size, Sense::drag());
        let painter = ui.painter_at(rect);

        if let Some(texture) = &self.preview {
            let mut shape = egui::epaint::RectShape::filled(rect, 0.0, Color32::WHITE);
            shape.fill_texture_id = texture.id();
            shape.uv = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0));
            painter.add(shape);
        } else {
            painter.rect_filled(rect, 0.0, Color32::from_gray(40));
        }

        self.handle_gesture(&response, rect);

        // Crop overlay: darken everything outside the rectangle.
        if let Some(crop) = self.active_crop_display() {
            let crop_screen = crop.translate(rect.min.to_vec2());
            for outside in subtract_rect(rect, crop_screen) {
                painter.rect_filled(outside, 0.0, Color32::from_black_alpha(130));
            }
            painter.rect_stroke(crop_screen, 0.0, egui::Stroke::new(1.5, Color32::WHITE));
        }

        // Gesture feedback for an in-progress blur rectangle.
        if self.mode == EditorMode::Blur {
            if let Some(drag_rect) = self.gesture_rect() {
                painter.rect_stroke(
                    drag_rect.translate(rect.min.to_vec2()),
                    0.0,
                    egui::Stroke::new(1.0, Color32::LIGHT_BLUE),
                );
            }
        }
    }

    fn handle_gesture(&mut self, response: &egui::Response, rect: Rect) {
        let to_display = |pos: Pos2| (pos - rect.min).to_pos2();

        if response.drag_started() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.gesture_from = Some(to_display(pos));
                self.gesture_to = Some(to_display(pos));
            }
        }
        if response.dragged() {
            if let Some(pos) = response.interact_pointer_pos() {
                self.gesture_to = Some(to_display(pos.clamp(rect.min, rect.max)));
            }
        }
        if response.drag_stopped() {
            if let Some(gesture) = self.gesture_rect() {
                let converted = source_rect_from_display(
                    gesture,
                    self.display_size,
                    self.source.width(),
                    self.source.height(),
                );
                match self.mode {
                    // A new crop gesture replaces the previous rectangle.
                    EditorMode::Crop => {
                        if converted.is_some() {
                            self.crop = converted;
                        }
                    }
                    EditorMode::Blur => {
                        if let Some(region) = converted {
                            self.regions.push(region);
                            self.mark_dirty();
                        }
                    }
                }
            }
            self.gesture_from = None;
            self.gesture_to = None;
        }
    }

    fn gesture_rect(&self) -> Option<Rect> {
        let from = self.gesture_from?;
        let to = self.gesture_to?;
        let rect = Rect::from_two_pos(from, to);
        (rect.width() >= 2.0 && rect.height() >= 2.0).then_some(rect)
    }

    fn active_crop_display(&self) -> Option<Rect> {
        if self.mode == EditorMode::Crop {
            if let Some(gesture) = self.gesture_rect() {
                return Some(gesture);
            }
        }
        let crop = self.crop?;
        Some(display_rect_from_source(
            crop,
            self.display_size,
            self.source.width(),
            self.source.height(),
        ))
    }

    fn save(&self) -> Result<Vec<u8>, String> {
        let output = render_output(&self.source, self.crop, &self.regions, self.sigma);
        encode_jpeg(&DynamicImage::ImageRgba8(output), EDIT_OUTPUT_JPEG_QUALITY)
    }
}

/// Projects a source-pixel rectangle into the current display space, for
/// drawing overlays after the canvas has been resized.
fn display_rect_from_source(
    rect: SourceRect,
    display_size: Vec2,
    source_w: u32,
    source_h: u32,
) -> Rect {
    let sx = display_size.x / source_w as f32;
    let sy = display_size.y / source_h as f32;
    Rect::from_min_size(
        Pos2::new(rect.x as f32 * sx, rect.y as f32 * sy),
        Vec2::new(rect.width as f32 * sx, rect.height as f32 * sy),
    )
}

/// Regions of `outer` not covered by `inner`, for the crop dimming overlay.
fn subtract_rect(outer: Rect, inner: Rect) -> Vec<Rect> {
    let inner = inner.intersect(outer);
    if inner.width() <= 0.0 || inner.height() <= 0.0 {
        return vec![outer];
    }
    let mut out = Vec::with_capacity(4);
    if inner.top() > outer.top() {
        out.push(Rect::from_min_max(
            outer.left_top(),
            Pos2::new(outer.right(), inner.top()),
        ));
    }
    if inner.bottom() < outer.bottom() {
        out.push(Rect::from_min_max(
            Pos2::new(outer.left(), inner.bottom()),
            outer.right_bottom(),
        ));
    }
    if inner.left() > outer.left() {
        out.push(Rect::from_min_max(
            Pos2::new(outer.left(), inner.top()),
            Pos2::new(inner.left(), inner.bottom()),
        ));
    }
    if inner.right() < outer.right() {
        out.push(Rect::from_min_max(
            Pos2::new(inner.right(), inner.top()),
            Pos2::new(outer.right(), inner.bottom()),
        ));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::test_images::noise_image;

    #[test]
    fn save_without_crop_or_regions_preserves_dimensions() {
        let source = noise_image(640, 480);
        let out = render_output(&source, None, &[], BLUR_SIGMA_DEFAULT);
        assert_eq!(out.dimensions(), (640, 480));
        // And the pixels themselves are untouched.
        assert_eq!(out, source.to_rgba8());
    }

    #[test]
    fn blurred_region_changes_inside_and_preserves_outside() {
        let source = noise_image(320, 240);
        let region = SourceRect {
            x: 40,
            y: 30,
            width: 100,
            height: 80,
        };
        let out = render_output(&source, None, &[region], BLUR_SIGMA_DEFAULT);
        let original = source.to_rgba8();

        // Strictly inside the region the noise is smoothed away.
        let mut changed = 0u32;
        for y in region.y + 8..region.y + region.height - 8 {
            for x in region.x + 8..region.x + region.width - 8 {
                if out.get_pixel(x, y) != original.get_pixel(x, y) {
                    changed += 1;
                }
            }
        }
        assert!(changed > 0);

        // Outside the region every pixel is bit-identical.
        for (x, y, pixel) in original.enumerate_pixels() {
            let inside = x >= region.x
                && x < region.x + region.width
                && y >= region.y
                && y < region.y + region.height;
            if !inside {
                assert_eq!(out.get_pixel(x, y), pixel, "pixel ({x},{y}) drifted");
            }
        }
    }

    #[test]
    fn crop_extracts_the_requested_subrectangle() {
        let source = noise_image(400, 300);
        let crop = SourceRect {
            x: 50,
            y: 60,
            width: 200,
            height: 100,
        };
        let out = render_output(&source, Some(crop), &[], BLUR_SIGMA_DEFAULT);
        assert_eq!(out.dimensions(), (200, 100));
        assert_eq!(
            out.get_pixel(0, 0),
            source.to_rgba8().get_pixel(crop.x, crop.y)
        );
    }

    #[test]
    fn regions_shift_into_the_cropped_origin() {
        let source = noise_image(400, 300);
        let crop = SourceRect {
            x: 100,
            y: 100,
            width: 200,
            height: 150,
        };
        // Region given in pre-crop coordinates, fully inside the crop.
        let region = SourceRect {
            x: 150,
            y: 120,
            width: 60,
            height: 40,
        };
        let out = render_output(&source, Some(crop), &[region], BLUR_SIGMA_DEFAULT);
        let plain = render_output(&source, Some(crop), &[], BLUR_SIGMA_DEFAULT);

        // The area mapped to (50,20)..(110,60) in cropped space differs.
        let mut changed = 0u32;
        for y in 24..56 {
            for x in 54..106 {
                if out.get_pixel(x, y) != plain.get_pixel(x, y) {
                    changed += 1;
                }
            }
        }
        assert!(changed > 0);

        // Far corner of the crop is untouched.
        assert_eq!(out.get_pixel(199, 149), plain.get_pixel(199, 149));
    }

    #[test]
    fn regions_outside_the_crop_are_clipped_away() {
        let region = SourceRect {
            x: 0,
            y: 0,
            width: 50,
            height: 50,
        };
        assert_eq!(shift_into_crop(region, 100, 100, 200, 150), None);
    }

    #[test]
    fn display_rect_scales_to_source_pixels() {
        // 2:1 scale in both axes.
        let rect = Rect::from_min_max(Pos2::new(10.0, 20.0), Pos2::new(110.0, 70.0));
        let converted =
            source_rect_from_display(rect, Vec2::new(200.0, 150.0), 400, 300).unwrap();
        assert_eq!(
            converted,
            SourceRect {
                x: 20,
                y: 40,
                width: 200,
                height: 100
            }
        );
    }

    #[test]
    fn crop_in_source_space_is_unaffected_by_canvas_resizes() {
        // Gesture made while the canvas showed the 400x300 source at half size.
        let gesture = Rect::from_min_max(Pos2::new(25.0, 30.0), Pos2::new(125.0, 80.0));
        let crop = source_rect_from_display(gesture, Vec2::new(200.0, 150.0), 400, 300).unwrap();
        assert_eq!(
            crop,
            SourceRect {
                x: 50,
                y: 60,
                width: 200,
                height: 100
            }
        );

        // After the window grows, the overlay is re-projected, and converting
        // that projection back lands on the same source pixels.
        let grown = Vec2::new(400.0, 300.0);
        let reprojected = display_rect_from_source(crop, grown, 400, 300);
        assert_eq!(
            source_rect_from_display(reprojected, grown, 400, 300),
            Some(crop)
        );
    }

    #[test]
    fn degenerate_display_rects_convert_to_none() {
        let rect = Rect::from_min_max(Pos2::new(5.0, 5.0), Pos2::new(5.0, 5.0));
        assert_eq!(
            source_rect_from_display(rect, Vec2::new(100.0, 100.0), 100, 100),
            None
        );
    }

    #[test]
    fn preview_wash_darkens_the_region() {
        let source = noise_image(120, 120);
        let mut washed = source.to_rgba8();
        let region = SourceRect {
            x: 10,
            y: 10,
            width: 50,
            height: 50,
        };
        blur_regions(&mut washed, &[region], BLUR_SIGMA_DEFAULT, BLUR_WASH_KEEP);

        let mut unwashed = source.to_rgba8();
        blur_regions(&mut unwashed, &[region], BLUR_SIGMA_DEFAULT, 256);

        // Compare average brightness inside the region.
        let lum = |img: &RgbaImage| -> u64 {
            let mut sum = 0u64;
            for y in region.y..region.y + region.height {
                for x in region.x..region.x + region.width {
                    let p = img.get_pixel(x, y);
                    sum += p.0[0] as u64 + p.0[1] as u64 + p.0[2] as u64;
                }
            }
            sum
        };
        assert!(lum(&washed) < lum(&unwashed));
    }
}
