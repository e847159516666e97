//! Per-photo tile widget for the tray strip.
//!
//! A tile renders one photo and emits intents — move, delete, edit — without
//! ever touching the collection itself. Dragging carries the source index in
//! an app-owned transfer slot; the tile under the pointer becomes the drop
//! target and the move intent fires on release.

use crate::constants::{
    BUTTON_BASE_SIZE, BUTTON_HIT_AREA_MULTIPLIER, BUTTON_ICON_FONT_SIZE, BUTTON_SPACING,
    COLOR_DROP_TARGET, COLOR_POSITION_BADGE, TILE_CORNER_RADIUS, TILE_EDGE, TILE_PADDING,
};
use crate::photo::Photo;
use eframe::egui::{self, Align2, Color32, FontId, Pos2, Rect, Sense, Vec2};

/// What the user asked a tile to do with its photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileIntent {
    Move { from: usize, to: usize },
    DeleteRequested(usize),
    EditRequested(usize),
}

/// Ephemeral drag state owned by the app for the duration of one gesture.
#[derive(Default)]
pub struct DragState {
    /// Index the drag started from, recorded at drag-start.
    pub source: Option<usize>,
    /// Tile currently under the pointer, recomputed every frame.
    pub target: Option<usize>,
}

impl DragState {
    pub fn dragging(&self) -> bool {
        self.source.is_some()
    }

    /// Call once per frame after all tiles have been shown. Converts a
    /// completed gesture into a move intent, or clears a gesture that ended
    /// nowhere useful.
    pub fn finish(&mut self, ui: &egui::Ui) -> Option<TileIntent> {
        if self.source.is_none() {
            return None;
        }
        let released = ui.input(|i| i.pointer.any_released());
        if !released {
            return None;
        }
        resolve_drop(self.source.take(), self.target.take())
    }
}

/// A completed gesture becomes a move only when it started on one tile and
/// ended on a different one.
fn resolve_drop(source: Option<usize>, target: Option<usize>) -> Option<TileIntent> {
    let from = source?;
    let to = target?;
    if from == to {
        return None;
    }
    Some(TileIntent::Move { from, to })
}

struct TileControls {
    delete_rect: Rect,
    edit_rect: Option<Rect>,
}

fn control_rects(rect: Rect, editable: bool) -> TileControls {
    let hit = BUTTON_BASE_SIZE * BUTTON_HIT_AREA_MULTIPLIER;
    let delete_rect = Rect::from_center_size(
        rect.right_top() + Vec2::new(-hit / 2.0 - 4.0, hit / 2.0 + 4.0),
        Vec2::splat(hit),
    );
    let edit_rect = editable.then(|| {
        Rect::from_center_size(
            delete_rect.center() - Vec2::new(hit + BUTTON_SPACING, 0.0),
            Vec2::splat(hit),
        )
    });
    TileControls {
        delete_rect,
        edit_rect,
    }
}

/// Shows one tile and returns the intent it emitted this frame, if any.
/// While `inert` (a batch is in flight) the tile renders but ignores input.
pub fn show_tile(
    ui: &mut egui::Ui,
    photo: &Photo,
    index: usize,
    drag: &mut DragState,
    inert: bool,
) -> Option<TileIntent> {
    let (rect, response) = ui.allocate_exact_size(
        Vec2::splat(TILE_EDGE),
        if inert {
            Sense::hover()
        } else {
            Sense::click_and_drag()
        },
    );
    if !ui.is_rect_visible(rect) {
        return None;
    }

    let pointer = ui.input(|i| i.pointer.hover_pos());
    let hovered = pointer.is_some_and(|p| rect.contains(p));

    // Drop-target bookkeeping: a tile other than the drag source lights up
    // while the pointer is over it. State is recomputed every frame, so
    // leaving the tile clears it without an explicit event.
    let is_drop_target = match drag.source {
        Some(source) if source != index && hovered => {
            drag.target = Some(index);
            true
        }
        Some(_) if drag.target == Some(index) && !hovered => {
            drag.target = None;
            false
        }
        _ => false,
    };

    paint_tile(ui, photo, index, rect, is_drop_target, inert);

    if inert {
        return None;
    }

    if hovered {
        if let Some(meta) = photo.meta {
            response.clone().on_hover_text(format!(
                "{} — {}×{} px, {} KB",
                photo.label(),
                meta.width,
                meta.height,
                meta.byte_size / 1024
            ));
        }
    }

    let controls = control_rects(rect, photo.is_uploaded());
    let on_delete = pointer.is_some_and(|p| controls.delete_rect.contains(p));
    let on_edit = controls
        .edit_rect
        .is_some_and(|r| pointer.is_some_and(|p| r.contains(p)));
    if hovered || drag.source == Some(index) {
        paint_controls(ui, &controls, on_delete, on_edit);
    }

    // Buttons are hit-tested before the tile body so a click on them never
    // starts a drag.
    if response.clicked() {
        if on_delete {
            return Some(TileIntent::DeleteRequested(index));
        }
        if on_edit {
            return Some(TileIntent::EditRequested(index));
        }
    }

    // The release itself is resolved by DragState::finish after every tile
    // has had the chance to claim the drop target this frame.
    if response.drag_started_by(egui::PointerButton::Primary) && !on_delete && !on_edit {
        drag.source = Some(index);
    }

    None
}

fn paint_tile(
    ui: &egui::Ui,
    photo: &Photo,
    index: usize,
    rect: Rect,
    is_drop_target: bool,
    inert: bool,
) {
    let painter = ui.painter_at(rect.expand(2.0));
    let image_rect = rect.shrink(TILE_PADDING);
    let rounding = egui::Rounding::same(TILE_CORNER_RADIUS);

    if let Some(texture) = &photo.texture {
        let mut shape = egui::epaint::RectShape::filled(image_rect, rounding, Color32::WHITE);
        shape.fill_texture_id = texture.id();
        shape.uv = Rect::from_min_max(Pos2::new(0.0, 0.0), Pos2::new(1.0, 1.0));
        painter.add(shape);
    } else {
        painter.rect_filled(image_rect, rounding, Color32::from_gray(50));
    }

    if inert {
        painter.rect_filled(image_rect, rounding, Color32::from_black_alpha(120));
    }
    if is_drop_target {
        painter.rect_stroke(image_rect, rounding, egui::Stroke::new(2.0, COLOR_DROP_TARGET));
    }

    // Position badge; index 0 is the cover photo.
    let badge_center = image_rect.left_top() + Vec2::splat(14.0);
    painter.circle_filled(badge_center, 11.0, COLOR_POSITION_BADGE);
    let badge_text = if index == 0 {
        "★".to_string()
    } else {
        (index + 1).to_string()
    };
    painter.text(
        badge_center,
        Align2::CENTER_CENTER,
        badge_text,
        FontId::proportional(12.0),
        Color32::WHITE,
    );

    let label = photo.label();
    if !label.is_empty() {
        let font = FontId::proportional(11.0);
        let galley = painter.layout(
            label.to_string(),
            font,
            Color32::WHITE,
            image_rect.width() - 8.0,
        );
        let text_pos = Pos2::new(
            image_rect.left() + 4.0,
            image_rect.bottom() - galley.size().y - 4.0,
        );
        painter.rect_filled(
            Rect::from_min_size(text_pos, galley.size()).expand(2.0),
            egui::Rounding::same(2.0),
            Color32::from_black_alpha(180),
        );
        painter.galley(text_pos, galley, Color32::WHITE);
    }
}

fn paint_controls(ui: &egui::Ui, controls: &TileControls, on_delete: bool, on_edit: bool) {
    let painter = ui.painter();
    let radius = BUTTON_BASE_SIZE / 2.0;

    painter.circle_filled(
        controls.delete_rect.center(),
        radius,
        if on_delete {
            Color32::from_rgb(255, 100, 100)
        } else {
            Color32::RED
        },
    );
    painter.text(
        controls.delete_rect.center(),
        Align2::CENTER_CENTER,
        "x",
        FontId::monospace(BUTTON_ICON_FONT_SIZE),
        Color32::WHITE,
    );

    if let Some(edit_rect) = controls.edit_rect {
        painter.circle_filled(
            edit_rect.center(),
            radius,
            if on_edit {
                Color32::from_rgb(120, 160, 255)
            } else {
                Color32::from_rgb(70, 110, 200)
            },
        );
        painter.text(
            edit_rect.center(),
            Align2::CENTER_CENTER,
            "e",
            FontId::monospace(BUTTON_ICON_FONT_SIZE),
            Color32::WHITE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drop_on_another_tile_moves() {
        assert_eq!(
            resolve_drop(Some(0), Some(3)),
            Some(TileIntent::Move { from: 0, to: 3 })
        );
    }

    #[test]
    fn drop_on_the_source_tile_is_a_no_op() {
        assert_eq!(resolve_drop(Some(2), Some(2)), None);
    }

    #[test]
    fn drop_outside_any_tile_is_a_no_op() {
        assert_eq!(resolve_drop(Some(1), None), None);
        assert_eq!(resolve_drop(None, Some(1)), None);
    }
}
