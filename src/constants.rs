//! Centralized constants for photo limits, compression budgets, and UI sizing.
//!
//! This module consolidates all magic numbers and colors used throughout the
//! application to improve maintainability and provide semantic meaning to values.

use eframe::egui::Color32;
use std::time::Duration;

// =============================================================================
// PHOTO LIMITS
// =============================================================================

/// Maximum number of photos a listing may carry (cover photo is index 0).
pub const MAX_PHOTOS: usize = 10;

/// Smallest acceptable file size for an uploaded photo.
pub const MIN_FILE_BYTES: usize = 5 * 1024;

/// Largest acceptable file size for an uploaded photo.
pub const MAX_FILE_BYTES: usize = 5 * 1024 * 1024;

/// Minimum decoded width and height for an uploaded photo.
pub const MIN_PIXEL_EDGE: u32 = 200;

// =============================================================================
// COMPRESSION
// =============================================================================

/// Files below this size are stored as-is, bit for bit.
pub const COMPRESS_THRESHOLD_BYTES: usize = 300 * 1024;

/// Longest edge of a re-encoded photo after downscaling.
pub const MAX_OUTPUT_EDGE: u32 = 1920;

/// Sources with a longer edge at or above this get the larger byte budget.
pub const LARGE_SOURCE_EDGE: u32 = 2000;

/// Byte budget for re-encoded output of ordinary sources.
pub const OUTPUT_BUDGET_BYTES: usize = 600 * 1024;

/// Byte budget for re-encoded output of very large sources.
pub const LARGE_OUTPUT_BUDGET_BYTES: usize = 1024 * 1024;

/// JPEG qualities tried in order until the byte budget is met.
pub const JPEG_QUALITY_LADDER: [u8; 3] = [85, 75, 65];

/// Fixed JPEG quality for the crop/blur editor's saved output.
pub const EDIT_OUTPUT_JPEG_QUALITY: u8 = 90;

// =============================================================================
// EDITOR
// =============================================================================

/// Delay between a region/intensity change and the preview recomposition.
pub const PREVIEW_DEBOUNCE: Duration = Duration::from_millis(50);

/// Blur intensity slider bounds and default (gaussian sigma).
pub const BLUR_SIGMA_MIN: f32 = 2.0;
pub const BLUR_SIGMA_MAX: f32 = 12.0;
pub const BLUR_SIGMA_DEFAULT: f32 = 7.0;

/// Fraction of brightness kept inside a blurred region in the preview,
/// giving the faint darkening wash that marks regions while editing.
pub const BLUR_WASH_KEEP: u16 = 220;

/// Longest edge of the editor's preview texture. Compositing runs at native
/// resolution; only the texture handed to the GPU is downscaled.
pub const PREVIEW_TEXTURE_MAX_EDGE: u32 = 1600;

// =============================================================================
// TILE LAYOUT
// =============================================================================

/// Edge of the square area each photo tile occupies in the strip.
pub const TILE_EDGE: f32 = 148.0;

/// Internal padding between a tile's image and its border.
pub const TILE_PADDING: f32 = 4.0;

/// Spacing between tiles in the strip.
pub const TILE_SPACING: f32 = 12.0;

/// Corner radius for tile thumbnails.
pub const TILE_CORNER_RADIUS: f32 = 6.0;

/// Longest edge a decoded thumbnail is scaled to before texture upload.
pub const THUMB_MAX_EDGE: u32 = 420;

// =============================================================================
// CONTROL BUTTON CONSTANTS
// =============================================================================

/// Base size for tile control buttons (delete, edit).
pub const BUTTON_BASE_SIZE: f32 = 16.0;

/// Spacing between tile control buttons.
pub const BUTTON_SPACING: f32 = 4.0;

/// Multiplier for hit area of buttons (makes them easier to click).
pub const BUTTON_HIT_AREA_MULTIPLIER: f32 = 1.2;

/// Font size for control button icons.
pub const BUTTON_ICON_FONT_SIZE: f32 = 12.0;

// =============================================================================
// WINDOW AND NOTICE CONSTANTS
// =============================================================================

/// Initial window width when the application starts.
pub const INITIAL_WINDOW_WIDTH: f32 = 980.0;

/// Initial window height when the application starts.
pub const INITIAL_WINDOW_HEIGHT: f32 = 640.0;

/// How long a toast stays on screen.
pub const TOAST_TTL: Duration = Duration::from_secs(4);

// =============================================================================
// COLORS
// =============================================================================

/// Placeholder fill for photos persisted on the server (no local bytes).
pub const COLOR_REMOTE_PLACEHOLDER: Color32 = Color32::from_rgb(70, 80, 100);

/// Stroke used to highlight the tile a drag would drop onto.
pub const COLOR_DROP_TARGET: Color32 = Color32::from_rgb(110, 170, 255);

/// Badge fill for the cover-photo marker and position numbers.
pub const COLOR_POSITION_BADGE: Color32 = Color32::from_rgba_premultiplied(0, 0, 0, 160);

/// Toolbar background.
pub const COLOR_TOOLBAR: Color32 = Color32::from_rgb(30, 30, 30);

/// Toast backgrounds.
pub const COLOR_TOAST_INFO: Color32 = Color32::from_rgb(40, 70, 40);
pub const COLOR_TOAST_ERROR: Color32 = Color32::from_rgb(90, 40, 40);
