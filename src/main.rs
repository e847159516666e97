mod constants;
mod editor;
mod identity;
mod notice;
mod paths;
mod photo;
mod tile;
mod tray;
mod validate;

use constants::{
    COLOR_TOAST_ERROR, COLOR_TOAST_INFO, COLOR_TOOLBAR, INITIAL_WINDOW_HEIGHT,
    INITIAL_WINDOW_WIDTH, MAX_PHOTOS, TILE_SPACING,
};
use eframe::egui::{self, Color32, RichText, Vec2};
use editor::{Editor, EditorOutcome};
use notice::{Notice, Toasts};
use photo::UploadedFile;
use serde::Serialize;
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tile::{show_tile, DragState, TileIntent};
use tray::{HostEvent, PhotoTray};
use uuid::Uuid;

fn main() -> eframe::Result<()> {
    env_logger::init();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([INITIAL_WINDOW_WIDTH, INITIAL_WINDOW_HEIGHT])
            .with_drag_and_drop(true),
        ..Default::default()
    };

    eframe::run_native(
        "Photo Tray",
        options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            Ok(Box::new(PhotoTrayApp::new(cc)))
        }),
    )
}

/// One entry of the submission payload, in display order.
#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum SubmissionImage {
    Uploaded { name: String, bytes: usize },
    Remote { url: String },
}

/// Stand-in for the listing form that hosts the tray: it owns the
/// authoritative uploaded list and the backend's remote image order, and
/// consumes the tray's events.
#[derive(Default)]
struct ListingForm {
    uploads: Vec<UploadedFile>,
    remote_urls: Vec<String>,
}

impl ListingForm {
    fn apply(&mut self, event: HostEvent) -> Result<(), String> {
        match event {
            HostEvent::UploadsChanged(list) => {
                self.uploads = list;
                Ok(())
            }
            HostEvent::DeleteExisting(url) => {
                let before = self.remote_urls.len();
                self.remote_urls.retain(|u| *u != url);
                if self.remote_urls.len() == before {
                    return Err(format!("unknown remote image {url}"));
                }
                Ok(())
            }
            HostEvent::ReorderExisting { from, to } => {
                if from >= self.remote_urls.len() || to >= self.remote_urls.len() {
                    return Err(format!("reorder {from}->{to} out of range"));
                }
                let url = self.remote_urls.remove(from);
                self.remote_urls.insert(to, url);
                Ok(())
            }
        }
    }

    /// The final ordered image array the submission pipeline would receive:
    /// the form's own lists, interleaved in tray display order.
    fn submission(&self, order: &PhotoTray) -> Vec<SubmissionImage> {
        order
            .photos()
            .iter()
            .filter_map(|p| match p.uploaded_file() {
                Some(file) => self
                    .uploads
                    .iter()
                    .find(|u| u.key() == file.key())
                    .map(|u| SubmissionImage::Uploaded {
                        name: u.name.clone(),
                        bytes: u.size(),
                    }),
                None => p.remote_url().map(|url| SubmissionImage::Remote {
                    url: url.to_string(),
                }),
            })
            .collect()
    }
}

struct PhotoTrayApp {
    tray: PhotoTray,
    form: ListingForm,
    editor: Editor,
    drag: DragState,
    toasts: Toasts,
    /// Photo waiting on the delete confirmation dialog. Held by id because
    /// the strip stays interactive while the dialog is up, so indices can go
    /// stale under it.
    pending_delete: Option<Uuid>,
    remote_url_input: String,
}

impl PhotoTrayApp {
    fn new(_cc: &eframe::CreationContext<'_>) -> Self {
        let form = ListingForm::default();
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.seed_remotes(&form.remote_urls);
        Self {
            tray,
            form,
            editor: Editor::default(),
            drag: DragState::default(),
            toasts: Toasts::default(),
            pending_delete: None,
            remote_url_input: String::new(),
        }
    }

    /// Files dropped onto the window enter the same intake path as picked
    /// ones. Drops carry either a path (native) or raw bytes.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if dropped.is_empty() {
            return;
        }
        let files: Vec<UploadedFile> = dropped
            .into_iter()
            .filter_map(|drop| match drop.path {
                Some(path) => match read_upload(&path) {
                    Ok(file) => Some(file),
                    Err(err) => {
                        log::error!("could not read {}: {err}", path.display());
                        None
                    }
                },
                None => drop
                    .bytes
                    .map(|bytes| UploadedFile::new(drop.name, bytes.to_vec(), now_ms())),
            })
            .collect();
        if !files.is_empty() {
            self.tray.queue_files(files);
        }
    }

    fn pick_photos(&mut self) {
        let Some(paths) = rfd::FileDialog::new()
            .add_filter("Photos", &["png", "jpg", "jpeg", "webp"])
            .pick_files()
        else {
            return;
        };
        let files: Vec<UploadedFile> = paths
            .into_iter()
            .filter_map(|path| match read_upload(&path) {
                Ok(file) => Some(file),
                Err(err) => {
                    log::error!("could not read {}: {err}", path.display());
                    None
                }
            })
            .collect();
        if !files.is_empty() {
            self.tray.queue_files(files);
        }
    }

    fn export_submission(&mut self) {
        let default_dir = paths::AppPaths::from_project_dirs().and_then(|p| {
            p.ensure_dirs_exist().ok()?;
            Some(p.exports)
        });
        let mut dialog = rfd::FileDialog::new()
            .add_filter("Submission", &["json"])
            .set_file_name("listing_images.json");
        if let Some(dir) = default_dir {
            dialog = dialog.set_directory(dir);
        }
        let Some(path) = dialog.save_file() else {
            return;
        };

        let payload = self.form.submission(&self.tray);
        match std::fs::File::create(&path) {
            Ok(file) => {
                if let Err(err) = serde_json::to_writer_pretty(file, &payload) {
                    log::error!("submission export failed: {err}");
                    self.toasts.push(Notice::UploadFailed);
                }
            }
            Err(err) => {
                log::error!("could not create {}: {err}", path.display());
                self.toasts.push(Notice::UploadFailed);
            }
        }
    }

    fn handle_intent(&mut self, intent: TileIntent) {
        match intent {
            TileIntent::Move { from, to } => self.tray.move_photo(from, to),
            TileIntent::DeleteRequested(index) => {
                self.pending_delete = self.tray.get(index).map(|p| p.id);
            }
            TileIntent::EditRequested(index) => {
                let Some((id, file)) = self.tray.begin_edit(index) else {
                    return;
                };
                if let Err(err) = self.editor.open(id, &file.bytes) {
                    log::error!("could not open editor for {}: {err}", file.name);
                    self.tray.cancel_edit();
                    self.toasts.push(Notice::CorruptImage);
                }
            }
        }
    }

    fn show_toolbar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("toolbar")
            .frame(egui::Frame::default().fill(COLOR_TOOLBAR).inner_margin(6.0))
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    if toolbar_button(ui, "🖼", "Add photos").clicked() {
                        self.pick_photos();
                    }
                    if toolbar_button(ui, "💾", "Export submission").clicked() {
                        self.export_submission();
                    }

                    ui.separator();
                    ui.label(format!("{}/{}", self.tray.len(), MAX_PHOTOS));

                    ui.separator();
                    let input = egui::TextEdit::singleline(&mut self.remote_url_input)
                        .hint_text("persisted image URL")
                        .desired_width(240.0);
                    let input_response = ui.add(input);
                    let submitted = input_response.lost_focus()
                        && ui.input(|i| i.key_pressed(egui::Key::Enter));
                    if (ui.button("Attach").clicked() || submitted)
                        && !self.remote_url_input.trim().is_empty()
                    {
                        let url = std::mem::take(&mut self.remote_url_input);
                        if self.tray.add_remote(&url) {
                            self.form.remote_urls.push(url.trim().to_string());
                        }
                    }

                    if let Some(progress) = self.tray.progress() {
                        ui.separator();
                        ui.add(
                            egui::ProgressBar::new(progress)
                                .desired_width(140.0)
                                .show_percentage(),
                        );
                    }
                });
            });
    }

    fn show_strip(&mut self, ctx: &egui::Context) {
        let mut intents: Vec<TileIntent> = Vec::new();
        let inert = self.tray.busy() || self.editor.is_open();

        egui::CentralPanel::default().show(ctx, |ui| {
            if self.tray.is_empty() && !self.tray.busy() {
                ui.centered_and_justified(|ui| {
                    ui.label(
                        RichText::new("No photos yet — add up to 10, the first is the cover")
                            .color(Color32::GRAY),
                    );
                });
                return;
            }

            egui::ScrollArea::vertical().show(ui, |ui| {
                ui.horizontal_wrapped(|ui| {
                    ui.spacing_mut().item_spacing = Vec2::splat(TILE_SPACING);
                    for index in 0..self.tray.len() {
                        let photo = &self.tray.photos()[index];
                        if let Some(intent) = show_tile(ui, photo, index, &mut self.drag, inert) {
                            intents.push(intent);
                        }
                    }
                });
                if let Some(intent) = self.drag.finish(ui) {
                    intents.push(intent);
                }
            });
        });

        for intent in intents {
            self.handle_intent(intent);
        }
    }

    fn show_delete_confirmation(&mut self, ctx: &egui::Context) {
        let Some(id) = self.pending_delete else {
            return;
        };
        let label = match self.tray.index_of(id).and_then(|i| self.tray.get(i)) {
            Some(photo) => photo.label().to_string(),
            None => {
                // Deleted or rederived away while the dialog was up.
                self.pending_delete = None;
                return;
            }
        };

        egui::Window::new("Remove photo?")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(format!("Remove \"{label}\" from the listing?"));
                ui.horizontal(|ui| {
                    if ui.button("Remove").clicked() {
                        self.tray.delete_by_id(id);
                        self.pending_delete = None;
                    }
                    if ui.button("Keep").clicked() {
                        self.pending_delete = None;
                    }
                });
            });
    }

    fn show_toasts(&mut self, ctx: &egui::Context) {
        if self.toasts.is_empty() {
            return;
        }
        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, Vec2::new(-12.0, -12.0))
            .show(ctx, |ui| {
                for notice in self.toasts.fresh() {
                    let fill = if notice.is_error() {
                        COLOR_TOAST_ERROR
                    } else {
                        COLOR_TOAST_INFO
                    };
                    egui::Frame::default()
                        .fill(fill)
                        .rounding(4.0)
                        .inner_margin(8.0)
                        .show(ui, |ui| {
                            ui.label(RichText::new(notice.message()).color(Color32::WHITE));
                        });
                }
            });
        // Keep repainting so toasts expire even without input.
        ctx.request_repaint_after(std::time::Duration::from_millis(250));
    }
}

impl eframe::App for PhotoTrayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.handle_dropped_files(ctx);
        if self.tray.busy() {
            self.tray.tick();
            ctx.request_repaint();
        }

        // Route tray output: events to the host form, notices to toasts.
        for event in self.tray.take_events() {
            let context = match &event {
                HostEvent::UploadsChanged(_) => "uploads",
                HostEvent::DeleteExisting(_) => "delete-existing",
                HostEvent::ReorderExisting { .. } => "reorder-existing",
            };
            if let Err(err) = self.form.apply(event) {
                self.tray.report_host_failure(context, &err);
            }
        }
        for notice in self.tray.take_notices() {
            self.toasts.push(notice);
        }

        // Re-derive the collection from the host's lists, as a form re-render
        // would. Idempotent, so a quiet frame changes nothing.
        if !self.tray.busy() {
            self.tray
                .rederive(&self.form.uploads, &self.form.remote_urls);
        }
        self.tray.ensure_textures(ctx);

        self.show_toolbar(ctx);
        self.show_strip(ctx);
        self.show_delete_confirmation(ctx);

        match self.editor.show(ctx) {
            Some(EditorOutcome::Saved { photo_id, bytes }) => {
                self.tray.apply_edit(photo_id, bytes, now_ms());
            }
            Some(EditorOutcome::Cancelled) => self.tray.cancel_edit(),
            None => {}
        }

        self.show_toasts(ctx);
    }
}

fn toolbar_button(ui: &mut egui::Ui, icon: &str, hover: &str) -> egui::Response {
    ui.add(
        egui::Button::new(RichText::new(icon).size(22.0))
            .min_size(Vec2::new(30.0, 30.0))
            .frame(false),
    )
    .on_hover_text(hover)
}

fn read_upload(path: &PathBuf) -> Result<UploadedFile, String> {
    let bytes = std::fs::read(path).map_err(|err| err.to_string())?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "unnamed".to_string());
    let modified_ms = std::fs::metadata(path)
        .ok()
        .and_then(|m| m.modified().ok())
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0);
    Ok(UploadedFile::new(name, bytes, modified_ms))
}

fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
