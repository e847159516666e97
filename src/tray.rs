//! The photo tray: single owner of the ordered photo collection.
//!
//! This module consolidates every mutation of the collection — batch intake,
//! reorder, delete, in-place edit — so widgets and the editor only emit
//! intents and can never race each other. Results flow outward as
//! `HostEvent`s the surrounding form consumes.

use crate::constants::{COLOR_REMOTE_PLACEHOLDER, MAX_PHOTOS, THUMB_MAX_EDGE};
use crate::identity::{unify, IdMint};
use crate::notice::Notice;
use crate::photo::{Photo, PhotoMeta, PhotoSource, UploadedFile};
use crate::validate::{compress, validate};
use eframe::egui;
use std::collections::{HashSet, VecDeque};
use uuid::Uuid;

/// What the tray tells the host form. The host owns persistence; the tray
/// owns the in-session collection.
#[derive(Debug, Clone)]
pub enum HostEvent {
    /// Full ordered list of uploaded files after any change to them.
    UploadsChanged(Vec<UploadedFile>),
    /// A persisted image should be removed on the backend.
    DeleteExisting(String),
    /// A persisted image moved within the host's own ordered list.
    ReorderExisting { from: usize, to: usize },
}

struct PendingBatch {
    queue: VecDeque<UploadedFile>,
    total: usize,
    done: usize,
    accepted: usize,
}

pub struct PhotoTray {
    photos: Vec<Photo>,
    mint: IdMint,
    max_photos: usize,
    batch: Option<PendingBatch>,
    /// Target of the one open edit session, if any.
    editing: Option<Uuid>,
    events: Vec<HostEvent>,
    notices: Vec<Notice>,
}

impl PhotoTray {
    pub fn new(max_photos: usize) -> Self {
        Self {
            photos: Vec::new(),
            mint: IdMint::new(),
            max_photos,
            batch: None,
            editing: None,
            events: Vec::new(),
            notices: Vec::new(),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Collection access
    // ─────────────────────────────────────────────────────────────────────────

    pub fn photos(&self) -> &[Photo] {
        &self.photos
    }

    pub fn len(&self) -> usize {
        self.photos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.photos.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Photo> {
        self.photos.get(index)
    }

    pub fn index_of(&self, id: Uuid) -> Option<usize> {
        self.photos.iter().position(|p| p.id == id)
    }

    /// True while a batch is being validated and compressed. Tiles stay
    /// inert for the duration.
    pub fn busy(&self) -> bool {
        self.batch.is_some()
    }

    /// Fractional progress of the in-flight batch, counting rejected
    /// candidates so the bar stays monotonic.
    pub fn progress(&self) -> Option<f32> {
        self.batch
            .as_ref()
            .map(|b| b.done as f32 / b.total.max(1) as f32)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Mount and re-derivation
    // ─────────────────────────────────────────────────────────────────────────

    /// Seeds the collection from the host's already-persisted image URLs.
    pub fn seed_remotes(&mut self, urls: &[String]) {
        let prior = std::mem::take(&mut self.photos);
        self.photos = unify(&mut self.mint, &[], urls, prior);
    }

    /// Rebuilds the collection from host inputs. Idempotent: unchanged
    /// inputs reproduce the current ids and ordering.
    pub fn rederive(&mut self, uploads: &[UploadedFile], remotes: &[String]) {
        let prior = std::mem::take(&mut self.photos);
        self.photos = unify(&mut self.mint, uploads, remotes, prior);
    }

    /// Adds one persisted remote image mid-session, with the same dedupe and
    /// count gates uploads get. Returns whether the URL was accepted.
    pub fn add_remote(&mut self, url: &str) -> bool {
        let url = url.trim();
        if url.is_empty() {
            return false;
        }
        if self.photos.iter().any(|p| p.remote_url() == Some(url)) {
            self.notices.push(Notice::DuplicateSkipped);
            return false;
        }
        if self.photos.len() + 1 > self.max_photos {
            self.notices.push(Notice::MaxCountExceeded);
            return false;
        }
        let id = self.mint.id_for(&crate::photo::ContentKey::Remote {
            url: url.to_string(),
        });
        self.photos.push(Photo::new_remote(id, url.to_string()));
        true
    }

    /// Drops the whole collection and any in-flight state. Display handles
    /// are released as the photos drop.
    pub fn reset(&mut self) {
        self.photos.clear();
        self.batch = None;
        self.editing = None;
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Batch intake
    // ─────────────────────────────────────────────────────────────────────────

    /// Accepts a dropped or picked batch. Dedupes candidates against each
    /// other and the collection, then gates the whole batch on the photo
    /// cap: either every deduped candidate fits or none is queued.
    pub fn queue_files(&mut self, files: Vec<UploadedFile>) {
        let mut known: HashSet<_> = self.photos.iter().map(|p| p.key()).collect();
        let mut deduped = Vec::new();
        for file in files {
            if known.insert(file.key()) {
                deduped.push(file);
            } else {
                self.notices.push(Notice::DuplicateSkipped);
            }
        }
        if deduped.is_empty() {
            return;
        }
        if self.photos.len() + deduped.len() > self.max_photos {
            self.notices.push(Notice::MaxCountExceeded);
            return;
        }

        let total = deduped.len();
        let queue = deduped.into_iter().collect();
        self.batch = Some(PendingBatch {
            queue,
            total,
            done: 0,
            accepted: 0,
        });
    }

    /// Processes one queued candidate: validate, compress, insert. Driven
    /// once per UI tick so candidates run strictly sequentially and progress
    /// stays visible. Call until `busy()` turns false.
    pub fn tick(&mut self) {
        let Some(batch) = self.batch.as_mut() else {
            return;
        };
        let Some(file) = batch.queue.pop_front() else {
            let accepted = batch.accepted;
            self.batch = None;
            if accepted > 0 {
                self.notices.push(Notice::UploadSucceeded(accepted));
                self.emit_uploads_changed();
            }
            return;
        };
        batch.done += 1;

        match validate(&file.bytes) {
            Ok(_) => {
                let stored = UploadedFile::new(
                    file.name.clone(),
                    compress(&file.bytes),
                    file.modified_ms,
                );
                let meta = match validate(&stored.bytes) {
                    Ok(meta) => Some(meta),
                    // Compression fell back to the already-validated
                    // original, so this cannot reject; keep going regardless.
                    Err(_) => None,
                };
                let id = self.mint.id_for(&stored.key());
                let photo = Photo::new_uploaded(id, stored, meta);
                let insert_at = self
                    .photos
                    .iter()
                    .position(|p| p.persisted)
                    .unwrap_or(self.photos.len());
                self.photos.insert(insert_at, photo);
                if let Some(batch) = self.batch.as_mut() {
                    batch.accepted += 1;
                }
            }
            Err(rejection) => {
                log::info!("dropped candidate {}: {rejection}", file.name);
                self.notices.push(Notice::from(rejection));
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reorder, delete, edit
    // ─────────────────────────────────────────────────────────────────────────

    /// Moves the photo at `from` so it ends up at `to`. No-op when the
    /// indices match, either is out of range, or there is nothing to reorder.
    pub fn move_photo(&mut self, from: usize, to: usize) {
        if from == to
            || from >= self.photos.len()
            || to >= self.photos.len()
            || self.photos.len() < 2
        {
            return;
        }
        let persisted_from = self.remote_position(from);
        let photo = self.photos.remove(from);
        let was_uploaded = photo.is_uploaded();
        self.photos.insert(to, photo);

        if was_uploaded {
            self.emit_uploads_changed();
        } else if let (Some(pf), Some(pt)) = (persisted_from, self.remote_position(to)) {
            // The host owns the authoritative order of persisted images, so
            // it gets indices within its own list.
            self.events.push(HostEvent::ReorderExisting { from: pf, to: pt });
        }
    }

    /// Removes the photo at `index`. Uploaded photos leave through an
    /// updated uploads list; persisted ones through a delete intent carrying
    /// the URL.
    pub fn delete_photo(&mut self, index: usize) {
        if index >= self.photos.len() {
            return;
        }
        let photo = self.photos.remove(index);
        if self.editing == Some(photo.id) {
            self.editing = None;
        }
        match photo.source {
            PhotoSource::Uploaded(_) => self.emit_uploads_changed(),
            PhotoSource::Remote { url } => self.events.push(HostEvent::DeleteExisting(url)),
        }
        // `photo` drops here, releasing its display handle.
    }

    /// Deletes by id, resolving the photo's current index first. For callers
    /// like the confirm dialog whose target was picked in an earlier frame:
    /// reorders move ids, not slots.
    pub fn delete_by_id(&mut self, id: Uuid) {
        if let Some(index) = self.index_of(id) {
            self.delete_photo(index);
        }
    }

    /// Opens the exclusive edit session for the photo at `index`, returning
    /// its id and source bytes. Refuses while another session is open.
    pub fn begin_edit(&mut self, index: usize) -> Option<(Uuid, UploadedFile)> {
        if self.editing.is_some() {
            return None;
        }
        let photo = self.photos.get(index)?;
        let file = photo.uploaded_file()?.clone();
        self.editing = Some(photo.id);
        Some((photo.id, file))
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    /// Replaces the edited photo's payload in place: same id, same position,
    /// new bytes. The new content key is bound to the existing id so future
    /// re-derivations keep it stable.
    pub fn apply_edit(&mut self, id: Uuid, bytes: Vec<u8>, modified_ms: u64) {
        if self.editing != Some(id) {
            log::warn!("edit result for {id} arrived without an open session");
            return;
        }
        self.editing = None;
        let Some(index) = self.index_of(id) else {
            return;
        };
        let photo = &mut self.photos[index];
        let Some(old) = photo.uploaded_file() else {
            return;
        };

        let old_key = old.key();
        let edited = UploadedFile::new(old.name.clone(), bytes, modified_ms);
        // Retire the pre-edit key so re-adding the untouched original file
        // mints a new photo instead of colliding with this one's id.
        self.mint.forget(&old_key);
        self.mint.bind(edited.key(), id);
        photo.meta = validate(&edited.bytes).ok().or(Some(PhotoMeta {
            width: 0,
            height: 0,
            byte_size: edited.size(),
        }));
        photo.source = PhotoSource::Uploaded(edited);
        photo.texture = None; // thumbnail re-created from the new payload
        self.emit_uploads_changed();
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Outbound
    // ─────────────────────────────────────────────────────────────────────────

    pub fn take_events(&mut self) -> Vec<HostEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Reports a failed host callback. Local state is already consistent;
    /// the user just learns the operation did not stick.
    pub fn report_host_failure(&mut self, context: &str, err: &str) {
        log::error!("host callback failed ({context}): {err}");
        self.notices.push(Notice::UploadFailed);
    }

    fn emit_uploads_changed(&mut self) {
        let uploads = self
            .photos
            .iter()
            .filter_map(|p| p.uploaded_file().cloned())
            .collect();
        self.events.push(HostEvent::UploadsChanged(uploads));
    }

    /// Index of the photo within the persisted-only sublist, if persisted.
    fn remote_position(&self, index: usize) -> Option<usize> {
        if !self.photos.get(index)?.persisted {
            return None;
        }
        Some(
            self.photos[..index]
                .iter()
                .filter(|p| p.persisted)
                .count(),
        )
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Display handles
    // ─────────────────────────────────────────────────────────────────────────

    /// Creates missing thumbnail textures. Uploaded photos decode their own
    /// bytes; persisted ones get a placeholder since their pixels live on
    /// the server. A photo whose bytes stopped decoding is dropped with a
    /// diagnostic instead of wedging the strip.
    pub fn ensure_textures(&mut self, ctx: &egui::Context) {
        let mut failed: Vec<Uuid> = Vec::new();
        for photo in &mut self.photos {
            if photo.texture.is_some() {
                continue;
            }
            let label = format!("photo-{}", photo.id);
            match &photo.source {
                PhotoSource::Uploaded(file) => match image::load_from_memory(&file.bytes) {
                    Ok(img) => {
                        let thumb = img.thumbnail(THUMB_MAX_EDGE, THUMB_MAX_EDGE).to_rgba8();
                        let size = [thumb.width() as usize, thumb.height() as usize];
                        let color = egui::ColorImage::from_rgba_unmultiplied(size, &thumb);
                        photo.texture =
                            Some(ctx.load_texture(label, color, egui::TextureOptions::LINEAR));
                    }
                    Err(err) => {
                        log::warn!("skipping {}: thumbnail decode failed: {err}", file.name);
                        failed.push(photo.id);
                    }
                },
                PhotoSource::Remote { .. } => {
                    let color = egui::ColorImage::new([1, 1], COLOR_REMOTE_PLACEHOLDER);
                    photo.texture =
                        Some(ctx.load_texture(label, color, egui::TextureOptions::LINEAR));
                }
            }
        }
        if !failed.is_empty() {
            let dropped_upload = self.photos.iter().any(|p| failed.contains(&p.id) && p.is_uploaded());
            self.photos.retain(|p| !failed.contains(&p.id));
            if dropped_upload {
                self.emit_uploads_changed();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{COMPRESS_THRESHOLD_BYTES, MAX_FILE_BYTES};
    use crate::validate::test_images::noise_png;

    fn valid_file(name: &str, modified_ms: u64) -> UploadedFile {
        let bytes = noise_png(320, 240);
        assert!(bytes.len() < COMPRESS_THRESHOLD_BYTES);
        UploadedFile::new(name.to_string(), bytes, modified_ms)
    }

    fn oversized_file(name: &str) -> UploadedFile {
        UploadedFile::new(name.to_string(), vec![0u8; MAX_FILE_BYTES + 1], 0)
    }

    fn drain(tray: &mut PhotoTray) {
        while tray.busy() {
            tray.tick();
        }
    }

    fn tray_with(files: Vec<UploadedFile>) -> PhotoTray {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.queue_files(files);
        drain(&mut tray);
        tray.take_events();
        tray.take_notices();
        tray
    }

    fn ids(tray: &PhotoTray) -> Vec<Uuid> {
        tray.photos().iter().map(|p| p.id).collect()
    }

    #[test]
    fn valid_batch_grows_collection_by_batch_size() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.queue_files(vec![valid_file("a.png", 1), valid_file("b.png", 2)]);
        drain(&mut tray);

        assert_eq!(tray.len(), 2);
        let notices = tray.take_notices();
        assert!(notices.contains(&Notice::UploadSucceeded(2)));
        let events = tray.take_events();
        assert!(matches!(
            events.last(),
            Some(HostEvent::UploadsChanged(list)) if list.len() == 2
        ));
    }

    #[test]
    fn oversized_candidate_is_rejected_and_batch_continues() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.queue_files(vec![
            valid_file("a.png", 1),
            oversized_file("huge.jpg"),
            valid_file("c.png", 3),
        ]);
        drain(&mut tray);

        assert_eq!(tray.len(), 2);
        let notices = tray.take_notices();
        assert_eq!(
            notices
                .iter()
                .filter(|n| **n == Notice::FileTooLarge)
                .count(),
            1
        );
    }

    #[test]
    fn batch_beyond_max_count_is_rejected_whole() {
        let mut tray = PhotoTray::new(2);
        tray.queue_files(vec![valid_file("a.png", 1), valid_file("b.png", 2)]);
        drain(&mut tray);
        tray.take_notices();

        tray.queue_files(vec![valid_file("c.png", 3)]);
        drain(&mut tray);

        assert_eq!(tray.len(), 2);
        assert!(tray.take_notices().contains(&Notice::MaxCountExceeded));
    }

    #[test]
    fn same_key_twice_in_one_batch_adds_one_photo() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.queue_files(vec![valid_file("same.png", 7), valid_file("same.png", 7)]);
        drain(&mut tray);

        assert_eq!(tray.len(), 1);
        assert!(tray.take_notices().contains(&Notice::DuplicateSkipped));
    }

    #[test]
    fn move_is_a_no_op_for_bad_indices() {
        let mut tray = tray_with(vec![valid_file("a.png", 1), valid_file("b.png", 2)]);
        let before = ids(&tray);

        tray.move_photo(0, 0);
        tray.move_photo(0, 5);
        tray.move_photo(5, 0);

        assert_eq!(ids(&tray), before);
        assert!(tray.take_events().is_empty());
    }

    #[test]
    fn move_zero_to_two_rotates_left() {
        let mut tray = tray_with(vec![
            valid_file("a.png", 1),
            valid_file("b.png", 2),
            valid_file("c.png", 3),
        ]);
        let [a, b, c]: [Uuid; 3] = ids(&tray).try_into().unwrap();

        tray.move_photo(0, 2);
        assert_eq!(ids(&tray), vec![b, c, a]);
    }

    #[test]
    fn move_then_inverse_move_restores_order_and_ids() {
        let mut tray = tray_with(vec![
            valid_file("a.png", 1),
            valid_file("b.png", 2),
            valid_file("c.png", 3),
        ]);
        let before = ids(&tray);

        tray.move_photo(0, 2);
        tray.move_photo(2, 0);
        assert_eq!(ids(&tray), before);
    }

    #[test]
    fn moving_a_persisted_photo_emits_host_relative_indices() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.seed_remotes(&[
            "https://img.example/1.jpg".to_string(),
            "https://img.example/2.jpg".to_string(),
        ]);
        tray.queue_files(vec![valid_file("a.png", 1)]);
        drain(&mut tray);
        tray.take_events();

        // Unified order: [a.png, 1.jpg, 2.jpg]; swap the two remotes.
        tray.move_photo(1, 2);
        let events = tray.take_events();
        assert!(matches!(
            events.as_slice(),
            [HostEvent::ReorderExisting { from: 0, to: 1 }]
        ));
    }

    #[test]
    fn delete_removes_exactly_one_and_preserves_order() {
        let mut tray = tray_with(vec![
            valid_file("a.png", 1),
            valid_file("b.png", 2),
            valid_file("c.png", 3),
        ]);
        let before = ids(&tray);

        tray.delete_photo(1);
        assert_eq!(tray.len(), 2);
        assert_eq!(ids(&tray), vec![before[0], before[2]]);
        assert!(matches!(
            tray.take_events().as_slice(),
            [HostEvent::UploadsChanged(list)] if list.len() == 2
        ));
    }

    #[test]
    fn deleting_a_persisted_photo_emits_its_url() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.seed_remotes(&["https://img.example/1.jpg".to_string()]);

        tray.delete_photo(0);
        assert!(tray.is_empty());
        assert!(matches!(
            tray.take_events().as_slice(),
            [HostEvent::DeleteExisting(url)] if url == "https://img.example/1.jpg"
        ));
    }

    #[test]
    fn edit_replaces_payload_in_place_keeping_id_and_position() {
        let mut tray = tray_with(vec![
            valid_file("a.png", 1),
            valid_file("b.png", 2),
            valid_file("c.png", 3),
        ]);
        let before = ids(&tray);

        let (id, _) = tray.begin_edit(1).unwrap();
        assert_eq!(id, before[1]);

        let edited = noise_png(256, 256);
        tray.apply_edit(id, edited.clone(), 99);

        assert_eq!(ids(&tray), before);
        let photo = tray.get(1).unwrap();
        assert_eq!(&**photo.uploaded_file().unwrap().bytes, &edited);
    }

    #[test]
    fn edit_sessions_are_exclusive() {
        let mut tray = tray_with(vec![valid_file("a.png", 1), valid_file("b.png", 2)]);
        let first = tray.begin_edit(0);
        assert!(first.is_some());
        assert!(tray.begin_edit(1).is_none());

        tray.cancel_edit();
        assert!(tray.begin_edit(1).is_some());
    }

    #[test]
    fn persisted_photos_cannot_be_edited() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.seed_remotes(&["https://img.example/1.jpg".to_string()]);
        assert!(tray.begin_edit(0).is_none());
        // A refused edit must not leave the exclusive slot occupied.
        tray.queue_files(vec![valid_file("a.png", 1)]);
        drain(&mut tray);
        assert!(tray.begin_edit(0).is_some());
    }

    #[test]
    fn small_compressed_uploads_keep_their_exact_bytes() {
        let file = valid_file("a.png", 1);
        let original = file.bytes.clone();
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.queue_files(vec![file]);
        drain(&mut tray);

        let stored = tray.get(0).unwrap().uploaded_file().unwrap();
        assert_eq!(&*stored.bytes, &*original);
    }

    #[test]
    fn reuploading_the_original_of_an_edited_photo_gets_its_own_id() {
        let original = valid_file("a.png", 1);
        let mut tray = tray_with(vec![original.clone()]);
        let (id, _) = tray.begin_edit(0).unwrap();
        tray.apply_edit(id, noise_png(256, 256), 99);

        // The file on disk never changed, so the exact same candidate can
        // come back through the picker.
        tray.queue_files(vec![original]);
        drain(&mut tray);

        assert_eq!(tray.len(), 2);
        let got = ids(&tray);
        assert_ne!(got[0], got[1]);
    }

    #[test]
    fn delete_by_id_survives_a_reorder_of_the_strip() {
        let mut tray = tray_with(vec![valid_file("a.png", 1), valid_file("b.png", 2)]);
        let doomed = tray.get(1).unwrap().id;

        // The slot the target was picked in no longer holds it.
        tray.move_photo(0, 1);
        tray.delete_by_id(doomed);

        assert_eq!(tray.len(), 1);
        assert!(tray.index_of(doomed).is_none());
    }

    #[test]
    fn rederive_with_unchanged_inputs_keeps_ids_and_order() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.seed_remotes(&["https://img.example/1.jpg".to_string()]);
        tray.queue_files(vec![valid_file("a.png", 1), valid_file("b.png", 2)]);
        drain(&mut tray);
        let uploads: Vec<UploadedFile> = tray
            .photos()
            .iter()
            .filter_map(|p| p.uploaded_file().cloned())
            .collect();
        let before = ids(&tray);

        tray.rederive(&uploads, &["https://img.example/1.jpg".to_string()]);
        assert_eq!(ids(&tray), before);

        tray.move_photo(0, 1);
        let reordered = ids(&tray);
        tray.rederive(&uploads, &["https://img.example/1.jpg".to_string()]);
        assert_eq!(ids(&tray), reordered);
    }

    #[test]
    fn reset_clears_collection_and_sessions() {
        let mut tray = tray_with(vec![valid_file("a.png", 1)]);
        assert!(tray.begin_edit(0).is_some());

        tray.reset();
        assert!(tray.is_empty());
        assert!(!tray.busy());
        // The exclusive edit slot is free again.
        tray.queue_files(vec![valid_file("b.png", 2)]);
        drain(&mut tray);
        assert!(tray.begin_edit(0).is_some());
    }

    #[test]
    fn progress_is_monotonic_across_a_batch() {
        let mut tray = PhotoTray::new(MAX_PHOTOS);
        tray.queue_files(vec![
            valid_file("a.png", 1),
            oversized_file("huge.jpg"),
            valid_file("c.png", 3),
        ]);

        let mut last = 0.0f32;
        while tray.busy() {
            tray.tick();
            if let Some(p) = tray.progress() {
                assert!(p >= last);
                last = p;
            }
        }
        assert!(last >= 1.0 - f32::EPSILON);
    }
}
