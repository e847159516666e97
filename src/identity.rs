//! Stable identity for photos across re-derivations of the collection.
//!
//! Ids are minted once per content key and cached for the whole session, so
//! rebuilding the collection from the same inputs always yields the same ids
//! in the same order, and the UI never sees an entry change identity under it.

use crate::photo::{ContentKey, Photo, UploadedFile};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Mint-once id cache. Upload keys and remote URLs are separate namespaces.
#[derive(Default)]
pub struct IdMint {
    upload_ids: HashMap<ContentKey, Uuid>,
    remote_ids: HashMap<String, Uuid>,
}

impl IdMint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached id for the key, minting a fresh one on first sight.
    pub fn id_for(&mut self, key: &ContentKey) -> Uuid {
        match key {
            ContentKey::Upload { .. } => *self
                .upload_ids
                .entry(key.clone())
                .or_insert_with(Uuid::new_v4),
            ContentKey::Remote { url } => *self
                .remote_ids
                .entry(url.clone())
                .or_insert_with(Uuid::new_v4),
        }
    }

    /// Points a new content key at an existing id. Used when an in-place edit
    /// rewrites a photo's bytes: the payload changes, the identity must not.
    pub fn bind(&mut self, key: ContentKey, id: Uuid) {
        match key {
            key @ ContentKey::Upload { .. } => {
                self.upload_ids.insert(key, id);
            }
            ContentKey::Remote { url } => {
                self.remote_ids.insert(url, id);
            }
        }
    }

    /// Drops the cached id for a key, so the next sighting mints fresh.
    /// An edit retires the pre-edit key this way; without it, re-adding the
    /// unchanged original would collide with the edited photo's id.
    pub fn forget(&mut self, key: &ContentKey) {
        match key {
            ContentKey::Upload { .. } => {
                self.upload_ids.remove(key);
            }
            ContentKey::Remote { url } => {
                self.remote_ids.remove(url);
            }
        }
    }
}

/// Merges the host's uploaded files and remote URLs into one ordered
/// collection, reusing ids (and the display handles riding on them) from the
/// prior pass.
///
/// Ordering: entries already known keep their relative order from `prior`;
/// new uploads slot in ahead of the first known remote; new remotes append at
/// the end. Duplicate keys within one pass are skipped, so the first
/// occurrence wins. Unchanged inputs therefore reproduce the prior
/// collection exactly.
pub fn unify(
    mint: &mut IdMint,
    uploads: &[UploadedFile],
    remotes: &[String],
    prior: Vec<Photo>,
) -> Vec<Photo> {
    let mut seen = HashSet::new();
    let mut fresh: Vec<Photo> = Vec::new();

    for file in uploads {
        let key = file.key();
        if !seen.insert(key.clone()) {
            continue;
        }
        let id = mint.id_for(&key);
        fresh.push(Photo::new_uploaded(id, file.clone(), None));
    }
    let upload_count = fresh.len();

    for url in remotes {
        let key = ContentKey::Remote { url: url.clone() };
        if !seen.insert(key) {
            continue;
        }
        let id = mint.id_for(&ContentKey::Remote { url: url.clone() });
        fresh.push(Photo::new_remote(id, url.clone()));
    }

    let fresh_ids: HashSet<Uuid> = fresh.iter().map(|p| p.id).collect();
    let prior_ids: HashSet<Uuid> = prior.iter().map(|p| p.id).collect();

    // Known photos are carried over in their prior order, keeping textures
    // and metadata alive instead of minting duplicates. Photos whose inputs
    // disappeared are dropped here, which releases their display handles.
    let mut known: Vec<Photo> = prior
        .into_iter()
        .filter(|p| fresh_ids.contains(&p.id))
        .collect();

    let mut new_uploads: Vec<Photo> = Vec::new();
    let mut new_remotes: Vec<Photo> = Vec::new();
    for (i, photo) in fresh.into_iter().enumerate() {
        if prior_ids.contains(&photo.id) {
            continue;
        }
        if i < upload_count {
            new_uploads.push(photo);
        } else {
            new_remotes.push(photo);
        }
    }

    let insert_at = known
        .iter()
        .position(|p| p.persisted)
        .unwrap_or(known.len());

    let mut out = Vec::with_capacity(known.len() + new_uploads.len() + new_remotes.len());
    out.extend(known.drain(..insert_at));
    out.extend(new_uploads);
    out.append(&mut known);
    out.extend(new_remotes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(name: &str, len: usize, modified_ms: u64) -> UploadedFile {
        UploadedFile::new(name.to_string(), vec![0u8; len], modified_ms)
    }

    fn shape(photos: &[Photo]) -> Vec<(Uuid, bool)> {
        photos.iter().map(|p| (p.id, p.persisted)).collect()
    }

    #[test]
    fn rederiving_unchanged_inputs_is_idempotent() {
        let mut mint = IdMint::new();
        let uploads = vec![file("a.jpg", 10, 1), file("b.jpg", 20, 2)];
        let remotes = vec!["https://img.example/1.jpg".to_string()];

        let first = unify(&mut mint, &uploads, &remotes, Vec::new());
        let first_shape = shape(&first);
        let second = unify(&mut mint, &uploads, &remotes, first);

        assert_eq!(first_shape, shape(&second));
    }

    #[test]
    fn forgotten_key_mints_a_fresh_id() {
        let mut mint = IdMint::new();
        let key = ContentKey::Upload {
            name: "a.jpg".to_string(),
            size: 10,
            modified_ms: 1,
        };
        let id = mint.id_for(&key);
        mint.forget(&key);
        assert_ne!(mint.id_for(&key), id);
    }

    #[test]
    fn new_uploads_slot_in_before_known_remotes() {
        let mut mint = IdMint::new();
        let remotes = vec!["https://img.example/1.jpg".to_string()];
        let prior = unify(&mut mint, &[], &remotes, Vec::new());

        let uploads = vec![file("a.jpg", 10, 1)];
        let merged = unify(&mut mint, &uploads, &remotes, prior);

        assert_eq!(merged.len(), 2);
        assert!(merged[0].is_uploaded());
        assert!(merged[1].persisted);
    }

    #[test]
    fn prior_reorder_survives_rederivation() {
        let mut mint = IdMint::new();
        let uploads = vec![file("a.jpg", 10, 1), file("b.jpg", 20, 2)];
        let mut prior = unify(&mut mint, &uploads, &[], Vec::new());
        prior.swap(0, 1);
        let swapped = shape(&prior);

        let merged = unify(&mut mint, &uploads, &[], prior);
        assert_eq!(shape(&merged), swapped);
    }

    #[test]
    fn duplicate_keys_in_one_pass_keep_first_occurrence() {
        let mut mint = IdMint::new();
        let uploads = vec![file("a.jpg", 10, 1), file("a.jpg", 10, 1)];
        let merged = unify(&mut mint, &uploads, &[], Vec::new());
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn upload_and_remote_namespaces_are_disjoint() {
        let mut mint = IdMint::new();
        let upload_id = mint.id_for(&ContentKey::Upload {
            name: "x".to_string(),
            size: 1,
            modified_ms: 1,
        });
        let remote_id = mint.id_for(&ContentKey::Remote {
            url: "x".to_string(),
        });
        assert_ne!(upload_id, remote_id);
    }

    #[test]
    fn bound_key_reuses_the_given_id() {
        let mut mint = IdMint::new();
        let key = ContentKey::Upload {
            name: "edited.jpg".to_string(),
            size: 99,
            modified_ms: 42,
        };
        let id = Uuid::new_v4();
        mint.bind(key.clone(), id);
        assert_eq!(mint.id_for(&key), id);
    }
}
