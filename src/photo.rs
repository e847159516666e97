use eframe::egui;
use std::sync::Arc;
use uuid::Uuid;

/// Identity key a photo keeps across re-derivations of the collection.
///
/// Uploads are keyed by what the picker reports about the file, remotes by
/// their URL. The two live in separate namespaces so a remote can never
/// collide with an upload.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContentKey {
    Upload {
        name: String,
        size: usize,
        modified_ms: u64,
    },
    Remote {
        url: String,
    },
}

/// An uploaded file as the host form sees it: name, raw bytes, and the
/// modification timestamp the picker reported. Bytes are shared so the list
/// handed outward and the photo in the tray point at the same allocation.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub name: String,
    pub bytes: Arc<Vec<u8>>,
    pub modified_ms: u64,
}

impl UploadedFile {
    pub fn new(name: String, bytes: Vec<u8>, modified_ms: u64) -> Self {
        Self {
            name,
            bytes: Arc::new(bytes),
            modified_ms,
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    pub fn key(&self) -> ContentKey {
        ContentKey::Upload {
            name: self.name.clone(),
            size: self.size(),
            modified_ms: self.modified_ms,
        }
    }
}

/// Where a photo's payload lives: local bytes fresh from the picker, or a
/// URL of an image already persisted by the backend.
#[derive(Clone, Debug)]
pub enum PhotoSource {
    Uploaded(UploadedFile),
    Remote { url: String },
}

/// Decoded facts about a photo, filled in once validation has seen it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PhotoMeta {
    pub width: u32,
    pub height: u32,
    pub byte_size: usize,
}

/// One entry in the ordered photo collection. The id is minted once per
/// content key and survives reorder, re-derivation, and in-place edits.
pub struct Photo {
    pub id: Uuid,
    pub source: PhotoSource,
    /// True for photos the backend already stores.
    pub persisted: bool,
    pub meta: Option<PhotoMeta>,
    /// Display handle for the thumbnail. Dropping the photo drops the
    /// handle, which releases the texture.
    pub texture: Option<egui::TextureHandle>,
}

impl Photo {
    pub fn new_uploaded(id: Uuid, file: UploadedFile, meta: Option<PhotoMeta>) -> Self {
        Self {
            id,
            source: PhotoSource::Uploaded(file),
            persisted: false,
            meta,
            texture: None,
        }
    }

    pub fn new_remote(id: Uuid, url: String) -> Self {
        Self {
            id,
            source: PhotoSource::Remote { url },
            persisted: true,
            meta: None,
            texture: None,
        }
    }

    pub fn key(&self) -> ContentKey {
        match &self.source {
            PhotoSource::Uploaded(file) => file.key(),
            PhotoSource::Remote { url } => ContentKey::Remote { url: url.clone() },
        }
    }

    pub fn is_uploaded(&self) -> bool {
        matches!(self.source, PhotoSource::Uploaded(_))
    }

    pub fn uploaded_file(&self) -> Option<&UploadedFile> {
        match &self.source {
            PhotoSource::Uploaded(file) => Some(file),
            PhotoSource::Remote { .. } => None,
        }
    }

    pub fn remote_url(&self) -> Option<&str> {
        match &self.source {
            PhotoSource::Uploaded(_) => None,
            PhotoSource::Remote { url } => Some(url),
        }
    }

    /// Short label shown under the tile: file name, or the last path
    /// segment of the URL.
    pub fn label(&self) -> &str {
        match &self.source {
            PhotoSource::Uploaded(file) => &file.name,
            PhotoSource::Remote { url } => url.rsplit('/').next().unwrap_or(url),
        }
    }
}
