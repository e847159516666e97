//! User-facing message categories and the transient toast queue.
//!
//! Categories are enumerated here in one place so a localization layer can
//! map them later; everywhere else in the app passes the variant around.

use crate::constants::TOAST_TTL;
use crate::validate::PhotoRejection;
use std::time::Instant;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    FileTooLarge,
    FileTooSmall,
    InvalidType,
    BelowMinimumDimensions,
    CorruptImage,
    DuplicateSkipped,
    MaxCountExceeded,
    UploadSucceeded(usize),
    UploadFailed,
}

impl Notice {
    pub fn message(&self) -> String {
        match self {
            Notice::FileTooLarge => "Photo is larger than 5 MB".to_string(),
            Notice::FileTooSmall => "Photo is smaller than 5 KB".to_string(),
            Notice::InvalidType => "Only JPEG, PNG and WebP photos are supported".to_string(),
            Notice::BelowMinimumDimensions => {
                "Photo must be at least 200×200 pixels".to_string()
            }
            Notice::CorruptImage => "File could not be read as an image".to_string(),
            Notice::DuplicateSkipped => "Skipped a photo that was already added".to_string(),
            Notice::MaxCountExceeded => "Too many photos for one listing".to_string(),
            Notice::UploadSucceeded(count) => {
                if *count == 1 {
                    "Added 1 photo".to_string()
                } else {
                    format!("Added {count} photos")
                }
            }
            Notice::UploadFailed => "Something went wrong, photo not saved".to_string(),
        }
    }

    pub fn is_error(&self) -> bool {
        !matches!(self, Notice::UploadSucceeded(_))
    }
}

impl From<PhotoRejection> for Notice {
    fn from(rejection: PhotoRejection) -> Self {
        match rejection {
            PhotoRejection::TooLarge => Notice::FileTooLarge,
            PhotoRejection::TooSmall => Notice::FileTooSmall,
            PhotoRejection::InvalidType => Notice::InvalidType,
            PhotoRejection::BelowMinimumDimensions => Notice::BelowMinimumDimensions,
            PhotoRejection::Corrupt => Notice::CorruptImage,
        }
    }
}

/// Fixed-lifetime toasts rendered in a screen corner.
#[derive(Default)]
pub struct Toasts {
    entries: Vec<(Notice, Instant)>,
}

impl Toasts {
    pub fn push(&mut self, notice: Notice) {
        self.entries.push((notice, Instant::now()));
    }

    /// Drops expired entries and returns the live ones, oldest first.
    pub fn fresh(&mut self) -> impl Iterator<Item = &Notice> {
        self.entries
            .retain(|(_, born)| born.elapsed() < TOAST_TTL);
        self.entries.iter().map(|(notice, _)| notice)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
