//! E-book and audiobook asset management.
//!
//! Splits into three concerns: upload validation (file extensions and
//! filename sanitization), the filesystem asset store, and the `Ebook`
//! metadata aggregate.

pub mod ebook;
pub mod filename;
pub mod store;

pub use ebook::{
    DeleteEbook, Ebook, EbookCommand, EbookDeleted, EbookEdited, EbookEvent, EbookId,
    EbookUploaded, EditEbook, UploadEbook, PLACEHOLDER_COVER_URL,
};
pub use filename::{file_extension, is_allowed_audio, is_allowed_ebook, sanitize_filename};
pub use store::{AssetError, AssetFolder, AssetStore, FsAssetStore};
