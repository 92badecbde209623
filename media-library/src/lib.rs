//! # Media Library
//!
//! Local storage for photos and videos captured in the field.
//!
//! This crate provides:
//! - The `media` table and its schema versioning
//! - Capture storage with the original payload kept until the upload is confirmed
//! - Synchronous thumbnail generation (WebP)
//! - Scoped display handles that materialize local blobs for rendering
//!
//! Sync bookkeeping columns live on the media rows, but deciding *when* a
//! row changes state is left to the sync engine in the application crate.
//!
//! ## Example Usage
//!
//! ```rust,ignore
//! use media_library::{MediaLibraryConfig, MediaLibraryService};
//!
//! let service = MediaLibraryService::new(MediaLibraryConfig::default());
//! let media = service.insert_media(&conn, new_media, now_ms)?;
//! ```

pub mod display;
pub mod models;
pub mod schema;
pub mod service;
pub mod thumbnail;

pub use display::DisplayHandle;
pub use models::{LocalMedia, MediaLibraryConfig, MediaSyncStatus, MediaType, NewMedia};
pub use schema::init_media_schema;
pub use service::{MediaLibraryError, MediaLibraryService, MediaResult};
pub use thumbnail::{create_thumbnail, image_dimensions, ThumbnailError};
