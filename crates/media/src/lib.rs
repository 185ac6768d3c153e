//! Artwork for containers: best-effort thumbnail download, decode/resize,
//! and re-encoding to a single canonical type (PNG). Also MIME helpers shared
//! by the acquisition and serving layers.

pub mod error;
pub mod image_ops;
pub mod mime;
pub mod thumbnail;

pub use {
    error::{Error, Result},
    image_ops::NormalizedImage,
    thumbnail::{HttpThumbnailFetcher, NoThumbnails, ThumbnailFetcher},
};
