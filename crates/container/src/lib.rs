//! The M3EW container: a versioned bundle of JSON metadata, artwork and audio.
//!
//! ```text
//! "M3EW" | version:u8 | metadata_len:u32le | metadata JSON
//! "IMG_START" image "IMG_END" "AUDIO_START" audio "AUDIO_END"
//! ```
//!
//! [`pack`] and [`unpack`] do no I/O.

pub mod error;
pub mod format;
pub mod metadata;

pub use {
    error::{Error, Result},
    format::{FORMAT_VERSION, Header, MAGIC, Unpacked, pack, unpack},
    metadata::{ContainerMetadata, sniff_image_type},
};
