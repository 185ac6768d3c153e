use std::borrow::Cow;

use crate::{Error, Result, metadata::ContainerMetadata, sniff_image_type};

pub const MAGIC: &[u8; 4] = b"M3EW";
pub const FORMAT_VERSION: u8 = 1;

const IMG_START: &[u8] = b"IMG_START";
const IMG_END: &[u8] = b"IMG_END";
const AUDIO_START: &[u8] = b"AUDIO_START";
const AUDIO_END: &[u8] = b"AUDIO_END";

/// Fixed header size: magic + version + metadata length.
const HEADER_LEN: usize = 9;

/// Fallback when artwork is present but its type is neither declared nor sniffable.
const UNKNOWN_IMAGE_TYPE: &str = "application/octet-stream";

/// Decoded fixed header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: u8,
    pub metadata_len: u32,
}

impl Header {
    /// Parse the 9-byte header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < HEADER_LEN {
            return Err(Error::TooShort { len: data.len() });
        }
        if &data[..4] != MAGIC {
            let mut found = [0u8; 4];
            found.copy_from_slice(&data[..4]);
            return Err(Error::BadMagic { found });
        }
        Ok(Self {
            version: data[4],
            metadata_len: u32::from_le_bytes([data[5], data[6], data[7], data[8]]),
        })
    }
}

/// Sections recovered by [`unpack`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unpacked {
    pub metadata: ContainerMetadata,
    /// `None` when the image section is empty.
    pub image: Option<Vec<u8>>,
    pub audio: Vec<u8>,
}

/// Serialize metadata, artwork and audio into container bytes.
///
/// `image_type` is reconciled with the artwork actually supplied: cleared when
/// there is none, filled in (sniffed) when the caller left it empty. The
/// header version byte mirrors `metadata.version`.
pub fn pack(metadata: &ContainerMetadata, image: Option<&[u8]>, audio: &[u8]) -> Result<Vec<u8>> {
    let image = image.filter(|bytes| !bytes.is_empty());
    let metadata = reconcile_image_type(metadata, image);

    let json = serde_json::to_vec(metadata.as_ref())?;
    let metadata_len =
        u32::try_from(json.len()).map_err(|_| Error::MetadataTooLarge { len: json.len() })?;
    let image = image.unwrap_or_default();

    let mut out = Vec::with_capacity(
        HEADER_LEN
            + json.len()
            + IMG_START.len()
            + image.len()
            + IMG_END.len()
            + AUDIO_START.len()
            + audio.len()
            + AUDIO_END.len(),
    );
    out.extend_from_slice(MAGIC);
    out.push(metadata.version);
    out.extend_from_slice(&metadata_len.to_le_bytes());
    out.extend_from_slice(&json);
    out.extend_from_slice(IMG_START);
    out.extend_from_slice(image);
    out.extend_from_slice(IMG_END);
    out.extend_from_slice(AUDIO_START);
    out.extend_from_slice(audio);
    out.extend_from_slice(AUDIO_END);
    Ok(out)
}

fn reconcile_image_type<'a>(
    metadata: &'a ContainerMetadata,
    image: Option<&[u8]>,
) -> Cow<'a, ContainerMetadata> {
    match (image, metadata.image_type.as_deref()) {
        (None, None) | (Some(_), Some(_)) => Cow::Borrowed(metadata),
        (None, Some(_)) => {
            let mut fixed = metadata.clone();
            fixed.image_type = None;
            Cow::Owned(fixed)
        },
        (Some(bytes), None) => {
            let mut fixed = metadata.clone();
            fixed.image_type = Some(
                sniff_image_type(bytes)
                    .unwrap_or(UNKNOWN_IMAGE_TYPE)
                    .to_string(),
            );
            Cow::Owned(fixed)
        },
    }
}

/// Split container bytes back into metadata, artwork and audio.
///
/// The image section ends at the first `IMG_END AUDIO_START` boundary after
/// `IMG_START`; the audio section runs to the trailing `AUDIO_END`.
pub fn unpack(data: &[u8]) -> Result<Unpacked> {
    let header = Header::parse(data)?;
    let meta_end = HEADER_LEN + header.metadata_len as usize;
    if data.len() < meta_end {
        return Err(Error::TruncatedMetadata {
            declared: header.metadata_len as usize,
            available: data.len() - HEADER_LEN,
        });
    }
    let metadata: ContainerMetadata = serde_json::from_slice(&data[HEADER_LEN..meta_end])?;
    if metadata.version != header.version {
        return Err(Error::VersionMismatch {
            header: header.version,
            metadata: metadata.version,
        });
    }

    let body = &data[meta_end..];
    let body = body
        .strip_prefix(IMG_START)
        .ok_or_else(|| Error::missing_marker("IMG_START"))?;
    let body = body
        .strip_suffix(AUDIO_END)
        .ok_or_else(|| Error::missing_marker("AUDIO_END"))?;

    let boundary = [IMG_END, AUDIO_START].concat();
    let split = find(body, &boundary).ok_or_else(|| Error::missing_marker("IMG_END"))?;
    let image = &body[..split];
    let audio = &body[split + boundary.len()..];

    Ok(Unpacked {
        metadata,
        image: (!image.is_empty()).then(|| image.to_vec()),
        audio: audio.to_vec(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}
