//! The JSON metadata block carried by every container.

use serde::{Deserialize, Serialize};

/// Metadata block of an M3EW container.
///
/// `image_type` is always serialized (as `null` when the container has no
/// artwork); the live flags are omitted when unknown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerMetadata {
    pub title: String,
    pub artist: String,
    pub audio_type: String,
    pub image_type: Option<String>,
    /// Display duration: `m:ss`, `LIVE`, `UPCOMING` or `N/A`.
    pub duration: String,
    pub source: String,
    /// ISO-8601 timestamp supplied by the caller.
    pub created_at: String,
    pub version: u8,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_live: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub was_live: Option<bool>,
}

/// Best-effort MIME type from leading magic bytes.
pub fn sniff_image_type(data: &[u8]) -> Option<&'static str> {
    if data.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if data.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if data.len() >= 12 && &data[..4] == b"RIFF" && &data[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn sample() -> ContainerMetadata {
        ContainerMetadata {
            title: "Song A".into(),
            artist: "Band".into(),
            audio_type: "audio/mpeg".into(),
            image_type: None,
            duration: "2:05".into(),
            source: "YouTube".into(),
            created_at: "2026-01-02T03:04:05+00:00".into(),
            version: 1,
            is_live: None,
            was_live: None,
        }
    }

    #[test]
    fn null_image_type_is_serialized() {
        let json = serde_json::to_value(sample()).unwrap();
        assert!(json.get("imageType").unwrap().is_null());
        assert!(json.get("isLive").is_none());
        assert_eq!(json["audioType"], "audio/mpeg");
        assert_eq!(json["createdAt"], "2026-01-02T03:04:05+00:00");
    }

    #[test]
    fn live_flags_serialize_when_known() {
        let meta = ContainerMetadata {
            is_live: Some(false),
            was_live: Some(true),
            ..sample()
        };
        let json = serde_json::to_value(meta).unwrap();
        assert_eq!(json["isLive"], false);
        assert_eq!(json["wasLive"], true);
    }

    #[rstest]
    #[case(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0], Some("image/png"))]
    #[case(&[0xFF, 0xD8, 0xFF, 0xE0], Some("image/jpeg"))]
    #[case(b"GIF89a....", Some("image/gif"))]
    #[case(b"RIFF\0\0\0\0WEBPVP8 ", Some("image/webp"))]
    #[case(b"plain", None)]
    fn sniffs(#[case] data: &[u8], #[case] expected: Option<&str>) {
        assert_eq!(sniff_image_type(data), expected);
    }
}
