//! Extension ⇄ MIME lookups for audio, artwork and containers.

/// MIME type of a packaged container.
pub const CONTAINER_MIME: &str = "application/x-m3ew";

/// MIME type for a file extension (case-insensitive, without the dot).
pub fn mime_for_extension(ext: &str) -> &'static str {
    match ext.to_ascii_lowercase().as_str() {
        "mp3" => "audio/mpeg",
        "m4a" | "mp4" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" | "oga" => "audio/ogg",
        "opus" => "audio/opus",
        "webm" => "audio/webm",
        "wav" => "audio/wav",
        "flac" => "audio/flac",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        "m3ew" => CONTAINER_MIME,
        _ => "application/octet-stream",
    }
}

/// Preferred file extension for a MIME type.
pub fn extension_for_mime(mime: &str) -> Option<&'static str> {
    let base = mime.split(';').next().unwrap_or(mime).trim();
    match base {
        "audio/mpeg" => Some("mp3"),
        "audio/mp4" => Some("m4a"),
        "audio/aac" => Some("aac"),
        "audio/ogg" => Some("ogg"),
        "audio/opus" => Some("opus"),
        "audio/webm" => Some("webm"),
        "audio/wav" | "audio/x-wav" => Some("wav"),
        "audio/flac" => Some("flac"),
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        CONTAINER_MIME => Some("m3ew"),
        _ => None,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("mp3", "audio/mpeg")]
    #[case("M4A", "audio/mp4")]
    #[case("m3ew", "application/x-m3ew")]
    #[case("bin", "application/octet-stream")]
    fn extension_lookup(#[case] ext: &str, #[case] mime: &str) {
        assert_eq!(mime_for_extension(ext), mime);
    }

    #[test]
    fn mime_lookup_ignores_parameters() {
        assert_eq!(extension_for_mime("audio/mpeg; charset=binary"), Some("mp3"));
        assert_eq!(extension_for_mime("text/plain"), None);
    }
}
