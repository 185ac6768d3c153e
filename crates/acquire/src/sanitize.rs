/// Characters that are unsafe in filenames on common filesystems.
const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Turn a media title into a filesystem-safe stem: forbidden characters
/// dropped, whitespace runs collapsed to a single `_`. Blank results fall
/// back to `Untitled_<unix_ts>`.
pub fn sanitize_filename(title: &str, unix_ts: u64) -> String {
    let cleaned: String = title
        .chars()
        .filter(|c| !FORBIDDEN.contains(c) && (c.is_whitespace() || !c.is_control()))
        .collect();
    let joined = cleaned.split_whitespace().collect::<Vec<_>>().join("_");
    if joined.is_empty() {
        format!("Untitled_{unix_ts}")
    } else {
        joined
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case("Song A", "Song_A")]
    #[case("  AC/DC:  Back in Black? ", "ACDC_Back_in_Black")]
    #[case("a\tb\nc", "a_b_c")]
    #[case("Ünïcode – ok", "Ünïcode_–_ok")]
    #[case("<>:\"/\\|?*", "Untitled_42")]
    #[case("", "Untitled_42")]
    fn sanitizes(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(sanitize_filename(input, 42), expected);
    }
}
