use serde::{Deserialize, Serialize};

/// Broadcast state reported by the metadata probe.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LiveStatus {
    #[default]
    None,
    Live,
    WasLive,
    Upcoming,
}

/// Descriptive metadata from a single probe. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaInfo {
    pub title: String,
    pub artist: String,
    pub duration_seconds: Option<u64>,
    pub live_status: LiveStatus,
    pub thumbnail_url: Option<String>,
}

impl MediaInfo {
    pub fn display_duration(&self) -> String {
        display_duration(self.duration_seconds, self.live_status)
    }

    pub fn is_live(&self) -> bool {
        self.live_status == LiveStatus::Live
    }

    pub fn was_live(&self) -> bool {
        self.live_status == LiveStatus::WasLive
    }
}

/// Human duration: `LIVE`, `UPCOMING`, `m:ss`, or `N/A` when unknown.
pub fn display_duration(seconds: Option<u64>, live: LiveStatus) -> String {
    match (live, seconds) {
        (LiveStatus::Live | LiveStatus::WasLive, _) => "LIVE".into(),
        (LiveStatus::Upcoming, _) => "UPCOMING".into(),
        (LiveStatus::None, Some(secs)) if secs > 0 => format!("{}:{:02}", secs / 60, secs % 60),
        (LiveStatus::None, _) => "N/A".into(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    #[rstest]
    #[case(Some(125), LiveStatus::None, "2:05")]
    #[case(Some(59), LiveStatus::None, "0:59")]
    #[case(Some(3725), LiveStatus::None, "62:05")]
    #[case(Some(0), LiveStatus::None, "N/A")]
    #[case(None, LiveStatus::None, "N/A")]
    #[case(None, LiveStatus::Live, "LIVE")]
    #[case(Some(4000), LiveStatus::WasLive, "LIVE")]
    #[case(None, LiveStatus::Upcoming, "UPCOMING")]
    fn formats_duration(
        #[case] secs: Option<u64>,
        #[case] live: LiveStatus,
        #[case] expected: &str,
    ) {
        assert_eq!(display_duration(secs, live), expected);
    }
}
