use url::Url;

use crate::error::AcquisitionError;

/// Hosts accepted for direct URL requests (subdomains included).
const ALLOWED_HOSTS: &[&str] = &["youtube.com", "youtu.be"];

/// What to acquire: a free-text search or a direct media URL, never both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaRequest {
    Query(String),
    Url(String),
}

impl MediaRequest {
    /// Build from the optional pair a caller submits. Exactly one must be a
    /// non-blank string; URLs are checked with [`validate_source_url`].
    pub fn from_parts(
        query: Option<String>,
        source_url: Option<String>,
    ) -> Result<Self, AcquisitionError> {
        let query = query.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());
        let source_url = source_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        match (query, source_url) {
            (Some(q), None) => Ok(Self::Query(q)),
            (None, Some(u)) => {
                validate_source_url(&u)?;
                Ok(Self::Url(u))
            },
            (Some(_), Some(_)) => Err(AcquisitionError::invalid_request(
                "provide either a query or a URL, not both",
            )),
            (None, None) => Err(AcquisitionError::invalid_request(
                "a query or a URL is required",
            )),
        }
    }

    /// Text for logs and job names.
    pub fn label(&self) -> &str {
        match self {
            Self::Query(q) => q,
            Self::Url(u) => u,
        }
    }
}

/// Accept only http(s) URLs hosted on a known media domain.
pub fn validate_source_url(raw: &str) -> Result<Url, AcquisitionError> {
    let url = Url::parse(raw)
        .map_err(|e| AcquisitionError::invalid_request(format!("malformed URL: {e}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(AcquisitionError::invalid_request(format!(
            "unsupported URL scheme '{}'",
            url.scheme()
        )));
    }
    let host = url.host_str().unwrap_or_default().to_ascii_lowercase();
    let allowed = ALLOWED_HOSTS
        .iter()
        .any(|h| host == *h || host.ends_with(&format!(".{h}")));
    if !allowed {
        return Err(AcquisitionError::invalid_request(
            "only YouTube URLs are supported",
        ));
    }
    Ok(url)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest, tunepress_common::FailureKind};

    #[rstest]
    #[case("https://www.youtube.com/watch?v=abc")]
    #[case("https://youtu.be/abc")]
    #[case("https://music.youtube.com/watch?v=abc")]
    #[case("http://youtube.com/watch?v=abc")]
    fn accepts_media_hosts(#[case] raw: &str) {
        assert!(validate_source_url(raw).is_ok());
    }

    #[rstest]
    #[case("https://example.com/watch?v=abc")]
    #[case("https://notyoutube.com/x")]
    #[case("ftp://youtube.com/x")]
    #[case("youtube.com/watch")]
    fn rejects_others(#[case] raw: &str) {
        let err = validate_source_url(raw).unwrap_err();
        assert_eq!(err.kind(), FailureKind::InvalidRequest);
    }

    #[test]
    fn exactly_one_of_query_or_url() {
        assert_eq!(
            MediaRequest::from_parts(Some(" Song A ".into()), None).unwrap(),
            MediaRequest::Query("Song A".into())
        );
        assert_eq!(
            MediaRequest::from_parts(Some("".into()), Some("https://youtu.be/x".into())).unwrap(),
            MediaRequest::Url("https://youtu.be/x".into())
        );
        assert!(MediaRequest::from_parts(None, None).is_err());
        assert!(MediaRequest::from_parts(Some("  ".into()), None).is_err());
        assert!(
            MediaRequest::from_parts(Some("a".into()), Some("https://youtu.be/x".into())).is_err()
        );
    }
}
