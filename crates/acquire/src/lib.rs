//! Media acquisition: resolve a request to a source URL, probe its metadata
//! once, then download the audio by cycling through an ordered set of
//! acquisition strategies with format fallback, pacing and identity rotation.

pub mod acquirer;
pub mod error;
pub mod info;
pub mod pacing;
pub mod request;
pub mod sanitize;
pub mod source;
pub mod strategy;
pub mod ytdlp;

pub use {
    acquirer::{AcquisitionResult, MediaAcquirer},
    error::{AcquisitionError, SourceError, SourceErrorKind},
    info::{LiveStatus, MediaInfo, display_duration},
    pacing::{BackoffPolicy, IdentityPicker, JitterBackoff, NoDelay, RandomIdentity, RoundRobinIdentity},
    request::{MediaRequest, validate_source_url},
    source::{AttemptPlan, FetchedAudio, MediaSearch, MediaSource},
    strategy::{AcquisitionStrategy, StrategySet},
    ytdlp::YtDlp,
};
