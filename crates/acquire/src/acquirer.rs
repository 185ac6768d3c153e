use std::{path::Path, sync::Arc};

use {
    tokio::time::timeout,
    tracing::{debug, info, warn},
};

use crate::{
    error::{AcquisitionError, SourceError, SourceErrorKind},
    info::MediaInfo,
    pacing::{BackoffPolicy, IdentityPicker, JitterBackoff, RandomIdentity},
    request::MediaRequest,
    source::{AttemptPlan, FetchedAudio, MediaSearch, MediaSource},
    strategy::{AcquisitionStrategy, StrategySet},
};

/// Audio plus everything known about it. Owned by one pipeline run.
#[derive(Debug, Clone)]
pub struct AcquisitionResult {
    pub audio_bytes: Vec<u8>,
    pub mime_type: String,
    pub info: MediaInfo,
    /// Resolved URL the audio came from.
    pub source_url: String,
    /// Name of the strategy whose attempt succeeded.
    pub strategy_used: String,
    /// Attempts consumed, including the successful one.
    pub attempt_count: u32,
}

/// Resolves a [`MediaRequest`] to audio bytes, retrying across strategies.
pub struct MediaAcquirer {
    search: Arc<dyn MediaSearch>,
    source: Arc<dyn MediaSource>,
    strategies: StrategySet,
    max_attempts: u32,
    user_agents: Vec<String>,
    backoff: Arc<dyn BackoffPolicy>,
    identity: Arc<dyn IdentityPicker>,
}

impl MediaAcquirer {
    /// Defaults: 3 attempts, 1-3 s jitter, random identity, no UA pool.
    pub fn new(
        search: Arc<dyn MediaSearch>,
        source: Arc<dyn MediaSource>,
        strategies: StrategySet,
    ) -> Self {
        Self {
            search,
            source,
            strategies,
            max_attempts: 3,
            user_agents: Vec::new(),
            backoff: Arc::new(JitterBackoff::from_millis(1_000, 3_000)),
            identity: Arc::new(RandomIdentity),
        }
    }

    /// Clamped to at least one attempt.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_user_agents(mut self, pool: Vec<String>) -> Self {
        self.user_agents = pool;
        self
    }

    pub fn with_backoff(mut self, backoff: Arc<dyn BackoffPolicy>) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_identity(mut self, identity: Arc<dyn IdentityPicker>) -> Self {
        self.identity = identity;
        self
    }

    pub fn strategies(&self) -> &StrategySet {
        &self.strategies
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Run search → probe → attempts. Intermediate files live in `scratch_dir`.
    pub async fn acquire(
        &self,
        request: &MediaRequest,
        scratch_dir: &Path,
    ) -> Result<AcquisitionResult, AcquisitionError> {
        let url = self.resolve(request).await?;

        let info = self
            .source
            .probe(&url)
            .await
            .map_err(AcquisitionError::MetadataProbeFailed)?;
        debug!(url = %url, title = %info.title, live = ?info.live_status, "metadata probed");

        let mut last_error = SourceError::transient("no attempt was made");
        for attempt in 0..self.max_attempts {
            if attempt > 0 {
                let delay = self.backoff.delay(attempt);
                if !delay.is_zero() {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "pausing before next attempt");
                    tokio::time::sleep(delay).await;
                }
            }

            let (index, strategy) = self.strategies.for_attempt(attempt);
            let user_agent = match strategy.user_agent.clone() {
                Some(ua) => Some(ua),
                None => self.identity.pick(&self.user_agents, attempt),
            };

            let attempt_dir = scratch_dir.join(format!("attempt-{}", attempt + 1));
            match self
                .try_formats(&url, strategy, user_agent.as_deref(), &attempt_dir)
                .await
            {
                Ok(audio) => {
                    info!(
                        url = %url,
                        strategy = %strategy.name,
                        attempt = attempt + 1,
                        bytes = audio.bytes.len(),
                        "audio acquired"
                    );
                    return Ok(AcquisitionResult {
                        audio_bytes: audio.bytes,
                        mime_type: audio.mime_type,
                        info,
                        source_url: url,
                        strategy_used: strategy.name.clone(),
                        attempt_count: attempt + 1,
                    });
                },
                Err(e) => {
                    warn!(
                        url = %url,
                        strategy = %strategy.name,
                        strategy_index = index,
                        attempt = attempt + 1,
                        kind = %e.kind,
                        error = %e.message,
                        "acquisition attempt failed"
                    );
                    last_error = e;
                },
            }
        }

        Err(AcquisitionError::AllStrategiesFailed {
            attempts: self.max_attempts,
            blocked: last_error.is_blocked(),
            last_error,
        })
    }

    async fn resolve(&self, request: &MediaRequest) -> Result<String, AcquisitionError> {
        match request {
            MediaRequest::Url(url) => Ok(url.clone()),
            MediaRequest::Query(query) => {
                let found = self
                    .search
                    .search(query)
                    .await
                    .map_err(AcquisitionError::SearchFailed)?;
                match found {
                    Some(url) => {
                        debug!(query = %query, url = %url, "search resolved");
                        Ok(url)
                    },
                    None => Err(AcquisitionError::NotFound {
                        query: query.clone(),
                    }),
                }
            },
        }
    }

    /// One attempt: walk the format chain, advancing only on unsupported formats.
    /// Each fetch gets its own subfolder of `attempt_dir` and is bounded by
    /// the strategy timeout.
    async fn try_formats(
        &self,
        url: &str,
        strategy: &AcquisitionStrategy,
        user_agent: Option<&str>,
        attempt_dir: &Path,
    ) -> Result<FetchedAudio, SourceError> {
        let mut last = SourceError::unsupported_format(format!(
            "strategy '{}' has no format tokens",
            strategy.name
        ));
        for (i, format) in strategy.formats.iter().enumerate() {
            let plan = AttemptPlan {
                strategy,
                user_agent,
                format,
            };
            let fetch_dir = attempt_dir.join(format!("format-{}", i + 1));
            tokio::fs::create_dir_all(&fetch_dir).await.map_err(|e| {
                SourceError::transient(format!("failed to create {}: {e}", fetch_dir.display()))
            })?;
            let fetched = timeout(
                strategy.timeout,
                self.source.fetch_audio(url, &plan, &fetch_dir),
            )
            .await
            .unwrap_or_else(|_| {
                Err(SourceError::transient(format!(
                    "strategy '{}' timed out after {}s",
                    strategy.name,
                    strategy.timeout.as_secs_f64()
                )))
            });
            match fetched {
                Ok(audio) => return Ok(audio),
                Err(e) if e.kind == SourceErrorKind::UnsupportedFormat => {
                    debug!(strategy = %strategy.name, format = %format, "format unavailable, trying next");
                    last = e;
                },
                Err(e) => return Err(e),
            }
        }
        Err(last)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, path::PathBuf, sync::Mutex, time::Duration};

    use {async_trait::async_trait, tunepress_config::NetworkPosture};

    use {
        super::*,
        crate::{info::LiveStatus, pacing::NoDelay},
    };

    /// Records every fetch call and answers from a script, in order.
    struct ScriptedSource {
        search_result: Option<String>,
        probe: Result<MediaInfo, SourceError>,
        script: Mutex<VecDeque<Result<FetchedAudio, SourceError>>>,
        calls: Mutex<Vec<(String, String, Option<String>)>>,
        dirs: Mutex<Vec<PathBuf>>,
        /// Fetch calls (0-based) that never answer.
        hang_on: Vec<usize>,
    }

    impl ScriptedSource {
        fn new(script: Vec<Result<FetchedAudio, SourceError>>) -> Self {
            Self {
                search_result: Some("https://youtu.be/U".into()),
                probe: Ok(song_a()),
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
                dirs: Mutex::new(Vec::new()),
                hang_on: Vec::new(),
            }
        }

        fn calls(&self) -> Vec<(String, String, Option<String>)> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MediaSearch for ScriptedSource {
        async fn search(&self, _query: &str) -> Result<Option<String>, SourceError> {
            Ok(self.search_result.clone())
        }
    }

    #[async_trait]
    impl MediaSource for ScriptedSource {
        async fn probe(&self, _url: &str) -> Result<MediaInfo, SourceError> {
            self.probe.clone()
        }

        async fn fetch_audio(
            &self,
            _url: &str,
            plan: &AttemptPlan<'_>,
            scratch_dir: &Path,
        ) -> Result<FetchedAudio, SourceError> {
            let call = {
                let mut dirs = self.dirs.lock().unwrap();
                dirs.push(scratch_dir.to_path_buf());
                dirs.len() - 1
            };
            if self.hang_on.contains(&call) {
                tokio::time::sleep(Duration::from_secs(60)).await;
            }
            self.calls.lock().unwrap().push((
                plan.strategy.name.clone(),
                plan.format.to_string(),
                plan.user_agent.map(str::to_string),
            ));
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(SourceError::transient("script exhausted")))
        }
    }

    fn song_a() -> MediaInfo {
        MediaInfo {
            title: "Song A".into(),
            artist: "Band".into(),
            duration_seconds: Some(125),
            live_status: LiveStatus::None,
            thumbnail_url: None,
        }
    }

    fn strategy(name: &str, formats: &[&str]) -> AcquisitionStrategy {
        AcquisitionStrategy {
            name: name.into(),
            client_profile: name.into(),
            user_agent: None,
            network: NetworkPosture::default(),
            formats: formats.iter().map(|f| f.to_string()).collect(),
            timeout: Duration::from_secs(30),
        }
    }

    fn audio() -> FetchedAudio {
        FetchedAudio {
            bytes: b"ID3audio".to_vec(),
            mime_type: "audio/mpeg".into(),
        }
    }

    fn acquirer(source: &Arc<ScriptedSource>, strategies: Vec<AcquisitionStrategy>) -> MediaAcquirer {
        MediaAcquirer::new(
            source.clone(),
            source.clone(),
            StrategySet::new(strategies).unwrap(),
        )
        .with_backoff(Arc::new(NoDelay))
    }

    fn three() -> Vec<AcquisitionStrategy> {
        vec![
            strategy("strategy1", &["bestaudio"]),
            strategy("strategy2", &["bestaudio"]),
            strategy("strategy3", &["bestaudio"]),
        ]
    }

    #[tokio::test]
    async fn query_succeeds_on_second_strategy() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::transient("connection reset")),
            Ok(audio()),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let result = acquirer(&source, three())
            .acquire(&MediaRequest::Query("Song A".into()), dir.path())
            .await
            .unwrap();

        assert_eq!(result.attempt_count, 2);
        assert_eq!(result.strategy_used, "strategy2");
        assert_eq!(result.source_url, "https://youtu.be/U");
        assert_eq!(result.info.title, "Song A");
        assert_eq!(result.info.duration_seconds, Some(125));
        assert_eq!(result.audio_bytes, b"ID3audio");
    }

    #[tokio::test]
    async fn exhaustion_reports_all_attempts() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::transient("timeout")),
            Err(SourceError::transient("timeout")),
            Err(SourceError::transient("last timeout")),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let err = acquirer(&source, three())
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap_err();

        match err {
            AcquisitionError::AllStrategiesFailed {
                attempts,
                last_error,
                blocked,
            } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error.message, "last timeout");
                assert!(!blocked);
            },
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(source.calls().len(), 3);
    }

    #[tokio::test]
    async fn attempts_cycle_when_budget_exceeds_strategies() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::transient("a")),
            Err(SourceError::transient("b")),
            Err(SourceError::transient("c")),
            Ok(audio()),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let result = acquirer(&source, vec![
            strategy("one", &["bestaudio"]),
            strategy("two", &["bestaudio"]),
        ])
        .with_max_attempts(5)
        .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
        .await
        .unwrap();

        assert_eq!(result.attempt_count, 4);
        assert_eq!(result.strategy_used, "two");
        let used: Vec<_> = source.calls().into_iter().map(|c| c.0).collect();
        assert_eq!(used, vec!["one", "two", "one", "two"]);
    }

    #[tokio::test]
    async fn blocked_skips_remaining_formats_and_advances_strategy() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::blocked("Sign in to confirm you're not a bot")),
            Ok(audio()),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let result = acquirer(&source, vec![
            strategy("first", &["bestaudio", "best"]),
            strategy("second", &["bestaudio"]),
        ])
        .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
        .await
        .unwrap();

        assert_eq!(result.strategy_used, "second");
        let calls: Vec<_> = source.calls().into_iter().map(|c| (c.0, c.1)).collect();
        assert_eq!(calls, vec![
            ("first".to_string(), "bestaudio".to_string()),
            ("second".to_string(), "bestaudio".to_string()),
        ]);
    }

    #[tokio::test]
    async fn unsupported_format_falls_back_within_attempt() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::unsupported_format("Requested format is not available")),
            Ok(audio()),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let result = acquirer(&source, vec![strategy("only", &["bestaudio[ext=m4a]", "bestaudio"])])
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap();

        assert_eq!(result.attempt_count, 1);
        let formats: Vec<_> = source.calls().into_iter().map(|c| c.1).collect();
        assert_eq!(formats, vec!["bestaudio[ext=m4a]", "bestaudio"]);
    }

    #[tokio::test]
    async fn transient_error_does_not_advance_format() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::transient("reset")),
            Ok(audio()),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let result = acquirer(&source, vec![strategy("only", &["bestaudio", "best"])])
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap();

        assert_eq!(result.attempt_count, 2);
        let formats: Vec<_> = source.calls().into_iter().map(|c| c.1).collect();
        assert_eq!(formats, vec!["bestaudio", "bestaudio"]);
    }

    #[tokio::test]
    async fn blocked_exhaustion_is_flagged() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::transient("reset")),
            Err(SourceError::blocked("HTTP Error 429")),
        ]));
        let dir = tempfile::tempdir().unwrap();
        let err = acquirer(&source, three())
            .with_max_attempts(2)
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), tunepress_common::FailureKind::Blocked);
    }

    #[tokio::test]
    async fn empty_search_is_not_found() {
        let mut source = ScriptedSource::new(vec![Ok(audio())]);
        source.search_result = None;
        let source = Arc::new(source);
        let dir = tempfile::tempdir().unwrap();
        let err = acquirer(&source, three())
            .acquire(&MediaRequest::Query("nothing".into()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::NotFound { ref query } if query == "nothing"));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn probe_failure_is_fatal() {
        let mut source = ScriptedSource::new(vec![Ok(audio())]);
        source.probe = Err(SourceError::transient("video unavailable"));
        let source = Arc::new(source);
        let dir = tempfile::tempdir().unwrap();
        let err = acquirer(&source, three())
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, AcquisitionError::MetadataProbeFailed(_)));
        assert!(source.calls().is_empty());
    }

    #[tokio::test]
    async fn fixed_user_agent_wins_over_pool() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::transient("x")),
            Ok(audio()),
        ]));
        let mut fixed = strategy("fixed", &["bestaudio"]);
        fixed.user_agent = Some("Fixed/1.0".into());
        let dir = tempfile::tempdir().unwrap();
        acquirer(&source, vec![strategy("pooled", &["bestaudio"]), fixed])
            .with_user_agents(vec!["Pool/1.0".into()])
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap();

        let agents: Vec<_> = source.calls().into_iter().map(|c| c.2).collect();
        assert_eq!(agents, vec![
            Some("Pool/1.0".to_string()),
            Some("Fixed/1.0".to_string())
        ]);
    }

    /// Remembers which attempts asked for a pause.
    #[derive(Default)]
    struct RecordingBackoff {
        asked: Mutex<Vec<u32>>,
    }

    impl BackoffPolicy for RecordingBackoff {
        fn delay(&self, attempt: u32) -> Duration {
            self.asked.lock().unwrap().push(attempt);
            Duration::from_millis(1)
        }
    }

    #[tokio::test]
    async fn pauses_between_attempts_but_not_before_the_first() {
        let source = Arc::new(ScriptedSource::new(vec![]));
        let backoff = Arc::new(RecordingBackoff::default());
        let dir = tempfile::tempdir().unwrap();
        let err = acquirer(&source, three())
            .with_backoff(backoff.clone())
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, AcquisitionError::AllStrategiesFailed { attempts: 3, .. }));
        assert_eq!(*backoff.asked.lock().unwrap(), vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetch_times_out_and_next_strategy_runs() {
        let mut source = ScriptedSource::new(vec![Ok(audio())]);
        source.hang_on = vec![0];
        let source = Arc::new(source);
        let mut one = strategy("one", &["bestaudio"]);
        one.timeout = Duration::from_secs(1);
        let mut two = strategy("two", &["bestaudio"]);
        two.timeout = Duration::from_secs(1);
        let dir = tempfile::tempdir().unwrap();

        let started = tokio::time::Instant::now();
        let result = acquirer(&source, vec![one, two])
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap();

        assert_eq!(result.strategy_used, "two");
        assert_eq!(result.attempt_count, 2);
        assert!(started.elapsed() < Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_fetches_exhaust_as_transient() {
        let mut source = ScriptedSource::new(vec![]);
        source.hang_on = vec![0, 1];
        let source = Arc::new(source);
        let mut only = strategy("only", &["bestaudio"]);
        only.timeout = Duration::from_secs(2);
        let dir = tempfile::tempdir().unwrap();

        let err = acquirer(&source, vec![only])
            .with_max_attempts(2)
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap_err();

        match err {
            AcquisitionError::AllStrategiesFailed { last_error, blocked, .. } => {
                assert_eq!(last_error.kind, SourceErrorKind::Transient);
                assert!(last_error.message.contains("timed out"), "{}", last_error.message);
                assert!(!blocked);
            },
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn every_fetch_gets_a_fresh_scratch_folder() {
        let source = Arc::new(ScriptedSource::new(vec![
            Err(SourceError::unsupported_format("Requested format is not available")),
            Err(SourceError::transient("reset")),
            Ok(audio()),
        ]));
        let dir = tempfile::tempdir().unwrap();
        acquirer(&source, vec![strategy("only", &["bestaudio[ext=m4a]", "bestaudio"])])
            .acquire(&MediaRequest::Url("https://youtu.be/U".into()), dir.path())
            .await
            .unwrap();

        let dirs = source.dirs.lock().unwrap().clone();
        assert_eq!(dirs, vec![
            dir.path().join("attempt-1/format-1"),
            dir.path().join("attempt-1/format-2"),
            dir.path().join("attempt-2/format-1"),
        ]);
        assert!(dirs.iter().all(|d| d.is_dir()));
    }
}
