#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Sound challenge pipeline: capture, decode, analyse and judge a recording.
//!
//! Capture is delegated to an [`AudioCaptureAdapter`]. The pipeline drives it
//! through a chain of suspending calls, hands the decoded waveform to the
//! spectral analyser on the blocking pool and turns the outcome into a
//! [`Command`] the turn engine accepts.

use std::{future::Future, sync::Arc, time::Duration};

use log::{debug, info, warn};
use sound_trail_core::{
    AnalysisResult, ChallengeCategory, Command, DecodedAudio, PipelineError, UnknownCategory,
    Verdict,
};
use sound_trail_system_matcher::SoundMatcher;
use sound_trail_system_spectral::SpectralAnalyzer;

/// Time budget granted to decoding and analysis when none is configured.
pub const DEFAULT_ANALYSIS_TIMEOUT: Duration = Duration::from_millis(2_000);

/// Source of live recordings, typically a microphone.
#[allow(async_fn_in_trait)]
pub trait AudioCaptureAdapter {
    /// Capture in progress.
    type Handle: CaptureHandle;

    /// Starts capturing.
    ///
    /// Fails with [`PipelineError::PermissionDenied`] when access is refused.
    async fn begin(&mut self) -> Result<Self::Handle, PipelineError>;
}

/// Running capture. Implementations release the device when dropped.
#[allow(async_fn_in_trait)]
pub trait CaptureHandle {
    /// Completed recording produced by this capture.
    type Recording: Recording;

    /// Stops capturing and yields the recording.
    async fn stop(self) -> Result<Self::Recording, PipelineError>;
}

/// Opaque captured audio.
#[allow(async_fn_in_trait)]
pub trait Recording {
    /// Decodes the payload into samples.
    async fn decode(&self) -> Result<DecodedAudio, PipelineError>;
}

/// Result of one challenge attempt.
#[derive(Clone, Debug, PartialEq)]
pub enum ChallengeOutcome {
    /// The recording was analysed and judged.
    Judged {
        /// Verdict produced by the matcher.
        verdict: Verdict,
        /// Measurements the verdict was based on.
        analysis: AnalysisResult,
    },
    /// Capture, decoding or analysis failed.
    Failed(PipelineError),
    /// The attempt was abandoned before a verdict.
    Cancelled,
}

impl ChallengeOutcome {
    /// Command that applies this outcome to the turn engine.
    ///
    /// An analysis timeout counts as a non-match; every other failure asks
    /// the player to retry.
    #[must_use]
    pub fn into_command(self) -> Command {
        match self {
            Self::Judged { verdict, .. } => Command::ResolveChallenge { verdict },
            Self::Failed(PipelineError::AnalysisTimeout) => Command::ResolveChallenge {
                verdict: Verdict::no_match(),
            },
            Self::Failed(failure) => Command::ReportChallengeFailure { failure },
            Self::Cancelled => Command::CancelChallenge,
        }
    }
}

/// Drives capture, analysis and matching for a single challenge.
#[derive(Clone, Debug)]
pub struct SoundPipeline {
    analyzer: Arc<SpectralAnalyzer>,
    matcher: SoundMatcher,
    analysis_timeout: Duration,
}

impl SoundPipeline {
    /// Creates a pipeline from its analysis stages.
    #[must_use]
    pub fn new(analyzer: SpectralAnalyzer, matcher: SoundMatcher) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            matcher,
            analysis_timeout: DEFAULT_ANALYSIS_TIMEOUT,
        }
    }

    /// Replaces the time budget for decoding and analysis.
    #[must_use]
    pub fn with_analysis_timeout(mut self, analysis_timeout: Duration) -> Self {
        self.analysis_timeout = analysis_timeout;
        self
    }

    /// Time budget for decoding and analysis.
    #[must_use]
    pub fn analysis_timeout(&self) -> Duration {
        self.analysis_timeout
    }

    /// Matcher used to judge recordings.
    #[must_use]
    pub fn matcher(&self) -> &SoundMatcher {
        &self.matcher
    }

    /// Records from `adapter` until `stop` completes.
    pub async fn record<A, S>(
        &self,
        adapter: &mut A,
        stop: S,
    ) -> Result<<A::Handle as CaptureHandle>::Recording, PipelineError>
    where
        A: AudioCaptureAdapter,
        S: Future<Output = ()>,
    {
        let handle = adapter.begin().await?;
        debug!("capture started");
        stop.await;
        let recording = handle.stop().await?;
        debug!("capture stopped");
        Ok(recording)
    }

    /// Decodes and analyses `recording` within the time budget.
    pub async fn analyze<R: Recording>(
        &self,
        recording: &R,
    ) -> Result<AnalysisResult, PipelineError> {
        match tokio::time::timeout(self.analysis_timeout, self.decode_and_analyze(recording)).await
        {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    "analysis exceeded its {} ms budget",
                    self.analysis_timeout.as_millis()
                );
                Err(PipelineError::AnalysisTimeout)
            }
        }
    }

    async fn decode_and_analyze<R: Recording>(
        &self,
        recording: &R,
    ) -> Result<AnalysisResult, PipelineError> {
        let audio = recording.decode().await?;
        let analyzer = Arc::clone(&self.analyzer);
        tokio::task::spawn_blocking(move || analyzer.analyze(&audio))
            .await
            .map_err(|error| PipelineError::AnalysisInterrupted(error.to_string()))?
    }

    /// Runs a full challenge attempt against `category`.
    ///
    /// Capture ends when `stop` completes. If `cancel` completes first the
    /// attempt is abandoned at whatever stage it reached and the capture
    /// handle, if any, is dropped. Pipeline failures become
    /// [`ChallengeOutcome::Failed`]; only a category without a registered
    /// profile is an error.
    pub async fn attempt<A, S, C>(
        &self,
        adapter: &mut A,
        category: ChallengeCategory,
        stop: S,
        cancel: C,
    ) -> Result<ChallengeOutcome, UnknownCategory>
    where
        A: AudioCaptureAdapter,
        S: Future<Output = ()>,
        C: Future<Output = ()>,
    {
        if self.matcher.profiles().get(category).is_none() {
            return Err(UnknownCategory(category));
        }

        let judged = async {
            let recording = self.record(adapter, stop).await?;
            self.analyze(&recording).await
        };

        tokio::select! {
            biased;
            () = cancel => {
                info!("{category} challenge cancelled");
                Ok(ChallengeOutcome::Cancelled)
            }
            result = judged => match result {
                Ok(analysis) => {
                    let verdict = self.matcher.evaluate(&analysis, category)?;
                    debug!(
                        "{category}: {:.1} Hz for {:.2} s -> {verdict:?}",
                        analysis.dominant_frequency_hz, analysis.duration_secs
                    );
                    Ok(ChallengeOutcome::Judged { verdict, analysis })
                }
                Err(failure) => {
                    warn!("{category} challenge failed: {failure}");
                    Ok(ChallengeOutcome::Failed(failure))
                }
            },
        }
    }
}

impl Default for SoundPipeline {
    fn default() -> Self {
        Self::new(SpectralAnalyzer::default(), SoundMatcher::default())
    }
}
