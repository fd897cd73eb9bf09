//! Game configuration loaded from an optional TOML file.

use std::{fs, path::Path, time::Duration};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sound_trail_core::{CategoryCount, MatchingPolicy, ProfileTable, RulesConfig};
use sound_trail_system_challenge::DEFAULT_ANALYSIS_TIMEOUT;
use sound_trail_system_spectral::AnalyzerConfig;

/// Settings for one game session.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct GameConfig {
    /// Seed for board generation and dice; random when absent.
    pub seed: Option<u64>,
    /// Time budget for decoding and analysing a recording.
    pub analysis_timeout_ms: u64,
    /// Player count and movement rules.
    pub rules: RulesConfig,
    /// Number of challenge tiles per category.
    pub layout: Vec<CategoryCount>,
    /// Acceptance criteria per category.
    pub profiles: ProfileTable,
    /// Recording features a match is decided on.
    pub matching: MatchingPolicy,
    /// Spectral analysis settings.
    pub analyzer: AnalyzerSettings,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            seed: None,
            analysis_timeout_ms: DEFAULT_ANALYSIS_TIMEOUT.as_millis() as u64,
            rules: RulesConfig::default(),
            layout: CategoryCount::default_layout(),
            profiles: ProfileTable::default(),
            matching: MatchingPolicy::default(),
            analyzer: AnalyzerSettings::default(),
        }
    }
}

impl GameConfig {
    /// Loads the file at `path`, or the defaults when no path is given.
    pub(crate) fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_toml(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))
    }

    /// Parses configuration from TOML text.
    pub(crate) fn from_toml(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("invalid game configuration")?;
        config.rules.validate()?;
        if config.analysis_timeout_ms == 0 {
            bail!("analysis_timeout_ms must be greater than zero");
        }
        Ok(config)
    }

    /// Budget for decoding and analysis.
    pub(crate) fn analysis_timeout(&self) -> Duration {
        Duration::from_millis(self.analysis_timeout_ms)
    }

    /// Analyser configuration described by this file.
    pub(crate) fn analyzer_config(&self) -> AnalyzerConfig {
        AnalyzerConfig {
            fft_size: self.analyzer.fft_size,
            settle_delay: Duration::from_millis(self.analyzer.settle_delay_ms),
        }
    }
}

/// Serialisable form of the analyser configuration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub(crate) struct AnalyzerSettings {
    /// FFT window length in samples.
    pub fft_size: usize,
    /// Leading portion of each recording skipped before analysis.
    pub settle_delay_ms: u64,
}

impl Default for AnalyzerSettings {
    fn default() -> Self {
        let defaults = AnalyzerConfig::default();
        Self {
            fft_size: defaults.fft_size,
            settle_delay_ms: defaults.settle_delay.as_millis() as u64,
        }
    }
}
