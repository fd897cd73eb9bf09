#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Pure matching system that turns an analysed recording into a verdict.

use sound_trail_core::{
    AnalysisResult, Board, ChallengeCategory, MatchingPolicy, ProfileTable, UnknownCategory,
    Verdict,
};

/// Duration thresholds, longest first, and the bonus tiles they award.
pub const DURATION_TIERS: [(f64, u32); 3] = [(9.0, 3), (6.0, 2), (3.0, 1)];

/// Bonus tiles earned by holding a matching sound for `duration_secs`.
///
/// Anything shorter than the lowest tier earns nothing, which the engine
/// reports as "hold longer".
#[must_use]
pub fn tiles_for_duration(duration_secs: f64) -> u32 {
    DURATION_TIERS
        .iter()
        .find(|(threshold, _)| duration_secs >= *threshold)
        .map_or(0, |(_, tiles)| *tiles)
}

/// Compares analysis results against the registered sound profiles.
#[derive(Clone, Debug, Default)]
pub struct SoundMatcher {
    profiles: ProfileTable,
    policy: MatchingPolicy,
}

impl SoundMatcher {
    /// Creates a matcher backed by the provided lookup table.
    #[must_use]
    pub fn new(profiles: ProfileTable) -> Self {
        Self {
            profiles,
            policy: MatchingPolicy::default(),
        }
    }

    /// Switches the features a match is decided on.
    #[must_use]
    pub fn with_policy(mut self, policy: MatchingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Active matching policy.
    #[must_use]
    pub fn policy(&self) -> MatchingPolicy {
        self.policy
    }

    /// Registered profiles.
    #[must_use]
    pub fn profiles(&self) -> &ProfileTable {
        &self.profiles
    }

    /// Judges a recording against the profile of `category`.
    ///
    /// A match requires the dominant frequency inside the profile's band and
    /// a duration of at least its minimum. Under
    /// [`MatchingPolicy::MultiFeature`] the RMS level must also sit inside
    /// the profile's loudness bounds. Matches earn tiles by duration tier;
    /// non-matches earn none.
    pub fn evaluate(
        &self,
        result: &AnalysisResult,
        category: ChallengeCategory,
    ) -> Result<Verdict, UnknownCategory> {
        let profile = self
            .profiles
            .get(category)
            .ok_or(UnknownCategory(category))?;

        let level_ok = match self.policy {
            MatchingPolicy::DominantBin => true,
            MatchingPolicy::MultiFeature => profile.accepts_level(result.rms),
        };
        let matched = profile.contains_frequency(result.dominant_frequency_hz)
            && result.duration_secs >= profile.min_duration_secs
            && level_ok;

        Ok(if matched {
            Verdict::matched(tiles_for_duration(result.duration_secs))
        } else {
            Verdict::no_match()
        })
    }

    /// First category, in table order, whose band holds the dominant frequency.
    #[must_use]
    pub fn identify(&self, result: &AnalysisResult) -> Option<ChallengeCategory> {
        self.profiles
            .iter()
            .find(|(_, profile)| profile.contains_frequency(result.dominant_frequency_hz))
            .map(|(category, _)| category)
    }

    /// Fails when the board uses a category without a registered profile.
    pub fn ensure_covers(&self, board: &Board) -> Result<(), UnknownCategory> {
        match board
            .categories()
            .into_iter()
            .find(|category| self.profiles.get(*category).is_none())
        {
            Some(missing) => Err(UnknownCategory(missing)),
            None => Ok(()),
        }
    }
}
