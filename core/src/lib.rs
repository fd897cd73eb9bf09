#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the Sound Trail engine.
//!
//! This crate defines the message surface that connects adapters, the
//! authoritative turn engine, and pure systems. Adapters submit [`Command`]
//! values describing desired transitions, the world executes those commands via
//! its `apply` entry point, and then broadcasts [`Event`] values describing what
//! happened. Systems (board generation, spectral analysis, sound matching and
//! the challenge pipeline) are pure with respect to these contracts and only
//! ever feed new commands back to the world.

use std::{collections::BTreeMap, fmt, str::FromStr};

use rand::{Rng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Canonical banner emitted when the experience boots.
pub const WELCOME_BANNER: &str = "Welcome to Sound Trail.";

/// Number of tiles laid out on every board.
pub const BOARD_TILES: u32 = 100;

/// Number of faces on the die rolled each turn.
pub const DIE_FACES: u32 = 6;

/// Tile every player starts on. Never carries a challenge.
pub const FIRST_TILE: TileIndex = TileIndex::new(1);

/// Terminal tile that ends the game. Never carries a challenge.
pub const FINISH_TILE: TileIndex = TileIndex::new(BOARD_TILES);

/// Number of interior tiles eligible to hold a challenge.
pub const ELIGIBLE_CHALLENGE_TILES: u32 = BOARD_TILES - 2;

/// One-based index of a tile on the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TileIndex(u32);

impl TileIndex {
    /// Creates a new tile index wrapper.
    #[must_use]
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Retrieves the underlying one-based tile index.
    #[must_use]
    pub const fn get(&self) -> u32 {
        self.0
    }

    /// Builds an index from signed arithmetic, clamping into `1..=BOARD_TILES`.
    #[must_use]
    pub fn clamped(value: i64) -> Self {
        let clamped = value.clamp(i64::from(FIRST_TILE.0), i64::from(FINISH_TILE.0));
        Self(u32::try_from(clamped).unwrap_or(FIRST_TILE.0))
    }

    /// Moves forward by `tiles`, stopping on the finish tile.
    #[must_use]
    pub fn advanced_by(self, tiles: u32) -> Self {
        Self::clamped(i64::from(self.0) + i64::from(tiles))
    }

    /// Moves backward by `tiles`, stopping on the first tile.
    #[must_use]
    pub fn retreated_by(self, tiles: u32) -> Self {
        Self::clamped(i64::from(self.0) - i64::from(tiles))
    }

    /// Reports whether the index lies within `1..=BOARD_TILES`.
    #[must_use]
    pub const fn is_on_board(&self) -> bool {
        self.0 >= FIRST_TILE.0 && self.0 <= FINISH_TILE.0
    }

    /// Zero-based offset of the tile inside a board's tile vector.
    #[must_use]
    pub fn offset(&self) -> Option<usize> {
        if self.is_on_board() {
            usize::try_from(self.0 - 1).ok()
        } else {
            None
        }
    }
}

impl fmt::Display for TileIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier assigned to a player.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerId(u8);

impl PlayerId {
    /// Creates a new player identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Player {}", self.0)
    }
}

/// Tag identifying the kind of challenge a tile carries.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeCategory {
    /// Answered with a hiss.
    Snake,
    /// Answered with a buzz.
    Bee,
    /// Answered with a strong blow.
    Tornado,
    /// Answered with a long blow.
    Balloon,
}

impl ChallengeCategory {
    /// Every category in its canonical order.
    pub const ALL: [ChallengeCategory; 4] = [Self::Snake, Self::Bee, Self::Tornado, Self::Balloon];

    /// Lowercase tag used in configuration files and status lines.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Snake => "snake",
            Self::Bee => "bee",
            Self::Tornado => "tornado",
            Self::Balloon => "balloon",
        }
    }

    /// Sound the player is asked to produce for this category.
    #[must_use]
    pub const fn sound_hint(self) -> &'static str {
        match self {
            Self::Snake => "hissing",
            Self::Bee => "buzzing",
            Self::Tornado | Self::Balloon => "blowing",
        }
    }
}

impl fmt::Display for ChallengeCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for ChallengeCategory {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|category| category.tag().eq_ignore_ascii_case(value.trim()))
            .ok_or_else(|| ConfigurationError::UnknownCategoryName(value.to_owned()))
    }
}

/// Requested number of challenge tiles for one category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    /// Category to place on the board.
    pub tag: ChallengeCategory,
    /// Exact number of tiles that must carry the category.
    pub count: u32,
}

impl CategoryCount {
    /// Creates a new category count.
    #[must_use]
    pub const fn new(tag: ChallengeCategory, count: u32) -> Self {
        Self { tag, count }
    }

    /// Default layout: ten snakes, ten bees and ten tornadoes.
    #[must_use]
    pub fn default_layout() -> Vec<CategoryCount> {
        vec![
            Self::new(ChallengeCategory::Snake, 10),
            Self::new(ChallengeCategory::Bee, 10),
            Self::new(ChallengeCategory::Tornado, 10),
        ]
    }
}

/// A single square of the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Tile {
    index: TileIndex,
    challenge: Option<ChallengeCategory>,
    is_finish: bool,
}

impl Tile {
    /// Position of the tile on the board.
    #[must_use]
    pub const fn index(&self) -> TileIndex {
        self.index
    }

    /// Challenge the tile carries, if any.
    #[must_use]
    pub const fn challenge(&self) -> Option<ChallengeCategory> {
        self.challenge
    }

    /// Whether landing here ends the game.
    #[must_use]
    pub const fn is_finish(&self) -> bool {
        self.is_finish
    }
}

/// Immutable ordered layout of exactly [`BOARD_TILES`] tiles.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Board {
    tiles: Vec<Tile>,
}

impl Board {
    /// Builds a board from the challenge assignments keyed by tile.
    ///
    /// The first and the finish tile are reserved and rejected, as is any
    /// index outside the board. The finish flag is set on the last tile once
    /// every challenge has been placed.
    pub fn from_challenges(
        challenges: &BTreeMap<TileIndex, ChallengeCategory>,
    ) -> Result<Self, ConfigurationError> {
        let mut tiles: Vec<Tile> = (FIRST_TILE.get()..=FINISH_TILE.get())
            .map(|value| Tile {
                index: TileIndex::new(value),
                challenge: None,
                is_finish: false,
            })
            .collect();

        for (&index, &category) in challenges {
            if index == FIRST_TILE || index == FINISH_TILE {
                return Err(ConfigurationError::ReservedTile(index));
            }
            let Some(offset) = index.offset() else {
                return Err(ConfigurationError::ReservedTile(index));
            };
            tiles[offset].challenge = Some(category);
        }

        if let Some(last) = tiles.last_mut() {
            last.is_finish = true;
        }

        Ok(Self { tiles })
    }

    /// Looks up the tile at the provided index.
    #[must_use]
    pub fn tile(&self, index: TileIndex) -> Option<&Tile> {
        index.offset().and_then(|offset| self.tiles.get(offset))
    }

    /// All tiles in board order.
    #[must_use]
    pub fn tiles(&self) -> &[Tile] {
        &self.tiles
    }

    /// Indices of every tile carrying the provided category, ascending.
    pub fn challenge_tiles(
        &self,
        category: ChallengeCategory,
    ) -> impl Iterator<Item = TileIndex> + '_ {
        self.tiles
            .iter()
            .filter(move |tile| tile.challenge == Some(category))
            .map(|tile| tile.index)
    }

    /// Distinct categories that appear on the board, in canonical order.
    #[must_use]
    pub fn categories(&self) -> Vec<ChallengeCategory> {
        ChallengeCategory::ALL
            .into_iter()
            .filter(|category| self.challenge_tiles(*category).next().is_some())
            .collect()
    }
}

/// Acceptance criteria for one challenge category.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SoundProfile {
    /// Lower bound of the accepted dominant frequency band, inclusive.
    pub min_frequency_hz: f64,
    /// Upper bound of the accepted dominant frequency band, inclusive.
    pub max_frequency_hz: f64,
    /// Shortest recording that can satisfy the challenge.
    pub min_duration_secs: f64,
    /// Accepted loudness, checked only under [`MatchingPolicy::MultiFeature`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amplitude: Option<AmplitudeRange>,
}

impl SoundProfile {
    /// Creates a new profile without loudness bounds.
    #[must_use]
    pub const fn new(min_frequency_hz: f64, max_frequency_hz: f64, min_duration_secs: f64) -> Self {
        Self {
            min_frequency_hz,
            max_frequency_hz,
            min_duration_secs,
            amplitude: None,
        }
    }

    /// Adds RMS loudness bounds to the profile.
    #[must_use]
    pub const fn with_amplitude(mut self, min_rms: f64, max_rms: f64) -> Self {
        self.amplitude = Some(AmplitudeRange { min_rms, max_rms });
        self
    }

    /// Hissing band.
    pub const HISSING: SoundProfile =
        SoundProfile::new(250.0, 350.0, 1.0).with_amplitude(0.05, 0.40);
    /// Buzzing band.
    pub const BUZZING: SoundProfile =
        SoundProfile::new(100.0, 250.0, 1.0).with_amplitude(0.20, 0.80);
    /// Blowing band.
    pub const BLOWING: SoundProfile =
        SoundProfile::new(200.0, 3_000.0, 1.0).with_amplitude(0.30, 0.70);

    /// Reports whether the frequency lies inside the accepted band.
    #[must_use]
    pub fn contains_frequency(&self, frequency_hz: f64) -> bool {
        frequency_hz >= self.min_frequency_hz && frequency_hz <= self.max_frequency_hz
    }

    /// Reports whether the RMS level satisfies the loudness bounds, if any.
    #[must_use]
    pub fn accepts_level(&self, rms: f64) -> bool {
        self.amplitude.map_or(true, |range| range.contains(rms))
    }

    fn validate(&self, category: ChallengeCategory) -> Result<(), ConfigurationError> {
        let (min_rms, max_rms) = self
            .amplitude
            .map_or((0.0, 0.0), |range| (range.min_rms, range.max_rms));
        let values = [
            self.min_frequency_hz,
            self.max_frequency_hz,
            self.min_duration_secs,
            min_rms,
            max_rms,
        ];
        if values.iter().any(|value| !value.is_finite()) {
            return Err(ConfigurationError::InvalidProfile {
                category,
                reason: "bounds must be finite",
            });
        }
        if values.iter().any(|value| *value < 0.0) {
            return Err(ConfigurationError::InvalidProfile {
                category,
                reason: "bounds must not be negative",
            });
        }
        if self.min_frequency_hz > self.max_frequency_hz {
            return Err(ConfigurationError::InvalidProfile {
                category,
                reason: "minimum frequency exceeds maximum frequency",
            });
        }
        if min_rms > max_rms {
            return Err(ConfigurationError::InvalidProfile {
                category,
                reason: "minimum amplitude exceeds maximum amplitude",
            });
        }
        Ok(())
    }
}

/// Inclusive RMS loudness bounds on a full-scale `0.0..=1.0` level.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct AmplitudeRange {
    /// Quietest accepted RMS level.
    pub min_rms: f64,
    /// Loudest accepted RMS level.
    pub max_rms: f64,
}

impl AmplitudeRange {
    /// Reports whether the level lies inside the range.
    #[must_use]
    pub fn contains(&self, rms: f64) -> bool {
        rms >= self.min_rms && rms <= self.max_rms
    }
}

/// Which recording features a match is decided on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchingPolicy {
    /// Dominant frequency and duration only.
    #[default]
    DominantBin,
    /// Dominant frequency, duration and the profile's loudness bounds.
    MultiFeature,
}

impl FromStr for MatchingPolicy {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "dominant-bin" => Ok(Self::DominantBin),
            "multi-feature" => Ok(Self::MultiFeature),
            other => Err(ConfigurationError::UnknownPolicy(other.to_owned())),
        }
    }
}

/// Static lookup table mapping categories to their sound profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<ChallengeCategory, SoundProfile>",
    into = "BTreeMap<ChallengeCategory, SoundProfile>"
)]
pub struct ProfileTable {
    profiles: BTreeMap<ChallengeCategory, SoundProfile>,
}

impl ProfileTable {
    /// Validates and wraps the provided profiles.
    pub fn new(
        profiles: BTreeMap<ChallengeCategory, SoundProfile>,
    ) -> Result<Self, ConfigurationError> {
        for (category, profile) in &profiles {
            profile.validate(*category)?;
        }
        Ok(Self { profiles })
    }

    /// Profile registered for the category, if any.
    #[must_use]
    pub fn get(&self, category: ChallengeCategory) -> Option<&SoundProfile> {
        self.profiles.get(&category)
    }

    /// Iterates over the registered profiles in canonical category order.
    pub fn iter(&self) -> impl Iterator<Item = (ChallengeCategory, &SoundProfile)> {
        self.profiles.iter().map(|(category, profile)| (*category, profile))
    }

    /// Number of registered profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether no profile is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}

impl Default for ProfileTable {
    fn default() -> Self {
        let profiles = BTreeMap::from([
            (ChallengeCategory::Snake, SoundProfile::HISSING),
            (ChallengeCategory::Bee, SoundProfile::BUZZING),
            (ChallengeCategory::Tornado, SoundProfile::BLOWING),
            (ChallengeCategory::Balloon, SoundProfile::BLOWING),
        ]);
        Self { profiles }
    }
}

impl TryFrom<BTreeMap<ChallengeCategory, SoundProfile>> for ProfileTable {
    type Error = ConfigurationError;

    fn try_from(profiles: BTreeMap<ChallengeCategory, SoundProfile>) -> Result<Self, Self::Error> {
        Self::new(profiles)
    }
}

impl From<ProfileTable> for BTreeMap<ChallengeCategory, SoundProfile> {
    fn from(table: ProfileTable) -> Self {
        table.profiles
    }
}

/// How a roll that overshoots the finish tile is resolved.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MovementPolicy {
    /// Overshoot stops on the finish tile.
    ClampAtFinish,
    /// Overshoot reflects off the finish tile: `100 - (target - 100)`.
    #[default]
    BounceBack,
}

impl MovementPolicy {
    /// Resolves where a player standing on `from` lands after rolling `roll`.
    ///
    /// The result always lies within `1..=BOARD_TILES`.
    #[must_use]
    pub fn resolve(self, from: TileIndex, roll: u32) -> TileIndex {
        let finish = i64::from(FINISH_TILE.get());
        let target = i64::from(from.get()) + i64::from(roll);
        let landed = match self {
            Self::ClampAtFinish => target.min(finish),
            Self::BounceBack if target > finish => finish - (target - finish),
            Self::BounceBack => target,
        };
        TileIndex::clamped(landed)
    }
}

impl FromStr for MovementPolicy {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "clamp-at-finish" | "clamp" => Ok(Self::ClampAtFinish),
            "bounce-back" | "bounce" => Ok(Self::BounceBack),
            other => Err(ConfigurationError::UnknownPolicy(other.to_owned())),
        }
    }
}

/// What happens to a player whose sound does not match the challenge.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PenaltyPolicy {
    /// The player keeps the landing tile and only loses the bonus.
    #[default]
    ForfeitBonus,
    /// The player steps one tile back from the landing tile.
    StepBack,
}

impl PenaltyPolicy {
    /// Position a failing player ends up on.
    #[must_use]
    pub fn apply(self, landing: TileIndex) -> TileIndex {
        match self {
            Self::ForfeitBonus => landing,
            Self::StepBack => landing.retreated_by(1),
        }
    }
}

impl FromStr for PenaltyPolicy {
    type Err = ConfigurationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "forfeit-bonus" | "forfeit" => Ok(Self::ForfeitBonus),
            "step-back" => Ok(Self::StepBack),
            other => Err(ConfigurationError::UnknownPolicy(other.to_owned())),
        }
    }
}

/// Rules governing a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    /// One for the solo variant, two for the alternating variant.
    pub player_count: u8,
    /// Overshoot handling.
    pub movement: MovementPolicy,
    /// Failed challenge handling.
    pub penalty: PenaltyPolicy,
}

impl RulesConfig {
    /// Rejects player counts other than one or two.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if matches!(self.player_count, 1 | 2) {
            Ok(())
        } else {
            Err(ConfigurationError::InvalidPlayerCount(self.player_count))
        }
    }
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            player_count: 2,
            movement: MovementPolicy::default(),
            penalty: PenaltyPolicy::default(),
        }
    }
}

/// Immutable snapshot of a player's committed position.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PlayerState {
    /// Identifier of the player.
    pub id: PlayerId,
    /// Tile the player currently stands on.
    pub position: TileIndex,
}

/// Phase of the turn state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TurnPhase {
    /// The active player may roll.
    AwaitingRoll,
    /// A roll is being resolved against the board.
    Resolving {
        /// Tile the roll moves the player onto.
        landing: TileIndex,
    },
    /// The active player must answer a sound challenge.
    AwaitingChallenge {
        /// Category to answer.
        category: ChallengeCategory,
        /// Tile that carries the challenge.
        tile: TileIndex,
    },
    /// The game has ended.
    Done {
        /// Player that reached the finish tile.
        winner: PlayerId,
    },
}

impl fmt::Display for TurnPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingRoll => f.write_str("awaiting a roll"),
            Self::Resolving { landing } => write!(f, "resolving a move to tile {landing}"),
            Self::AwaitingChallenge { category, tile } => {
                write!(f, "awaiting the {category} challenge on tile {tile}")
            }
            Self::Done { winner } => write!(f, "finished, won by {winner}"),
        }
    }
}

/// Whose action is legal next, and which action.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TurnState {
    /// Player whose turn it is.
    pub active_player: PlayerId,
    /// Current phase of that turn.
    pub phase: TurnPhase,
}

/// Snapshot of a suspended challenge.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PendingChallenge {
    /// Player answering the challenge.
    pub player: PlayerId,
    /// Category to answer.
    pub category: ChallengeCategory,
    /// Provisional landing tile.
    pub tile: TileIndex,
    /// Last committed position, restored on cancel.
    pub origin: TileIndex,
}

/// Features extracted from one recording.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnalysisResult {
    /// Frequency of the strongest spectral bin.
    pub dominant_frequency_hz: f64,
    /// Playable length of the clip.
    pub duration_secs: f64,
    /// Root mean square level of the analysis window, 0.0..=1.0 for normalised input.
    pub rms: f64,
    /// Mean absolute level of the analysis window.
    pub average_amplitude: f64,
}

/// Outcome of matching an analysed recording against a profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Verdict {
    matched: bool,
    tiles_to_advance: u32,
}

impl Verdict {
    /// A matching sound earning `tiles_to_advance` bonus tiles.
    #[must_use]
    pub const fn matched(tiles_to_advance: u32) -> Self {
        Self {
            matched: true,
            tiles_to_advance,
        }
    }

    /// A sound that does not satisfy the profile.
    #[must_use]
    pub const fn no_match() -> Self {
        Self {
            matched: false,
            tiles_to_advance: 0,
        }
    }

    /// Whether the sound satisfied the profile.
    #[must_use]
    pub const fn is_match(&self) -> bool {
        self.matched
    }

    /// Bonus tiles earned. Always zero for a non-match.
    #[must_use]
    pub const fn tiles_to_advance(&self) -> u32 {
        self.tiles_to_advance
    }

    /// Collapses the verdict into the action the engine takes.
    #[must_use]
    pub const fn outcome(&self) -> VerdictOutcome {
        match (self.matched, self.tiles_to_advance) {
            (false, _) => VerdictOutcome::NoMatch,
            (true, 0) => VerdictOutcome::HoldLonger,
            (true, tiles) => VerdictOutcome::Advance(tiles),
        }
    }
}

/// Action implied by a [`Verdict`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum VerdictOutcome {
    /// Move forward by the given tiles and end the turn.
    Advance(u32),
    /// Right sound, too short: keep the challenge open.
    HoldLonger,
    /// Wrong sound: apply the penalty and end the turn.
    NoMatch,
}

/// Decoded PCM samples normalised to `-1.0..=1.0`.
#[derive(Clone, Debug, PartialEq)]
pub struct Waveform {
    samples: Vec<f32>,
    sample_rate_hz: u32,
}

impl Waveform {
    /// Wraps mono samples captured at the provided rate.
    #[must_use]
    pub fn new(samples: Vec<f32>, sample_rate_hz: u32) -> Self {
        Self {
            samples,
            sample_rate_hz,
        }
    }

    /// The decoded samples.
    #[must_use]
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Sampling rate in hertz.
    #[must_use]
    pub const fn sample_rate_hz(&self) -> u32 {
        self.sample_rate_hz
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the waveform holds no samples.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decoded recording handed to the spectral analyser.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedAudio {
    /// Decoded samples.
    pub waveform: Waveform,
    /// Duration reported by the container, if it reports one. Streamed
    /// containers report an infinite or NaN value.
    pub duration_hint_secs: Option<f64>,
}

impl DecodedAudio {
    /// Decoded audio without a container duration.
    #[must_use]
    pub fn from_waveform(waveform: Waveform) -> Self {
        Self {
            waveform,
            duration_hint_secs: None,
        }
    }
}

/// Source of uniformly distributed integers for dice and board placement.
pub trait RandomSource {
    /// Draws a value uniformly from `low..=high`.
    fn draw_inclusive(&mut self, low: u32, high: u32) -> u32;
}

impl<R: RngCore> RandomSource for R {
    fn draw_inclusive(&mut self, low: u32, high: u32) -> u32 {
        if low >= high {
            return low;
        }
        self.gen_range(low..=high)
    }
}

/// Replays a fixed sequence of draws, cycling when exhausted.
///
/// Values outside the requested range are clamped into it.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    values: Vec<u32>,
    cursor: usize,
}

impl ScriptedSource {
    /// Creates a source that yields `values` in order.
    #[must_use]
    pub fn new(values: Vec<u32>) -> Self {
        Self { values, cursor: 0 }
    }

    /// Number of draws served so far.
    #[must_use]
    pub const fn draws(&self) -> usize {
        self.cursor
    }
}

impl RandomSource for ScriptedSource {
    fn draw_inclusive(&mut self, low: u32, high: u32) -> u32 {
        if self.values.is_empty() || low >= high {
            return low;
        }
        let value = self.values[self.cursor % self.values.len()];
        self.cursor += 1;
        value.clamp(low, high)
    }
}

/// Commands that express every permissible turn engine transition.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Command {
    /// Rolls the die for the provided player.
    RollDice {
        /// Player requesting the roll. Must be the active player.
        player: PlayerId,
    },
    /// Applies the verdict of an analysed recording to the open challenge.
    ResolveChallenge {
        /// Outcome produced by the sound matcher.
        verdict: Verdict,
    },
    /// Abandons the open challenge and restores the committed position.
    CancelChallenge,
    /// Reports a recoverable pipeline failure; the challenge stays open.
    ReportChallengeFailure {
        /// Failure raised while capturing, decoding or analysing.
        failure: PipelineError,
    },
}

/// Names the transition a [`Command`] requests, used in errors.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// [`Command::RollDice`].
    RollDice,
    /// [`Command::ResolveChallenge`].
    ResolveChallenge,
    /// [`Command::CancelChallenge`].
    CancelChallenge,
    /// [`Command::ReportChallengeFailure`].
    ReportChallengeFailure,
}

impl Command {
    /// Transition requested by the command.
    #[must_use]
    pub const fn operation(&self) -> Operation {
        match self {
            Self::RollDice { .. } => Operation::RollDice,
            Self::ResolveChallenge { .. } => Operation::ResolveChallenge,
            Self::CancelChallenge => Operation::CancelChallenge,
            Self::ReportChallengeFailure { .. } => Operation::ReportChallengeFailure,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::RollDice => "roll the dice",
            Self::ResolveChallenge => "resolve a challenge",
            Self::CancelChallenge => "cancel a challenge",
            Self::ReportChallengeFailure => "report a challenge failure",
        })
    }
}

/// Events broadcast by the world after processing commands.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Event {
    /// The die was rolled.
    DiceRolled {
        /// Player that rolled.
        player: PlayerId,
        /// Face shown, `1..=DIE_FACES`.
        value: u32,
    },
    /// A player's position changed.
    PlayerMoved {
        /// Player that moved.
        player: PlayerId,
        /// Tile left.
        from: TileIndex,
        /// Tile reached.
        to: TileIndex,
    },
    /// A player landed on a challenge tile and the turn is suspended.
    ChallengeStarted {
        /// Player that must answer.
        player: PlayerId,
        /// Category to answer.
        category: ChallengeCategory,
        /// Tile carrying the challenge.
        tile: TileIndex,
    },
    /// The challenge was answered with a matching, long enough sound.
    ChallengeSucceeded {
        /// Player that answered.
        player: PlayerId,
        /// Bonus tiles awarded.
        tiles: u32,
        /// Committed position after the bonus.
        to: TileIndex,
    },
    /// The sound matched but was too short; the challenge stays open.
    HoldLonger {
        /// Player that must retry.
        player: PlayerId,
        /// Category still awaiting an answer.
        category: ChallengeCategory,
    },
    /// The sound did not match the challenge.
    ChallengeFailed {
        /// Player that failed.
        player: PlayerId,
        /// Committed position after the penalty.
        to: TileIndex,
    },
    /// The challenge was abandoned.
    ChallengeCancelled {
        /// Player that abandoned the challenge.
        player: PlayerId,
        /// Committed position restored.
        reverted_to: TileIndex,
    },
    /// Capture or analysis failed; the player may try again.
    ChallengeRetryRequested {
        /// Player that must retry.
        player: PlayerId,
        /// Failure that prevented a verdict.
        failure: PipelineError,
    },
    /// The turn passed to the provided player.
    TurnAdvanced {
        /// Newly active player.
        player: PlayerId,
    },
    /// A player reached the finish tile.
    GameWon {
        /// Winning player.
        player: PlayerId,
    },
}

/// Invalid board, category or rules setup, detected before play starts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ConfigurationError {
    /// More challenge tiles were requested than interior tiles exist.
    #[error("{requested} challenge tiles requested but only {available} interior tiles exist")]
    TooManyChallengeTiles {
        /// Sum of the requested counts.
        requested: u64,
        /// Interior tiles available.
        available: u32,
    },
    /// A challenge was assigned to a reserved or off-board tile.
    #[error("tile {0} cannot carry a challenge")]
    ReservedTile(TileIndex),
    /// The player count is neither one nor two.
    #[error("player count must be 1 or 2, got {0}")]
    InvalidPlayerCount(u8),
    /// A sound profile is malformed.
    #[error("sound profile for {category} is invalid: {reason}")]
    InvalidProfile {
        /// Category owning the profile.
        category: ChallengeCategory,
        /// What is wrong with it.
        reason: &'static str,
    },
    /// The analysis window size is unusable.
    #[error("analysis window of {0} samples must be a power of two of at least 32")]
    InvalidWindow(usize),
    /// A policy name could not be parsed.
    #[error("unknown policy `{0}`")]
    UnknownPolicy(String),
    /// A category name could not be parsed.
    #[error("unknown challenge category `{0}`")]
    UnknownCategoryName(String),
    /// The random source kept returning unusable tiles.
    #[error("random source yielded no free tile for {category} after {draws} draws")]
    SourceExhausted {
        /// Category being placed when the draws ran out.
        category: ChallengeCategory,
        /// Draws spent on the category.
        draws: u64,
    },
}

/// A command was submitted outside the phase that permits it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("cannot {operation} while {phase} for {active_player}")]
pub struct IllegalTransition {
    /// Rejected transition.
    pub operation: Operation,
    /// Phase the engine was in.
    pub phase: TurnPhase,
    /// Player whose turn it was.
    pub active_player: PlayerId,
}

/// A board references a category that has no registered sound profile.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("no sound profile is registered for the {0} challenge")]
pub struct UnknownCategory(pub ChallengeCategory);

/// Recoverable failures raised while capturing and analysing a recording.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Error)]
pub enum PipelineError {
    /// The user or environment refused microphone access.
    #[error("microphone access was denied")]
    PermissionDenied,
    /// The recording payload was malformed.
    #[error("recording could not be decoded: {0}")]
    Decode(String),
    /// The recording decoded to zero samples.
    #[error("recording contained no audio data")]
    NoAudioData,
    /// The clip length is infinite or unknown.
    #[error("recording duration is unavailable")]
    DurationUnavailable,
    /// Decoding and analysis exceeded their time budget.
    #[error("sound analysis timed out")]
    AnalysisTimeout,
    /// The analysis task stopped before producing a result.
    #[error("sound analysis was interrupted: {0}")]
    AnalysisInterrupted(String),
}

impl PipelineError {
    /// Player-facing prompt describing how to recover.
    #[must_use]
    pub fn retry_prompt(&self) -> String {
        match self {
            Self::PermissionDenied => {
                "Microphone access is required for this game. Please check your settings and try again."
                    .to_owned()
            }
            Self::NoAudioData => "No sound was recorded. Make a sound and try again.".to_owned(),
            other => format!("An error occurred while checking the sound ({other}). Try again."),
        }
    }
}
