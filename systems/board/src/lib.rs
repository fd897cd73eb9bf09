#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Board generation system that scatters challenge tiles across the board.

use std::collections::BTreeMap;

use log::debug;
use sound_trail_core::{
    Board, CategoryCount, ChallengeCategory, ConfigurationError, RandomSource, TileIndex,
    ELIGIBLE_CHALLENGE_TILES, FINISH_TILE, FIRST_TILE,
};

/// Draws allowed per requested challenge tile before the source is deemed
/// unable to reach a free tile.
pub const DRAWS_PER_CHALLENGE: u64 = 10_000;

/// Validated challenge layout that produces boards from a random source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BoardGenerator {
    layout: Vec<CategoryCount>,
}

impl BoardGenerator {
    /// Creates a generator for the requested per-category counts.
    ///
    /// Entries naming the same category are merged, keeping the position of
    /// the first. Fails when the counts cannot fit on the interior tiles, so
    /// generation itself always terminates.
    pub fn new(categories: &[CategoryCount]) -> Result<Self, ConfigurationError> {
        let mut layout: Vec<CategoryCount> = Vec::with_capacity(categories.len());
        for entry in categories {
            match layout.iter_mut().find(|existing| existing.tag == entry.tag) {
                Some(existing) => existing.count = existing.count.saturating_add(entry.count),
                None => layout.push(*entry),
            }
        }

        let requested: u64 = layout.iter().map(|entry| u64::from(entry.count)).sum();
        if requested > u64::from(ELIGIBLE_CHALLENGE_TILES) {
            return Err(ConfigurationError::TooManyChallengeTiles {
                requested,
                available: ELIGIBLE_CHALLENGE_TILES,
            });
        }

        Ok(Self { layout })
    }

    /// Per-category counts in placement order.
    #[must_use]
    pub fn layout(&self) -> &[CategoryCount] {
        &self.layout
    }

    /// Draws a new board from the provided source.
    ///
    /// Categories are placed in layout order. Each draw is uniform over the
    /// whole board and rejected when it hits the first tile, the finish tile
    /// or a tile already holding a challenge. A category gets at most
    /// [`DRAWS_PER_CHALLENGE`] draws per requested tile; a source that keeps
    /// missing the free tiles yields [`ConfigurationError::SourceExhausted`].
    pub fn generate<S>(&self, source: &mut S) -> Result<Board, ConfigurationError>
    where
        S: RandomSource + ?Sized,
    {
        let mut assigned: BTreeMap<TileIndex, ChallengeCategory> = BTreeMap::new();

        for entry in &self.layout {
            let budget = u64::from(entry.count).saturating_mul(DRAWS_PER_CHALLENGE);
            let mut placed = 0;
            let mut draws = 0_u64;
            while placed < entry.count {
                if draws >= budget {
                    return Err(ConfigurationError::SourceExhausted {
                        category: entry.tag,
                        draws,
                    });
                }
                draws += 1;
                let index =
                    TileIndex::new(source.draw_inclusive(FIRST_TILE.get(), FINISH_TILE.get()));
                if index == FIRST_TILE || index == FINISH_TILE || assigned.contains_key(&index) {
                    continue;
                }
                let _ = assigned.insert(index, entry.tag);
                placed += 1;
            }
            debug!(
                "placed {} {} tiles ({} draws rejected)",
                entry.count,
                entry.tag,
                draws - u64::from(entry.count)
            );
        }

        Board::from_challenges(&assigned)
    }
}

impl Default for BoardGenerator {
    fn default() -> Self {
        Self {
            layout: CategoryCount::default_layout(),
        }
    }
}
