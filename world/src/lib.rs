#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Authoritative turn engine for Sound Trail.
//!
//! The world owns the board, every player's position and the turn state. It
//! changes only through [`apply`], one command at a time; a command that is
//! not legal in the current phase is rejected without touching any state.

use std::fmt;

use log::{debug, info, warn};
use sound_trail_core::{
    Board, ChallengeCategory, Command, ConfigurationError, Event, IllegalTransition, Operation,
    PendingChallenge, PipelineError, PlayerId, PlayerState, RandomSource, RulesConfig, TileIndex,
    TurnPhase, Verdict, VerdictOutcome, DIE_FACES, FINISH_TILE, FIRST_TILE, WELCOME_BANNER,
};

/// Represents the authoritative Sound Trail game state.
pub struct World {
    banner: &'static str,
    board: Board,
    rules: RulesConfig,
    dice: Box<dyn RandomSource>,
    players: Vec<PlayerState>,
    active: usize,
    phase: TurnPhase,
    pending: Option<PendingChallenge>,
    last_verdict: Option<Verdict>,
    status: String,
}

impl World {
    /// Creates a session on the provided board with every player on the first tile.
    ///
    /// `dice` supplies every roll; pass a seeded generator or a
    /// `ScriptedSource` for reproducible sessions.
    pub fn new(
        board: Board,
        rules: RulesConfig,
        dice: impl RandomSource + 'static,
    ) -> Result<Self, ConfigurationError> {
        rules.validate()?;
        let players = (1..=rules.player_count)
            .map(|id| PlayerState {
                id: PlayerId::new(id),
                position: FIRST_TILE,
            })
            .collect();

        Ok(Self {
            banner: WELCOME_BANNER,
            board,
            rules,
            dice: Box::new(dice),
            players,
            active: 0,
            phase: TurnPhase::AwaitingRoll,
            pending: None,
            last_verdict: None,
            status: "Roll the dice to start!".to_owned(),
        })
    }

    fn active_player(&self) -> PlayerId {
        self.players[self.active].id
    }

    fn set_active_position(&mut self, position: TileIndex) {
        self.players[self.active].position = position;
    }

    fn illegal(&self, operation: Operation) -> IllegalTransition {
        IllegalTransition {
            operation,
            phase: self.phase,
            active_player: self.active_player(),
        }
    }

    fn roll(&mut self, player: PlayerId, out_events: &mut Vec<Event>) {
        let value = self.dice.draw_inclusive(1, DIE_FACES);
        out_events.push(Event::DiceRolled { player, value });

        let from = self.players[self.active].position;
        let landing = self.rules.movement.resolve(from, value);
        self.phase = TurnPhase::Resolving { landing };
        self.set_active_position(landing);
        out_events.push(Event::PlayerMoved {
            player,
            from,
            to: landing,
        });
        debug!("{player} rolled {value}: {from} -> {landing}");
        self.status = format!("{player} rolled a {value}!");

        let tile = self.board.tile(landing).copied();
        match tile {
            Some(tile) if tile.is_finish() => self.finish(player, out_events),
            Some(tile) => match tile.challenge() {
                Some(category) => self.suspend(player, category, from, landing, out_events),
                None => self.advance_turn(out_events),
            },
            None => self.advance_turn(out_events),
        }
    }

    fn suspend(
        &mut self,
        player: PlayerId,
        category: ChallengeCategory,
        origin: TileIndex,
        tile: TileIndex,
        out_events: &mut Vec<Event>,
    ) {
        self.pending = Some(PendingChallenge {
            player,
            category,
            tile,
            origin,
        });
        self.phase = TurnPhase::AwaitingChallenge { category, tile };
        self.status = format!(
            "{player} stepped on a {category} tile. Make a {} sound to move.",
            category.sound_hint()
        );
        out_events.push(Event::ChallengeStarted {
            player,
            category,
            tile,
        });
    }

    fn resolve(
        &mut self,
        pending: PendingChallenge,
        verdict: Verdict,
        out_events: &mut Vec<Event>,
    ) {
        self.last_verdict = Some(verdict);
        let player = pending.player;

        match verdict.outcome() {
            VerdictOutcome::HoldLonger => {
                self.status = format!(
                    "That sounds like a {}! Hold it longer to move.",
                    pending.category.sound_hint()
                );
                out_events.push(Event::HoldLonger {
                    player,
                    category: pending.category,
                });
            }
            VerdictOutcome::Advance(tiles) => {
                let to = pending.origin.advanced_by(tiles);
                self.commit(pending, to, out_events);
                self.status = format!("Well done! {player} moves {tiles} tile(s) to {to}.");
                out_events.push(Event::ChallengeSucceeded { player, tiles, to });
                info!(
                    "{player} passed the {} challenge with {tiles} bonus tile(s)",
                    pending.category
                );
                if to == FINISH_TILE {
                    self.finish(player, out_events);
                } else {
                    self.advance_turn(out_events);
                }
            }
            VerdictOutcome::NoMatch => {
                let to = self.rules.penalty.apply(pending.tile);
                self.commit(pending, to, out_events);
                self.status = format!(
                    "That was not a {} sound. {player} stays on {to}.",
                    pending.category.sound_hint()
                );
                out_events.push(Event::ChallengeFailed { player, to });
                info!("{player} failed the {} challenge", pending.category);
                self.advance_turn(out_events);
            }
        }
    }

    fn cancel(&mut self, pending: PendingChallenge, out_events: &mut Vec<Event>) {
        let player = pending.player;
        let reverted_to = pending.origin;
        self.commit(pending, reverted_to, out_events);
        self.status = format!("{player} didn't do the task and goes back to {reverted_to}.");
        out_events.push(Event::ChallengeCancelled {
            player,
            reverted_to,
        });
        self.advance_turn(out_events);
    }

    fn report_failure(
        &mut self,
        pending: PendingChallenge,
        failure: PipelineError,
        out_events: &mut Vec<Event>,
    ) {
        warn!(
            "{} challenge for {}: {failure}",
            pending.category, pending.player
        );
        self.status = failure.retry_prompt();
        out_events.push(Event::ChallengeRetryRequested {
            player: pending.player,
            failure,
        });
    }

    fn commit(&mut self, pending: PendingChallenge, to: TileIndex, out_events: &mut Vec<Event>) {
        self.pending = None;
        self.set_active_position(to);
        if to != pending.tile {
            out_events.push(Event::PlayerMoved {
                player: pending.player,
                from: pending.tile,
                to,
            });
        }
    }

    fn finish(&mut self, winner: PlayerId, out_events: &mut Vec<Event>) {
        self.pending = None;
        self.phase = TurnPhase::Done { winner };
        self.status = format!("{winner} reached the finish and wins!");
        info!("{winner} won");
        out_events.push(Event::GameWon { player: winner });
    }

    fn advance_turn(&mut self, out_events: &mut Vec<Event>) {
        self.active = (self.active + 1) % self.players.len();
        self.phase = TurnPhase::AwaitingRoll;
        out_events.push(Event::TurnAdvanced {
            player: self.active_player(),
        });
    }
}

impl fmt::Debug for World {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("World")
            .field("players", &self.players)
            .field("active", &self.active)
            .field("phase", &self.phase)
            .field("pending", &self.pending)
            .field("last_verdict", &self.last_verdict)
            .finish_non_exhaustive()
    }
}

/// Applies the provided command to the world, mutating state deterministically.
///
/// Events describing the transition are appended to `out_events`. A command
/// that is illegal in the current phase, or a roll requested by a player
/// whose turn it is not, fails without pushing events or changing state.
pub fn apply(
    world: &mut World,
    command: Command,
    out_events: &mut Vec<Event>,
) -> Result<(), IllegalTransition> {
    let operation = command.operation();
    match (command, world.phase, world.pending) {
        (Command::RollDice { player }, TurnPhase::AwaitingRoll, _)
            if player == world.active_player() =>
        {
            world.roll(player, out_events);
        }
        (
            Command::ResolveChallenge { verdict },
            TurnPhase::AwaitingChallenge { .. },
            Some(pending),
        ) => {
            world.resolve(pending, verdict, out_events);
        }
        (Command::CancelChallenge, TurnPhase::AwaitingChallenge { .. }, Some(pending)) => {
            world.cancel(pending, out_events);
        }
        (
            Command::ReportChallengeFailure { failure },
            TurnPhase::AwaitingChallenge { .. },
            Some(pending),
        ) => {
            world.report_failure(pending, failure, out_events);
        }
        _ => {
            let error = world.illegal(operation);
            debug!("rejected: {error}");
            return Err(error);
        }
    }
    Ok(())
}

/// Query functions that provide read-only access to the world state.
pub mod query {
    use super::World;
    use sound_trail_core::{
        Board, PendingChallenge, PlayerId, PlayerState, RulesConfig, TurnPhase, TurnState, Verdict,
    };

    /// Retrieves the welcome banner that adapters may display to players.
    #[must_use]
    pub fn welcome_banner(world: &World) -> &'static str {
        world.banner
    }

    /// Provides read-only access to the immutable board.
    #[must_use]
    pub fn board(world: &World) -> &Board {
        &world.board
    }

    /// Rules the session was created with.
    #[must_use]
    pub fn rules(world: &World) -> RulesConfig {
        world.rules
    }

    /// Positions of every player, in turn order.
    #[must_use]
    pub fn players(world: &World) -> &[PlayerState] {
        &world.players
    }

    /// Position of a single player, if it takes part in the session.
    #[must_use]
    pub fn player(world: &World, id: PlayerId) -> Option<PlayerState> {
        world.players.iter().copied().find(|player| player.id == id)
    }

    /// Whose action is legal next, and which action.
    #[must_use]
    pub fn turn_state(world: &World) -> TurnState {
        TurnState {
            active_player: world.active_player(),
            phase: world.phase,
        }
    }

    /// The suspended challenge, while one is open.
    #[must_use]
    pub fn pending_challenge(world: &World) -> Option<PendingChallenge> {
        world.pending
    }

    /// Verdict most recently applied to a challenge.
    #[must_use]
    pub fn last_verdict(world: &World) -> Option<Verdict> {
        world.last_verdict
    }

    /// Human-readable description of the latest transition.
    #[must_use]
    pub fn status_message(world: &World) -> &str {
        &world.status
    }

    /// Winner of the session once it has ended.
    #[must_use]
    pub fn winner(world: &World) -> Option<PlayerId> {
        match world.phase {
            TurnPhase::Done { winner } => Some(winner),
            _ => None,
        }
    }
}
