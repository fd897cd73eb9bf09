use std::collections::BTreeMap;

use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sound_trail_core::{
    Board, ChallengeCategory, Command, Event, IllegalTransition, MovementPolicy, Operation,
    PendingChallenge, PipelineError, PlayerId, PlayerState, RulesConfig, ScriptedSource,
    TileIndex, TurnPhase, TurnState, Verdict, FINISH_TILE, FIRST_TILE,
};
use sound_trail_system_board::BoardGenerator;
use sound_trail_world::{self as world, query, World};

const P1: PlayerId = PlayerId::new(1);
const P2: PlayerId = PlayerId::new(2);

fn board_with(challenges: &[(u32, ChallengeCategory)]) -> Board {
    let map: BTreeMap<_, _> = challenges
        .iter()
        .map(|(index, category)| (TileIndex::new(*index), *category))
        .collect();
    Board::from_challenges(&map).expect("valid board")
}

fn new_world(challenges: &[(u32, ChallengeCategory)], rules: RulesConfig, rolls: Vec<u32>) -> World {
    World::new(board_with(challenges), rules, ScriptedSource::new(rolls)).expect("valid world")
}

fn solo() -> RulesConfig {
    RulesConfig {
        player_count: 1,
        ..RulesConfig::default()
    }
}

fn send(world: &mut World, command: Command) -> Result<Vec<Event>, IllegalTransition> {
    let mut events = Vec::new();
    world::apply(world, command, &mut events)?;
    Ok(events)
}

fn roll(world: &mut World, player: PlayerId) -> Vec<Event> {
    send(world, Command::RollDice { player }).expect("roll is legal")
}

fn position(world: &World, player: PlayerId) -> TileIndex {
    query::player(world, player)
        .expect("player takes part")
        .position
}

#[derive(Debug, PartialEq)]
struct Snapshot {
    players: Vec<PlayerState>,
    turn: TurnState,
    pending: Option<PendingChallenge>,
    verdict: Option<Verdict>,
    status: String,
}

fn snapshot(world: &World) -> Snapshot {
    Snapshot {
        players: query::players(world).to_vec(),
        turn: query::turn_state(world),
        pending: query::pending_challenge(world),
        verdict: query::last_verdict(world),
        status: query::status_message(world).to_owned(),
    }
}

#[test]
fn plain_tile_commits_and_passes_the_turn() {
    let mut world = new_world(&[], RulesConfig::default(), vec![3]);

    let events = roll(&mut world, P1);

    assert_eq!(
        events,
        vec![
            Event::DiceRolled {
                player: P1,
                value: 3
            },
            Event::PlayerMoved {
                player: P1,
                from: FIRST_TILE,
                to: TileIndex::new(4),
            },
            Event::TurnAdvanced { player: P2 },
        ]
    );
    assert_eq!(position(&world, P1), TileIndex::new(4));
    assert_eq!(
        query::turn_state(&world),
        TurnState {
            active_player: P2,
            phase: TurnPhase::AwaitingRoll,
        }
    );
    assert_eq!(query::status_message(&world), "Player 1 rolled a 3!");
}

#[test]
fn rolling_out_of_turn_is_rejected_without_mutation() {
    let mut world = new_world(&[], RulesConfig::default(), vec![3]);
    let before = snapshot(&world);

    let error = send(&mut world, Command::RollDice { player: P2 }).expect_err("not P2's turn");

    assert_eq!(
        error,
        IllegalTransition {
            operation: Operation::RollDice,
            phase: TurnPhase::AwaitingRoll,
            active_player: P1,
        }
    );
    assert_eq!(snapshot(&world), before);
}

#[test]
fn challenge_tile_suspends_the_turn() {
    let mut world = new_world(
        &[(4, ChallengeCategory::Bee)],
        RulesConfig::default(),
        vec![3],
    );

    let events = roll(&mut world, P1);

    assert_eq!(
        events.last(),
        Some(&Event::ChallengeStarted {
            player: P1,
            category: ChallengeCategory::Bee,
            tile: TileIndex::new(4),
        })
    );
    assert_eq!(position(&world, P1), TileIndex::new(4), "provisional landing");
    assert_eq!(
        query::turn_state(&world),
        TurnState {
            active_player: P1,
            phase: TurnPhase::AwaitingChallenge {
                category: ChallengeCategory::Bee,
                tile: TileIndex::new(4),
            },
        }
    );
    assert_eq!(
        query::pending_challenge(&world),
        Some(PendingChallenge {
            player: P1,
            category: ChallengeCategory::Bee,
            tile: TileIndex::new(4),
            origin: FIRST_TILE,
        })
    );

    let before = snapshot(&world);
    for player in [P1, P2] {
        let error = send(&mut world, Command::RollDice { player }).expect_err("challenge open");
        assert_eq!(error.operation, Operation::RollDice);
    }
    assert_eq!(snapshot(&world), before, "rejected rolls must not mutate");
}

#[test]
fn matched_verdict_moves_relative_to_pre_challenge_position() {
    let mut world = new_world(
        &[(7, ChallengeCategory::Snake)],
        RulesConfig::default(),
        vec![6],
    );
    let _ = roll(&mut world, P1);

    let events = send(
        &mut world,
        Command::ResolveChallenge {
            verdict: Verdict::matched(3),
        },
    )
    .expect("challenge open");

    assert_eq!(
        events,
        vec![
            Event::PlayerMoved {
                player: P1,
                from: TileIndex::new(7),
                to: TileIndex::new(4),
            },
            Event::ChallengeSucceeded {
                player: P1,
                tiles: 3,
                to: TileIndex::new(4),
            },
            Event::TurnAdvanced { player: P2 },
        ]
    );
    assert_eq!(position(&world, P1), TileIndex::new(4));
    assert_eq!(query::last_verdict(&world), Some(Verdict::matched(3)));
    assert!(query::pending_challenge(&world).is_none());
}

#[test]
fn short_sound_keeps_the_challenge_open() {
    let mut world = new_world(
        &[(4, ChallengeCategory::Bee)],
        RulesConfig::default(),
        vec![3],
    );
    let _ = roll(&mut world, P1);

    let events = send(
        &mut world,
        Command::ResolveChallenge {
            verdict: Verdict::matched(0),
        },
    )
    .expect("challenge open");

    assert_eq!(
        events,
        vec![Event::HoldLonger {
            player: P1,
            category: ChallengeCategory::Bee,
        }]
    );
    assert!(matches!(
        query::turn_state(&world).phase,
        TurnPhase::AwaitingChallenge { .. }
    ));
    assert_eq!(position(&world, P1), TileIndex::new(4));
    assert!(query::status_message(&world).contains("Hold it longer"));

    let events = send(
        &mut world,
        Command::ResolveChallenge {
            verdict: Verdict::matched(1),
        },
    )
    .expect("challenge still open");
    assert_eq!(events.last(), Some(&Event::TurnAdvanced { player: P2 }));
    assert_eq!(position(&world, P1), TileIndex::new(2));
}

#[test]
fn failed_challenge_forfeits_the_bonus_by_default() {
    let mut world = new_world(
        &[(4, ChallengeCategory::Tornado)],
        RulesConfig::default(),
        vec![3],
    );
    let _ = roll(&mut world, P1);

    let events = send(
        &mut world,
        Command::ResolveChallenge {
            verdict: Verdict::no_match(),
        },
    )
    .expect("challenge open");

    assert_eq!(
        events,
        vec![
            Event::ChallengeFailed {
                player: P1,
                to: TileIndex::new(4),
            },
            Event::TurnAdvanced { player: P2 },
        ]
    );
    assert_eq!(position(&world, P1), TileIndex::new(4));
}

#[test]
fn cancel_restores_committed_position_and_is_not_repeatable() {
    let mut world = new_world(
        &[(5, ChallengeCategory::Bee)],
        RulesConfig::default(),
        vec![4],
    );
    let _ = roll(&mut world, P1);

    let events = send(&mut world, Command::CancelChallenge).expect("challenge open");

    assert_eq!(
        events,
        vec![
            Event::PlayerMoved {
                player: P1,
                from: TileIndex::new(5),
                to: FIRST_TILE,
            },
            Event::ChallengeCancelled {
                player: P1,
                reverted_to: FIRST_TILE,
            },
            Event::TurnAdvanced { player: P2 },
        ]
    );
    assert_eq!(position(&world, P1), FIRST_TILE);

    let before = snapshot(&world);
    let error = send(&mut world, Command::CancelChallenge).expect_err("nothing to cancel");
    assert_eq!(
        error,
        IllegalTransition {
            operation: Operation::CancelChallenge,
            phase: TurnPhase::AwaitingRoll,
            active_player: P2,
        }
    );
    assert_eq!(snapshot(&world), before);
}

#[test]
fn pipeline_failure_leaves_the_challenge_retryable() {
    let mut world = new_world(
        &[(4, ChallengeCategory::Bee)],
        RulesConfig::default(),
        vec![3],
    );
    let _ = roll(&mut world, P1);

    let failure = PipelineError::Decode("truncated header".to_owned());
    let events = send(
        &mut world,
        Command::ReportChallengeFailure {
            failure: failure.clone(),
        },
    )
    .expect("challenge open");

    assert_eq!(
        events,
        vec![Event::ChallengeRetryRequested {
            player: P1,
            failure: failure.clone(),
        }]
    );
    assert_eq!(position(&world, P1), TileIndex::new(4));
    assert_eq!(query::status_message(&world), failure.retry_prompt());
    assert!(matches!(
        query::turn_state(&world).phase,
        TurnPhase::AwaitingChallenge { .. }
    ));

    let events = send(
        &mut world,
        Command::ResolveChallenge {
            verdict: Verdict::matched(2),
        },
    )
    .expect("retry is possible");
    assert!(events.contains(&Event::ChallengeSucceeded {
        player: P1,
        tiles: 2,
        to: TileIndex::new(3),
    }));
}

#[test]
fn challenge_commands_are_illegal_while_awaiting_a_roll() {
    let mut world = new_world(&[], RulesConfig::default(), vec![1]);
    let before = snapshot(&world);

    for command in [
        Command::ResolveChallenge {
            verdict: Verdict::matched(1),
        },
        Command::CancelChallenge,
        Command::ReportChallengeFailure {
            failure: PipelineError::NoAudioData,
        },
    ] {
        let operation = command.operation();
        let error = send(&mut world, command).expect_err("no challenge open");
        assert_eq!(error.operation, operation);
    }
    assert_eq!(snapshot(&world), before);
}

#[test]
fn bounce_back_reflects_off_the_finish_tile() {
    let mut rolls = vec![6; 16];
    rolls.push(5);
    let mut world = new_world(&[], solo(), rolls);

    for _ in 0..16 {
        let _ = roll(&mut world, P1);
    }
    assert_eq!(position(&world, P1), TileIndex::new(97));

    let events = roll(&mut world, P1);

    assert!(events.contains(&Event::PlayerMoved {
        player: P1,
        from: TileIndex::new(97),
        to: TileIndex::new(98),
    }));
    assert_eq!(
        query::turn_state(&world),
        TurnState {
            active_player: P1,
            phase: TurnPhase::AwaitingRoll,
        },
        "solo play keeps the same player active"
    );
}

#[test]
fn clamp_policy_stops_on_finish_and_wins() {
    let mut rolls = vec![6; 16];
    rolls.push(5);
    let rules = RulesConfig {
        movement: MovementPolicy::ClampAtFinish,
        ..solo()
    };
    let mut world = new_world(&[], rules, rolls);

    for _ in 0..16 {
        let _ = roll(&mut world, P1);
    }
    let events = roll(&mut world, P1);

    assert_eq!(events.last(), Some(&Event::GameWon { player: P1 }));
    assert_eq!(position(&world, P1), FINISH_TILE);
    assert_eq!(query::winner(&world), Some(P1));

    let error = send(&mut world, Command::RollDice { player: P1 }).expect_err("game over");
    assert_eq!(error.phase, TurnPhase::Done { winner: P1 });
}

#[test]
fn bonus_reaching_the_finish_wins() {
    let mut rolls = vec![6; 16];
    rolls.push(1);
    let mut world = new_world(&[(98, ChallengeCategory::Balloon)], solo(), rolls);

    for _ in 0..16 {
        let _ = roll(&mut world, P1);
    }
    let _ = roll(&mut world, P1);
    assert_eq!(position(&world, P1), TileIndex::new(98));

    let events = send(
        &mut world,
        Command::ResolveChallenge {
            verdict: Verdict::matched(3),
        },
    )
    .expect("challenge open");

    assert_eq!(events.last(), Some(&Event::GameWon { player: P1 }));
    assert_eq!(query::winner(&world), Some(P1));
}

fn command_from(kind: u8, param: u8) -> Command {
    match kind % 5 {
        0 | 1 => Command::RollDice {
            player: PlayerId::new(param % 3),
        },
        2 => Command::ResolveChallenge {
            verdict: if param % 5 == 0 {
                Verdict::no_match()
            } else {
                Verdict::matched(u32::from(param % 4))
            },
        },
        3 => Command::CancelChallenge,
        _ => Command::ReportChallengeFailure {
            failure: PipelineError::PermissionDenied,
        },
    }
}

proptest! {
    #[test]
    fn arbitrary_command_streams_keep_state_consistent(
        seed in any::<u64>(),
        script in prop::collection::vec((any::<u8>(), any::<u8>()), 1..120),
    ) {
        let board = BoardGenerator::default()
            .generate(&mut ChaCha8Rng::seed_from_u64(seed))
            .expect("board generates");
        let mut world = World::new(
            board,
            RulesConfig::default(),
            ChaCha8Rng::seed_from_u64(seed.wrapping_add(1)),
        )
        .expect("valid world");

        for (kind, param) in script {
            let before = snapshot(&world);
            let mut events = Vec::new();
            match world::apply(&mut world, command_from(kind, param), &mut events) {
                Ok(()) => prop_assert!(!events.is_empty()),
                Err(_) => {
                    prop_assert!(events.is_empty());
                    prop_assert_eq!(snapshot(&world), before);
                }
            }

            for player in query::players(&world) {
                prop_assert!(player.position.is_on_board());
            }
            for event in &events {
                if let Event::DiceRolled { value, .. } = event {
                    prop_assert!((1..=6).contains(value));
                }
            }

            let turn = query::turn_state(&world);
            match turn.phase {
                TurnPhase::AwaitingChallenge { tile, .. } => {
                    let pending = query::pending_challenge(&world);
                    prop_assert!(pending.is_some());
                    let pending = pending.expect("checked above");
                    prop_assert_eq!(pending.player, turn.active_player);
                    prop_assert_eq!(pending.tile, tile);
                }
                TurnPhase::Resolving { .. } => prop_assert!(false, "resolving is never observable"),
                _ => prop_assert!(query::pending_challenge(&world).is_none()),
            }
        }
    }

    #[test]
    fn movement_policies_stay_on_the_board(from in 1u32..=100, roll in 1u32..=6) {
        let start = TileIndex::new(from);
        let clamped = MovementPolicy::ClampAtFinish.resolve(start, roll);
        prop_assert_eq!(clamped.get(), (from + roll).min(100));

        let bounced = MovementPolicy::BounceBack.resolve(start, roll);
        let expected = if from + roll > 100 { 100 - (from + roll - 100) } else { from + roll };
        prop_assert_eq!(bounced.get(), expected.clamp(1, 100));
    }
}
