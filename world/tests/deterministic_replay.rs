use std::{
    collections::hash_map::DefaultHasher,
    hash::{Hash, Hasher},
};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use sound_trail_core::{
    Command, Event, PipelineError, PlayerState, RulesConfig, TurnPhase, Verdict,
};
use sound_trail_system_board::BoardGenerator;
use sound_trail_world::{self as world, query, World};

const MAX_COMMANDS: usize = 2_000;

#[test]
fn deterministic_replay_produces_identical_sessions() {
    let first = replay(0x5eed);
    let second = replay(0x5eed);

    assert_eq!(first, second, "replay diverged between runs");
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert!(
        first
            .events
            .iter()
            .any(|event| matches!(event, Event::ChallengeStarted { .. })),
        "scripted session should meet at least one challenge"
    );
}

#[test]
fn replay_survives_every_challenge_answer() {
    let outcome = replay(42);

    let answered = outcome
        .events
        .iter()
        .filter(|event| {
            matches!(
                event,
                Event::ChallengeSucceeded { .. }
                    | Event::ChallengeFailed { .. }
                    | Event::ChallengeCancelled { .. }
            )
        })
        .count();
    let started = outcome
        .events
        .iter()
        .filter(|event| matches!(event, Event::ChallengeStarted { .. }))
        .count();

    assert!(answered <= started);
    for player in &outcome.players {
        assert!(player.position.is_on_board());
    }
}

#[derive(Debug, PartialEq)]
struct ReplayOutcome {
    events: Vec<Event>,
    players: Vec<PlayerState>,
    final_phase: TurnPhase,
}

impl ReplayOutcome {
    fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.events.hash(&mut hasher);
        self.players.hash(&mut hasher);
        self.final_phase.hash(&mut hasher);
        hasher.finish()
    }
}

fn replay(seed: u64) -> ReplayOutcome {
    let board = BoardGenerator::default()
        .generate(&mut ChaCha8Rng::seed_from_u64(seed))
        .expect("default layout fits");
    let mut world = World::new(
        board,
        RulesConfig::default(),
        ChaCha8Rng::seed_from_u64(seed ^ 0xd1ce),
    )
    .expect("default rules are valid");

    let answers = scripted_answers();
    let mut next_answer = 0;
    let mut events = Vec::new();

    for _ in 0..MAX_COMMANDS {
        let turn = query::turn_state(&world);
        let command = match turn.phase {
            TurnPhase::AwaitingRoll => Command::RollDice {
                player: turn.active_player,
            },
            TurnPhase::AwaitingChallenge { .. } => {
                let answer = answers[next_answer % answers.len()].clone();
                next_answer += 1;
                answer
            }
            TurnPhase::Resolving { .. } | TurnPhase::Done { .. } => break,
        };

        world::apply(&mut world, command, &mut events).expect("scripted command is legal");
    }

    ReplayOutcome {
        events,
        players: query::players(&world).to_vec(),
        final_phase: query::turn_state(&world).phase,
    }
}

fn scripted_answers() -> Vec<Command> {
    vec![
        Command::ResolveChallenge {
            verdict: Verdict::matched(0),
        },
        Command::ReportChallengeFailure {
            failure: PipelineError::NoAudioData,
        },
        Command::ResolveChallenge {
            verdict: Verdict::matched(2),
        },
        Command::ResolveChallenge {
            verdict: Verdict::no_match(),
        },
        Command::CancelChallenge,
        Command::ResolveChallenge {
            verdict: Verdict::matched(3),
        },
    ]
}
