//! Interactive terminal session driving the turn engine.

use std::{
    future::{pending, ready},
    io::{BufRead, Write},
    path::PathBuf,
};

use anyhow::{bail, Context, Result};
use log::{debug, warn};
use sound_trail_core::{Command, TurnPhase};
use sound_trail_system_challenge::{ChallengeOutcome, SoundPipeline};
use sound_trail_world::{self as world, query, World};
use tokio::runtime::Runtime;

use crate::microphone::{SoundSource, TerminalMicrophone, MAX_TONE_SECS};

const CHALLENGE_HELP: &str = "Answer with: tone <hz> <seconds> | wav <path> | deny | cancel";

/// A player's reply to a challenge prompt.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum ChallengeInput {
    /// Record the provided sound.
    Sound(SoundSource),
    /// Abandon the challenge.
    Cancel,
    /// Leave the game.
    Quit,
}

/// Parses a challenge reply such as `tone 150 4` or `wav take.wav`.
pub(crate) fn parse_challenge_input(line: &str) -> Result<ChallengeInput> {
    let mut words = line.split_whitespace();
    let Some(keyword) = words.next() else {
        bail!("{CHALLENGE_HELP}");
    };

    let input = match keyword.to_ascii_lowercase().as_str() {
        "tone" => {
            let frequency_hz: f64 = words
                .next()
                .context("tone needs a frequency in hertz")?
                .parse()
                .context("frequency must be a number")?;
            let seconds: f64 = words
                .next()
                .context("tone needs a duration in seconds")?
                .parse()
                .context("duration must be a number")?;
            if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
                bail!("frequency must be positive");
            }
            if !(seconds.is_finite() && seconds >= 0.0) {
                bail!("duration must not be negative");
            }
            if seconds > MAX_TONE_SECS {
                bail!("duration must be at most {MAX_TONE_SECS} seconds");
            }
            ChallengeInput::Sound(SoundSource::Tone {
                frequency_hz,
                seconds,
            })
        }
        "wav" => {
            let path = words.by_ref().collect::<Vec<_>>().join(" ");
            if path.is_empty() {
                bail!("wav needs a file path");
            }
            ChallengeInput::Sound(SoundSource::WavFile(PathBuf::from(path)))
        }
        "deny" => ChallengeInput::Sound(SoundSource::Denied),
        "cancel" => ChallengeInput::Cancel,
        "quit" => ChallengeInput::Quit,
        other => bail!("unknown answer `{other}`. {CHALLENGE_HELP}"),
    };

    if words.next().is_some() {
        bail!("unexpected trailing input. {CHALLENGE_HELP}");
    }
    Ok(input)
}

/// Runs the game until a player wins, the input ends or a player quits.
pub(crate) fn run<R, W>(
    world: &mut World,
    pipeline: &SoundPipeline,
    runtime: &Runtime,
    input: R,
    output: &mut W,
) -> Result<()>
where
    R: BufRead,
    W: Write,
{
    let mut lines = input.lines();
    writeln!(output, "{}", query::welcome_banner(world))?;
    writeln!(output, "{}", query::status_message(world))?;

    loop {
        let turn = query::turn_state(world);
        let command = match turn.phase {
            TurnPhase::Done { winner } => {
                writeln!(output, "{winner} wins the game!")?;
                return Ok(());
            }
            TurnPhase::AwaitingRoll => {
                write!(
                    output,
                    "{}: press Enter to roll, or type quit: ",
                    turn.active_player
                )?;
                output.flush()?;
                let Some(line) = lines.next().transpose()? else {
                    return Ok(());
                };
                if line.trim().eq_ignore_ascii_case("quit") {
                    return Ok(());
                }
                Command::RollDice {
                    player: turn.active_player,
                }
            }
            TurnPhase::AwaitingChallenge { category, tile } => {
                writeln!(
                    output,
                    "{category} challenge on tile {tile}. {CHALLENGE_HELP}"
                )?;
                write!(output, "> ")?;
                output.flush()?;
                let Some(line) = lines.next().transpose()? else {
                    return Ok(());
                };
                match parse_challenge_input(&line) {
                    Err(error) => {
                        writeln!(output, "{error:#}")?;
                        continue;
                    }
                    Ok(ChallengeInput::Quit) => return Ok(()),
                    Ok(ChallengeInput::Cancel) => Command::CancelChallenge,
                    Ok(ChallengeInput::Sound(source)) => {
                        let mut microphone = TerminalMicrophone::new(source);
                        let outcome = runtime
                            .block_on(pipeline.attempt(
                                &mut microphone,
                                category,
                                ready(()),
                                pending::<()>(),
                            ))
                            .context("challenge category has no sound profile")?;
                        describe_outcome(pipeline, &outcome, output)?;
                        outcome.into_command()
                    }
                }
            }
            TurnPhase::Resolving { landing } => {
                bail!("turn engine exposed its transient resolving phase at {landing}")
            }
        };

        let mut events = Vec::new();
        if let Err(error) = world::apply(world, command, &mut events) {
            warn!("{error}");
            writeln!(output, "{error}")?;
            continue;
        }
        for event in &events {
            debug!("{event:?}");
        }
        writeln!(output, "{}", query::status_message(world))?;
        let positions: Vec<String> = query::players(world)
            .iter()
            .map(|player| format!("{} on {}", player.id, player.position))
            .collect();
        writeln!(output, "Positions: {}", positions.join(", "))?;
    }
}

fn describe_outcome<W: Write>(
    pipeline: &SoundPipeline,
    outcome: &ChallengeOutcome,
    output: &mut W,
) -> Result<()> {
    if let ChallengeOutcome::Judged { analysis, .. } = outcome {
        let detected = pipeline
            .matcher()
            .identify(analysis)
            .map_or("unknown", |category| category.sound_hint());
        writeln!(
            output,
            "Sound detected: {detected} ({:.0} Hz for {:.1} s)",
            analysis.dominant_frequency_hz, analysis.duration_secs
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use sound_trail_core::{
        Board, ChallengeCategory, PlayerId, RulesConfig, ScriptedSource, TileIndex,
    };

    fn runtime() -> Runtime {
        tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .expect("runtime builds")
    }

    fn world_with(
        challenges: &[(u32, ChallengeCategory)],
        rules: RulesConfig,
        rolls: Vec<u32>,
    ) -> World {
        let map: BTreeMap<_, _> = challenges
            .iter()
            .map(|(index, category)| (TileIndex::new(*index), *category))
            .collect();
        let board = Board::from_challenges(&map).expect("valid board");
        World::new(board, rules, ScriptedSource::new(rolls)).expect("valid world")
    }

    fn play(world: &mut World, script: &str) -> String {
        let mut output = Vec::new();
        run(
            world,
            &SoundPipeline::default(),
            &runtime(),
            script.as_bytes(),
            &mut output,
        )
        .expect("session runs");
        String::from_utf8(output).expect("utf-8 output")
    }

    fn position(world: &World, id: u8) -> Option<TileIndex> {
        query::player(world, PlayerId::new(id)).map(|player| player.position)
    }

    #[test]
    fn parses_challenge_answers() {
        assert_eq!(
            parse_challenge_input("tone 150 4").expect("valid"),
            ChallengeInput::Sound(SoundSource::Tone {
                frequency_hz: 150.0,
                seconds: 4.0,
            })
        );
        assert_eq!(
            parse_challenge_input("WAV my take.wav").expect("valid"),
            ChallengeInput::Sound(SoundSource::WavFile(PathBuf::from("my take.wav")))
        );
        assert_eq!(
            parse_challenge_input(" deny ").expect("valid"),
            ChallengeInput::Sound(SoundSource::Denied)
        );
        assert_eq!(
            parse_challenge_input("cancel").expect("valid"),
            ChallengeInput::Cancel
        );
        assert_eq!(
            parse_challenge_input("tone 200 60").expect("valid"),
            ChallengeInput::Sound(SoundSource::Tone {
                frequency_hz: 200.0,
                seconds: 60.0,
            })
        );
    }

    #[test]
    fn rejects_malformed_answers() {
        for line in [
            "",
            "tone",
            "tone 150",
            "tone abc 2",
            "tone 150 -1",
            "tone 150 61",
            "tone 150 1e15",
            "tone 150 inf",
            "wav",
            "hum 3",
            "cancel now",
        ] {
            assert!(
                parse_challenge_input(line).is_err(),
                "`{line}` should be rejected"
            );
        }
    }

    #[test]
    fn denied_microphone_keeps_the_challenge_open() {
        let mut world = world_with(
            &[(4, ChallengeCategory::Bee)],
            RulesConfig::default(),
            vec![3, 2],
        );

        let output = play(&mut world, "\nhum\ndeny\ntone 150 4\n\nquit\n");

        assert!(output.contains("unknown answer `hum`"));
        assert!(output.contains("Microphone access is required"));
        assert!(output.contains("Sound detected: buzzing"));
        assert_eq!(position(&world, 1), Some(TileIndex::new(2)));
        assert_eq!(position(&world, 2), Some(TileIndex::new(3)));
    }

    #[test]
    fn oversized_tone_is_refused_without_leaving_the_challenge() {
        let mut world = world_with(
            &[(4, ChallengeCategory::Bee)],
            RulesConfig::default(),
            vec![3],
        );

        let output = play(&mut world, "\ntone 150 1e15\nquit\n");

        assert!(output.contains("duration must be at most 60 seconds"));
        assert!(matches!(
            query::turn_state(&world).phase,
            TurnPhase::AwaitingChallenge { .. }
        ));
        assert_eq!(position(&world, 1), Some(TileIndex::new(4)));
    }

    #[test]
    fn cancelled_challenge_reverts_and_passes_the_turn() {
        let mut world = world_with(
            &[(5, ChallengeCategory::Tornado)],
            RulesConfig::default(),
            vec![4],
        );

        let output = play(&mut world, "\ncancel\n");

        assert!(output.contains("goes back to 1"));
        assert_eq!(position(&world, 1), Some(TileIndex::new(1)));
        assert_eq!(query::turn_state(&world).active_player, PlayerId::new(2));
    }

    #[test]
    fn solo_session_ends_with_a_winner() {
        let rules = RulesConfig {
            player_count: 1,
            ..RulesConfig::default()
        };
        let mut rolls = vec![6; 16];
        rolls.push(3);
        let mut world = world_with(&[], rules, rolls);

        let output = play(&mut world, &"\n".repeat(17));

        assert!(output.contains("Player 1 wins the game!"));
        assert_eq!(query::winner(&world), Some(PlayerId::new(1)));
    }
}
