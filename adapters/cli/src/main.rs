#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Command-line adapter that boots the Sound Trail experience.

mod config;
mod microphone;
mod session;
mod wav;

use std::{io, path::PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::info;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::Serialize;
use sound_trail_core::{
    Board, ChallengeCategory, MatchingPolicy, MovementPolicy, PenaltyPolicy, Tile,
};
use sound_trail_system_board::BoardGenerator;
use sound_trail_system_challenge::SoundPipeline;
use sound_trail_system_matcher::SoundMatcher;
use sound_trail_system_spectral::SpectralAnalyzer;
use sound_trail_world::World;

use crate::config::GameConfig;

/// Command-line arguments for the Sound Trail binary.
#[derive(Debug, Parser)]
#[command(
    name = "sound-trail",
    version,
    about = "Turn-based board game where challenge tiles are answered with sounds"
)]
struct Cli {
    /// TOML file with rules, layout, profiles and analyser settings.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Seed for board generation and dice rolls.
    #[arg(long, global = true)]
    seed: Option<u64>,
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Debug, Subcommand)]
enum CliCommand {
    /// Prints a generated board.
    Board {
        /// Emit JSON instead of a text grid.
        #[arg(long)]
        json: bool,
    },
    /// Plays an interactive session on the terminal.
    Play {
        /// Number of players, 1 or 2.
        #[arg(long)]
        players: Option<u8>,
        /// Overshoot handling: `bounce-back` or `clamp-at-finish`.
        #[arg(long)]
        movement: Option<MovementPolicy>,
        /// Failed challenge handling: `forfeit-bonus` or `step-back`.
        #[arg(long)]
        penalty: Option<PenaltyPolicy>,
        /// Match criteria: `dominant-bin` or `multi-feature`.
        #[arg(long)]
        matching: Option<MatchingPolicy>,
    },
}

#[derive(Serialize)]
struct BoardSummary<'a> {
    seed: u64,
    tiles: &'a [Tile],
}

/// Entry point for the Sound Trail command-line interface.
fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = GameConfig::load(cli.config.as_deref())?;
    if cli.seed.is_some() {
        config.seed = cli.seed;
    }

    match cli.command.unwrap_or(CliCommand::Play {
        players: None,
        movement: None,
        penalty: None,
        matching: None,
    }) {
        CliCommand::Board { json } => {
            let (seed, board, _) = generate_board(&config)?;
            if json {
                let summary = BoardSummary {
                    seed,
                    tiles: board.tiles(),
                };
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summary).context("failed to encode board")?
                );
            } else {
                println!("Seed {seed}");
                print!("{}", render_board(&board));
            }
            Ok(())
        }
        CliCommand::Play {
            players,
            movement,
            penalty,
            matching,
        } => {
            if let Some(players) = players {
                config.rules.player_count = players;
            }
            if let Some(movement) = movement {
                config.rules.movement = movement;
            }
            if let Some(penalty) = penalty {
                config.rules.penalty = penalty;
            }
            if let Some(matching) = matching {
                config.matching = matching;
            }
            play(&config)
        }
    }
}

fn generate_board(config: &GameConfig) -> Result<(u64, Board, ChaCha8Rng)> {
    let seed = config.seed.unwrap_or_else(rand::random);
    info!("using seed {seed}");

    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let generator = BoardGenerator::new(&config.layout).context("invalid board layout")?;
    let board = generator
        .generate(&mut rng)
        .context("failed to generate the board")?;
    Ok((seed, board, rng))
}

fn play(config: &GameConfig) -> Result<()> {
    let (_, board, dice) = generate_board(config)?;

    let matcher = SoundMatcher::new(config.profiles.clone()).with_policy(config.matching);
    matcher
        .ensure_covers(&board)
        .context("board uses a category without a sound profile")?;
    let analyzer =
        SpectralAnalyzer::new(config.analyzer_config()).context("invalid analyser settings")?;
    let pipeline =
        SoundPipeline::new(analyzer, matcher).with_analysis_timeout(config.analysis_timeout());

    let mut world = World::new(board, config.rules, dice).context("invalid rules")?;
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .context("failed to start the audio runtime")?;

    let stdin = io::stdin();
    let mut stdout = io::stdout();
    session::run(&mut world, &pipeline, &runtime, stdin.lock(), &mut stdout)
}

fn marker(category: ChallengeCategory) -> char {
    match category {
        ChallengeCategory::Snake => 'S',
        ChallengeCategory::Bee => 'B',
        ChallengeCategory::Tornado => 'T',
        ChallengeCategory::Balloon => 'O',
    }
}

fn render_board(board: &Board) -> String {
    let mut rendered = String::new();
    for row in board.tiles().chunks(10) {
        let cells: Vec<String> = row
            .iter()
            .map(|tile| {
                let symbol = match tile.challenge() {
                    Some(category) => marker(category),
                    None if tile.is_finish() => '*',
                    None => '.',
                };
                format!("{:>3}{symbol}", tile.index().get())
            })
            .collect();
        rendered.push_str(&cells.join(" "));
        rendered.push('\n');
    }
    rendered.push_str("S snake  B bee  T tornado  O balloon  * finish\n");
    rendered
}
