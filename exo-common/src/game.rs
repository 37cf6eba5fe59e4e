//! "Planet or not?" guessing game
//!
//! A [`RoundController`] drives one play-through of `rounds_total` rounds.
//! Each round shows a synthetic curve whose ground truth was picked by a fair
//! coin flip: a transit (PLANET) or a decoy (NOT_PLANET).
//!
//! State machine:
//!
//! ```text
//!             reroll
//!            ┌──────┐
//!            ▼      │
//!      ┌─────────────────┐  submit_guess  ┌─────────────┐
//!  ──► │  AwaitingGuess  │ ─────────────► │ RoundScored │
//!      └─────────────────┘                └─────────────┘
//!            ▲    ▲          advance (more rounds) │
//!            │    └────────────────────────────────┤
//!    restart │                                     │ advance (last round)
//!            │          ┌──────────────┐           │
//!            └───────── │ GameComplete │ ◄─────────┘
//!                       └──────────────┘
//! ```

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::synth::{synthesize_decoy, synthesize_shape, DipShape, SignalCurve};
use crate::{Error, Result};

/// Planet-round depth range
const PLANET_DEPTH_RANGE: (f64, f64) = (0.005, 0.02);
/// Planet-round duty cycle range
const PLANET_WIDTH_RANGE: (f64, f64) = (0.03, 0.12);
/// Planet-round center range
const PLANET_CENTER_RANGE: (f64, f64) = (0.3, 0.7);
/// Planet-round shape blend range (mostly U-shaped)
const PLANET_SHAPE_RANGE: (f64, f64) = (0.0, 0.4);

/// Ground truth of a round, also the vocabulary of guesses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Truth {
    Planet,
    NotPlanet,
}

/// Controller state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    AwaitingGuess,
    RoundScored,
    GameComplete,
}

impl GamePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            GamePhase::AwaitingGuess => "awaiting_guess",
            GamePhase::RoundScored => "round_scored",
            GamePhase::GameComplete => "game_complete",
        }
    }
}

/// Curve generation settings for game rounds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CurveSettings {
    pub points: usize,
    pub noise_sigma: f64,
}

impl Default for CurveSettings {
    fn default() -> Self {
        Self {
            points: 400,
            noise_sigma: 0.0015,
        }
    }
}

/// State of the round currently on screen
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundState {
    pub truth: Truth,
    pub curve: SignalCurve,
    pub score: u32,
    pub round_index: u32,
    pub rounds_total: u32,
}

/// Result of a scored guess
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuessOutcome {
    pub guess: Truth,
    pub truth: Truth,
    pub correct: bool,
}

/// Serializable snapshot for the UI
///
/// The truth label is only revealed once the round has been scored.
#[derive(Debug, Clone, Serialize)]
pub struct GameView {
    pub phase: GamePhase,
    pub round_index: u32,
    pub rounds_total: u32,
    pub score: u32,
    pub curve: SignalCurve,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub truth: Option<Truth>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_outcome: Option<GuessOutcome>,
}

/// Drives one play-through of the guessing game
#[derive(Debug)]
pub struct RoundController {
    phase: GamePhase,
    round: RoundState,
    last_outcome: Option<GuessOutcome>,
    settings: CurveSettings,
    rng: StdRng,
}

impl RoundController {
    /// New game seeded from OS entropy
    pub fn new(rounds_total: u32, settings: CurveSettings) -> Self {
        Self::from_rng(rounds_total, settings, StdRng::from_entropy())
    }

    /// New game with a reproducible random sequence
    pub fn with_seed(rounds_total: u32, settings: CurveSettings, seed: u64) -> Self {
        Self::from_rng(rounds_total, settings, StdRng::seed_from_u64(seed))
    }

    fn from_rng(rounds_total: u32, settings: CurveSettings, mut rng: StdRng) -> Self {
        let (truth, curve) = draw_round(&mut rng, &settings);
        Self {
            phase: GamePhase::AwaitingGuess,
            round: RoundState {
                truth,
                curve,
                score: 0,
                round_index: 0,
                rounds_total: rounds_total.max(1),
            },
            last_outcome: None,
            settings,
            rng,
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.phase
    }

    pub fn round(&self) -> &RoundState {
        &self.round
    }

    pub fn score(&self) -> u32 {
        self.round.score
    }

    pub fn round_index(&self) -> u32 {
        self.round.round_index
    }

    pub fn rounds_total(&self) -> u32 {
        self.round.rounds_total
    }

    /// Score a guess against the current round's truth
    ///
    /// Only valid while awaiting a guess; a repeated submission is rejected
    /// and leaves the score untouched.
    pub fn submit_guess(&mut self, guess: Truth) -> Result<GuessOutcome> {
        self.require(GamePhase::AwaitingGuess, "submit a guess")?;

        let correct = guess == self.round.truth;
        if correct {
            self.round.score += 1;
        }
        let outcome = GuessOutcome {
            guess,
            truth: self.round.truth,
            correct,
        };
        self.last_outcome = Some(outcome);
        self.phase = GamePhase::RoundScored;

        tracing::debug!(
            round = self.round.round_index,
            correct,
            score = self.round.score,
            "Guess scored"
        );
        Ok(outcome)
    }

    /// Move past a scored round
    pub fn advance(&mut self) -> Result<GamePhase> {
        self.require(GamePhase::RoundScored, "advance")?;

        self.round.round_index += 1;
        if self.round.round_index >= self.round.rounds_total {
            self.phase = GamePhase::GameComplete;
            tracing::info!(
                score = self.round.score,
                rounds_total = self.round.rounds_total,
                "Game complete"
            );
        } else {
            self.new_curve();
            self.phase = GamePhase::AwaitingGuess;
        }
        Ok(self.phase)
    }

    /// Start over with score and round counter reset
    ///
    /// Allowed from any phase so the UI can offer "new game" at all times.
    pub fn restart(&mut self) {
        self.round.score = 0;
        self.round.round_index = 0;
        self.new_curve();
        self.phase = GamePhase::AwaitingGuess;
    }

    /// Replace the current signal without guessing
    pub fn reroll(&mut self) -> Result<()> {
        self.require(GamePhase::AwaitingGuess, "reroll")?;
        self.new_curve();
        Ok(())
    }

    /// UI snapshot, hiding the truth until the round is scored
    pub fn view(&self) -> GameView {
        let revealed = self.phase != GamePhase::AwaitingGuess;
        GameView {
            phase: self.phase,
            round_index: self.round.round_index,
            rounds_total: self.round.rounds_total,
            score: self.round.score,
            curve: self.round.curve.clone(),
            truth: revealed.then_some(self.round.truth),
            last_outcome: if revealed { self.last_outcome } else { None },
        }
    }

    fn require(&self, expected: GamePhase, action: &'static str) -> Result<()> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(Error::InvalidTransition {
                action,
                state: self.phase.as_str(),
            })
        }
    }

    fn new_curve(&mut self) {
        let (truth, curve) = draw_round(&mut self.rng, &self.settings);
        self.round.truth = truth;
        self.round.curve = curve;
        self.last_outcome = None;
    }
}

fn draw_round<R: Rng + ?Sized>(rng: &mut R, settings: &CurveSettings) -> (Truth, SignalCurve) {
    if rng.gen_bool(0.5) {
        let shape = DipShape {
            depth: rng.gen_range(PLANET_DEPTH_RANGE.0..=PLANET_DEPTH_RANGE.1),
            width: rng.gen_range(PLANET_WIDTH_RANGE.0..=PLANET_WIDTH_RANGE.1),
            center: rng.gen_range(PLANET_CENTER_RANGE.0..=PLANET_CENTER_RANGE.1),
            shape_factor: rng.gen_range(PLANET_SHAPE_RANGE.0..=PLANET_SHAPE_RANGE.1),
        };
        let curve = synthesize_shape(rng, settings.points, shape, settings.noise_sigma);
        (Truth::Planet, curve)
    } else {
        let curve = synthesize_decoy(rng, settings.points, settings.noise_sigma);
        (Truth::NotPlanet, curve)
    }
}
