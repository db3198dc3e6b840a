// Melody generation: a bounded random walk over a scale.
//
// A melody is always 16 pitches. The walk starts on a random scale tone and,
// after emitting each pitch, either steps to a neighbouring scale tone (70%)
// or jumps to a fresh random scale tone (30%). A step goes down with
// probability 0.5 when there is room below; otherwise it goes up when there
// is room above, so a walker sitting on the lowest tone always steps up.
//
// The complex style then makes an independent pass over the finished line,
// raising each pitch an octave with probability 0.3. Octave-raised pitches
// only appear after the walk, so the in-walk scale lookup always finds the
// current pitch today; a pitch that is not in the scale simply holds for one
// iteration.
//
// Draw order matters for reproducibility with a seeded or scripted source:
// start pick; then per note one step/jump draw plus either a direction draw
// (step on a found pitch) or a pick draw (jump); then, for complex, one draw
// per note.

use serde::{Deserialize, Serialize};
use tunesmith_prng::RandomSource;

use crate::catalog::{Mood, OCTAVE, Pitch, Style};

pub const MELODY_LENGTH: usize = 16;

/// Chance of a scale step (vs. a random jump) after each note.
const STEP_PROBABILITY: f64 = 0.7;

/// Chance a step goes down rather than up.
const STEP_DOWN_PROBABILITY: f64 = 0.5;

/// Chance each note is raised an octave in the complex style.
const OCTAVE_UP_PROBABILITY: f64 = 0.3;

/// An ordered, monophonic sequence of pitches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Melody {
    notes: Vec<Pitch>,
}

impl Melody {
    pub fn from_notes(notes: Vec<Pitch>) -> Self {
        Melody { notes }
    }

    pub fn notes(&self) -> &[Pitch] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}

/// Generate a 16-note melody for a mood and style.
pub fn generate<R: RandomSource>(mood: Mood, style: Style, rng: &mut R) -> Melody {
    let mut notes = random_walk(mood.scale(), rng);
    if style == Style::Complex {
        raise_octaves(&mut notes, rng);
    }
    Melody { notes }
}

/// Walk `MELODY_LENGTH` notes over `scale`, which must be non-empty.
fn random_walk<R: RandomSource>(scale: &[Pitch], rng: &mut R) -> Vec<Pitch> {
    let mut notes = Vec::with_capacity(MELODY_LENGTH);
    let mut current = pick(scale, rng);
    for _ in 0..MELODY_LENGTH {
        notes.push(current);
        current = next_pitch(scale, current, rng);
    }
    notes
}

fn next_pitch<R: RandomSource>(scale: &[Pitch], current: Pitch, rng: &mut R) -> Pitch {
    if !rng.random_bool(STEP_PROBABILITY) {
        return pick(scale, rng);
    }
    let Some(idx) = scale.iter().position(|&p| p == current) else {
        return current;
    };
    if rng.random_bool(STEP_DOWN_PROBABILITY) && idx > 0 {
        scale[idx - 1]
    } else if idx + 1 < scale.len() {
        scale[idx + 1]
    } else {
        current
    }
}

fn pick<R: RandomSource>(scale: &[Pitch], rng: &mut R) -> Pitch {
    scale[rng.range_usize(0, scale.len())]
}

fn raise_octaves<R: RandomSource>(notes: &mut [Pitch], rng: &mut R) {
    for note in notes.iter_mut() {
        if rng.random_bool(OCTAVE_UP_PROBABILITY) {
            *note += OCTAVE;
        }
    }
}
