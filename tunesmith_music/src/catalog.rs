// Mood and genre presets.
//
// Each mood selects a fixed scale anchored at middle C (MIDI 60); each genre
// selects a General MIDI program. The tables are plain statics: nothing
// mutates them after startup, so request handlers share them freely.
//
// Lookups never fail. An unrecognized mood falls back to the happy scale, an
// unrecognized genre to program 0 (acoustic grand piano), an unrecognized
// style to simple. The `resolve` constructors report whether that fallback
// happened through `Resolved::defaulted`, so callers can log or echo it
// instead of the substitution being silent.
//
// Names match exactly (case-sensitive), the same as the form values the web
// page posts.

use serde::{Deserialize, Serialize};

/// Absolute MIDI-style pitch (semitones, 60 = middle C). No range is
/// enforced here; the MIDI encoder rejects values outside 0..=127.
pub type Pitch = i32;

/// Semitones in one octave.
pub const OCTAVE: Pitch = 12;

/// A value produced from caller input, plus whether the default was
/// substituted because the input was absent or unrecognized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved<T> {
    pub value: T,
    pub defaulted: bool,
}

impl<T> Resolved<T> {
    pub fn given(value: T) -> Self {
        Resolved {
            value,
            defaulted: false,
        }
    }

    pub fn defaulted(value: T) -> Self {
        Resolved {
            value,
            defaulted: true,
        }
    }
}

const HAPPY_SCALE: [Pitch; 7] = [60, 62, 64, 65, 67, 69, 71]; // C major
const SAD_SCALE: [Pitch; 7] = [60, 62, 63, 65, 67, 68, 70]; // C minor
const CALM_SCALE: [Pitch; 7] = [60, 62, 64, 66, 67, 69, 71]; // C lydian
const ENERGETIC_SCALE: [Pitch; 8] = [60, 62, 64, 65, 67, 69, 71, 72]; // C major + octave

/// Emotional preset; picks the scale the melody walks over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Happy,
    Sad,
    Calm,
    Energetic,
}

impl Mood {
    pub const ALL: [Mood; 4] = [Mood::Happy, Mood::Sad, Mood::Calm, Mood::Energetic];

    pub fn name(self) -> &'static str {
        match self {
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Calm => "calm",
            Mood::Energetic => "energetic",
        }
    }

    pub fn from_name(name: &str) -> Option<Mood> {
        Mood::ALL.into_iter().find(|m| m.name() == name)
    }

    /// Resolve a caller-supplied name, falling back to `Happy`.
    pub fn resolve(name: &str) -> Resolved<Mood> {
        match Mood::from_name(name) {
            Some(mood) => Resolved::given(mood),
            None => Resolved::defaulted(Mood::default()),
        }
    }

    /// The ordered, non-empty scale for this mood.
    pub fn scale(self) -> &'static [Pitch] {
        match self {
            Mood::Happy => &HAPPY_SCALE,
            Mood::Sad => &SAD_SCALE,
            Mood::Calm => &CALM_SCALE,
            Mood::Energetic => &ENERGETIC_SCALE,
        }
    }
}

/// Genre preset; picks the General MIDI program for the track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Genre {
    #[default]
    Pop,
    Rock,
    Jazz,
    Electronic,
}

impl Genre {
    pub const ALL: [Genre; 4] = [Genre::Pop, Genre::Rock, Genre::Jazz, Genre::Electronic];

    pub fn name(self) -> &'static str {
        match self {
            Genre::Pop => "pop",
            Genre::Rock => "rock",
            Genre::Jazz => "jazz",
            Genre::Electronic => "electronic",
        }
    }

    pub fn from_name(name: &str) -> Option<Genre> {
        Genre::ALL.into_iter().find(|g| g.name() == name)
    }

    /// Resolve a caller-supplied name, falling back to `Pop` (program 0).
    pub fn resolve(name: &str) -> Resolved<Genre> {
        match Genre::from_name(name) {
            Some(genre) => Resolved::given(genre),
            None => Resolved::defaulted(Genre::default()),
        }
    }

    /// General MIDI program number (0-based).
    pub fn program(self) -> u8 {
        match self {
            Genre::Pop => 0,         // Acoustic Grand Piano
            Genre::Rock => 30,       // Distortion Guitar
            Genre::Jazz => 1,        // Bright Acoustic Piano
            Genre::Electronic => 81, // Lead 2 (sawtooth/square)
        }
    }
}

/// Melodic style. `Complex` adds a random octave-doubling pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    #[default]
    Simple,
    Complex,
}

impl Style {
    pub fn name(self) -> &'static str {
        match self {
            Style::Simple => "simple",
            Style::Complex => "complex",
        }
    }

    /// Only `"complex"` selects `Complex`; `"simple"` is taken as given and
    /// anything else is a defaulted `Simple`.
    pub fn resolve(name: &str) -> Resolved<Style> {
        match name {
            "complex" => Resolved::given(Style::Complex),
            "simple" => Resolved::given(Style::Simple),
            _ => Resolved::defaulted(Style::Simple),
        }
    }
}

/// Scale for a mood name; unknown names get the happy scale.
pub fn scale_for(mood: &str) -> &'static [Pitch] {
    Mood::resolve(mood).value.scale()
}

/// Program number for a genre name; unknown names get program 0.
pub fn instrument_for(genre: &str) -> u8 {
    Genre::resolve(genre).value.program()
}
