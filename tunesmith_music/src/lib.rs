// tunesmith music core
//
// Generates short algorithmic melodies and renders them as a Standard MIDI
// File and a PCM WAV file. A melody is a 16-note random walk over a
// mood-specific scale; the MIDI file adds a sparse bass line an octave down;
// the WAV file is a bare sine tone per note.
//
// Architecture:
// - catalog.rs: Mood -> scale and genre -> MIDI program tables, style, and
//   the `Resolved` default-substitution wrapper
// - request.rs: Raw caller parameters resolved into a `GenerationRequest`
//   (tempo clamping, defaults, which fields were substituted)
// - melody.rs: The bounded random walk plus the complex-style octave pass
// - midi.rs: Single-track SMF output via `midly` (melody + bass layers)
// - wav.rs: Sine synthesis and WAV output via `hound`
// - output.rs: The flat artifact directory (naming, write, read-back)
// - render.rs: Request -> melody -> MIDI + WAV, with MIDI as the playback
//   fallback when WAV rendering fails
//
// All randomness flows through `tunesmith_prng::RandomSource`; with a seeded
// `TuneRng` the output is reproducible.

pub mod catalog;
pub mod melody;
pub mod midi;
pub mod output;
pub mod render;
pub mod request;
pub mod wav;
