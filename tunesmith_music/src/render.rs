// The render pipeline: one resolved request in, two artifacts out.
//
// Steps: generate the melody, encode and store the MIDI file, then try the
// WAV file. The two encoders read the same melody and never interact. MIDI
// failures abort the render. WAV failures (synthesis or the file write) do
// not: they are logged, the result carries no WAV name, and
// `Rendered::audio_file` points at the MIDI file instead so callers still
// have something to play.
//
// Draws from `rng` happen in this order: melody, then MIDI durations and
// velocities. WAV synthesis is deterministic.

use chrono::{DateTime, Local};
use log::{debug, info, warn};
use thiserror::Error;
use tunesmith_prng::RandomSource;

use crate::melody::{self, Melody};
use crate::midi::{self, MidiError};
use crate::output::{ArtifactKind, OutputError, OutputStore, artifact_name};
use crate::request::GenerationRequest;
use crate::wav;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("MIDI encoding failed: {0}")]
    Midi(#[from] MidiError),
    #[error(transparent)]
    Output(#[from] OutputError),
}

/// Everything a caller needs to present a finished render.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub request: GenerationRequest,
    pub melody: Melody,
    pub midi_file: String,
    /// `None` when WAV rendering failed.
    pub wav_file: Option<String>,
    pub generated_at: DateTime<Local>,
}

impl Rendered {
    /// The file to offer for playback: the WAV if there is one, else the MIDI.
    pub fn audio_file(&self) -> &str {
        self.wav_file.as_deref().unwrap_or(&self.midi_file)
    }
}

/// Generate a melody for `request` and write its MIDI and WAV artifacts.
pub fn render<R: RandomSource>(
    request: &GenerationRequest,
    store: &OutputStore,
    track_name: &str,
    generated_at: DateTime<Local>,
    rng: &mut R,
) -> Result<Rendered, RenderError> {
    info!(
        "rendering mood={} genre={} tempo={} style={}",
        request.mood.name(),
        request.genre.name(),
        request.tempo,
        request.style.name()
    );

    let melody = melody::generate(request.mood, request.style, rng);
    debug!("melody: {:?}", melody.notes());

    let midi_bytes = midi::encode(
        &melody,
        request.tempo,
        request.genre.program(),
        track_name,
        rng,
    )?;
    let midi_file = artifact_name(&generated_at, ArtifactKind::Midi);
    store.write(&midi_file, &midi_bytes)?;

    let wav_name = artifact_name(&generated_at, ArtifactKind::Wav);
    let wav_file = match write_wav(store, &wav_name, &melody, request.tempo) {
        Ok(()) => Some(wav_name),
        Err(e) => {
            warn!("WAV creation failed, offering MIDI for playback: {e}");
            None
        }
    };

    Ok(Rendered {
        request: *request,
        melody,
        midi_file,
        wav_file,
        generated_at,
    })
}

fn write_wav(
    store: &OutputStore,
    name: &str,
    melody: &Melody,
    tempo: u16,
) -> Result<(), Box<dyn std::error::Error>> {
    let bytes = wav::encode(melody, tempo)?;
    store.write(name, &bytes)?;
    Ok(())
}
