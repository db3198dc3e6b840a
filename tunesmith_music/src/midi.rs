// MIDI output for generated melodies.
//
// Produces a Standard MIDI File, format 0 (a single track), at 960 ticks per
// beat. The track opens at tick 0 with the track name, the tempo and a
// program change on channel 0, then carries two layers on that channel:
//
// - Melody: each pitch back to back, 1 beat long (70%) or half a beat (30%),
//   velocity uniform in [80, 110]. Duration is drawn before velocity.
// - Bass: every second melody pitch (indices 0, 2, 4, ...) an octave down,
//   2 beats long at velocity 90. The bass cursor moves 2 beats per evaluated
//   index even when the transposed pitch is not positive and nothing sounds.
//
// Both layers are scheduled on absolute ticks, then merged in tick order
// with note-offs ahead of note-ons at the same tick. A key struck again
// while still sounding (bass and melody share the channel) is closed first.
// Finally everything is converted to delta times.
//
// Uses the `midly` crate for MIDI writing.

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind,
    num::{u4, u7, u15, u24, u28},
};
use thiserror::Error;
use tunesmith_prng::RandomSource;

use crate::catalog::{OCTAVE, Pitch};
use crate::melody::Melody;

/// Ticks per quarter note (one beat).
pub const TICKS_PER_BEAT: u16 = 960;

const BEAT: u32 = TICKS_PER_BEAT as u32;

/// Chance a melody note lasts a full beat rather than half a beat.
const FULL_BEAT_PROBABILITY: f64 = 0.7;

const MELODY_VELOCITY_MIN: u8 = 80;
const MELODY_VELOCITY_MAX: u8 = 110;

const BASS_VELOCITY: u8 = 90;
const BASS_TICKS: u32 = 2 * BEAT;

/// Largest value a MIDI tempo meta event can hold (24 bits).
const MAX_TEMPO_MICROS: u32 = 0xFF_FFFF;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("pitch {0} is outside the MIDI range 0..=127")]
    PitchOutOfRange(Pitch),
    #[error("program {0} is outside the MIDI range 0..=127")]
    ProgramOutOfRange(u8),
    #[error("tempo {0} BPM cannot be expressed as a MIDI tempo")]
    InvalidTempo(u16),
    #[error("failed to write MIDI data: {0}")]
    Io(#[from] std::io::Error),
}

/// Encode a melody, with its derived bass line, as SMF bytes.
///
/// Draws one duration and one velocity per melody note from `rng`.
pub fn encode<R: RandomSource>(
    melody: &Melody,
    tempo: u16,
    program: u8,
    track_name: &str,
    rng: &mut R,
) -> Result<Vec<u8>, MidiError> {
    let smf = melody_to_smf(melody, tempo, program, track_name, rng)?;
    let mut buf = Vec::new();
    smf.write_std(&mut buf)?;
    Ok(buf)
}

/// A track event at an absolute tick, before delta conversion.
struct Scheduled<'a> {
    tick: u32,
    kind: TrackEventKind<'a>,
}

impl Scheduled<'_> {
    /// Tie-break for events sharing a tick: setup events, then note-offs,
    /// then note-ons.
    fn rank(&self) -> u8 {
        match self.kind {
            TrackEventKind::Midi {
                message: MidiMessage::NoteOff { .. },
                ..
            } => 1,
            TrackEventKind::Midi {
                message: MidiMessage::NoteOn { .. },
                ..
            } => 2,
            _ => 0,
        }
    }
}

fn melody_to_smf<'a, R: RandomSource>(
    melody: &Melody,
    tempo: u16,
    program: u8,
    track_name: &'a str,
    rng: &mut R,
) -> Result<Smf<'a>, MidiError> {
    let channel = u4::new(0);
    let program = seven_bit(program).ok_or(MidiError::ProgramOutOfRange(program))?;
    let tempo_micros = tempo_to_micros(tempo)?;

    let mut events = vec![
        Scheduled {
            tick: 0,
            kind: TrackEventKind::Meta(MetaMessage::TrackName(track_name.as_bytes())),
        },
        Scheduled {
            tick: 0,
            kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(tempo_micros))),
        },
        Scheduled {
            tick: 0,
            kind: TrackEventKind::Midi {
                channel,
                message: MidiMessage::ProgramChange { program },
            },
        },
    ];

    let mut cursor: u32 = 0;
    for &pitch in melody.notes() {
        let ticks = if rng.random_bool(FULL_BEAT_PROBABILITY) {
            BEAT
        } else {
            BEAT / 2
        };
        let velocity = rng.range_u8_inclusive(MELODY_VELOCITY_MIN, MELODY_VELOCITY_MAX);
        push_note(&mut events, channel, key(pitch)?, velocity, cursor, ticks);
        cursor += ticks;
    }

    let mut bass_cursor: u32 = 0;
    for &pitch in melody.notes().iter().step_by(2) {
        let bass = pitch - OCTAVE;
        if bass > 0 {
            push_note(
                &mut events,
                channel,
                key(bass)?,
                BASS_VELOCITY,
                bass_cursor,
                BASS_TICKS,
            );
        }
        bass_cursor += BASS_TICKS;
    }

    events.sort_by_key(|e| (e.tick, e.rank()));
    let events = deinterleave(events);

    let mut track = Vec::with_capacity(events.len() + 1);
    let mut last_tick: u32 = 0;
    for event in events {
        track.push(TrackEvent {
            delta: u28::new(event.tick - last_tick),
            kind: event.kind,
        });
        last_tick = event.tick;
    }
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_BEAT)),
    ));
    smf.tracks.push(track);
    Ok(smf)
}

fn push_note<'a>(
    events: &mut Vec<Scheduled<'a>>,
    channel: u4,
    key: u7,
    velocity: u8,
    start: u32,
    ticks: u32,
) {
    events.push(Scheduled {
        tick: start,
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::NoteOn {
                key,
                vel: u7::new(velocity),
            },
        },
    });
    events.push(Scheduled {
        tick: start + ticks,
        kind: note_off(channel, key),
    });
}

fn note_off<'a>(channel: u4, key: u7) -> TrackEventKind<'a> {
    TrackEventKind::Midi {
        channel,
        message: MidiMessage::NoteOff {
            key,
            vel: u7::new(0),
        },
    }
}

/// Melody and bass share channel 0, so a key can be struck while it is
/// still sounding. Close the sounding note just before the new note-on and
/// drop the next scheduled note-off for that key, so every note-on is
/// matched by exactly one note-off and no key is ever stacked.
///
/// `events` must already be sorted by tick with note-offs first.
fn deinterleave(events: Vec<Scheduled<'_>>) -> Vec<Scheduled<'_>> {
    let mut sounding = [false; 128];
    let mut stale_offs = [0u32; 128];
    let mut out = Vec::with_capacity(events.len());
    for event in events {
        match event.kind {
            TrackEventKind::Midi {
                channel,
                message: MidiMessage::NoteOn { key, .. },
            } => {
                let k = usize::from(key.as_int());
                if sounding[k] {
                    out.push(Scheduled {
                        tick: event.tick,
                        kind: note_off(channel, key),
                    });
                    stale_offs[k] += 1;
                }
                sounding[k] = true;
            }
            TrackEventKind::Midi {
                message: MidiMessage::NoteOff { key, .. },
                ..
            } => {
                let k = usize::from(key.as_int());
                if stale_offs[k] > 0 {
                    stale_offs[k] -= 1;
                    continue;
                }
                sounding[k] = false;
            }
            _ => {}
        }
        out.push(event);
    }
    out
}

fn key(pitch: Pitch) -> Result<u7, MidiError> {
    u8::try_from(pitch)
        .ok()
        .and_then(seven_bit)
        .ok_or(MidiError::PitchOutOfRange(pitch))
}

fn seven_bit(value: u8) -> Option<u7> {
    (value <= 127).then(|| u7::new(value))
}

/// Microseconds per quarter note for a BPM value.
fn tempo_to_micros(tempo: u16) -> Result<u32, MidiError> {
    if tempo == 0 {
        return Err(MidiError::InvalidTempo(tempo));
    }
    let micros = 60_000_000 / u32::from(tempo);
    if micros > MAX_TEMPO_MICROS {
        return Err(MidiError::InvalidTempo(tempo));
    }
    Ok(micros)
}
