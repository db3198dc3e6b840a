// WAV rendering: one sine tone per melody note.
//
// The output is mono 16-bit PCM at 44.1 kHz with the canonical 44-byte
// RIFF/WAVE header. Each note occupies one beat (60 / tempo seconds) of
// audio; there is no envelope, no bass and no gap between notes. Amplitude
// is 30% of full scale.
//
// Sample `i` sits at `t = i / 44100` and sounds the note whose slot contains
// `t`. Pitches map to frequency with equal temperament around A4 (pitch 69)
// = 440 Hz. Samples are truncated toward zero when quantized.
//
// `hound` writes the header and sample data into an in-memory buffer.

use std::f64::consts::PI;
use std::io::Cursor;

use hound::{SampleFormat, WavSpec, WavWriter};
use thiserror::Error;

use crate::catalog::Pitch;
use crate::melody::Melody;

pub const SAMPLE_RATE: u32 = 44_100;
pub const BITS_PER_SAMPLE: u16 = 16;

/// Fraction of full scale used for every tone.
const AMPLITUDE: f64 = 0.3;

/// Reference pitch for tuning: A4.
const A4_PITCH: Pitch = 69;
const A4_FREQUENCY: f64 = 440.0;

#[derive(Debug, Error)]
pub enum WavError {
    #[error("cannot render an empty melody")]
    EmptyMelody,
    #[error("tempo must be positive")]
    ZeroTempo,
    #[error("failed to encode WAV data: {0}")]
    Encode(#[from] hound::Error),
}

/// Equal-tempered frequency in Hz for a pitch.
pub fn frequency(pitch: Pitch) -> f64 {
    A4_FREQUENCY * 2f64.powf(f64::from(pitch - A4_PITCH) / 12.0)
}

/// Seconds each note sounds for at a tempo.
pub fn seconds_per_note(tempo: u16) -> f64 {
    60.0 / f64::from(tempo)
}

/// Number of samples rendered for `notes` notes at a tempo.
pub fn sample_count(notes: usize, tempo: u16) -> usize {
    let total_seconds = notes as f64 * seconds_per_note(tempo);
    (f64::from(SAMPLE_RATE) * total_seconds) as usize
}

/// Synthesize the raw PCM samples for a melody.
pub fn synthesize(melody: &Melody, tempo: u16) -> Result<Vec<i16>, WavError> {
    if melody.is_empty() {
        return Err(WavError::EmptyMelody);
    }
    if tempo == 0 {
        return Err(WavError::ZeroTempo);
    }

    let notes = melody.notes();
    let note_seconds = seconds_per_note(tempo);
    let rate = f64::from(SAMPLE_RATE);
    let peak = f64::from(i16::MAX) * AMPLITUDE;

    let samples = (0..sample_count(notes.len(), tempo))
        .map(|i| {
            let t = i as f64 / rate;
            let index = (t / note_seconds) as usize % notes.len();
            let freq = frequency(notes[index]);
            (peak * (2.0 * PI * freq * t).sin()) as i16
        })
        .collect();
    Ok(samples)
}

/// Encode a melody as a complete WAV file.
pub fn encode(melody: &Melody, tempo: u16) -> Result<Vec<u8>, WavError> {
    let samples = synthesize(melody, tempo)?;

    let spec = WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: BITS_PER_SAMPLE,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
    {
        let mut writer = WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(bytes: &[u8], at: usize) -> u16 {
        u16::from_le_bytes([bytes[at], bytes[at + 1]])
    }

    fn u32_at(bytes: &[u8], at: usize) -> u32 {
        u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
    }

    #[test]
    fn test_frequency_mapping() {
        assert_eq!(frequency(69), 440.0);
        assert_eq!(frequency(57), 220.0);
        assert_eq!(frequency(81), 880.0);
        assert!((frequency(60) - 261.625_565).abs() < 1e-5);
    }

    #[test]
    fn test_sample_count() {
        assert_eq!(sample_count(16, 120), 352_800);
        assert_eq!(sample_count(16, 60), 705_600);
        let expected = (44_100.0 * (16.0 * (60.0 / 90.0))) as usize;
        assert_eq!(sample_count(16, 90), expected);
    }

    #[test]
    fn test_header_fields() {
        let melody = Melody::from_notes(vec![60, 62, 64, 65]);
        let bytes = encode(&melody, 120).unwrap();
        let samples = sample_count(4, 120);
        assert_eq!(samples, 88_200);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4) as usize, 36 + samples * 2);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1); // PCM
        assert_eq!(u16_at(&bytes, 22), 1); // mono
        assert_eq!(u32_at(&bytes, 24), 44_100);
        assert_eq!(u32_at(&bytes, 28), 88_200); // byte rate
        assert_eq!(u16_at(&bytes, 32), 2); // block align
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40) as usize, samples * 2);
        assert_eq!(bytes.len(), 44 + samples * 2);
    }

    #[test]
    fn test_samples_follow_the_melody() {
        // At 120 BPM each note lasts 22050 samples.
        let melody = Melody::from_notes(vec![69, 57]);
        let samples = synthesize(&melody, 120).unwrap();
        assert_eq!(samples.len(), 44_100);
        assert_eq!(samples[0], 0);

        let peak = (32767.0 * 0.3) as i16;
        for (i, &s) in samples.iter().enumerate() {
            assert!(s.abs() <= peak, "sample {i} = {s} exceeds {peak}");
        }

        // A quarter period of 440 Hz in, the tone is at its crest.
        let t: f64 = 0.25 / 440.0;
        let i = (t * 44_100.0).round() as usize;
        assert!(samples[i] > 9000, "expected crest near sample {i}, got {}", samples[i]);

        // The second slot sounds 220 Hz.
        let i = 22_050 + 50;
        let t = i as f64 / 44_100.0;
        let expected = (32767.0 * 0.3 * (2.0 * PI * 220.0 * t).sin()) as i16;
        assert_eq!(samples[i], expected);
    }

    #[test]
    fn test_decodes_with_hound() {
        let melody = Melody::from_notes(vec![72; 16]);
        let bytes = encode(&melody, 200).unwrap();
        let reader = hound::WavReader::new(Cursor::new(bytes)).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 44_100);
        assert_eq!(spec.bits_per_sample, 16);
        assert_eq!(reader.len() as usize, sample_count(16, 200));
    }

    #[test]
    fn test_rejects_degenerate_input() {
        assert!(matches!(
            encode(&Melody::from_notes(Vec::new()), 120),
            Err(WavError::EmptyMelody)
        ));
        assert!(matches!(
            encode(&Melody::from_notes(vec![60]), 0),
            Err(WavError::ZeroTempo)
        ));
    }
}
