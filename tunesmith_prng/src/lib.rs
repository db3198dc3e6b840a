// Random sources for melody generation.
//
// Every probabilistic decision in tunesmith (start pitch, step vs. jump, step
// direction, octave doubling, note duration, velocity) is drawn through the
// `RandomSource` trait so callers can choose where the randomness comes from:
//
// - `TuneRng`: xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding.
//   Production code seeds it from OS entropy; the `generate` CLI accepts an
//   explicit seed for reproducible output.
// - `ScriptedSource`: replays a fixed list of unit-interval draws. Tests use
//   it to pin down exact melodies and exact MIDI bytes.
//
// The trait has two required methods. `random_bool` and `range_u8_inclusive`
// are derived from them, so a scripted draw maps onto exactly one decision in
// the generator.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

/// Failure to read operating-system entropy when seeding `TuneRng`.
pub use getrandom::Error as EntropyError;

/// A source of uniform random draws.
pub trait RandomSource {
    /// Uniform `f64` in [0, 1).
    fn next_f64(&mut self) -> f64;

    /// Uniform `usize` in `[low, high)`.
    ///
    /// Panics if `low >= high`.
    fn range_usize(&mut self, low: usize, high: usize) -> usize;

    /// Return `true` with probability `p`.
    ///
    /// `p <= 0.0` always returns false, `p >= 1.0` always returns true.
    fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Uniform `u8` in `[low, high]` (inclusive on both ends).
    ///
    /// Panics if `low > high`.
    fn range_u8_inclusive(&mut self, low: u8, high: u8) -> u8 {
        assert!(low <= high, "range_u8_inclusive: low must be <= high");
        self.range_usize(usize::from(low), usize::from(high) + 1) as u8
    }
}

/// Xoshiro256++ PRNG.
///
/// Two `TuneRng` instances created with the same seed produce identical
/// draw sequences on every platform.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TuneRng {
    s: [u64; 4],
}

impl TuneRng {
    /// Create a new PRNG seeded from a `u64`, expanded to 256 bits of state
    /// with SplitMix64.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Create a PRNG seeded from operating-system entropy.
    pub fn from_entropy() -> Result<Self, EntropyError> {
        let mut seed = [0u8; 8];
        getrandom::getrandom(&mut seed)?;
        Ok(Self::new(u64::from_le_bytes(seed)))
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform random integer in `[low, high)` by rejection
    /// sampling, so small ranges carry no modulo bias.
    ///
    /// Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }
}

impl RandomSource for TuneRng {
    /// Upper 53 bits of a `u64` fill the f64 mantissa.
    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }
}

/// SplitMix64, used only to expand a `u64` seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

/// A random source that replays a fixed list of draws in [0, 1).
///
/// Each call to `next_f64` or `range_usize` consumes exactly one draw.
/// `range_usize(low, high)` maps a draw `d` to `low + floor(d * (high - low))`.
/// Running out of draws panics; this type exists for tests.
#[derive(Clone, Debug, Default)]
pub struct ScriptedSource {
    draws: VecDeque<f64>,
}

impl ScriptedSource {
    pub fn new(draws: impl IntoIterator<Item = f64>) -> Self {
        Self {
            draws: draws.into_iter().collect(),
        }
    }

    /// The draw that makes `range_usize(0, len)` return `index`.
    pub fn index_draw(index: usize, len: usize) -> f64 {
        assert!(index < len, "index_draw: index must be < len");
        (index as f64 + 0.5) / len as f64
    }

    /// Draws not yet consumed.
    pub fn remaining(&self) -> usize {
        self.draws.len()
    }

    fn pop(&mut self) -> f64 {
        match self.draws.pop_front() {
            Some(d) => d,
            None => panic!("ScriptedSource exhausted"),
        }
    }
}

impl RandomSource for ScriptedSource {
    fn next_f64(&mut self) -> f64 {
        self.pop()
    }

    fn range_usize(&mut self, low: usize, high: usize) -> usize {
        assert!(low < high, "range_usize: low must be less than high");
        let span = high - low;
        let offset = (self.pop() * span as f64) as usize;
        low + offset.min(span - 1)
    }
}
