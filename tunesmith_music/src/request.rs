// Generation requests: raw caller parameters resolved to a concrete request.
//
// Callers (the web form, a JSON body, the `generate` CLI) hand over optional
// strings. Resolution never fails: every absent, unrecognized or out-of-range
// value is replaced by its default, and the names of the replaced fields are
// collected in `Resolution::defaults_applied`.
//
// Defaults: mood `happy`, genre `pop`, tempo 120 BPM, style `simple`.
// Tempo must parse as an integer in [60, 200]; anything else becomes 120
// (not the nearest bound).

use serde::{Deserialize, Deserializer, Serialize};

use crate::catalog::{Genre, Mood, Resolved, Style};

pub const MIN_TEMPO: u16 = 60;
pub const MAX_TEMPO: u16 = 200;
pub const DEFAULT_TEMPO: u16 = 120;

/// Unvalidated parameters as they arrive from a caller.
///
/// Deserializes from JSON objects where `tempo` may be a number or a string.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawParams {
    #[serde(default, deserialize_with = "lenient_string")]
    pub mood: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub genre: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub tempo: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub style: Option<String>,
}

impl RawParams {
    /// Build from decoded key/value pairs (e.g. a form body). Later
    /// duplicates overwrite earlier ones; unknown keys are ignored.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = RawParams::default();
        for (key, value) in pairs {
            let slot = match key.as_ref() {
                "mood" => &mut params.mood,
                "genre" => &mut params.genre,
                "tempo" => &mut params.tempo,
                "style" => &mut params.style,
                _ => continue,
            };
            *slot = Some(value.into());
        }
        params
    }
}

/// Accept strings, numbers and booleans as text; treat null, arrays and
/// objects as absent.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => Some(s),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

/// Resolve a tempo given as text. Surrounding whitespace is ignored.
pub fn resolve_tempo(raw: Option<&str>) -> Resolved<u16> {
    match raw.and_then(|s| s.trim().parse::<i64>().ok()) {
        Some(bpm) => clamp_tempo(bpm),
        None => Resolved::defaulted(DEFAULT_TEMPO),
    }
}

/// Accept a tempo inside [60, 200]; reset anything else to 120.
pub fn clamp_tempo(bpm: i64) -> Resolved<u16> {
    if (i64::from(MIN_TEMPO)..=i64::from(MAX_TEMPO)).contains(&bpm) {
        Resolved::given(bpm as u16)
    } else {
        Resolved::defaulted(DEFAULT_TEMPO)
    }
}

/// A fully resolved generation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub mood: Mood,
    pub genre: Genre,
    /// Beats per minute, always within [`MIN_TEMPO`, `MAX_TEMPO`].
    pub tempo: u16,
    pub style: Style,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            mood: Mood::default(),
            genre: Genre::default(),
            tempo: DEFAULT_TEMPO,
            style: Style::default(),
        }
    }
}

/// A resolved request plus the fields that fell back to defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub request: GenerationRequest,
    pub defaults_applied: Vec<&'static str>,
}

impl GenerationRequest {
    /// Resolve raw parameters. Absent fields count as defaulted.
    pub fn resolve(raw: &RawParams) -> Resolution {
        let mood = raw
            .mood
            .as_deref()
            .map_or(Resolved::defaulted(Mood::default()), Mood::resolve);
        let genre = raw
            .genre
            .as_deref()
            .map_or(Resolved::defaulted(Genre::default()), Genre::resolve);
        let tempo = resolve_tempo(raw.tempo.as_deref());
        let style = raw
            .style
            .as_deref()
            .map_or(Resolved::defaulted(Style::default()), Style::resolve);

        let defaults_applied = [
            ("mood", mood.defaulted),
            ("genre", genre.defaulted),
            ("tempo", tempo.defaulted),
            ("style", style.defaulted),
        ]
        .into_iter()
        .filter_map(|(field, defaulted)| defaulted.then_some(field))
        .collect();

        Resolution {
            request: GenerationRequest {
                mood: mood.value,
                genre: genre.value,
                tempo: tempo.value,
                style: style.value,
            },
            defaults_applied,
        }
    }
}
