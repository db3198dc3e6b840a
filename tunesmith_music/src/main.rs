// tunesmith `generate` CLI.
//
// Renders one melody to MIDI and WAV without the web server, using the same
// resolution rules: unknown or out-of-range values fall back to defaults and
// are reported. Pass `--seed` for reproducible output.
//
// Usage:
//   cargo run -p tunesmith_music -- [--mood MOOD] [--genre GENRE]
//     [--tempo BPM] [--style simple|complex] [--seed N] [--out-dir DIR]
//
// Moods: happy, sad, calm, energetic. Genres: pop, rock, jazz, electronic.

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::Parser;
use tunesmith_music::output::OutputStore;
use tunesmith_music::render::render;
use tunesmith_music::request::{GenerationRequest, RawParams};
use tunesmith_music::wav;
use tunesmith_prng::TuneRng;

#[derive(Parser, Debug)]
#[command(name = "generate", about = "Render a generated melody to MIDI and WAV")]
struct Args {
    #[arg(long, default_value = "happy")]
    mood: String,

    #[arg(long, default_value = "pop")]
    genre: String,

    /// Beats per minute, 60-200; anything else becomes 120.
    #[arg(long, default_value = "120")]
    tempo: String,

    #[arg(long, default_value = "simple")]
    style: String,

    /// Seed for reproducible output (default: OS entropy).
    #[arg(long)]
    seed: Option<u64>,

    #[arg(long, default_value = "static/output")]
    out_dir: PathBuf,

    #[arg(long, default_value = "AI Generated Music")]
    track_name: String,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let raw = RawParams {
        mood: Some(args.mood),
        genre: Some(args.genre),
        tempo: Some(args.tempo),
        style: Some(args.style),
    };
    let resolution = GenerationRequest::resolve(&raw);
    for field in &resolution.defaults_applied {
        log::warn!("unrecognized {field}, using the default");
    }
    let request = resolution.request;

    let mut rng = match args.seed {
        Some(seed) => TuneRng::new(seed),
        None => match TuneRng::from_entropy() {
            Ok(rng) => rng,
            Err(e) => {
                eprintln!("Failed to seed random generator: {e}");
                return ExitCode::FAILURE;
            }
        },
    };

    let store = match OutputStore::open(&args.out_dir) {
        Ok(store) => store,
        Err(e) => {
            eprintln!("Failed to open output directory: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rendered = match render(&request, &store, &args.track_name, Local::now(), &mut rng) {
        Ok(rendered) => rendered,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("=== tunesmith ===");
    println!(
        "Mood: {}  Genre: {} (program {})  Tempo: {} BPM  Style: {}",
        request.mood.name(),
        request.genre.name(),
        request.genre.program(),
        request.tempo,
        request.style.name()
    );
    println!("Melody: {:?}", rendered.melody.notes());
    println!("MIDI: {}", store.dir().join(&rendered.midi_file).display());
    match &rendered.wav_file {
        Some(name) => println!(
            "WAV:  {} ({:.1}s)",
            store.dir().join(name).display(),
            rendered.melody.len() as f64 * wav::seconds_per_note(request.tempo)
        ),
        None => println!("WAV:  not available, play the MIDI file instead"),
    }
    ExitCode::SUCCESS
}
