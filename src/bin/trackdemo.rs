//! Thin demo harness for the track engine.
//!
//! Loads a WAV file, writes it into a fresh track, reads it back, and prints
//! a short summary. Pass a second path to save the read-back copy. Exercises
//! only the basic engine surface: create, write, length, read, destroy.

use audio_tracks::{TrackStore, wav};
use std::process::ExitCode;

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let mut args = std::env::args().skip(1);
    let Some(input) = args.next() else {
        eprintln!("usage: trackdemo <input.wav> [output.wav]");
        return ExitCode::FAILURE;
    };
    let output = args.next();

    match run(&input, output.as_deref()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("trackdemo: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(input: &str, output: Option<&str>) -> Result<(), Box<dyn std::error::Error>> {
    let samples = wav::load(input)?;

    let mut store = TrackStore::new();
    let track = store.create();
    store.write(track, 0, &samples)?;

    let length = store.len(track)?;
    let copy = store.read(track, 0, length)?;
    let peak = copy.iter().map(|s| i32::from(*s).abs()).max().unwrap_or(0);

    println!("loaded {input}");
    println!(
        "  {length} samples ({:.2} s at {} Hz), peak amplitude {peak}",
        length as f64 / f64::from(wav::SAMPLE_RATE),
        wav::SAMPLE_RATE
    );

    if let Some(path) = output {
        wav::save(path, &copy)?;
        println!("  wrote copy to {path}");
    }

    store.destroy(track)?;
    Ok(())
}
