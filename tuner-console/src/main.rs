//! # Tuner - Console Front End
//!
//! Headless driver for the tuning pipeline: captures the default microphone,
//! runs every frame through [`TunerPipeline`] and prints a throttled status
//! line.
//!
//! ## Architecture
//! - **Audio Thread**: CPAL callback assembling fixed-size sample windows
//! - **Input Thread**: reads preset/reference commands from stdin
//! - **Main Thread**: owns the pipeline and processes frames in order
//! - **Communication**: crossbeam channels between the threads

mod readout;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::StreamTrait;
use crossbeam_channel::{Receiver, select};
use readout::{RefreshGate, TEXT_REFRESH};
use std::io::BufRead;
use std::path::PathBuf;
use std::thread;
use std::time::Instant;
use tuner_core::{PipelineConfig, PresetRegistry, TunerPipeline, audio, presets};

/// Queue depth between the audio callback and the pipeline, in windows.
const FRAME_QUEUE: usize = 4;

#[derive(Parser, Debug)]
#[command(name = "tuner", about = "Live string tuner")]
struct Cli {
    /// Preset to tune against
    #[arg(short, long, default_value = presets::DEFAULT_PRESET)]
    preset: String,

    /// Frequency of A4 in Hz
    #[arg(short, long, default_value_t = 440.0)]
    reference: f32,

    /// JSON file with extra presets: {"name": ["E2", "A2", ...]}
    #[arg(long)]
    presets: Option<PathBuf>,

    /// JSON file overriding pipeline settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Print the available presets and exit
    #[arg(long)]
    list_presets: bool,
}

/// Commands typed while tuning.
#[derive(Debug, Clone, PartialEq)]
enum Command {
    Preset(String),
    Reference(f32),
    Reset,
    Quit,
}

impl Command {
    /// Parses `p <name>`, `a <hz>`, `r` or `q`.
    fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let (head, rest) = line.split_once(' ').unwrap_or((line, ""));
        let rest = rest.trim();
        match head {
            "q" | "quit" => Some(Command::Quit),
            "r" | "reset" => Some(Command::Reset),
            "p" | "preset" if !rest.is_empty() => Some(Command::Preset(rest.to_string())),
            "a" | "a4" => rest.parse().ok().map(Command::Reference),
            _ => None,
        }
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let mut registry = PresetRegistry::builtin();
    if let Some(path) = &cli.presets {
        let extra = PresetRegistry::from_file(path, registry.reference_hz())
            .with_context(|| format!("loading presets from {}", path.display()))?;
        registry.merge(extra)?;
    }
    let mut registry = registry
        .with_reference(cli.reference)
        .context("applying reference pitch")?;

    if cli.list_presets {
        for preset in registry.iter() {
            let notes: Vec<String> = preset
                .configuration
                .targets()
                .iter()
                .map(|t| t.note.to_string())
                .collect();
            println!("{:<24} {}", preset.name, notes.join(" "));
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => PipelineConfig::default(),
    };

    let preset = registry.get(&cli.preset)?;
    println!("{}", preset.description());
    let mut current_preset = preset.name.clone();
    let mut pipeline = TunerPipeline::new(config, preset.configuration.clone())?;

    let (frame_tx, frame_rx) = audio::frame_channel(FRAME_QUEUE);
    let dropped = audio::DroppedFrames::new();
    let (stream, sample_rate) = audio::start_audio_capture(frame_tx, dropped.clone())?;
    log::info!("capturing at {} Hz, {} samples per frame", sample_rate, audio::BUFFER_SIZE);

    let commands = spawn_command_reader();
    let mut stdin_open = true;
    let started = Instant::now();
    let mut text_gate = RefreshGate::new(TEXT_REFRESH);

    println!("commands: p <preset>, a <A4 Hz>, r (reset), q (quit)");
    loop {
        // A closed stdin is always ready; stop listening to it instead.
        let command_rx = if stdin_open {
            commands.clone()
        } else {
            crossbeam_channel::never()
        };
        select! {
            recv(frame_rx) -> msg => match msg {
                Ok(window) => {
                    let now = started.elapsed().as_secs_f64();
                    if let Some(out) = pipeline.process(&window, now) {
                        if text_gate.ready(Instant::now()) {
                            let missed = dropped.take();
                            if missed > 0 {
                                log::warn!("pipeline is behind, dropped {} audio frames", missed);
                            }
                            println!(
                                "{}",
                                readout::format_line(&out, pipeline.tuning(), pipeline.display())
                            );
                        }
                    }
                }
                Err(_) => {
                    log::error!("audio stream closed");
                    break;
                }
            },
            recv(command_rx) -> msg => match msg {
                Ok(Command::Quit) => break,
                Err(_) => stdin_open = false,
                Ok(Command::Reset) => pipeline.reset(),
                Ok(Command::Preset(name)) => match registry.get(&name) {
                    Ok(preset) => {
                        println!("{}", preset.description());
                        current_preset = preset.name.clone();
                        pipeline.set_tuning(preset.configuration.clone());
                    }
                    Err(e) => eprintln!("{e}"),
                },
                Ok(Command::Reference(hz)) => match registry.with_reference(hz) {
                    Ok(updated) => {
                        registry = updated;
                        // The preset was found before, so it is still there.
                        if let Ok(preset) = registry.get(&current_preset) {
                            pipeline.set_tuning(preset.configuration.clone());
                        }
                    }
                    Err(e) => eprintln!("{e}"),
                },
            },
        }
    }

    // Properly stop the stream before dropping it
    if let Err(e) = stream.pause() {
        log::warn!("error pausing stream: {}", e);
    }
    drop(stream);
    Ok(())
}

/// Spawns a thread that turns stdin lines into [`Command`]s.
///
/// The channel closes when stdin does.
fn spawn_command_reader() -> Receiver<Command> {
    let (tx, rx) = crossbeam_channel::unbounded();
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            match Command::parse(&line) {
                Some(command) => {
                    if tx.send(command).is_err() {
                        break;
                    }
                }
                None if line.trim().is_empty() => {}
                None => eprintln!("unknown command: {}", line.trim()),
            }
        }
    });
    rx
}
