//! Replay a 16-bit mono WAV file through `KeywordSpotter` and print every
//! event as a JSON line.
//!
//! ```text
//! keyspot-replay --models <dir> --wav <file.wav> [--config <cfg.json>]
//! ```

use std::path::{Path, PathBuf};

use keyspot_core::{
    vad::VoiceActivityDetector, AudioFrame, EnergyVad, EngineConfig, KeywordSpotter, ModelSet,
    SpotterEvent,
};
use tracing::info;

#[derive(Debug)]
struct Args {
    config: Option<PathBuf>,
    models: PathBuf,
    wav: PathBuf,
}

fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("keyspot=info")),
        )
        .init();

    if let Err(e) = run() {
        eprintln!("replay failed: {e}");
        std::process::exit(1);
    }
}

fn parse_args() -> Result<Args, String> {
    let mut config = None;
    let mut models = None;
    let mut wav = None;

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        let mut value = |name: &str| {
            it.next()
                .map(PathBuf::from)
                .ok_or_else(|| format!("missing value for {name}"))
        };
        match arg.as_str() {
            "--config" => config = Some(value("--config")?),
            "--models" => models = Some(value("--models")?),
            "--wav" => wav = Some(value("--wav")?),
            "--help" | "-h" => {
                println!(
                    "Usage: keyspot-replay --models <dir> --wav <file.wav> [--config <cfg.json>]"
                );
                std::process::exit(0);
            }
            other => return Err(format!("unknown argument: {other}")),
        }
    }

    Ok(Args {
        config,
        models: models.ok_or("--models is required")?,
        wav: wav.ok_or("--wav is required")?,
    })
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig, String> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let json = std::fs::read_to_string(path).map_err(|e| format!("{}: {e}", path.display()))?;
    EngineConfig::from_json(&json).map_err(|e| e.to_string())
}

fn read_wav(path: &Path, sample_rate: u32) -> Result<Vec<i16>, String> {
    let mut reader = hound::WavReader::open(path).map_err(|e| e.to_string())?;
    let spec = reader.spec();
    if spec.channels != 1
        || spec.bits_per_sample != 16
        || spec.sample_format != hound::SampleFormat::Int
    {
        return Err(format!(
            "{}: expected 16-bit mono PCM, got {} channel(s) of {}-bit {:?}",
            path.display(),
            spec.channels,
            spec.bits_per_sample,
            spec.sample_format
        ));
    }
    if spec.sample_rate != sample_rate {
        return Err(format!(
            "{}: sample rate {} Hz does not match configured {} Hz",
            path.display(),
            spec.sample_rate,
            sample_rate
        ));
    }
    reader
        .samples::<i16>()
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| e.to_string())
}

fn emit(events: Vec<SpotterEvent>) -> Result<(), String> {
    for event in events {
        println!("{}", serde_json::to_string(&event).map_err(|e| e.to_string())?);
    }
    Ok(())
}

fn run() -> Result<(), String> {
    let args = parse_args()?;
    let config = load_config(args.config.as_deref())?;
    let models = ModelSet::load_onnx_dir(&args.models).map_err(|e| e.to_string())?;
    let mut spotter = KeywordSpotter::new(&config, Some(models)).map_err(|e| e.to_string())?;
    let mut vad = EnergyVad::new(config.vad_threshold, config.vad_hangover_frames);

    let samples = read_wav(&args.wav, config.sample_rate)?;
    let frame_samples = spotter.frame_samples();
    info!(
        wav = %args.wav.display(),
        samples = samples.len(),
        frames = samples.len() / frame_samples,
        "replaying"
    );

    // A trailing partial frame is dropped.
    for chunk in samples.chunks_exact(frame_samples) {
        let frame = AudioFrame::new(chunk.to_vec(), config.sample_rate);
        let is_speech = vad.classify(&frame).is_speech();
        emit(spotter.process_frame(&frame, is_speech))?;
    }
    emit(spotter.deactivate())?;
    Ok(())
}
