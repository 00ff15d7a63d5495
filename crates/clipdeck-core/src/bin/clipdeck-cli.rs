use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Args, Parser, Subcommand};
use clipdeck_core::{
    Command, ConstantParams, EngineConfig, Feature, RenderScript, StartOptions,
    diagnostics::init_tracing_from_config,
    fixtures::{demo_scenario, sine_buffer},
    generate_parity_report,
    parity::write_parity_report,
    render::{read_wav, render_clip, write_wav},
};

#[derive(Debug, Parser)]
#[command(name = "clipdeck-cli")]
#[command(about = "Offline rendering and parity tools for the clipdeck playback engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file; defaults to clipdeck.config.toml discovery.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)]
    log_dir: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render a WAV file (or a generated tone) through the processor.
    Render(RenderArgs),
    /// Render the built-in demo scenario.
    Demo {
        #[arg(long, default_value = "data/renders/demo.wav")]
        output: PathBuf,
    },
    ParityReport {
        #[arg(long, default_value = "data/parity/report.json")]
        output: PathBuf,
    },
}

#[derive(Debug, Args)]
struct RenderArgs {
    /// Source WAV file. A sine tone is generated when omitted.
    #[arg(long)]
    input: Option<PathBuf>,

    #[arg(long, default_value = "data/renders/clip.wav")]
    output: PathBuf,

    #[arg(long, default_value_t = 440.0)]
    tone_hz: f64,

    #[arg(long, default_value_t = 1.0)]
    tone_seconds: f64,

    /// Total length of the render in seconds; defaults to the source length plus one second.
    #[arg(long)]
    seconds: Option<f64>,

    #[arg(long)]
    offset: Option<f64>,

    #[arg(long)]
    duration: Option<f64>,

    /// Stop time in seconds.
    #[arg(long)]
    stop_at: Option<f64>,

    #[arg(long = "loop")]
    looping: bool,

    #[arg(long)]
    loop_start: Option<f64>,

    #[arg(long)]
    loop_end: Option<f64>,

    #[arg(long, default_value_t = 0.0)]
    crossfade: f64,

    #[arg(long, default_value_t = 0.0)]
    fade_in: f64,

    #[arg(long, default_value_t = 0.0)]
    fade_out: f64,

    #[arg(long, default_value_t = 1.0, allow_hyphen_values = true)]
    rate: f32,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    detune: f32,

    #[arg(long, default_value_t = 1.0)]
    gain: f32,

    #[arg(long, default_value_t = 0.0, allow_hyphen_values = true)]
    pan: f32,

    #[arg(long, default_value_t = 20_000.0)]
    lowpass: f32,

    #[arg(long, default_value_t = 20.0)]
    highpass: f32,

    /// Features to switch off, e.g. `--disable pan --disable loop-crossfade`.
    #[arg(long)]
    disable: Vec<String>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => EngineConfig::load_from(path)?,
        None => EngineConfig::load_or_default()?,
    };
    if let Some(log_dir) = &cli.log_dir {
        config.diagnostics.log_dir.clone_from(log_dir);
    }
    let _telemetry = init_tracing_from_config(&config.diagnostics)?;

    match cli.command {
        Commands::Render(args) => render(config, args)?,
        Commands::Demo { output } => {
            let (config, buffer, script, frames) = demo_scenario()?;
            let rendered = render_clip(&config, buffer, &script, frames)?;
            write_wav(&output, &rendered)?;
            tracing::info!(path = %output.display(), "demo rendered");
        }
        Commands::ParityReport { output } => {
            let report = generate_parity_report()?;
            write_parity_report(&output, &report)?;
            tracing::info!(path = %output.display(), audio_hash = %report.audio_hash, "parity report generated");
        }
    }

    Ok(())
}

fn render(mut config: EngineConfig, args: RenderArgs) -> anyhow::Result<()> {
    let buffer = match &args.input {
        Some(path) => {
            let (buffer, sample_rate) = read_wav(path)?;
            config.sample_rate = sample_rate;
            buffer
        }
        None => {
            let frames = (args.tone_seconds.max(0.0) * f64::from(config.sample_rate)).round();
            sine_buffer(args.tone_hz, config.sample_rate, frames as usize, 0.5)
                .context("failed to generate tone")?
        }
    };

    let sample_rate = f64::from(config.sample_rate);
    let total_seconds = args
        .seconds
        .unwrap_or_else(|| buffer.duration_seconds(config.sample_rate) + 1.0);
    if !total_seconds.is_finite() || total_seconds <= 0.0 {
        bail!("render length must be positive, got {total_seconds}");
    }
    let total_frames = (total_seconds * sample_rate).round() as u64;

    let mut script = RenderScript::new()
        .with_params(ConstantParams {
            playback_rate: args.rate,
            detune: args.detune,
            gain: args.gain,
            pan: args.pan,
            lowpass: args.lowpass,
            highpass: args.highpass,
        })
        .at(0, Command::SetLoop(args.looping))
        .at(
            0,
            Command::SetLoopBounds {
                start: args.loop_start,
                end: args.loop_end,
            },
        )
        .at(0, Command::SetLoopCrossfade(args.crossfade))
        .at(0, Command::SetFadeIn(args.fade_in))
        .at(0, Command::SetFadeOut(args.fade_out));

    for name in &args.disable {
        let feature = Feature::from_name(name)
            .with_context(|| format!("unknown feature `{name}`"))?;
        script = script.at(
            0,
            Command::ToggleFeature {
                feature,
                enabled: Some(false),
            },
        );
    }

    script = script.at(
        0,
        Command::Start(StartOptions {
            when: None,
            offset: args.offset,
            duration: args.duration,
        }),
    );
    if let Some(stop_at) = args.stop_at {
        let frame = (stop_at.max(0.0) * sample_rate).floor() as u64;
        script = script.at(
            frame,
            Command::Stop {
                when: Some(stop_at),
            },
        );
    }

    let rendered = render_clip(&config, buffer, &script, total_frames)?;
    write_wav(&args.output, &rendered)?;
    tracing::info!(
        path = %args.output.display(),
        frames = rendered.frames(),
        notifications = rendered.notifications.len(),
        "clip rendered"
    );
    Ok(())
}
