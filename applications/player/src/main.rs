/// Tapedeck - terminal audio player with a live level meter
use anyhow::Context;
use clap::{Parser, ValueEnum};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tapedeck_core::RepeatMode;
use tapedeck_desktop::{CpalRenderGraph, LoftyMetadataLoader};
use tapedeck_player::{config, meter, tracks};
use tapedeck_playback::{MetadataTasks, PlaybackEngine, PlaybackEvent, PlaybackState, SystemClock};
use tapedeck_viz::VisualizerPipeline;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Spectrum bands shown in the meter
const METER_BANDS: usize = 24;

#[derive(Parser)]
#[command(name = "tapedeck")]
#[command(about = "Play audio files with a live spectrum meter", long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Shuffle the playlist
    #[arg(long)]
    shuffle: bool,

    /// Repeat mode
    #[arg(long, value_enum)]
    repeat: Option<RepeatArg>,

    /// Seed for the shuffle order
    #[arg(long)]
    seed: Option<u64>,

    /// Initial volume (0.0 - 1.0)
    #[arg(long)]
    volume: Option<f32>,

    /// Hide the level meter
    #[arg(long)]
    quiet: bool,

    /// Audio files (or stream URLs, which are reported and skipped)
    #[arg(required = true)]
    files: Vec<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum RepeatArg {
    Off,
    All,
    One,
}

impl From<RepeatArg> for RepeatMode {
    fn from(arg: RepeatArg) -> Self {
        match arg {
            RepeatArg::Off => Self::Off,
            RepeatArg::All => Self::All,
            RepeatArg::One => Self::One,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            "tapedeck=info,tapedeck_playback=info,tapedeck_desktop=info".into()
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let mut settings = config::load(cli.config.as_deref()).context("loading configuration")?;
    if cli.shuffle {
        settings.playback.shuffle = true;
    }
    if let Some(repeat) = cli.repeat {
        settings.playback.repeat = repeat.into();
    }
    if let Some(volume) = cli.volume {
        settings.playback.volume = volume;
    }
    settings.validate()?;

    let mut graph = CpalRenderGraph::new().context("opening audio output")?;
    let format = graph.output_format();
    info!("Audio output: {} Hz, {} channels", format.sample_rate, format.channels);

    let mut pipeline = VisualizerPipeline::new(&settings.visualizer)?;
    if !pipeline.install_tap(&mut graph) {
        warn!("Visualizer tap could not be installed; meter disabled");
    }

    let metadata = MetadataTasks::new(LoftyMetadataLoader::new())?;
    let mut engine = PlaybackEngine::new(graph, &settings.playback, Box::new(SystemClock))
        .with_metadata(metadata);
    if let Some(seed) = cli.seed {
        engine.seed_shuffle(seed);
    }

    for track in tracks::placeholders(cli.files.iter().map(String::as_str)) {
        engine.add_track(track);
    }
    engine.play()?;

    run(&mut engine, &mut pipeline, !cli.quiet);

    pipeline.remove_tap(engine.graph_mut());
    engine.stop();
    if !cli.quiet {
        println!();
    }
    info!("Playback finished");
    Ok(())
}

/// Drive the engine and the visualizer until the playlist ends
fn run(
    engine: &mut PlaybackEngine<CpalRenderGraph>,
    pipeline: &mut VisualizerPipeline,
    show_meter: bool,
) {
    let mut last_poll = Instant::now();
    // Tracks skipped in a row; once every entry was skipped there is nothing to play
    let mut skipped = 0usize;

    loop {
        std::thread::sleep(pipeline.poll_interval());
        engine.pump();

        for event in engine.drain_events() {
            match event {
                PlaybackEvent::StateChanged { state } => {
                    if state == PlaybackState::Playing {
                        skipped = 0;
                    }
                }
                PlaybackEvent::TrackChanged { track_id, .. } => {
                    if let Some(track) = engine.playlist().track(&track_id) {
                        info!("Now playing: {} - {}", track.artist, track.title);
                    }
                }
                PlaybackEvent::MetadataResolved { track_id } => {
                    if let Some(track) = engine.playlist().track(&track_id) {
                        info!(
                            "Resolved: {} - {} ({:.1}s)",
                            track.artist, track.title, track.duration_secs
                        );
                    }
                }
                PlaybackEvent::HandOffToExternalPlayer { track, kind } => {
                    warn!(
                        "Skipping {} ({:?} needs an external player)",
                        track.locator.display_name(),
                        kind
                    );
                    skipped += 1;
                    if skipped >= engine.playlist().len() {
                        return;
                    }
                    engine.next_track(true);
                }
                PlaybackEvent::LoadFailed { reason, .. } => {
                    warn!("Could not load track: {}", reason);
                    skipped += 1;
                    if skipped >= engine.playlist().len() {
                        return;
                    }
                    engine.next_track(true);
                }
                PlaybackEvent::PlaylistEnded => return,
                PlaybackEvent::Progress { .. } | PlaybackEvent::PlaybackEnded { .. } => {}
            }
        }

        let now = Instant::now();
        pipeline.poll(now - last_poll);
        last_poll = now;

        if show_meter {
            let title = engine.current_track().map_or("", |t| t.title.as_str());
            let levels = pipeline.get_frequency_data(METER_BANDS);
            let line = meter::status_line(&levels, engine.current_time(), engine.duration(), title);
            let mut stdout = std::io::stdout().lock();
            let _ = write!(stdout, "\r{line}\x1b[K");
            let _ = stdout.flush();
        }
    }
}
