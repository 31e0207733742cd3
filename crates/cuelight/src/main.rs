use std::net::IpAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use cuelight_core::{
    ArtNetConfig, ArtNetController, AudioPlayer, ConfigManager, FixtureController,
    FreeRunningClock, MediaClock, Performance, Settings, ShowCommand, ShowLoader,
};

/// Plays a show's media with lyrics, a spectrum and per-zone particles, and
/// drives Art-Net fixtures from its cue tracks.
#[derive(Parser, Debug)]
#[command(name = "cuelight")]
#[command(about = "Cue-driven audiovisual performance")]
struct Args {
    /// Show file (JSON) describing the media and its cue tracks
    show: PathBuf,

    /// Play this media file instead of the one named by the show
    #[arg(long)]
    media: Option<PathBuf>,

    /// Settings file (default: ./config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Art-Net Destination IP address (optional - if not provided, broadcast mode will be used)
    #[arg(long, value_parser = parse_ip)]
    dest_ip: Option<IpAddr>,

    /// Art-Net port
    #[arg(long)]
    artnet_port: Option<u16>,

    /// Force broadcast mode even if destination IP is provided
    #[arg(long, default_value = "false")]
    broadcast: bool,

    /// Disable fixture output entirely
    #[arg(long, default_value = "false")]
    no_artnet: bool,

    /// Connect to the fixtures as soon as the show starts
    #[arg(long, default_value = "false")]
    connect: bool,
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

fn apply_overrides(settings: &mut Settings, args: &Args) {
    if let Some(ip) = args.dest_ip {
        settings.artnet_dest_ip = ip.to_string();
        settings.artnet_broadcast = false;
    }
    if args.broadcast {
        settings.artnet_broadcast = true;
    }
    if let Some(port) = args.artnet_port {
        settings.artnet_port = port;
    }
    if args.no_artnet {
        settings.artnet_enabled = false;
    }
    if args.connect {
        settings.connect_fixtures_on_start = true;
    }
}

fn fixture_controller(settings: &Settings) -> Option<Box<dyn FixtureController>> {
    if !settings.artnet_enabled {
        log::info!("Fixture output disabled");
        return None;
    }

    let dest_ip = if settings.artnet_broadcast {
        None
    } else {
        settings.artnet_dest_ip.parse::<IpAddr>().ok()
    };
    let config = ArtNetConfig::new(dest_ip, settings.artnet_port, settings.artnet_broadcast);
    log::info!("Art-Net output: {:?}", config.mode);

    Some(Box::new(ArtNetController::new(config)))
}

fn main() -> Result<(), anyhow::Error> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config = ConfigManager::new(args.config.clone());
    let mut settings = config.load().context("Failed to load settings")?;
    apply_overrides(&mut settings, &args);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let loader = ShowLoader::new(settings.artnet_universe).with_media_override(args.media.clone());
    let show = runtime
        .block_on(loader.load(&args.show))
        .with_context(|| format!("Failed to load show {}", args.show.display()))?;

    log::info!(
        "Loaded '{}': {} tracks, {} fixtures, {:.1}s of media",
        show.title,
        show.tracks.len(),
        show.fixtures.len(),
        show.media.duration_seconds()
    );

    let clock: Arc<dyn MediaClock> = match AudioPlayer::open(&show.media) {
        Ok(player) => Arc::new(player),
        Err(e) => {
            log::warn!("{}; continuing without sound", e);
            Arc::new(FreeRunningClock::new(Some(show.media.duration_seconds())))
        }
    };

    let controller = fixture_controller(&settings);
    let volume = settings.volume;
    let performance = Performance::new(show, settings, clock, controller);
    let stage = performance.stage();

    let (command_tx, command_rx) = tokio::sync::mpsc::unbounded_channel();
    let (event_tx, event_rx) = std::sync::mpsc::channel();

    let handle = runtime.spawn(performance.run(command_rx, event_tx));

    let ui_result = cuelight_ui::run_ui(stage, volume, command_tx.clone(), event_rx);

    // The window may close without the shell getting a chance to ask.
    let _ = command_tx.send(ShowCommand::Shutdown);
    match runtime.block_on(tokio::time::timeout(Duration::from_secs(3), handle)) {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(e))) => log::error!("Performance failed: {:#}", e),
        Ok(Err(e)) => log::error!("Performance task panicked: {}", e),
        Err(_) => log::warn!("Performance did not stop in time"),
    }

    ui_result.map_err(|e| anyhow::anyhow!("UI error: {}", e))
}
