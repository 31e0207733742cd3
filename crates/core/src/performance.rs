use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};

use crate::audio::{AnalyserConfig, MediaBuffer, MediaClock, SignalGraph};
use crate::cue::cue::{CueValue, Zone};
use crate::cue::cue_sync::CueSync;
use crate::cue::track::TrackEngine;
use crate::fixture::{FixtureBridge, FixtureController};
use crate::messages::{PlaybackState, Settings, ShowCommand, ShowEvent};
use crate::modules::{FixtureModule, ModuleEvent, ModuleId, ModuleManager, ModuleMessage};
use crate::render::{
    ColorChannel, FrameBuffer, ParticleConfig, ParticleField, RenderLoops, SpectrumConfig,
    SpectrumRenderer, Viewport,
};
use crate::show::show::Show;
use crate::state::{LyricState, ZoneColorState};

pub const SPECTRUM_LOOP: &str = "spectrum";

const DEFAULT_SPECTRUM_VIEWPORT: Viewport = Viewport::new(800, 200);
const DEFAULT_ZONE_VIEWPORT: Viewport = Viewport::new(400, 300);

/// Name of the render loop drawing `zone`'s particle field.
pub fn particle_loop_name(zone: &Zone) -> String {
    format!("particles:{}", zone)
}

/// Shared handles the shell draws from.
#[derive(Clone)]
pub struct Stage {
    pub title: String,
    pub spectrum: Arc<Mutex<FrameBuffer>>,
    pub zones: Vec<(Zone, Arc<Mutex<FrameBuffer>>)>,
    pub lyrics: Arc<LyricState>,
    pub zone_colors: Arc<ZoneColorState>,
}

struct ZoneOutput {
    zone: Zone,
    surface: Arc<Mutex<FrameBuffer>>,
    viewport: watch::Sender<Viewport>,
    color: ColorChannel,
    /// Moved into the zone's render loop on initialization.
    field: Option<ParticleField>,
}

/// Plays one show.
///
/// Drives the track engine from the media clock, feeds activation changes
/// into [`CueSync`], runs the spectrum and particle render loops, and forwards
/// every zone value change to the fixture module.
pub struct Performance {
    title: String,
    settings: Settings,
    media: MediaBuffer,
    clock: Arc<dyn MediaClock>,

    zone_colors: Arc<ZoneColorState>,
    lyrics: Arc<LyricState>,
    engine: TrackEngine,
    cue_sync: CueSync,
    zone_updates: mpsc::UnboundedReceiver<(Zone, CueValue)>,
    zone_updates_tx: mpsc::UnboundedSender<(Zone, CueValue)>,

    render_loops: RenderLoops,
    spectrum_surface: Arc<Mutex<FrameBuffer>>,
    spectrum_viewport: watch::Sender<Viewport>,
    zones: Vec<ZoneOutput>,

    module_manager: ModuleManager,
    message_rx: Option<mpsc::Receiver<ModuleMessage>>,
    fixture_tx: Option<mpsc::Sender<ModuleEvent>>,

    playback_state: PlaybackState,
    last_position: Option<f64>,
    lyric_revision: u64,
    startup_errors: Vec<String>,
    is_running: bool,
}

impl Performance {
    /// `controller` is `None` when fixture output is disabled.
    pub fn new(
        show: Show,
        settings: Settings,
        clock: Arc<dyn MediaClock>,
        controller: Option<Box<dyn FixtureController>>,
    ) -> Self {
        let fallback_color = show
            .fallback_color
            .clone()
            .unwrap_or_else(|| settings.fallback_color.clone());
        let zone_list = show.zones();

        let zone_colors = Arc::new(ZoneColorState::new(zone_list.clone(), &fallback_color));
        let lyrics = Arc::new(LyricState::new());
        let engine = TrackEngine::new(show.tracks);
        let cue_sync = CueSync::new(Arc::clone(&zone_colors), Arc::clone(&lyrics));
        let (zone_updates_tx, zone_updates) = mpsc::unbounded_channel();

        let particle_config = ParticleConfig {
            cluster_count: settings.cluster_count,
            particles_per_cluster: settings.particles_per_cluster,
            ..ParticleConfig::default()
        };

        let zones = zone_list
            .into_iter()
            .map(|zone| {
                let (viewport, _) = watch::channel(DEFAULT_ZONE_VIEWPORT);
                let (field, color) = ParticleField::new(
                    zone.clone(),
                    particle_config.clone(),
                    zone_colors.color(&zone),
                );
                ZoneOutput {
                    zone,
                    surface: Arc::new(Mutex::new(FrameBuffer::new(
                        DEFAULT_ZONE_VIEWPORT.width,
                        DEFAULT_ZONE_VIEWPORT.height,
                    ))),
                    viewport,
                    color,
                    field: Some(field),
                }
            })
            .collect();

        let mut module_manager = ModuleManager::new();
        if let Some(controller) = controller {
            let bridge = FixtureBridge::new(controller, show.fixtures, zone_colors.fallback_color());
            module_manager.register_module(Box::new(FixtureModule::new(
                Arc::new(bridge),
                settings.connect_fixtures_on_start,
            )));
        }

        let (spectrum_viewport, _) = watch::channel(DEFAULT_SPECTRUM_VIEWPORT);

        Self {
            title: show.title,
            settings,
            media: show.media,
            clock,
            zone_colors,
            lyrics,
            engine,
            cue_sync,
            zone_updates,
            zone_updates_tx,
            render_loops: RenderLoops::new(),
            spectrum_surface: Arc::new(Mutex::new(FrameBuffer::new(
                DEFAULT_SPECTRUM_VIEWPORT.width,
                DEFAULT_SPECTRUM_VIEWPORT.height,
            ))),
            spectrum_viewport,
            zones,
            module_manager,
            message_rx: None,
            fixture_tx: None,
            playback_state: PlaybackState::Stopped,
            last_position: None,
            lyric_revision: 0,
            startup_errors: Vec::new(),
            is_running: false,
        }
    }

    pub fn stage(&self) -> Stage {
        Stage {
            title: self.title.clone(),
            spectrum: Arc::clone(&self.spectrum_surface),
            zones: self
                .zones
                .iter()
                .map(|output| (output.zone.clone(), Arc::clone(&output.surface)))
                .collect(),
            lyrics: Arc::clone(&self.lyrics),
            zone_colors: Arc::clone(&self.zone_colors),
        }
    }

    pub fn zone_colors(&self) -> &Arc<ZoneColorState> {
        &self.zone_colors
    }

    pub fn lyrics(&self) -> &Arc<LyricState> {
        &self.lyrics
    }

    pub fn cue_sync(&self) -> &CueSync {
        &self.cue_sync
    }

    pub fn render_loops(&self) -> &RenderLoops {
        &self.render_loops
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.playback_state
    }

    pub fn has_fixture_output(&self) -> bool {
        self.fixture_tx.is_some()
    }

    /// Color channel of `zone`'s particle field.
    pub fn color_channel(&self, zone: &Zone) -> Option<&ColorChannel> {
        self.zones
            .iter()
            .find(|output| &output.zone == zone)
            .map(|output| &output.color)
    }

    /// Starts the modules, registers the cue tracks and the render loops.
    ///
    /// A spectrum that cannot attach to the media is reported and left off;
    /// everything else keeps running.
    pub async fn initialize(&mut self) -> Result<(), anyhow::Error> {
        if self.is_running {
            return Ok(());
        }
        log::info!("Initializing performance of '{}'...", self.title);

        self.module_manager
            .initialize()
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        self.module_manager
            .start()
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        self.message_rx = self.module_manager.take_message_receiver();
        self.fixture_tx = self.module_manager.sender(&ModuleId::Fixture);

        // Subscribe before attaching so no zone change is missed.
        for output in &self.zones {
            let color = output.color.clone();
            let updates = self.zone_updates_tx.clone();
            let fallback = self.zone_colors.fallback_color();
            self.cue_sync.subscribe(output.zone.clone(), move |zone, value| {
                color.set_color(value.rgba_or(fallback));
                let _ = updates.send((zone.clone(), value.clone()));
            });
        }
        let registered = self.cue_sync.attach(&self.engine);
        log::info!("Registered {} cue track(s)", registered);

        self.start_render_loops();
        self.clock.set_volume(self.settings.volume);

        self.is_running = true;
        log::info!("Performance initialized");
        Ok(())
    }

    fn start_render_loops(&mut self) {
        let fps = self.settings.target_fps;

        match self.attach_signal() {
            Ok(signal) => {
                let spectrum = SpectrumRenderer::new(
                    SpectrumConfig {
                        waveform_line_width: self.settings.waveform_line_width,
                        ..SpectrumConfig::default()
                    },
                    Arc::clone(&self.zone_colors),
                )
                .with_signal(Box::new(signal));
                log::debug!("Spectrum attached: {}", spectrum.diagnostics());
                self.render_loops.start(
                    SPECTRUM_LOOP,
                    Box::new(spectrum),
                    Arc::clone(&self.spectrum_surface),
                    self.spectrum_viewport.subscribe(),
                    fps,
                );
            }
            Err(e) => {
                let message = format!("Spectrum disabled: {}", e);
                log::error!("{}", message);
                self.startup_errors.push(message);
            }
        }

        for output in &mut self.zones {
            let Some(field) = output.field.take() else {
                continue;
            };
            self.render_loops.start(
                &particle_loop_name(&output.zone),
                Box::new(field),
                Arc::clone(&output.surface),
                output.viewport.subscribe(),
                fps,
            );
        }
    }

    fn attach_signal(&self) -> Result<SignalGraph, crate::render::RenderError> {
        SignalGraph::attach(
            &self.media,
            Arc::clone(&self.clock),
            AnalyserConfig {
                fft_size: self.settings.fft_size,
                smoothing_time_constant: self.settings.smoothing_time_constant,
                min_decibels: self.settings.min_decibels,
                max_decibels: self.settings.max_decibels,
            },
        )
    }

    /// One transport pass: advance the tracks to the clock position and
    /// publish whatever changed.
    pub async fn tick(&mut self, event_tx: &std::sync::mpsc::Sender<ShowEvent>) {
        if self.engine.take_ready_signal() {
            let registered = self.cue_sync.tracks_ready(&self.engine);
            log::debug!("Tracks ready, {} late registration(s)", registered);
        }

        let position = self.clock.position();
        for change in self.engine.advance(position) {
            self.cue_sync.handle_change(&change);
        }

        while let Ok((zone, value)) = self.zone_updates.try_recv() {
            if let Some(fixture_tx) = &self.fixture_tx {
                let event = ModuleEvent::ZoneCue {
                    zone: zone.clone(),
                    value: value.clone(),
                };
                if let Err(e) = fixture_tx.send(event).await {
                    log::warn!("Fixture module unavailable: {}", e);
                }
            }
            let _ = event_tx.send(ShowEvent::ZoneColorChanged { zone, value });
        }

        let revision = self.lyrics.revision();
        if revision != self.lyric_revision {
            self.lyric_revision = revision;
            let _ = event_tx.send(ShowEvent::LyricsChanged {
                lines: self.lyrics.lines(),
            });
        }

        if self.last_position != Some(position) {
            self.last_position = Some(position);
            let _ = event_tx.send(ShowEvent::PositionUpdated {
                seconds: position,
                duration: Some(self.media.duration_seconds()),
            });
        }

        if self.playback_state == PlaybackState::Playing && !self.clock.is_playing() {
            log::info!("Playback finished");
            self.clock.stop();
            self.set_playback_state(PlaybackState::Stopped, event_tx);
        }
    }

    fn set_playback_state(
        &mut self,
        state: PlaybackState,
        event_tx: &std::sync::mpsc::Sender<ShowEvent>,
    ) {
        if self.playback_state != state {
            self.playback_state = state;
            let _ = event_tx.send(ShowEvent::PlaybackStateChanged { state });
        }
    }

    async fn send_to_fixtures(
        fixture_tx: Option<&mpsc::Sender<ModuleEvent>>,
        event: ModuleEvent,
        event_tx: &std::sync::mpsc::Sender<ShowEvent>,
    ) {
        match fixture_tx {
            Some(fixture_tx) => {
                if let Err(e) = fixture_tx.send(event).await {
                    log::error!("Fixture module unavailable: {}", e);
                    let _ = event_tx.send(ShowEvent::Error {
                        message: format!("Fixture module unavailable: {}", e),
                    });
                }
            }
            None => {
                log::warn!("Fixture output is disabled");
                let _ = event_tx.send(ShowEvent::Status {
                    message: "Fixture output is disabled".to_string(),
                });
            }
        }
    }

    /// Process a command from the shell. `Shutdown` is handled by [`Performance::run`].
    pub async fn process_command(
        &mut self,
        command: ShowCommand,
        event_tx: &std::sync::mpsc::Sender<ShowEvent>,
    ) {
        log::debug!("Processing command: {:?}", command);

        match command {
            ShowCommand::Play => {
                self.clock.play();
                self.set_playback_state(PlaybackState::Playing, event_tx);
            }
            ShowCommand::Pause => {
                self.clock.pause();
                self.set_playback_state(PlaybackState::Paused, event_tx);
            }
            ShowCommand::Stop => {
                self.clock.stop();
                self.set_playback_state(PlaybackState::Stopped, event_tx);
            }
            ShowCommand::SetVolume(volume) => {
                self.settings.volume = volume.clamp(0.0, 1.0);
                self.clock.set_volume(self.settings.volume);
            }
            ShowCommand::ConnectFixtures => {
                Self::send_to_fixtures(
                    self.fixture_tx.as_ref(),
                    ModuleEvent::ConnectFixtures,
                    event_tx,
                )
                .await
            }
            ShowCommand::DisconnectFixtures => {
                Self::send_to_fixtures(
                    self.fixture_tx.as_ref(),
                    ModuleEvent::DisconnectFixtures,
                    event_tx,
                )
                .await
            }
            ShowCommand::ClearFixtures => {
                Self::send_to_fixtures(
                    self.fixture_tx.as_ref(),
                    ModuleEvent::ClearFixtures,
                    event_tx,
                )
                .await
            }
            ShowCommand::ResizeSpectrum(viewport) => {
                self.spectrum_viewport.send_if_modified(|current| {
                    let changed = *current != viewport;
                    *current = viewport;
                    changed
                });
            }
            ShowCommand::ResizeZone { zone, viewport } => {
                match self.zones.iter().find(|output| output.zone == zone) {
                    Some(output) => {
                        output.viewport.send_if_modified(|current| {
                            let changed = *current != viewport;
                            *current = viewport;
                            changed
                        });
                    }
                    None => log::warn!("Resize for unknown zone {}", zone),
                }
            }
            ShowCommand::Shutdown => {}
        }
    }

    fn handle_module_message(
        message: ModuleMessage,
        event_tx: &std::sync::mpsc::Sender<ShowEvent>,
    ) {
        match message {
            ModuleMessage::Event(ModuleEvent::FixtureStateChanged(state)) => {
                let _ = event_tx.send(ShowEvent::FixtureStateChanged { state });
            }
            ModuleMessage::Event(_) => {}
            ModuleMessage::Status(status) => {
                log::info!("Module status: {}", status);
                let _ = event_tx.send(ShowEvent::Status { message: status });
            }
            ModuleMessage::Error(error) => {
                log::error!("Module error: {}", error);
                let _ = event_tx.send(ShowEvent::Error { message: error });
            }
        }
    }

    /// Stops the render loops, the media and every module.
    pub async fn shutdown(&mut self) -> Result<(), anyhow::Error> {
        log::info!("Shutting down performance...");
        self.render_loops.shutdown().await;
        self.clock.stop();
        self.module_manager
            .shutdown()
            .await
            .map_err(|e| anyhow::anyhow!(e))?;
        for (id, status) in self.module_manager.get_status() {
            log::debug!("Module {:?} final status: {:?}", id, status);
        }
        self.fixture_tx = None;
        self.is_running = false;
        log::info!("Performance shutdown complete");
        Ok(())
    }

    /// Run the performance with channel-based communication until `Shutdown`
    /// arrives or the shell drops its command sender.
    pub async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<ShowCommand>,
        event_tx: std::sync::mpsc::Sender<ShowEvent>,
    ) -> Result<(), anyhow::Error> {
        self.initialize().await?;

        let _ = event_tx.send(ShowEvent::Status {
            message: format!("Loaded '{}'", self.title),
        });
        for message in std::mem::take(&mut self.startup_errors) {
            let _ = event_tx.send(ShowEvent::Error { message });
        }

        let period = Duration::from_secs_f64(1.0 / self.settings.target_fps.max(1) as f64);
        let mut transport = tokio::time::interval(period);
        transport.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut message_rx = self.message_rx.take();

        loop {
            tokio::select! {
                command = command_rx.recv() => {
                    match command {
                        Some(ShowCommand::Shutdown) | None => {
                            log::info!("Received shutdown command");
                            break;
                        }
                        Some(command) => self.process_command(command, &event_tx).await,
                    }
                }

                _ = transport.tick() => {
                    self.tick(&event_tx).await;
                }

                Some(message) = async {
                    match message_rx.as_mut() {
                        Some(rx) => rx.recv().await,
                        None => std::future::pending().await,
                    }
                } => {
                    Self::handle_module_message(message, &event_tx);
                }
            }
        }

        self.shutdown().await?;
        let _ = event_tx.send(ShowEvent::ShutdownComplete);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::mpsc as std_mpsc;

    use async_trait::async_trait;
    use cuelight_fixtures::FixtureLibrary;

    use super::*;
    use crate::audio::FreeRunningClock;
    use crate::color::Rgba;
    use crate::cue::cue::{LyricCue, MetadataCue};
    use crate::cue::track::CueTrack;
    use crate::fixture::{DmxPayload, FixtureError};

    #[derive(Default)]
    struct RecordingController {
        connected: bool,
        payloads: Arc<Mutex<Vec<DmxPayload>>>,
    }

    #[async_trait]
    impl FixtureController for RecordingController {
        async fn connect(&mut self) -> Result<(), FixtureError> {
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), FixtureError> {
            self.connected = false;
            Ok(())
        }

        async fn update(&mut self, payload: &DmxPayload) -> Result<(), FixtureError> {
            self.payloads.lock().push(payload.clone());
            Ok(())
        }

        async fn send(&mut self) -> Result<(), FixtureError> {
            Ok(())
        }

        async fn clear(&mut self) -> Result<(), FixtureError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn show(media: MediaBuffer) -> Show {
        let library = FixtureLibrary::new();
        Show {
            title: "Test".to_string(),
            media_path: "test.wav".into(),
            media,
            fallback_color: Some("#000000".to_string()),
            tracks: vec![
                CueTrack::lyric(
                    "English",
                    vec![LyricCue {
                        text: "line one\nline two".to_string(),
                        start_time: 1.0,
                        end_time: 2.0,
                    }],
                ),
                CueTrack::metadata(
                    Zone::from("left"),
                    vec![MetadataCue::lighting(CueValue::with_color("#ff0000"), 1.0, 3.0)],
                ),
                CueTrack::metadata(Zone::from("right"), Vec::new()),
            ],
            fixtures: vec![library
                .patch("Left PAR", "left", "generic-rgb", 1, 1)
                .unwrap()],
        }
    }

    fn media(seconds: usize) -> MediaBuffer {
        MediaBuffer::from_interleaved(vec![0.25; 8000 * seconds], 1, 8000).unwrap()
    }

    #[tokio::test]
    async fn test_tick_publishes_zone_and_lyric_changes() {
        let clock = Arc::new(FreeRunningClock::new(Some(4.0)));
        let payloads = Arc::new(Mutex::new(Vec::new()));
        let controller = RecordingController {
            connected: false,
            payloads: Arc::clone(&payloads),
        };
        let settings = Settings {
            connect_fixtures_on_start: true,
            ..Settings::default()
        };

        let mut performance = Performance::new(
            show(media(4)),
            settings,
            clock.clone(),
            Some(Box::new(controller)),
        );
        performance.initialize().await.unwrap();
        assert!(performance.has_fixture_output());

        let (event_tx, event_rx) = std_mpsc::channel();
        performance.tick(&event_tx).await;
        assert_eq!(performance.zone_colors().get(&Zone::from("left")).color, "#000000");

        clock.seek(1.5);
        performance.tick(&event_tx).await;

        let left = Zone::from("left");
        assert_eq!(performance.zone_colors().get(&left).color, "#ff0000");
        assert_eq!(
            performance.color_channel(&left).unwrap().color(),
            Rgba::rgb(255, 0, 0)
        );
        assert_eq!(*performance.lyrics().lines(), vec!["line one", "line two"]);

        let events: Vec<ShowEvent> = event_rx.try_iter().collect();
        assert!(events.iter().any(|e| matches!(
            e,
            ShowEvent::ZoneColorChanged { zone, value } if zone == &left && value.color == "#ff0000"
        )));
        assert!(events
            .iter()
            .any(|e| matches!(e, ShowEvent::LyricsChanged { lines } if lines.len() == 2)));

        for _ in 0..100 {
            if !payloads.lock().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(payloads.lock()[0].zone, left);

        clock.seek(3.5);
        performance.tick(&event_tx).await;
        assert_eq!(performance.zone_colors().get(&left).color, "#000000");
        assert!(performance.lyrics().lines().is_empty());

        performance.shutdown().await.unwrap();
        assert!(performance.render_loops().is_empty());
    }

    #[tokio::test]
    async fn test_render_loops_start_per_zone() {
        let clock = Arc::new(FreeRunningClock::new(None));
        let mut performance = Performance::new(show(media(1)), Settings::default(), clock, None);
        performance.initialize().await.unwrap();

        assert_eq!(
            performance.render_loops().names(),
            vec!["particles:left", "particles:right", "spectrum"]
        );
        assert!(!performance.has_fixture_output());
        assert_eq!(performance.stage().zones.len(), 2);

        performance.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_spectrum_failure_leaves_particles_running() {
        let clock = Arc::new(FreeRunningClock::new(None));
        let settings = Settings {
            fft_size: 1000,
            ..Settings::default()
        };
        let mut performance = Performance::new(show(media(1)), settings, clock, None);
        performance.initialize().await.unwrap();

        let names = performance.render_loops().names();
        assert!(!names.contains(&SPECTRUM_LOOP.to_string()));
        assert_eq!(names.len(), 2);

        performance.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_transport_commands_report_state() {
        let clock = Arc::new(FreeRunningClock::new(Some(10.0)));
        let mut performance =
            Performance::new(show(media(1)), Settings::default(), clock.clone(), None);
        let (event_tx, event_rx) = std_mpsc::channel();

        performance.process_command(ShowCommand::Play, &event_tx).await;
        assert!(clock.is_playing());
        performance.process_command(ShowCommand::Play, &event_tx).await;
        performance.process_command(ShowCommand::Pause, &event_tx).await;
        assert!(!clock.is_playing());
        performance.process_command(ShowCommand::ClearFixtures, &event_tx).await;

        let states: Vec<PlaybackState> = event_rx
            .try_iter()
            .filter_map(|e| match e {
                ShowEvent::PlaybackStateChanged { state } => Some(state),
                _ => None,
            })
            .collect();
        assert_eq!(states, vec![PlaybackState::Playing, PlaybackState::Paused]);
        assert_eq!(performance.playback_state(), PlaybackState::Paused);
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let clock = Arc::new(FreeRunningClock::new(None));
        let performance = Performance::new(show(media(1)), Settings::default(), clock, None);
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = std_mpsc::channel();

        let handle = tokio::spawn(performance.run(command_rx, event_tx));
        command_tx.send(ShowCommand::Shutdown).unwrap();
        handle.await.unwrap().unwrap();

        let events: Vec<ShowEvent> = event_rx.try_iter().collect();
        assert!(matches!(events.last(), Some(ShowEvent::ShutdownComplete)));
    }
}
