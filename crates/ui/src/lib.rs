use std::time::{Duration, Instant};
use tokio::sync::mpsc;

use cuelight_core::{particle_loop_name, ShowCommand, ShowEvent, Stage, SPECTRUM_LOOP};
use eframe::egui::{self, RichText};

use crate::canvas::SurfaceCanvas;
use crate::state::ShowState;
use crate::utils::theme::Theme;

mod canvas;
mod footer;
mod header;
mod state;
mod utils;

const SPECTRUM_HEIGHT: f32 = 200.0;
const ZONE_HEIGHT: f32 = 300.0;

pub struct CuelightApp {
    state: ShowState,
    stage: Stage,

    // Communication channels
    command_tx: mpsc::UnboundedSender<ShowCommand>,
    event_rx: std::sync::mpsc::Receiver<ShowEvent>,

    spectrum: SurfaceCanvas,
    zones: Vec<SurfaceCanvas>,
    last_update: Instant,
    shutdown_sent: bool,
    fps: u32,
}

impl CuelightApp {
    fn new(
        cc: &eframe::CreationContext<'_>,
        stage: Stage,
        volume: f32,
        command_tx: mpsc::UnboundedSender<ShowCommand>,
        event_rx: std::sync::mpsc::Receiver<ShowEvent>,
    ) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let zones = stage
            .zones
            .iter()
            .map(|(zone, _)| SurfaceCanvas::new(particle_loop_name(zone)))
            .collect();

        Self {
            state: ShowState::new(stage.title.clone(), volume),
            stage,
            command_tx,
            event_rx,
            spectrum: SurfaceCanvas::new(SPECTRUM_LOOP),
            zones,
            last_update: Instant::now(),
            shutdown_sent: false,
            fps: 60,
        }
    }

    fn process_engine_updates(&mut self) {
        while let Ok(event) = self.event_rx.try_recv() {
            self.state.update(event);
        }
    }

    fn render_ui(&mut self, ctx: &egui::Context) {
        let theme = Theme::default();

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            header::render(ui, &self.command_tx, &mut self.state, &self.stage.zone_colors);
        });

        egui::TopBottomPanel::bottom("footer_panel").show(ctx, |ui| {
            footer::render(ui, &self.state, self.fps);
        });

        egui::CentralPanel::default()
            .frame(egui::Frame::new().fill(theme.bg_color))
            .show(ctx, |ui| {
                let width = ui.available_width();
                if let Some(viewport) =
                    self.spectrum
                        .show(ui, &self.stage.spectrum, egui::vec2(width, SPECTRUM_HEIGHT))
                {
                    let _ = self.command_tx.send(ShowCommand::ResizeSpectrum(viewport));
                }

                ui.add_space(12.0);
                render_lyrics(ui, &self.state, &theme);
                ui.add_space(12.0);

                let count = self.zones.len().max(1) as f32;
                let spacing = ui.spacing().item_spacing.x;
                let zone_width = ((width - spacing * (count - 1.0)) / count).max(1.0);
                let zone_height = ZONE_HEIGHT.min(ui.available_height()).max(1.0);

                ui.horizontal(|ui| {
                    for ((zone, surface), canvas) in self.stage.zones.iter().zip(&mut self.zones) {
                        let size = egui::vec2(zone_width, zone_height);
                        if let Some(viewport) = canvas.show(ui, surface, size) {
                            let _ = self.command_tx.send(ShowCommand::ResizeZone {
                                zone: zone.clone(),
                                viewport,
                            });
                        }
                    }
                });
            });
    }

    fn request_shutdown(&mut self) {
        if !self.shutdown_sent {
            log::info!("Window closing, stopping performance");
            let _ = self.command_tx.send(ShowCommand::Shutdown);
            self.shutdown_sent = true;
        }
    }
}

impl eframe::App for CuelightApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_update).as_secs_f32();
        if elapsed > 0.0 {
            self.fps = (1.0 / elapsed).round() as u32;
        }
        self.last_update = now;

        // Process all updates first
        self.process_engine_updates();

        if ctx.input(|i| i.viewport().close_requested()) {
            self.request_shutdown();
        }

        self.render_ui(ctx);

        // The particle fields keep drifting while paused.
        if self.state.is_playing() {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(33));
        }
    }
}

fn render_lyrics(ui: &mut egui::Ui, state: &ShowState, theme: &Theme) {
    egui::Frame::new()
        .fill(theme.element_bg)
        .inner_margin(12.0)
        .show(ui, |ui| {
            ui.set_min_width(ui.available_width());
            ui.vertical_centered(|ui| {
                if state.lyrics.is_empty() {
                    ui.label(RichText::new(" ").size(theme.lyric_size));
                }
                for line in state.lyrics.iter() {
                    ui.label(
                        RichText::new(line)
                            .size(theme.lyric_size)
                            .color(theme.text_color),
                    );
                }
            });
        });
}

pub fn run_ui(
    stage: Stage,
    volume: f32,
    command_tx: mpsc::UnboundedSender<ShowCommand>,
    event_rx: std::sync::mpsc::Receiver<ShowEvent>,
) -> eframe::Result {
    let title = format!("cuelight - {}", stage.title);
    let native_options = eframe::NativeOptions {
        viewport: eframe::egui::ViewportBuilder {
            title: Some(title),
            app_id: Some(String::from("io.github.robmorgan.cuelight")),
            maximized: Some(true),
            ..eframe::egui::ViewportBuilder::default()
        },
        ..Default::default()
    };

    eframe::run_native(
        "cuelight",
        native_options,
        Box::new(move |cc| {
            Ok(Box::new(CuelightApp::new(
                cc, stage, volume, command_tx, event_rx,
            )))
        }),
    )
}
