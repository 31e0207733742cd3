use cuelight_core::{Rgba, ShowCommand, ZoneColorState};
use eframe::egui::{self, Align, Layout, RichText};
use tokio::sync::mpsc;

use crate::state::ShowState;
use crate::utils::theme::{to_color32, Theme};

pub fn render(
    ui: &mut egui::Ui,
    command_tx: &mpsc::UnboundedSender<ShowCommand>,
    state: &mut ShowState,
    zone_colors: &ZoneColorState,
) {
    let theme = Theme::default();

    ui.horizontal(|ui| {
        ui.label(
            RichText::new(&state.title)
                .size(16.0)
                .strong()
                .color(theme.text_color),
        );
        ui.separator();

        let play_label = if state.is_playing() { "Pause" } else { "Play" };
        if ui.button(play_label).clicked() {
            let command = if state.is_playing() {
                ShowCommand::Pause
            } else {
                ShowCommand::Play
            };
            let _ = command_tx.send(command);
        }
        if ui.button("Stop").clicked() {
            let _ = command_tx.send(ShowCommand::Stop);
        }

        ui.label("Volume");
        let slider = egui::Slider::new(&mut state.volume, 0.0..=1.0).show_value(false);
        if ui.add(slider).changed() {
            let _ = command_tx.send(ShowCommand::SetVolume(state.volume));
        }

        ui.separator();

        let connected = state.fixtures_connected();
        let connect_label = if connected {
            "Disconnect Fixtures"
        } else {
            "Connect Fixtures"
        };
        if ui.button(connect_label).clicked() {
            let command = if connected {
                ShowCommand::DisconnectFixtures
            } else {
                ShowCommand::ConnectFixtures
            };
            let _ = command_tx.send(command);
        }
        if ui.button("Clear").clicked() {
            let _ = command_tx.send(ShowCommand::ClearFixtures);
        }

        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            // Reverse order so zones read left to right.
            for zone in zone_colors.zones().iter().rev() {
                let color = match state.zone_values.get(zone) {
                    Some(value) => value.rgba_or(zone_colors.fallback_color()),
                    None => zone_colors.color(zone),
                };
                swatch(ui, color, &theme);
                ui.label(RichText::new(zone.as_str()).color(theme.text_dim));
            }
        });
    });
}

fn swatch(ui: &mut egui::Ui, color: Rgba, theme: &Theme) {
    let (rect, _) = ui.allocate_exact_size(egui::vec2(14.0, 14.0), egui::Sense::hover());
    ui.painter().rect_filled(rect, 3.0, to_color32(color));
    ui.painter().rect_stroke(
        rect,
        3.0,
        egui::Stroke::new(1.0, theme.border_color),
        egui::StrokeKind::Inside,
    );
}
