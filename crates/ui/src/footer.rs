use eframe::egui::{Align, CornerRadius, Direction, Layout, ProgressBar, RichText};

use crate::state::{format_time, ShowState};
use crate::utils::theme::Theme;

pub fn render(ui: &mut eframe::egui::Ui, state: &ShowState, fps: u32) {
    let theme = Theme::default();

    ui.painter().rect_filled(
        ui.available_rect_before_wrap(),
        CornerRadius::same(0),
        theme.panel_bg,
    );

    let duration = state
        .duration
        .map(format_time)
        .unwrap_or_else(|| "--:--".to_string());

    ui.add(
        ProgressBar::new(state.progress())
            .desired_height(4.0)
            .fill(theme.highlight_color),
    );

    ui.horizontal(|ui| {
        ui.add_space(12.0);
        ui.label(
            RichText::new(format!("FPS: {}", fps))
                .size(12.0)
                .color(theme.text_dim),
        );

        ui.with_layout(
            Layout::centered_and_justified(Direction::LeftToRight),
            |ui| {
                let message = match (&state.last_error, &state.status) {
                    (Some(error), _) => RichText::new(error).color(theme.error_color),
                    (None, Some(status)) => RichText::new(status).color(theme.text_dim),
                    (None, None) => RichText::new("").color(theme.text_dim),
                };
                ui.label(message.size(12.0));
            },
        );

        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            ui.add_space(12.0);
            ui.label(
                RichText::new(format!(
                    "{} / {} | {:?} | Fixtures {}",
                    format_time(state.position),
                    duration,
                    state.playback_state,
                    state.fixture_state
                ))
                .size(12.0)
                .color(theme.text_dim),
            );
        });
    });
}
