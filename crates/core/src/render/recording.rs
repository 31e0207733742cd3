use super::surface::{Point, RenderSurface};
use crate::color::Rgba;

#[derive(Clone, Debug, PartialEq)]
pub enum DrawCommand {
    Resize {
        width: u32,
        height: u32,
    },
    FillRect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba,
    },
    StrokePolyline {
        points: Vec<Point>,
        line_width: f32,
        color: Rgba,
    },
    FillCircle {
        center: Point,
        radius: f32,
        color: Rgba,
        glow: f32,
    },
}

/// Surface that records every draw call instead of rasterizing.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    width: u32,
    height: u32,
    commands: Vec<DrawCommand>,
}

impl RecordingSurface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            commands: Vec::new(),
        }
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<DrawCommand> {
        std::mem::take(&mut self.commands)
    }

    pub fn polylines(&self) -> Vec<(&[Point], Rgba)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::StrokePolyline { points, color, .. } => {
                    Some((points.as_slice(), *color))
                }
                _ => None,
            })
            .collect()
    }

    pub fn circles(&self) -> Vec<(Point, Rgba)> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                DrawCommand::FillCircle { center, color, .. } => Some((*center, *color)),
                _ => None,
            })
            .collect()
    }
}

impl RenderSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.width = width;
        self.height = height;
        self.commands.push(DrawCommand::Resize { width, height });
    }

    fn fill_rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba) {
        self.commands.push(DrawCommand::FillRect {
            x,
            y,
            width,
            height,
            color,
        });
    }

    fn stroke_polyline(&mut self, points: &[Point], line_width: f32, color: Rgba) {
        self.commands.push(DrawCommand::StrokePolyline {
            points: points.to_vec(),
            line_width,
            color,
        });
    }

    fn fill_circle(&mut self, center: Point, radius: f32, color: Rgba, glow: f32) {
        self.commands.push(DrawCommand::FillCircle {
            center,
            radius,
            color,
            glow,
        });
    }
}
