//! Software render surfaces and the per-frame renderers drawn onto them.

mod frame_buffer;
mod particles;
mod recording;
mod render_loop;
mod spectrum;
mod surface;

pub use frame_buffer::FrameBuffer;
pub use particles::{ColorChannel, Particle, ParticleConfig, ParticleField};
pub use recording::{DrawCommand, RecordingSurface};
pub use render_loop::{FrameRenderer, RenderLoop, RenderLoops, Viewport};
pub use spectrum::{SpectrumConfig, SpectrumRenderer, BACKGROUND_COLOR};
pub use surface::{Point, RenderSurface};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// The signal graph or drawing surface could not be set up.
    #[error("Render initialization failed: {0}")]
    InitializationFailure(String),
}
