mod artnet;
mod bridge;
mod payload;

pub use artnet::{ArtNetConfig, ArtNetController, ArtNetMode};
pub use bridge::{ConnectionState, FixtureBridge, FixtureController};
pub use payload::{DmxChannel, DmxPayload, BLACKOUT_ZONE};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FixtureError {
    #[error("Failed to connect to fixtures: {0}")]
    ConnectionFailed(String),

    #[error("Failed to disconnect from fixtures: {0}")]
    DisconnectFailed(String),

    #[error("Fixture transport error: {0}")]
    Transport(String),

    #[error("Fixture controller is not connected")]
    NotConnected,

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
