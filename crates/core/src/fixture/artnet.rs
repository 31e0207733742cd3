use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

use artnet_protocol::{ArtCommand, Output, PortAddress};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::net::UdpSocket;

use super::bridge::FixtureController;
use super::payload::DmxPayload;
use super::FixtureError;

const CHANNELS_PER_UNIVERSE: usize = 512;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ArtNetMode {
    Broadcast,
    /// Specify from (interface) + to (destination) addresses
    Unicast(SocketAddr, SocketAddr),
}

#[derive(Clone, Debug, PartialEq)]
pub struct ArtNetConfig {
    pub mode: ArtNetMode,
    pub port: u16,
}

impl ArtNetConfig {
    pub fn new(dest_ip: Option<IpAddr>, port: u16, broadcast: bool) -> Self {
        let mode = match dest_ip {
            Some(ip) if !broadcast => ArtNetMode::Unicast(
                SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), 0),
                SocketAddr::new(ip, port),
            ),
            _ => ArtNetMode::Broadcast,
        };
        Self { mode, port }
    }

    pub fn destination(&self) -> SocketAddr {
        match &self.mode {
            ArtNetMode::Broadcast => SocketAddr::new(IpAddr::V4(Ipv4Addr::BROADCAST), self.port),
            ArtNetMode::Unicast(_, destination) => *destination,
        }
    }

    pub fn mode_string(&self) -> &'static str {
        match self.mode {
            ArtNetMode::Broadcast => "broadcast",
            ArtNetMode::Unicast(_, _) => "unicast",
        }
    }
}

/// Sends ArtDMX frames over UDP, one per touched universe.
pub struct ArtNetController {
    config: ArtNetConfig,
    socket: Option<UdpSocket>,
    universes: BTreeMap<u8, Vec<u8>>,
    frames_sent: u64,
}

impl ArtNetController {
    pub fn new(config: ArtNetConfig) -> Self {
        Self {
            config,
            socket: None,
            universes: BTreeMap::new(),
            frames_sent: 0,
        }
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Staged channel data for `universe`.
    pub fn universe(&self, universe: u8) -> Option<&[u8]> {
        self.universes.get(&universe).map(Vec::as_slice)
    }

    fn universe_mut(&mut self, universe: u8) -> &mut Vec<u8> {
        self.universes
            .entry(universe)
            .or_insert_with(|| vec![0; CHANNELS_PER_UNIVERSE])
    }
}

#[async_trait]
impl FixtureController for ArtNetController {
    async fn connect(&mut self) -> Result<(), FixtureError> {
        let socket = match &self.config.mode {
            ArtNetMode::Broadcast => {
                let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0)).await?;
                socket.set_broadcast(true)?;
                socket
            }
            ArtNetMode::Unicast(src, _) => UdpSocket::bind(src).await?,
        };

        log::debug!(
            "Art-Net {} socket bound to {}, sending to {}",
            self.config.mode_string(),
            socket.local_addr()?,
            self.config.destination()
        );
        self.socket = Some(socket);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<(), FixtureError> {
        self.socket = None;
        Ok(())
    }

    async fn update(&mut self, payload: &DmxPayload) -> Result<(), FixtureError> {
        for channel in &payload.channels {
            let index = channel.address as usize;
            if index == 0 || index > CHANNELS_PER_UNIVERSE {
                log::warn!("Skipping out of range DMX address {}", channel.address);
                continue;
            }
            self.universe_mut(channel.universe)[index - 1] = channel.value;
        }
        Ok(())
    }

    async fn send(&mut self) -> Result<(), FixtureError> {
        let socket = self.socket.as_ref().ok_or(FixtureError::NotConnected)?;
        let destination = self.config.destination();

        for (universe, data) in &self.universes {
            let command = ArtCommand::Output(Output {
                port_address: PortAddress::from(*universe),
                data: data.clone().into(),
                ..Output::default()
            });
            let bytes = command
                .write_to_buffer()
                .map_err(|e| FixtureError::Transport(e.to_string()))?;
            socket.send_to(&bytes, destination).await?;
        }

        self.frames_sent += 1;
        Ok(())
    }

    async fn clear(&mut self) -> Result<(), FixtureError> {
        for data in self.universes.values_mut() {
            data.fill(0);
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.socket.is_some()
    }
}
