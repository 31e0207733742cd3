use std::fmt;

use async_trait::async_trait;
use cuelight_fixtures::PatchedFixture;
use tokio::sync::{watch, Mutex};

use super::payload::DmxPayload;
use super::FixtureError;
use crate::color::Rgba;
use crate::cue::cue::{CueValue, Zone};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Transport to the lighting hardware.
#[async_trait]
pub trait FixtureController: Send {
    async fn connect(&mut self) -> Result<(), FixtureError>;

    async fn disconnect(&mut self) -> Result<(), FixtureError>;

    /// Stages a payload. Nothing reaches the device until `send`.
    async fn update(&mut self, payload: &DmxPayload) -> Result<(), FixtureError>;

    async fn send(&mut self) -> Result<(), FixtureError>;

    /// Zeroes everything staged so far.
    async fn clear(&mut self) -> Result<(), FixtureError>;

    fn is_connected(&self) -> bool;
}

/// Forwards zone cue values to a [`FixtureController`].
///
/// Every operation holds the controller lock for its whole duration, so device
/// frames are never interleaved. `update`, `send` and `clear` while not
/// connected are no-ops.
pub struct FixtureBridge {
    controller: Mutex<Box<dyn FixtureController>>,
    fixtures: Vec<PatchedFixture>,
    fallback: Rgba,
    state: watch::Sender<ConnectionState>,
}

impl FixtureBridge {
    pub fn new(
        controller: Box<dyn FixtureController>,
        fixtures: Vec<PatchedFixture>,
        fallback: Rgba,
    ) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            controller: Mutex::new(controller),
            fixtures,
            fallback,
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    pub fn subscribe_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn fixtures(&self) -> &[PatchedFixture] {
        &self.fixtures
    }

    fn transition(&self, next: ConnectionState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            log::debug!("Fixture connection {} -> {}", previous, next);
        }
    }

    pub async fn connect(&self) -> Result<(), FixtureError> {
        let mut controller = self.controller.lock().await;
        if self.state() == ConnectionState::Connected {
            log::debug!("Fixtures already connected");
            return Ok(());
        }

        self.transition(ConnectionState::Connecting);
        match controller.connect().await {
            Ok(()) => {
                self.transition(ConnectionState::Connected);
                log::info!("Connected to {} fixture(s)", self.fixtures.len());
                Ok(())
            }
            Err(e) => {
                self.transition(ConnectionState::Disconnected);
                log::error!("Fixture connection failed: {}", e);
                Err(match e {
                    FixtureError::ConnectionFailed(_) => e,
                    other => FixtureError::ConnectionFailed(other.to_string()),
                })
            }
        }
    }

    pub async fn disconnect(&self) -> Result<(), FixtureError> {
        let mut controller = self.controller.lock().await;
        if self.state() != ConnectionState::Connected {
            return Ok(());
        }

        self.transition(ConnectionState::Disconnecting);
        match controller.disconnect().await {
            Ok(()) => {
                self.transition(ConnectionState::Disconnected);
                log::info!("Disconnected from fixtures");
                Ok(())
            }
            Err(e) => {
                // The device is still reachable; stay connected.
                self.transition(ConnectionState::Connected);
                log::error!("Fixture disconnect failed: {}", e);
                Err(match e {
                    FixtureError::DisconnectFailed(_) => e,
                    other => FixtureError::DisconnectFailed(other.to_string()),
                })
            }
        }
    }

    /// Stages the payload for `zone`. Returns whether it reached the controller.
    pub async fn update(&self, zone: &Zone, value: &CueValue) -> Result<bool, FixtureError> {
        let mut controller = self.controller.lock().await;
        if !self.is_connected() {
            log::trace!("Fixtures disconnected, dropping update for {}", zone);
            return Ok(false);
        }
        let payload = DmxPayload::build(zone, value, &self.fixtures, self.fallback);
        controller.update(&payload).await?;
        Ok(true)
    }

    pub async fn send(&self) -> Result<bool, FixtureError> {
        let mut controller = self.controller.lock().await;
        if !self.is_connected() {
            return Ok(false);
        }
        controller.send().await?;
        Ok(true)
    }

    /// Stages and sends `value` for `zone` without letting another operation
    /// in between.
    pub async fn apply(&self, zone: &Zone, value: &CueValue) -> Result<bool, FixtureError> {
        let mut controller = self.controller.lock().await;
        if !self.is_connected() {
            log::trace!("Fixtures disconnected, dropping cue for {}", zone);
            return Ok(false);
        }
        let payload = DmxPayload::build(zone, value, &self.fixtures, self.fallback);
        controller.update(&payload).await?;
        controller.send().await?;
        Ok(true)
    }

    /// Sends an all-off frame covering every patched fixture.
    pub async fn clear(&self) -> Result<bool, FixtureError> {
        let mut controller = self.controller.lock().await;
        if !self.is_connected() {
            return Ok(false);
        }
        controller.clear().await?;
        controller
            .update(&DmxPayload::blackout(&self.fixtures))
            .await?;
        controller.send().await?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use cuelight_fixtures::FixtureLibrary;

    use super::*;
    use crate::fixture::payload::BLACKOUT_ZONE;

    #[derive(Default)]
    struct Calls {
        connect: AtomicUsize,
        disconnect: AtomicUsize,
        update: AtomicUsize,
        send: AtomicUsize,
        clear: AtomicUsize,
        blackout_channels: AtomicUsize,
    }

    struct MockController {
        calls: Arc<Calls>,
        connected: bool,
        fail_connect: bool,
    }

    #[async_trait]
    impl FixtureController for MockController {
        async fn connect(&mut self) -> Result<(), FixtureError> {
            self.calls.connect.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(20)).await;
            if self.fail_connect {
                return Err(FixtureError::Transport("no route to host".to_string()));
            }
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), FixtureError> {
            self.calls.disconnect.fetch_add(1, Ordering::SeqCst);
            self.connected = false;
            Ok(())
        }

        async fn update(&mut self, payload: &DmxPayload) -> Result<(), FixtureError> {
            if payload.zone.as_str() == BLACKOUT_ZONE {
                assert!(payload.channels.iter().all(|c| c.value == 0));
                self.calls
                    .blackout_channels
                    .fetch_add(payload.channels.len(), Ordering::SeqCst);
                return Ok(());
            }
            assert_eq!(payload.zone, Zone::from("left"));
            self.calls.update.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn send(&mut self) -> Result<(), FixtureError> {
            self.calls.send.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn clear(&mut self) -> Result<(), FixtureError> {
            self.calls.clear.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    fn bridge(fail_connect: bool) -> (Arc<FixtureBridge>, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let controller = MockController {
            calls: Arc::clone(&calls),
            connected: false,
            fail_connect,
        };
        let fixtures = vec![FixtureLibrary::new()
            .patch("Left PAR", "left", "generic-rgb", 1, 1)
            .unwrap()];
        let bridge = FixtureBridge::new(Box::new(controller), fixtures, Rgba::WHITE);
        (Arc::new(bridge), calls)
    }

    #[tokio::test]
    async fn test_disconnected_operations_skip_transport() {
        let (bridge, calls) = bridge(false);
        let value = CueValue::with_color("red");

        assert!(!bridge.update(&Zone::from("left"), &value).await.unwrap());
        assert!(!bridge.send().await.unwrap());
        assert!(!bridge.clear().await.unwrap());
        assert!(!bridge.apply(&Zone::from("left"), &value).await.unwrap());

        assert_eq!(calls.update.load(Ordering::SeqCst), 0);
        assert_eq!(calls.send.load(Ordering::SeqCst), 0);
        assert_eq!(calls.clear.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_connects_transition_once() {
        let (bridge, calls) = bridge(false);
        let mut states = bridge.subscribe_state();

        let (a, b) = tokio::join!(bridge.connect(), bridge.connect());
        assert!(a.is_ok() && b.is_ok());
        assert_eq!(calls.connect.load(Ordering::SeqCst), 1);
        assert_eq!(bridge.state(), ConnectionState::Connected);
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Connected);
    }

    #[tokio::test]
    async fn test_failed_connect_rolls_back() {
        let (bridge, calls) = bridge(true);

        let (a, b) = tokio::join!(bridge.connect(), bridge.connect());
        assert!(matches!(a, Err(FixtureError::ConnectionFailed(_))));
        assert!(matches!(b, Err(FixtureError::ConnectionFailed(_))));
        assert_eq!(calls.connect.load(Ordering::SeqCst), 2);
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_connected_apply_and_clear_reach_controller() {
        let (bridge, calls) = bridge(false);
        bridge.connect().await.unwrap();

        assert!(bridge
            .apply(&Zone::from("left"), &CueValue::with_color("blue"))
            .await
            .unwrap());
        assert!(bridge.clear().await.unwrap());
        assert_eq!(calls.update.load(Ordering::SeqCst), 1);
        assert_eq!(calls.clear.load(Ordering::SeqCst), 1);
        assert_eq!(calls.blackout_channels.load(Ordering::SeqCst), 3);
        assert_eq!(calls.send.load(Ordering::SeqCst), 2);

        bridge.disconnect().await.unwrap();
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert!(!bridge.send().await.unwrap());
        assert_eq!(calls.send.load(Ordering::SeqCst), 2);
    }
}
