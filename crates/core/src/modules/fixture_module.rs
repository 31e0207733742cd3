use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};
use crate::fixture::FixtureBridge;

/// Owns the fixture bridge and handles one event at a time, so device I/O is
/// never interleaved.
pub struct FixtureModule {
    bridge: Arc<FixtureBridge>,
    connect_on_start: bool,
    cues_sent: u64,
    cues_dropped: u64,
    status: HashMap<String, String>,
}

impl FixtureModule {
    pub fn new(bridge: Arc<FixtureBridge>, connect_on_start: bool) -> Self {
        Self {
            bridge,
            connect_on_start,
            cues_sent: 0,
            cues_dropped: 0,
            status: HashMap::new(),
        }
    }

    pub fn bridge(&self) -> &Arc<FixtureBridge> {
        &self.bridge
    }

    async fn report_state(&mut self, tx: &mpsc::Sender<ModuleMessage>) {
        let state = self.bridge.state();
        self.status
            .insert("connection".to_string(), state.to_string());
        let _ = tx
            .send(ModuleMessage::Event(ModuleEvent::FixtureStateChanged(state)))
            .await;
    }
}

#[async_trait]
impl AsyncModule for FixtureModule {
    fn id(&self) -> ModuleId {
        ModuleId::Fixture
    }

    async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!(
            "Initializing fixture module with {} fixture(s)",
            self.bridge.fixtures().len()
        );
        self.status
            .insert("fixtures".to_string(), self.bridge.fixtures().len().to_string());
        self.status
            .insert("connection".to_string(), self.bridge.state().to_string());
        Ok(())
    }

    async fn run(
        &mut self,
        mut rx: mpsc::Receiver<ModuleEvent>,
        tx: mpsc::Sender<ModuleMessage>,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        log::info!("Fixture module started");

        if self.connect_on_start {
            if let Err(e) = self.bridge.connect().await {
                let _ = tx.send(ModuleMessage::Error(e.to_string())).await;
            }
            self.report_state(&tx).await;
        }

        while let Some(event) = rx.recv().await {
            match event {
                ModuleEvent::ZoneCue { zone, value } => {
                    match self.bridge.apply(&zone, &value).await {
                        Ok(true) => {
                            self.cues_sent += 1;
                            log::debug!("Sent {} to fixtures in zone {}", value.color, zone);
                        }
                        Ok(false) => self.cues_dropped += 1,
                        Err(e) => {
                            let error_msg = format!("Failed to send cue for {}: {}", zone, e);
                            log::error!("{}", error_msg);
                            let _ = tx.send(ModuleMessage::Error(error_msg)).await;
                        }
                    }
                }

                ModuleEvent::ConnectFixtures => {
                    if let Err(e) = self.bridge.connect().await {
                        let _ = tx.send(ModuleMessage::Error(e.to_string())).await;
                    }
                    self.report_state(&tx).await;
                }

                ModuleEvent::DisconnectFixtures => {
                    if let Err(e) = self.bridge.disconnect().await {
                        let _ = tx.send(ModuleMessage::Error(e.to_string())).await;
                    }
                    self.report_state(&tx).await;
                }

                ModuleEvent::ClearFixtures => match self.bridge.clear().await {
                    Ok(true) => {
                        let _ = tx
                            .send(ModuleMessage::Status("Fixtures cleared".to_string()))
                            .await;
                    }
                    Ok(false) => log::debug!("Fixtures disconnected, nothing to clear"),
                    Err(e) => {
                        let _ = tx.send(ModuleMessage::Error(e.to_string())).await;
                    }
                },

                ModuleEvent::Shutdown => {
                    log::info!("Fixture module received shutdown signal");
                    break;
                }

                ModuleEvent::FixtureStateChanged(_) => {}
            }
        }

        log::info!(
            "Fixture module stopping after {} cue(s) sent, {} dropped while disconnected",
            self.cues_sent,
            self.cues_dropped
        );
        Ok(())
    }

    async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if let Err(e) = self.bridge.clear().await {
            log::warn!("Failed to clear fixtures on shutdown: {}", e);
        }
        self.bridge.disconnect().await?;
        self.status
            .insert("status".to_string(), "shutdown".to_string());
        log::info!("Fixture module shutdown complete");
        Ok(())
    }

    fn status(&self) -> HashMap<String, String> {
        let mut status = self.status.clone();
        status.insert("cues_sent".to_string(), self.cues_sent.to_string());
        status.insert("cues_dropped".to_string(), self.cues_dropped.to_string());
        status.insert("connection".to_string(), self.bridge.state().to_string());
        status
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use cuelight_fixtures::FixtureLibrary;

    use super::*;
    use crate::color::Rgba;
    use crate::cue::cue::{CueValue, Zone};
    use crate::fixture::{ConnectionState, DmxPayload, FixtureController, FixtureError};

    struct CountingController {
        sends: Arc<AtomicUsize>,
        connected: bool,
    }

    #[async_trait]
    impl FixtureController for CountingController {
        async fn connect(&mut self) -> Result<(), FixtureError> {
            self.connected = true;
            Ok(())
        }

        async fn disconnect(&mut self) -> Result<(), FixtureError> {
            self.connected = false;
            Ok(())
        }

        async fn update(&mut self, _payload: &DmxPayload) -> Result<(), FixtureError> {
            Ok(())
        }

        async fn send(&mut self) -> Result<(), FixtureError> {
            self.sends.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn clear(&mut self) -> Result<(), FixtureError> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[tokio::test]
    async fn test_processes_cues_in_order() {
        let sends = Arc::new(AtomicUsize::new(0));
        let controller = CountingController {
            sends: Arc::clone(&sends),
            connected: false,
        };
        let fixtures = vec![FixtureLibrary::new()
            .patch("Bar", "left", "generic-rgb", 1, 1)
            .unwrap()];
        let bridge = Arc::new(FixtureBridge::new(
            Box::new(controller),
            fixtures,
            Rgba::WHITE,
        ));
        let mut module = FixtureModule::new(Arc::clone(&bridge), false);
        module.initialize().await.unwrap();

        let (event_tx, event_rx) = mpsc::channel(16);
        let (message_tx, mut message_rx) = mpsc::channel(16);

        let cue = |color: &str| ModuleEvent::ZoneCue {
            zone: Zone::from("left"),
            value: CueValue::with_color(color),
        };
        event_tx.send(cue("red")).await.unwrap();
        event_tx.send(ModuleEvent::ConnectFixtures).await.unwrap();
        event_tx.send(cue("blue")).await.unwrap();
        event_tx.send(ModuleEvent::ClearFixtures).await.unwrap();
        event_tx.send(ModuleEvent::Shutdown).await.unwrap();

        module.run(event_rx, message_tx).await.unwrap();

        let status = module.status();
        assert_eq!(status["cues_sent"], "1");
        assert_eq!(status["cues_dropped"], "1");
        assert_eq!(sends.load(Ordering::SeqCst), 2);

        assert!(matches!(
            message_rx.recv().await,
            Some(ModuleMessage::Event(ModuleEvent::FixtureStateChanged(
                ConnectionState::Connected
            )))
        ));

        module.shutdown().await.unwrap();
        assert_eq!(bridge.state(), ConnectionState::Disconnected);
        assert_eq!(sends.load(Ordering::SeqCst), 3);
    }
}
