use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::traits::{AsyncModule, ModuleEvent, ModuleId, ModuleMessage};

const CHANNEL_CAPACITY: usize = 1000;

type StatusMap = HashMap<ModuleId, HashMap<String, String>>;

pub struct ModuleManager {
    modules: HashMap<ModuleId, Box<dyn AsyncModule>>,
    module_handles: HashMap<ModuleId, JoinHandle<()>>,
    module_senders: HashMap<ModuleId, mpsc::Sender<ModuleEvent>>,
    message_receiver: Option<mpsc::Receiver<ModuleMessage>>,
    message_sender: mpsc::Sender<ModuleMessage>,
    final_status: Arc<Mutex<StatusMap>>,
    running: bool,
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleManager {
    pub fn new() -> Self {
        let (message_sender, message_receiver) = mpsc::channel(CHANNEL_CAPACITY);

        Self {
            modules: HashMap::new(),
            module_handles: HashMap::new(),
            module_senders: HashMap::new(),
            message_receiver: Some(message_receiver),
            message_sender,
            final_status: Arc::new(Mutex::new(HashMap::new())),
            running: false,
        }
    }

    /// Register a new module with the manager
    pub fn register_module(&mut self, module: Box<dyn AsyncModule>) {
        let id = module.id();
        if self.modules.insert(id.clone(), module).is_some() {
            log::warn!("Module {:?} registered twice, keeping the latest", id);
        }
    }

    /// Initialize all registered modules
    pub async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        for (id, module) in &mut self.modules {
            match module.initialize().await {
                Ok(_) => log::info!("Module {:?} initialized successfully", id),
                Err(e) => {
                    log::error!("Failed to initialize module {:?}: {}", id, e);
                    return Err(format!("{:?} module error: {}", id, e).into());
                }
            }
        }
        Ok(())
    }

    /// Spawn every module on its own task. Each task runs the module until it
    /// stops, then calls its `shutdown`.
    pub async fn start(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if self.running {
            return Err("Module manager is already running".into());
        }

        for (id, mut module) in std::mem::take(&mut self.modules) {
            let (event_tx, event_rx) = mpsc::channel(CHANNEL_CAPACITY);
            let message_tx = self.message_sender.clone();
            let final_status = Arc::clone(&self.final_status);
            let module_id = id.clone();

            let handle = tokio::spawn(async move {
                if let Err(e) = module.run(event_rx, message_tx.clone()).await {
                    log::error!("Module {:?} stopped with error: {}", module_id, e);
                    let _ = message_tx
                        .send(ModuleMessage::Error(format!(
                            "Module {:?} error: {}",
                            module_id, e
                        )))
                        .await;
                }
                if let Err(e) = module.shutdown().await {
                    log::error!("Module {:?} shutdown error: {}", module_id, e);
                }
                final_status.lock().insert(module_id, module.status());
            });

            self.module_handles.insert(id.clone(), handle);
            self.module_senders.insert(id, event_tx);
        }

        self.running = true;
        Ok(())
    }

    /// A sender for one module's event channel, for tasks that outlive a
    /// borrow of the manager.
    pub fn sender(&self, module_id: &ModuleId) -> Option<mpsc::Sender<ModuleEvent>> {
        self.module_senders.get(module_id).cloned()
    }

    /// Broadcast an event to all modules
    pub async fn broadcast_event(&self, event: ModuleEvent) {
        for (id, sender) in &self.module_senders {
            if let Err(e) = sender.send(event.clone()).await {
                log::warn!("Failed to broadcast event to module {:?}: {}", id, e);
            }
        }
    }

    /// Get the message receiver (should only be called once)
    pub fn take_message_receiver(&mut self) -> Option<mpsc::Receiver<ModuleMessage>> {
        self.message_receiver.take()
    }

    /// Shutdown all modules gracefully
    pub async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.running {
            return Ok(());
        }

        log::info!("Shutting down module manager...");
        self.broadcast_event(ModuleEvent::Shutdown).await;

        for (id, handle) in std::mem::take(&mut self.module_handles) {
            log::info!("Waiting for module {:?} to shutdown...", id);
            if let Err(e) = handle.await {
                log::error!("Module {:?} shutdown error: {}", id, e);
            }
        }

        self.module_senders.clear();
        self.running = false;
        log::info!("Module manager shutdown complete");
        Ok(())
    }

    /// Check if the manager is running
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Status of modules not yet started, plus the last status of modules
    /// that have stopped.
    pub fn get_status(&self) -> StatusMap {
        let mut status = self.final_status.lock().clone();
        for (id, module) in &self.modules {
            status.insert(id.clone(), module.status());
        }
        status
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use super::*;

    struct EchoModule {
        seen: usize,
        shut_down: bool,
    }

    #[async_trait]
    impl AsyncModule for EchoModule {
        fn id(&self) -> ModuleId {
            ModuleId::Fixture
        }

        async fn initialize(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            Ok(())
        }

        async fn run(
            &mut self,
            mut rx: mpsc::Receiver<ModuleEvent>,
            tx: mpsc::Sender<ModuleMessage>,
        ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            while let Some(event) = rx.recv().await {
                if matches!(event, ModuleEvent::Shutdown) {
                    break;
                }
                self.seen += 1;
                let _ = tx.send(ModuleMessage::Event(event)).await;
            }
            Ok(())
        }

        async fn shutdown(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
            self.shut_down = true;
            Ok(())
        }

        fn status(&self) -> HashMap<String, String> {
            HashMap::from([
                ("seen".to_string(), self.seen.to_string()),
                ("shut_down".to_string(), self.shut_down.to_string()),
            ])
        }
    }

    #[tokio::test]
    async fn test_events_round_trip_and_shutdown_runs() {
        let mut manager = ModuleManager::new();
        manager.register_module(Box::new(EchoModule {
            seen: 0,
            shut_down: false,
        }));
        manager.initialize().await.unwrap();
        let mut messages = manager.take_message_receiver().unwrap();
        assert!(manager.take_message_receiver().is_none());

        manager.start().await.unwrap();
        assert!(manager.start().await.is_err());

        let fixture_tx = manager.sender(&ModuleId::Fixture).unwrap();
        fixture_tx.send(ModuleEvent::ClearFixtures).await.unwrap();
        assert!(matches!(
            messages.recv().await,
            Some(ModuleMessage::Event(ModuleEvent::ClearFixtures))
        ));

        manager.shutdown().await.unwrap();
        assert!(!manager.is_running());

        let status = manager.get_status();
        assert_eq!(status[&ModuleId::Fixture]["seen"], "1");
        assert_eq!(status[&ModuleId::Fixture]["shut_down"], "true");
        assert!(manager.sender(&ModuleId::Fixture).is_none());
        assert!(fixture_tx.send(ModuleEvent::ClearFixtures).await.is_err());
    }
}
