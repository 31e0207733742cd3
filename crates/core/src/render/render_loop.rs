use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::surface::RenderSurface;

/// Pixel size of the area a renderer should fill.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub const fn new(width: u32, height: u32) -> Self {
        Viewport { width, height }
    }
}

/// Draws one frame per call.
pub trait FrameRenderer: Send + 'static {
    fn render(&mut self, surface: &mut dyn RenderSurface, viewport: Viewport);
}

/// A renderer driven at a fixed frame rate on its own task.
pub struct RenderLoop {
    name: String,
    stop: Arc<AtomicBool>,
    frames: Arc<AtomicU64>,
    handle: JoinHandle<()>,
}

impl RenderLoop {
    pub fn spawn<S>(
        name: impl Into<String>,
        mut renderer: Box<dyn FrameRenderer>,
        surface: Arc<Mutex<S>>,
        viewport: watch::Receiver<Viewport>,
        fps: u32,
    ) -> Self
    where
        S: RenderSurface + 'static,
    {
        let name = name.into();
        let stop = Arc::new(AtomicBool::new(false));
        let frames = Arc::new(AtomicU64::new(0));
        let period = Duration::from_secs_f64(1.0 / fps.max(1) as f64);

        let task_name = name.clone();
        let task_stop = Arc::clone(&stop);
        let task_frames = Arc::clone(&frames);

        let handle = tokio::spawn(async move {
            log::info!("Render loop {} started at {} fps", task_name, fps);
            let mut ticker = tokio::time::interval(period);

            loop {
                ticker.tick().await;
                if task_stop.load(Ordering::Acquire) {
                    break;
                }

                let current = *viewport.borrow();
                {
                    let mut surface = surface.lock();
                    renderer.render(&mut *surface, current);
                }
                task_frames.fetch_add(1, Ordering::Relaxed);
            }

            log::info!(
                "Render loop {} stopped after {} frames",
                task_name,
                task_frames.load(Ordering::Relaxed)
            );
        });

        Self {
            name,
            stop,
            frames,
            handle,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn frames(&self) -> u64 {
        self.frames.load(Ordering::Relaxed)
    }

    /// Requests a stop. The current pass finishes; no further pass starts.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub async fn join(self) {
        self.stop();
        if let Err(e) = self.handle.await {
            log::error!("Render loop {} panicked: {}", self.name, e);
        }
    }
}

/// At most one running loop per name.
#[derive(Default)]
pub struct RenderLoops {
    loops: HashMap<String, RenderLoop>,
}

impl RenderLoops {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stops any loop already registered under `name`, then starts a new one.
    pub fn start<S>(
        &mut self,
        name: &str,
        renderer: Box<dyn FrameRenderer>,
        surface: Arc<Mutex<S>>,
        viewport: watch::Receiver<Viewport>,
        fps: u32,
    ) where
        S: RenderSurface + 'static,
    {
        if let Some(existing) = self.loops.remove(name) {
            log::debug!("Replacing render loop {}", name);
            existing.stop();
        }
        let render_loop = RenderLoop::spawn(name, renderer, surface, viewport, fps);
        self.loops.insert(name.to_string(), render_loop);
    }

    pub fn stop(&mut self, name: &str) -> bool {
        match self.loops.remove(name) {
            Some(render_loop) => {
                render_loop.stop();
                true
            }
            None => false,
        }
    }

    pub fn get(&self, name: &str) -> Option<&RenderLoop> {
        self.loops.get(name)
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.loops.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.loops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }

    /// Stops every loop and waits for the tasks to exit.
    pub async fn shutdown(&mut self) {
        for (_, render_loop) in self.loops.drain() {
            render_loop.join().await;
        }
    }
}
