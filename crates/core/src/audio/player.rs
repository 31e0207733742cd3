use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStreamBuilder, Sink};
use thiserror::Error;

use super::media::MediaBuffer;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("Failed to open audio output stream: {0}")]
    Output(String),

    #[error("Audio output thread failed: {0}")]
    Thread(String),
}

/// Playback position source shared by the track engine and the signal graph.
pub trait MediaClock: Send + Sync {
    /// Current media position in seconds.
    fn position(&self) -> f64;

    fn is_playing(&self) -> bool;

    fn play(&self);

    fn pause(&self);

    /// Pauses and rewinds to the start.
    fn stop(&self);

    fn set_volume(&self, volume: f32);
}

/// Plays a decoded [`MediaBuffer`] through the default output device.
///
/// The output stream lives on its own thread for as long as the player exists.
pub struct AudioPlayer {
    sink: Sink,
    media: MediaBuffer,
    release: Option<std_mpsc::Sender<()>>,
    output_thread: Option<JoinHandle<()>>,
}

impl AudioPlayer {
    /// Opens the default output device and queues `media`, paused.
    pub fn open(media: &MediaBuffer) -> Result<Self, AudioError> {
        let (sink_tx, sink_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel::<()>();

        let output_thread = std::thread::Builder::new()
            .name("audio-output".to_string())
            .spawn(move || {
                let stream = match OutputStreamBuilder::open_default_stream() {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = sink_tx.send(Err(AudioError::Output(e.to_string())));
                        return;
                    }
                };

                let sink = Sink::connect_new(stream.mixer());
                if sink_tx.send(Ok(sink)).is_err() {
                    return;
                }

                // Keep the stream open until the player is dropped.
                let _ = release_rx.recv();
                drop(stream);
            })
            .map_err(|e| AudioError::Thread(e.to_string()))?;

        let sink = sink_rx
            .recv()
            .map_err(|e| AudioError::Thread(e.to_string()))??;

        let mut player = Self::with_sink(sink, media);
        player.release = Some(release_tx);
        player.output_thread = Some(output_thread);

        log::info!("Audio output opened");
        Ok(player)
    }

    fn with_sink(sink: Sink, media: &MediaBuffer) -> Self {
        let player = Self {
            sink,
            media: media.clone(),
            release: None,
            output_thread: None,
        };
        player.sink.pause();
        player.queue_media();
        player
    }

    fn queue_media(&self) {
        self.sink.append(SamplesBuffer::new(
            self.media.channels(),
            self.media.sample_rate(),
            self.media.interleaved().to_vec(),
        ));
    }
}

impl MediaClock for AudioPlayer {
    fn position(&self) -> f64 {
        self.sink.get_pos().as_secs_f64()
    }

    fn is_playing(&self) -> bool {
        !self.sink.is_paused() && !self.sink.empty()
    }

    fn play(&self) {
        self.sink.play();
    }

    fn pause(&self) {
        self.sink.pause();
    }

    fn stop(&self) {
        self.sink.pause();
        // A source that ran to the end has left the queue.
        if self.sink.empty() {
            log::debug!("Media finished, queueing it again");
            self.queue_media();
            return;
        }
        if let Err(e) = self.sink.try_seek(Duration::ZERO) {
            log::warn!("Failed to rewind playback: {}", e);
        }
    }

    fn set_volume(&self, volume: f32) {
        self.sink.set_volume(volume.clamp(0.0, 1.0));
    }
}

impl Drop for AudioPlayer {
    fn drop(&mut self) {
        self.sink.stop();
        self.release.take();
        if let Some(handle) = self.output_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Wall-clock transport used when no output device is available, and in tests.
pub struct FreeRunningClock {
    duration: Option<f64>,
    state: Mutex<ClockState>,
}

struct ClockState {
    offset: f64,
    started_at: Option<Instant>,
}

impl FreeRunningClock {
    pub fn new(duration: Option<f64>) -> Self {
        Self {
            duration,
            state: Mutex::new(ClockState {
                offset: 0.0,
                started_at: None,
            }),
        }
    }

    /// Jumps to `position` seconds without changing the play state.
    pub fn seek(&self, position: f64) {
        let mut state = self.state.lock();
        state.offset = position.max(0.0);
        if state.started_at.is_some() {
            state.started_at = Some(Instant::now());
        }
    }

    fn clamp(&self, position: f64) -> f64 {
        match self.duration {
            Some(duration) => position.min(duration),
            None => position,
        }
    }
}

impl MediaClock for FreeRunningClock {
    fn position(&self) -> f64 {
        let state = self.state.lock();
        let elapsed = state
            .started_at
            .map(|started| started.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        self.clamp(state.offset + elapsed)
    }

    fn is_playing(&self) -> bool {
        let running = self.state.lock().started_at.is_some();
        running && self.duration.map_or(true, |d| self.position() < d)
    }

    fn play(&self) {
        let mut state = self.state.lock();
        if state.started_at.is_none() {
            state.started_at = Some(Instant::now());
        }
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if let Some(started) = state.started_at.take() {
            state.offset = self.clamp(state.offset + started.elapsed().as_secs_f64());
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.started_at = None;
        state.offset = 0.0;
    }

    fn set_volume(&self, _volume: f32) {}
}
