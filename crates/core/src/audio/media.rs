use std::path::Path;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("Failed to open media file: {0}")]
    Open(#[from] std::io::Error),

    #[error("Failed to probe media file: {0}")]
    Probe(String),

    #[error("No supported audio tracks found")]
    NoAudioTrack,

    #[error("Failed to create decoder: {0}")]
    Decoder(String),

    #[error("Media file contains no samples")]
    Empty,
}

/// Fully decoded audio of one media file.
#[derive(Clone, Debug)]
pub struct MediaBuffer {
    /// Channel average, used for analysis.
    mono: Arc<Vec<f32>>,
    /// Original channel layout, used for playback.
    interleaved: Arc<Vec<f32>>,
    channels: u16,
    sample_rate: u32,
}

impl MediaBuffer {
    /// Decodes every packet of the first audio track.
    pub fn decode<P: AsRef<Path>>(path: P) -> Result<Self, MediaError> {
        let path = path.as_ref();

        let file = std::fs::File::open(path)?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|ext| ext.to_str()) {
            hint.with_extension(extension);
        }

        let meta_opts: MetadataOptions = Default::default();
        let fmt_opts: FormatOptions = Default::default();

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &fmt_opts, &meta_opts)
            .map_err(|e| MediaError::Probe(e.to_string()))?;

        let mut format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(MediaError::NoAudioTrack)?;

        let decoder_opts: DecoderOptions = Default::default();
        let mut decoder = symphonia::default::get_codecs()
            .make(&track.codec_params, &decoder_opts)
            .map_err(|e| MediaError::Decoder(e.to_string()))?;

        let track_id = track.id;
        let mut sample_rate = track.codec_params.sample_rate.unwrap_or(44100);
        let mut channels = track
            .codec_params
            .channels
            .map(|c| c.count() as u16)
            .unwrap_or(2);

        let mut interleaved = Vec::new();
        let mut sample_buf: Option<SampleBuffer<f32>> = None;

        loop {
            let packet = match format.next_packet() {
                Ok(packet) => packet,
                Err(SymphoniaError::ResetRequired) => {
                    log::warn!("Track list changed while decoding {}", path.display());
                    break;
                }
                Err(SymphoniaError::IoError(e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(e) => {
                    log::warn!("Stopped decoding {}: {}", path.display(), e);
                    break;
                }
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(SymphoniaError::DecodeError(e)) => {
                    log::debug!("Skipping corrupt packet: {}", e);
                    continue;
                }
                Err(e) => {
                    log::warn!("Stopped decoding {}: {}", path.display(), e);
                    break;
                }
            };

            let spec = *decoded.spec();
            sample_rate = spec.rate;
            channels = spec.channels.count() as u16;

            let needed = decoded.capacity() * spec.channels.count();
            if sample_buf.as_ref().map_or(true, |buf| buf.capacity() < needed) {
                sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
            }
            if let Some(buf) = sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buf.samples());
            }
        }

        let media = Self::from_interleaved(interleaved, channels, sample_rate)?;
        log::info!(
            "Decoded {} ({} Hz, {} ch, {:.1}s)",
            path.display(),
            media.sample_rate,
            media.channels,
            media.duration_seconds()
        );
        Ok(media)
    }

    pub fn from_interleaved(
        interleaved: Vec<f32>,
        channels: u16,
        sample_rate: u32,
    ) -> Result<Self, MediaError> {
        if interleaved.is_empty() || channels == 0 || sample_rate == 0 {
            return Err(MediaError::Empty);
        }

        let mono = interleaved
            .chunks(channels as usize)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect();

        Ok(Self {
            mono: Arc::new(mono),
            interleaved: Arc::new(interleaved),
            channels,
            sample_rate,
        })
    }

    pub fn mono(&self) -> &[f32] {
        &self.mono
    }

    pub fn interleaved(&self) -> &[f32] {
        &self.interleaved
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn duration_seconds(&self) -> f64 {
        self.mono.len() as f64 / self.sample_rate as f64
    }

    /// Copies the `out.len()` mono samples that end at `position` seconds.
    /// Samples before the start or past the end are silence.
    pub fn window_ending_at(&self, position: f64, out: &mut [f32]) {
        let end = (position.max(0.0) * self.sample_rate as f64) as i64;
        let start = end - out.len() as i64;

        for (i, sample) in out.iter_mut().enumerate() {
            let index = start + i as i64;
            *sample = if index >= 0 {
                self.mono.get(index as usize).copied().unwrap_or(0.0)
            } else {
                0.0
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mono_mix_down() {
        let media = MediaBuffer::from_interleaved(vec![1.0, 0.0, 0.5, 0.5, -1.0, 1.0], 2, 3)
            .unwrap();
        assert_eq!(media.mono(), &[0.5, 0.5, 0.0]);
        assert_eq!(media.duration_seconds(), 1.0);
    }

    #[test]
    fn test_empty_media_is_rejected() {
        assert!(matches!(
            MediaBuffer::from_interleaved(Vec::new(), 2, 44100),
            Err(MediaError::Empty)
        ));
    }

    #[test]
    fn test_window_pads_with_silence() {
        let media = MediaBuffer::from_interleaved(vec![0.1, 0.2, 0.3, 0.4], 1, 4).unwrap();
        let mut out = [9.0; 3];

        media.window_ending_at(0.5, &mut out);
        assert_eq!(out, [0.0, 0.1, 0.2]);

        media.window_ending_at(2.0, &mut out);
        assert_eq!(out, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_decode_missing_file() {
        let result = MediaBuffer::decode("/nonexistent/show.mp3");
        assert!(matches!(result, Err(MediaError::Open(_))));
    }
}
