use serde::{Deserialize, Serialize};

use crate::domain::recording::ChunkEncoding;
use crate::domain::DomainError;

/// Microphone capture configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Target sample rate in Hz for uploaded audio.
    pub sample_rate: u32,
    /// How often the capture thread emits a chunk, in milliseconds.
    pub chunk_interval_ms: u64,
    /// Preferred input device name, or the system default when unset.
    pub device: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16_000,
            chunk_interval_ms: 250,
            device: None,
        }
    }
}

impl AudioConfig {
    /// Samples per emitted chunk at the target rate.
    pub fn samples_per_chunk(&self) -> usize {
        (self.sample_rate as u64 * self.chunk_interval_ms / 1000).max(1) as usize
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if self.sample_rate == 0 {
            return Err(DomainError::Config("audio.sample_rate must be above zero".to_string()));
        }
        if self.chunk_interval_ms == 0 {
            return Err(DomainError::Config(
                "audio.chunk_interval_ms must be above zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Chunks are mono s16le at the target rate.
    pub fn encoding(&self) -> ChunkEncoding {
        ChunkEncoding::Pcm16 {
            sample_rate: self.sample_rate,
            channels: 1,
        }
    }
}

/// Input audio device information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioDevice {
    /// Unique device identifier.
    pub id: String,
    /// Human-readable device name.
    pub name: String,
    /// Whether this is the system default device.
    pub is_default: bool,
}

/// Synthesized speech returned by the backend; the surface's playback artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioReply {
    pub bytes: Vec<u8>,
    pub mime: String,
}

impl AudioReply {
    pub fn new(bytes: Vec<u8>, mime: impl Into<String>) -> Self {
        Self {
            bytes,
            mime: mime.into(),
        }
    }

    /// File extension matching the reply's content type.
    pub fn extension(&self) -> &'static str {
        let essence = self.mime.split(';').next().unwrap_or("").trim();
        match essence {
            "audio/mpeg" | "audio/mp3" => "mp3",
            "audio/wav" | "audio/x-wav" | "audio/wave" => "wav",
            "audio/ogg" => "ogg",
            "audio/webm" => "webm",
            "audio/aac" => "aac",
            "audio/flac" => "flac",
            _ => "bin",
        }
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_extension() {
        assert_eq!(AudioReply::new(vec![1], "audio/mpeg").extension(), "mp3");
        assert_eq!(AudioReply::new(vec![1], "audio/wav; codecs=1").extension(), "wav");
        assert_eq!(AudioReply::new(vec![1], "application/octet-stream").extension(), "bin");
    }

    #[test]
    fn test_audio_config_default() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 16_000);
        assert_eq!(config.chunk_interval_ms, 250);
        assert!(config.device.is_none());
    }

    #[test]
    fn test_samples_per_chunk() {
        let config = AudioConfig::default();
        // 250ms at 16kHz
        assert_eq!(config.samples_per_chunk(), 4_000);

        let tiny = AudioConfig {
            chunk_interval_ms: 0,
            ..AudioConfig::default()
        };
        assert_eq!(tiny.samples_per_chunk(), 1);
    }

    #[test]
    fn test_encoding_is_mono_pcm() {
        assert_eq!(
            AudioConfig::default().encoding(),
            ChunkEncoding::Pcm16 {
                sample_rate: 16_000,
                channels: 1
            }
        );
    }
}
