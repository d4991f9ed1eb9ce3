use std::io::Cursor;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use zeroize::Zeroize;

use crate::domain::DomainError;

/// Voice capture session state machine.
///
/// State transitions:
/// - Idle -> Requesting (start, capture source is being acquired)
/// - Requesting -> Capturing (source acquired)
/// - Requesting -> Idle (acquisition denied or failed)
/// - Capturing -> Finalizing (stop, source released)
/// - Capturing -> Idle (cancel or capture error, source released)
/// - Finalizing -> Idle (upload resolved, successfully or not)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum RecordingState {
    /// No capture in progress, start control enabled.
    Idle = 0,
    /// Waiting for the capture source to be granted.
    Requesting = 1,
    /// Receiving chunks from the capture source.
    Capturing = 2,
    /// Payload is being uploaded; the surface is busy.
    Finalizing = 3,
}

impl RecordingState {
    #[must_use]
    pub fn can_start(&self) -> bool {
        matches!(self, RecordingState::Idle)
    }

    /// Busy states show a non-interactive indicator.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        matches!(self, RecordingState::Requesting | RecordingState::Finalizing)
    }
}

impl From<u8> for RecordingState {
    fn from(value: u8) -> Self {
        match value {
            1 => RecordingState::Requesting,
            2 => RecordingState::Capturing,
            3 => RecordingState::Finalizing,
            _ => RecordingState::Idle,
        }
    }
}

impl From<RecordingState> for u8 {
    fn from(state: RecordingState) -> Self {
        state as u8
    }
}

/// Atomic wrapper for RecordingState so transitions can be claimed with CAS.
#[derive(Debug)]
pub struct AtomicRecordingState(AtomicU8);

impl AtomicRecordingState {
    pub fn new(state: RecordingState) -> Self {
        Self(AtomicU8::new(state.into()))
    }

    pub fn load(&self) -> RecordingState {
        self.0.load(Ordering::Acquire).into()
    }

    pub fn store(&self, state: RecordingState) {
        self.0.store(state.into(), Ordering::Release);
    }

    /// Compare and swap, returns true if successful.
    pub fn compare_exchange(&self, current: RecordingState, new: RecordingState) -> bool {
        self.0
            .compare_exchange(current.into(), new.into(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

impl Default for AtomicRecordingState {
    fn default() -> Self {
        Self::new(RecordingState::Idle)
    }
}

/// Events emitted by a voice session controller.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum RecordingEvent {
    StateChanged {
        from: RecordingState,
        to: RecordingState,
    },
    /// A non-empty chunk was appended to the active session.
    ChunkBuffered { index: usize, len: usize },
    /// The capture source reported an input level (0.0 - 1.0).
    LevelUpdate { level: f32 },
}

/// One opaque fragment of captured audio.
#[derive(Debug, Clone, PartialEq, Eq, Zeroize)]
#[zeroize(drop)]
pub struct AudioChunk(Vec<u8>);

impl AudioChunk {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Encode PCM samples as a little-endian chunk.
    pub fn from_pcm16(samples: &[i16]) -> Self {
        let mut bytes = Vec::with_capacity(samples.len() * 2);
        for sample in samples {
            bytes.extend_from_slice(&sample.to_le_bytes());
        }
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// How the chunks of a capture source combine into an uploadable file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChunkEncoding {
    /// Chunks are fragments of a container; their concatenation is the file.
    Opaque { mime: String, file_name: String },
    /// Chunks are s16le PCM; the concatenation is wrapped in a WAV container.
    Pcm16 { sample_rate: u32, channels: u16 },
}

impl ChunkEncoding {
    pub fn webm() -> Self {
        ChunkEncoding::Opaque {
            mime: "audio/webm".to_string(),
            file_name: "voice.webm".to_string(),
        }
    }

    pub fn mime(&self) -> &str {
        match self {
            ChunkEncoding::Opaque { mime, .. } => mime,
            ChunkEncoding::Pcm16 { .. } => "audio/wav",
        }
    }

    pub fn file_name(&self) -> &str {
        match self {
            ChunkEncoding::Opaque { file_name, .. } => file_name,
            ChunkEncoding::Pcm16 { .. } => "voice.wav",
        }
    }
}

/// The finalized upload body of one recording session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioPayload {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub file_name: String,
}

impl AudioPayload {
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Chunks buffered for one capture, in arrival order.
///
/// Chunk memory is zeroed when the session is finalized or dropped.
#[derive(Debug)]
pub struct RecordingSession {
    chunks: Vec<AudioChunk>,
    encoding: ChunkEncoding,
    started_at: Instant,
}

impl RecordingSession {
    pub fn new(encoding: ChunkEncoding) -> Self {
        Self {
            chunks: Vec::new(),
            encoding,
            started_at: Instant::now(),
        }
    }

    /// Append a chunk. Empty chunks are dropped and `false` is returned.
    pub fn push_chunk(&mut self, chunk: AudioChunk) -> bool {
        if chunk.is_empty() {
            return false;
        }
        self.chunks.push(chunk);
        true
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Concatenate all chunks into a single payload, consuming the session.
    ///
    /// A session with no chunks yields an empty payload for every encoding.
    pub fn finalize(mut self) -> Result<AudioPayload, DomainError> {
        let chunks = std::mem::take(&mut self.chunks);
        let mime = self.encoding.mime().to_string();
        let file_name = self.encoding.file_name().to_string();

        if chunks.is_empty() {
            return Ok(AudioPayload {
                bytes: Vec::new(),
                mime,
                file_name,
            });
        }

        let mut raw = Vec::with_capacity(chunks.iter().map(AudioChunk::len).sum());
        for chunk in &chunks {
            raw.extend_from_slice(chunk.as_bytes());
        }
        drop(chunks);

        let bytes = match &self.encoding {
            ChunkEncoding::Opaque { .. } => raw,
            ChunkEncoding::Pcm16 {
                sample_rate,
                channels,
            } => {
                let wav = wrap_wav(&raw, *sample_rate, *channels);
                raw.zeroize();
                wav?
            }
        };

        Ok(AudioPayload {
            bytes,
            mime,
            file_name,
        })
    }
}

impl Drop for RecordingSession {
    fn drop(&mut self) {
        // AudioChunk zeroizes itself on drop.
        self.chunks.clear();
    }
}

fn wrap_wav(pcm: &[u8], sample_rate: u32, channels: u16) -> Result<Vec<u8>, DomainError> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut out = Vec::with_capacity(pcm.len() + 44);
    {
        let mut writer = hound::WavWriter::new(Cursor::new(&mut out), spec)?;
        for pair in pcm.chunks_exact(2) {
            writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
        }
        writer.finalize()?;
    }
    Ok(out)
}
