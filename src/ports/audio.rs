use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::domain::{AudioChunk, AudioDevice, ChunkEncoding, DomainError};

/// Port for the microphone-backed capture source.
///
/// Implementations own the platform device and deliver captured audio as a
/// stream of chunks in arrival order.
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Acquire the input device and start delivering chunks.
    ///
    /// Fails when the device is missing or access is denied.
    async fn open(&self) -> Result<CaptureStream, DomainError>;

    /// How the chunks of this source combine into a file.
    fn encoding(&self) -> ChunkEncoding;

    /// List available audio input devices.
    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError>;

    /// Select an input device by ID, or use the system default if None.
    fn select_input_device(&self, device_id: Option<&str>) -> Result<(), DomainError>;

    /// Current input level (0.0 - 1.0), 0.0 when idle.
    fn current_level(&self) -> f32 {
        0.0
    }
}

/// Control side of an open capture.
#[async_trait]
pub trait CaptureHandle: Send {
    /// Stop the device and release it.
    ///
    /// Every chunk emitted before this returns is already queued on the
    /// stream's channel, and the channel is closed afterwards.
    async fn release(&mut self) -> Result<(), DomainError>;

    /// Set once the device failed mid-capture.
    fn failure(&self) -> Option<String> {
        None
    }
}

/// An acquired capture: chunk receiver plus the handle that releases the device.
///
/// Dropping the stream drops the handle, which must release the device too.
pub struct CaptureStream {
    chunks: mpsc::UnboundedReceiver<AudioChunk>,
    handle: Box<dyn CaptureHandle>,
}

impl CaptureStream {
    pub fn new(chunks: mpsc::UnboundedReceiver<AudioChunk>, handle: Box<dyn CaptureHandle>) -> Self {
        Self { chunks, handle }
    }

    /// Take every chunk that has arrived so far without waiting.
    pub fn drain_ready(&mut self) -> Vec<AudioChunk> {
        let mut ready = Vec::new();
        while let Ok(chunk) = self.chunks.try_recv() {
            ready.push(chunk);
        }
        ready
    }

    pub fn failure(&self) -> Option<String> {
        self.handle.failure()
    }

    /// Release the device and return the chunks still queued, in order.
    ///
    /// The chunks are returned even when releasing reports an error.
    pub async fn stop(mut self) -> (Vec<AudioChunk>, Result<(), DomainError>) {
        let released = self.handle.release().await;
        if released.is_err() {
            // The source may still hold its sender; take what is queued.
            return (self.drain_ready(), released);
        }
        let mut rest = Vec::new();
        while let Some(chunk) = self.chunks.recv().await {
            rest.push(chunk);
        }
        (rest, released)
    }
}

impl std::fmt::Debug for CaptureStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureStream").finish_non_exhaustive()
    }
}
