use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Host, Sample, SampleFormat, SizedSample, Stream, StreamConfig};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use crate::domain::{AudioChunk, AudioConfig, AudioDevice, ChunkEncoding, DomainError};
use crate::ports::{CaptureHandle, CaptureSource, CaptureStream};

type ChunkSender = mpsc::UnboundedSender<AudioChunk>;
type FailureSlot = Arc<Mutex<Option<String>>>;

fn device_error(context: &str, err: impl std::fmt::Display) -> DomainError {
    DomainError::AudioDevice {
        message: format!("{}: {}", context, err),
    }
}

/// Input devices paired with stable ids. Repeated names get a `:n` suffix.
fn enumerate_inputs(host: &Host) -> Result<Vec<(AudioDevice, Device)>, DomainError> {
    let default_name = host.default_input_device().and_then(|d| d.name().ok());
    let devices = host
        .input_devices()
        .map_err(|e| device_error("Failed to enumerate devices", e))?;

    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut result = Vec::new();
    for device in devices {
        let Ok(name) = device.name() else { continue };
        let n = seen.entry(name.clone()).or_insert(0);
        let id = match *n {
            0 => name.clone(),
            k => format!("{}:{}", name, k),
        };
        *n += 1;

        let info = AudioDevice {
            id,
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
        };
        result.push((info, device));
    }
    Ok(result)
}

/// The device with `id`, or the system default when `id` is unset or gone.
fn resolve_device(host: &Host, id: Option<&str>) -> Result<Device, DomainError> {
    if let Some(id) = id {
        if let Some((_, device)) = enumerate_inputs(host)?.into_iter().find(|(d, _)| d.id == id) {
            return Ok(device);
        }
        warn!(device_id = %id, "Selected device not found, using default");
    }
    host.default_input_device().ok_or_else(|| DomainError::AudioDevice {
        message: "No default input device available".to_string(),
    })
}

/// Converts device frames into mono samples at the capture rate.
#[derive(Debug, Clone, Copy)]
struct Conversion {
    channels: usize,
    from_rate: u32,
    to_rate: u32,
}

impl Conversion {
    fn apply(&self, interleaved: &[i16]) -> Vec<i16> {
        let mono: Vec<i16> = match self.channels {
            0 | 1 => interleaved.to_vec(),
            n => interleaved
                .chunks(n)
                .map(|frame| {
                    let sum: i32 = frame.iter().map(|&s| i32::from(s)).sum();
                    (sum / frame.len() as i32) as i16
                })
                .collect(),
        };
        linear_resample(&mono, self.from_rate, self.to_rate)
    }
}

fn linear_resample(input: &[i16], from_rate: u32, to_rate: u32) -> Vec<i16> {
    if from_rate == to_rate || input.is_empty() || to_rate == 0 {
        return input.to_vec();
    }
    let step = f64::from(from_rate) / f64::from(to_rate);
    let out_len = (input.len() as f64 / step).ceil() as usize;
    let last = input.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = (pos as usize).min(last);
            let next = (idx + 1).min(last);
            let a = f64::from(input[idx]);
            let b = f64::from(input[next]);
            (a + (b - a) * pos.fract()) as i16
        })
        .collect()
}

/// RMS of the chunk, 0.0 to 1.0.
fn rms_level(samples: &[i16]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let energy: f64 = samples.iter().map(|&s| f64::from(s) * f64::from(s)).sum();
    let rms = (energy / samples.len() as f64).sqrt() / f64::from(i16::MAX);
    rms.min(1.0) as f32
}

/// Collects converted samples into fixed-size chunks and sends them out.
struct ChunkSink {
    buffer: Vec<i16>,
    chunk_len: usize,
    conversion: Conversion,
    level: Arc<AtomicU32>,
    tx: Option<ChunkSender>,
}

impl ChunkSink {
    fn accept(&mut self, interleaved: &[i16]) {
        let converted = self.conversion.apply(interleaved);
        self.buffer.extend_from_slice(&converted);
        while self.buffer.len() >= self.chunk_len {
            let tail = self.buffer.split_off(self.chunk_len);
            let chunk = std::mem::replace(&mut self.buffer, tail);
            self.send(&chunk);
        }
    }

    /// Send what is left as a short chunk, then close the channel.
    fn finish(&mut self) {
        let rest = std::mem::take(&mut self.buffer);
        if !rest.is_empty() {
            self.send(&rest);
        }
        self.tx = None;
        self.level.store(0f32.to_bits(), Ordering::Relaxed);
    }

    fn send(&self, samples: &[i16]) {
        self.level.store(rms_level(samples).to_bits(), Ordering::Relaxed);
        if let Some(tx) = &self.tx {
            let _ = tx.send(AudioChunk::from_pcm16(samples));
        }
    }
}

fn input_stream<T>(
    device: &Device,
    config: &StreamConfig,
    sink: Arc<Mutex<ChunkSink>>,
    failure: FailureSlot,
) -> Result<Stream, cpal::BuildStreamError>
where
    T: SizedSample,
    i16: cpal::FromSample<T>,
{
    device.build_input_stream(
        config,
        move |data: &[T], _: &cpal::InputCallbackInfo| {
            let samples: Vec<i16> = data.iter().map(|&s| i16::from_sample(s)).collect();
            sink.lock().accept(&samples);
        },
        move |err: cpal::StreamError| {
            error!(?err, "Audio stream error");
            failure.lock().get_or_insert_with(|| err.to_string());
        },
        None,
    )
}

/// An open device on the capture thread.
struct OpenCapture {
    stream: Stream,
    sink: Arc<Mutex<ChunkSink>>,
}

fn open_capture(
    config: &AudioConfig,
    device_id: Option<&str>,
    chunk_tx: ChunkSender,
    level: &Arc<AtomicU32>,
    failure: &FailureSlot,
) -> Result<OpenCapture, DomainError> {
    let host = cpal::default_host();
    let device = resolve_device(&host, device_id)?;
    let supported = device
        .default_input_config()
        .map_err(|e| device_error("Failed to get default config", e))?;
    let format = supported.sample_format();
    let stream_config: StreamConfig = supported.config();

    debug!(
        sample_rate = stream_config.sample_rate.0,
        channels = stream_config.channels,
        ?format,
        "Device input config"
    );

    let sink = Arc::new(Mutex::new(ChunkSink {
        buffer: Vec::new(),
        chunk_len: config.samples_per_chunk(),
        conversion: Conversion {
            channels: usize::from(stream_config.channels),
            from_rate: stream_config.sample_rate.0,
            to_rate: config.sample_rate,
        },
        level: Arc::clone(level),
        tx: Some(chunk_tx),
    }));

    let sink_ref = Arc::clone(&sink);
    let failure = Arc::clone(failure);
    let stream = match format {
        SampleFormat::I16 => input_stream::<i16>(&device, &stream_config, sink_ref, failure),
        SampleFormat::U16 => input_stream::<u16>(&device, &stream_config, sink_ref, failure),
        SampleFormat::I32 => input_stream::<i32>(&device, &stream_config, sink_ref, failure),
        SampleFormat::F32 => input_stream::<f32>(&device, &stream_config, sink_ref, failure),
        other => {
            return Err(DomainError::AudioDevice {
                message: format!("Unsupported sample format: {:?}", other),
            })
        }
    }
    .map_err(|e| device_error("Failed to build stream", e))?;

    stream
        .play()
        .map_err(|e| device_error("Failed to start stream", e))?;

    info!(
        device = %device.name().unwrap_or_else(|_| "unknown".to_string()),
        "Microphone acquired"
    );
    Ok(OpenCapture { stream, sink })
}

/// Commands sent to the capture thread.
enum CaptureCommand {
    Open {
        device_id: Option<String>,
        chunk_tx: ChunkSender,
        reply: oneshot::Sender<Result<(), DomainError>>,
    },
    Close {
        reply: oneshot::Sender<()>,
    },
    Shutdown,
}

/// Capture thread runner. The cpal Stream is not Send, so it lives here.
fn capture_thread_main(
    config: AudioConfig,
    level: Arc<AtomicU32>,
    failure: FailureSlot,
    mut cmd_rx: mpsc::Receiver<CaptureCommand>,
) {
    let mut open: Option<OpenCapture> = None;

    while let Some(cmd) = cmd_rx.blocking_recv() {
        match cmd {
            CaptureCommand::Open {
                device_id,
                chunk_tx,
                reply,
            } => {
                let result = if open.is_some() {
                    Err(DomainError::AlreadyRecording)
                } else {
                    open_capture(&config, device_id.as_deref(), chunk_tx, &level, &failure)
                        .map(|capture| open = Some(capture))
                };
                let _ = reply.send(result);
            }
            CaptureCommand::Close { reply } => {
                if let Some(OpenCapture { stream, sink }) = open.take() {
                    // No callbacks run after the stream is dropped, so the flush is final.
                    drop(stream);
                    sink.lock().finish();
                    info!("Microphone released");
                }
                let _ = reply.send(());
            }
            CaptureCommand::Shutdown => break,
        }
    }
    debug!("Capture thread exiting");
}

/// Releases the device for one open capture.
struct CpalCaptureHandle {
    cmd_tx: mpsc::Sender<CaptureCommand>,
    failure: FailureSlot,
    released: bool,
}

#[async_trait]
impl CaptureHandle for CpalCaptureHandle {
    async fn release(&mut self) -> Result<(), DomainError> {
        if std::mem::replace(&mut self.released, true) {
            return Ok(());
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(CaptureCommand::Close { reply: reply_tx })
            .await
            .map_err(|_| device_error("Capture thread", "not running"))?;
        reply_rx
            .await
            .map_err(|_| device_error("Capture thread", "did not respond"))
    }

    fn failure(&self) -> Option<String> {
        self.failure.lock().clone()
    }
}

impl Drop for CpalCaptureHandle {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let (reply_tx, _) = oneshot::channel();
        if self
            .cmd_tx
            .try_send(CaptureCommand::Close { reply: reply_tx })
            .is_err()
        {
            warn!("Could not release microphone on drop");
        }
    }
}

/// Microphone capture through cpal.
///
/// The stream lives on a dedicated thread; chunks are mono s16le PCM at the
/// configured rate, one per chunk interval.
pub struct CpalCaptureSource {
    config: AudioConfig,
    level: Arc<AtomicU32>,
    failure: FailureSlot,
    selected_device_id: RwLock<Option<String>>,
    cmd_tx: mpsc::Sender<CaptureCommand>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl CpalCaptureSource {
    pub fn new(config: AudioConfig) -> Result<Self, DomainError> {
        let level = Arc::new(AtomicU32::new(0));
        let failure: FailureSlot = Arc::new(Mutex::new(None));
        let (cmd_tx, cmd_rx) = mpsc::channel(16);

        let thread_handle = {
            let config = config.clone();
            let level = Arc::clone(&level);
            let failure = Arc::clone(&failure);
            thread::Builder::new()
                .name("audio-capture".to_string())
                .spawn(move || capture_thread_main(config, level, failure, cmd_rx))
                .map_err(|e| device_error("Failed to spawn capture thread", e))?
        };

        info!(
            sample_rate = config.sample_rate,
            chunk_interval_ms = config.chunk_interval_ms,
            device = ?config.device,
            "CpalCaptureSource initialized"
        );

        Ok(Self {
            selected_device_id: RwLock::new(config.device.clone()),
            config,
            level,
            failure,
            cmd_tx,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }
}

impl Drop for CpalCaptureSource {
    fn drop(&mut self) {
        // Not joined: open handles may still hold command senders.
        let _ = self.cmd_tx.try_send(CaptureCommand::Shutdown);
        self.thread_handle.lock().take();
    }
}

#[async_trait]
impl CaptureSource for CpalCaptureSource {
    async fn open(&self) -> Result<CaptureStream, DomainError> {
        let (chunk_tx, chunk_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = oneshot::channel();
        *self.failure.lock() = None;

        let device_id = self.selected_device_id.read().clone();
        self.cmd_tx
            .send(CaptureCommand::Open {
                device_id,
                chunk_tx,
                reply: reply_tx,
            })
            .await
            .map_err(|_| device_error("Capture thread", "not running"))?;
        reply_rx
            .await
            .map_err(|_| device_error("Capture thread", "did not respond"))??;

        let handle = CpalCaptureHandle {
            cmd_tx: self.cmd_tx.clone(),
            failure: Arc::clone(&self.failure),
            released: false,
        };
        Ok(CaptureStream::new(chunk_rx, Box::new(handle)))
    }

    fn encoding(&self) -> ChunkEncoding {
        self.config.encoding()
    }

    fn list_input_devices(&self) -> Result<Vec<AudioDevice>, DomainError> {
        let devices: Vec<AudioDevice> = enumerate_inputs(&cpal::default_host())?
            .into_iter()
            .map(|(info, _)| info)
            .collect();
        debug!(count = devices.len(), "Listed input devices");
        Ok(devices)
    }

    fn select_input_device(&self, device_id: Option<&str>) -> Result<(), DomainError> {
        if let Some(id) = device_id {
            let known = self.list_input_devices()?.into_iter().any(|d| d.id == id);
            if !known {
                return Err(DomainError::AudioDevice {
                    message: format!("Device not found: {}", id),
                });
            }
        }

        *self.selected_device_id.write() = device_id.map(String::from);
        info!(device_id = ?device_id, "Input device selected");
        Ok(())
    }

    fn current_level(&self) -> f32 {
        f32::from_bits(self.level.load(Ordering::Relaxed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sink(chunk_len: usize, conversion: Conversion) -> (ChunkSink, mpsc::UnboundedReceiver<AudioChunk>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = ChunkSink {
            buffer: Vec::new(),
            chunk_len,
            conversion,
            level: Arc::new(AtomicU32::new(0)),
            tx: Some(tx),
        };
        (sink, rx)
    }

    const MONO_16K: Conversion = Conversion {
        channels: 1,
        from_rate: 16_000,
        to_rate: 16_000,
    };

    #[test]
    fn test_rms_level() {
        assert_eq!(rms_level(&[]), 0.0);
        assert_eq!(rms_level(&[0, 0, 0]), 0.0);
        assert!((rms_level(&[i16::MAX; 3]) - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_resample_48k_to_16k() {
        let samples: Vec<i16> = (0..48).map(|i| i * 100).collect();
        let out = linear_resample(&samples, 48_000, 16_000);
        assert_eq!(out.len(), 16);
        assert_eq!(out[1], 300);
    }

    #[test]
    fn test_stereo_is_averaged() {
        let conversion = Conversion {
            channels: 2,
            ..MONO_16K
        };
        assert_eq!(conversion.apply(&[100, 300, -200, 200]), vec![200, 0]);
    }

    #[test]
    fn test_sink_splits_and_flushes() {
        let (mut sink, mut rx) = sink(2, MONO_16K);

        sink.accept(&[1, 2, 3]);
        assert_eq!(rx.try_recv().unwrap(), AudioChunk::from_pcm16(&[1, 2]));
        assert!(rx.try_recv().is_err());

        sink.finish();
        assert_eq!(rx.try_recv().unwrap(), AudioChunk::from_pcm16(&[3]));
        assert!(matches!(
            rx.try_recv(),
            Err(mpsc::error::TryRecvError::Disconnected)
        ));
        assert_eq!(f32::from_bits(sink.level.load(Ordering::Relaxed)), 0.0);
    }

    #[test]
    fn test_sink_tracks_level() {
        let (mut sink, _rx) = sink(2, MONO_16K);
        sink.accept(&[i16::MAX, i16::MAX]);
        assert!(f32::from_bits(sink.level.load(Ordering::Relaxed)) > 0.99);
    }
}
