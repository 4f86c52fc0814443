//! Sound-card output through cpal.
//!
//! One output stream is opened for the whole choir. Players share its
//! producer end: only one bell rings at a time, so the lock around it is
//! never contended during a performance.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use log::{debug, error};
use rtrb::{Producer, RingBuffer};

use super::sink::{AudioSink, SinkError, SinkFactory};
use crate::sequencing::Pitch;

/// Roughly 85ms of audio at 48kHz
const DEVICE_QUEUE_SIZE: usize = 4096;

const BACKOFF: Duration = Duration::from_millis(1);

/// Keeps the output stream alive. Dropping it stops playback and turns
/// every later write into `SinkError::Disconnected`.
pub struct DeviceOutput {
    _stream: cpal::Stream,
    pub device_rate: u32,
    pub channels: usize,
}

/// Hands out [`DeviceSink`]s that all feed the same output stream
#[derive(Clone)]
pub struct DeviceSinkFactory {
    tx: Arc<Mutex<Producer<f32>>>,
    /// Device frames per source frame
    ratio: f64,
}

impl DeviceOutput {
    /// Open the default output device for PCM at `source_rate`.
    pub fn open(source_rate: u32) -> Result<(DeviceOutput, DeviceSinkFactory), SinkError> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| SinkError::Unavailable("no default output device available".into()))?;
        let config = device
            .default_output_config()
            .map_err(|e| SinkError::Unavailable(format!("failed to fetch output config: {e}")))?;

        let device_rate = config.sample_rate().0;
        let channels = (config.channels() as usize).max(1);
        debug!("output device: {device_rate} Hz, {channels} channel(s)");

        let (tx, mut rx) = RingBuffer::<f32>::new(DEVICE_QUEUE_SIZE);

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _| {
                    // Mono to all channels; silence when no bell is ringing
                    for frame in data.chunks_mut(channels) {
                        let s = rx.pop().unwrap_or(0.0);
                        frame.fill(s);
                    }
                },
                |err| error!("audio stream error: {err}"),
                None,
            )
            .map_err(|e| SinkError::Unavailable(format!("failed to build output stream: {e}")))?;

        stream
            .play()
            .map_err(|e| SinkError::Unavailable(format!("failed to start output stream: {e}")))?;

        let output = DeviceOutput {
            _stream: stream,
            device_rate,
            channels,
        };
        let factory = DeviceSinkFactory {
            tx: Arc::new(Mutex::new(tx)),
            ratio: device_rate as f64 / source_rate.max(1) as f64,
        };

        Ok((output, factory))
    }
}

impl SinkFactory for DeviceSinkFactory {
    type Sink = DeviceSink;

    fn open(&self, _pitch: Pitch) -> Result<DeviceSink, SinkError> {
        let sink = DeviceSink {
            tx: self.tx.clone(),
            resampler: Resampler::new(self.ratio),
        };
        if sink.abandoned()? {
            return Err(SinkError::Disconnected);
        }
        Ok(sink)
    }
}

/// Sample-and-hold conversion from the choir's rate to the device rate
#[derive(Debug, Clone, Copy)]
struct Resampler {
    /// Device frames per source frame
    ratio: f64,
    phase: f64,
}

impl Resampler {
    fn new(ratio: f64) -> Self {
        Self { ratio, phase: 0.0 }
    }

    /// Queue `samples`, each held for as many device frames as it covers.
    /// The phase carries over between calls.
    fn feed(&mut self, tx: &mut Producer<f32>, samples: &[i8]) -> Result<(), SinkError> {
        for &s in samples {
            let value = s as f32 / 128.0;
            self.phase += self.ratio;
            while self.phase >= 1.0 {
                push(tx, value)?;
                self.phase -= 1.0;
            }
        }
        Ok(())
    }
}

/// Push one device frame, waiting for room in the queue
fn push(tx: &mut Producer<f32>, value: f32) -> Result<(), SinkError> {
    while tx.push(value).is_err() {
        if tx.is_abandoned() {
            return Err(SinkError::Disconnected);
        }
        thread::sleep(BACKOFF);
    }
    Ok(())
}

/// True once the stream has consumed everything queued
fn is_drained(tx: &Producer<f32>) -> Result<bool, SinkError> {
    if tx.is_abandoned() {
        return Err(SinkError::Disconnected);
    }
    Ok(tx.slots() == tx.buffer().capacity())
}

/// One player's handle on the shared output stream
pub struct DeviceSink {
    tx: Arc<Mutex<Producer<f32>>>,
    resampler: Resampler,
}

impl DeviceSink {
    fn abandoned(&self) -> Result<bool, SinkError> {
        let tx = self.tx.lock().map_err(|_| SinkError::Disconnected)?;
        Ok(tx.is_abandoned())
    }
}

impl AudioSink for DeviceSink {
    fn write(&mut self, samples: &[i8]) -> Result<(), SinkError> {
        let mut tx = self.tx.lock().map_err(|_| SinkError::Disconnected)?;
        self.resampler.feed(&mut tx, samples)
    }

    fn drain(&mut self) -> Result<(), SinkError> {
        loop {
            {
                let tx = self.tx.lock().map_err(|_| SinkError::Disconnected)?;
                if is_drained(&tx)? {
                    return Ok(());
                }
            }
            thread::sleep(BACKOFF);
        }
    }
}
