//! # Audio Frames Module
//!
//! Defines the [`SampleWindow`] unit the pipeline consumes and the bounded
//! queue that carries windows from a producer (usually the audio callback)
//! to the thread running the pipeline.
//!
//! With the `capture` feature enabled, [`start_audio_capture`] opens the
//! default input device through CPAL and feeds that queue.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Audio buffer size for processing frames.
///
/// Larger buffers resolve lower strings but add latency; 2048 samples is
/// ~46 ms at 44.1 kHz.
pub const BUFFER_SIZE: usize = 2048;

/// One fixed-length block of mono samples and the rate it was captured at.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleWindow {
    pub samples: Vec<f32>,
    pub sample_rate: f32,
}

impl SampleWindow {
    pub fn new(samples: Vec<f32>, sample_rate: f32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Window length in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Creates the bounded window queue between producer and pipeline.
pub fn frame_channel(capacity: usize) -> (Sender<SampleWindow>, Receiver<SampleWindow>) {
    crossbeam_channel::bounded(capacity)
}

/// Count of windows dropped on a full queue, shared between the producer
/// and whoever reports it.
///
/// The audio callback only increments; logging happens on the consumer side.
#[derive(Debug, Clone, Default)]
pub struct DroppedFrames(Arc<AtomicU64>);

impl DroppedFrames {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self) {
        self.0.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the drops since the previous call and resets the count.
    pub fn take(&self) -> u64 {
        self.0.swap(0, Ordering::Relaxed)
    }
}

/// Offers a window to the queue without blocking.
///
/// A full queue drops the window and bumps `dropped`: the consumer only ever
/// wants the freshest audio. Returns `false` once the consumer has gone away.
pub fn push_frame(
    sender: &Sender<SampleWindow>,
    window: SampleWindow,
    dropped: &DroppedFrames,
) -> bool {
    match sender.try_send(window) {
        Ok(()) => true,
        Err(TrySendError::Full(_)) => {
            dropped.record();
            true
        }
        Err(TrySendError::Disconnected(_)) => false,
    }
}

/// Accumulates arbitrary-sized callback buffers into full windows.
#[derive(Debug)]
pub struct FrameAssembler {
    buffer: Vec<f32>,
    frame_size: usize,
    sample_rate: f32,
}

impl FrameAssembler {
    pub fn new(frame_size: usize, sample_rate: f32) -> Self {
        Self {
            buffer: Vec::with_capacity(frame_size * 2),
            frame_size,
            sample_rate,
        }
    }

    /// Appends `data` and returns every complete window now available.
    pub fn push(&mut self, data: &[f32]) -> Vec<SampleWindow> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while self.buffer.len() >= self.frame_size {
            let samples: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
            frames.push(SampleWindow::new(samples, self.sample_rate));
        }
        frames
    }
}

#[cfg(feature = "capture")]
pub use capture::start_audio_capture;

#[cfg(feature = "capture")]
mod capture {
    use super::{BUFFER_SIZE, DroppedFrames, FrameAssembler, SampleWindow, push_frame};
    use anyhow::{Context, Result, anyhow};
    use cpal::SupportedStreamConfigRange;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use crossbeam_channel::Sender;

    const TARGET_SAMPLE_RATE: u32 = 44_100;

    /// Starts audio capture from the default input device.
    ///
    /// Windows of [`BUFFER_SIZE`] samples are pushed onto `sender`, and any
    /// the queue cannot take are counted in `dropped`. The returned stream
    /// must be kept alive for capture to continue.
    ///
    /// # Returns
    /// * `Ok((stream, sample_rate))` - Audio stream handle and sample rate
    /// * `Err(e)` - No input device or no usable mono f32 format
    pub fn start_audio_capture(
        sender: Sender<SampleWindow>,
        dropped: DroppedFrames,
    ) -> Result<(cpal::Stream, u32)> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| anyhow!("No input device available"))?;

        log::info!("Using audio input device: {}", device.name()?);

        let configs = device
            .supported_input_configs()
            .context("querying input configurations")?
            .collect::<Vec<_>>();
        let supported_config = find_supported_config(configs, TARGET_SAMPLE_RATE)
            .ok_or_else(|| anyhow!("No suitable f32 input format found"))?;

        let rate = TARGET_SAMPLE_RATE
            .clamp(supported_config.min_sample_rate().0, supported_config.max_sample_rate().0);
        let config = supported_config.with_sample_rate(cpal::SampleRate(rate));
        let sample_rate = config.sample_rate().0;
        let config: cpal::StreamConfig = config.into();

        log::info!("Selected sample rate: {} Hz", sample_rate);

        let mut assembler = FrameAssembler::new(BUFFER_SIZE, sample_rate as f32);
        let err_fn = |err| log::error!("An error occurred on the audio stream: {}", err);

        let stream = device.build_input_stream(
            &config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                for window in assembler.push(data) {
                    push_frame(&sender, window, &dropped);
                }
            },
            err_fn,
            None,
        )?;

        stream.play()?;

        Ok((stream, sample_rate))
    }

    /// Picks a mono f32 configuration whose rate range is closest to `target_rate`.
    fn find_supported_config(
        configs: Vec<SupportedStreamConfigRange>,
        target_rate: u32,
    ) -> Option<SupportedStreamConfigRange> {
        configs
            .into_iter()
            .filter(|c| c.channels() == 1 && c.sample_format() == cpal::SampleFormat::F32)
            .min_by_key(|c| {
                let min_diff = (c.min_sample_rate().0 as i64 - target_rate as i64).abs();
                let max_diff = (c.max_sample_rate().0 as i64 - target_rate as i64).abs();
                min_diff.min(max_diff)
            })
    }
}
