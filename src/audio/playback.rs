//! Cue playback on the default output device via `cpal`.
//!
//! Each [`CpalCuePlayer::play`] call opens the default device, renders the
//! cue at the device's native rate, plays it on a fresh output stream and
//! blocks until the callback reports that every sample has been written.
//! The stream is dropped before `play` returns.

use std::sync::mpsc;
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample};

use crate::config::AudioConfig;

use super::{synthesize, AudioPlayer, Cue, PlaybackError};

/// Extra time allowed past the cue's nominal length before giving up.
const DRAIN_GRACE: Duration = Duration::from_secs(2);

/// Plays synthesized cues at a fixed volume.
#[derive(Debug, Clone)]
pub struct CpalCuePlayer {
    volume: f32,
}

impl CpalCuePlayer {
    /// Fails with [`PlaybackError::NoDevice`] when the host has no default
    /// output device.
    pub fn new(config: &AudioConfig) -> Result<Self, PlaybackError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(PlaybackError::NoDevice)?;
        let name = device.name().unwrap_or_else(|_| "unknown".into());
        log::info!("audio: output device {name}, volume {:.2}", config.volume);

        Ok(Self {
            volume: config.volume,
        })
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }
}

impl AudioPlayer for CpalCuePlayer {
    fn play(&self, cue: Cue) -> Result<(), PlaybackError> {
        let device = cpal::default_host()
            .default_output_device()
            .ok_or(PlaybackError::NoDevice)?;
        let supported = device.default_output_config()?;
        let format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        let samples = synthesize(cue, config.sample_rate.0, self.volume);
        let (done_tx, done_rx) = mpsc::channel::<()>();

        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, samples, done_tx)?,
            SampleFormat::I16 => build_stream::<i16>(&device, &config, samples, done_tx)?,
            SampleFormat::U16 => build_stream::<u16>(&device, &config, samples, done_tx)?,
            other => return Err(PlaybackError::SampleFormat(format!("{other:?}"))),
        };

        log::debug!("audio: playing {cue:?} cue");
        stream.play()?;

        let limit = Duration::from_millis(u64::from(cue.duration_ms())) + DRAIN_GRACE;
        let finished = done_rx.recv_timeout(limit).is_ok();
        drop(stream);

        if finished {
            Ok(())
        } else {
            Err(PlaybackError::Stalled)
        }
    }
}

/// Output stream that writes the mono `samples` to every channel, then
/// silence, signalling `done` once after the last sample.
fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    samples: Vec<f32>,
    done: mpsc::Sender<()>,
) -> Result<cpal::Stream, PlaybackError>
where
    T: SizedSample + FromSample<f32>,
{
    let channels = usize::from(config.channels.max(1));
    let mut signalled = false;
    let mut position = 0usize;

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
            for frame in data.chunks_mut(channels) {
                let value = samples.get(position).copied().unwrap_or(0.0);
                position = position.saturating_add(1);
                for out in frame.iter_mut() {
                    *out = T::from_sample(value);
                }
            }
            if position >= samples.len() && !signalled {
                signalled = true;
                let _ = done.send(());
            }
        },
        |err: cpal::StreamError| {
            log::error!("audio: output stream error: {err}");
        },
        None,
    )?;
    Ok(stream)
}
