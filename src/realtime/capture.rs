use std::fmt::Display;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};

use crate::config::StreamingConfig;
use crate::error::{Result, StreamError};
use crate::realtime::session::{live_session, BeatReceiver, DetectorHandle};

fn device_error<E: Display>(context: &str, err: E) -> StreamError {
    StreamError::Device {
        reason: format!("{}: {}", context, err),
    }
}

/// Live session fed from the default input device
///
/// The detector runs at the device's native rate, which replaces
/// `sample_rate` from the configuration. Dropping the capture closes the
/// stream.
pub struct LiveCapture {
    stream: cpal::Stream,
    handle: DetectorHandle,
    sample_rate: u32,
}

impl LiveCapture {
    /// Open the default input device and start streaming into a new session
    ///
    /// The session itself stays idle until [`DetectorHandle::start`] is called.
    pub fn open(mut config: StreamingConfig) -> Result<(Self, BeatReceiver)> {
        let host = cpal::default_host();
        let device = host.default_input_device().ok_or_else(|| StreamError::Device {
            reason: "No default input device found".to_string(),
        })?;

        let supported = device
            .default_input_config()
            .map_err(|e| device_error("Failed to get default input config", e))?;
        if supported.sample_format() != cpal::SampleFormat::F32 {
            return Err(StreamError::Device {
                reason: format!(
                    "Only f32 input is supported, device offers {:?}",
                    supported.sample_format()
                ),
            }
            .into());
        }

        let stream_config: cpal::StreamConfig = supported.into();
        let channels = stream_config.channels.max(1) as usize;
        config.sample_rate = stream_config.sample_rate.0;
        let sample_rate = config.sample_rate;

        let (handle, mut feeder, receiver) = live_session(config)?;

        let stream = device
            .build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // an error has already ended the session; later blocks are ignored
                    let _ = feeder.push_interleaved(data, channels);
                },
                |err| tracing::error!("Input stream error: {}", err),
                None,
            )
            .map_err(|e| device_error("Failed to build input stream", e))?;

        stream
            .play()
            .map_err(|e| device_error("Failed to start input stream", e))?;

        tracing::info!(
            "Capturing from {} channel(s) at {} Hz",
            channels,
            sample_rate
        );

        Ok((
            Self {
                stream,
                handle,
                sample_rate,
            },
            receiver,
        ))
    }

    pub fn handle(&self) -> &DetectorHandle {
        &self.handle
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Stop the device callback without ending the session
    pub fn pause(&self) -> Result<()> {
        self.stream
            .pause()
            .map_err(|e| device_error("Failed to pause input stream", e))?;
        Ok(())
    }
}
