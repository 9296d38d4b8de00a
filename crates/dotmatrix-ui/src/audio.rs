use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use dotmatrix_core::apu::AudioSink;
use dotmatrix_core::audio_queue::{audio_queue, AudioConsumer, AudioProducer};
use thiserror::Error;

// Frames the ring buffer can hold: two mixer buffers' worth.
const QUEUE_CAPACITY_FRAMES: usize = 4096;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("no supported output config: {0}")]
    Config(#[from] cpal::DefaultStreamConfigError),
    #[error("failed to build audio stream: {0}")]
    Build(#[from] cpal::BuildStreamError),
    #[error("failed to start audio stream: {0}")]
    Play(#[from] cpal::PlayStreamError),
    #[error("unsupported sample format {0:?}")]
    UnsupportedFormat(cpal::SampleFormat),
}

/// The emulator-facing half of the audio pipeline: the APU queues mixed
/// buffers here and paces itself on how much the device has yet to play.
pub struct QueueSink {
    producer: AudioProducer,
}

impl AudioSink for QueueSink {
    fn queued_bytes(&self) -> usize {
        self.producer.len() * 2 * std::mem::size_of::<f32>()
    }

    fn queue(&mut self, samples: &[f32]) {
        for frame in samples.chunks_exact(2) {
            self.producer.push_stereo(frame[0], frame[1]);
        }
    }
}

/// Open the default output device and stream samples popped from the queue.
///
/// Returns the active [`cpal::Stream`] (playback stops when dropped) and the
/// sink to install on the APU.
pub fn start_stream() -> Result<(cpal::Stream, QueueSink), AudioError> {
    let host = cpal::default_host();
    let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
    let supported = device.default_output_config()?;
    let sample_format = supported.sample_format();
    let config: cpal::StreamConfig = supported.into();
    let channels = config.channels as usize;
    let err_fn = |err| eprintln!("cpal stream error: {err}");

    let (producer, consumer) = audio_queue(QUEUE_CAPACITY_FRAMES);

    let stream = match sample_format {
        cpal::SampleFormat::F32 => device.build_output_stream(
            &config,
            {
                let consumer: AudioConsumer = consumer.clone();
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let (left, right) = consumer.pop_stereo().unwrap_or((0.0, 0.0));
                        frame[0] = left;
                        if channels > 1 {
                            frame[1] = right;
                        }
                    }
                }
            },
            err_fn,
            None,
        )?,
        cpal::SampleFormat::I16 => device.build_output_stream(
            &config,
            {
                let consumer: AudioConsumer = consumer.clone();
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let (left, right) = consumer.pop_stereo().unwrap_or((0.0, 0.0));
                        frame[0] = to_i16(left);
                        if channels > 1 {
                            frame[1] = to_i16(right);
                        }
                    }
                }
            },
            err_fn,
            None,
        )?,
        cpal::SampleFormat::U16 => device.build_output_stream(
            &config,
            {
                let consumer: AudioConsumer = consumer.clone();
                move |data: &mut [u16], _: &cpal::OutputCallbackInfo| {
                    for frame in data.chunks_mut(channels) {
                        let (left, right) = consumer.pop_stereo().unwrap_or((0.0, 0.0));
                        frame[0] = (to_i16(left) as i32 + 32768) as u16;
                        if channels > 1 {
                            frame[1] = (to_i16(right) as i32 + 32768) as u16;
                        }
                    }
                }
            },
            err_fn,
            None,
        )?,
        other => return Err(AudioError::UnsupportedFormat(other)),
    };

    stream.play()?;
    Ok((stream, QueueSink { producer }))
}

fn to_i16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * 32767.0) as i16
}
