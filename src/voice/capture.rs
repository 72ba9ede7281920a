//! Voice capture
//!
//! Records one phrase from the default microphone, ending it on trailing
//! silence, and transcribes it. Callers fall back to typed input on any
//! [`CaptureError`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::warn;

use crate::config::{Config, ListenConfig};
use crate::error::BackendError;

#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("no capture device: {0}")]
    NoDevice(String),

    #[error("no speech heard before the timeout")]
    Timeout,

    #[error("speech was not understood")]
    NotUnderstood,

    #[error("transcription failed: {0}")]
    Backend(#[from] BackendError),

    #[error("listening interrupted")]
    Interrupted,
}

/// Speech-to-text capture
#[async_trait]
pub trait SpeechCapture: Send + Sync {
    /// Listen for one phrase and return its transcript
    async fn capture(&self) -> Result<String, CaptureError>;
}

/// Endpointer state after a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointState {
    /// Still waiting for speech to start
    Waiting,
    Recording,
    /// Phrase ended by silence or by the length cap
    Done,
    /// Nothing loud enough before the timeout
    TimedOut,
}

/// Energy-based phrase endpointing on a mono sample stream
#[derive(Debug, Clone)]
pub struct Endpointer {
    threshold: f32,
    timeout_samples: usize,
    max_samples: usize,
    silence_samples: usize,
    waited: usize,
    silent_run: usize,
    recorded: Vec<f32>,
    state: EndpointState,
}

impl Endpointer {
    pub fn new(config: &ListenConfig, sample_rate: u32) -> Self {
        let per_ms = sample_rate as usize / 1000;
        Self {
            threshold: config.energy_threshold,
            timeout_samples: config.timeout_secs as usize * sample_rate as usize,
            max_samples: config.phrase_limit_secs as usize * sample_rate as usize,
            silence_samples: config.silence_ms as usize * per_ms,
            waited: 0,
            silent_run: 0,
            recorded: Vec::new(),
            state: EndpointState::Waiting,
        }
    }

    pub fn state(&self) -> EndpointState {
        self.state
    }

    /// Feed one frame
    pub fn push(&mut self, frame: &[f32]) -> EndpointState {
        let loud = rms(frame) >= self.threshold;
        match self.state {
            EndpointState::Waiting => {
                if loud {
                    self.state = EndpointState::Recording;
                    self.recorded.extend_from_slice(frame);
                } else {
                    self.waited += frame.len();
                    if self.waited >= self.timeout_samples {
                        self.state = EndpointState::TimedOut;
                    }
                }
            }
            EndpointState::Recording => {
                self.recorded.extend_from_slice(frame);
                self.silent_run = if loud { 0 } else { self.silent_run + frame.len() };
                if self.silent_run >= self.silence_samples || self.recorded.len() >= self.max_samples {
                    self.state = EndpointState::Done;
                }
            }
            EndpointState::Done | EndpointState::TimedOut => {}
        }
        self.state
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.recorded
    }
}

/// Raises a shared flag when dropped, so a blocking recorder notices its
/// caller went away
#[derive(Debug)]
pub struct CancelOnDrop(Arc<AtomicBool>);

impl CancelOnDrop {
    pub fn new() -> (Self, Arc<AtomicBool>) {
        let flag = Arc::new(AtomicBool::new(false));
        (Self(flag.clone()), flag)
    }
}

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Feed frames from `rx` to `endpointer` until the phrase ends.
///
/// Returns `Interrupted` as soon as `cancel` is raised and `Timeout` when no
/// speech starts. Stops at `deadline` or when the sender hangs up.
pub fn endpoint_frames(
    rx: &mpsc::Receiver<Vec<f32>>,
    endpointer: &mut Endpointer,
    deadline: Instant,
    cancel: &AtomicBool,
) -> Result<(), CaptureError> {
    loop {
        if cancel.load(Ordering::SeqCst) {
            return Err(CaptureError::Interrupted);
        }
        if Instant::now() >= deadline {
            break;
        }
        match rx.recv_timeout(Duration::from_millis(100)) {
            Ok(frame) => match endpointer.push(&frame) {
                EndpointState::Done => break,
                EndpointState::TimedOut => return Err(CaptureError::Timeout),
                _ => {}
            },
            Err(mpsc::RecvTimeoutError::Timeout) => continue,
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
        }
    }

    if endpointer.state() == EndpointState::Waiting {
        return Err(CaptureError::Timeout);
    }
    Ok(())
}

/// Root-mean-square level of a frame
pub fn rms(frame: &[f32]) -> f32 {
    if frame.is_empty() {
        return 0.0;
    }
    (frame.iter().map(|s| s * s).sum::<f32>() / frame.len() as f32).sqrt()
}

/// Microphone capture, if this build and host support it
pub fn default_capture(config: &Config) -> Option<Arc<dyn SpeechCapture>> {
    #[cfg(feature = "voice")]
    {
        let Some(key) = crate::security::keyring::resolve_api_key(&config.model.api_key_env) else {
            warn!("Voice input needs the model API key for transcription, using typed input");
            return None;
        };
        let provider = crate::agent::llm::ProviderConfig::from_config(&config.model, key);
        let transcriber = crate::voice::transcribe::WhisperTranscriber::new(
            &provider,
            config.listen.transcription_model.clone(),
            config.model.timeout(),
        );
        Some(Arc::new(microphone::MicrophoneCapture::new(
            transcriber,
            config.listen.clone(),
        )))
    }

    #[cfg(not(feature = "voice"))]
    {
        let _ = config;
        warn!("Built without the `voice` feature, using typed input");
        None
    }
}

#[cfg(feature = "voice")]
pub mod microphone {
    use super::*;
    use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
    use tracing::info;

    use crate::voice::transcribe::{wav_bytes, WhisperTranscriber};

    pub struct MicrophoneCapture {
        transcriber: WhisperTranscriber,
        listen: ListenConfig,
    }

    impl MicrophoneCapture {
        pub fn new(transcriber: WhisperTranscriber, listen: ListenConfig) -> Self {
            Self { transcriber, listen }
        }
    }

    #[async_trait]
    impl SpeechCapture for MicrophoneCapture {
        async fn capture(&self) -> Result<String, CaptureError> {
            let listen = self.listen.clone();
            // Dropping this future (Ctrl+C in the console) stops the recorder
            let (_guard, cancel) = CancelOnDrop::new();
            let (samples, sample_rate) =
                tokio::task::spawn_blocking(move || record_phrase(&listen, &cancel))
                    .await
                    .map_err(|e| CaptureError::NoDevice(format!("capture task failed: {}", e)))??;

            info!("Recognizing speech...");
            let wav = wav_bytes(&samples, sample_rate)?;
            let text = self.transcriber.transcribe_wav(wav).await?;
            if text.is_empty() {
                return Err(CaptureError::NotUnderstood);
            }
            Ok(text)
        }
    }

    /// Record from the default input device until the endpointer stops
    fn record_phrase(
        listen: &ListenConfig,
        cancel: &AtomicBool,
    ) -> Result<(Vec<f32>, u32), CaptureError> {
        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::NoDevice("microphone not found".into()))?;
        let supported = device
            .default_input_config()
            .map_err(|e| CaptureError::NoDevice(e.to_string()))?;
        let sample_rate = supported.sample_rate().0;
        let channels = supported.channels() as usize;
        let stream_config: cpal::StreamConfig = supported.config();

        let (tx, rx) = mpsc::channel::<Vec<f32>>();
        let err_fn = |err: cpal::StreamError| warn!("Audio input error: {}", err);

        let stream = match supported.sample_format() {
            cpal::SampleFormat::F32 => {
                let tx = tx.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        let _ = tx.send(downmix(data.iter().copied(), channels));
                    },
                    err_fn,
                    None,
                )
            }
            cpal::SampleFormat::I16 => {
                let tx = tx.clone();
                device.build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        let samples = data.iter().map(|&s| s as f32 / i16::MAX as f32);
                        let _ = tx.send(downmix(samples, channels));
                    },
                    err_fn,
                    None,
                )
            }
            format => {
                return Err(CaptureError::NoDevice(format!("unsupported sample format {:?}", format)))
            }
        }
        .map_err(|e| CaptureError::NoDevice(e.to_string()))?;
        drop(tx);

        stream.play().map_err(|e| CaptureError::NoDevice(e.to_string()))?;
        info!("Listening...");

        let mut endpointer = Endpointer::new(listen, sample_rate);
        // Hard stop in case the device stops delivering frames
        let deadline =
            Instant::now() + Duration::from_secs(listen.timeout_secs + listen.phrase_limit_secs + 1);

        let result = endpoint_frames(&rx, &mut endpointer, deadline, cancel);
        drop(stream);
        result?;
        Ok((endpointer.into_samples(), sample_rate))
    }

    fn downmix(samples: impl Iterator<Item = f32>, channels: usize) -> Vec<f32> {
        let interleaved: Vec<f32> = samples.collect();
        if channels <= 1 {
            return interleaved;
        }
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    }
}
