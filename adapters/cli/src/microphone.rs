//! Terminal stand-ins for a live microphone.

use std::{f64::consts::PI, path::PathBuf};

use log::debug;
use sound_trail_core::{DecodedAudio, PipelineError, Waveform};
use sound_trail_system_challenge::{AudioCaptureAdapter, CaptureHandle, Recording};

use crate::wav;

/// Sample rate of synthesised tones.
pub(crate) const TONE_SAMPLE_RATE_HZ: u32 = 44_100;

/// Longest tone the terminal will synthesise.
pub(crate) const MAX_TONE_SECS: f64 = 60.0;

/// Where a terminal "recording" comes from.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum SoundSource {
    /// A synthesised sine tone.
    Tone {
        /// Pitch of the tone.
        frequency_hz: f64,
        /// Length of the tone.
        seconds: f64,
    },
    /// A 16-bit PCM WAV file on disk.
    WavFile(PathBuf),
    /// A microphone the user refused to share.
    Denied,
}

/// Capture adapter that produces one recording from a [`SoundSource`].
#[derive(Debug)]
pub(crate) struct TerminalMicrophone {
    source: SoundSource,
}

impl TerminalMicrophone {
    pub(crate) fn new(source: SoundSource) -> Self {
        Self { source }
    }
}

impl AudioCaptureAdapter for TerminalMicrophone {
    type Handle = TerminalCapture;

    async fn begin(&mut self) -> Result<TerminalCapture, PipelineError> {
        if self.source == SoundSource::Denied {
            return Err(PipelineError::PermissionDenied);
        }
        debug!("microphone opened for {:?}", self.source);
        Ok(TerminalCapture {
            source: self.source.clone(),
        })
    }
}

/// Open capture; releases the microphone when dropped.
#[derive(Debug)]
pub(crate) struct TerminalCapture {
    source: SoundSource,
}

impl CaptureHandle for TerminalCapture {
    type Recording = WavRecording;

    async fn stop(self) -> Result<WavRecording, PipelineError> {
        let bytes = match &self.source {
            SoundSource::Tone {
                frequency_hz,
                seconds,
            } => {
                if !(0.0..=MAX_TONE_SECS).contains(seconds) {
                    return Err(PipelineError::Decode(format!(
                        "tone of {seconds} s exceeds the {MAX_TONE_SECS} s limit"
                    )));
                }
                wav::encode_pcm16(&synthesise(*frequency_hz, *seconds))
            }
            SoundSource::WavFile(path) => std::fs::read(path).map_err(|error| {
                PipelineError::Decode(format!("{}: {error}", path.display()))
            })?,
            SoundSource::Denied => return Err(PipelineError::PermissionDenied),
        };
        Ok(WavRecording { bytes })
    }
}

impl Drop for TerminalCapture {
    fn drop(&mut self) {
        debug!("microphone released");
    }
}

/// Recorded WAV payload.
#[derive(Debug)]
pub(crate) struct WavRecording {
    bytes: Vec<u8>,
}

impl Recording for WavRecording {
    async fn decode(&self) -> Result<DecodedAudio, PipelineError> {
        wav::decode_pcm16(&self.bytes)
    }
}

fn synthesise(frequency_hz: f64, seconds: f64) -> Waveform {
    let rate = f64::from(TONE_SAMPLE_RATE_HZ);
    let count = (seconds * rate).round() as usize;
    let samples = (0..count)
        .map(|i| (0.5 * (2.0 * PI * frequency_hz * i as f64 / rate).sin()) as f32)
        .collect();
    Waveform::new(samples, TONE_SAMPLE_RATE_HZ)
}
