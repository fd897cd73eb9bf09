#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spectral analysis system that extracts the dominant frequency and playable
//! duration of a decoded recording.
//!
//! The analyser looks at a single window of the clip, taken after a short
//! settle delay, and reports the strongest bin of its magnitude spectrum. This
//! separates a few well spaced tonal categories (a low buzz from a high hiss)
//! and is not meant as a general pitch detector.

mod fft;

use std::time::Duration;

use log::debug;
use sound_trail_core::{AnalysisResult, ConfigurationError, DecodedAudio, PipelineError, Waveform};

const MIN_FFT_SIZE: usize = 32;

/// Tuning for the analysis window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AnalyzerConfig {
    /// Number of samples in the analysis window. Must be a power of two.
    pub fft_size: usize,
    /// Offset from the start of the clip where the window begins.
    pub settle_delay: Duration,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            settle_delay: Duration::from_millis(500),
        }
    }
}

/// Deterministic single-window spectral analyser.
#[derive(Clone, Debug)]
pub struct SpectralAnalyzer {
    config: AnalyzerConfig,
    window: Vec<f64>,
}

impl SpectralAnalyzer {
    /// Creates an analyser, rejecting unusable window sizes.
    pub fn new(config: AnalyzerConfig) -> Result<Self, ConfigurationError> {
        if config.fft_size < MIN_FFT_SIZE || !config.fft_size.is_power_of_two() {
            return Err(ConfigurationError::InvalidWindow(config.fft_size));
        }
        Ok(Self {
            window: fft::blackman(config.fft_size),
            config,
        })
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    /// Number of frequency bins in the magnitude spectrum.
    #[must_use]
    pub const fn bin_count(&self) -> usize {
        self.config.fft_size / 2
    }

    /// Width of one frequency bin at the provided sample rate.
    #[must_use]
    pub fn bin_width_hz(&self, sample_rate_hz: u32) -> f64 {
        f64::from(sample_rate_hz) / 2.0 / self.bin_count() as f64
    }

    /// Extracts the dominant frequency, duration and envelope of a recording.
    ///
    /// Fails with [`PipelineError::NoAudioData`] for an empty waveform and with
    /// [`PipelineError::DurationUnavailable`] when the clip has no finite
    /// length.
    pub fn analyze(&self, audio: &DecodedAudio) -> Result<AnalysisResult, PipelineError> {
        let waveform = &audio.waveform;
        if waveform.is_empty() {
            return Err(PipelineError::NoAudioData);
        }
        let duration_secs = playable_duration(audio)?;

        let segment = self.segment(waveform);
        let magnitudes = self.magnitude_spectrum(segment);
        let peak = dominant_bin(&magnitudes);
        let dominant_frequency_hz = peak as f64 * self.bin_width_hz(waveform.sample_rate_hz());
        let (rms, average_amplitude) = envelope(segment);

        debug!(
            "analysed {} samples: peak bin {peak} ({dominant_frequency_hz:.1} Hz), {duration_secs:.2} s, rms {rms:.3}",
            waveform.len()
        );

        Ok(AnalysisResult {
            dominant_frequency_hz,
            duration_secs,
            rms,
            average_amplitude,
        })
    }

    /// Magnitude spectrum of one window, zero padded to the window size.
    #[must_use]
    pub fn magnitude_spectrum(&self, segment: &[f32]) -> Vec<f64> {
        let mut frame = vec![0.0; self.config.fft_size];
        for ((slot, sample), weight) in frame.iter_mut().zip(segment).zip(&self.window) {
            *slot = f64::from(*sample) * weight;
        }
        fft::real_magnitudes(&frame)
    }

    fn segment<'a>(&self, waveform: &'a Waveform) -> &'a [f32] {
        let samples = waveform.samples();
        let size = self.config.fft_size;
        let settle = (self.config.settle_delay.as_secs_f64()
            * f64::from(waveform.sample_rate_hz())) as usize;

        let start = if samples.len() >= settle.saturating_add(size) {
            settle
        } else {
            samples.len().saturating_sub(size)
        };
        let end = start.saturating_add(size).min(samples.len());
        &samples[start..end]
    }
}

impl Default for SpectralAnalyzer {
    fn default() -> Self {
        let config = AnalyzerConfig::default();
        Self {
            window: fft::blackman(config.fft_size),
            config,
        }
    }
}

fn playable_duration(audio: &DecodedAudio) -> Result<f64, PipelineError> {
    if let Some(hint) = audio.duration_hint_secs {
        if !hint.is_finite() || hint < 0.0 {
            return Err(PipelineError::DurationUnavailable);
        }
    }

    let rate = audio.waveform.sample_rate_hz();
    if rate == 0 {
        return Err(PipelineError::DurationUnavailable);
    }
    let duration = audio.waveform.len() as f64 / f64::from(rate);
    if duration.is_finite() {
        Ok(duration)
    } else {
        Err(PipelineError::DurationUnavailable)
    }
}

fn dominant_bin(magnitudes: &[f64]) -> usize {
    let mut best = 0;
    let mut best_value = f64::NEG_INFINITY;
    for (index, value) in magnitudes.iter().enumerate() {
        if *value > best_value {
            best = index;
            best_value = *value;
        }
    }
    best
}

fn envelope(segment: &[f32]) -> (f64, f64) {
    if segment.is_empty() {
        return (0.0, 0.0);
    }
    let count = segment.len() as f64;
    let (squares, absolute) = segment.iter().fold((0.0, 0.0), |(sq, abs), sample| {
        let value = f64::from(*sample);
        (sq + value * value, abs + value.abs())
    });
    ((squares / count).sqrt(), absolute / count)
}
