//! Minimal RIFF/WAVE codec for 16-bit PCM recordings.

use sound_trail_core::{DecodedAudio, PipelineError, Waveform};

const RIFF: &[u8; 4] = b"RIFF";
const WAVE: &[u8; 4] = b"WAVE";
const FMT: &[u8; 4] = b"fmt ";
const DATA: &[u8; 4] = b"data";
const PCM_FORMAT: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
/// Chunk size written by recorders that stream without knowing the final length.
const STREAMING_SIZE: u32 = u32::MAX;

#[derive(Clone, Copy, Debug)]
struct Format {
    channels: u16,
    sample_rate_hz: u32,
}

/// Encodes mono samples as a 16-bit PCM WAV file.
#[must_use]
pub(crate) fn encode_pcm16(waveform: &Waveform) -> Vec<u8> {
    let data_len = u32::try_from(waveform.len() * 2).unwrap_or(u32::MAX - 36);
    let byte_rate = waveform.sample_rate_hz() * 2;

    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(RIFF);
    bytes.extend_from_slice(&(36 + data_len).to_le_bytes());
    bytes.extend_from_slice(WAVE);
    bytes.extend_from_slice(FMT);
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&PCM_FORMAT.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes());
    bytes.extend_from_slice(&waveform.sample_rate_hz().to_le_bytes());
    bytes.extend_from_slice(&byte_rate.to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&BITS_PER_SAMPLE.to_le_bytes());
    bytes.extend_from_slice(DATA);
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in waveform.samples() {
        let quantised = (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16;
        bytes.extend_from_slice(&quantised.to_le_bytes());
    }
    bytes
}

/// Decodes a 16-bit PCM WAV file, mixing every channel down to mono.
pub(crate) fn decode_pcm16(bytes: &[u8]) -> Result<DecodedAudio, PipelineError> {
    if bytes.len() < 12 || &bytes[0..4] != RIFF || &bytes[8..12] != WAVE {
        return Err(decode_error("missing RIFF/WAVE header"));
    }

    let mut format = None;
    let mut cursor = 12;
    while cursor + 8 <= bytes.len() {
        let id = &bytes[cursor..cursor + 4];
        let declared = read_u32(bytes, cursor + 4)?;
        let body_start = cursor + 8;
        let remaining = bytes.len() - body_start;

        if id == DATA {
            let format = format.ok_or_else(|| decode_error("data chunk precedes fmt chunk"))?;
            let streaming = declared == STREAMING_SIZE;
            let body_len = if streaming {
                remaining
            } else {
                (declared as usize).min(remaining)
            };
            return Ok(decode_samples(
                &bytes[body_start..body_start + body_len],
                format,
                streaming,
            ));
        }

        let body_len = declared as usize;
        if body_len > remaining {
            return Err(decode_error("chunk runs past the end of the file"));
        }
        if id == FMT {
            format = Some(parse_format(&bytes[body_start..body_start + body_len])?);
        }
        cursor = body_start + body_len + body_len % 2;
    }

    Err(decode_error("missing data chunk"))
}

fn parse_format(body: &[u8]) -> Result<Format, PipelineError> {
    if body.len() < 16 {
        return Err(decode_error("fmt chunk is too short"));
    }
    let tag = read_u16(body, 0)?;
    let channels = read_u16(body, 2)?;
    let sample_rate_hz = read_u32(body, 4)?;
    let bits = read_u16(body, 14)?;

    if tag != PCM_FORMAT || bits != BITS_PER_SAMPLE {
        return Err(decode_error(&format!(
            "unsupported encoding (format {tag}, {bits} bits); expected 16-bit PCM"
        )));
    }
    if channels == 0 {
        return Err(decode_error("fmt chunk declares zero channels"));
    }
    Ok(Format {
        channels,
        sample_rate_hz,
    })
}

fn decode_samples(data: &[u8], format: Format, streaming: bool) -> DecodedAudio {
    let channels = usize::from(format.channels);
    let frame_len = channels * 2;
    let samples: Vec<f32> = data
        .chunks_exact(frame_len)
        .map(|frame| {
            let sum: f32 = frame
                .chunks_exact(2)
                .map(|pair| f32::from(i16::from_le_bytes([pair[0], pair[1]])) / 32_768.0)
                .sum();
            sum / channels as f32
        })
        .collect();

    let duration_hint_secs = if streaming {
        Some(f64::INFINITY)
    } else if format.sample_rate_hz > 0 {
        Some(samples.len() as f64 / f64::from(format.sample_rate_hz))
    } else {
        None
    };

    DecodedAudio {
        waveform: Waveform::new(samples, format.sample_rate_hz),
        duration_hint_secs,
    }
}

fn read_u16(bytes: &[u8], at: usize) -> Result<u16, PipelineError> {
    bytes
        .get(at..at + 2)
        .map(|raw| u16::from_le_bytes([raw[0], raw[1]]))
        .ok_or_else(|| decode_error("unexpected end of file"))
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, PipelineError> {
    bytes
        .get(at..at + 4)
        .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
        .ok_or_else(|| decode_error("unexpected end of file"))
}

fn decode_error(reason: &str) -> PipelineError {
    PipelineError::Decode(reason.to_owned())
}
