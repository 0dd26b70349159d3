use crate::error::AudioError;
use crate::sound::AudioBackend;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SampleFormat, SizedSample};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// Mono PCM clip at its native sample rate.
#[derive(Clone, Debug, PartialEq)]
pub struct PcmClip {
    pub sample_rate_hz: u32,
    pub samples: Vec<f32>,
}

impl PcmClip {
    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate_hz == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate_hz as f32
    }
}

pub fn load_wav(path: &Path) -> Result<PcmClip, AudioError> {
    let bytes = std::fs::read(path).map_err(|e| AudioError::Decode(format!("{}: {e}", path.display())))?;
    decode_wav_pcm16(&bytes)
}

/// Decodes a RIFF/WAVE file holding 16-bit integer PCM, downmixing to mono.
pub fn decode_wav_pcm16(bytes: &[u8]) -> Result<PcmClip, AudioError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(AudioError::Decode("not a RIFF/WAVE file".to_string()));
    }

    let mut fmt: Option<(u16, u16, u32, u16)> = None;
    let mut data: Option<&[u8]> = None;
    let mut pos = 12usize;
    while pos + 8 <= bytes.len() {
        let id = &bytes[pos..pos + 4];
        let len = u32::from_le_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]]) as usize;
        let body_start = pos + 8;
        let body_end = body_start.saturating_add(len).min(bytes.len());
        let body = &bytes[body_start..body_end];
        match id {
            b"fmt " if body.len() >= 16 => {
                let format = u16::from_le_bytes([body[0], body[1]]);
                let channels = u16::from_le_bytes([body[2], body[3]]);
                let rate = u32::from_le_bytes([body[4], body[5], body[6], body[7]]);
                let bits = u16::from_le_bytes([body[14], body[15]]);
                fmt = Some((format, channels, rate, bits));
            }
            b"data" => data = Some(body),
            _ => {}
        }
        // Chunks are word aligned.
        pos = body_start.saturating_add(len + (len & 1));
    }

    let (format, channels, rate, bits) = fmt.ok_or_else(|| AudioError::Decode("missing fmt chunk".to_string()))?;
    let data = data.ok_or_else(|| AudioError::Decode("missing data chunk".to_string()))?;
    if format != 1 || bits != 16 {
        return Err(AudioError::Decode(format!(
            "unsupported encoding (format {format}, {bits} bits); expected 16-bit PCM"
        )));
    }
    if channels == 0 || rate == 0 {
        return Err(AudioError::Decode("invalid channel count or sample rate".to_string()));
    }

    let ch = channels as usize;
    let samples = data
        .chunks_exact(2 * ch)
        .map(|frame| {
            let sum: f32 = frame
                .chunks_exact(2)
                .map(|s| i16::from_le_bytes([s[0], s[1]]) as f32 / 32768.0)
                .sum();
            sum / ch as f32
        })
        .collect();

    Ok(PcmClip {
        sample_rate_hz: rate,
        samples,
    })
}

/// What plays under the intro.
#[derive(Clone, Debug)]
pub enum AmbientSource {
    /// Looped clip.
    Clip(Arc<PcmClip>),
    /// Synthesized forest wind.
    Wind { seed: u64 },
}

/// Brown-ish noise with slow gusts.
struct WindSynth {
    rng: fastrand::Rng,
    low: f32,
    lower: f32,
    phase: f32,
    sample_rate: f32,
}

impl WindSynth {
    fn new(seed: u64, sample_rate: f32) -> Self {
        Self {
            rng: fastrand::Rng::with_seed(seed),
            low: 0.0,
            lower: 0.0,
            phase: 0.0,
            sample_rate,
        }
    }

    fn next(&mut self) -> f32 {
        let white = self.rng.f32() * 2.0 - 1.0;
        self.phase = (self.phase + 0.07 / self.sample_rate) % 1.0;
        let gust = 0.55 + 0.45 * (self.phase * std::f32::consts::TAU).sin();
        let k = 0.010 + 0.025 * gust;
        self.low += k * (white - self.low);
        self.lower += 0.02 * (self.low - self.lower);
        (self.low - self.lower * 0.6) * (2.2 + 1.6 * gust)
    }
}

/// Bell-like partials under an exponential decay.
pub fn chime_sample(t_secs: f32) -> f32 {
    const PARTIALS: [(f32, f32); 4] = [(659.25, 0.5), (987.77, 0.3), (1318.5, 0.15), (1975.5, 0.05)];
    if t_secs < 0.0 {
        return 0.0;
    }
    let attack = (t_secs / 0.008).min(1.0);
    let env = attack * (-t_secs * 2.2).exp();
    PARTIALS
        .iter()
        .map(|&(hz, amp)| (t_secs * hz * std::f32::consts::TAU).sin() * amp)
        .sum::<f32>()
        * env
}

const CHIME_SECS: f32 = 2.5;

struct Shared {
    volume: AtomicU32,
    paused: AtomicBool,
    accent_volume: AtomicU32,
    accent_pending: AtomicBool,
}

impl Shared {
    fn new() -> Self {
        Self {
            volume: AtomicU32::new(0f32.to_bits()),
            paused: AtomicBool::new(true),
            accent_volume: AtomicU32::new(0f32.to_bits()),
            accent_pending: AtomicBool::new(false),
        }
    }
}

/// Mixer state owned by the device callback.
struct Voice {
    shared: Arc<Shared>,
    source: AmbientSource,
    wind: WindSynth,
    clip_pos: f64,
    sample_rate: f32,
    chime: Option<(usize, f32)>,
    gain: f32,
}

impl Voice {
    fn next_sample(&mut self) -> f32 {
        if self.shared.accent_pending.swap(false, Ordering::AcqRel) {
            let v = f32::from_bits(self.shared.accent_volume.load(Ordering::Relaxed));
            self.chime = Some((0, v));
        }

        let target = f32::from_bits(self.shared.volume.load(Ordering::Relaxed));
        // Per-sample smoothing keeps volume steps from clicking.
        self.gain += (target - self.gain) * 0.002;

        let ambient = match &self.source {
            AmbientSource::Clip(clip) => {
                if clip.samples.is_empty() {
                    0.0
                } else {
                    let idx = self.clip_pos as usize % clip.samples.len();
                    self.clip_pos += clip.sample_rate_hz as f64 / self.sample_rate as f64;
                    if self.clip_pos >= clip.samples.len() as f64 {
                        self.clip_pos -= clip.samples.len() as f64;
                    }
                    clip.samples[idx]
                }
            }
            AmbientSource::Wind { .. } => self.wind.next() * 0.35,
        };

        let mut out = ambient * self.gain;
        if let Some((pos, vol)) = self.chime {
            let t = pos as f32 / self.sample_rate;
            if t >= CHIME_SECS {
                self.chime = None;
            } else {
                out += chime_sample(t) * vol * 0.4;
                self.chime = Some((pos + 1, vol));
            }
        }
        out.clamp(-1.0, 1.0)
    }
}

/// Default output device via `cpal`. The device is opened on the first
/// `start`, so a missing device reads as refused playback.
pub struct CpalOutput {
    source: AmbientSource,
    shared: Arc<Shared>,
    stream: Option<cpal::Stream>,
}

impl CpalOutput {
    pub fn new(source: AmbientSource) -> Self {
        Self {
            source,
            shared: Arc::new(Shared::new()),
            stream: None,
        }
    }

    fn open_stream(&self) -> Result<cpal::Stream, AudioError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or(AudioError::NoDevice)?;
        let supported = device
            .default_output_config()
            .map_err(|e| AudioError::Stream(e.to_string()))?;
        let sample_rate = supported.sample_rate().0 as f32;
        let channels = supported.channels() as usize;
        let config: cpal::StreamConfig = supported.clone().into();

        let seed = match &self.source {
            AmbientSource::Wind { seed } => *seed,
            AmbientSource::Clip(_) => 0,
        };
        let voice = Voice {
            shared: Arc::clone(&self.shared),
            source: self.source.clone(),
            wind: WindSynth::new(seed, sample_rate),
            clip_pos: 0.0,
            sample_rate,
            chime: None,
            gain: 0.0,
        };

        let stream = match supported.sample_format() {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, channels, voice),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, channels, voice),
            SampleFormat::U16 => build_stream::<u16>(&device, &config, channels, voice),
            fmt => return Err(AudioError::Stream(format!("unsupported sample format: {fmt:?}"))),
        }?;
        tracing::debug!(sample_rate, channels, "audio output stream opened");
        Ok(stream)
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut voice: Voice,
) -> Result<cpal::Stream, AudioError>
where
    T: SizedSample + FromSample<f32>,
{
    let err_fn = |err: cpal::StreamError| tracing::warn!("audio stream error: {err}");
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _| {
                let paused = voice.shared.paused.load(Ordering::Relaxed);
                for frame in data.chunks_mut(channels.max(1)) {
                    let s = if paused { 0.0 } else { voice.next_sample() };
                    let v = T::from_sample(s);
                    frame.iter_mut().for_each(|out| *out = v);
                }
            },
            err_fn,
            None,
        )
        .map_err(|e| AudioError::Stream(e.to_string()))
}

impl AudioBackend for CpalOutput {
    fn name(&self) -> &'static str {
        match self.source {
            AmbientSource::Clip(_) => "cpal (clip)",
            AmbientSource::Wind { .. } => "cpal (wind)",
        }
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.stream.is_none() {
            self.stream = Some(self.open_stream()?);
        }
        if let Some(stream) = &self.stream {
            stream.play().map_err(|e| AudioError::Blocked(e.to_string()))?;
        }
        self.shared.paused.store(false, Ordering::Relaxed);
        Ok(())
    }

    fn pause(&mut self) {
        self.shared.paused.store(true, Ordering::Relaxed);
        if let Some(stream) = &self.stream {
            if let Err(err) = stream.pause() {
                tracing::debug!(%err, "stream pause unsupported; output muted instead");
            }
        }
    }

    fn set_volume(&mut self, volume: f32) {
        self.shared
            .volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
    }

    fn play_accent(&mut self, volume: f32) -> Result<(), AudioError> {
        if self.stream.is_none() {
            return Err(AudioError::Blocked("output not started".to_string()));
        }
        self.shared
            .accent_volume
            .store(volume.clamp(0.0, 1.0).to_bits(), Ordering::Relaxed);
        self.shared.accent_pending.store(true, Ordering::Release);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wav_bytes(rate: u32, channels: u16, frames: &[i16]) -> Vec<u8> {
        let data_len = (frames.len() * 2) as u32;
        let mut v = Vec::new();
        v.extend_from_slice(b"RIFF");
        v.extend_from_slice(&(36 + data_len).to_le_bytes());
        v.extend_from_slice(b"WAVE");
        v.extend_from_slice(b"fmt ");
        v.extend_from_slice(&16u32.to_le_bytes());
        v.extend_from_slice(&1u16.to_le_bytes());
        v.extend_from_slice(&channels.to_le_bytes());
        v.extend_from_slice(&rate.to_le_bytes());
        v.extend_from_slice(&(rate * channels as u32 * 2).to_le_bytes());
        v.extend_from_slice(&(channels * 2).to_le_bytes());
        v.extend_from_slice(&16u16.to_le_bytes());
        v.extend_from_slice(b"data");
        v.extend_from_slice(&data_len.to_le_bytes());
        for s in frames {
            v.extend_from_slice(&s.to_le_bytes());
        }
        v
    }

    #[test]
    fn stereo_is_downmixed() {
        let bytes = wav_bytes(22_050, 2, &[16384, -16384, 16384, 16384]);
        let clip = decode_wav_pcm16(&bytes).expect("decode");
        assert_eq!(clip.sample_rate_hz, 22_050);
        assert_eq!(clip.samples, vec![0.0, 0.5]);
    }

    #[test]
    fn rejects_non_pcm16() {
        let mut bytes = wav_bytes(8000, 1, &[0, 0]);
        bytes[34] = 24; // bits per sample
        assert!(matches!(decode_wav_pcm16(&bytes), Err(AudioError::Decode(_))));
        assert!(decode_wav_pcm16(b"nope").is_err());
    }

    #[test]
    fn chime_decays() {
        let early: f32 = (0..400).map(|i| chime_sample(0.05 + i as f32 / 48_000.0).abs()).sum();
        let late: f32 = (0..400).map(|i| chime_sample(2.0 + i as f32 / 48_000.0).abs()).sum();
        assert!(late < early * 0.1);
    }

    #[test]
    fn wind_is_bounded() {
        let mut w = WindSynth::new(5, 48_000.0);
        for _ in 0..48_000 {
            let s = w.next();
            assert!(s.is_finite() && s.abs() < 4.0);
        }
    }
}
