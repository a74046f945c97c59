//! Audio interface for Vigil HAL
//! Synthesizes alert tones and plays them through ALSA (`aplay`)

use crate::HalError;
use std::io::Write;
use std::process::{Command, Stdio};
use std::time::Duration;

/// Attack time of the tone envelope
const ATTACK_MS: f64 = 10.0;

/// Level the exponential decay reaches at the end of a tone
const DECAY_FLOOR: f64 = 0.01;

/// Audio format configuration
#[derive(Debug, Clone)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl Default for AudioFormat {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            channels: 1,
            bits_per_sample: 16,
        }
    }
}

/// A single sine burst, scheduled relative to the start of its pattern
#[derive(Debug, Clone, PartialEq)]
pub struct Tone {
    pub frequency_hz: f64,
    pub duration_ms: u32,
    pub start_delay_ms: u32,
    /// Peak amplitude, 0.0 - 1.0
    pub gain: f64,
}

impl Tone {
    pub fn new(frequency_hz: f64, duration_ms: u32, start_delay_ms: u32) -> Self {
        Self {
            frequency_hz,
            duration_ms,
            start_delay_ms,
            gain: 0.3,
        }
    }

    pub fn with_gain(mut self, gain: f64) -> Self {
        self.gain = gain.clamp(0.0, 1.0);
        self
    }
}

/// Anything that can emit a tone
pub trait ToneSink: Send {
    /// Play `tone` after its start delay. Returns once playback is scheduled.
    fn play_tone(&mut self, tone: &Tone) -> Result<(), HalError>;
}

/// Sink for hosts without audio output
#[derive(Debug, Default)]
pub struct NullSink;

impl ToneSink for NullSink {
    fn play_tone(&mut self, tone: &Tone) -> Result<(), HalError> {
        tracing::debug!(frequency = tone.frequency_hz, "Audio disabled, tone skipped");
        Ok(())
    }
}

/// Audio playback device
pub struct AudioPlayback {
    device: String,
    format: AudioFormat,
}

impl AudioPlayback {
    /// Create new playback device
    pub fn new(device: &str, format: AudioFormat) -> Result<Self, HalError> {
        if format.bits_per_sample != 16 {
            return Err(HalError::InvalidConfig(format!(
                "unsupported sample width: {} bits",
                format.bits_per_sample
            )));
        }

        Ok(Self {
            device: device.to_string(),
            format,
        })
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// Generate an enveloped sine tone: short linear attack, exponential decay
    pub fn generate_tone(&self, frequency: f64, duration_ms: u32, gain: f64) -> Vec<i16> {
        let rate = self.format.sample_rate as f64;
        let num_samples = (rate * duration_ms as f64 / 1000.0) as usize;
        let mut samples = Vec::with_capacity(num_samples);

        let attack = (rate * ATTACK_MS / 1000.0).max(1.0);
        let decay_len = (num_samples as f64 - attack).max(1.0);
        let floor = (DECAY_FLOOR / gain.max(DECAY_FLOOR)).min(1.0);

        for i in 0..num_samples {
            let n = i as f64;
            let envelope = if n < attack {
                gain * n / attack
            } else {
                gain * floor.powf((n - attack) / decay_len)
            };

            let t = n / rate;
            let sample = (2.0 * std::f64::consts::PI * frequency * t).sin() * envelope;
            samples.push((sample * 32767.0) as i16);
        }

        samples
    }

    fn spawn_player(&self) -> Result<std::process::Child, HalError> {
        Command::new("aplay")
            .args(["-q", "-D", &self.device, "-t", "raw", "-f", "S16_LE"])
            .arg("-r")
            .arg(self.format.sample_rate.to_string())
            .arg("-c")
            .arg(self.format.channels.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => HalError::DeviceNotFound("aplay".to_string()),
                _ => HalError::IoError(e),
            })
    }
}

impl ToneSink for AudioPlayback {
    fn play_tone(&mut self, tone: &Tone) -> Result<(), HalError> {
        let samples = self.generate_tone(tone.frequency_hz, tone.duration_ms, tone.gain);
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();

        let mut child = self.spawn_player()?;
        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| HalError::DeviceNotFound(format!("{} (no stdin)", self.device)))?;

        let delay = Duration::from_millis(tone.start_delay_ms as u64);
        std::thread::spawn(move || {
            std::thread::sleep(delay);
            if let Err(e) = stdin.write_all(&pcm) {
                tracing::warn!("Failed to write tone to player: {}", e);
            }
            drop(stdin);
            let _ = child.wait();
        });

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playback() -> AudioPlayback {
        AudioPlayback::new("default", AudioFormat::default()).unwrap()
    }

    #[test]
    fn tone_length_matches_duration() {
        let samples = playback().generate_tone(880.0, 500, 0.3);
        assert_eq!(samples.len(), 22050);
    }

    #[test]
    fn tone_envelope_starts_silent_and_stays_under_gain() {
        let samples = playback().generate_tone(880.0, 500, 0.3);
        assert_eq!(samples[0], 0);

        let peak = samples.iter().map(|s| (*s as i32).abs()).max().unwrap();
        assert!(peak as f64 <= 0.3 * 32767.0 + 1.0);
        assert!(peak as f64 > 0.2 * 32767.0);

        let tail = samples[samples.len() - 200..]
            .iter()
            .map(|s| (*s as i32).abs())
            .max()
            .unwrap();
        assert!(tail < 500);
    }

    #[test]
    fn rejects_unsupported_sample_width() {
        let format = AudioFormat {
            bits_per_sample: 24,
            ..Default::default()
        };
        assert!(matches!(
            AudioPlayback::new("default", format),
            Err(HalError::InvalidConfig(_))
        ));
    }

    #[test]
    fn gain_is_clamped() {
        assert_eq!(Tone::new(440.0, 100, 0).with_gain(3.0).gain, 1.0);
    }

    #[test]
    fn null_sink_accepts_tones() {
        let mut sink = NullSink;
        assert!(sink.play_tone(&Tone::new(1047.0, 700, 400)).is_ok());
    }
}
