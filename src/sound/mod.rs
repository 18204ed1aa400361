pub mod buffer;
pub mod table;

pub use buffer::WaveformBuffer;

use crate::error::SynthError;
use std::fmt;

const TWO_PI: f64 = std::f64::consts::PI * 2.0;

/// Full-scale amplitude, with headroom under `i16::MAX`.
pub const DEFAULT_PEAK: i16 = 20000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WaveformKind {
    Sine,
    Square,
}

impl WaveformKind {
    pub const ALL: [WaveformKind; 2] = [WaveformKind::Sine, WaveformKind::Square];

    pub fn toggled(self) -> Self {
        match self {
            WaveformKind::Sine => WaveformKind::Square,
            WaveformKind::Square => WaveformKind::Sine,
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            WaveformKind::Sine => 0,
            WaveformKind::Square => 1,
        }
    }

    /// Unit amplitude at `phase` radians.
    fn amplitude(self, phase: f64) -> f64 {
        let s = phase.sin();
        match self {
            WaveformKind::Sine => s,
            // f64::signum maps 0.0 to 1.0, a square wave crosses zero there
            WaveformKind::Square if s == 0.0 => 0.0,
            WaveformKind::Square => s.signum(),
        }
    }
}

impl Default for WaveformKind {
    fn default() -> Self {
        WaveformKind::Sine
    }
}

impl fmt::Display for WaveformKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WaveformKind::Sine => f.write_str("Sine"),
            WaveformKind::Square => f.write_str("Square"),
        }
    }
}

/// Shape of every generated buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct WaveConfig {
    pub sampling_rate: u32,
    pub duration_seconds: f64,
    /// Length of each edge ramp.
    pub fade_seconds: f64,
    /// Gain reached at the end of the fade-in ramp.
    pub fade_in_gain: f64,
    pub peak: i16,
}

impl Default for WaveConfig {
    fn default() -> Self {
        Self {
            sampling_rate: 44100,
            duration_seconds: 10.0,
            fade_seconds: 0.01,
            fade_in_gain: 0.05,
            peak: DEFAULT_PEAK,
        }
    }
}

impl WaveConfig {
    pub fn sample_count(&self) -> usize {
        (self.sampling_rate as f64 * self.duration_seconds).round() as usize
    }

    pub fn fade_samples(&self) -> usize {
        (self.sampling_rate as f64 * self.fade_seconds).round() as usize
    }

    pub fn validate(&self) -> Result<(), SynthError> {
        let invalid = |msg: String| Err(SynthError::InvalidWaveformConfig(msg));
        if self.sampling_rate == 0 {
            return invalid("sampling rate must be positive".to_string());
        }
        if !(self.duration_seconds.is_finite() && self.duration_seconds > 0.0) {
            return invalid(format!("duration {}s must be positive", self.duration_seconds));
        }
        if !(self.fade_seconds.is_finite() && self.fade_seconds >= 0.0) {
            return invalid(format!("fade {}s must not be negative", self.fade_seconds));
        }
        if self.fade_seconds * 2.0 >= self.duration_seconds {
            return invalid(format!(
                "fade {}s must be shorter than half of {}s",
                self.fade_seconds, self.duration_seconds
            ));
        }
        let (n, f) = (self.sample_count(), self.fade_samples());
        if f * 2 >= n {
            return invalid(format!("{} fade samples do not fit in {} samples", f, n));
        }
        if !(0.0..=1.0).contains(&self.fade_in_gain) {
            return invalid(format!("fade-in gain {} outside 0..=1", self.fade_in_gain));
        }
        if self.peak <= 0 {
            return invalid(format!("peak {} must be positive", self.peak));
        }
        Ok(())
    }
}

/// Synthesizes one tapered buffer of `config.sample_count()` samples.
pub fn generate(
    frequency_hz: f64,
    kind: WaveformKind,
    config: &WaveConfig,
) -> Result<WaveformBuffer, SynthError> {
    config.validate()?;
    if !(frequency_hz.is_finite() && frequency_hz > 0.0) {
        return Err(SynthError::InvalidWaveformConfig(format!(
            "frequency {} Hz must be positive",
            frequency_hz
        )));
    }

    let len = config.sample_count();
    let fade = config.fade_samples();
    let step = config.duration_seconds / len as f64;
    let peak = config.peak as f64;
    let samples = (0..len)
        .map(|i| {
            let t = i as f64 * step;
            let v = peak * kind.amplitude(TWO_PI * frequency_hz * t);
            let v = v * buffer::edge_gain(i, len, fade, config.fade_in_gain);
            // Truncates toward zero, `peak` keeps it in range.
            v as i16
        })
        .collect();
    Ok(WaveformBuffer::new(samples, kind, config.sampling_rate))
}
