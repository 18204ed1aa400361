//! Command-line settings.

use clap::{Parser, ValueEnum};
use std::time::Duration;

use crate::sound::{WaveConfig, DEFAULT_PEAK};
use crate::voice::{KindGains, ReleasePolicy, TogglePolicy, VoicePolicy};

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum ReleaseMode {
    /// Cut the note when its key goes up
    Stop,
    /// Fade the note out over --release-ms
    Fadeout,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq)]
pub enum ToggleMode {
    /// Notes already sounding keep their waveform
    Keep,
    /// Silence every note when the waveform changes
    StopAll,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "sound_keys")]
#[command(about = "Play sine and square tones from a keyboard device", long_about = None)]
pub struct Args {
    /// evdev keyboard devices to read, e.g. /dev/input/event3
    #[arg(required = true, value_name = "DEVICE")]
    pub devices: Vec<String>,

    #[arg(long, value_name = "HZ", default_value_t = 44100)]
    pub sample_rate: u32,

    /// Length of each generated tone
    #[arg(long, value_name = "SECONDS", default_value_t = 10.0)]
    pub duration: f64,

    /// Edge ramp applied to both ends of each tone
    #[arg(long, value_name = "SECONDS", default_value_t = 0.01)]
    pub fade: f64,

    /// Gain reached at the end of the fade-in ramp
    #[arg(long, value_name = "GAIN", default_value_t = 0.05)]
    pub fade_in_gain: f64,

    #[arg(long, value_enum, default_value_t = ReleaseMode::Fadeout)]
    pub release: ReleaseMode,

    #[arg(long, value_name = "MS", default_value_t = 300)]
    pub release_ms: u64,

    #[arg(long, value_enum, default_value_t = ToggleMode::StopAll)]
    pub on_toggle: ToggleMode,

    #[arg(long, value_name = "GAIN", default_value_t = 0.1)]
    pub sine_gain: f32,

    #[arg(long, value_name = "GAIN", default_value_t = 0.04)]
    pub square_gain: f32,
}

impl Args {
    pub fn wave_config(&self) -> WaveConfig {
        WaveConfig {
            sampling_rate: self.sample_rate,
            duration_seconds: self.duration,
            fade_seconds: self.fade,
            fade_in_gain: self.fade_in_gain,
            peak: DEFAULT_PEAK,
        }
    }

    pub fn voice_policy(&self) -> VoicePolicy {
        let release = match self.release {
            ReleaseMode::Stop => ReleasePolicy::Stop,
            ReleaseMode::Fadeout => ReleasePolicy::Fadeout(Duration::from_millis(self.release_ms)),
        };
        let toggle = match self.on_toggle {
            ToggleMode::Keep => TogglePolicy::FutureTriggers,
            ToggleMode::StopAll => TogglePolicy::StopAll,
        };
        VoicePolicy {
            release,
            toggle,
            gains: KindGains {
                sine: self.sine_gain,
                square: self.square_gain,
            },
        }
    }
}
