use super::WaveformKind;
use std::sync::Arc;
use std::time::Duration;

/// Gain applied to sample `i` of `len`, ramping the first and last `fade`
/// samples. The fade-in climbs from 0 to `fade_in_gain`, the fade-out always
/// falls from 1 to 0. Both ramps include their endpoints.
pub(crate) fn edge_gain(i: usize, len: usize, fade: usize, fade_in_gain: f64) -> f64 {
    if fade == 0 {
        return 1.0;
    }
    let in_fade = i < fade || i >= len - fade;
    if fade == 1 && in_fade {
        // A one-sample ramp is just its silent endpoint.
        return 0.0;
    }
    let span = (fade - 1) as f64;
    if i < fade {
        fade_in_gain * i as f64 / span
    } else if i >= len - fade {
        let j = i - (len - fade);
        1.0 - j as f64 / span
    } else {
        1.0
    }
}

/// Immutable mono PCM for one (note, kind) pair. Clones share the samples.
#[derive(Debug, Clone)]
pub struct WaveformBuffer {
    samples: Arc<[i16]>,
    kind: WaveformKind,
    sample_rate: u32,
}

impl WaveformBuffer {
    pub fn new(samples: Vec<i16>, kind: WaveformKind, sample_rate: u32) -> Self {
        Self {
            samples: samples.into(),
            kind,
            sample_rate,
        }
    }

    pub fn samples(&self) -> &[i16] {
        &self.samples
    }

    pub fn kind(&self) -> WaveformKind {
        self.kind
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }
}
