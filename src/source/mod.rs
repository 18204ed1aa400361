use crate::sound::WaveformBuffer;
use crate::voice::{AudioSink, ChannelId};
use log::warn;
use std::sync::Arc;
use std::time::Duration;

const FADE_STEP: Duration = Duration::from_millis(10);

/// Plays a shared buffer once from its first sample.
pub struct Source {
    buffer: WaveformBuffer,
    cursor: usize,
}

impl Source {
    pub fn new(buffer: &WaveformBuffer) -> Self {
        Self {
            buffer: buffer.clone(),
            cursor: 0,
        }
    }

    fn remaining(&self) -> usize {
        self.buffer.sample_count() - self.cursor
    }
}

impl Iterator for Source {
    type Item = i16;

    fn next(&mut self) -> Option<Self::Item> {
        let val = *self.buffer.samples().get(self.cursor)?;
        self.cursor += 1;
        Some(val)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining(), Some(self.remaining()))
    }
}

impl rodio::Source for Source {
    fn sample_rate(&self) -> u32 {
        self.buffer.sample_rate()
    }
    fn channels(&self) -> u16 {
        1
    }
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.remaining())
    }
    fn total_duration(&self) -> Option<Duration> {
        Some(self.buffer.duration())
    }
}

struct Channel {
    sink: Option<Arc<rodio::Sink>>,
    volume: f32,
}

/// One `rodio::Sink` per channel. Starting a channel replaces its sink so
/// two buffers never overlap on it.
pub struct RodioSink {
    handle: rodio::OutputStreamHandle,
    channels: Vec<Channel>,
}

impl RodioSink {
    pub fn new(handle: rodio::OutputStreamHandle, channels: usize) -> Self {
        Self {
            handle,
            channels: (0..channels)
                .map(|_| Channel {
                    sink: None,
                    volume: 1.0,
                })
                .collect(),
        }
    }

    fn channel(&mut self, channel: ChannelId) -> Option<&mut Channel> {
        let found = self.channels.get_mut(channel);
        if found.is_none() {
            warn!("Audio channel {} does not exist", channel);
        }
        found
    }
}

impl AudioSink for RodioSink {
    fn play(&mut self, channel: ChannelId, buffer: &WaveformBuffer) {
        let handle = self.handle.clone();
        let slot = match self.channel(channel) {
            Some(slot) => slot,
            None => return,
        };
        if let Some(old) = slot.sink.take() {
            old.stop();
        }
        let sink = match rodio::Sink::try_new(&handle) {
            Ok(sink) => sink,
            Err(e) => {
                warn!("Cannot open audio channel {}: {}", channel, e);
                return;
            }
        };
        sink.set_volume(slot.volume);
        sink.append(Source::new(buffer));
        slot.sink = Some(Arc::new(sink));
    }

    fn stop(&mut self, channel: ChannelId) {
        if let Some(sink) = self.channel(channel).and_then(|slot| slot.sink.take()) {
            sink.stop();
        }
    }

    fn fadeout(&mut self, channel: ChannelId, duration: Duration) {
        // The sink stays in its slot so a new trigger can still cut the fade.
        let sink = match self.channel(channel).and_then(|slot| slot.sink.clone()) {
            Some(sink) => sink,
            None => return,
        };
        let steps = (duration.as_millis() / FADE_STEP.as_millis()).max(1) as u32;
        let start = sink.volume();
        tokio::spawn(async move {
            for step in 1..=steps {
                tokio::time::sleep(FADE_STEP).await;
                sink.set_volume(start * (1.0 - step as f32 / steps as f32));
            }
            sink.stop();
        });
    }

    fn set_volume(&mut self, channel: ChannelId, gain: f32) {
        if let Some(slot) = self.channel(channel) {
            slot.volume = gain;
            if let Some(sink) = &slot.sink {
                sink.set_volume(gain);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sound::WaveformKind;
    use rodio::Source as _;

    #[test]
    fn source_plays_buffer_once() {
        let buffer = WaveformBuffer::new(vec![0, 5, -5, 0], WaveformKind::Sine, 4);
        let mut source = Source::new(&buffer);
        assert_eq!(source.channels(), 1);
        assert_eq!(source.sample_rate(), 4);
        assert_eq!(source.total_duration(), Some(Duration::from_secs(1)));
        source.next();
        assert_eq!(source.current_frame_len(), Some(3));
        let rest: Vec<i16> = source.collect();
        assert_eq!(rest, vec![5, -5, 0]);
    }

    #[test]
    fn sources_share_buffer_storage() {
        let buffer = WaveformBuffer::new(vec![1, 2, 3], WaveformKind::Square, 8000);
        let a = Source::new(&buffer);
        let b = Source::new(&buffer);
        assert_eq!(a.buffer.samples().as_ptr(), b.buffer.samples().as_ptr());
    }
}
