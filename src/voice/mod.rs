use crate::error::SynthError;
use crate::note::{Note, NoteId};
use crate::sound::table::BufferTable;
use crate::sound::{WaveformBuffer, WaveformKind};
use log::debug;
use std::collections::HashMap;
use std::time::Duration;

/// Exclusive playback slot, one per note.
pub type ChannelId = usize;

/// Output the keyboard drives. Calls are fire-and-forget.
pub trait AudioSink {
    /// Starts `buffer` from its first sample on `channel`.
    fn play(&mut self, channel: ChannelId, buffer: &WaveformBuffer);
    fn stop(&mut self, channel: ChannelId);
    /// Ramps the channel to silence over `duration`, then stops it.
    fn fadeout(&mut self, channel: ChannelId, duration: Duration);
    fn set_volume(&mut self, channel: ChannelId, gain: f32);
}

/// What a key release does to a sounding note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ReleasePolicy {
    Stop,
    Fadeout(Duration),
}

/// What a waveform toggle does to notes already sounding.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TogglePolicy {
    /// Only later triggers use the new kind.
    FutureTriggers,
    StopAll,
}

/// Output gain per waveform kind, applied when a note starts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindGains {
    pub sine: f32,
    pub square: f32,
}

impl KindGains {
    pub fn for_kind(&self, kind: WaveformKind) -> f32 {
        match kind {
            WaveformKind::Sine => self.sine,
            WaveformKind::Square => self.square,
        }
    }
}

impl Default for KindGains {
    fn default() -> Self {
        Self {
            sine: 0.1,
            square: 0.04,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoicePolicy {
    pub release: ReleasePolicy,
    pub toggle: TogglePolicy,
    pub gains: KindGains,
}

impl Default for VoicePolicy {
    fn default() -> Self {
        Self {
            release: ReleasePolicy::Fadeout(Duration::from_millis(300)),
            toggle: TogglePolicy::StopAll,
            gains: KindGains::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoicePhase {
    Silent,
    Sounding,
    Releasing,
}

#[derive(Debug, Clone)]
pub struct VoiceState {
    pub phase: VoicePhase,
    /// Kind of the buffer bound at the last trigger.
    pub bound: Option<WaveformKind>,
    /// Key is down, drives the highlight.
    pub held: bool,
    pub generation: u64,
}

impl VoiceState {
    fn silent() -> Self {
        Self {
            phase: VoicePhase::Silent,
            bound: None,
            held: false,
            generation: 0,
        }
    }

    pub fn is_sounding(&self) -> bool {
        self.phase != VoicePhase::Silent
    }
}

/// Identifies one fade so a later trigger can outdate it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FadeTicket {
    pub note: NoteId,
    pub generation: u64,
    pub after: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Release {
    /// Nothing was sounding, or it was already fading.
    Ignored,
    Stopped,
    /// Deliver the ticket back through `fade_elapsed` once it runs out.
    Fading(FadeTicket),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Event {
    Trigger(NoteId),
    Release(NoteId),
    ToggleWaveform,
    FadeElapsed(FadeTicket),
}

/// Per-note playback state over an exclusive channel per note.
pub struct Keyboard<S> {
    notes: Vec<Note>,
    index: HashMap<NoteId, usize>,
    voices: Vec<VoiceState>,
    buffers: BufferTable,
    active_kind: WaveformKind,
    policy: VoicePolicy,
    sink: S,
}

impl<S: AudioSink> Keyboard<S> {
    pub fn new(notes: Vec<Note>, buffers: BufferTable, policy: VoicePolicy, sink: S) -> Self {
        let index = notes.iter().enumerate().map(|(i, n)| (n.id, i)).collect();
        let voices = notes.iter().map(|_| VoiceState::silent()).collect();
        Self {
            notes,
            index,
            voices,
            buffers,
            active_kind: WaveformKind::default(),
            policy,
            sink,
        }
    }

    fn channel(&self, note: NoteId) -> Result<ChannelId, SynthError> {
        self.index
            .get(&note)
            .copied()
            .ok_or(SynthError::InvalidNoteIdentifier(note))
    }

    /// Starts `note` from sample 0 with a `kind` buffer, superseding whatever
    /// its channel was playing.
    pub fn trigger(&mut self, note: NoteId, kind: WaveformKind) -> Result<(), SynthError> {
        let channel = self.channel(note)?;
        let buffer = self
            .buffers
            .get(channel, kind)
            .ok_or(SynthError::MissingBuffer { note, kind })?;

        self.sink.stop(channel);
        self.sink.set_volume(channel, self.policy.gains.for_kind(kind));
        self.sink.play(channel, buffer);

        let voice = &mut self.voices[channel];
        voice.phase = VoicePhase::Sounding;
        voice.bound = Some(kind);
        voice.held = true;
        voice.generation += 1;
        debug!("{} on ({})", self.notes[channel].label, kind);
        Ok(())
    }

    pub fn release(&mut self, note: NoteId) -> Result<Release, SynthError> {
        let channel = self.channel(note)?;
        let voice = &mut self.voices[channel];
        voice.held = false;
        if voice.phase != VoicePhase::Sounding {
            return Ok(Release::Ignored);
        }

        debug!("{} off", self.notes[channel].label);
        match self.policy.release {
            ReleasePolicy::Stop => {
                self.sink.stop(channel);
                voice.phase = VoicePhase::Silent;
                Ok(Release::Stopped)
            }
            ReleasePolicy::Fadeout(after) => {
                self.sink.fadeout(channel, after);
                voice.phase = VoicePhase::Releasing;
                Ok(Release::Fading(FadeTicket {
                    note,
                    generation: voice.generation,
                    after,
                }))
            }
        }
    }

    /// Completes a fade unless the note was triggered again meanwhile.
    /// Returns whether the voice went silent.
    pub fn fade_elapsed(&mut self, ticket: FadeTicket) -> bool {
        let channel = match self.index.get(&ticket.note) {
            Some(&channel) => channel,
            None => return false,
        };
        let voice = &mut self.voices[channel];
        if voice.phase != VoicePhase::Releasing || voice.generation != ticket.generation {
            return false;
        }
        voice.phase = VoicePhase::Silent;
        true
    }

    pub fn toggle_waveform(&mut self) -> WaveformKind {
        self.active_kind = self.active_kind.toggled();
        if let TogglePolicy::StopAll = self.policy.toggle {
            for (channel, voice) in self.voices.iter_mut().enumerate() {
                if voice.is_sounding() {
                    self.sink.stop(channel);
                    voice.phase = VoicePhase::Silent;
                }
            }
        }
        self.active_kind
    }

    /// Applies one event, triggering with the current waveform kind.
    pub fn handle(&mut self, event: Event) -> Result<Release, SynthError> {
        match event {
            Event::Trigger(note) => {
                let kind = self.active_kind;
                self.trigger(note, kind)?;
            }
            Event::Release(note) => return self.release(note),
            Event::ToggleWaveform => {
                self.toggle_waveform();
            }
            Event::FadeElapsed(ticket) => {
                self.fade_elapsed(ticket);
            }
        }
        Ok(Release::Ignored)
    }

    pub fn current_waveform_kind(&self) -> WaveformKind {
        self.active_kind
    }

    fn voice(&self, note: NoteId) -> Option<&VoiceState> {
        self.index.get(&note).map(|&i| &self.voices[i])
    }

    pub fn is_sounding(&self, note: NoteId) -> bool {
        self.voice(note).map_or(false, VoiceState::is_sounding)
    }

    pub fn is_held(&self, note: NoteId) -> bool {
        self.voice(note).map_or(false, |v| v.held)
    }

    pub fn bound_kind(&self, note: NoteId) -> Option<WaveformKind> {
        self.voice(note).and_then(|v| v.bound)
    }

    pub fn frequency_of(&self, note: NoteId) -> Option<f64> {
        self.index.get(&note).map(|&i| self.notes[i].frequency_hz)
    }

    pub fn label_of(&self, note: NoteId) -> Option<&'static str> {
        self.index.get(&note).map(|&i| self.notes[i].label)
    }
}
