use anyhow::Context;
use clap::Parser;
use log::{debug, error, info, warn};
use std::collections::HashSet;
use tokio::sync::mpsc;

use sound_keys::config::Args;
use sound_keys::note::{self, Note, NoteId, TOGGLE_KEY};
use sound_keys::sound::table::BufferTable;
use sound_keys::source::RodioSink;
use sound_keys::voice::{AudioSink, Event, FadeTicket, Keyboard, Release};

const EMPTY_EVENT: input_linux::sys::input_event = input_linux::sys::input_event {
    time: input_linux::sys::timeval {
        tv_sec: 0,
        tv_usec: 0,
    },
    type_: 0,
    code: 0,
    value: 0,
};

#[derive(Debug, Clone, Copy, PartialEq)]
enum KeyState {
    Up,
    Down,
    Repeat,
    Unknown,
}

impl KeyState {
    fn from_i32(value: i32) -> Self {
        match value {
            0 => Self::Up,
            1 => Self::Down,
            2 => Self::Repeat,
            _ => Self::Unknown,
        }
    }
}

const EV_KEY: u16 = input_linux::sys::EV_KEY as u16;

/// Maps a raw key transition to a keyboard event. Auto-repeat is dropped so
/// holding a key does not restart its note.
fn key_to_event(notes: &HashSet<NoteId>, code: u16, state: KeyState) -> Option<Event> {
    match state {
        KeyState::Down if code == TOGGLE_KEY => Some(Event::ToggleWaveform),
        KeyState::Down if notes.contains(&NoteId(code)) => Some(Event::Trigger(NoteId(code))),
        KeyState::Up if notes.contains(&NoteId(code)) => Some(Event::Release(NoteId(code))),
        _ => None,
    }
}

fn watch_device(device_path: &str, notes: HashSet<NoteId>, output: mpsc::Sender<Event>) {
    let device_path = device_path.to_string();
    std::thread::spawn(move || {
        info!("Opening device {}", device_path);
        let fd = match std::fs::File::open(&device_path) {
            Ok(fd) => fd,
            Err(e) => {
                warn!("Cannot open {}: {}", device_path, e);
                return;
            }
        };
        let input = input_linux::evdev::EvdevHandle::new(fd);
        loop {
            let mut events: [input_linux::sys::input_event; 1] = [EMPTY_EVENT; 1];
            let n = match input.read(&mut events) {
                Ok(n) => n,
                Err(e) => {
                    warn!("{}: {}", device_path, e);
                    return;
                }
            };
            for ev in events.iter().take(n) {
                if ev.type_ != EV_KEY {
                    continue;
                }
                let state = KeyState::from_i32(ev.value);
                if let Some(event) = key_to_event(&notes, ev.code, state) {
                    if output.blocking_send(event).is_err() {
                        // Event loop is gone.
                        return;
                    }
                }
            }
        }
    });
}

/// Owns the keyboard and the timers that complete its fades.
struct EventLoop<S> {
    keyboard: Keyboard<S>,
    fade_tx: mpsc::Sender<FadeTicket>,
    fade_rx: mpsc::Receiver<FadeTicket>,
}

impl<S: AudioSink> EventLoop<S> {
    fn new(keyboard: Keyboard<S>) -> Self {
        let (fade_tx, fade_rx) = mpsc::channel(64);
        Self {
            keyboard,
            fade_tx,
            fade_rx,
        }
    }

    /// Applies the next input or fade completion, whichever comes first.
    /// Returns `None` once every input sender is gone.
    async fn step(&mut self, input: &mut mpsc::Receiver<Event>) -> Option<Event> {
        let event = tokio::select! {
            Some(ticket) = self.fade_rx.recv() => Event::FadeElapsed(ticket),
            received = input.recv() => match received {
                Some(event) => event,
                None => return None,
            },
        };
        debug!("Received event {:?}", event);
        let keyboard = &mut self.keyboard;
        match keyboard.handle(event) {
            Ok(Release::Fading(ticket)) => {
                let fade_tx = self.fade_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(ticket.after).await;
                    drop(fade_tx.send(ticket).await);
                });
            }
            Ok(_) => {}
            Err(e) => warn!("Ignored {:?}: {}", event, e),
        }
        match event {
            Event::ToggleWaveform => info!("Waveform: {}", keyboard.current_waveform_kind()),
            Event::Trigger(note) if keyboard.is_sounding(note) => {
                let label = keyboard.label_of(note).unwrap_or("?");
                let freq = keyboard.frequency_of(note).unwrap_or_default();
                info!("{} {:.2} Hz", label, freq);
            }
            _ => {}
        }
        Some(event)
    }
}

async fn handle_events<S: AudioSink>(
    event_loop: &mut EventLoop<S>,
    mut input: mpsc::Receiver<Event>,
) {
    while event_loop.step(&mut input).await.is_some() {}
}

fn build_keyboard(
    notes: Vec<Note>,
    args: &Args,
    handle: rodio::OutputStreamHandle,
) -> anyhow::Result<Keyboard<RodioSink>> {
    let wave = args.wave_config();
    wave.validate().context("Bad waveform settings")?;
    let (buffers, failures) = BufferTable::build(&notes, &wave);
    for failure in &failures {
        warn!(
            "No {} buffer for {}: {}",
            failure.kind, failure.note, failure.error
        );
    }
    info!(
        "Generated {} buffers of {} samples",
        notes.len() * 2 - failures.len(),
        wave.sample_count()
    );
    let sink = RodioSink::new(handle, notes.len());
    Ok(Keyboard::new(notes, buffers, args.voice_policy(), sink))
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    // Catch thread panics
    let orig_handler = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |i| {
        orig_handler(i);
        std::process::exit(-1)
    }));

    let (_stream, handle) =
        rodio::OutputStream::try_default().context("No audio output device")?;
    let notes = note::default_notes();
    let ids: HashSet<NoteId> = notes.iter().map(|n| n.id).collect();
    let mut event_loop = EventLoop::new(build_keyboard(notes, &args, handle)?);

    // Watch devices events. Only the reader threads hold senders, so the
    // channel closes once all of them are gone.
    let (event_tx, event_rx) = mpsc::channel(args.devices.len() * 50);
    for path in &args.devices {
        watch_device(path, ids.clone(), event_tx.clone());
    }
    drop(event_tx);
    info!(
        "Waveform: {} (space toggles)",
        event_loop.keyboard.current_waveform_kind()
    );

    // Process events
    handle_events(&mut event_loop, event_rx).await;
    error!("No input device left to read");
    anyhow::bail!("all input devices closed")
}

#[cfg(test)]
mod tests {
    use super::*;
    use sound_keys::sound::{WaveConfig, WaveformBuffer};
    use sound_keys::voice::{ChannelId, KindGains, ReleasePolicy, TogglePolicy, VoicePolicy};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    const FADE: Duration = Duration::from_millis(300);

    type Calls = Arc<Mutex<Vec<(&'static str, ChannelId)>>>;

    struct RecordingSink(Calls);

    impl RecordingSink {
        fn push(&self, call: &'static str, channel: ChannelId) {
            self.0.lock().unwrap().push((call, channel));
        }
    }

    impl AudioSink for RecordingSink {
        fn play(&mut self, channel: ChannelId, _buffer: &WaveformBuffer) {
            self.push("play", channel);
        }
        fn stop(&mut self, channel: ChannelId) {
            self.push("stop", channel);
        }
        fn fadeout(&mut self, channel: ChannelId, duration: Duration) {
            assert_eq!(duration, FADE);
            self.push("fadeout", channel);
        }
        fn set_volume(&mut self, channel: ChannelId, _gain: f32) {
            self.push("volume", channel);
        }
    }

    fn event_loop() -> (EventLoop<RecordingSink>, Calls) {
        let notes = note::default_notes();
        let config = WaveConfig {
            sampling_rate: 4000,
            duration_seconds: 0.05,
            ..WaveConfig::default()
        };
        let (table, failures) = BufferTable::build(&notes, &config);
        assert!(failures.is_empty());
        let policy = VoicePolicy {
            release: ReleasePolicy::Fadeout(FADE),
            toggle: TogglePolicy::FutureTriggers,
            gains: KindGains::default(),
        };
        let calls = Calls::default();
        let sink = RecordingSink(Arc::clone(&calls));
        let keyboard = Keyboard::new(notes, table, policy, sink);
        (EventLoop::new(keyboard), calls)
    }

    fn c5() -> NoteId {
        NoteId(input_linux::sys::KEY_A as u16)
    }

    /// Triggers and releases C5, leaving its fade running.
    async fn press_and_release(
        event_loop: &mut EventLoop<RecordingSink>,
        tx: &mpsc::Sender<Event>,
        rx: &mut mpsc::Receiver<Event>,
    ) {
        tx.send(Event::Trigger(c5())).await.unwrap();
        tx.send(Event::Release(c5())).await.unwrap();
        assert_eq!(event_loop.step(rx).await, Some(Event::Trigger(c5())));
        assert_eq!(event_loop.step(rx).await, Some(Event::Release(c5())));
    }

    #[tokio::test(start_paused = true)]
    async fn fade_silences_note_after_release_window() {
        let (mut event_loop, calls) = event_loop();
        let (tx, mut rx) = mpsc::channel(8);
        let released_at = tokio::time::Instant::now();
        press_and_release(&mut event_loop, &tx, &mut rx).await;

        assert!(event_loop.keyboard.is_sounding(c5()));
        assert!(!event_loop.keyboard.is_held(c5()));
        assert_eq!(calls.lock().unwrap().last(), Some(&("fadeout", 0)));

        let window = FADE - Duration::from_millis(1);
        let early = tokio::time::timeout(window, event_loop.step(&mut rx)).await;
        assert!(early.is_err(), "fade finished early: {:?}", early);
        assert!(event_loop.keyboard.is_sounding(c5()));

        match event_loop.step(&mut rx).await {
            Some(Event::FadeElapsed(ticket)) => assert_eq!(ticket.note, c5()),
            other => panic!("expected a fade completion, got {:?}", other),
        }
        assert!(released_at.elapsed() >= FADE);
        assert!(!event_loop.keyboard.is_sounding(c5()));
    }

    #[tokio::test(start_paused = true)]
    async fn retrigger_during_fade_outlives_the_window() {
        let (mut event_loop, calls) = event_loop();
        let (tx, mut rx) = mpsc::channel(8);
        press_and_release(&mut event_loop, &tx, &mut rx).await;

        tokio::time::sleep(Duration::from_millis(100)).await;
        tx.send(Event::Trigger(c5())).await.unwrap();
        assert_eq!(event_loop.step(&mut rx).await, Some(Event::Trigger(c5())));
        assert_eq!(calls.lock().unwrap().last(), Some(&("play", 0)));

        // The old completion still fires and must be discarded.
        match event_loop.step(&mut rx).await {
            Some(Event::FadeElapsed(_)) => {}
            other => panic!("expected a fade completion, got {:?}", other),
        }
        assert!(event_loop.keyboard.is_sounding(c5()));
        assert!(event_loop.keyboard.is_held(c5()));
    }

    #[tokio::test]
    async fn loop_ends_when_every_input_is_gone() {
        let (mut event_loop, _calls) = event_loop();
        let (tx, rx) = mpsc::channel(1);
        drop(tx);
        handle_events(&mut event_loop, rx).await;
    }

    fn ids() -> HashSet<NoteId> {
        note::default_notes().iter().map(|n| n.id).collect()
    }

    #[test]
    fn key_states_decode() {
        assert_eq!(KeyState::from_i32(0), KeyState::Up);
        assert_eq!(KeyState::from_i32(1), KeyState::Down);
        assert_eq!(KeyState::from_i32(2), KeyState::Repeat);
        assert_eq!(KeyState::from_i32(7), KeyState::Unknown);
    }

    #[test]
    fn note_keys_map_to_trigger_and_release() {
        let ids = ids();
        let a = input_linux::sys::KEY_A as u16;
        assert_eq!(
            key_to_event(&ids, a, KeyState::Down),
            Some(Event::Trigger(NoteId(a)))
        );
        assert_eq!(
            key_to_event(&ids, a, KeyState::Up),
            Some(Event::Release(NoteId(a)))
        );
        assert_eq!(key_to_event(&ids, a, KeyState::Repeat), None);
    }

    #[test]
    fn space_toggles_on_press_only() {
        let ids = ids();
        assert_eq!(
            key_to_event(&ids, TOGGLE_KEY, KeyState::Down),
            Some(Event::ToggleWaveform)
        );
        assert_eq!(key_to_event(&ids, TOGGLE_KEY, KeyState::Up), None);
    }

    #[test]
    fn unmapped_keys_are_dropped() {
        let ids = ids();
        let q = input_linux::sys::KEY_Q as u16;
        assert_eq!(key_to_event(&ids, q, KeyState::Down), None);
    }
}
