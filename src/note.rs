use std::fmt;

/// Opaque token identifying a note. The binary uses evdev key codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId(pub u16);

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "note #{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Note {
    pub id: NoteId,
    pub label: &'static str,
    pub frequency_hz: f64,
}

impl Note {
    pub const fn new(id: NoteId, label: &'static str, frequency_hz: f64) -> Self {
        Self {
            id,
            label,
            frequency_hz,
        }
    }
}

const KEY_A: u16 = input_linux::sys::KEY_A as u16;
const KEY_S: u16 = input_linux::sys::KEY_S as u16;
const KEY_D: u16 = input_linux::sys::KEY_D as u16;
const KEY_F: u16 = input_linux::sys::KEY_F as u16;
const KEY_G: u16 = input_linux::sys::KEY_G as u16;
const KEY_H: u16 = input_linux::sys::KEY_H as u16;
const KEY_J: u16 = input_linux::sys::KEY_J as u16;

/// Key that flips between sine and square.
pub const TOGGLE_KEY: u16 = input_linux::sys::KEY_SPACE as u16;

/// One octave of white keys from C5, on the home row.
pub fn default_notes() -> Vec<Note> {
    vec![
        Note::new(NoteId(KEY_A), "C5", 523.25),
        Note::new(NoteId(KEY_S), "D5", 587.33),
        Note::new(NoteId(KEY_D), "E5", 659.25),
        Note::new(NoteId(KEY_F), "F5", 698.46),
        Note::new(NoteId(KEY_G), "G5", 783.99),
        Note::new(NoteId(KEY_H), "A5", 880.00),
        Note::new(NoteId(KEY_J), "B5", 987.77),
    ]
}
