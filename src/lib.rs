//! Keyboard-driven tone player: precomputed sine and square buffers, one
//! exclusive playback channel per note.

pub mod config;
pub mod error;
pub mod note;
pub mod sound;
pub mod source;
pub mod voice;
