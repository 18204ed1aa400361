use crate::note::NoteId;
use crate::sound::WaveformKind;

/// Errors raised while building buffers or routing note events.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SynthError {
    /// A trigger or release referenced a note that is not registered.
    #[error("no note registered for {0}")]
    InvalidNoteIdentifier(NoteId),

    /// Waveform parameters that cannot produce a valid buffer.
    #[error("invalid waveform config: {0}")]
    InvalidWaveformConfig(String),

    /// The note exists but its buffer for this kind failed to generate.
    #[error("no {kind} buffer for {note}")]
    MissingBuffer { note: NoteId, kind: WaveformKind },
}
