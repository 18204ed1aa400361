use super::{generate, WaveConfig, WaveformBuffer, WaveformKind};
use crate::error::SynthError;
use crate::note::{Note, NoteId};

/// A buffer that could not be generated, kept so the caller can report it.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildFailure {
    pub note: NoteId,
    pub kind: WaveformKind,
    pub error: SynthError,
}

/// Precomputed buffers, one row per note in registration order and one
/// column per `WaveformKind`.
#[derive(Debug, Clone, Default)]
pub struct BufferTable {
    rows: Vec<[Option<WaveformBuffer>; 2]>,
}

impl BufferTable {
    /// Generates every (note, kind) buffer. A failing pair leaves an empty
    /// slot and does not stop the others.
    pub fn build(notes: &[Note], config: &WaveConfig) -> (Self, Vec<BuildFailure>) {
        let mut failures = vec![];
        let rows = notes
            .iter()
            .map(|note| {
                let mut row = [None, None];
                for &kind in &WaveformKind::ALL {
                    match generate(note.frequency_hz, kind, config) {
                        Ok(buffer) => row[kind.index()] = Some(buffer),
                        Err(error) => failures.push(BuildFailure {
                            note: note.id,
                            kind,
                            error,
                        }),
                    }
                }
                row
            })
            .collect();
        (Self { rows }, failures)
    }

    pub fn get(&self, row: usize, kind: WaveformKind) -> Option<&WaveformBuffer> {
        self.rows.get(row)?[kind.index()].as_ref()
    }

    pub fn rows(&self) -> usize {
        self.rows.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> WaveConfig {
        WaveConfig {
            sampling_rate: 8000,
            duration_seconds: 0.1,
            ..WaveConfig::default()
        }
    }

    #[test]
    fn fills_every_slot() {
        let notes = vec![
            Note::new(NoteId(1), "C5", 523.25),
            Note::new(NoteId(2), "D5", 587.33),
        ];
        let (table, failures) = BufferTable::build(&notes, &config());
        assert!(failures.is_empty());
        assert_eq!(table.rows(), 2);
        for row in 0..2 {
            for &kind in &WaveformKind::ALL {
                assert_eq!(table.get(row, kind).map(|b| b.kind()), Some(kind));
            }
        }
        assert!(table.get(2, WaveformKind::Sine).is_none());
    }

    #[test]
    fn one_bad_note_does_not_block_the_rest() {
        let notes = vec![
            Note::new(NoteId(1), "C5", 523.25),
            Note::new(NoteId(2), "??", -1.0),
            Note::new(NoteId(3), "E5", 659.25),
        ];
        let (table, failures) = BufferTable::build(&notes, &config());
        assert_eq!(failures.len(), 2);
        assert!(failures.iter().all(|f| f.note == NoteId(2)));
        assert!(table.get(1, WaveformKind::Sine).is_none());
        assert!(table.get(0, WaveformKind::Square).is_some());
        assert!(table.get(2, WaveformKind::Sine).is_some());
    }
}
