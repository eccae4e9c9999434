use crate::codec::error::Recovered;
use crate::model::performance::Note;
use log::debug;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitKind {
    NoteOn { velocity: u8 },
    NoteOff,
}

/// One half of a note: its onset or its release.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SplitNote {
    pub kind: SplitKind,
    pub time: f64,
    pub pitch: u8,
}

impl SplitNote {
    pub fn on(time: f64, pitch: u8, velocity: u8) -> Self {
        Self {
            kind: SplitKind::NoteOn { velocity },
            time,
            pitch,
        }
    }

    pub fn off(time: f64, pitch: u8) -> Self {
        Self {
            kind: SplitKind::NoteOff,
            time,
            pitch,
        }
    }
}

/// Split notes into onset/release pairs, ordered by time.
///
/// The sort is stable, so events on the same instant keep the order of their source notes.
pub fn split_notes(notes: &[Note]) -> Vec<SplitNote> {
    let mut ordered: Vec<&Note> = notes.iter().collect();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let mut split: Vec<SplitNote> = Vec::with_capacity(notes.len() * 2);
    for note in ordered.into_iter() {
        split.push(SplitNote::on(note.start, note.pitch, note.velocity));
        split.push(SplitNote::off(note.end, note.pitch));
    }

    split.sort_by(|a, b| a.time.total_cmp(&b.time));
    split
}

/// Notes rebuilt from split events, plus what had to be dropped on the way.
#[derive(Debug, Clone, Default)]
pub struct Merged {
    pub notes: Vec<Note>,
    pub dropped: Vec<Recovered>,
}

/// Pair onsets with releases.
///
/// A second onset on a pitch that is already sounding replaces the pending one.
pub fn merge_notes(split: &[SplitNote]) -> Merged {
    let mut pending: HashMap<u8, (f64, u8)> = HashMap::new();
    let mut merged = Merged::default();

    for snote in split.iter() {
        match snote.kind {
            SplitKind::NoteOn { velocity } => {
                pending.insert(snote.pitch, (snote.time, velocity));
            }
            SplitKind::NoteOff => {
                let Some((start, velocity)) = pending.remove(&snote.pitch) else {
                    debug!(
                        "Orphaned note-off for pitch {} at {:.3}s, dropping..!",
                        snote.pitch, snote.time
                    );
                    merged.dropped.push(Recovered::OrphanedNoteOff {
                        pitch: snote.pitch,
                        time: snote.time,
                    });
                    continue;
                };

                if snote.time <= start {
                    debug!(
                        "Skipping zero-length note {} at {:.3}s..!",
                        snote.pitch, start
                    );
                    merged.dropped.push(Recovered::DegenerateNote {
                        pitch: snote.pitch,
                        time: start,
                    });
                    continue;
                }

                merged
                    .notes
                    .push(Note::new(snote.pitch, velocity, start, snote.time));
            }
        }
    }

    merged
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn split_orders_by_time() {
        let notes = vec![Note::new(62, 70, 0.5, 2.0), Note::new(60, 80, 0.0, 1.0)];
        let split = split_notes(&notes);

        assert_eq!(
            split,
            vec![
                SplitNote::on(0.0, 60, 80),
                SplitNote::on(0.5, 62, 70),
                SplitNote::off(1.0, 60),
                SplitNote::off(2.0, 62),
            ]
        );
    }

    #[test]
    fn split_ties_keep_source_order() {
        let notes = vec![Note::new(60, 80, 0.0, 0.5), Note::new(60, 90, 0.5, 1.0)];
        let split = split_notes(&notes);

        assert_eq!(split[1], SplitNote::off(0.5, 60));
        assert_eq!(split[2], SplitNote::on(0.5, 60, 90));

        let merged = merge_notes(&split);
        assert_eq!(merged.notes, notes);
        assert!(merged.dropped.is_empty());
    }

    #[test]
    fn merge_rebuilds_notes() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![
            Note::new(60, 80, 0.0, 1.0),
            Note::new(64, 60, 0.25, 0.75),
            Note::new(67, 40, 0.5, 1.5),
        ];
        let mut merged = merge_notes(&split_notes(&notes)).notes;
        merged.sort_by(|a, b| a.start.total_cmp(&b.start));

        assert_eq!(merged, notes);
    }

    #[test]
    fn orphaned_note_off_is_dropped() {
        env_logger::try_init().unwrap_or(());

        let split = vec![
            SplitNote::off(0.1, 61),
            SplitNote::on(0.2, 60, 80),
            SplitNote::off(0.4, 60),
        ];
        let merged = merge_notes(&split);

        assert_eq!(merged.notes, vec![Note::new(60, 80, 0.2, 0.4)]);
        assert_eq!(
            merged.dropped,
            vec![Recovered::OrphanedNoteOff {
                pitch: 61,
                time: 0.1
            }]
        );
    }

    #[test]
    fn zero_length_note_is_dropped() {
        env_logger::try_init().unwrap_or(());

        let split = vec![SplitNote::on(0.3, 60, 80), SplitNote::off(0.3, 60)];
        let merged = merge_notes(&split);

        assert!(merged.notes.is_empty());
        assert!(matches!(
            merged.dropped[0],
            Recovered::DegenerateNote { pitch: 60, .. }
        ));
    }

    #[test]
    fn restrike_replaces_pending_onset() {
        env_logger::try_init().unwrap_or(());

        let split = vec![
            SplitNote::on(0.0, 60, 80),
            SplitNote::on(0.5, 60, 100),
            SplitNote::off(1.0, 60),
            SplitNote::off(1.5, 60),
        ];
        let merged = merge_notes(&split);

        assert_eq!(merged.notes, vec![Note::new(60, 100, 0.5, 1.0)]);
        assert_eq!(merged.dropped.len(), 1);
    }
}
