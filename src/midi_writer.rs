use crate::model::performance::Note;
use anyhow::{Result, anyhow, bail};
use log::{debug, info};
use midly::num::{u4, u7, u15, u24, u28};
use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, TrackEvent, TrackEventKind};
use std::path::Path;

/// Ticks per quarter note in written files.
pub const TICKS_PER_QUARTER: u16 = 480;

/// Written files use a fixed 120 bpm tempo.
pub const OUTPUT_MPQN: u32 = 500_000;

const TICKS_PER_SECOND: f64 = TICKS_PER_QUARTER as f64 * 1_000_000.0 / OUTPUT_MPQN as f64;
const TRACK_NAME: &[u8] = b"Decoded performance";

fn seconds_to_tick(seconds: f64) -> u64 {
    (seconds.max(0.0) * TICKS_PER_SECOND).round() as u64
}

/// Build a single-track SMF for a note list played by one General MIDI program.
pub fn notes_to_smf(notes: &[Note], program: u8) -> Result<Smf<'static>> {
    let channel = u4::new(0);
    let mut smf = Smf::new(Header::new(
        Format::SingleTrack,
        Timing::Metrical(u15::new(TICKS_PER_QUARTER)),
    ));

    // releases sort before onsets on the same tick so re-struck keys are not cut off
    let mut points: Vec<(u64, bool, MidiMessage)> = Vec::with_capacity(notes.len() * 2);
    for note in notes.iter() {
        let key = u7::new(note.pitch.min(127));
        points.push((
            seconds_to_tick(note.start),
            true,
            MidiMessage::NoteOn {
                key,
                vel: u7::new(note.velocity.clamp(1, 127)),
            },
        ));
        points.push((
            seconds_to_tick(note.end),
            false,
            MidiMessage::NoteOff {
                key,
                vel: u7::new(0),
            },
        ));
    }
    points.sort_by_key(|(tick, is_on, _)| (*tick, *is_on));

    let mut track: Vec<TrackEvent<'static>> = Vec::with_capacity(points.len() + 4);
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::TrackName(TRACK_NAME)),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(u24::new(OUTPUT_MPQN))),
    });
    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Midi {
            channel,
            message: MidiMessage::ProgramChange {
                program: u7::new(program.min(127)),
            },
        },
    });

    let mut last_tick: u64 = 0;
    for (tick, _, message) in points.into_iter() {
        let Some(delta) = u32::try_from(tick - last_tick).ok().and_then(u28::try_from) else {
            bail!(
                "Gap of {} ticks before tick {} does not fit in a MIDI delta time..!",
                tick - last_tick,
                tick
            );
        };
        track.push(TrackEvent {
            delta,
            kind: TrackEventKind::Midi { channel, message },
        });
        last_tick = tick;
    }

    track.push(TrackEvent {
        delta: u28::new(0),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    smf.tracks.push(track);
    Ok(smf)
}

pub fn smf_to_bytes(smf: &Smf) -> Result<Vec<u8>> {
    let mut buf: Vec<u8> = Vec::new();
    smf.write_std(&mut buf)
        .map_err(|e| anyhow!("Failed to serialize MIDI: {}", e))?;
    Ok(buf)
}

/// Build a MIDI file from notes, saving it to `path` when one is given.
pub fn write_midi(notes: &[Note], program: u8, path: Option<&Path>) -> Result<Smf<'static>> {
    if program > 127 {
        bail!("Program number {} is outside 0..=127..!", program);
    }

    let smf = notes_to_smf(notes, program)?;
    debug!(
        "Built MIDI track with {} event(s)",
        smf.tracks.first().map(|t| t.len()).unwrap_or(0)
    );

    if let Some(path) = path {
        smf.save(path)
            .map_err(|e| anyhow!("Failed to write MIDI file {}: {}", path.display(), e))?;
        info!("Wrote {} note(s) to '{}'", notes.len(), path.display());
    }

    Ok(smf)
}

#[cfg(test)]
mod test {
    use super::*;

    fn note_messages(smf: &Smf) -> Vec<(u64, MidiMessage)> {
        let mut tick: u64 = 0;
        let mut out = Vec::new();
        for event in smf.tracks[0].iter() {
            tick += event.delta.as_int() as u64;
            if let TrackEventKind::Midi { message, .. } = &event.kind {
                match message {
                    MidiMessage::NoteOn { .. } | MidiMessage::NoteOff { .. } => {
                        out.push((tick, *message))
                    }
                    _ => {}
                }
            }
        }
        out
    }

    #[test]
    fn note_times_become_ticks() {
        let smf = notes_to_smf(&[Note::new(60, 80, 0.5, 1.0)], 0).unwrap();
        let messages = note_messages(&smf);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].0, 480);
        assert_eq!(messages[1].0, 960);
    }

    #[test]
    fn release_precedes_restrike_on_same_tick() {
        let notes = vec![Note::new(60, 80, 0.0, 0.5), Note::new(60, 90, 0.5, 1.0)];
        let messages = note_messages(&notes_to_smf(&notes, 0).unwrap());

        assert!(matches!(messages[1].1, MidiMessage::NoteOff { .. }));
        assert!(matches!(messages[2].1, MidiMessage::NoteOn { .. }));
        assert_eq!(messages[1].0, messages[2].0);
    }

    #[test]
    fn program_change_is_written() {
        let smf = write_midi(&[Note::new(60, 80, 0.0, 1.0)], 42, None).unwrap();
        let program = smf.tracks[0].iter().find_map(|e| match &e.kind {
            TrackEventKind::Midi {
                message: MidiMessage::ProgramChange { program },
                ..
            } => Some(program.as_int()),
            _ => None,
        });

        assert_eq!(program, Some(42));
    }

    #[test]
    fn oversized_gap_is_rejected() {
        let max_delta = (1u64 << 28) as f64 / TICKS_PER_SECOND;
        let notes = vec![
            Note::new(60, 80, 0.0, 1.0),
            Note::new(62, 80, max_delta + 10.0, max_delta + 11.0),
        ];

        assert!(notes_to_smf(&notes, 0).is_err());
        assert!(write_midi(&notes, 0, None).is_err());
    }

    #[test]
    fn invalid_program_is_rejected() {
        assert!(write_midi(&[], 128, None).is_err());
    }

    #[test]
    fn saves_when_path_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.mid");

        write_midi(&[Note::new(60, 80, 0.0, 1.0)], 0, Some(&path)).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(b"MThd"));
    }
}
