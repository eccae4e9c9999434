pub mod error;
pub mod quantize;
pub mod split;
pub mod sustain;
pub mod vocab;

use crate::codec::error::{CodecError, Recovered};
use crate::codec::quantize::{
    VelocityState, dequantize_velocity, interval_ticks, shift_ticks, ticks_to_seconds,
    time_shift_events,
};
use crate::codec::split::{Merged, SplitKind, SplitNote, merge_notes, split_notes};
use crate::codec::sustain::resolve_sustain;
use crate::codec::vocab::{Event, Token};
use crate::model::performance::{ControlChange, Note, Performance};
use log::debug;

/// Tokens produced by an encode call, plus the pedal events absorbed while resolving sustain.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Encoded {
    pub tokens: Vec<Token>,
    pub absorbed: Vec<Recovered>,
}

/// Encode a note stream and its pedal changes into tokens.
///
/// Control changes other than the sustain pedal are ignored.
pub fn encode(notes: &[Note], pedal: &[ControlChange]) -> Result<Vec<Token>, CodecError> {
    Ok(encode_with_report(notes, pedal)?.tokens)
}

/// Encode, also returning the pedal events that were absorbed.
pub fn encode_with_report(
    notes: &[Note],
    pedal: &[ControlChange],
) -> Result<Encoded, CodecError> {
    if notes.is_empty() {
        return Ok(Encoded::default());
    }

    let mut sustain: Vec<ControlChange> = pedal
        .iter()
        .filter(|cc| cc.is_sustain())
        .copied()
        .collect();
    sustain.sort_by(|a, b| a.time.total_cmp(&b.time));

    let mut ordered = notes.to_vec();
    ordered.sort_by(|a, b| a.start.total_cmp(&b.start));

    let (resolved, absorbed) = resolve_sustain(ordered, &sustain);
    Ok(Encoded {
        tokens: tokenize(&resolved)?,
        absorbed,
    })
}

/// Encode every instrument of a performance into a single token stream.
///
/// Each instrument is resolved against its own sustain pedal before the streams are merged.
pub fn encode_performance(performance: &Performance) -> Result<Vec<Token>, CodecError> {
    Ok(encode_performance_with_report(performance)?.tokens)
}

pub fn encode_performance_with_report(performance: &Performance) -> Result<Encoded, CodecError> {
    let mut notes: Vec<Note> = Vec::with_capacity(performance.note_count());
    let mut absorbed: Vec<Recovered> = Vec::new();

    for instrument in performance.instruments.iter() {
        let mut inst_notes = instrument.notes.clone();
        inst_notes.sort_by(|a, b| a.start.total_cmp(&b.start));

        let (resolved, issues) = resolve_sustain(inst_notes, &instrument.sustain_changes());
        notes.extend(resolved);
        absorbed.extend(issues);
    }

    Ok(Encoded {
        tokens: tokenize(&notes)?,
        absorbed,
    })
}

/// Tokenize notes whose durations are final (no pedal handling).
pub fn tokenize(notes: &[Note]) -> Result<Vec<Token>, CodecError> {
    note_events(notes).iter().map(|e| e.to_token()).collect()
}

/// Typed event stream for a note sequence whose durations are final.
///
/// Each gap is measured against the quantized timeline emitted so far, i.e.
/// `round(t * 100) - emitted_ticks`, not against the raw time of the previous event.
/// Notes at 0.004-0.008s and 0.008-0.5s therefore give a one-tick first note.
pub fn note_events(notes: &[Note]) -> Vec<Event> {
    let split = split_notes(notes);
    let mut events: Vec<Event> = Vec::with_capacity(split.len() * 2);
    let mut timeline: u64 = 0;
    let mut velocity = VelocityState::default();

    for snote in split.iter() {
        let target = interval_ticks(0.0, snote.time);
        events.extend(time_shift_events(target.saturating_sub(timeline)));
        timeline = timeline.max(target);

        match snote.kind {
            SplitKind::NoteOn { velocity: raw } => {
                events.extend(velocity.update(raw));
                events.push(Event::NoteOn(snote.pitch));
            }
            SplitKind::NoteOff => events.push(Event::NoteOff(snote.pitch)),
        }
    }

    debug!(
        "Encoded {} note(s) into {} event(s)",
        notes.len(),
        events.len()
    );
    events
}

/// Replay an event stream, stamping note events with the running time and velocity.
pub fn events_to_split_notes(events: &[Event]) -> Vec<SplitNote> {
    let mut timeline: u64 = 0;
    let mut velocity: u8 = 0;
    let mut split: Vec<SplitNote> = Vec::new();

    for event in events.iter() {
        match *event {
            Event::TimeShift(value) => timeline += shift_ticks(value),
            Event::Velocity(bucket) => velocity = dequantize_velocity(bucket),
            Event::NoteOn(pitch) => {
                split.push(SplitNote::on(ticks_to_seconds(timeline), pitch, velocity))
            }
            Event::NoteOff(pitch) => {
                split.push(SplitNote::off(ticks_to_seconds(timeline), pitch))
            }
        }
    }

    split
}

/// Decode tokens into notes sorted by start.
pub fn decode(tokens: &[Token]) -> Result<Vec<Note>, CodecError> {
    Ok(decode_with_report(tokens)?.notes)
}

/// Decode tokens, also returning the events that were dropped while merging.
pub fn decode_with_report(tokens: &[Token]) -> Result<Merged, CodecError> {
    let events = tokens
        .iter()
        .map(|&t| Event::from_token(t))
        .collect::<Result<Vec<_>, _>>()?;

    let mut merged = merge_notes(&events_to_split_notes(&events));
    merged.notes.sort_by(|a, b| a.start.total_cmp(&b.start));

    if !merged.dropped.is_empty() {
        debug!(
            "Decoded {} note(s), dropped {} event(s)",
            merged.notes.len(),
            merged.dropped.len()
        );
    }

    Ok(merged)
}
