use crate::codec::error::Recovered;
use crate::model::performance::{ControlChange, Note};
use log::debug;
use std::collections::HashMap;

/// An interval during which the sustain pedal is held, plus the notes it keeps ringing.
#[derive(Debug, Clone, PartialEq)]
pub struct SustainSpan {
    pub start: f64,
    pub end: f64,
    pub managed_notes: Vec<Note>,
}

impl SustainSpan {
    pub fn new(start: f64, end: f64) -> Self {
        Self {
            start,
            end,
            managed_notes: Vec::new(),
        }
    }

    /// Whether a note is sounding at some point while the pedal is down.
    fn holds(&self, note: &Note) -> bool {
        note.start <= self.end && (note.start >= self.start || note.end > self.start)
    }

    /// Consume the span and return its notes with pedal-adjusted end times.
    pub fn release(self) -> Vec<Note> {
        let mut notes = self.managed_notes;
        let mut next_onsets: HashMap<u8, f64> = HashMap::new();

        for note in notes.iter_mut().rev() {
            sustain_note(note, self.end, &mut next_onsets);
        }

        notes
    }
}

/// One step of the reverse scan over a span's notes.
///
/// A held note rings until the same pitch is struck again; if it never is, it rings until the
/// pedal lifts, unless its own release already comes later than that.
/// `next_onsets` maps each pitch to the onset of the next strike seen so far in the scan.
pub fn sustain_note(note: &mut Note, span_end: f64, next_onsets: &mut HashMap<u8, f64>) {
    note.end = match next_onsets.get(&note.pitch) {
        Some(&next_start) => next_start,
        None => span_end.max(note.end),
    };
    next_onsets.insert(note.pitch, note.start);
}

/// Build pedal spans from time-ordered sustain control changes.
///
/// Returns the spans and the pedal events that were absorbed along the way. A pedal
/// still down at the end of the stream is closed at `close_at`.
pub fn collect_spans(
    pedal: &[ControlChange],
    close_at: f64,
) -> (Vec<SustainSpan>, Vec<Recovered>) {
    let mut spans: Vec<SustainSpan> = Vec::new();
    let mut absorbed: Vec<Recovered> = Vec::new();
    let mut open: Option<f64> = None;

    for cc in pedal.iter() {
        if cc.is_pedal_down() {
            if open.is_none() {
                open = Some(cc.time);
            } else {
                absorbed.push(Recovered::MalformedPedalSequence {
                    time: cc.time,
                    value: cc.value,
                });
            }
        } else if let Some(start) = open.take() {
            spans.push(SustainSpan::new(start, cc.time));
        } else if let Some(last) = spans.last_mut() {
            // repeated pedal-up: the pedal was only fully released now
            last.end = cc.time;
        } else {
            absorbed.push(Recovered::MalformedPedalSequence {
                time: cc.time,
                value: cc.value,
            });
        }
    }

    if let Some(start) = open {
        debug!(
            "Sustain pedal still down at end of stream, closing span at {:.3}s..!",
            close_at.max(start)
        );
        spans.push(SustainSpan::new(start, close_at.max(start)));
    }

    (spans, absorbed)
}

/// Apply sustain pedal spans to a time-ordered note stream.
///
/// Spans are assumed chronological and non-overlapping, which holds for the output of
/// [`collect_spans`].
pub fn apply_spans(mut spans: Vec<SustainSpan>, notes: Vec<Note>) -> Vec<Note> {
    let mut pass_through: Vec<Note> = Vec::with_capacity(notes.len());
    let mut remaining = notes.into_iter().peekable();

    for span in spans.iter_mut() {
        while let Some(note) = remaining.peek() {
            if note.start > span.end {
                break;
            }

            if let Some(note) = remaining.next() {
                if span.holds(&note) {
                    span.managed_notes.push(note);
                } else {
                    pass_through.push(note);
                }
            }
        }
    }
    pass_through.extend(remaining);

    let mut stream = pass_through;
    for span in spans.into_iter() {
        stream.extend(span.release());
    }

    stream.sort_by(|a, b| a.start.total_cmp(&b.start));
    stream
}

/// Extend note durations according to the sustain pedal.
///
/// `pedal` must hold only sustain pedal changes, in time order; `notes` must be sorted by start.
pub fn resolve_sustain(notes: Vec<Note>, pedal: &[ControlChange]) -> (Vec<Note>, Vec<Recovered>) {
    if pedal.is_empty() {
        return (notes, Vec::new());
    }

    let last_release = notes.iter().map(|n| n.end).fold(0.0_f64, f64::max);
    let (spans, absorbed) = collect_spans(pedal, last_release);

    for issue in absorbed.iter() {
        debug!("Sustain resolver: {}", issue);
    }
    debug!("Resolved {} sustain span(s)", spans.len());

    (apply_spans(spans, notes), absorbed)
}

#[cfg(test)]
mod test {
    use super::*;

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() <= 1e-9
    }

    fn down(time: f64) -> ControlChange {
        ControlChange::new(time, 64, 127)
    }

    fn up(time: f64) -> ControlChange {
        ControlChange::new(time, 64, 0)
    }

    #[test]
    fn no_pedal_is_pass_through() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![Note::new(60, 80, 0.0, 1.0), Note::new(62, 80, 0.5, 0.8)];
        let (out, issues) = resolve_sustain(notes.clone(), &[]);

        assert_eq!(out, notes);
        assert!(issues.is_empty());
    }

    #[test]
    fn held_note_rings_until_pedal_release() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![Note::new(60, 80, 0.0, 1.0)];
        let (out, _) = resolve_sustain(notes, &[down(0.5), up(2.0)]);

        assert_eq!(out.len(), 1);
        assert!(approx_eq(out[0].start, 0.0));
        assert!(approx_eq(out[0].end, 2.0));
    }

    #[test]
    fn restrike_cuts_previous_note() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![
            Note::new(60, 80, 0.1, 0.2),
            Note::new(64, 70, 0.2, 0.3),
            Note::new(60, 90, 0.6, 0.7),
        ];
        let (out, _) = resolve_sustain(notes, &[down(0.0), up(1.5)]);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].pitch, 60);
        assert!(approx_eq(out[0].end, 0.6));
        assert_eq!(out[1].pitch, 64);
        assert!(approx_eq(out[1].end, 1.5));
        assert_eq!(out[2].pitch, 60);
        assert!(approx_eq(out[2].end, 1.5));
    }

    #[test]
    fn natural_release_after_pedal_is_kept() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![Note::new(60, 80, 0.2, 3.0)];
        let (out, _) = resolve_sustain(notes, &[down(0.0), up(1.0)]);

        assert!(approx_eq(out[0].end, 3.0));
    }

    #[test]
    fn notes_outside_spans_pass_through() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![
            Note::new(50, 80, 0.0, 0.5),
            Note::new(52, 80, 1.2, 1.3),
            Note::new(54, 80, 3.0, 3.5),
            Note::new(56, 80, 4.2, 4.3),
            Note::new(58, 80, 6.0, 6.5),
        ];
        let (out, _) = resolve_sustain(notes, &[down(1.0), up(2.0), down(4.0), up(5.0)]);

        let ends: Vec<f64> = out.iter().map(|n| n.end).collect();
        assert_eq!(out.len(), 5);
        assert!(approx_eq(ends[0], 0.5));
        assert!(approx_eq(ends[1], 2.0));
        assert!(approx_eq(ends[2], 3.5));
        assert!(approx_eq(ends[3], 5.0));
        assert!(approx_eq(ends[4], 6.5));
    }

    #[test]
    fn double_down_is_absorbed() {
        env_logger::try_init().unwrap_or(());

        let (spans, issues) = collect_spans(&[down(0.0), down(0.5), up(1.0)], 10.0);

        assert_eq!(spans.len(), 1);
        assert!(approx_eq(spans[0].start, 0.0));
        assert!(approx_eq(spans[0].end, 1.0));
        assert_eq!(issues.len(), 1);
    }

    #[test]
    fn repeated_up_extends_last_span() {
        env_logger::try_init().unwrap_or(());

        let (spans, issues) = collect_spans(&[down(0.0), up(1.0), up(1.5)], 10.0);

        assert_eq!(spans.len(), 1);
        assert!(approx_eq(spans[0].end, 1.5));
        assert!(issues.is_empty());
    }

    #[test]
    fn leading_up_is_absorbed() {
        env_logger::try_init().unwrap_or(());

        let (spans, issues) = collect_spans(&[up(0.1), down(0.5), up(1.0)], 10.0);

        assert_eq!(spans.len(), 1);
        assert!(matches!(
            issues[0],
            Recovered::MalformedPedalSequence { value: 0, .. }
        ));
    }

    #[test]
    fn unreleased_pedal_closes_at_stream_end() {
        env_logger::try_init().unwrap_or(());

        let notes = vec![Note::new(60, 80, 1.0, 1.5), Note::new(62, 80, 2.0, 4.0)];
        let (out, _) = resolve_sustain(notes, &[down(0.5)]);

        assert!(approx_eq(out[0].end, 4.0));
        assert!(approx_eq(out[1].end, 4.0));
    }

    #[test]
    fn reverse_scan_step_uses_next_onset() {
        let mut next_onsets = HashMap::new();
        next_onsets.insert(60, 1.25);

        let mut held = Note::new(60, 80, 0.5, 0.75);
        sustain_note(&mut held, 2.0, &mut next_onsets);
        assert!(approx_eq(held.end, 1.25));
        assert!(approx_eq(next_onsets[&60], 0.5));

        let mut other = Note::new(61, 80, 0.5, 0.75);
        sustain_note(&mut other, 2.0, &mut next_onsets);
        assert!(approx_eq(other.end, 2.0));
    }
}
