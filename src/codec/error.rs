use crate::codec::vocab::{Token, VOCAB_SIZE};

/// Hard failures of a single encode or decode call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("token {0} is outside the vocabulary [0, {max}]", max = VOCAB_SIZE - 1)]
    InvalidToken(Token),

    #[error("{kind} value {value} does not fit in a band of width {width}")]
    InvalidValue {
        kind: &'static str,
        value: u8,
        width: u16,
    },
}

/// Conditions the codec recovers from locally. These are reported next to the
/// output, never returned as an `Err`.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
pub enum Recovered {
    /// A note-off arrived for a pitch with no pending note-on; the event was dropped.
    #[error("orphaned note-off for pitch {pitch} at {time:.3}s")]
    OrphanedNoteOff { pitch: u8, time: f64 },

    /// A note-on and its note-off landed on the same instant; the note was dropped.
    #[error("zero-length note for pitch {pitch} at {time:.3}s")]
    DegenerateNote { pitch: u8, time: f64 },

    /// A pedal event that could not open or close a span was absorbed.
    #[error("absorbed pedal event (value {value}) at {time:.3}s")]
    MalformedPedalSequence { time: f64, value: u8 },
}
