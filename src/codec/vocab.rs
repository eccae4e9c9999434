use crate::codec::error::CodecError;
use serde::{Deserialize, Serialize};

/// A single symbol of the model vocabulary.
pub type Token = u16;

pub const RANGE_NOTE_ON: u16 = 128;
pub const RANGE_NOTE_OFF: u16 = 128;
pub const RANGE_TIME_SHIFT: u16 = 100;
pub const RANGE_VELOCITY: u16 = 32;

pub const NOTE_ON_BASE: Token = 0;
pub const NOTE_OFF_BASE: Token = NOTE_ON_BASE + RANGE_NOTE_ON;
pub const TIME_SHIFT_BASE: Token = NOTE_OFF_BASE + RANGE_NOTE_OFF;
pub const VELOCITY_BASE: Token = TIME_SHIFT_BASE + RANGE_TIME_SHIFT;

/// Total number of tokens; valid tokens are `0..VOCAB_SIZE`.
pub const VOCAB_SIZE: u16 = VELOCITY_BASE + RANGE_VELOCITY;

/// A typed vocabulary entry. Each variant owns one contiguous band of tokens,
/// laid out in declaration order.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Event {
    /// Pitch 0..=127.
    NoteOn(u8),
    /// Pitch 0..=127.
    NoteOff(u8),
    /// Shift of `value + 1` hundredths of a second, value 0..=99.
    TimeShift(u8),
    /// Velocity bucket 0..=31.
    Velocity(u8),
}

impl Event {
    pub fn kind(&self) -> &'static str {
        match self {
            Event::NoteOn(_) => "note_on",
            Event::NoteOff(_) => "note_off",
            Event::TimeShift(_) => "time_shift",
            Event::Velocity(_) => "velocity",
        }
    }

    pub fn value(&self) -> u8 {
        match *self {
            Event::NoteOn(v) | Event::NoteOff(v) | Event::TimeShift(v) | Event::Velocity(v) => v,
        }
    }

    fn band(&self) -> (Token, u16) {
        match self {
            Event::NoteOn(_) => (NOTE_ON_BASE, RANGE_NOTE_ON),
            Event::NoteOff(_) => (NOTE_OFF_BASE, RANGE_NOTE_OFF),
            Event::TimeShift(_) => (TIME_SHIFT_BASE, RANGE_TIME_SHIFT),
            Event::Velocity(_) => (VELOCITY_BASE, RANGE_VELOCITY),
        }
    }

    pub fn to_token(&self) -> Result<Token, CodecError> {
        let (base, width) = self.band();
        let value = self.value();

        if u16::from(value) >= width {
            return Err(CodecError::InvalidValue {
                kind: self.kind(),
                value,
                width,
            });
        }

        Ok(base + u16::from(value))
    }

    pub fn from_token(token: Token) -> Result<Self, CodecError> {
        // Every band is at most 128 wide, so the offsets below always fit in a u8.
        let event = if token < NOTE_OFF_BASE {
            Event::NoteOn((token - NOTE_ON_BASE) as u8)
        } else if token < TIME_SHIFT_BASE {
            Event::NoteOff((token - NOTE_OFF_BASE) as u8)
        } else if token < VELOCITY_BASE {
            Event::TimeShift((token - TIME_SHIFT_BASE) as u8)
        } else if token < VOCAB_SIZE {
            Event::Velocity((token - VELOCITY_BASE) as u8)
        } else {
            return Err(CodecError::InvalidToken(token));
        };

        Ok(event)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn bands_are_contiguous() {
        assert_eq!(NOTE_OFF_BASE, 128);
        assert_eq!(TIME_SHIFT_BASE, 256);
        assert_eq!(VELOCITY_BASE, 356);
        assert_eq!(VOCAB_SIZE, 388);
    }

    #[test]
    fn every_token_maps_back_to_itself() {
        for token in 0..VOCAB_SIZE {
            let event = Event::from_token(token).unwrap();
            assert_eq!(event.to_token().unwrap(), token);
        }
    }

    #[test]
    fn band_edges() {
        assert_eq!(Event::from_token(0).unwrap(), Event::NoteOn(0));
        assert_eq!(Event::from_token(127).unwrap(), Event::NoteOn(127));
        assert_eq!(Event::from_token(128).unwrap(), Event::NoteOff(0));
        assert_eq!(Event::from_token(255).unwrap(), Event::NoteOff(127));
        assert_eq!(Event::from_token(256).unwrap(), Event::TimeShift(0));
        assert_eq!(Event::from_token(355).unwrap(), Event::TimeShift(99));
        assert_eq!(Event::from_token(356).unwrap(), Event::Velocity(0));
        assert_eq!(Event::from_token(387).unwrap(), Event::Velocity(31));
    }

    #[test]
    fn out_of_range_token_is_rejected() {
        assert_eq!(Event::from_token(388), Err(CodecError::InvalidToken(388)));
        assert_eq!(
            Event::from_token(u16::MAX),
            Err(CodecError::InvalidToken(u16::MAX))
        );
    }

    #[test]
    fn oversized_values_are_rejected() {
        assert!(matches!(
            Event::NoteOn(128).to_token(),
            Err(CodecError::InvalidValue { kind: "note_on", value: 128, width: 128 })
        ));
        assert!(Event::TimeShift(100).to_token().is_err());
        assert!(Event::Velocity(32).to_token().is_err());
        assert_eq!(Event::Velocity(31).to_token(), Ok(387));
    }
}
