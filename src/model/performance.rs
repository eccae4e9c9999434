use serde::{Deserialize, Serialize};

/// Controller number of the sustain (damper) pedal.
pub const SUSTAIN_PEDAL: u8 = 64;

/// Controller values at or above this are "pedal down".
pub const PEDAL_DOWN_THRESHOLD: u8 = 64;

/// A sounding note with absolute timing in seconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Note {
    pub pitch: u8,
    pub velocity: u8,
    pub start: f64,
    pub end: f64,
}

impl Note {
    pub fn new(pitch: u8, velocity: u8, start: f64, end: f64) -> Self {
        Self {
            pitch,
            velocity,
            start,
            end,
        }
    }

    pub fn duration(&self) -> f64 {
        self.end - self.start
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ControlChange {
    pub time: f64,
    pub number: u8,
    pub value: u8,
}

impl ControlChange {
    pub fn new(time: f64, number: u8, value: u8) -> Self {
        Self {
            time,
            number,
            value,
        }
    }

    pub fn is_sustain(&self) -> bool {
        self.number == SUSTAIN_PEDAL
    }

    pub fn is_pedal_down(&self) -> bool {
        self.value >= PEDAL_DOWN_THRESHOLD
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Metadata {
    pub title: Option<String>,
    pub tempo_bpm: Option<f64>,
}

/// Notes and controller data for a single (track, channel) pair of a MIDI file.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Instrument {
    pub name: Option<String>,
    pub program: u8,
    pub is_drum: bool,
    pub notes: Vec<Note>,
    pub control_changes: Vec<ControlChange>,
}

impl Instrument {
    /// Sustain pedal events of this instrument, in time order.
    pub fn sustain_changes(&self) -> Vec<ControlChange> {
        let mut pedal: Vec<ControlChange> = self
            .control_changes
            .iter()
            .filter(|cc| cc.is_sustain())
            .copied()
            .collect();

        pedal.sort_by(|a, b| a.time.total_cmp(&b.time));
        pedal
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct Performance {
    pub metadata: Metadata,
    pub instruments: Vec<Instrument>,
}

impl Performance {
    pub fn note_count(&self) -> usize {
        self.instruments.iter().map(|inst| inst.notes.len()).sum()
    }
}
