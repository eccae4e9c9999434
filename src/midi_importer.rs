use crate::model::performance::*;
use anyhow::{Result, anyhow};
use log::{debug, warn};
use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

const DEFAULT_MPQN: u32 = 500_000;
const MICROSECONDS_PER_MINUTE: f64 = 60_000_000.0;
const DRUM_CHANNEL: u8 = 9;

struct NoteInterval {
    pub pitch: u8,
    pub start_tick: u64,
    pub end_tick: u64,
    pub velocity: u8,
}

struct ControlPoint {
    pub tick: u64,
    pub number: u8,
    pub value: u8,
}

/// Raw tick-domain data of one (track, channel) pair.
#[derive(Default)]
struct InstrumentBuilder {
    name: Option<String>,
    program: Option<u8>,
    intervals: Vec<NoteInterval>,
    controls: Vec<ControlPoint>,
    open_notes: HashMap<u8, Vec<(u64, u8)>>,
}

#[derive(Debug, Clone)]
struct TempoSegment {
    pub mpqn: u32,
    pub start_tick: u64,
    pub seconds_at_start: f64,
}

/// Tick to seconds conversion for either timing mode of a MIDI file.
enum Clock {
    Metrical {
        ticks_per_quarter: u64,
        segments: Vec<TempoSegment>,
    },
    Timecode {
        seconds_per_tick: f64,
    },
}

impl Clock {
    fn metrical(ticks_per_quarter: u64, mut tempo_changes: Vec<(u64, u32)>) -> Self {
        let mut last_tick: u64 = 0;
        let mut seconds_accum: f64 = 0.0;
        let mut last_mpqn: u32 = DEFAULT_MPQN;
        let mut segments: Vec<TempoSegment> = Vec::new();

        tempo_changes.sort_by_key(|(tick, _)| *tick);

        for (tick, mpqn) in tempo_changes.into_iter() {
            if tick > last_tick {
                let delta_ticks = (tick - last_tick) as f64;
                seconds_accum +=
                    delta_ticks * (last_mpqn as f64) / (ticks_per_quarter as f64) / 1_000_000.0;
            }

            // seconds_at_start reflects the time accumulated up to this tick
            segments.push(TempoSegment {
                start_tick: tick,
                mpqn,
                seconds_at_start: seconds_accum,
            });

            last_tick = tick;
            last_mpqn = mpqn;
        }

        Clock::Metrical {
            ticks_per_quarter,
            segments,
        }
    }

    fn seconds(&self, tick: u64) -> f64 {
        match self {
            Clock::Timecode { seconds_per_tick } => tick as f64 * seconds_per_tick,
            Clock::Metrical {
                ticks_per_quarter,
                segments,
            } => {
                let Some(segment) = segments
                    .iter()
                    .rfind(|seg| seg.start_tick <= tick)
                    .or(segments.first())
                else {
                    // default 120bpm
                    return (tick as f64) * DEFAULT_MPQN as f64
                        / (*ticks_per_quarter as f64)
                        / 1_000_000.0;
                };

                let delta_ticks = tick.saturating_sub(segment.start_tick) as f64;
                segment.seconds_at_start
                    + delta_ticks * (segment.mpqn as f64) / (*ticks_per_quarter as f64) / 1_000_000.0
            }
        }
    }

    /// Length given to a note that is never released and has nothing after it.
    fn fallback_ticks(&self) -> u64 {
        match self {
            Clock::Metrical {
                ticks_per_quarter, ..
            } => *ticks_per_quarter,
            Clock::Timecode { seconds_per_tick } => {
                (1.0 / seconds_per_tick).round().max(1.0) as u64
            }
        }
    }
}

pub fn import_midi_file<P: AsRef<Path>>(path: P) -> Result<Performance> {
    let bytes = fs::read(path.as_ref()).map_err(|e| {
        anyhow!(
            "Failed to read MIDI file {}: {}",
            path.as_ref().display(),
            e
        )
    })?;

    midi_bytes_to_performance(&bytes, path.as_ref())
}

pub fn midi_bytes_to_performance(bytes: &[u8], source_path: &Path) -> Result<Performance> {
    let smf = Smf::parse(bytes).map_err(|e| anyhow!("Failed to parse MIDI: {:?}", e))?;

    debug!(
        "MIDI format: {:?}, tracks: {}",
        smf.header.format,
        smf.tracks.len()
    );

    let mut tempo_changes: Vec<(u64, u32)> = Vec::new();
    tempo_changes.push((0u64, DEFAULT_MPQN)); // default tempo to ~120bpm until a tempo meta appears

    let mut builders: BTreeMap<(usize, u8), InstrumentBuilder> = BTreeMap::new();
    let mut last_tick: u64 = 0;

    for (track_idx, track) in smf.tracks.iter().enumerate() {
        let mut abs_tick: u64 = 0;
        let mut track_name: Option<String> = None;

        for event in track.iter() {
            abs_tick = abs_tick.saturating_add(event.delta.as_int() as u64);

            match &event.kind {
                TrackEventKind::Meta(meta) => match meta {
                    MetaMessage::Tempo(micro) => {
                        let mpqn: u32 = micro.as_int();
                        tempo_changes.push((abs_tick, mpqn));
                        debug!(
                            "Tempo change at tick {} -> {} us/qn (track {})",
                            abs_tick, mpqn, track_idx
                        );
                    }
                    MetaMessage::TrackName(bytes) => {
                        if track_name.is_none() {
                            track_name = Some(String::from_utf8_lossy(bytes).into_owned());
                            debug!("Track name: {:?}", track_name);
                        }
                    }
                    _ => {}
                },
                TrackEventKind::Midi { channel, message } => {
                    let ch: u8 = channel.as_int();
                    let builder = builders.entry((track_idx, ch)).or_default();

                    match message {
                        MidiMessage::NoteOn { key, vel } => {
                            let velocity: u8 = vel.as_int();

                            if velocity == 0 {
                                close_note(builder, ch, key.as_int(), abs_tick);
                            } else {
                                builder
                                    .open_notes
                                    .entry(key.as_int())
                                    .or_default()
                                    .push((abs_tick, velocity));
                            }
                        }
                        MidiMessage::NoteOff { key, vel: _ } => {
                            close_note(builder, ch, key.as_int(), abs_tick);
                        }
                        MidiMessage::Controller { controller, value } => {
                            builder.controls.push(ControlPoint {
                                tick: abs_tick,
                                number: controller.as_int(),
                                value: value.as_int(),
                            });
                        }
                        MidiMessage::ProgramChange { program } => {
                            if builder.program.is_none() {
                                builder.program = Some(program.as_int());
                            }
                        }
                        _ => {}
                    }
                }
                _ => {}
            }
        }

        last_tick = last_tick.max(abs_tick);
        for (_, builder) in builders.range_mut((track_idx, 0)..=(track_idx, u8::MAX)) {
            if builder.name.is_none() {
                builder.name = track_name.clone();
            }
        }
    }

    tempo_changes.sort_by_key(|(tick, _)| *tick);

    let clock = match smf.header.timing {
        Timing::Metrical(t) => {
            debug!("Ticks per quarter note: {}", t.as_int());
            Clock::metrical(t.as_int() as u64, tempo_changes.clone())
        }
        Timing::Timecode(fps, subframe) => {
            let ticks_per_second = fps.as_f32() as f64 * subframe as f64;
            if ticks_per_second <= 0.0 {
                return Err(anyhow!("Invalid SMPTE timing: {:?} x {}", fps, subframe));
            }
            Clock::Timecode {
                seconds_per_tick: 1.0 / ticks_per_second,
            }
        }
    };

    let mut instruments: Vec<Instrument> = Vec::new();
    for ((track_idx, ch), mut builder) in builders.into_iter() {
        let open_notes = std::mem::take(&mut builder.open_notes);
        for (key, stack) in open_notes.into_iter() {
            for (start_tick, start_vel) in stack {
                let end_tick = if last_tick > start_tick {
                    last_tick
                } else {
                    start_tick + clock.fallback_ticks()
                };

                builder.intervals.push(NoteInterval {
                    pitch: key,
                    start_tick,
                    end_tick,
                    velocity: start_vel,
                });

                warn!(
                    "Unclosed NoteOn for {}, channel: {} at tick: {} auto-closing at: {}..!",
                    key, ch, start_tick, end_tick
                );
            }
        }

        let mut notes: Vec<Note> = Vec::with_capacity(builder.intervals.len());
        for interval in builder.intervals.into_iter() {
            let start = clock.seconds(interval.start_tick);
            let end = clock.seconds(interval.end_tick);

            if end <= start {
                debug!(
                    "Skipping zero/negative duration midi note {}, start: {} end: {}..!",
                    interval.pitch, start, end
                );
                continue;
            }

            notes.push(Note::new(interval.pitch, interval.velocity, start, end));
        }

        if notes.is_empty() {
            debug!("Track {} channel {} has no notes, skipping..!", track_idx, ch);
            continue;
        }

        notes.sort_by(|a, b| a.start.total_cmp(&b.start));

        let mut control_changes: Vec<ControlChange> = builder
            .controls
            .into_iter()
            .map(|cp| ControlChange::new(clock.seconds(cp.tick), cp.number, cp.value))
            .collect();
        control_changes.sort_by(|a, b| a.time.total_cmp(&b.time));

        instruments.push(Instrument {
            name: builder.name,
            program: builder.program.unwrap_or(0),
            is_drum: ch == DRUM_CHANNEL,
            notes,
            control_changes,
        });
    }

    // skipping the first change because it is our default mpqn
    let tempo_bpm = match smf.header.timing {
        Timing::Metrical(_) => {
            let first = tempo_changes
                .get(1)
                .map(|(_, mpqn)| *mpqn)
                .unwrap_or(DEFAULT_MPQN);
            Some(MICROSECONDS_PER_MINUTE / (first as f64))
        }
        Timing::Timecode(_, _) => None,
    };

    let performance = Performance {
        metadata: Metadata {
            title: source_path
                .file_name()
                .and_then(|s| s.to_str())
                .map(|s| s.to_string()),
            tempo_bpm,
        },
        instruments,
    };

    debug!(
        "Imported {} instrument(s) with {} note(s)",
        performance.instruments.len(),
        performance.note_count()
    );

    Ok(performance)
}

fn close_note(builder: &mut InstrumentBuilder, ch: u8, pitch: u8, abs_tick: u64) {
    if let Some((start_tick, start_vel)) = builder
        .open_notes
        .get_mut(&pitch)
        .and_then(|stack| stack.pop())
    {
        builder.intervals.push(NoteInterval {
            pitch,
            start_tick,
            end_tick: abs_tick,
            velocity: start_vel,
        });
    } else {
        debug!(
            "Orphaned NoteOff for {} ch{} at tick {}..!",
            pitch, ch, abs_tick
        );
    }
}
