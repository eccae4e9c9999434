use crate::codec::vocab::{Event, RANGE_TIME_SHIFT};

/// Time-shift resolution: one tick is a hundredth of a second.
pub const TICKS_PER_SECOND: f64 = 100.0;

/// Raw velocities per velocity bucket.
pub const VELOCITY_BUCKET_SIZE: u8 = 4;

/// Number of whole ticks between two instants, rounded to the nearest tick.
pub fn interval_ticks(prev_time: f64, next_time: f64) -> u64 {
    let ticks = ((next_time - prev_time) * TICKS_PER_SECOND).round();
    if ticks > 0.0 { ticks as u64 } else { 0 }
}

/// Decompose a tick count into time-shift events.
///
/// Each event shifts by `value + 1` ticks, so a zero interval produces nothing.
pub fn time_shift_events(ticks: u64) -> Vec<Event> {
    let max_shift = u64::from(RANGE_TIME_SHIFT);
    let mut remaining = ticks;
    let mut events: Vec<Event> = Vec::with_capacity((ticks / max_shift + 1) as usize);

    while remaining >= max_shift {
        events.push(Event::TimeShift((max_shift - 1) as u8));
        remaining -= max_shift;
    }

    if remaining > 0 {
        events.push(Event::TimeShift((remaining - 1) as u8));
    }

    events
}

/// Ticks covered by a single time-shift value.
pub fn shift_ticks(value: u8) -> u64 {
    u64::from(value) + 1
}

pub fn ticks_to_seconds(ticks: u64) -> f64 {
    ticks as f64 / TICKS_PER_SECOND
}

pub fn quantize_velocity(velocity: u8) -> u8 {
    velocity / VELOCITY_BUCKET_SIZE
}

pub fn dequantize_velocity(bucket: u8) -> u8 {
    bucket.saturating_mul(VELOCITY_BUCKET_SIZE)
}

/// Run-length suppression of velocity events on the encode path.
#[derive(Debug, Clone, Copy, Default)]
pub struct VelocityState {
    bucket: u8,
}

impl VelocityState {
    /// Returns a velocity event only when the bucket differs from the last one emitted.
    pub fn update(&mut self, velocity: u8) -> Option<Event> {
        let bucket = quantize_velocity(velocity);
        if bucket == self.bucket {
            return None;
        }

        self.bucket = bucket;
        Some(Event::Velocity(bucket))
    }
}
