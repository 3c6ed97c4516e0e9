//! Exponential-decay health scores, fixed-point ppm.
//!
//! Health feeds consensus-visible eligibility, so the arithmetic is
//! integer-only. A heartbeat closes a quarter of the gap to full health;
//! each missed interval multiplies the score by 7/8. Prolonged silence
//! therefore decays below the jailing threshold in a bounded number of
//! intervals.

pub const HEALTH_FULL_PPM: u32 = 1_000_000;

/// Starting score when a provider activates.
pub const HEALTH_INITIAL_PPM: u32 = 500_000;

const RISE_DIV: u32 = 4;
const DECAY_NUM: u64 = 7;
const DECAY_DEN: u64 = 8;

/// Score after one received heartbeat.
pub fn on_heartbeat(health_ppm: u32) -> u32 {
    let gap = HEALTH_FULL_PPM - health_ppm;
    health_ppm + gap / RISE_DIV
}

/// Score after `missed` whole heartbeat intervals without a beat.
pub fn after_missed(health_ppm: u32, missed: u64) -> u32 {
    let mut h = health_ppm as u64;
    for _ in 0..missed.min(64) {
        h = h * DECAY_NUM / DECAY_DEN;
    }
    h as u32
}

/// Whole intervals elapsed between the last heartbeat and now.
pub fn missed_intervals(last_heartbeat: i64, now: i64, interval_secs: u64) -> u64 {
    if now <= last_heartbeat || interval_secs == 0 {
        return 0;
    }
    (now - last_heartbeat) as u64 / interval_secs
}
