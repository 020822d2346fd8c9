//! Engagement profile - statistics over a lead's event history

use chrono::{DateTime, Duration, Utc, Weekday};
use nurture_common::types::{
    weekday_name, ChannelPreference, EngagementChannel, EngagementEvent, TimeSlot,
};
use nurture_storage::models::LearnedProfile;
use std::collections::HashMap;

/// Minimum events before any profile is computed
pub const MIN_EVENTS: usize = 5;

/// Profiles below this confidence are not written back
pub const PERSIST_CONFIDENCE_FLOOR: i32 = 50;

/// Events inside this window weigh double
const RECENT_DAYS: i64 = 90;

const RECENT_WEIGHT: f64 = 2.0;
const BASE_WEIGHT: f64 = 1.0;

const DAY_RATE_FLOOR: f64 = 0.5;
const SLOT_RATE_FLOOR: f64 = 0.4;
const MIN_WEIGHTED_OBS: f64 = 2.0;
const MAX_BEST_DAYS: usize = 3;
const MAX_BEST_SLOTS: usize = 2;

const CHANNEL_MIN_OBS: usize = 3;
const CHANNEL_MARGIN: f64 = 0.20;

const GAP_MIN_HOURS: f64 = 1.0;
const GAP_MAX_HOURS: f64 = 168.0;
const DEFAULT_GAP_HOURS: f64 = 48.0;

const DEFAULT_BEST_DAYS: [&str; 3] = ["Tuesday", "Wednesday", "Thursday"];
const DEFAULT_BEST_TIMES: [&str; 1] = ["2pm-5pm"];

/// A lead's learned engagement profile
#[derive(Debug, Clone, PartialEq)]
pub struct EngagementProfile {
    pub sample_size: usize,
    pub recent_count: usize,
    pub best_days: Vec<String>,
    pub best_times: Vec<String>,
    pub channel_preference: ChannelPreference,
    pub optimal_gap_hours: f64,
    pub confidence: i32,
}

#[derive(Default, Clone, Copy)]
struct Bucket {
    success: f64,
    total: f64,
}

impl Bucket {
    fn rate(&self) -> f64 {
        if self.total > 0.0 {
            self.success / self.total
        } else {
            0.0
        }
    }
}

#[derive(Default, Clone, Copy)]
struct ChannelBucket {
    success: f64,
    total: f64,
    raw: usize,
}

impl EngagementProfile {
    /// Compute a profile from a lead's event history
    ///
    /// Returns `None` below the event floor. Events in the last 90 days
    /// weigh double across every statistic.
    pub fn compute(events: &[EngagementEvent], now: DateTime<Utc>) -> Option<Self> {
        if events.len() < MIN_EVENTS {
            return None;
        }

        let recent_cutoff = now - Duration::days(RECENT_DAYS);
        let weight_of =
            |event: &EngagementEvent| if event.occurred_at >= recent_cutoff { RECENT_WEIGHT } else { BASE_WEIGHT };

        let mut days: HashMap<Weekday, Bucket> = HashMap::new();
        let mut slots: HashMap<TimeSlot, Bucket> = HashMap::new();
        let mut channels: HashMap<EngagementChannel, ChannelBucket> = HashMap::new();
        let mut recent_count = 0usize;

        for event in events {
            let weight = weight_of(event);
            if event.occurred_at >= recent_cutoff {
                recent_count += 1;
            }
            let success = if event.kind.is_success() { weight } else { 0.0 };

            let day = days.entry(event.day_of_week()).or_default();
            day.success += success;
            day.total += weight;

            let slot = slots
                .entry(TimeSlot::from_hour(event.hour_of_day()))
                .or_default();
            slot.success += success;
            slot.total += weight;

            if let Some(channel) = event.channel {
                let bucket = channels.entry(channel).or_default();
                bucket.success += success;
                bucket.total += weight;
                bucket.raw += 1;
            }
        }

        let best_days = best_buckets(
            days.iter().map(|(day, bucket)| (weekday_name(*day), *bucket)),
            DAY_RATE_FLOOR,
            MAX_BEST_DAYS,
            &DEFAULT_BEST_DAYS,
        );

        let best_times = best_buckets(
            slots
                .iter()
                .filter(|(slot, _)| **slot != TimeSlot::OffHours)
                .map(|(slot, bucket)| (slot.label(), *bucket)),
            SLOT_RATE_FLOOR,
            MAX_BEST_SLOTS,
            &DEFAULT_BEST_TIMES,
        );

        let sample_size = events.len();
        let recent_fraction = recent_count as f64 / sample_size as f64;
        let volume = (sample_size as f64 / 20.0).min(1.0);
        let confidence = (volume * 60.0 + recent_fraction * 40.0).round() as i32;

        Some(Self {
            sample_size,
            recent_count,
            best_days,
            best_times,
            channel_preference: channel_preference(&channels),
            optimal_gap_hours: optimal_gap(events, weight_of),
            confidence,
        })
    }

    /// Whether this profile is trustworthy enough to persist
    pub fn should_persist(&self) -> bool {
        self.confidence >= PERSIST_CONFIDENCE_FLOOR
    }

    /// Convert to the write-back shape
    pub fn into_learned(self) -> LearnedProfile {
        LearnedProfile {
            best_days: self.best_days,
            best_times: self.best_times,
            optimal_gap_hours: self.optimal_gap_hours,
            channel_preference: self.channel_preference,
            confidence: self.confidence,
        }
    }
}

/// Top buckets above the rate floor with enough weighted observations,
/// falling back to the documented defaults rather than an empty list
fn best_buckets<'a>(
    buckets: impl Iterator<Item = (&'a str, Bucket)>,
    rate_floor: f64,
    take: usize,
    defaults: &[&str],
) -> Vec<String> {
    let mut qualifying: Vec<(&str, f64)> = buckets
        .filter(|(_, bucket)| bucket.total >= MIN_WEIGHTED_OBS && bucket.rate() >= rate_floor)
        .map(|(label, bucket)| (label, bucket.rate()))
        .collect();

    if qualifying.is_empty() {
        return defaults.iter().map(|s| s.to_string()).collect();
    }

    qualifying.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    qualifying
        .into_iter()
        .take(take)
        .map(|(label, _)| label.to_string())
        .collect()
}

/// Preferred channel, or `mixed` unless one channel clearly leads
///
/// A preference needs at least 3 raw observations on the leading channel and
/// a success rate more than 20 points above the next-best channel; a sole
/// observed channel qualifies on observations alone.
fn channel_preference(channels: &HashMap<EngagementChannel, ChannelBucket>) -> ChannelPreference {
    let mut rates: Vec<(EngagementChannel, f64, usize)> = channels
        .iter()
        .filter(|(_, bucket)| bucket.total > 0.0)
        .map(|(channel, bucket)| (*channel, bucket.success / bucket.total, bucket.raw))
        .collect();

    if rates.is_empty() {
        return ChannelPreference::Mixed;
    }

    rates.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    let (best, best_rate, best_raw) = rates[0];

    if best_raw < CHANNEL_MIN_OBS {
        return ChannelPreference::Mixed;
    }

    if rates.len() == 1 || best_rate - rates[1].1 > CHANNEL_MARGIN {
        best.into()
    } else {
        ChannelPreference::Mixed
    }
}

/// Weighted mean of consecutive event gaps inside [1h, 168h]
fn optimal_gap(events: &[EngagementEvent], weight_of: impl Fn(&EngagementEvent) -> f64) -> f64 {
    let mut sorted: Vec<&EngagementEvent> = events.iter().collect();
    sorted.sort_by_key(|e| e.occurred_at);

    let mut weighted_sum = 0.0;
    let mut weight_total = 0.0;

    for pair in sorted.windows(2) {
        let gap_hours = (pair[1].occurred_at - pair[0].occurred_at).num_seconds() as f64 / 3600.0;
        if (GAP_MIN_HOURS..=GAP_MAX_HOURS).contains(&gap_hours) {
            let weight = weight_of(pair[1]);
            weighted_sum += gap_hours * weight;
            weight_total += weight;
        }
    }

    if weight_total > 0.0 {
        weighted_sum / weight_total
    } else {
        DEFAULT_GAP_HOURS
    }
}
