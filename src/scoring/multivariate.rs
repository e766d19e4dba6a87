//! Multivariate group aggregator: per-discharge-point sync buckets.
//!
//! Each confirmed anomaly contributes to its group's current *time bucket*
//! (the reading timestamp rounded to the nearest sync tolerance). A bucket
//! accumulates a bitmask of which member sensors have fired; it emits
//! exactly one row when the bitmask completes or when a later bucket is
//! observed for the same group. The bucket's effective timestamp is the
//! latest contributing reading's.
//!
//! Composite score is the root-mean-square of the contributing z-scores
//! only; missing members dilute nothing.

use std::collections::HashMap;

use tracing::debug;

use crate::config::Settings;
use crate::types::{parse_event_time, ConfirmedAnomaly, GroupRow};

/// Open bucket state for one group.
#[derive(Debug)]
struct Bucket {
    key_ms: i64,
    bitmask: u64,
    /// z-score per member slot; only slots with their bit set are live.
    z_scores: Vec<f64>,
    latest_ts_ms: i64,
    latest_timestamp: String,
}

impl Bucket {
    fn new(key_ms: i64, member_count: usize) -> Self {
        Self {
            key_ms,
            bitmask: 0,
            z_scores: vec![0.0; member_count],
            latest_ts_ms: i64::MIN,
            latest_timestamp: String::new(),
        }
    }
}

pub struct GroupAggregator {
    sync_tolerance_ms: i64,
    group_threshold: f64,
    time_format: String,
    /// (group name, ordered member list) — order defines bitmask bits.
    groups: Vec<(String, Vec<String>)>,
    /// sensor_id → (group index, bit index).
    membership: HashMap<String, (usize, u32)>,
    buckets: Vec<Option<Bucket>>,
    /// Key of the last emitted bucket per group, to keep one row per bucket.
    last_emitted: Vec<Option<i64>>,
}

impl GroupAggregator {
    pub fn new(settings: &Settings) -> Self {
        let groups: Vec<(String, Vec<String>)> = settings
            .sensor_groups
            .iter()
            .map(|g| (g.name.clone(), g.members.clone()))
            .collect();
        let mut membership = HashMap::new();
        for (gi, (_, members)) in groups.iter().enumerate() {
            for (bit, sensor_id) in members.iter().enumerate() {
                #[allow(clippy::cast_possible_truncation)]
                membership.insert(sensor_id.clone(), (gi, bit as u32));
            }
        }
        let count = groups.len();
        Self {
            sync_tolerance_ms: settings.sync_tolerance_ms,
            group_threshold: settings.group_threshold,
            time_format: settings.input_time_format.clone(),
            groups,
            membership,
            buckets: (0..count).map(|_| None).collect(),
            last_emitted: vec![None; count],
        }
    }

    /// Feed one confirmed anomaly. Returns a finished group row when this
    /// contribution completed the bucket's bitmask or rolled the group onto
    /// a later bucket.
    pub fn observe(&mut self, confirmed: &ConfirmedAnomaly) -> Option<GroupRow> {
        let &(group_idx, bit) = self.membership.get(&confirmed.sensor_id)?;
        let ts = parse_event_time(&confirmed.timestamp, &self.time_format)?;
        let ts_ms = ts.and_utc().timestamp_millis();
        let key_ms = self.bucket_key(ts_ms);

        // One row per (group, bucket): contributions to an already-emitted
        // bucket are dropped.
        if self.last_emitted[group_idx].is_some_and(|k| key_ms <= k) {
            debug!(
                group = %self.groups[group_idx].0,
                sensor_id = %confirmed.sensor_id,
                "contribution to an emitted bucket dropped"
            );
            return None;
        }

        let member_count = self.groups[group_idx].1.len();

        let roll_over = match self.buckets[group_idx].as_ref() {
            Some(bucket) if key_ms < bucket.key_ms => {
                debug!(
                    group = %self.groups[group_idx].0,
                    sensor_id = %confirmed.sensor_id,
                    "late contribution behind the open bucket dropped"
                );
                return None;
            }
            Some(bucket) => key_ms > bucket.key_ms,
            None => false,
        };

        // A later bucket closes the open one.
        let emitted = if roll_over {
            self.close_bucket(group_idx)
        } else {
            None
        };
        if self.buckets[group_idx].is_none() {
            self.buckets[group_idx] = Some(Bucket::new(key_ms, member_count));
        }

        let full_mask = full_bitmask(member_count);
        let mut completed = false;
        if let Some(bucket) = self.buckets[group_idx].as_mut() {
            bucket.bitmask |= 1 << bit;
            bucket.z_scores[bit as usize] = confirmed.z_score;
            if ts_ms > bucket.latest_ts_ms {
                bucket.latest_ts_ms = ts_ms;
                bucket.latest_timestamp = confirmed.timestamp.clone();
            }
            completed = bucket.bitmask == full_mask;
        }
        if completed {
            // An open bucket is always incomplete, so a roll-over close and
            // a completion close never both produce a row on one observe.
            let complete = self.close_bucket(group_idx);
            return complete.or(emitted);
        }

        emitted
    }

    /// Emit every open bucket — called when the source closes.
    pub fn flush(&mut self) -> Vec<GroupRow> {
        (0..self.groups.len())
            .filter_map(|gi| self.close_bucket(gi))
            .collect()
    }

    fn bucket_key(&self, ts_ms: i64) -> i64 {
        // Nearest multiple of the sync tolerance.
        (ts_ms + self.sync_tolerance_ms / 2).div_euclid(self.sync_tolerance_ms)
            * self.sync_tolerance_ms
    }

    fn close_bucket(&mut self, group_idx: usize) -> Option<GroupRow> {
        let bucket = self.buckets[group_idx].take()?;
        if bucket.bitmask == 0 {
            return None;
        }
        self.last_emitted[group_idx] = Some(bucket.key_ms);

        let (name, members) = &self.groups[group_idx];
        let mut contributing = Vec::new();
        let mut missing = Vec::new();
        let mut sensor_z_scores = Vec::new();
        let mut sum_sq = 0.0;

        for (bit, sensor_id) in members.iter().enumerate() {
            if bucket.bitmask & (1 << bit) != 0 {
                let z = bucket.z_scores[bit];
                contributing.push(sensor_id.clone());
                sensor_z_scores.push((sensor_id.clone(), z));
                sum_sq += z * z;
            } else {
                missing.push(sensor_id.clone());
            }
        }

        #[allow(clippy::cast_precision_loss)]
        let composite_score = (sum_sq / contributing.len() as f64).sqrt();

        Some(GroupRow {
            group_name: name.clone(),
            timestamp: bucket.latest_timestamp,
            composite_score,
            sensor_z_scores,
            contributing,
            missing,
            is_group_anomaly: composite_score > self.group_threshold,
        })
    }
}

const fn full_bitmask(member_count: usize) -> u64 {
    if member_count >= 64 {
        u64::MAX
    } else {
        (1u64 << member_count) - 1
    }
}
