//! Snapshot interpolation
//!
//! Remote entities are drawn slightly in the past so there are usually two
//! received states to blend between.

use std::collections::VecDeque;
use std::hash::Hash;

use hashbrown::HashMap;

use crate::game::constants::client::{HISTORY_LENGTH, HISTORY_RETENTION_MS, INTERPOLATION_DELAY_MS};
use crate::net::protocol::{PlayerSnapshot, ProjectileSnapshot};
use crate::util::vec2::wrap_angle;

#[inline]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Blend two headings along the shorter arc
#[inline]
pub fn lerp_angle(a: f32, b: f32, t: f32) -> f32 {
    a + wrap_angle(b - a) * t
}

/// State that can be blended between two samples
pub trait Interpolate: Clone {
    fn interpolate(&self, to: &Self, t: f32) -> Self;
}

impl Interpolate for PlayerSnapshot {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        Self {
            x: lerp(self.x, to.x, t),
            z: lerp(self.z, to.z, t),
            body_angle: lerp_angle(self.body_angle, to.body_angle, t),
            turret_angle: lerp_angle(self.turret_angle, to.turret_angle, t),
            // Discrete fields snap to the newer sample
            ..to.clone()
        }
    }
}

impl Interpolate for ProjectileSnapshot {
    fn interpolate(&self, to: &Self, t: f32) -> Self {
        Self {
            id: to.id,
            x: lerp(self.x, to.x, t),
            z: lerp(self.z, to.z, t),
            angle: to.angle,
        }
    }
}

#[derive(Debug, Clone)]
struct Sample<S> {
    at_ms: u64,
    state: S,
}

/// Per-entity sample history keyed by `K`
#[derive(Debug, Clone)]
pub struct EntityInterpolator<K, S> {
    histories: HashMap<K, VecDeque<Sample<S>>>,
    delay_ms: u64,
    max_samples: usize,
    retention_ms: u64,
}

impl<K: Eq + Hash + Copy, S: Interpolate> EntityInterpolator<K, S> {
    pub fn new() -> Self {
        Self::with_settings(INTERPOLATION_DELAY_MS, HISTORY_LENGTH, HISTORY_RETENTION_MS)
    }

    pub fn with_settings(delay_ms: u64, max_samples: usize, retention_ms: u64) -> Self {
        Self {
            histories: HashMap::new(),
            delay_ms,
            max_samples: max_samples.max(1),
            retention_ms,
        }
    }

    /// Record `state` as received at `at_ms`
    pub fn push(&mut self, key: K, at_ms: u64, state: S) {
        let history = self.histories.entry(key).or_default();
        history.push_back(Sample { at_ms, state });
        while history.len() > self.max_samples {
            history.pop_front();
        }
    }

    /// State to draw at `now_ms`.
    ///
    /// Blends the pair of samples straddling `now_ms - delay`; falls back to
    /// the newest sample when no such pair exists.
    pub fn sample(&self, key: &K, now_ms: u64) -> Option<S> {
        let history = self.histories.get(key)?;
        let latest = history.back()?;
        let render_ms = now_ms.saturating_sub(self.delay_ms);

        let pair = history
            .iter()
            .zip(history.iter().skip(1))
            .find(|(before, after)| before.at_ms <= render_ms && render_ms <= after.at_ms);

        match pair {
            Some((before, after)) => {
                let range = after.at_ms - before.at_ms;
                let t = if range > 0 {
                    (render_ms - before.at_ms) as f32 / range as f32
                } else {
                    0.0
                };
                Some(before.state.interpolate(&after.state, t))
            }
            None => Some(latest.state.clone()),
        }
    }

    pub fn latest(&self, key: &K) -> Option<&S> {
        self.histories.get(key)?.back().map(|s| &s.state)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.histories.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.histories.keys()
    }

    pub fn remove(&mut self, key: &K) {
        self.histories.remove(key);
    }

    /// Keep only entities for which `keep` returns true
    pub fn retain_keys(&mut self, mut keep: impl FnMut(&K) -> bool) {
        self.histories.retain(|key, _| keep(key));
    }

    /// Drop samples older than the retention window and forget empty entities
    pub fn prune(&mut self, now_ms: u64) {
        let cutoff = now_ms.saturating_sub(self.retention_ms);
        self.histories.retain(|_, history| {
            while history.front().is_some_and(|s| s.at_ms < cutoff) {
                history.pop_front();
            }
            !history.is_empty()
        });
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }

    pub fn clear(&mut self) {
        self.histories.clear();
    }
}

impl<K: Eq + Hash + Copy, S: Interpolate> Default for EntityInterpolator<K, S> {
    fn default() -> Self {
        Self::new()
    }
}
