//! Keyframe tracks, per-bone channels and animation clips

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::rasterizer::{Mat4, Quat, Vec3};

use super::skeleton::BoneId;

/// A timestamped value, time in seconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Keyframe<T> {
    pub time: f32,
    pub value: T,
}

impl<T> Keyframe<T> {
    pub fn new(time: f32, value: T) -> Self {
        Self { time, value }
    }
}

/// Blend between two keyframe values
pub trait Interpolate: Copy {
    fn interpolate(a: Self, b: Self, t: f32) -> Self;
}

impl Interpolate for Vec3 {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.lerp(b, t)
    }
}

impl Interpolate for Quat {
    fn interpolate(a: Self, b: Self, t: f32) -> Self {
        a.slerp(b, t)
    }
}

/// Time-ordered keyframes; each key's successor is the next one in the list
#[derive(Debug, Clone, PartialEq)]
pub struct Track<T> {
    keys: Vec<Keyframe<T>>,
}

impl<T> Default for Track<T> {
    fn default() -> Self {
        Self { keys: Vec::new() }
    }
}

impl<T: Interpolate> Track<T> {
    pub fn new(mut keys: Vec<Keyframe<T>>) -> Self {
        keys.sort_by(|a, b| a.time.total_cmp(&b.time));
        Self { keys }
    }

    /// Insert a key, keeping time order (equal times keep insertion order)
    pub fn add_key(&mut self, time: f32, value: T) {
        let at = self.keys.partition_point(|k| k.time <= time);
        self.keys.insert(at, Keyframe::new(time, value));
    }

    pub fn keys(&self) -> &[Keyframe<T>] {
        &self.keys
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Sample the track at `time`
    ///
    /// Uses the last key at or before `time` (the first key when `time` comes
    /// earlier) and blends toward its successor. The last key holds. A
    /// zero-length interval snaps to the later key.
    pub fn sample(&self, time: f32) -> Option<T> {
        let first_after = self.keys.partition_point(|k| k.time <= time);
        let current = first_after.saturating_sub(1);
        let key = self.keys.get(current)?;

        let Some(next) = self.keys.get(current + 1) else {
            return Some(key.value);
        };

        let span = next.time - key.time;
        if span <= f32::EPSILON {
            return Some(next.value);
        }
        let t = ((time - key.time) / span).clamp(0.0, 1.0);
        Some(T::interpolate(key.value, next.value, t))
    }
}

/// Position, rotation and scale tracks driving one bone
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Channel {
    pub bone: BoneId,
    pub positions: Track<Vec3>,
    pub rotations: Track<Quat>,
    pub scales: Track<Vec3>,
}

impl Channel {
    pub fn new(bone: BoneId) -> Self {
        Self {
            bone,
            ..Default::default()
        }
    }

    /// Local transform at `time`, composed as translate * rotate * scale
    pub fn sample(&self, time: f32) -> Mat4 {
        let position = self.positions.sample(time).unwrap_or(Vec3::ZERO);
        let rotation = self.rotations.sample(time).unwrap_or(Quat::IDENTITY);
        let scale = self.scales.sample(time).unwrap_or(Vec3::ONE);
        Mat4::from_scale_rotation_translation(scale, rotation.normalize(), position)
    }
}

/// A named clip: one channel per animated bone and a cycle length in seconds
#[derive(Debug, Clone, Default)]
pub struct Animation {
    pub name: String,
    pub duration: f32,
    channels: BTreeMap<BoneId, Channel>,
}

impl Animation {
    pub const DEFAULT_TICKS_PER_SECOND: f32 = 25.0;

    pub fn new(name: &str, duration: f32) -> Self {
        Self {
            name: name.to_string(),
            duration,
            channels: BTreeMap::new(),
        }
    }

    /// Seconds per tick, falling back to 25 ticks per second when unset
    pub fn tick_scale(ticks_per_second: f32) -> f32 {
        if ticks_per_second > 0.0 {
            1.0 / ticks_per_second
        } else {
            1.0 / Self::DEFAULT_TICKS_PER_SECOND
        }
    }

    /// Build an empty clip from a duration given in ticks
    pub fn from_ticks(name: &str, duration_ticks: f32, ticks_per_second: f32) -> Self {
        Self::new(name, duration_ticks * Self::tick_scale(ticks_per_second))
    }

    /// Channel for `bone`, created empty on first use
    pub fn channel_mut(&mut self, bone: BoneId) -> &mut Channel {
        self.channels.entry(bone).or_insert_with(|| Channel::new(bone))
    }

    pub fn channel(&self, bone: BoneId) -> Option<&Channel> {
        self.channels.get(&bone)
    }

    pub fn channels(&self) -> impl Iterator<Item = &Channel> {
        self.channels.values()
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }
}
