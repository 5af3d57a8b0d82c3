//! Scene-rotation scheduling for the visualizer.
//!
//! Two policies are provided. [`OccurrenceFairRotation`] tracks how many times
//! each scene has been shown and always picks among the least-shown scenes at
//! random, never repeating the active scene when an alternative exists.
//! [`TimeSlicedRotation`] is the stateless variant: the active index is a pure
//! function of elapsed time. [`SceneRotation`] wraps both behind the policy
//! selected in the configuration.

use std::time::Duration;

use rand::prelude::*;
use vizconfig::RotationPolicy;

#[derive(Debug, thiserror::Error)]
pub enum RotationError {
    #[error("scene rotation requires at least one scene")]
    NoScenes,
    #[error("switch interval must be greater than zero")]
    ZeroInterval,
}

/// Emitted when the active scene changes, mainly for logging.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneSwitch {
    pub from: usize,
    pub to: usize,
    pub at_secs: f32,
}

pub struct OccurrenceFairRotation {
    interval_secs: f32,
    counts: Vec<u32>,
    current: usize,
    next_switch: f32,
    rng: StdRng,
}

impl OccurrenceFairRotation {
    /// Picks the initial scene at random (counting it as shown once) and arms
    /// the first switch one interval after start.
    pub fn new(scene_count: usize, interval: Duration, seed: u64) -> Result<Self, RotationError> {
        if scene_count == 0 {
            return Err(RotationError::NoScenes);
        }
        if interval.is_zero() {
            return Err(RotationError::ZeroInterval);
        }
        let interval_secs = interval.as_secs_f32();
        let mut rotation = Self {
            interval_secs,
            counts: vec![0; scene_count],
            current: 0,
            next_switch: interval_secs,
            rng: StdRng::seed_from_u64(seed),
        };
        rotation.current = rotation.pick_next(None);
        rotation.counts[rotation.current] += 1;
        Ok(rotation)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Rotates once when `elapsed_secs` has crossed the scheduled switch time.
    ///
    /// The deadline advances by exactly one interval per crossing; a stalled
    /// caller does not trigger catch-up switches.
    pub fn advance_if_due(&mut self, elapsed_secs: f32) -> Option<SceneSwitch> {
        if elapsed_secs < self.next_switch {
            return None;
        }
        let from = self.current;
        let to = self.pick_next(Some(from));
        self.current = to;
        self.counts[to] += 1;
        self.next_switch += self.interval_secs;
        Some(SceneSwitch {
            from,
            to,
            at_secs: elapsed_secs,
        })
    }

    fn pick_next(&mut self, current: Option<usize>) -> usize {
        let n = self.counts.len();
        let min = self.counts.iter().copied().min().unwrap_or(0);

        let mut candidates = Vec::with_capacity(n);
        for (index, &count) in self.counts.iter().enumerate() {
            if count != min {
                continue;
            }
            if n > 1 && current == Some(index) {
                continue;
            }
            candidates.push(index);
        }

        if let Some(&choice) = candidates.choose(&mut self.rng) {
            return choice;
        }

        // Every minimum-count scene was the active one; pick any other index
        // so the rotation still moves, or stay put with a single scene.
        match current {
            Some(cur) if n > 1 => {
                let others: Vec<usize> = (0..n).filter(|&i| i != cur).collect();
                others.choose(&mut self.rng).copied().unwrap_or(cur)
            }
            Some(cur) => cur,
            None => 0,
        }
    }
}

pub struct TimeSlicedRotation {
    interval_secs: f32,
    scene_count: usize,
    current: usize,
}

impl TimeSlicedRotation {
    pub fn new(scene_count: usize, interval: Duration) -> Result<Self, RotationError> {
        if scene_count == 0 {
            return Err(RotationError::NoScenes);
        }
        if interval.is_zero() {
            return Err(RotationError::ZeroInterval);
        }
        Ok(Self {
            interval_secs: interval.as_secs_f32(),
            scene_count,
            current: 0,
        })
    }

    /// `floor(elapsed / interval) mod scene_count`, no stored state consulted.
    pub fn index_at(&self, elapsed_secs: f32) -> usize {
        let slot = (elapsed_secs.max(0.0) / self.interval_secs).floor() as usize;
        slot % self.scene_count
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    fn advance(&mut self, elapsed_secs: f32) -> Option<SceneSwitch> {
        let index = self.index_at(elapsed_secs);
        if index == self.current {
            return None;
        }
        let from = self.current;
        self.current = index;
        Some(SceneSwitch {
            from,
            to: index,
            at_secs: elapsed_secs,
        })
    }
}

/// Policy-agnostic rotation handle owned by the frame driver.
pub enum SceneRotation {
    OccurrenceFair(OccurrenceFairRotation),
    TimeSliced(TimeSlicedRotation),
}

impl SceneRotation {
    pub fn new(
        policy: RotationPolicy,
        scene_count: usize,
        interval: Duration,
        seed: u64,
    ) -> Result<Self, RotationError> {
        match policy {
            RotationPolicy::OccurrenceFair => Ok(Self::OccurrenceFair(
                OccurrenceFairRotation::new(scene_count, interval, seed)?,
            )),
            RotationPolicy::TimeSliced => Ok(Self::TimeSliced(TimeSlicedRotation::new(
                scene_count,
                interval,
            )?)),
        }
    }

    /// Called once per frame; returns the switch event when the active scene
    /// changed on this tick.
    pub fn advance(&mut self, elapsed_secs: f32) -> Option<SceneSwitch> {
        match self {
            Self::OccurrenceFair(rotation) => rotation.advance_if_due(elapsed_secs),
            Self::TimeSliced(rotation) => rotation.advance(elapsed_secs),
        }
    }

    pub fn active_index(&self) -> usize {
        match self {
            Self::OccurrenceFair(rotation) => rotation.current_index(),
            Self::TimeSliced(rotation) => rotation.current_index(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const INTERVAL: Duration = Duration::from_secs(15);

    fn drive_switches(rotation: &mut OccurrenceFairRotation, switches: usize) -> Vec<SceneSwitch> {
        let mut events = Vec::with_capacity(switches);
        let mut elapsed = 0.0f32;
        while events.len() < switches {
            elapsed += 1.0;
            if let Some(event) = rotation.advance_if_due(elapsed) {
                events.push(event);
            }
        }
        events
    }

    #[test]
    fn rejects_degenerate_inputs() {
        assert!(matches!(
            OccurrenceFairRotation::new(0, INTERVAL, 1),
            Err(RotationError::NoScenes)
        ));
        assert!(matches!(
            TimeSlicedRotation::new(4, Duration::ZERO),
            Err(RotationError::ZeroInterval)
        ));
    }

    #[test]
    fn occurrence_counts_stay_within_one_of_each_other() {
        let mut rotation = OccurrenceFairRotation::new(5, INTERVAL, 9).unwrap();
        drive_switches(&mut rotation, 200);
        let max = rotation.counts().iter().copied().max().unwrap();
        let min = rotation.counts().iter().copied().min().unwrap();
        assert!(max - min <= 1, "counts drifted: {:?}", rotation.counts());
    }

    #[test]
    fn never_repeats_active_scene_with_alternatives() {
        let mut rotation = OccurrenceFairRotation::new(3, INTERVAL, 7).unwrap();
        for event in drive_switches(&mut rotation, 100) {
            assert_ne!(event.from, event.to, "repeat at t={}", event.at_secs);
        }
    }

    #[test]
    fn single_scene_stays_put() {
        let mut rotation = OccurrenceFairRotation::new(1, INTERVAL, 3).unwrap();
        assert_eq!(rotation.current_index(), 0);
        let event = rotation.advance_if_due(15.0).expect("switch event");
        assert_eq!(event.to, 0);
        assert_eq!(rotation.current_index(), 0);
    }

    #[test]
    fn first_interval_produces_exactly_one_switch() {
        let mut rotation = OccurrenceFairRotation::new(3, INTERVAL, 21).unwrap();
        let mut switches = 0;
        let mut elapsed = 0.0f32;
        while elapsed <= 16.0 {
            if let Some(event) = rotation.advance_if_due(elapsed) {
                assert!(event.at_secs >= 15.0);
                switches += 1;
            }
            elapsed += 0.1;
        }
        assert_eq!(switches, 1);
        // One initial selection plus one switch.
        assert_eq!(rotation.counts().iter().sum::<u32>(), 2);
        assert!(rotation.counts().iter().all(|&count| count <= 1));
    }

    #[test]
    fn same_seed_reproduces_rotation() {
        let mut a = OccurrenceFairRotation::new(4, INTERVAL, 1234).unwrap();
        let mut b = OccurrenceFairRotation::new(4, INTERVAL, 1234).unwrap();
        assert_eq!(a.current_index(), b.current_index());
        for _ in 0..50 {
            let ea = drive_switches(&mut a, 1);
            let eb = drive_switches(&mut b, 1);
            assert_eq!(ea[0].to, eb[0].to);
        }
    }

    #[test]
    fn time_sliced_index_is_pure_elapsed_math() {
        let rotation = TimeSlicedRotation::new(4, Duration::from_secs(5)).unwrap();
        assert_eq!(rotation.index_at(0.0), 0);
        assert_eq!(rotation.index_at(4.9), 0);
        assert_eq!(rotation.index_at(12.0), 2);
        assert_eq!(rotation.index_at(19.9), 3);
        assert_eq!(rotation.index_at(20.0), 0);
    }

    #[test]
    fn time_sliced_reports_switch_on_slot_boundary() {
        let mut rotation =
            SceneRotation::new(RotationPolicy::TimeSliced, 4, Duration::from_secs(5), 0).unwrap();
        assert!(rotation.advance(4.0).is_none());
        let event = rotation.advance(5.5).expect("slot boundary crossed");
        assert_eq!((event.from, event.to), (0, 1));
        assert_eq!(rotation.active_index(), 1);
    }
}
