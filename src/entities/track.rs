//! Trajectories and the objects that own them
//!
//! A [`Track`] holds one [`Point`] per movie frame; `Point::UNRESOLVED` marks
//! entries the tracker has yet to fill. A [`Trackee`] owns its track and hands out
//! [`TrackView`] observers that go empty once the trackee is dropped, so report
//! writers never read a trajectory nobody owns any more.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, Weak};

/// Pixel position; (-1, -1) means "not computed yet"
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub const UNRESOLVED: Point = Point { x: -1, y: -1 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_resolved(&self) -> bool {
        *self != Self::UNRESOLVED
    }

    /// Squared Euclidean distance, saturating at `i64::MAX`
    pub fn squared_distance(&self, other: &Point) -> i64 {
        let dx = self.x as i64 - other.x as i64;
        let dy = self.y as i64 - other.y as i64;
        dx.saturating_mul(dx).saturating_add(dy.saturating_mul(dy))
    }
}

impl Default for Point {
    fn default() -> Self {
        Self::UNRESOLVED
    }
}

impl From<(i32, i32)> for Point {
    fn from((x, y): (i32, i32)) -> Self {
        Self { x, y }
    }
}

/// One point per frame
pub type Track = Vec<Point>;

/// One trackable object: a speed cap plus its trajectory
#[derive(Debug)]
pub struct Trackee {
    speed_cap: u32,              // Max displacement in pixels per frame step
    track: Arc<Mutex<Track>>,
}

impl Trackee {
    /// Trackee with `frame_count` unresolved points
    pub fn new(speed_cap: u32, frame_count: usize) -> Self {
        Self {
            speed_cap,
            track: Arc::new(Mutex::new(vec![Point::UNRESOLVED; frame_count])),
        }
    }

    pub fn speed_cap(&self) -> u32 {
        self.speed_cap
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn point(&self, index: usize) -> Point {
        let track = self.lock();
        assert!(index < track.len(), "track index {} out of range ({})", index, track.len());
        track[index]
    }

    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn set_point(&self, index: usize, point: Point) {
        let mut track = self.lock();
        assert!(index < track.len(), "track index {} out of range ({})", index, track.len());
        track[index] = point;
    }

    /// Reset `range` to unresolved
    pub fn clear_range(&self, range: std::ops::Range<usize>) {
        let mut track = self.lock();
        track[range].fill(Point::UNRESOLVED);
    }

    /// Copy of the whole trajectory
    pub fn snapshot(&self) -> Track {
        self.lock().clone()
    }

    /// Non-owning observer of the trajectory
    pub fn track(&self) -> TrackView {
        TrackView(Arc::downgrade(&self.track))
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Track> {
        self.track.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Read-only handle to a trackee's trajectory; empty once the trackee is gone
#[derive(Debug, Clone)]
pub struct TrackView(Weak<Mutex<Track>>);

impl TrackView {
    /// Copy of the trajectory, `None` if its trackee was dropped
    pub fn snapshot(&self) -> Option<Track> {
        self.0
            .upgrade()
            .map(|track| track.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    pub fn is_live(&self) -> bool {
        self.0.strong_count() > 0
    }
}
