//! Intensity-peak tracker
//!
//! Fills every unresolved point of a trackee's trajectory from the resolved points
//! around it. Resolved points are never modified, whether the user placed them or
//! an earlier pass computed them; to recompute a span, reset it to
//! `Point::UNRESOLVED` first (see `Session::mark`).
//!
//! # Runs
//!
//! - Before the first resolved point: walk backwards from it, one frame at a time,
//!   moving to the brightest pixel within the speed cap.
//! - Between two resolved points: advance alternately from both ends. Each step
//!   scores candidates by brightness plus a bonus for closing in on the latest
//!   point computed on the other side (see [`niceness`]), until the fronts meet.
//! - After the last resolved point: walk forwards like the leading run.
//!
//! A trackee without any resolved point is left alone.

use log::{debug, info};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::entities::bitmap::Bitmap;
use crate::entities::movie::Movie;
use crate::entities::track::{Point, Track, Trackee};

/// Reasons a tracking pass is abandoned
#[derive(Debug)]
pub enum TrackError {
    /// Another pass is still running on this tracker
    Busy,
    /// The frame could not be decoded, so its neighbourhood cannot be searched
    MissingBitmap { frame: usize, path: std::path::PathBuf },
    /// The point to search around does not lie inside the frame's bitmap
    PointOutsideFrame { frame: usize, point: Point, width: usize, height: usize },
}

impl std::fmt::Display for TrackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackError::Busy => write!(f, "A tracking pass is already running"),
            TrackError::MissingBitmap { frame, path } => {
                write!(f, "Frame {} has no bitmap ({})", frame, path.display())
            }
            TrackError::PointOutsideFrame { frame, point, width, height } => write!(
                f,
                "Point ({}, {}) lies outside frame {} ({}x{})",
                point.x, point.y, frame, width, height
            ),
        }
    }
}

impl std::error::Error for TrackError {}

/// Tracking engine. Runs at most one pass at a time.
#[derive(Debug, Default)]
pub struct Tracker {
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when the pass ends, even by panic
pub(crate) struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a pass is currently running
    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Track every trackee against `movie`.
    ///
    /// # Panics
    ///
    /// Panics if a trackee's length differs from the movie's frame count.
    pub fn track_all<'a, I>(&self, trackees: I, movie: &Movie) -> Result<(), TrackError>
    where
        I: IntoIterator<Item = &'a Trackee>,
    {
        self.track_each(trackees, movie, |_| {})
    }

    /// Like [`Tracker::track_all`], calling `on_done(i)` after the i-th trackee
    pub fn track_each<'a, I, F>(&self, trackees: I, movie: &Movie, mut on_done: F) -> Result<(), TrackError>
    where
        I: IntoIterator<Item = &'a Trackee>,
        F: FnMut(usize),
    {
        let _guard = self.acquire()?;
        for (i, trackee) in trackees.into_iter().enumerate() {
            fill(trackee, movie)?;
            on_done(i);
        }
        Ok(())
    }

    /// Track a single trackee.
    ///
    /// # Panics
    ///
    /// Panics if the trackee's length differs from the movie's frame count.
    pub fn track(&self, trackee: &Trackee, movie: &Movie) -> Result<(), TrackError> {
        let _guard = self.acquire()?;
        fill(trackee, movie)
    }

    pub(crate) fn acquire(&self) -> Result<PassGuard<'_>, TrackError> {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| TrackError::Busy)?;
        Ok(PassGuard(&self.in_flight))
    }
}

/// Fill all unresolved runs of one trajectory
fn fill(trackee: &Trackee, movie: &Movie) -> Result<(), TrackError> {
    let mut track = trackee.snapshot();
    assert_eq!(
        track.len(),
        movie.len(),
        "track length {} does not match movie length {}",
        track.len(),
        movie.len()
    );

    let Some(first) = track.iter().position(Point::is_resolved) else {
        debug!("Nothing to track from: no resolved points");
        return Ok(());
    };

    let len = track.len();
    let speed_cap = trackee.speed_cap();
    let unresolved = track.iter().filter(|p| !p.is_resolved()).count();
    info!("Tracking {} of {} points (speed cap {})", unresolved, len, speed_cap);

    let mut pass = Pass { trackee, movie, track: &mut track, speed_cap };

    // Leading run
    for i in (0..first).rev() {
        pass.single(i, i + 1)?;
    }

    let mut cursor = first;
    loop {
        let Some(start) = (cursor..len).find(|&i| !pass.track[i].is_resolved()) else {
            break;
        };
        match (start..len).find(|&i| pass.track[i].is_resolved()) {
            Some(end) => {
                pass.interior(start, end)?;
                cursor = end;
            }
            None => {
                // Trailing run
                for i in start..len {
                    pass.single(i, i - 1)?;
                }
                break;
            }
        }
    }

    debug!("Tracking done");
    Ok(())
}

/// State of one trajectory fill
struct Pass<'a> {
    trackee: &'a Trackee,
    movie: &'a Movie,
    track: &'a mut Track,
    speed_cap: u32,
}

impl Pass<'_> {
    /// Resolve `index` from the single resolved neighbour at `from`
    fn single(&mut self, index: usize, from: usize) -> Result<(), TrackError> {
        let bitmap = self.bitmap(index)?;
        let adjacent = self.inside(index, &bitmap, self.track[from])?;
        let point = track_down(&bitmap, adjacent, self.speed_cap);
        self.commit(index, point);
        Ok(())
    }

    /// Resolve `index` from the neighbour at `from`, pulled towards `towards`
    fn dual(&mut self, index: usize, from: usize, towards: usize) -> Result<(), TrackError> {
        let bitmap = self.bitmap(index)?;
        let adjacent = self.inside(index, &bitmap, self.track[from])?;
        let auxiliary = self.track[towards];
        let proximity = index.abs_diff(towards);
        let point = track_down_towards(&bitmap, adjacent, auxiliary, self.speed_cap, proximity);
        self.commit(index, point);
        Ok(())
    }

    /// Two fronts closing the gap `start..end`; `start - 1` and `end` are resolved
    fn interior(&mut self, start: usize, end: usize) -> Result<(), TrackError> {
        let (mut low, mut high) = (start, end);
        while low != high {
            self.dual(low, low - 1, high)?;
            low += 1;
            if low == high {
                break;
            }
            high -= 1;
            self.dual(high, high + 1, low - 1)?;
        }
        Ok(())
    }

    fn bitmap(&self, index: usize) -> Result<Arc<Bitmap>, TrackError> {
        let frame = self.movie.frame(index);
        frame.bitmap(true).ok_or_else(|| TrackError::MissingBitmap {
            frame: index,
            path: frame.path(),
        })
    }

    fn inside(&self, index: usize, bitmap: &Bitmap, point: Point) -> Result<Point, TrackError> {
        if bitmap.contains(point.x, point.y) {
            Ok(point)
        } else {
            Err(TrackError::PointOutsideFrame {
                frame: index,
                point,
                width: bitmap.width(),
                height: bitmap.height(),
            })
        }
    }

    fn commit(&mut self, index: usize, point: Point) {
        self.track[index] = point;
        self.trackee.set_point(index, point);
    }
}

/// Pixels within `speed_cap` of `center`, row-major, clipped to the bitmap
fn neighbourhood(bitmap: &Bitmap, center: Point, speed_cap: u32) -> impl Iterator<Item = (Point, u8)> + '_ {
    let cap = speed_cap as i64;
    let first_row = (center.y as i64 - cap).max(0);
    let last_row = (center.y as i64 + cap).min(bitmap.height() as i64 - 1);
    let first_column = (center.x as i64 - cap).max(0);
    let last_column = (center.x as i64 + cap).min(bitmap.width() as i64 - 1);
    let squared_cap = cap * cap;

    (first_row..=last_row).flat_map(move |row| {
        let samples = bitmap.row(row as usize);
        (first_column..=last_column).filter_map(move |column| {
            let point = Point::new(column as i32, row as i32);
            (point.squared_distance(&center) <= squared_cap).then(|| (point, samples[column as usize]))
        })
    })
}

/// Brightest pixel within `speed_cap` of `adjacent`.
///
/// Ties go to the pixel closer to `adjacent`, then to the first one in row-major
/// order. `adjacent` itself is the starting candidate, so a flat neighbourhood
/// means no movement.
///
/// # Panics
///
/// Panics if `adjacent` lies outside `bitmap`.
pub fn track_down(bitmap: &Bitmap, adjacent: Point, speed_cap: u32) -> Point {
    let mut peak = adjacent;
    let mut peak_intensity = bitmap[adjacent.y as usize][adjacent.x as usize];
    let mut peak_distance = 0;

    for (point, intensity) in neighbourhood(bitmap, adjacent, speed_cap) {
        let distance = point.squared_distance(&adjacent);
        if intensity > peak_intensity || (intensity == peak_intensity && distance < peak_distance) {
            peak = point;
            peak_intensity = intensity;
            peak_distance = distance;
        }
    }
    peak
}

/// Nicest pixel within `speed_cap` of `adjacent` when heading for `auxiliary`,
/// which is `proximity` frames away. The first of equally nice pixels wins.
pub fn track_down_towards(
    bitmap: &Bitmap,
    adjacent: Point,
    auxiliary: Point,
    speed_cap: u32,
    proximity: usize,
) -> Point {
    let distance_cap = speed_cap as u64 * proximity as u64;

    let mut preliminary = adjacent;
    let mut jolliest: i64 = -255;

    for (point, intensity) in neighbourhood(bitmap, adjacent, speed_cap) {
        let contender = niceness(point, intensity, adjacent, auxiliary, speed_cap, distance_cap);
        if contender > jolliest {
            preliminary = point;
            jolliest = contender;
        }
    }
    preliminary
}

/// Intensity plus a bonus for the distance gained towards `auxiliary`.
///
/// The bonus scales with how far `point` still is from `auxiliary` relative to
/// `distance_cap`: far away, direction dominates and a black pixel can beat a white
/// one; close by, intensity decides. Negative scores are possible.
///
/// The arithmetic order (float division, truncation toward zero) is load-bearing:
/// it decides ties and therefore trajectories. A target far beyond
/// `distance_cap` gives huge bonuses; they saturate instead of wrapping.
pub fn niceness(
    point: Point,
    intensity: u8,
    adjacent: Point,
    auxiliary: Point,
    speed_cap: u32,
    distance_cap: u64,
) -> i64 {
    let squared_distance = point.squared_distance(&auxiliary) as f64;
    let squared_distance_cap = (distance_cap as f64).powi(2);

    let prior_distance = (adjacent.squared_distance(&auxiliary) as f64).sqrt();
    let gained_distance = prior_distance - squared_distance.sqrt();

    let proximity_bonus =
        (255.0 * gained_distance / speed_cap as f64 * squared_distance / squared_distance_cap) as i64;

    (intensity as i64).saturating_add(proximity_bonus)
}
