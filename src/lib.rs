//! TRACKHACK - intensity-peak tracking across image sequences
//!
//! Re-exports all modules for use by the binary target.

// Core engine (prefetch, tracker, background pass)
pub mod core;

// App modules
pub mod cli;
pub mod config;
pub mod entities;
pub mod export;
pub mod paths;
pub mod session;

#[cfg(test)]
pub(crate) mod test_support;

pub use self::core::{TrackError, Tracker, TrackingEvent, TrackingJob};
pub use entities::{Bitmap, Frame, FrameError, Movie, MovieError, MovieOptions, Point, Track, TrackView, Trackee};
pub use session::{Session, SessionError, SessionFile};
