//! Entities module - frames, movies and trajectories
//!
//! Pixel data and trajectories only; nothing here spawns the tracker.

pub mod bitmap;
pub mod frame;
pub mod movie;
pub mod track;

pub use bitmap::Bitmap;
pub use frame::{Frame, FrameError};
pub use movie::{Movie, MovieError, MovieOptions};
pub use track::{Point, Track, TrackView, Trackee};
