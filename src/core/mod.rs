//! Core engine modules - prefetch worker, tracker, background pass

pub mod prefetch;
pub mod tracker;
pub mod tracking_job;

pub use prefetch::{DEFAULT_PREFETCH_LIMIT, Prefetcher};
pub use tracker::{TrackError, Tracker};
pub use tracking_job::{TrackingEvent, TrackingJob};
