//! Tracking pass on a background thread
//!
//! Long neighbourhood searches must not block whoever drives the session, so a
//! full pass runs on one dedicated worker per invocation. Progress is streamed
//! over a channel; the pass result comes back through [`TrackingJob::wait`].
//!
//! The worker owns `Arc`s to the movie and trackees, so dropping a trackee from
//! the session mid-pass keeps its trajectory alive until the pass ends.

use crossbeam_channel::{Receiver, Sender, unbounded};
use log::{debug, error, info};
use std::io;
use std::sync::Arc;
use std::thread;

use super::tracker::{TrackError, Tracker};
use crate::entities::movie::Movie;
use crate::entities::track::Trackee;

/// Progress updates during a pass
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackingEvent {
    Started { trackees: usize, frames: usize },
    TrackeeDone { key: String, done: usize, total: usize },
    Finished { error: Option<String> },
}

/// Handle to a running pass. Dropping it waits for the pass to end.
#[derive(Debug)]
pub struct TrackingJob {
    events: Receiver<TrackingEvent>,
    handle: Option<thread::JoinHandle<Result<(), TrackError>>>,
}

impl TrackingJob {
    /// Start tracking `trackees` (in the given order) against `movie`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the worker thread could not be spawned.
    pub fn spawn(
        tracker: Arc<Tracker>,
        trackees: Vec<(String, Arc<Trackee>)>,
        movie: Arc<Movie>,
    ) -> io::Result<Self> {
        let (tx, rx) = unbounded();

        let handle = thread::Builder::new()
            .name("trackhack-tracker".into())
            .spawn(move || run(&tracker, &trackees, &movie, &tx))?;

        Ok(Self {
            events: rx,
            handle: Some(handle),
        })
    }

    /// Progress events; the channel disconnects once the pass is over
    pub fn events(&self) -> &Receiver<TrackingEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map(|h| h.is_finished()).unwrap_or(true)
    }

    /// Wait for the pass and return its result
    pub fn wait(mut self) -> Result<(), TrackError> {
        self.join()
    }

    fn join(&mut self) -> Result<(), TrackError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(panic) => std::panic::resume_unwind(panic),
            },
            None => Ok(()),
        }
    }
}

impl Drop for TrackingJob {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

/// Worker body
fn run(
    tracker: &Tracker,
    trackees: &[(String, Arc<Trackee>)],
    movie: &Movie,
    tx: &Sender<TrackingEvent>,
) -> Result<(), TrackError> {
    let total = trackees.len();
    info!("Tracking pass started: {} trackees, {} frames", total, movie.len());
    // Receiver may be gone already; progress is best effort
    let _ = tx.send(TrackingEvent::Started {
        trackees: total,
        frames: movie.len(),
    });

    let result = tracker.track_each(trackees.iter().map(|(_, t)| t.as_ref()), movie, |i| {
        let key = trackees[i].0.clone();
        debug!("Trackee {} done ({}/{})", key, i + 1, total);
        let _ = tx.send(TrackingEvent::TrackeeDone {
            key,
            done: i + 1,
            total,
        });
    });

    match &result {
        Ok(()) => info!("Tracking pass finished"),
        Err(e) => error!("Tracking pass abandoned: {}", e),
    }
    let _ = tx.send(TrackingEvent::Finished {
        error: result.as_ref().err().map(|e| e.to_string()),
    });
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::bitmap::Bitmap;
    use crate::entities::track::Point;
    use crate::test_support::fixture_movie;

    #[test]
    fn test_background_pass_reports_progress() {
        let frames: Vec<Bitmap> = (0..4).map(|_| Bitmap::filled(10, 10, 30)).collect();
        let (_dir, movie) = fixture_movie("job_progress", &frames);
        let movie = Arc::new(movie);

        let a = Arc::new(Trackee::new(2, movie.len()));
        a.set_point(0, Point::new(3, 3));
        let b = Arc::new(Trackee::new(2, movie.len()));
        let view = a.track();

        let job = TrackingJob::spawn(
            Arc::new(Tracker::new()),
            vec![("1".into(), Arc::clone(&a)), ("2".into(), b)],
            Arc::clone(&movie),
        )
        .unwrap();

        let events: Vec<TrackingEvent> = job.events().iter().collect();
        // Channel disconnects only after the worker returned
        while !job.is_finished() {
            std::thread::yield_now();
        }
        job.wait().unwrap();

        assert_eq!(events.first(), Some(&TrackingEvent::Started { trackees: 2, frames: 4 }));
        assert!(events.contains(&TrackingEvent::TrackeeDone { key: "2".into(), done: 2, total: 2 }));
        assert_eq!(events.last(), Some(&TrackingEvent::Finished { error: None }));
        assert!(view.snapshot().unwrap().iter().all(Point::is_resolved));
    }

    #[test]
    fn test_second_pass_rejected_while_running() {
        let frames: Vec<Bitmap> = (0..2).map(|_| Bitmap::filled(4, 4, 0)).collect();
        let (_dir, movie) = fixture_movie("job_busy", &frames);
        let movie = Arc::new(movie);
        let tracker = Arc::new(Tracker::new());

        let guard = tracker.acquire().unwrap();
        let job = TrackingJob::spawn(Arc::clone(&tracker), Vec::new(), Arc::clone(&movie)).unwrap();
        assert!(matches!(job.wait(), Err(TrackError::Busy)));
        drop(guard);
    }
}
