//! Background bitmap prefetcher
//!
//! One worker thread walks the movie from frame 0, decoding each frame and pinning
//! the result in a bounded buffer so interactive access finds it already cached.
//!
//! Cancellation is cooperative: the owner sets a lock-guarded flag and joins; the
//! worker checks the flag at every frame boundary. The worker only shares
//! reference-counted state with its owner, so the owner can move freely.

use log::{debug, trace};
use std::io;
use std::sync::{Arc, Mutex};
use std::thread;

use crate::entities::bitmap::Bitmap;
use crate::entities::frame::Frame;

/// Default cap on pinned bitmaps
pub const DEFAULT_PREFETCH_LIMIT: usize = 1024;

/// Owner side of the prefetch worker. Dropping it stops and joins the worker.
#[derive(Debug)]
pub struct Prefetcher {
    terminate: Arc<Mutex<bool>>,           // Written once at teardown
    buffer: Arc<Mutex<Vec<Arc<Bitmap>>>>,  // Strong handles keeping bitmaps alive
    handle: Option<thread::JoinHandle<()>>,
}

impl Prefetcher {
    /// Start the worker over `frames`, pinning at most `limit` bitmaps.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread could not be spawned.
    pub fn spawn(frames: Arc<[Frame]>, limit: usize) -> io::Result<Self> {
        let terminate = Arc::new(Mutex::new(false));
        let buffer = Arc::new(Mutex::new(Vec::with_capacity(limit.min(frames.len()))));

        let handle = {
            let terminate = Arc::clone(&terminate);
            let buffer = Arc::clone(&buffer);
            thread::Builder::new()
                .name("trackhack-prefetch".into())
                .spawn(move || populate(&frames, limit, &terminate, &buffer))?
        };

        Ok(Self {
            terminate,
            buffer,
            handle: Some(handle),
        })
    }

    /// Number of bitmaps pinned so far
    pub fn len(&self) -> usize {
        self.buffer.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Block until the worker has covered the movie, hit the cap, or stopped
    pub fn wait(&mut self) {
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }

    /// Ask the worker to stop and join it
    pub fn stop(&mut self) {
        *self.terminate.lock().unwrap_or_else(|e| e.into_inner()) = true;
        self.wait();
    }
}

impl Drop for Prefetcher {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Worker body
fn populate(
    frames: &[Frame],
    limit: usize,
    terminate: &Mutex<bool>,
    buffer: &Mutex<Vec<Arc<Bitmap>>>,
) {
    debug!("Prefetch started: {} frames, limit {}", frames.len(), limit);

    let mut stopped = false;
    for frame in frames.iter() {
        if *terminate.lock().unwrap_or_else(|e| e.into_inner()) {
            stopped = true;
            break;
        }
        if buffer.lock().unwrap_or_else(|e| e.into_inner()).len() >= limit {
            break;
        }

        // Decode failures were already logged by the frame; skip to the next one
        if let Some(bitmap) = frame.bitmap(true) {
            frame.set_bitmap(&bitmap);
            buffer.lock().unwrap_or_else(|e| e.into_inner()).push(bitmap);
            trace!("Prefetched {}", frame.filename());
        }
    }

    let count = buffer.lock().unwrap_or_else(|e| e.into_inner()).len();
    if stopped {
        debug!("Prefetch terminated early with {} bitmaps", count);
    } else {
        debug!("Prefetch finished with {} bitmaps", count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scratch_dir, write_gray_png};
    use std::path::Path;

    fn frames_in(dir: &Path, count: usize) -> Arc<[Frame]> {
        let shared: Arc<Path> = Arc::from(dir);
        let frames: Vec<Frame> = (0..count)
            .map(|i| {
                let name = format!("f{:03}.png", i);
                write_gray_png(&dir.join(&name), &Bitmap::filled(8, 8, i as u8));
                Frame::new(Arc::clone(&shared), name)
            })
            .collect();
        Arc::from(frames)
    }

    #[test]
    fn test_prefetch_covers_movie() {
        let dir = scratch_dir("prefetch_all");
        let frames = frames_in(&dir, 5);
        let mut prefetcher = Prefetcher::spawn(Arc::clone(&frames), 1024).unwrap();
        prefetcher.wait();

        assert_eq!(prefetcher.len(), 5);
        for (i, frame) in frames.iter().enumerate() {
            let bitmap = frame.bitmap(false).expect("prefetched bitmap stays pinned");
            assert_eq!(bitmap[0][0], i as u8);
        }
    }

    #[test]
    fn test_prefetch_respects_limit() {
        let dir = scratch_dir("prefetch_limit");
        let frames = frames_in(&dir, 6);
        let mut prefetcher = Prefetcher::spawn(Arc::clone(&frames), 2).unwrap();
        prefetcher.wait();

        assert_eq!(prefetcher.len(), 2);
        assert!(frames[0].bitmap(false).is_some());
        assert!(frames[1].bitmap(false).is_some());
        assert!(frames[2].bitmap(false).is_none());
    }

    #[test]
    fn test_stop_is_idempotent() {
        let dir = scratch_dir("prefetch_stop");
        let frames = frames_in(&dir, 3);
        let mut prefetcher = Prefetcher::spawn(frames, 1024).unwrap();
        prefetcher.stop();
        prefetcher.stop();
        assert!(prefetcher.len() <= 3);
    }
}
