//! Ordered frame store for one directory
//!
//! **Why**: Users point at a directory and a filename pattern; every matching
//! regular file becomes one frame. Directory iteration order differs between
//! platforms and filesystems, so frames are always sorted by filename.
//!
//! **Used by**: Tracker (bitmaps per frame index), reports (filenames, directory)
//!
//! # Prefetch
//!
//! Opening a movie starts a background worker that decodes frames ahead of demand
//! (see [`Prefetcher`]). The worker is stopped and joined when the movie drops.
//! If the thread cannot be spawned the movie still works, just without prefetch.

use log::{debug, info, trace, warn};
use regex::Regex;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::frame::Frame;
use crate::core::prefetch::{DEFAULT_PREFETCH_LIMIT, Prefetcher};

/// Prefetch knobs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MovieOptions {
    pub prefetch: bool,
    pub prefetch_limit: usize,
}

impl Default for MovieOptions {
    fn default() -> Self {
        Self {
            prefetch: true,
            prefetch_limit: DEFAULT_PREFETCH_LIMIT,
        }
    }
}

/// Frame discovery errors
#[derive(Debug)]
pub enum MovieError {
    NotADirectory(PathBuf),
    Io { path: PathBuf, source: io::Error },
    Pattern(regex::Error),
}

impl std::fmt::Display for MovieError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MovieError::NotADirectory(path) => write!(f, "Not a directory: {}", path.display()),
            MovieError::Io { path, source } => {
                write!(f, "Failed to read {}: {}", path.display(), source)
            }
            MovieError::Pattern(e) => write!(f, "Invalid filename pattern: {}", e),
        }
    }
}

impl std::error::Error for MovieError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MovieError::Io { source, .. } => Some(source),
            MovieError::Pattern(e) => Some(e),
            MovieError::NotADirectory(_) => None,
        }
    }
}

/// Sorted frames of one directory plus their prefetcher
#[derive(Debug)]
pub struct Movie {
    // Declared first so the worker is joined before anything else is released
    prefetcher: Option<Prefetcher>,
    dir: Arc<Path>,
    frames: Arc<[Frame]>,
}

impl Movie {
    /// Open with default options (prefetch on, 1024 bitmaps)
    pub fn open(dir: impl AsRef<Path>, pattern: &str) -> Result<Self, MovieError> {
        Self::open_with(dir, pattern, MovieOptions::default())
    }

    /// Discover frames in `dir` whose filename matches `pattern`.
    ///
    /// An empty directory or a pattern that matches nothing gives an empty movie,
    /// not an error; check [`Movie::is_empty`] before use.
    pub fn open_with(
        dir: impl AsRef<Path>,
        pattern: &str,
        options: MovieOptions,
    ) -> Result<Self, MovieError> {
        let dir = dir.as_ref();
        let filenames = discover(dir, pattern)?;

        let shared: Arc<Path> = Arc::from(dir);
        let frames: Vec<Frame> = filenames
            .into_iter()
            .map(|name| Frame::new(Arc::clone(&shared), name))
            .collect();
        let frames: Arc<[Frame]> = Arc::from(frames);

        info!(
            "Opened movie: {} frames in {} (pattern {:?})",
            frames.len(),
            dir.display(),
            pattern
        );

        let prefetcher = if options.prefetch && !frames.is_empty() {
            match Prefetcher::spawn(Arc::clone(&frames), options.prefetch_limit) {
                Ok(prefetcher) => Some(prefetcher),
                Err(e) => {
                    warn!("Prefetch disabled, failed to spawn worker: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(Self {
            prefetcher,
            dir: shared,
            frames,
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn frame(&self, index: usize) -> &Frame {
        assert!(
            index < self.frames.len(),
            "frame {} out of range ({} frames)",
            index,
            self.frames.len()
        );
        &self.frames[index]
    }

    /// Directory joined with the frame's filename.
    ///
    /// # Panics
    ///
    /// Panics if `index >= len()`.
    pub fn path(&self, index: usize) -> PathBuf {
        self.frame(index).path()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bitmaps pinned by the prefetcher so far
    pub fn prefetched(&self) -> usize {
        self.prefetcher.as_ref().map(Prefetcher::len).unwrap_or(0)
    }

    /// Block until the prefetcher is done
    pub fn wait_for_prefetch(&mut self) {
        if let Some(prefetcher) = self.prefetcher.as_mut() {
            prefetcher.wait();
        }
    }

    /// Stop prefetching early; already pinned bitmaps stay pinned
    pub fn stop_prefetch(&mut self) {
        if let Some(prefetcher) = self.prefetcher.as_mut() {
            prefetcher.stop();
        }
    }
}

/// Sorted names of the regular files in `dir` matching `pattern`.
///
/// The pattern is searched for anywhere in the filename, like a grep; anchor it
/// with `^...$` for a full match. The empty pattern selects every file.
pub fn discover(dir: &Path, pattern: &str) -> Result<Vec<String>, MovieError> {
    if !dir.is_dir() {
        return Err(MovieError::NotADirectory(dir.to_path_buf()));
    }
    let regex = Regex::new(pattern).map_err(MovieError::Pattern)?;

    let io_err = |source: io::Error| MovieError::Io {
        path: dir.to_path_buf(),
        source,
    };

    let mut names = Vec::new();
    for entry in fs::read_dir(dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let path = entry.path();

        // Follows symlinks, like a regular-file status check
        if !fs::metadata(&path).map(|m| m.is_file()).unwrap_or(false) {
            continue;
        }
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            debug!("Skipping non-UTF-8 filename: {}", path.display());
            continue;
        };
        if regex.is_match(&name) {
            names.push(name);
        } else {
            trace!("Skipping {}: no match", name);
        }
    }

    names.sort();
    Ok(names)
}
