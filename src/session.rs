//! Trackees and their marks
//!
//! **Why**: The tracker never overwrites resolved points, so whoever edits marks
//! must reset the affected spans before the next pass. `Session` owns that
//! bookkeeping: every mark edit clears exactly the points that could change.
//!
//! **Used by**: CLI (session files), anything driving marks interactively
//!
//! # Session files
//!
//! ```json
//! { "trackees": { "1": { "speed_cap": 5, "marks": [ { "frame": 0, "x": 10, "y": 10 } ] } } }
//! ```

use anyhow::Context;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use crate::entities::track::{Point, Trackee};

/// Mark bookkeeping errors
#[derive(Debug, PartialEq, Eq)]
pub enum SessionError {
    UnknownTrackee(String),
    DuplicateTrackee(String),
    FrameOutOfRange { frame: usize, frames: usize },
    NotMarked { key: String, frame: usize },
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::UnknownTrackee(key) => write!(f, "Unknown trackee: {}", key),
            SessionError::DuplicateTrackee(key) => write!(f, "Trackee already exists: {}", key),
            SessionError::FrameOutOfRange { frame, frames } => {
                write!(f, "Frame {} out of range ({} frames)", frame, frames)
            }
            SessionError::NotMarked { key, frame } => {
                write!(f, "Trackee {} has no mark at frame {}", key, frame)
            }
        }
    }
}

impl std::error::Error for SessionError {}

/// One confirmed point in a session file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mark {
    pub frame: usize,
    pub x: i32,
    pub y: i32,
}

/// One trackee in a session file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackeeSpec {
    /// Falls back to the session-wide default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_cap: Option<u32>,
    #[serde(default)]
    pub marks: Vec<Mark>,
}

/// On-disk session layout
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub trackees: BTreeMap<String, TrackeeSpec>,
}

impl SessionFile {
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read session {}", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse session {}", path.display()))
    }

    pub fn save(&self, path: &Path) -> anyhow::Result<()> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)
            .with_context(|| format!("Failed to write session {}", path.display()))
    }
}

struct Entry {
    trackee: Arc<Trackee>,
    marks: Vec<usize>, // Sorted, unique frame indices
}

/// Trackees of one movie, keyed by name
pub struct Session {
    frames: usize,
    entries: BTreeMap<String, Entry>,
}

impl Session {
    pub fn new(frames: usize) -> Self {
        Self {
            frames,
            entries: BTreeMap::new(),
        }
    }

    /// Build from a session file, replaying its marks in frame order
    pub fn from_file(
        file: &SessionFile,
        frames: usize,
        default_speed_cap: u32,
    ) -> Result<Self, SessionError> {
        let mut session = Self::new(frames);
        for (key, spec) in &file.trackees {
            session.add_trackee(key, spec.speed_cap.unwrap_or(default_speed_cap))?;
            let mut marks = spec.marks.clone();
            marks.sort_by_key(|m| m.frame);
            for mark in marks {
                session.mark(key, mark.frame, Point::new(mark.x, mark.y))?;
            }
        }
        info!("Session loaded: {} trackees", session.entries.len());
        Ok(session)
    }

    /// Current marks as a session file
    pub fn to_file(&self) -> SessionFile {
        let trackees = self
            .entries
            .iter()
            .map(|(key, entry)| {
                let marks = entry
                    .marks
                    .iter()
                    .map(|&frame| {
                        let point = entry.trackee.point(frame);
                        Mark { frame, x: point.x, y: point.y }
                    })
                    .collect();
                let spec = TrackeeSpec {
                    speed_cap: Some(entry.trackee.speed_cap()),
                    marks,
                };
                (key.clone(), spec)
            })
            .collect();
        SessionFile { trackees }
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn add_trackee(&mut self, key: &str, speed_cap: u32) -> Result<Arc<Trackee>, SessionError> {
        if self.entries.contains_key(key) {
            return Err(SessionError::DuplicateTrackee(key.to_string()));
        }
        let trackee = Arc::new(Trackee::new(speed_cap, self.frames));
        self.entries.insert(
            key.to_string(),
            Entry {
                trackee: Arc::clone(&trackee),
                marks: Vec::new(),
            },
        );
        debug!("Added trackee {} (speed cap {})", key, speed_cap);
        Ok(trackee)
    }

    /// Forget a trackee; outstanding `TrackView`s go empty unless a pass still holds it
    pub fn remove_trackee(&mut self, key: &str) -> Result<(), SessionError> {
        self.entries
            .remove(key)
            .map(|_| debug!("Removed trackee {}", key))
            .ok_or_else(|| SessionError::UnknownTrackee(key.to_string()))
    }

    pub fn trackee(&self, key: &str) -> Option<&Arc<Trackee>> {
        self.entries.get(key).map(|e| &e.trackee)
    }

    /// Trackees in key order
    pub fn trackees(&self) -> impl Iterator<Item = (&str, &Arc<Trackee>)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), &e.trackee))
    }

    /// Marked frames of a trackee, ascending
    pub fn marks(&self, key: &str) -> Option<&[usize]> {
        self.entries.get(key).map(|e| e.marks.as_slice())
    }

    /// Confirm `point` at `frame` and reset every point between this mark and its
    /// neighbouring marks (or the ends of the track).
    pub fn mark(&mut self, key: &str, frame: usize, point: Point) -> Result<(), SessionError> {
        let frames = self.frames;
        if frame >= frames {
            return Err(SessionError::FrameOutOfRange { frame, frames });
        }
        let entry = self.entry_mut(key)?;
        entry.trackee.set_point(frame, point);

        let at = match entry.marks.binary_search(&frame) {
            Ok(at) => at,
            Err(at) => {
                entry.marks.insert(at, frame);
                at
            }
        };

        let before = if at == 0 { 0 } else { entry.marks[at - 1] + 1 };
        let after = entry.marks.get(at + 1).copied().unwrap_or(frames);
        entry.trackee.clear_range(before..frame);
        entry.trackee.clear_range(frame + 1..after);

        debug!("Marked {} at frame {}, cleared {}..{} and {}..{}", key, frame, before, frame, frame + 1, after);
        Ok(())
    }

    /// Drop the mark at `frame` and reset everything between the neighbouring
    /// marks, the unmarked frame included.
    pub fn unmark(&mut self, key: &str, frame: usize) -> Result<(), SessionError> {
        let frames = self.frames;
        let entry = self.entry_mut(key)?;
        let at = entry.marks.binary_search(&frame).map_err(|_| SessionError::NotMarked {
            key: key.to_string(),
            frame,
        })?;

        let before = if at == 0 { 0 } else { entry.marks[at - 1] + 1 };
        let after = entry.marks.get(at + 1).copied().unwrap_or(frames);
        entry.trackee.clear_range(before..after);
        entry.marks.remove(at);

        debug!("Unmarked {} at frame {}, cleared {}..{}", key, frame, before, after);
        Ok(())
    }

    fn entry_mut(&mut self, key: &str) -> Result<&mut Entry, SessionError> {
        self.entries
            .get_mut(key)
            .ok_or_else(|| SessionError::UnknownTrackee(key.to_string()))
    }
}
