//! Movie entry with a lazily decoded, reclaimable bitmap
//!
//! **Why**: A movie can hold far more frames than fit in memory. Each frame keeps
//! only a weak handle to its decoded bitmap; whoever holds the `Arc` keeps the
//! pixels alive, and once the last holder lets go the next request decodes again.
//!
//! **Used by**: Movie (ordering, prefetch), Tracker (neighbourhood search)
//!
//! # Identity
//!
//! While any holder keeps a bitmap alive, every `bitmap()` call returns that same
//! instance. Decoding happens outside the slot lock, so two threads may decode the
//! same file concurrently; the slower one adopts the instance the faster one
//! installed.

use log::{debug, trace, warn};
use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, Weak};

use image::DynamicImage;

use super::bitmap::Bitmap;

/// Frame decoding errors
#[derive(Debug)]
pub enum FrameError {
    Io(std::io::Error),
    Decode(String),
    Unsupported(String),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameError::Io(e) => write!(f, "IO error: {}", e),
            FrameError::Decode(e) => write!(f, "Decode error: {}", e),
            FrameError::Unsupported(e) => write!(f, "Unsupported format: {}", e),
        }
    }
}

impl std::error::Error for FrameError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            FrameError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<image::ImageError> for FrameError {
    fn from(e: image::ImageError) -> Self {
        match e {
            image::ImageError::IoError(e) => FrameError::Io(e),
            image::ImageError::Unsupported(e) => FrameError::Unsupported(e.to_string()),
            other => FrameError::Decode(other.to_string()),
        }
    }
}

/// One image of a movie
#[derive(Debug)]
pub struct Frame {
    dir: Arc<Path>,                 // Shared with every frame of the movie
    filename: String,               // Ordering key
    bitmap: Mutex<Weak<Bitmap>>,    // Empty until decoded or after reclamation
}

impl Frame {
    pub fn new(dir: Arc<Path>, filename: impl Into<String>) -> Self {
        Self {
            dir,
            filename: filename.into(),
            bitmap: Mutex::new(Weak::new()),
        }
    }

    /// File name without directory
    pub fn filename(&self) -> &str {
        &self.filename
    }

    /// Directory joined with the file name
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.filename)
    }

    /// Live cached bitmap, if any holder still keeps it alive
    pub fn cached(&self) -> Option<Arc<Bitmap>> {
        self.bitmap.lock().unwrap_or_else(|e| e.into_inner()).upgrade()
    }

    /// Shared handle to the decoded bitmap.
    ///
    /// Returns the live cached instance when there is one. Otherwise decodes the
    /// file if `load` is set; a failed decode is logged and yields `None` so one
    /// unreadable file never takes the whole movie down.
    pub fn bitmap(&self, load: bool) -> Option<Arc<Bitmap>> {
        if let Some(bitmap) = self.cached() {
            return Some(bitmap);
        }
        if !load {
            return None;
        }

        match self.load() {
            Ok(bitmap) => Some(self.install(bitmap)),
            Err(e) => {
                warn!("Failed to decode {}: {}", self.path().display(), e);
                None
            }
        }
    }

    /// Decode the file, bypassing the cache
    pub fn load(&self) -> Result<Bitmap, FrameError> {
        let path = self.path();
        trace!("Decoding {}", path.display());
        decode_gray(&path)
    }

    /// Install an externally decoded bitmap so later callers skip decoding
    pub fn set_bitmap(&self, bitmap: &Arc<Bitmap>) {
        *self.bitmap.lock().unwrap_or_else(|e| e.into_inner()) = Arc::downgrade(bitmap);
    }

    /// Publish a freshly decoded bitmap, adopting a live one if another thread won
    fn install(&self, bitmap: Bitmap) -> Arc<Bitmap> {
        let mut slot = self.bitmap.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(existing) = slot.upgrade() {
            debug!("{} decoded concurrently, keeping first instance", self.filename);
            return existing;
        }
        let bitmap = Arc::new(bitmap);
        *slot = Arc::downgrade(&bitmap);
        bitmap
    }
}

impl PartialEq for Frame {
    fn eq(&self, other: &Self) -> bool {
        self.filename == other.filename
    }
}

impl Eq for Frame {}

impl PartialOrd for Frame {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Frame {
    fn cmp(&self, other: &Self) -> Ordering {
        self.filename.cmp(&other.filename)
    }
}

/// Decode any raster format `image` understands, keeping one channel per pixel.
///
/// Gray sources are taken as-is; anything else keeps its first (red) channel.
pub fn decode_gray(path: &Path) -> Result<Bitmap, FrameError> {
    let img = image::open(path)?;
    let width = img.width() as usize;
    let height = img.height() as usize;

    let pixels = match img {
        DynamicImage::ImageLuma8(gray) => gray.into_raw(),
        other => other.to_rgb8().pixels().map(|px| px.0[0]).collect(),
    };

    Ok(Bitmap::new(width, height, pixels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{scratch_dir, write_gray_png};

    #[test]
    fn test_bitmap_identity_while_held() {
        let dir = scratch_dir("frame_identity");
        write_gray_png(&dir.join("a.png"), &Bitmap::filled(4, 3, 9));
        let frame = Frame::new(Arc::from(dir.as_path()), "a.png");

        let first = frame.bitmap(true).unwrap();
        let second = frame.bitmap(true).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.width(), 4);
        assert_eq!(first.height(), 3);
        assert_eq!(first[2][3], 9);
    }

    #[test]
    fn test_concurrent_decode_shares_instance() {
        use std::sync::Barrier;

        let dir = scratch_dir("frame_concurrent");
        write_gray_png(&dir.join("a.png"), &Bitmap::filled(64, 64, 5));
        let frame = Frame::new(Arc::from(dir.as_path()), "a.png");
        let threads = 8;
        let barrier = Barrier::new(threads);

        let bitmaps: Vec<Arc<Bitmap>> = std::thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|_| {
                    s.spawn(|| {
                        barrier.wait();
                        frame.bitmap(true).unwrap()
                    })
                })
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(bitmaps.len(), threads);
        for bitmap in &bitmaps[1..] {
            assert!(Arc::ptr_eq(&bitmaps[0], bitmap));
        }
        assert!(Arc::ptr_eq(&frame.cached().unwrap(), &bitmaps[0]));
    }

    #[test]
    fn test_reclaimed_after_last_holder() {
        let dir = scratch_dir("frame_reclaim");
        write_gray_png(&dir.join("a.png"), &Bitmap::filled(2, 2, 1));
        let frame = Frame::new(Arc::from(dir.as_path()), "a.png");

        let bitmap = frame.bitmap(true).unwrap();
        assert!(frame.cached().is_some());
        drop(bitmap);
        assert!(frame.cached().is_none());
        assert!(frame.bitmap(false).is_none());
        assert!(frame.bitmap(true).is_some());
    }

    #[test]
    fn test_no_load_without_cache() {
        let frame = Frame::new(Arc::from(Path::new("/nonexistent")), "x.png");
        assert!(frame.bitmap(false).is_none());
    }

    #[test]
    fn test_set_bitmap_skips_decode() {
        // File does not exist, so anything returned must come from the slot
        let frame = Frame::new(Arc::from(Path::new("/nonexistent")), "x.png");
        let external = Arc::new(Bitmap::filled(1, 1, 200));
        frame.set_bitmap(&external);

        let got = frame.bitmap(true).unwrap();
        assert!(Arc::ptr_eq(&got, &external));
    }

    #[test]
    fn test_missing_file_yields_none() {
        let frame = Frame::new(Arc::from(Path::new("/nonexistent/dir")), "missing.png");
        assert!(frame.bitmap(true).is_none());
        assert!(matches!(frame.load(), Err(FrameError::Io(_))));
    }

    #[test]
    fn test_color_source_keeps_red_channel() {
        let dir = scratch_dir("frame_rgb");
        let path = dir.join("rgb.png");
        let img = image::RgbImage::from_fn(2, 1, |x, _| {
            if x == 0 { image::Rgb([10, 20, 30]) } else { image::Rgb([40, 50, 60]) }
        });
        img.save(&path).unwrap();

        let bitmap = decode_gray(&path).unwrap();
        assert_eq!(bitmap.pixels(), &[10, 40]);
    }

    #[test]
    fn test_ordering_by_filename_only() {
        let a = Frame::new(Arc::from(Path::new("/z")), "a.bmp");
        let b = Frame::new(Arc::from(Path::new("/a")), "b.bmp");
        assert!(a < b);
        assert_eq!(a, Frame::new(Arc::from(Path::new("/other")), "a.bmp"));
    }
}
