//! Fixtures shared by unit tests

use std::fs;
use std::path::{Path, PathBuf};

use crate::entities::bitmap::Bitmap;
use crate::entities::movie::Movie;

/// Fresh, empty directory under the system temp dir
pub fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("trackhack_{}_{}", name, std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

/// Save `bitmap` as an 8-bit grayscale PNG
pub fn write_gray_png(path: &Path, bitmap: &Bitmap) {
    let img = image::GrayImage::from_raw(
        bitmap.width() as u32,
        bitmap.height() as u32,
        bitmap.pixels().to_vec(),
    )
    .unwrap();
    img.save(path).unwrap();
}

/// Movie over `frame_000.png`, `frame_001.png`, ... holding `frames`
pub fn fixture_movie(name: &str, frames: &[Bitmap]) -> (PathBuf, Movie) {
    let dir = scratch_dir(name);
    for (i, bitmap) in frames.iter().enumerate() {
        write_gray_png(&dir.join(format!("frame_{:03}.png", i)), bitmap);
    }
    let movie = Movie::open(&dir, r"^frame_\d{3}\.png$").unwrap();
    (dir, movie)
}
