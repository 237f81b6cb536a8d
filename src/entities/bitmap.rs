//! Decoded single-channel raster
//!
//! **Why**: The tracker only ever reads one intensity per pixel, so frames are
//! reduced to one byte per pixel at decode time and never touched again.
//!
//! **Used by**: Frame (cache slot content), Tracker (neighbourhood search),
//! annulus report

use std::ops::Index;

/// Immutable row-major grayscale image, one byte per pixel
#[derive(Debug, PartialEq, Eq)]
pub struct Bitmap {
    width: usize,
    height: usize,
    pixels: Vec<u8>,
}

impl Bitmap {
    /// Wrap an existing pixel buffer.
    ///
    /// # Panics
    ///
    /// Panics if `pixels.len() != width * height`.
    pub fn new(width: usize, height: usize, pixels: Vec<u8>) -> Self {
        assert_eq!(
            pixels.len(),
            width * height,
            "bitmap buffer holds {} bytes, expected {}x{}",
            pixels.len(),
            width,
            height
        );
        Self { width, height, pixels }
    }

    /// Bitmap filled with a single gray level
    pub fn filled(width: usize, height: usize, value: u8) -> Self {
        Self::new(width, height, vec![value; width * height])
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// One row of samples.
    ///
    /// # Panics
    ///
    /// Panics if `row >= height`.
    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        assert!(row < self.height, "row {} out of range (height {})", row, self.height);
        let start = row * self.width;
        &self.pixels[start..start + self.width]
    }

    /// Sample at (x, y), `None` outside the raster
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> Option<u8> {
        if x < 0 || y < 0 || x as usize >= self.width || y as usize >= self.height {
            return None;
        }
        Some(self.pixels[y as usize * self.width + x as usize])
    }

    /// Whether (x, y) lies inside the raster
    pub fn contains(&self, x: i32, y: i32) -> bool {
        self.get(x, y).is_some()
    }

    /// Raw buffer in row-major order
    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Memory size in bytes
    pub fn mem(&self) -> usize {
        self.pixels.len()
    }
}

/// `bitmap[row][column]`
impl Index<usize> for Bitmap {
    type Output = [u8];

    fn index(&self, row: usize) -> &[u8] {
        self.row(row)
    }
}
