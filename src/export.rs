//! Trajectory reports
//!
//! **Why**: Tracks are only useful once they leave the process. Two plain-text
//! formats are written here: the ibidi chemotaxis table (one row per frame per
//! trackee) and the annulus report, which samples the gray level at and around
//! a trackee in every frame.
//!
//! **Used by**: CLI (`--export`, `--annulus`)

use log::{info, warn};
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::entities::bitmap::Bitmap;
use crate::entities::movie::Movie;
use crate::entities::track::{Point, Trackee};

/// What an ibidi export wrote
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ExportSummary {
    pub rows: usize,
    /// Keys that are not canonical positive integers
    pub skipped: Vec<String>,
}

/// Parse a trackee key as an ibidi track number.
///
/// Only canonical positive integers qualify: "7" does, "07", "+7", "0" and "x" don't.
pub fn ibidi_index(key: &str) -> Option<u32> {
    let index: u32 = key.parse().ok()?;
    (index > 0 && index.to_string() == key).then_some(index)
}

/// Write trackees as an ibidi table.
///
/// Rows are ordered by track number; the first column is a running 1-based row
/// counter across all tracks.
pub fn write_ibidi<'a, W, I>(out: &mut W, trackees: I) -> io::Result<ExportSummary>
where
    W: Write,
    I: IntoIterator<Item = (&'a str, &'a Trackee)>,
{
    let mut summary = ExportSummary::default();
    let mut good: Vec<(u32, &Trackee)> = Vec::new();
    for (key, trackee) in trackees {
        match ibidi_index(key) {
            Some(index) => good.push((index, trackee)),
            None => summary.skipped.push(key.to_string()),
        }
    }
    good.sort_by_key(|(index, _)| *index);

    writeln!(out, "--\ttrack\tslice\tx\ty")?;
    for (index, trackee) in good {
        for (slice, point) in trackee.snapshot().iter().enumerate() {
            summary.rows += 1;
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}",
                summary.rows,
                index,
                slice + 1,
                point.x,
                point.y
            )?;
        }
    }

    if !summary.skipped.is_empty() {
        warn!(
            "Skipped trackees with incompatible identifiers: {}",
            summary.skipped.join(", ")
        );
    }
    Ok(summary)
}

/// Write an ibidi table to `path`
pub fn export_ibidi<'a, I>(path: &Path, trackees: I) -> io::Result<ExportSummary>
where
    I: IntoIterator<Item = (&'a str, &'a Trackee)>,
{
    let mut out = BufWriter::new(File::create(path)?);
    let summary = write_ibidi(&mut out, trackees)?;
    out.flush()?;
    info!("Ibidi export: {} rows -> {}", summary.rows, path.display());
    Ok(summary)
}

/// Mean gray level over the ring `inner² <= d² < outer²` around `center`.
///
/// Radii are taken in either order. Returns `None` when no pixel of the bitmap
/// falls inside the ring.
pub fn average_annulus(bitmap: &Bitmap, center: Point, inner: u32, outer: u32) -> Option<f64> {
    let (inner, outer) = (inner.min(outer) as i64, inner.max(outer) as i64);
    let (inner_sq, outer_sq) = (inner * inner, outer * outer);
    let r = outer as i32;

    let y0 = center.y.saturating_sub(r).max(0);
    let y1 = center.y.saturating_add(r).min(bitmap.height() as i32 - 1);
    let x0 = center.x.saturating_sub(r).max(0);
    let x1 = center.x.saturating_add(r).min(bitmap.width() as i32 - 1);

    let mut pixels = 0u64;
    let mut sum = 0u64;
    for y in y0..=y1 {
        let row = bitmap.row(y as usize);
        for x in x0..=x1 {
            let d = center.squared_distance(&Point::new(x, y));
            if d >= inner_sq && d < outer_sq {
                pixels += 1;
                sum += row[x as usize] as u64;
            }
        }
    }

    (pixels > 0).then(|| sum as f64 / pixels as f64)
}

/// Report file for trackee `key`
pub fn annulus_report_path(dir: &Path, key: &str) -> PathBuf {
    dir.join(format!("{}_1to3-plugin-output.txt", key))
}

/// Write the annulus report for one trackee.
///
/// One line per frame: the filename, then for resolved points the gray level
/// at the point and the ring average (`-1.0000` for an empty ring).
pub fn write_annulus<W: Write>(
    out: &mut W,
    movie: &Movie,
    trackee: &Trackee,
    inner: u32,
    outer: u32,
) -> io::Result<()> {
    let track = trackee.snapshot();
    for (i, frame) in movie.frames().iter().enumerate() {
        write!(out, "{}", frame.filename())?;

        let point = track.get(i).copied().unwrap_or(Point::UNRESOLVED);
        if point.is_resolved() {
            match frame.bitmap(true) {
                Some(bitmap) => match bitmap.get(point.x, point.y) {
                    Some(gray) => {
                        let avg = average_annulus(&bitmap, point, inner, outer).unwrap_or(-1.0);
                        write!(out, "\t{}\t{:.4}", gray, avg)?;
                    }
                    None => warn!(
                        "Point ({}, {}) outside {}, skipped",
                        point.x,
                        point.y,
                        frame.filename()
                    ),
                },
                None => warn!("No bitmap for {}, skipped", frame.filename()),
            }
        }
        writeln!(out)?;
    }
    Ok(())
}

/// Write the annulus report for `key` next to the movie's frames
pub fn annulus_report(
    movie: &Movie,
    key: &str,
    trackee: &Trackee,
    inner: u32,
    outer: u32,
) -> io::Result<PathBuf> {
    let path = annulus_report_path(movie.dir(), key);
    let mut out = BufWriter::new(File::create(&path)?);
    write_annulus(&mut out, movie, trackee, inner, outer)?;
    out.flush()?;
    info!("Annulus report for {} -> {}", key, path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::fixture_movie;

    #[test]
    fn test_ibidi_index() {
        assert_eq!(ibidi_index("7"), Some(7));
        assert_eq!(ibidi_index("12"), Some(12));
        assert_eq!(ibidi_index("0"), None);
        assert_eq!(ibidi_index("07"), None);
        assert_eq!(ibidi_index("+7"), None);
        assert_eq!(ibidi_index("-3"), None);
        assert_eq!(ibidi_index("cell"), None);
        assert_eq!(ibidi_index(""), None);
    }

    #[test]
    fn test_ibidi_table() {
        let a = Trackee::new(1, 2);
        a.set_point(0, Point::new(1, 2));
        a.set_point(1, Point::new(3, 4));
        let b = Trackee::new(1, 2);
        b.set_point(0, Point::new(5, 6));
        let c = Trackee::new(1, 2);

        let mut out = Vec::new();
        // Keys in string order: "10" sorts before "2" but exports after it
        let summary = write_ibidi(&mut out, [("10", &b), ("2", &a), ("x", &c)]).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(
            text,
            "--\ttrack\tslice\tx\ty\n\
             1\t2\t1\t1\t2\n\
             2\t2\t2\t3\t4\n\
             3\t10\t1\t5\t6\n\
             4\t10\t2\t-1\t-1\n"
        );
        assert_eq!(summary.rows, 4);
        assert_eq!(summary.skipped, vec!["x".to_string()]);
    }

    #[test]
    fn test_annulus_average() {
        let mut pixels = vec![0u8; 25];
        pixels[2 * 5 + 2] = 200; // center
        pixels[2 * 5 + 3] = 40; // right neighbour
        let bitmap = Bitmap::new(5, 5, pixels);
        let center = Point::new(2, 2);

        // d² in [1, 4): the 4 direct plus 4 diagonal neighbours
        assert_eq!(average_annulus(&bitmap, center, 1, 2), Some(5.0));
        // Radii order doesn't matter
        assert_eq!(average_annulus(&bitmap, center, 2, 1), Some(5.0));
        // d² < 1 holds only the center
        assert_eq!(average_annulus(&bitmap, center, 0, 1), Some(200.0));
        // Empty ring
        assert_eq!(average_annulus(&bitmap, center, 3, 3), None);
    }

    #[test]
    fn test_annulus_clipped_at_border() {
        let bitmap = Bitmap::filled(3, 3, 90);
        assert_eq!(average_annulus(&bitmap, Point::new(0, 0), 0, 10), Some(90.0));
    }

    #[test]
    fn test_annulus_report_file() {
        let frames = vec![Bitmap::filled(6, 6, 10), Bitmap::filled(6, 6, 20)];
        let (dir, movie) = fixture_movie("annulus_report", &frames);
        let trackee = Trackee::new(1, 2);
        trackee.set_point(1, Point::new(3, 3));

        let path = annulus_report(&movie, "4", &trackee, 1, 2).unwrap();
        assert_eq!(path, dir.join("4_1to3-plugin-output.txt"));

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "frame_000.png\nframe_001.png\t20\t20.0000\n");
    }
}
