use clap::Parser;
use std::path::PathBuf;

// Build version with decoder info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Images: image 0.25 (PNG, JPEG, TIFF, TGA, BMP)\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Track bright spots through an image sequence
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Directory holding the frames
    #[arg(value_name = "DIR")]
    pub dir: PathBuf,

    /// Filename regex selecting frames (unanchored; empty matches all files)
    #[arg(short = 'p', long = "pattern", value_name = "REGEX")]
    pub pattern: Option<String>,

    /// Session file with trackees and their marks (JSON)
    #[arg(short = 's', long = "session", value_name = "FILE")]
    pub session: PathBuf,

    /// Write all trackees with numeric keys as an ibidi table
    #[arg(short = 'e', long = "export", value_name = "FILE")]
    pub export: Option<PathBuf>,

    /// Write an annulus report per trackee with the given ring radii
    #[arg(long = "annulus", value_names = ["INNER", "OUTER"], num_args = 2)]
    pub annulus: Option<Vec<u32>>,

    /// Speed cap for trackees whose session entry has none
    #[arg(long = "speed-cap", value_name = "PIXELS")]
    pub speed_cap: Option<u32>,

    /// Decode frames only when the tracker asks for them
    #[arg(long = "no-prefetch")]
    pub no_prefetch: bool,

    /// Max bitmaps held by the prefetcher
    #[arg(long = "prefetch-limit", value_name = "N")]
    pub prefetch_limit: Option<usize>,

    /// Save the pattern used as the new default
    #[arg(long = "remember")]
    pub remember: bool,

    /// Enable logging to file (default: trackhack.log in the data directory)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,

    /// Custom configuration directory (overrides default platform paths)
    #[arg(short = 'c', long = "config-dir", value_name = "DIR")]
    pub config_dir: Option<PathBuf>,
}

impl Args {
    /// Ring radii from `--annulus`
    pub fn annulus_radii(&self) -> Option<(u32, u32)> {
        match self.annulus.as_deref() {
            Some([inner, outer]) => Some((*inner, *outer)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_args_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_full() {
        let args = Args::try_parse_from([
            "trackhack", "/movies/cells", "-p", r"\.bmp$", "-s", "cells.json",
            "--export", "out.txt", "--annulus", "2", "6", "--no-prefetch", "-vv", "--log",
        ])
        .unwrap();
        assert_eq!(args.dir, PathBuf::from("/movies/cells"));
        assert_eq!(args.pattern.as_deref(), Some(r"\.bmp$"));
        assert_eq!(args.annulus_radii(), Some((2, 6)));
        assert!(args.no_prefetch);
        assert_eq!(args.verbosity, 2);
        assert_eq!(args.log_file, Some(None));
    }

    #[test]
    fn test_session_required() {
        assert!(Args::try_parse_from(["trackhack", "/movies/cells"]).is_err());
    }
}
