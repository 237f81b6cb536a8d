use anyhow::{Context, Result, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::sync::Arc;

use trackhack::cli::Args;
use trackhack::config::{SETTINGS_FILE, Settings};
use trackhack::export;
use trackhack::paths::PathConfig;
use trackhack::{Movie, Session, SessionFile, Tracker, TrackingEvent, TrackingJob};

fn init_logging(args: &Args, paths: &PathConfig) -> Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| paths.data_file("trackhack.log"));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Respects RUST_LOG if set
        env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(log_level.as_str().to_lowercase()),
        )
        .format_timestamp_millis()
        .init();
    }
    Ok(())
}

fn main() -> Result<()> {
    let args = Args::parse();

    let paths = PathConfig::from_env_and_cli(args.config_dir.clone());
    if let Err(e) = paths.ensure_dirs() {
        eprintln!("Warning: Failed to create application directories: {}", e);
    }
    init_logging(&args, &paths)?;

    info!("Trackhack starting...");
    debug!("Command-line args: {:?}", args);

    let settings_path = paths.config_file(SETTINGS_FILE);
    let mut settings = Settings::load(&settings_path)?;

    let pattern = args.pattern.clone().unwrap_or_else(|| settings.pattern.clone());
    let mut options = settings.movie_options();
    if args.no_prefetch {
        options.prefetch = false;
    }
    if let Some(limit) = args.prefetch_limit {
        options.prefetch_limit = limit;
    }

    let movie = Movie::open_with(&args.dir, &pattern, options)
        .with_context(|| format!("Failed to open movie {}", args.dir.display()))?;
    if movie.is_empty() {
        bail!("No frames in {} match pattern {:?}", args.dir.display(), pattern);
    }
    let movie = Arc::new(movie);

    let speed_cap = args.speed_cap.unwrap_or(settings.speed_cap);
    let session_file = SessionFile::load(&args.session)?;
    let session = Session::from_file(&session_file, movie.len(), speed_cap)
        .with_context(|| format!("Invalid session {}", args.session.display()))?;
    if session.is_empty() {
        warn!("Session {} has no trackees", args.session.display());
    }

    let trackees = session
        .trackees()
        .map(|(key, trackee)| (key.to_string(), Arc::clone(trackee)))
        .collect();
    let job = TrackingJob::spawn(Arc::new(Tracker::new()), trackees, Arc::clone(&movie))
        .context("Failed to start tracking worker")?;

    for event in job.events().iter() {
        match event {
            TrackingEvent::Started { trackees, frames } => {
                println!("Tracking {} trackees over {} frames", trackees, frames)
            }
            TrackingEvent::TrackeeDone { key, done, total } => {
                println!("  [{}/{}] {}", done, total, key)
            }
            TrackingEvent::Finished { error: None } => println!("Done"),
            TrackingEvent::Finished { error: Some(e) } => println!("Failed: {}", e),
        }
    }
    job.wait().context("Tracking pass failed")?;

    if let Some(path) = &args.export {
        let summary = export::export_ibidi(path, session.trackees().map(|(k, t)| (k, t.as_ref())))
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Exported {} rows to {}", summary.rows, path.display());
        if !summary.skipped.is_empty() {
            println!("Skipped trackees: {}", summary.skipped.join(", "));
        }
    }

    if let Some((inner, outer)) = args.annulus_radii() {
        for (key, trackee) in session.trackees() {
            let path = export::annulus_report(&movie, key, trackee, inner, outer)
                .with_context(|| format!("Failed to write annulus report for {}", key))?;
            println!("Annulus report: {}", path.display());
        }
    }

    if args.remember {
        settings.remember_pattern(&pattern);
        settings.save(&settings_path)?;
    }

    info!("Trackhack finished");
    Ok(())
}
